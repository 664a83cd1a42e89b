//! # Multi-Node Sync
//!
//! Several producers and followers on one network, the epoch-batched
//! variant, and sessions that cannot complete.

#[cfg(test)]
mod tests {
    use gc_block_sync::{BlockSyncApi, SyncConfig, SyncVariant, SyncerStatus};

    use crate::harness::{eventually, produce, settle, TestGroup, SETTLE};

    fn failing_fast() -> SyncConfig {
        SyncConfig {
            task_timeout_ms: 20,
            max_retries: Some(2),
            ..SyncConfig::for_testing()
        }
    }

    #[tokio::test]
    async fn test_followers_joining_at_different_heights_converge() {
        let group = TestGroup::new(1, SyncConfig::for_testing());
        let producer = group.join_producer(0);

        let mut followers = Vec::new();
        for (i, batch) in [3usize, 4, 2].into_iter().enumerate() {
            produce(&producer, batch).await;
            let follower = group.join_follower(&format!("follower-{i}"));
            follower.chain().start_sync().await.unwrap();
            followers.push(follower);
        }
        for follower in &followers {
            assert_eq!(settle(follower).await, SyncerStatus::Idle);
        }

        // Live blocks now arrive by broadcast alone.
        produce(&producer, 2).await;
        let expected = producer.chain().chain_tip();
        assert_eq!(expected.height, 11);
        for follower in &followers {
            eventually("follower to commit live blocks", SETTLE, || {
                follower.chain().chain_tip() == expected
            })
            .await;
        }

        for follower in followers {
            follower.shutdown().await;
        }
        producer.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_answers_from_two_producers() {
        let group = TestGroup::new(2, SyncConfig::for_testing());
        let first = group.join_producer(0);
        let second = group.join_producer(1);
        produce(&first, 6).await;

        let expected = first.chain().chain_tip();
        eventually("second producer to follow broadcasts", SETTLE, || {
            second.chain().chain_tip() == expected
        })
        .await;

        let follower = group.join_follower("follower");
        follower.chain().start_sync().await.unwrap();
        assert_eq!(settle(&follower).await, SyncerStatus::Idle);
        assert_eq!(follower.chain().chain_tip(), expected);

        follower.shutdown().await;
        second.shutdown().await;
        first.shutdown().await;
    }

    #[tokio::test]
    async fn test_epoch_batches_reach_tip() {
        let sync = SyncConfig {
            variant: SyncVariant::EpochBatch,
            ..SyncConfig::for_testing()
        };
        let group = TestGroup::new(1, sync);
        let producer = group.join_producer(0);
        produce(&producer, 13).await;

        let follower = group.join_follower("batch-follower");
        follower.chain().start_sync().await.unwrap();
        assert_eq!(settle(&follower).await, SyncerStatus::Idle);
        assert_eq!(follower.chain().chain_tip(), producer.chain().chain_tip());

        follower.shutdown().await;
        producer.shutdown().await;
    }

    #[tokio::test]
    async fn test_unanswered_session_fails_then_recovers() {
        let group = TestGroup::new(1, failing_fast());
        let follower = group.join_follower("follower");

        follower.chain().start_sync().await.unwrap();
        assert_eq!(settle(&follower).await, SyncerStatus::SyncFailed);

        let producer = group.join_producer(0);
        produce(&producer, 3).await;
        // The broadcasts alone may already bring it up to date; a fresh
        // session must still be accepted after a failure.
        follower.chain().start_sync().await.unwrap();
        assert_eq!(settle(&follower).await, SyncerStatus::Idle);
        assert_eq!(follower.chain().chain_tip(), producer.chain().chain_tip());

        follower.shutdown().await;
        producer.shutdown().await;
    }

    #[tokio::test]
    async fn test_outsider_without_group_key_cannot_sync() {
        let group = TestGroup::new(1, failing_fast());
        let producer = group.join_producer(0);
        produce(&producer, 3).await;

        let outsider = group.join_outsider("outsider");
        outsider.chain().start_sync().await.unwrap();

        assert_eq!(settle(&outsider).await, SyncerStatus::SyncFailed);
        assert_eq!(outsider.chain().chain_tip().height, 0);

        outsider.shutdown().await;
        producer.shutdown().await;
    }
}
