//! # Sync Scenarios
//!
//! End-to-end behavior of one follower against the producer:
//!
//! - A: follower at height 9, producer at 10; forward sync closes the gap
//! - B: a broadcast block with an unknown parent starts a backward session,
//!   which walks down to genesis and turns forward
//! - C: two blocks at equal height; the greater hash is canonical whatever
//!   the arrival order
//! - D: stopping mid-flight closes the syncer for good

#[cfg(test)]
mod tests {
    use gc_block_sync::{
        child_block, BlockSyncApi, BroadcastOutcome, SyncConfig, SyncError, SyncerStatus,
    };
    use shared_types::Block;

    use crate::harness::{eventually, produce, settle, TestGroup, SETTLE};

    #[tokio::test]
    async fn test_forward_sync_closes_single_block_gap() {
        let group = TestGroup::new(1, SyncConfig::for_testing());
        let producer = group.join_producer(0);
        let blocks = produce(&producer, 10).await;

        let follower = group.join_follower("follower");
        for block in &blocks[..9] {
            let outcome = follower.chain().handle_block_broadcast(block.clone()).await.unwrap();
            assert_eq!(outcome, BroadcastOutcome::Committed);
        }
        assert_eq!(follower.chain().chain_tip().height, 9);

        follower.chain().start_sync().await.unwrap();
        assert_eq!(settle(&follower).await, SyncerStatus::Idle);

        let tip = follower.chain().chain_tip();
        assert_eq!(tip.height, 10);
        assert_eq!(tip.block_id, blocks[9].block_id);

        follower.shutdown().await;
        producer.shutdown().await;
    }

    #[tokio::test]
    async fn test_orphan_broadcast_triggers_backward_then_forward() {
        let group = TestGroup::new(1, SyncConfig::for_testing());
        let producer = group.join_producer(0);
        produce(&producer, 5).await;

        // Joins late: the next broadcast is an orphan for it.
        let follower = group.join_follower("late-follower");
        let latest = produce(&producer, 1).await.remove(0);

        let expected = producer.chain().chain_tip();
        eventually("follower to reach producer tip", SETTLE, || {
            follower.chain().chain_tip() == expected
        })
        .await;
        assert_eq!(settle(&follower).await, SyncerStatus::Idle);

        let tip = follower.chain().chain_tip();
        assert_eq!(tip.height, 6);
        assert_eq!(tip.block_id, latest.block_id);

        follower.shutdown().await;
        producer.shutdown().await;
    }

    /// Feed two equal-height siblings in the given order; return the tip id.
    async fn tip_after(group: &TestGroup, first: &Block, second: &Block) -> String {
        let follower = group.join_follower("fork-watcher");
        follower.chain().handle_block_broadcast(first.clone()).await.unwrap();
        follower.chain().handle_block_broadcast(second.clone()).await.unwrap();
        let tip = follower.chain().chain_tip();
        follower.shutdown().await;
        assert_eq!(tip.height, 1);
        tip.block_id
    }

    #[tokio::test]
    async fn test_equal_height_fork_resolved_by_greater_hash() {
        let group = TestGroup::new(2, SyncConfig::for_testing());
        let x = child_block(&group.genesis, vec![], &group.producer_keys[0], 1).unwrap();
        let y = child_block(&group.genesis, vec![], &group.producer_keys[1], 1).unwrap();
        let winner = if x.hash > y.hash { &x } else { &y };

        assert_eq!(tip_after(&group, &x, &y).await, winner.block_id);
        assert_eq!(tip_after(&group, &y, &x).await, winner.block_id);
    }

    #[tokio::test]
    async fn test_longer_branch_overrides_greater_hash() {
        let group = TestGroup::new(2, SyncConfig::for_testing());
        let x = child_block(&group.genesis, vec![], &group.producer_keys[0], 1).unwrap();
        let y = child_block(&group.genesis, vec![], &group.producer_keys[1], 1).unwrap();
        let (winner, loser) = if x.hash > y.hash { (&x, &y) } else { (&y, &x) };
        let extension = child_block(loser, vec![], &group.producer_keys[0], 2).unwrap();

        let follower = group.join_follower("fork-watcher");
        for block in [winner, loser, &extension] {
            follower.chain().handle_block_broadcast(block.clone()).await.unwrap();
        }

        let tip = follower.chain().chain_tip();
        assert_eq!(tip.height, 2);
        assert_eq!(tip.block_id, extension.block_id);
        follower.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_mid_flight_closes_syncer() {
        // No producer on the network: the first request never gets an answer.
        let group = TestGroup::new(1, SyncConfig::for_testing());
        let follower = group.join_follower("follower");

        follower.chain().start_sync().await.unwrap();
        assert_eq!(follower.chain().syncer_status(), SyncerStatus::SyncingForward);

        follower.chain().stop_sync().await;
        assert_eq!(follower.chain().syncer_status(), SyncerStatus::Closed);

        let err = follower.chain().start_sync().await.unwrap_err();
        assert!(matches!(err, SyncError::AlreadySyncing(SyncerStatus::Closed)));
        follower.shutdown().await;
    }
}
