//! # Fork Choice
//!
//! Picks the canonical tip among competing blocks.
//!
//! The order is total: a greater height wins, and at equal height the
//! lexicographically greater hash wins. A lower height never replaces the
//! current tip, so recomputing over the same candidates is idempotent and the
//! result does not depend on arrival order.

use std::cmp::Ordering;

use shared_types::ChainTip;

/// Whether `candidate` should replace `current` as the canonical tip.
pub fn is_better_tip(candidate: &ChainTip, current: &ChainTip) -> bool {
    match candidate.height.cmp(&current.height) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.hash > current.hash,
    }
}

/// Recompute the canonical tip after `candidates` were committed.
pub fn recal_chain_height(current: &ChainTip, candidates: &[ChainTip]) -> ChainTip {
    candidates.iter().fold(current.clone(), |best, candidate| {
        if is_better_tip(candidate, &best) {
            candidate.clone()
        } else {
            best
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tip(height: u64, fill: u8) -> ChainTip {
        ChainTip {
            height,
            block_id: format!("b{height}-{fill}"),
            hash: [fill; 32],
        }
    }

    #[test]
    fn test_higher_wins() {
        let current = tip(5, 0xFF);
        let new = recal_chain_height(&current, &[tip(6, 0x00)]);
        assert_eq!(new.height, 6);
    }

    #[test]
    fn test_lower_never_wins() {
        let current = tip(5, 0x00);
        let new = recal_chain_height(&current, &[tip(4, 0xFF)]);
        assert_eq!(new, current);
    }

    #[test]
    fn test_equal_height_greater_hash_wins_either_order() {
        let a = tip(7, 0x01);
        let b = tip(7, 0x02);

        assert_eq!(recal_chain_height(&a, &[b.clone()]), b);
        assert_eq!(recal_chain_height(&b, &[a.clone()]), b);
    }

    #[test]
    fn test_idempotent() {
        let current = tip(3, 0x10);
        let candidates = [tip(4, 0x01), tip(4, 0x05)];

        let once = recal_chain_height(&current, &candidates);
        let twice = recal_chain_height(&once, &candidates);
        assert_eq!(once, twice);
    }

    proptest! {
        #[test]
        fn prop_order_independent(mut entries in proptest::collection::vec((0u64..8, any::<u8>()), 1..12)) {
            let base = tip(0, 0);
            let candidates: Vec<ChainTip> = entries.iter().map(|(h, f)| tip(*h, *f)).collect();
            let forward = recal_chain_height(&base, &candidates);

            entries.reverse();
            let reversed: Vec<ChainTip> = entries.iter().map(|(h, f)| tip(*h, *f)).collect();
            let backward = recal_chain_height(&base, &reversed);

            prop_assert_eq!(forward.height, backward.height);
            prop_assert_eq!(forward.hash, backward.hash);
        }
    }
}
