//! Dispatch keys and their ordering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::Score;
use crate::models::ActivityId;

/// Sort key of one candidate activity for one dispatch pass.
///
/// # Ordering
/// Keys sort in dispatch order, so the *smallest* key runs first:
/// 1. higher `composite` first,
/// 2. then lower `sequence_tie_break` (earlier in a simultaneous batch),
/// 3. then lower `activity_id`.
///
/// Distinct activities never compare equal, which keeps the order strict
/// and the dispatch sequence reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchKey {
    pub composite: Score,
    pub activity_id: ActivityId,
    pub sequence_tie_break: i64,
}

impl DispatchKey {
    pub fn new(composite: Score, activity_id: ActivityId, sequence_tie_break: i64) -> Self {
        Self {
            composite,
            activity_id,
            sequence_tie_break,
        }
    }
}

impl Ord for DispatchKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .composite
            .cmp(&self.composite)
            .then_with(|| self.sequence_tie_break.cmp(&other.sequence_tie_break))
            .then_with(|| self.activity_id.cmp(&other.activity_id))
    }
}

impl PartialOrd for DispatchKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn key(composite: i64, id: ActivityId, seq: i64) -> DispatchKey {
        DispatchKey::new(Decimal::from(composite), id, seq)
    }

    #[test]
    fn test_higher_composite_first() {
        assert!(key(50, 2, 0) < key(30, 1, 0));
    }

    #[test]
    fn test_sequence_breaks_composite_tie() {
        assert!(key(50, 9, 1) < key(50, 1, 2));
    }

    #[test]
    fn test_id_breaks_full_tie() {
        assert!(key(50, 1, 0) < key(50, 2, 0));
        assert_eq!(key(50, 1, 0).cmp(&key(50, 1, 0)), Ordering::Equal);
    }

    #[test]
    fn test_scale_does_not_matter() {
        let a = DispatchKey::new(Decimal::new(100, 2), 1, 0);
        let b = DispatchKey::new(Decimal::ONE, 1, 0);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn test_sort() {
        let mut keys = vec![key(10, 4, 0), key(50, 3, 0), key(50, 1, 0), key(30, 2, 0)];
        keys.sort();
        let ids: Vec<_> = keys.iter().map(|k| k.activity_id).collect();
        assert_eq!(ids, vec![1, 3, 2, 4]);
    }

    fn arb_key() -> impl Strategy<Value = DispatchKey> {
        (-50i64..50, 0i64..6, 0i64..4).prop_map(|(c, id, seq)| key(c, id, seq))
    }

    proptest! {
        #[test]
        fn prop_order_is_antisymmetric(a in arb_key(), b in arb_key()) {
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
            if a.cmp(&b) == Ordering::Equal {
                prop_assert_eq!(a, b);
            }
        }

        #[test]
        fn prop_order_is_transitive(a in arb_key(), b in arb_key(), c in arb_key()) {
            if a <= b && b <= c {
                prop_assert!(a <= c);
            }
        }

        #[test]
        fn prop_distinct_ids_never_equal(a in arb_key(), b in arb_key()) {
            prop_assume!(a.activity_id != b.activity_id);
            prop_assert_ne!(a.cmp(&b), Ordering::Equal);
        }
    }
}
