//! Chain resolver for identity histories.
//!
//! Orders the actions of one identity from most to least recent. An explicit
//! parent link always wins: an action that names another as its parent sorts
//! before it. Without a link, unconfirmed actions sort before confirmed ones
//! and confirmed actions sort by descending block height. Remaining ties keep
//! input order.
//!
//! [`compare_recency`] is that rule for a pair of actions. [`order_history`]
//! applies it to a whole history as a topological pass over the parent links,
//! picking among the unlinked candidates with the same rank the comparator
//! uses. A comparison sort would not do, since the pairwise relation is not
//! transitive once links and heights disagree.
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use tracing::debug;

use crate::types::{Action, TxHash};

/// Pairwise recency of two actions of the same identity.
///
/// `Ordering::Less` means `a` is more recent than `b` and sorts first.
pub fn compare_recency(a: &Action, b: &Action) -> Ordering {
    if a.parent_hash == Some(b.tx_hash) {
        return Ordering::Less;
    }
    if b.parent_hash == Some(a.tx_hash) {
        return Ordering::Greater;
    }
    recency_rank(a).cmp(&recency_rank(b))
}

/// Rank of an action with no parent link to decide: unconfirmed first, then
/// higher block. Lower ranks are more recent.
fn recency_rank(action: &Action) -> (bool, Reverse<u64>) {
    let height = action.block.map(|block| block.height).unwrap_or(0);
    (action.is_confirmed(), Reverse(height))
}

/// Recency rank, then input position.
type ReadyKey = Reverse<((bool, Reverse<u64>), usize)>;

fn ready_key(action: &Action, index: usize) -> ReadyKey {
    Reverse((recency_rank(action), index))
}

/// Orders a history from most to least recent.
///
/// An action is emitted only once every action naming it as parent has been
/// emitted. Among the actions ready at each step the unconfirmed ones come
/// first, then the higher blocks. Parent cycles are broken by emitting the
/// best remaining action.
pub fn order_history<T: AsRef<Action>>(actions: Vec<T>) -> Vec<T> {
    let len = actions.len();
    let mut by_hash: HashMap<TxHash, usize> = HashMap::with_capacity(len);
    for (index, action) in actions.iter().enumerate() {
        by_hash.entry(action.as_ref().tx_hash).or_insert(index);
    }

    let parents: Vec<Option<usize>> = actions
        .iter()
        .enumerate()
        .map(|(index, action)| {
            action
                .as_ref()
                .parent_hash
                .and_then(|parent| by_hash.get(&parent).copied())
                .filter(|parent| *parent != index)
        })
        .collect();

    let mut pending_children = vec![0usize; len];
    for parent in parents.iter().flatten() {
        pending_children[*parent] += 1;
    }

    let mut ready: BinaryHeap<ReadyKey> = actions
        .iter()
        .enumerate()
        .filter(|(index, _)| pending_children[*index] == 0)
        .map(|(index, action)| ready_key(action.as_ref(), index))
        .collect();

    let mut slots: Vec<Option<T>> = actions.into_iter().map(Some).collect();
    let mut emitted = vec![false; len];
    let mut ordered = Vec::with_capacity(len);

    while ordered.len() < len {
        let index = match ready.pop() {
            Some(Reverse((_, index))) => index,
            None => {
                // Every remaining action still waits on a child: a parent cycle.
                let Some(Reverse((_, index))) = slots
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| !emitted[*index])
                    .filter_map(|(index, slot)| {
                        slot.as_ref().map(|action| ready_key(action.as_ref(), index))
                    })
                    .max()
                else {
                    break;
                };
                debug!(remaining = len - ordered.len(), "breaking parent cycle");
                index
            }
        };
        if emitted[index] {
            continue;
        }
        emitted[index] = true;

        if let Some(parent) = parents[index] {
            pending_children[parent] = pending_children[parent].saturating_sub(1);
            if pending_children[parent] == 0 && !emitted[parent] {
                if let Some(action) = slots[parent].as_ref() {
                    ready.push(ready_key(action.as_ref(), parent));
                }
            }
        }
        if let Some(action) = slots[index].take() {
            ordered.push(action);
        }
    }

    ordered
}

/// The current value of a history: its most recent action.
pub fn resolve_head<T: AsRef<Action>>(actions: Vec<T>) -> Option<T> {
    order_history(actions).into_iter().next()
}

#[cfg(test)]
mod tests {
    use bitcoin::hashes::Hash as _;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::types::{ActionPayload, BlockRef, Identity};

    fn hash(byte: u8) -> TxHash {
        TxHash::from_byte_array([byte; 32])
    }

    fn set_name(tx: u8, parent: Option<u8>, height: Option<u64>) -> Action {
        Action {
            tx_hash: hash(tx),
            parent_hash: parent.map(hash),
            identity: Identity::from_byte_array([9u8; 20]),
            raw_script: vec![],
            payload: ActionPayload::SetName {
                name: format!("name-{tx}"),
            },
            block: height.map(|height| BlockRef {
                height,
                timestamp: Utc.timestamp_opt(1_500_000_000 + height as i64, 0).unwrap(),
            }),
        }
    }

    fn tx_order(actions: &[Action]) -> Vec<TxHash> {
        actions.iter().map(|action| action.tx_hash).collect()
    }

    #[test]
    fn test_direct_supersession_beats_height() {
        let a = set_name(1, Some(2), Some(10));
        let b = set_name(2, None, Some(500));
        assert_eq!(compare_recency(&a, &b), Ordering::Less);
        assert_eq!(compare_recency(&b, &a), Ordering::Greater);
        assert_eq!(resolve_head(vec![b.clone(), a.clone()]), Some(a.clone()));
        assert_eq!(resolve_head(vec![a.clone(), b]), Some(a));
    }

    #[test]
    fn test_unconfirmed_is_more_recent_than_confirmed() {
        let confirmed = set_name(1, None, Some(100));
        let unconfirmed = set_name(2, None, None);
        assert_eq!(compare_recency(&unconfirmed, &confirmed), Ordering::Less);
        assert_eq!(
            resolve_head(vec![confirmed, unconfirmed.clone()]),
            Some(unconfirmed)
        );
    }

    #[test]
    fn test_higher_block_is_more_recent() {
        let c1 = set_name(1, None, Some(50));
        let c2 = set_name(2, None, Some(80));
        assert_eq!(compare_recency(&c2, &c1), Ordering::Less);
        assert_eq!(resolve_head(vec![c1, c2.clone()]), Some(c2));
    }

    #[test]
    fn test_unconfirmed_pair_keeps_input_order() {
        let u1 = set_name(1, None, None);
        let u2 = set_name(2, None, None);
        assert_eq!(compare_recency(&u1, &u2), Ordering::Equal);
        let ordered = order_history(vec![u1.clone(), u2.clone()]);
        assert_eq!(tx_order(&ordered), vec![hash(1), hash(2)]);
    }

    #[test]
    fn test_chain_with_stale_heights_follows_links() {
        // 3 -> 2 -> 1 by parent links, heights say the opposite.
        let first = set_name(1, None, Some(300));
        let second = set_name(2, Some(1), Some(200));
        let third = set_name(3, Some(2), Some(100));
        let unrelated = set_name(4, None, Some(250));
        let ordered = order_history(vec![first, unrelated, second, third]);
        assert_eq!(
            tx_order(&ordered),
            vec![hash(4), hash(3), hash(2), hash(1)]
        );
    }

    #[test]
    fn test_competing_children_both_precede_parent() {
        let root = set_name(1, None, Some(10));
        let low = set_name(2, Some(1), Some(20));
        let pending = set_name(3, Some(1), None);
        let ordered = order_history(vec![root, low, pending]);
        assert_eq!(tx_order(&ordered), vec![hash(3), hash(2), hash(1)]);
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let history = vec![
            set_name(1, None, Some(5)),
            set_name(2, Some(1), None),
            set_name(3, None, None),
            set_name(4, Some(9), Some(7)),
            set_name(5, Some(3), Some(7)),
        ];
        let first = order_history(history.clone());
        for _ in 0..10 {
            assert_eq!(order_history(history.clone()), first);
        }
        assert_eq!(first.len(), history.len());
    }

    #[test]
    fn test_parent_cycle_still_emits_everything() {
        let a = set_name(1, Some(2), Some(10));
        let b = set_name(2, Some(1), Some(20));
        let c = set_name(3, None, Some(5));
        let ordered = order_history(vec![a, b, c]);
        assert_eq!(tx_order(&ordered), vec![hash(3), hash(2), hash(1)]);
    }

    #[test]
    fn test_order_agrees_with_pairwise_rule_when_links_and_heights_agree() {
        let history = vec![
            set_name(1, None, Some(10)),
            set_name(2, Some(1), Some(30)),
            set_name(3, None, Some(20)),
            set_name(4, Some(2), None),
            set_name(5, None, Some(30)),
            set_name(6, Some(3), Some(40)),
        ];
        let ordered = order_history(history);
        for pair in ordered.windows(2) {
            assert_ne!(
                compare_recency(&pair[0], &pair[1]),
                Ordering::Greater,
                "{} sorted before {}",
                pair[0].tx_hash,
                pair[1].tx_hash
            );
        }
        assert_eq!(
            tx_order(&ordered),
            vec![hash(4), hash(6), hash(2), hash(5), hash(3), hash(1)]
        );
    }

    #[test]
    fn test_resolve_head_of_empty_history() {
        assert_eq!(resolve_head(Vec::<Action>::new()), None);
    }

    #[test]
    fn test_orders_borrowed_actions() {
        let c1 = set_name(1, None, Some(50));
        let c2 = set_name(2, None, Some(80));
        let history = vec![&c1, &c2];
        assert_eq!(resolve_head(history), Some(&c2));
    }
}
