//! State-level diff: compare two document states.
//!
//! States are represented as `BTreeMap<String, serde_json::Value>`. The diff
//! detects key additions, removals, and value modifications.

use std::collections::BTreeMap;

use serde_json::Value;

/// Plain view of a document: live keys and their values.
pub type State = BTreeMap<String, Value>;

/// The result of comparing two states.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateDiff {
    pub changes: Vec<StateChange>,
}

impl StateDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

/// A single change in a state map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateChange {
    Added { key: String, value: Value },
    Removed { key: String },
    Modified { key: String, new: Value },
}

/// Compute the diff between two states.
///
/// Keys present only in `new` are `Added`, keys present only in `old` are
/// `Removed`, and keys present in both with different values are `Modified`.
/// Changes come out in key order.
pub fn diff_states(old: &State, new: &State) -> StateDiff {
    let mut changes = Vec::new();

    for (key, old_val) in old {
        match new.get(key) {
            Some(new_val) if new_val != old_val => changes.push(StateChange::Modified {
                key: key.clone(),
                new: new_val.clone(),
            }),
            Some(_) => {}
            None => changes.push(StateChange::Removed { key: key.clone() }),
        }
    }

    for (key, new_val) in new {
        if !old.contains_key(key) {
            changes.push(StateChange::Added {
                key: key.clone(),
                value: new_val.clone(),
            });
        }
    }

    changes.sort_by(|a, b| a.key().cmp(b.key()));
    StateDiff { changes }
}

impl StateChange {
    pub fn key(&self) -> &str {
        match self {
            StateChange::Added { key, .. }
            | StateChange::Removed { key }
            | StateChange::Modified { key, .. } => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(pairs: &[(&str, Value)]) -> State {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn identical_states_have_empty_diff() {
        let s = state(&[("a", json!(1)), ("b", json!({"x": [1, 2]}))]);
        assert!(diff_states(&s, &s).is_empty());
    }

    #[test]
    fn detects_all_change_kinds_in_key_order() {
        let old = state(&[("a", json!(1)), ("b", json!(2))]);
        let new = state(&[("b", json!(3)), ("c", json!(4))]);
        let diff = diff_states(&old, &new);
        assert_eq!(
            diff.changes,
            vec![
                StateChange::Removed { key: "a".into() },
                StateChange::Modified {
                    key: "b".into(),
                    new: json!(3)
                },
                StateChange::Added {
                    key: "c".into(),
                    value: json!(4)
                },
            ]
        );
    }
}
