use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::{StateChange, StateDiff};
use crate::error::{DocError, DocResult};

/// An opaque, encoded [`Change`].
pub type ChangeRecord = Vec<u8>;

/// Lamport-style stamp ordering every change.
///
/// Stamps compare by counter, then by actor, so any two distinct writers
/// agree on which of two stamps is greater.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub counter: u64,
    pub actor: String,
}

impl Ord for Stamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter
            .cmp(&other.counter)
            .then_with(|| self.actor.cmp(&other.actor))
    }
}

impl PartialOrd for Stamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A single key operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Op {
    Put { key: String, value: Value },
    Delete { key: String },
}

impl Op {
    pub fn key(&self) -> &str {
        match self {
            Op::Put { key, .. } | Op::Delete { key } => key,
        }
    }
}

/// One atomic set of operations written by one actor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub stamp: Stamp,
    pub ops: Vec<Op>,
}

impl Change {
    /// Turn a state diff into a change stamped with `stamp`.
    pub fn from_diff(stamp: Stamp, diff: &StateDiff) -> Self {
        let ops = diff
            .changes
            .iter()
            .map(|c| match c {
                StateChange::Added { key, value } | StateChange::Modified { key, new: value } => {
                    Op::Put {
                        key: key.clone(),
                        value: value.clone(),
                    }
                }
                StateChange::Removed { key } => Op::Delete { key: key.clone() },
            })
            .collect();
        Self { stamp, ops }
    }

    pub fn encode(&self) -> DocResult<ChangeRecord> {
        serde_json::to_vec(self).map_err(|e| DocError::InvalidRecord(e.to_string()))
    }

    pub fn decode(record: &[u8]) -> DocResult<Self> {
        serde_json::from_slice(record).map_err(|e| DocError::InvalidRecord(e.to_string()))
    }
}
