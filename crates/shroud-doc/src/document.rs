use std::collections::{BTreeMap, HashSet};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::change::{Change, ChangeRecord, Op, Stamp};
use crate::diff::{diff_states, State};
use crate::error::{DocError, DocResult};

#[derive(Clone, Debug)]
struct Entry {
    stamp: Stamp,
    /// `None` is a tombstone.
    value: Option<Value>,
}

/// Last-writer-wins map of JSON values.
///
/// Each key holds the value written by the greatest [`Stamp`] seen for it,
/// so applying a set of changes yields the same state in any order, and
/// applying a change twice is a no-op.
#[derive(Clone, Debug)]
pub struct Document {
    actor: String,
    entries: BTreeMap<String, Entry>,
    applied: HashSet<Stamp>,
    history: Vec<ChangeRecord>,
    max_counter: u64,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.state() == other.state()
    }
}

impl Document {
    /// An empty document whose new changes will be stamped with `actor`.
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            entries: BTreeMap::new(),
            applied: HashSet::new(),
            history: Vec::new(),
            max_counter: 0,
        }
    }

    /// Replay `records` in order, starting from an empty document.
    pub fn from_changes<'a, I>(actor: impl Into<String>, records: I) -> DocResult<Self>
    where
        I: IntoIterator<Item = &'a ChangeRecord>,
    {
        let mut doc = Self::new(actor);
        for record in records {
            doc.apply(record)?;
        }
        Ok(doc)
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Records applied so far, in application order.
    pub fn history(&self) -> &[ChangeRecord] {
        &self.history
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|e| e.value.is_none())
    }

    /// Live keys and values.
    pub fn state(&self) -> State {
        self.entries
            .iter()
            .filter_map(|(k, e)| e.value.clone().map(|v| (k.clone(), v)))
            .collect()
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).and_then(|e| e.value.as_ref())
    }

    /// Read one key as a typed value.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> DocResult<Option<T>> {
        self.get_value(key)
            .map(|v| serde_json::from_value(v.clone()).map_err(|e| DocError::Type(e.to_string())))
            .transpose()
    }

    /// Read the whole document as a typed value (the state as a JSON object).
    pub fn to_typed<T: DeserializeOwned>(&self) -> DocResult<T> {
        let object: serde_json::Map<String, Value> = self.state().into_iter().collect();
        serde_json::from_value(Value::Object(object)).map_err(|e| DocError::Type(e.to_string()))
    }

    /// Apply one record. Returns `false` if it had already been applied.
    pub fn apply(&mut self, record: &[u8]) -> DocResult<bool> {
        let change = Change::decode(record)?;
        if !self.applied.insert(change.stamp.clone()) {
            return Ok(false);
        }
        self.max_counter = self.max_counter.max(change.stamp.counter);
        for op in change.ops {
            let (key, value) = match op {
                Op::Put { key, value } => (key, Some(value)),
                Op::Delete { key } => (key, None),
            };
            match self.entries.get_mut(&key) {
                Some(entry) if entry.stamp >= change.stamp => {}
                Some(entry) => {
                    entry.stamp = change.stamp.clone();
                    entry.value = value;
                }
                None => {
                    self.entries.insert(
                        key,
                        Entry {
                            stamp: change.stamp.clone(),
                            value,
                        },
                    );
                }
            }
        }
        self.history.push(record.to_vec());
        Ok(true)
    }

    /// Records that turn this document's state into `target`.
    ///
    /// Returns no records when the states are equal; otherwise a single
    /// record stamped after every change seen so far.
    pub fn diff_to(&self, target: &State) -> DocResult<Vec<ChangeRecord>> {
        let diff = diff_states(&self.state(), target);
        if diff.is_empty() {
            return Ok(Vec::new());
        }
        let stamp = Stamp {
            counter: self.max_counter + 1,
            actor: self.actor.clone(),
        };
        Ok(vec![Change::from_diff(stamp, &diff).encode()?])
    }

    /// Run `mutator` on a copy of the state and return the resulting
    /// document together with the records describing the change.
    pub fn change<F>(&self, mutator: F) -> DocResult<(Document, Vec<ChangeRecord>)>
    where
        F: FnOnce(&mut State),
    {
        let mut target = self.state();
        mutator(&mut target);
        let records = self.diff_to(&target)?;
        let mut next = self.clone();
        for record in &records {
            next.apply(record)?;
        }
        Ok((next, records))
    }

    /// Set a key from any serializable value.
    pub fn put<T: Serialize>(state: &mut State, key: &str, value: &T) -> DocResult<()> {
        let value = serde_json::to_value(value).map_err(|e| DocError::Type(e.to_string()))?;
        state.insert(key.to_string(), value);
        Ok(())
    }

    /// Replay every change of `other` that this document has not seen.
    pub fn merge(&mut self, other: &Document) -> DocResult<()> {
        for record in other.history() {
            self.apply(record)?;
        }
        Ok(())
    }
}
