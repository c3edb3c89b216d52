//! Mergeable documents for Shroud metadata.
//!
//! A [`Document`] is a last-writer-wins map from string keys to JSON values.
//! Versions are diffed into opaque change records, records replay
//! deterministically from an empty document, and replaying the same records
//! in any order (or more than once) converges to the same state.
//!
//! Change records are grouped into change-sets with [`pack_changes`] before
//! being encrypted into a DAG vertex.

pub mod change;
pub mod changeset;
pub mod diff;
pub mod document;
pub mod error;

pub use change::{Change, ChangeRecord, Op, Stamp};
pub use changeset::{pack_changes, unpack_changes};
pub use diff::{diff_states, State, StateChange, StateDiff};
pub use document::Document;
pub use error::{DocError, DocResult};
