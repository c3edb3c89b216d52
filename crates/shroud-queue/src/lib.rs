//! Ordered queue: run work concurrently, commit results in order.
//!
//! [`OrderedQueue`] runs up to `concurrency` workers at a time. Workers may
//! finish in any order, but each result is handed to its committer strictly
//! in sequence order, one committer at a time. Additions wait while the
//! queue is more than `window` sequences ahead of the last commit, which
//! bounds the memory held by finished-but-uncommitted results.
//!
//! The upload and download pipelines are built from two or three of these
//! queues chained together.

pub mod error;
pub mod queue;

pub use error::{CommitError, QueueError, QueueResult};
pub use queue::OrderedQueue;
