use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::meta::FileMeta;

/// Wall-clock span of a finished transfer.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferTimings {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Time spent transferring, pauses excluded.
    pub duration: Duration,
    pub real_duration: Duration,
}

/// Progress notifications published by a running transfer.
#[derive(Clone, Debug, PartialEq)]
pub enum TransferEvent {
    Metadata(FileMeta),
    Started { blocks: u64, parts: u64 },
    PartStarted { index: u64 },
    PartFinished { index: u64 },
    BlockStarted { index: u64 },
    BlockFinished { index: u64 },
    /// Fraction of blocks done, in `0.0..=1.0`.
    Progress { fraction: f64 },
    Finished(TransferTimings),
}
