//! Durable per-participant event journal.
//!
//! Two append-only CSV streams (trial outcomes and word onsets), each row
//! synced to disk before the timeline moves on. A crashed session can be
//! resumed from the largest trial number found in its trial artifact.

mod entry;
mod recovery;
mod stream;
mod writer;

pub use entry::{
    format_elapsed, ControlMarker, EventTime, JournalRow, MarkerKind, TimelineEvent, TrialRecord,
    TrialRow, WordEvent, WordRow, TRIAL_HEADER, WORD_HEADER,
};
pub use recovery::{scan_candidates, scan_trial_artifact, RecoveryScan, SkippedRow};
pub use stream::EventStream;
pub use writer::{inspect, JournalPaths, SessionJournal, SessionSummary};
