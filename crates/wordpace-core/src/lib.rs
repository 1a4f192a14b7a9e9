//! # Wordpace Core Library
//!
//! Core logic for word-by-word sentence reading experiments: constrained
//! stimulus sequencing, a crash-safe event journal, and the trial timeline
//! that presents sentences one word at a time while sending trigger codes to
//! recording equipment. The `wordpace` CLI is a thin terminal front-end over
//! this crate.
//!
//! ## Architecture
//!
//! - **Stimulus**: catalog loading and per-participant sequencing with a
//!   participant-derived seed, persisted so a participant always sees the
//!   same order
//! - **Journal**: two append-only CSV streams synced after every row, with
//!   startup recovery and a finalization step that runs on every exit path
//! - **Timeline**: the trial state machine, driven by an injectable [`Clock`]
//! - **Collaborators**: traits for the display, keyboard, trigger port and
//!   operator prompt, plus headless implementations
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`StimulusSequencer`]: builds or loads a participant's trial order
//! - [`SessionJournal`]: durable event recording and recovery
//! - [`TrialTimelineController`]: per-trial presentation schedule
//! - [`run_session`]: ties everything together for one participant

pub mod collab;
pub mod error;
pub mod journal;
pub mod participant;
pub mod session;
pub mod stimulus;
pub mod storage;
pub mod timeline;

pub use collab::{IdentityPrompt, InputSource, Presenter, Screen, SessionContext, TriggerSink};
pub use error::{ConfigError, CoreError, JournalError};
pub use journal::{RecoveryScan, SessionJournal, TimelineEvent};
pub use participant::ParticipantId;
pub use session::{run_session, AbortReason, SessionOutcome, SessionReport};
pub use stimulus::{StimulusCatalog, StimulusSequencer, TrialList};
pub use storage::Config;
pub use timeline::{Clock, ManualClock, SystemClock, TrialTimelineController};
