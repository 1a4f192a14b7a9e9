//! Stimulus catalog, persisted trial orders and the sequencer that links them.

mod catalog;
mod sequencer;
mod trial_list;

pub use catalog::{StimulusCatalog, StimulusItem};
pub use sequencer::{
    insertion_offsets, longest_condition_run, SequenceOutcome, SequenceSeed, SequencerParams,
    StimulusSequencer,
};
pub use trial_list::{SequencedTrial, TrialList};

/// Condition code carried by synthesized question rows.
pub const QUESTION_CONDITION_CODE: u32 = 50;

/// Id prefix of synthesized question rows.
pub const QUESTION_ID_PREFIX: &str = "Q_";
