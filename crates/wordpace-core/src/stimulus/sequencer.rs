//! Constrained stimulus sequencing.
//!
//! Turns the static catalog into one trial order per participant:
//!
//! 1. Items with a comprehension question ("paired") are shuffled once.
//! 2. The remaining ("plain") items are reshuffled until no condition label
//!    repeats more than `max_consecutive_repeat` times in a row, or the attempt
//!    budget runs out (then the last attempt is kept and a warning is logged).
//! 3. A cursor walks the combined length. At each insertion offset a paired
//!    item and its question row are emitted; everywhere else the next plain
//!    item. Paired items left over when plain items run out are appended.
//!
//! All randomness comes from one `Pcg64` stream seeded from the participant
//! id, so the same participant always gets the same order.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use super::catalog::{StimulusCatalog, StimulusItem};
use super::trial_list::{SequencedTrial, TrialList};
use super::{QUESTION_CONDITION_CODE, QUESTION_ID_PREFIX};
use crate::error::Result;
use crate::participant::ParticipantId;
use crate::storage::{Config, SequencingConfig};

/// Seed for the sequencing RNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceSeed(pub u64);

impl SequenceSeed {
    /// Derive a stable seed from a participant id.
    ///
    /// Uses the first 8 bytes of the SHA-256 digest, so the value does not
    /// depend on the platform or the Rust version.
    pub fn from_participant(participant: &ParticipantId) -> Self {
        let digest = Sha256::digest(participant.as_str().as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Self(u64::from_le_bytes(bytes))
    }
}

/// Fixed sequencing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerParams {
    pub question_interval: usize,
    pub max_consecutive_repeat: usize,
    pub max_shuffle_attempts: usize,
}

impl Default for SequencerParams {
    fn default() -> Self {
        Self {
            question_interval: 26,
            max_consecutive_repeat: 1,
            max_shuffle_attempts: 1000,
        }
    }
}

impl From<&SequencingConfig> for SequencerParams {
    fn from(cfg: &SequencingConfig) -> Self {
        Self {
            question_interval: cfg.question_interval,
            max_consecutive_repeat: cfg.max_consecutive_repeat,
            max_shuffle_attempts: cfg.max_shuffle_attempts,
        }
    }
}

/// Result of one sequencing run.
#[derive(Debug, Clone)]
pub struct SequenceOutcome {
    pub trials: TrialList,
    pub seed: SequenceSeed,
    /// Plain-subset shuffles drawn before one was accepted.
    pub attempts: usize,
    /// False when the attempt budget ran out and the last shuffle was kept.
    pub constraint_satisfied: bool,
}

/// Builds and persists trial orders.
#[derive(Debug, Clone)]
pub struct StimulusSequencer {
    params: SequencerParams,
    order_dir: PathBuf,
    seed_override: Option<u64>,
}

impl StimulusSequencer {
    pub fn new(params: SequencerParams, order_dir: impl Into<PathBuf>) -> Self {
        Self {
            params,
            order_dir: order_dir.into(),
            seed_override: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            params: SequencerParams::from(&config.sequencing),
            order_dir: config.paths.order_dir.clone(),
            seed_override: config.sequencing.seed,
        }
    }

    /// Use a fixed seed instead of the participant-derived one.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_override = Some(seed);
        self
    }

    pub fn params(&self) -> &SequencerParams {
        &self.params
    }

    /// Path of the persisted order for a participant.
    pub fn order_path(&self, participant: &ParticipantId) -> PathBuf {
        self.order_dir
            .join(format!("{}_randomized_list.csv", participant.as_str()))
    }

    pub fn seed_for(&self, participant: &ParticipantId) -> SequenceSeed {
        self.seed_override
            .map(SequenceSeed)
            .unwrap_or_else(|| SequenceSeed::from_participant(participant))
    }

    /// Return the persisted order for `participant`, creating it on first use.
    ///
    /// An existing order is authoritative: it is loaded as-is and the catalog
    /// is not even read.
    ///
    /// # Errors
    ///
    /// Configuration errors if the catalog or the persisted order is missing
    /// or malformed.
    pub fn load_or_create(&self, participant: &ParticipantId, catalog_path: &Path) -> Result<TrialList> {
        let path = self.order_path(participant);
        if path.exists() {
            let list = TrialList::load(&path)?;
            tracing::info!(
                participant = %participant,
                trials = list.len(),
                path = %path.display(),
                "Loaded persisted trial order"
            );
            return Ok(list);
        }

        let catalog = StimulusCatalog::load(catalog_path)?;
        let outcome = self.sequence(&catalog, self.seed_for(participant));
        outcome.trials.save_new(&path)?;
        tracing::info!(
            participant = %participant,
            trials = outcome.trials.len(),
            attempts = outcome.attempts,
            seed = outcome.seed.0,
            path = %path.display(),
            "Trial order saved"
        );
        Ok(outcome.trials)
    }

    /// Sequence a catalog. Pure: nothing is written.
    pub fn sequence(&self, catalog: &StimulusCatalog, seed: SequenceSeed) -> SequenceOutcome {
        let mut rng = Pcg64::seed_from_u64(seed.0);
        let (mut paired, plain): (Vec<&StimulusItem>, Vec<&StimulusItem>) =
            catalog.items().iter().partition(|item| item.has_question());

        paired.shuffle(&mut rng);

        let budget = self.params.max_shuffle_attempts.max(1);
        let mut shuffled_plain = plain.clone();
        let mut attempts = 0;
        let mut constraint_satisfied = false;
        while attempts < budget {
            attempts += 1;
            shuffled_plain.clone_from(&plain);
            shuffled_plain.shuffle(&mut rng);
            let run = longest_condition_run(shuffled_plain.iter().map(|i| i.condition.as_str()));
            if run <= self.params.max_consecutive_repeat {
                constraint_satisfied = true;
                break;
            }
        }
        if !constraint_satisfied {
            tracing::warn!(
                attempts,
                max_consecutive_repeat = self.params.max_consecutive_repeat,
                "Could not find a shuffle without condition clusters; using last attempt"
            );
        }

        let total = catalog.len() + paired.len();
        let offsets = insertion_offsets(total, self.params.question_interval);
        let mut rows: Vec<SequencedTrial> = Vec::with_capacity(total);
        let mut paired = paired.into_iter();
        let mut plain = shuffled_plain.into_iter();
        let mut cursor = 0;
        let mut next_offset = 0;

        while rows.len() < total {
            if offsets.get(next_offset) == Some(&cursor) {
                if let Some(item) = paired.next() {
                    push_pair(&mut rows, item);
                    cursor += 2;
                    next_offset += 1;
                    continue;
                }
            }

            if let Some(item) = plain.next() {
                push_row(&mut rows, item);
                cursor += 1;
            } else if let Some(item) = paired.next() {
                push_pair(&mut rows, item);
                cursor += 2;
            } else {
                break;
            }
        }

        let trials = TrialList::from_sequenced(rows);
        SequenceOutcome {
            trials,
            seed,
            attempts,
            constraint_satisfied,
        }
    }
}

/// Cursor positions at which a paired item is inserted.
pub fn insertion_offsets(total: usize, question_interval: usize) -> Vec<usize> {
    if question_interval == 0 {
        return Vec::new();
    }
    (question_interval..total)
        .step_by(question_interval + 2)
        .collect()
}

/// Length of the longest run of identical adjacent labels.
pub fn longest_condition_run<'a>(labels: impl IntoIterator<Item = &'a str>) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<&str> = None;
    for label in labels {
        current = if previous == Some(label) { current + 1 } else { 1 };
        longest = longest.max(current);
        previous = Some(label);
    }
    longest
}

fn push_row(rows: &mut Vec<SequencedTrial>, item: &StimulusItem) {
    let trial_num = rows.len() as u32 + 1;
    rows.push(SequencedTrial {
        trial_num,
        id: item.id.clone(),
        condition: item.condition.clone(),
        condition_code: item.condition_code,
        word_count: item.word_count,
        target_word: item.target_word.clone(),
        sentence: item.sentence.clone(),
        correct_answer: String::new(),
    });
}

fn push_pair(rows: &mut Vec<SequencedTrial>, item: &StimulusItem) {
    push_row(rows, item);
    let trial_num = rows.len() as u32 + 1;
    rows.push(SequencedTrial {
        trial_num,
        id: format!("{QUESTION_ID_PREFIX}{}", item.id),
        condition: item.condition.clone(),
        condition_code: QUESTION_CONDITION_CODE,
        word_count: item.word_count,
        target_word: item.target_word.clone(),
        sentence: item.question.clone(),
        correct_answer: item.correct_answer.clone(),
    });
}
