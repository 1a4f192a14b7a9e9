//! Persisted per-participant trial order.

use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use super::QUESTION_ID_PREFIX;
use crate::error::{ConfigError, Result};

/// One row of the sequenced order. Column order matches the persisted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedTrial {
    pub trial_num: u32,
    pub id: String,
    pub condition: String,
    pub condition_code: u32,
    pub word_count: u32,
    #[serde(default)]
    pub target_word: String,
    pub sentence: String,
    #[serde(default)]
    pub correct_answer: String,
}

impl SequencedTrial {
    /// Question rows are synthesized by the sequencer and carry the `Q_` prefix.
    pub fn is_question(&self) -> bool {
        self.id.starts_with(QUESTION_ID_PREFIX)
    }

    /// Id of the stimulus this row was derived from.
    pub fn parent_id(&self) -> &str {
        self.id.strip_prefix(QUESTION_ID_PREFIX).unwrap_or(&self.id)
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.sentence.split_whitespace()
    }
}

/// An ordered, dense (1..N) list of trials.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrialList {
    trials: Vec<SequencedTrial>,
}

impl TrialList {
    /// Wrap trials, checking that numbering is dense and starts at 1.
    pub fn new(trials: Vec<SequencedTrial>) -> Result<Self, String> {
        for (index, trial) in trials.iter().enumerate() {
            let expected = index as u32 + 1;
            if trial.trial_num != expected {
                return Err(format!(
                    "expected trial_num {expected}, found {}",
                    trial.trial_num
                ));
            }
        }
        Ok(Self { trials })
    }

    /// Trials numbered by the sequencer itself.
    pub(crate) fn from_sequenced(trials: Vec<SequencedTrial>) -> Self {
        debug_assert!(trials
            .iter()
            .enumerate()
            .all(|(i, t)| t.trial_num as usize == i + 1));
        Self { trials }
    }

    pub fn trials(&self) -> &[SequencedTrial] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn into_trials(self) -> Vec<SequencedTrial> {
        self.trials
    }

    /// Load a persisted order.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, a row is
    /// malformed, or the numbering is not dense.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut trials = Vec::new();
        for (index, row) in reader.deserialize::<SequencedTrial>().enumerate() {
            let trial = row.map_err(|e| ConfigError::MalformedRow {
                path: path.to_path_buf(),
                row: index + 1,
                message: e.to_string(),
            })?;
            trials.push(trial);
        }

        let list = Self::new(trials).map_err(|message| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(list)
    }

    /// Persist to a path that must not exist yet.
    ///
    /// The list is written to a sibling temporary file, synced, then moved
    /// into place, so a crash never leaves a half-written order behind.
    pub fn save_new(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };

        if path.exists() {
            return Err(save_failed("a trial order already exists for this participant".into()).into());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }

        let tmp = path.with_extension("csv.tmp");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)
            .map_err(|e| save_failed(e.to_string()))?;

        let mut writer = csv::Writer::from_writer(file);
        for trial in &self.trials {
            writer.serialize(trial).map_err(|e| save_failed(e.to_string()))?;
        }
        let mut file = writer
            .into_inner()
            .map_err(|e| save_failed(e.to_string()))?;
        file.flush().map_err(|e| save_failed(e.to_string()))?;
        file.sync_all().map_err(|e| save_failed(e.to_string()))?;
        drop(file);

        fs::rename(&tmp, path).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stimulus::QUESTION_CONDITION_CODE;

    fn trial(num: u32, id: &str) -> SequencedTrial {
        SequencedTrial {
            trial_num: num,
            id: id.into(),
            condition: "A".into(),
            condition_code: 11,
            word_count: 2,
            target_word: "x".into(),
            sentence: "two words".into(),
            correct_answer: String::new(),
        }
    }

    #[test]
    fn rejects_gaps() {
        assert!(TrialList::new(vec![trial(1, "a"), trial(3, "b")]).is_err());
        assert!(TrialList::new(vec![trial(2, "a")]).is_err());
        assert!(TrialList::new(vec![trial(1, "a"), trial(2, "b")]).is_ok());
    }

    #[test]
    fn save_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders").join("p1_randomized_list.csv");
        let mut question = trial(2, "Q_a");
        question.condition_code = QUESTION_CONDITION_CODE;
        question.sentence = "Is it, really?".into();
        question.correct_answer = "n".into();
        let list = TrialList::new(vec![trial(1, "a"), question]).unwrap();

        list.save_new(&path).unwrap();
        let loaded = TrialList::load(&path).unwrap();
        assert_eq!(loaded, list);
        assert!(loaded.trials()[1].is_question());
        assert_eq!(loaded.trials()[1].parent_id(), "a");
        assert_eq!(loaded.trials()[1].condition_code, QUESTION_CONDITION_CODE);
    }

    #[test]
    fn save_new_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p1_randomized_list.csv");
        let list = TrialList::new(vec![trial(1, "a")]).unwrap();
        list.save_new(&path).unwrap();
        assert!(list.save_new(&path).is_err());
    }

    #[test]
    fn persisted_header_matches_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p1.csv");
        TrialList::new(vec![trial(1, "a")])
            .unwrap()
            .save_new(&path)
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(
            header,
            "trial_num,id,condition,condition_code,word_count,target_word,sentence,correct_answer"
        );
    }
}
