//! Static stimulus catalog.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::QUESTION_ID_PREFIX;
use crate::error::{ConfigError, Result};

/// One authored stimulus. Items with a non-blank question are "paired" and
/// expand into two trials when sequenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimulusItem {
    pub id: String,
    pub condition: String,
    pub condition_code: u32,
    pub sentence: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub correct_answer: String,
    pub word_count: u32,
    #[serde(default)]
    pub target_word: String,
}

impl StimulusItem {
    pub fn has_question(&self) -> bool {
        !self.question.trim().is_empty()
    }
}

/// The full, validated catalog. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct StimulusCatalog {
    items: Vec<StimulusItem>,
}

impl StimulusCatalog {
    /// Load and validate a catalog CSV.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is missing, a row cannot be
    /// decoded, or the catalog violates an invariant (duplicate ids, empty
    /// sentences, reserved id prefix).
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut items = Vec::new();
        for (index, row) in reader.deserialize::<StimulusItem>().enumerate() {
            let item = row.map_err(|e| ConfigError::MalformedRow {
                path: path.to_path_buf(),
                row: index + 1,
                message: e.to_string(),
            })?;
            items.push(item);
        }

        Self::from_items(items).map_err(|(row, message)| {
            ConfigError::MalformedRow {
                path: path.to_path_buf(),
                row,
                message,
            }
            .into()
        })
    }

    /// Build a catalog from items already in memory.
    ///
    /// On failure returns the 1-based offending row and a message.
    pub fn from_items(items: Vec<StimulusItem>) -> Result<Self, (usize, String)> {
        let mut seen = HashSet::new();
        for (index, item) in items.iter().enumerate() {
            let row = index + 1;
            if item.id.is_empty() {
                return Err((row, "empty id".into()));
            }
            if item.id.starts_with(QUESTION_ID_PREFIX) {
                return Err((
                    row,
                    format!("id '{}' uses reserved prefix '{QUESTION_ID_PREFIX}'", item.id),
                ));
            }
            if !seen.insert(item.id.as_str()) {
                return Err((row, format!("duplicate id '{}'", item.id)));
            }
            if item.sentence.trim().is_empty() {
                return Err((row, format!("item '{}' has an empty sentence", item.id)));
            }
        }
        Ok(Self { items })
    }

    pub fn items(&self) -> &[StimulusItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn paired_count(&self) -> usize {
        self.items.iter().filter(|i| i.has_question()).count()
    }
}
