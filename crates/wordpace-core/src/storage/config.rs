//! TOML-based experiment configuration.
//!
//! Stores everything an operator may tune between studies:
//! - Catalog and artifact locations
//! - Sequencing parameters (question spacing, clustering limits, seed)
//! - Presentation timing and trigger codes
//! - Key bindings, block count and recovery routing
//! - On-screen texts
//!
//! Configuration is stored at `~/.config/wordpace/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::{ConfigError, Result};

/// Where inputs are read from and artifacts are written to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_catalog")]
    pub catalog: PathBuf,
    /// Per-participant trial orders.
    #[serde(default = "default_order_dir")]
    pub order_dir: PathBuf,
    /// Trial and word journals.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

/// Stimulus sequencing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencingConfig {
    #[serde(default = "default_question_interval")]
    pub question_interval: usize,
    #[serde(default = "default_max_consecutive_repeat")]
    pub max_consecutive_repeat: usize,
    #[serde(default = "default_max_shuffle_attempts")]
    pub max_shuffle_attempts: usize,
    /// Fixed seed overriding the participant-derived one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Presentation timing, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_pre_fixation_blank_ms")]
    pub pre_fixation_blank_ms: u64,
    #[serde(default = "default_fixation_ms")]
    pub fixation_ms: u64,
    #[serde(default = "default_post_fixation_blank_ms")]
    pub post_fixation_blank_ms: u64,
    #[serde(default = "default_word_hold_ms")]
    pub word_hold_ms: u64,
    #[serde(default = "default_poll_slice_ms")]
    pub poll_slice_ms: u64,
    /// Slice index after which the word trigger is cleared.
    #[serde(default = "default_word_trigger_clear_slice")]
    pub word_trigger_clear_slice: u64,
    #[serde(default = "default_inter_word_ms")]
    pub inter_word_ms: u64,
    #[serde(default = "default_trigger_pulse_ms")]
    pub trigger_pulse_ms: u64,
}

/// Trigger codes sent to the hardware sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_session_check_code")]
    pub session_check: u8,
    #[serde(default = "default_sentence_onset_code")]
    pub sentence_onset: u8,
    #[serde(default = "default_word_onset_code")]
    pub word_onset: u8,
    #[serde(default = "default_question_onset_code")]
    pub question_onset: u8,
}

/// Key bindings. Names follow the terminal input source (`space`, `escape`, letters).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    #[serde(default = "default_space")]
    pub start: String,
    /// Exactly two answer keys: yes, then no.
    #[serde(default = "default_responses")]
    pub responses: Vec<String>,
    #[serde(default = "default_cancel")]
    pub cancel: String,
    #[serde(default = "default_space")]
    pub resume: String,
    #[serde(default = "default_quit")]
    pub quit: String,
    #[serde(default = "default_space")]
    pub break_continue: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockConfig {
    #[serde(default = "default_block_count")]
    pub count: usize,
}

/// Where a resumed session writes its journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeRouting {
    /// Keep appending to the original artifacts.
    SameArtifact,
    /// Write to separate `<stem><suffix>.csv` artifacts.
    Suffixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_routing")]
    pub routing: ResumeRouting,
    #[serde(default = "default_resume_suffix")]
    pub suffix: String,
}

/// Texts shown to the participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextConfig {
    #[serde(default = "default_instructions")]
    pub instructions: String,
    #[serde(default = "default_fixation_mark")]
    pub fixation: String,
    #[serde(default = "default_question_hint")]
    pub question_hint: String,
    #[serde(default = "default_pause_notice")]
    pub pause: String,
    #[serde(default = "default_break_notice")]
    pub block_break: String,
    #[serde(default = "default_end_notice")]
    pub end: String,
}

/// Experiment configuration.
///
/// Serialized to/from TOML at `~/.config/wordpace/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub sequencing: SequencingConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub triggers: TriggerConfig,
    #[serde(default)]
    pub keys: KeyConfig,
    #[serde(default)]
    pub blocks: BlockConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub texts: TextConfig,
}

// Default functions
fn default_catalog() -> PathBuf {
    PathBuf::from("stimuli.csv")
}
fn default_order_dir() -> PathBuf {
    PathBuf::from("logs_order")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("logs_experiment")
}
fn default_question_interval() -> usize {
    26
}
fn default_max_consecutive_repeat() -> usize {
    1
}
fn default_max_shuffle_attempts() -> usize {
    1000
}
fn default_pre_fixation_blank_ms() -> u64 {
    250
}
fn default_fixation_ms() -> u64 {
    1000
}
fn default_post_fixation_blank_ms() -> u64 {
    100
}
fn default_word_hold_ms() -> u64 {
    450
}
fn default_poll_slice_ms() -> u64 {
    10
}
fn default_word_trigger_clear_slice() -> u64 {
    10
}
fn default_inter_word_ms() -> u64 {
    100
}
fn default_trigger_pulse_ms() -> u64 {
    10
}
fn default_session_check_code() -> u8 {
    255
}
fn default_sentence_onset_code() -> u8 {
    1
}
fn default_word_onset_code() -> u8 {
    100
}
fn default_question_onset_code() -> u8 {
    254
}
fn default_space() -> String {
    "space".into()
}
fn default_responses() -> Vec<String> {
    vec!["n".into(), "o".into()]
}
fn default_cancel() -> String {
    "escape".into()
}
fn default_quit() -> String {
    "q".into()
}
fn default_block_count() -> usize {
    4
}
fn default_routing() -> ResumeRouting {
    ResumeRouting::Suffixed
}
fn default_resume_suffix() -> String {
    "_postcrash".into()
}
fn default_instructions() -> String {
    "Welcome!\n\n\
     In this experiment sentences will be shown one word at a time.\n\n\
     Simply read them silently.\n\n\
     Occasionally a question will appear. Answer with 'N' for yes or 'O' for no.\n\n\
     Press SPACE to begin."
        .into()
}
fn default_fixation_mark() -> String {
    "+".into()
}
fn default_question_hint() -> String {
    "(Press N for yes, O for no)".into()
}
fn default_pause_notice() -> String {
    "PAUSE\nSPACE: continue, Q: quit".into()
}
fn default_break_notice() -> String {
    "Break\nPress SPACE to continue.".into()
}
fn default_end_notice() -> String {
    "The experiment is complete.\n\nThank you!".into()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            order_dir: default_order_dir(),
            log_dir: default_log_dir(),
        }
    }
}

impl Default for SequencingConfig {
    fn default() -> Self {
        Self {
            question_interval: default_question_interval(),
            max_consecutive_repeat: default_max_consecutive_repeat(),
            max_shuffle_attempts: default_max_shuffle_attempts(),
            seed: None,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            pre_fixation_blank_ms: 250,
            fixation_ms: 1000,
            post_fixation_blank_ms: 100,
            word_hold_ms: 450,
            poll_slice_ms: 10,
            word_trigger_clear_slice: 10,
            inter_word_ms: 100,
            trigger_pulse_ms: 10,
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            session_check: 255,
            sentence_onset: 1,
            word_onset: 100,
            question_onset: 254,
        }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            start: default_space(),
            responses: default_responses(),
            cancel: default_cancel(),
            resume: default_space(),
            quit: default_quit(),
            break_continue: default_space(),
        }
    }
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self { count: 4 }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            routing: ResumeRouting::Suffixed,
            suffix: default_resume_suffix(),
        }
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            instructions: default_instructions(),
            fixation: default_fixation_mark(),
            question_hint: default_question_hint(),
            pause: default_pause_notice(),
            block_break: default_break_notice(),
            end: default_end_notice(),
        }
    }
}

impl TimingConfig {
    /// Number of polling slices making up one word hold.
    pub fn word_hold_slices(&self) -> u64 {
        self.word_hold_ms / self.poll_slice_ms.max(1)
    }

    pub fn poll_slice(&self) -> Duration {
        Duration::from_millis(self.poll_slice_ms)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::InvalidValue {
            key: key.to_string(),
            message: "unknown config key".into(),
        };
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                // Optional fields that are unset are absent from the JSON view.
                let existing = obj.get(part).cloned().unwrap_or(serde_json::Value::Null);
                if existing.is_null() && !Self::is_optional_key(key) {
                    return Err(unknown());
                }

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Null => {
                        if value.is_empty() || value == "none" {
                            serde_json::Value::Null
                        } else {
                            let n = value.parse::<u64>().map_err(|_| {
                                invalid(format!("cannot parse '{value}' as number"))
                            })?;
                            serde_json::Value::Number(n.into())
                        }
                    }
                    serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    serde_json::Value::String(_) => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn is_optional_key(key: &str) -> bool {
        key == "sequencing.seed"
    }

    /// Default location of the config file.
    pub fn default_path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        match std::fs::read_to_string(&path) {
            Ok(_) => Self::load_from(&path),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(&path)?;
                Ok(cfg)
            }
        }
    }

    /// Load from an explicit path. Missing files are an error here.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let cfg: Config = toml::from_str(&content).map_err(ConfigError::from)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    /// Persist to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Reject values that would make a session impossible to run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        };

        if self.sequencing.question_interval == 0 {
            return Err(invalid("sequencing.question_interval", "must be at least 1"));
        }
        if self.sequencing.max_consecutive_repeat == 0 {
            return Err(invalid(
                "sequencing.max_consecutive_repeat",
                "must be at least 1",
            ));
        }
        if self.sequencing.max_shuffle_attempts == 0 {
            return Err(invalid("sequencing.max_shuffle_attempts", "must be at least 1"));
        }
        if self.timing.poll_slice_ms == 0 {
            return Err(invalid("timing.poll_slice_ms", "must be at least 1"));
        }
        if self.blocks.count == 0 {
            return Err(invalid("blocks.count", "must be at least 1"));
        }
        if self.keys.responses.len() != 2 {
            return Err(invalid("keys.responses", "exactly two response keys are required"));
        }
        if self.keys.responses.contains(&self.keys.cancel) {
            return Err(invalid("keys.cancel", "must differ from the response keys"));
        }
        if self.recovery.routing == ResumeRouting::Suffixed && self.recovery.suffix.is_empty() {
            return Err(invalid("recovery.suffix", "must not be empty for suffixed routing"));
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key. The caller decides where to save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or fails validation.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}
