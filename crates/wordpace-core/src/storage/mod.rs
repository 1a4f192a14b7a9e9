mod config;

pub use config::{
    BlockConfig, Config, KeyConfig, PathsConfig, RecoveryConfig, ResumeRouting, SequencingConfig,
    TextConfig, TimingConfig, TriggerConfig,
};

use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Returns `~/.config/wordpace[-dev]/` based on WORDPACE_ENV.
///
/// Set WORDPACE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("WORDPACE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("wordpace-dev")
    } else {
        base_dir.join("wordpace")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::SaveFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
