use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

/// Participant identifier, safe to embed in artifact file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Validate a raw identifier entered by the operator.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        let invalid = |message: &str| ConfigError::InvalidValue {
            key: "participant_id".into(),
            message: message.into(),
        };

        if trimmed.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if trimmed == "." || trimmed == ".." {
            return Err(invalid("must not be a relative path component"));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control())
        {
            return Err(invalid(&format!("contains forbidden character {bad:?}")));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ParticipantId> for String {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}
