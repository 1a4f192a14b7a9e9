//! Scripted collaborators for tests and simulated runs.

use std::collections::VecDeque;

use super::{IdentityPrompt, InputSource, Presenter, Screen, TriggerSink};
use crate::error::{CoreError, Result};
use crate::participant::ParticipantId;

#[derive(Debug, Clone)]
struct ScheduledPress {
    at_poll: u64,
    key: String,
}

/// Input that replays a script.
///
/// Polls are counted from 1. A key scheduled with [`press_at_poll`] becomes
/// pending at that poll and is delivered by the first later poll that
/// accepts it. Blocking waits consume [`then_wait`] keys in order; with an
/// empty queue they answer with the first accepted key, or `"space"`.
///
/// [`press_at_poll`]: ScriptedInput::press_at_poll
/// [`then_wait`]: ScriptedInput::then_wait
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    polls: u64,
    presses: Vec<ScheduledPress>,
    waits: VecDeque<String>,
    auto_answer: Option<String>,
    fail_at: Option<u64>,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press_at_poll(mut self, poll: u64, key: &str) -> Self {
        self.presses.push(ScheduledPress {
            at_poll: poll,
            key: key.to_string(),
        });
        self
    }

    pub fn then_wait(mut self, key: &str) -> Self {
        self.waits.push_back(key.to_string());
        self
    }

    /// Answer every poll that accepts `key` with it.
    pub fn answering(mut self, key: &str) -> Self {
        self.auto_answer = Some(key.to_string());
        self
    }

    /// Fail with a collaborator error on the given poll.
    pub fn fail_at_poll(mut self, poll: u64) -> Self {
        self.fail_at = Some(poll);
        self
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }
}

impl InputSource for ScriptedInput {
    fn poll_keys(&mut self, accepted: &[&str]) -> Result<Vec<String>> {
        self.polls += 1;
        if self.fail_at == Some(self.polls) {
            return Err(CoreError::Collaborator(format!(
                "scripted input failure at poll {}",
                self.polls
            )));
        }

        let now = self.polls;
        let due = self
            .presses
            .iter()
            .position(|p| p.at_poll <= now && accepted.contains(&p.key.as_str()));
        if let Some(index) = due {
            let press = self.presses.remove(index);
            return Ok(vec![press.key]);
        }

        match &self.auto_answer {
            Some(key) if accepted.contains(&key.as_str()) => Ok(vec![key.clone()]),
            _ => Ok(Vec::new()),
        }
    }

    fn wait_key(&mut self, accepted: &[&str]) -> Result<String> {
        match self.waits.pop_front() {
            Some(key) if accepted.is_empty() || accepted.contains(&key.as_str()) => Ok(key),
            Some(key) => Err(CoreError::Collaborator(format!(
                "scripted key '{key}' is not one of {accepted:?}"
            ))),
            None => Ok(accepted.first().copied().unwrap_or("space").to_string()),
        }
    }
}

/// Presenter that keeps every screen it was asked to show.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    pub screens: Vec<Screen>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Words shown, in order.
    pub fn words(&self) -> Vec<&str> {
        self.screens
            .iter()
            .filter_map(|s| match s {
                Screen::Word(w) => Some(w.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Presenter for RecordingPresenter {
    fn show(&mut self, screen: &Screen) -> Result<()> {
        self.screens.push(screen.clone());
        Ok(())
    }
}

/// Trigger sink that keeps every value written, zeros included.
#[derive(Debug, Clone, Default)]
pub struct RecordingTriggerSink {
    pub writes: Vec<u8>,
}

impl RecordingTriggerSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-zero codes, in order.
    pub fn pulses(&self) -> Vec<u8> {
        self.writes.iter().copied().filter(|c| *c != 0).collect()
    }
}

impl TriggerSink for RecordingTriggerSink {
    fn set_data(&mut self, code: u8) -> Result<()> {
        self.writes.push(code);
        Ok(())
    }
}

/// Identity prompt with canned answers.
#[derive(Debug, Clone)]
pub struct FixedIdentity {
    participant: Option<String>,
    resume: bool,
    /// Resume points the prompt was asked about.
    pub offered: Vec<u32>,
}

impl FixedIdentity {
    pub fn new(participant: &str) -> Self {
        Self {
            participant: Some(participant.to_string()),
            resume: true,
            offered: Vec::new(),
        }
    }

    /// An operator who cancels the id dialog.
    pub fn cancelled() -> Self {
        Self {
            participant: None,
            resume: true,
            offered: Vec::new(),
        }
    }

    pub fn declining_resume(mut self) -> Self {
        self.resume = false;
        self
    }
}

impl IdentityPrompt for FixedIdentity {
    fn participant_id(&mut self) -> Result<Option<String>> {
        Ok(self.participant.clone())
    }

    fn confirm_resume(&mut self, _participant: &ParticipantId, resume_point: u32) -> Result<bool> {
        self.offered.push(resume_point);
        Ok(self.resume)
    }
}
