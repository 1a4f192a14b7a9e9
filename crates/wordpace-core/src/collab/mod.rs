//! Collaborators the timeline talks to: screen, keyboard, trigger port and
//! the operator prompt.
//!
//! The terminal front-end lives in the CLI crate. [`headless`] provides
//! scripted implementations for tests and simulated runs.

pub mod headless;

use crate::error::Result;
use crate::participant::ParticipantId;

/// Content to draw. Every `show` replaces what was on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Blank,
    Fixation(String),
    Word(String),
    Question { text: String, hint: String },
    Notice(String),
}

/// Blocking redraw of the stimulus display.
pub trait Presenter {
    fn show(&mut self, screen: &Screen) -> Result<()>;
}

/// Keyboard (or response box) input.
///
/// Key names are lowercase: single characters (`"n"`), or `"space"`,
/// `"escape"`, `"enter"`.
pub trait InputSource {
    /// Keys pressed since the last call that are in `accepted`, oldest
    /// first. Never blocks.
    fn poll_keys(&mut self, accepted: &[&str]) -> Result<Vec<String>>;

    /// Block until one of `accepted` is pressed. An empty list accepts any key.
    fn wait_key(&mut self, accepted: &[&str]) -> Result<String>;
}

/// Parallel-port style event marker output.
pub trait TriggerSink {
    fn set_data(&mut self, code: u8) -> Result<()>;
}

/// Operator-facing session setup.
pub trait IdentityPrompt {
    /// Ask for the participant id. `None` means the operator cancelled.
    fn participant_id(&mut self) -> Result<Option<String>>;

    /// Ask whether to continue an interrupted session from `resume_point`.
    fn confirm_resume(&mut self, participant: &ParticipantId, resume_point: u32) -> Result<bool>;
}

/// Trigger sink for setups without a port: codes only go to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTriggerSink;

impl TriggerSink for LoggingTriggerSink {
    fn set_data(&mut self, code: u8) -> Result<()> {
        if code != 0 {
            tracing::info!(code, "Trigger");
        }
        Ok(())
    }
}

/// Everything a session needs from the outside world.
pub struct SessionContext<'a> {
    pub presenter: &'a mut dyn Presenter,
    pub input: &'a mut dyn InputSource,
    pub triggers: &'a mut dyn TriggerSink,
    pub identity: &'a mut dyn IdentityPrompt,
    pub clock: &'a mut dyn crate::timeline::Clock,
}
