//! Session runner: identity, sequencing, journal, trial loop, finalization.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Duration;

use crate::collab::{Screen, SessionContext};
use crate::error::Result;
use crate::journal::{EventTime, JournalPaths, SessionJournal};
use crate::participant::ParticipantId;
use crate::stimulus::StimulusSequencer;
use crate::storage::Config;
use crate::timeline::{ControllerOutcome, ControllerState, TrialTimelineController};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Quit chosen from the pause notice.
    UserQuit,
    /// An error or panic escaped the trial loop.
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Aborted(AbortReason),
}

/// Summary of a finished (or aborted) session. The journal is always
/// finalized by the time this exists.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub participant: ParticipantId,
    pub outcome: SessionOutcome,
    pub resume_point: u32,
    pub total_trials: usize,
    pub trials_executed: usize,
    pub final_state: ControllerState,
    pub paths: JournalPaths,
    pub discarded: Vec<PathBuf>,
    pub duration: Duration,
}

/// Run one complete session.
///
/// Returns `Ok(None)` if the operator cancelled the identity prompt.
///
/// Configuration problems (bad participant id, unreadable catalog) and
/// failures before the start key are returned as errors before anything is
/// recorded. The resume question is asked after the start key, and event
/// offsets count from the moment it is answered. Once the journal is open,
/// any error or panic in the trial loop ends the session as
/// [`SessionOutcome::Aborted`], and the journal is finalized on every path.
pub fn run_session(config: &Config, ctx: &mut SessionContext<'_>) -> Result<Option<SessionReport>> {
    let Some(raw) = ctx.identity.participant_id()? else {
        tracing::info!("Session cancelled at the identity prompt");
        return Ok(None);
    };
    let participant = ParticipantId::parse(&raw)?;

    let sequencer = StimulusSequencer::from_config(config);
    let trials = sequencer.load_or_create(&participant, &config.paths.catalog)?;

    check_pulse(config, ctx)?;
    ctx.presenter
        .show(&Screen::Notice(config.texts.instructions.clone()))?;
    let shown = ctx.clock.elapsed();
    ctx.input.wait_key(&[config.keys.start.as_str()])?;
    let latency = ctx.clock.elapsed().saturating_sub(shown);

    let mut journal = SessionJournal::open(config, &participant, &mut *ctx.identity)?;
    journal.set_first_response_latency(latency);

    // Every offset in both reports counts from here.
    let origin = ctx.clock.elapsed();
    journal.mark_resumed(EventTime::capture(&*ctx.clock, origin))?;
    let resume_point = journal.resume_point();
    tracing::info!(
        participant = %participant,
        trials = trials.len(),
        resume_point,
        "Session started"
    );

    let mut controller = TrialTimelineController::new(config, &trials, resume_point, origin);
    let result = panic::catch_unwind(AssertUnwindSafe(|| controller.run(ctx, &mut journal)));

    let outcome = match result {
        Ok(Ok(ControllerOutcome::Completed)) => SessionOutcome::Completed,
        Ok(Ok(ControllerOutcome::Quit)) => SessionOutcome::Aborted(AbortReason::UserQuit),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Session failed; saving data");
            SessionOutcome::Aborted(AbortReason::Failure(e.to_string()))
        }
        Err(payload) => {
            let message = panic_message(&*payload);
            tracing::error!(panic = %message, "Session panicked; saving data");
            SessionOutcome::Aborted(AbortReason::Failure(message))
        }
    };

    let duration = ctx.clock.elapsed().saturating_sub(origin);
    journal.finalize(duration)?;

    let report = SessionReport {
        participant,
        outcome,
        resume_point,
        total_trials: trials.len(),
        trials_executed: controller.executed(),
        final_state: controller.state(),
        paths: journal.paths(),
        discarded: journal.discarded().to_vec(),
        duration,
    };
    tracing::info!(
        outcome = ?report.outcome,
        executed = report.trials_executed,
        "Session ended"
    );

    if let Err(e) = show_end_screen(config, ctx) {
        tracing::warn!(error = %e, "End screen failed");
    }
    Ok(Some(report))
}

/// One pulse of the session-check code so the recording side can verify
/// the trigger line.
fn check_pulse(config: &Config, ctx: &mut SessionContext<'_>) -> Result<()> {
    ctx.triggers.set_data(config.triggers.session_check)?;
    ctx.clock
        .wait(Duration::from_millis(config.timing.trigger_pulse_ms));
    ctx.triggers.set_data(0)
}

fn show_end_screen(config: &Config, ctx: &mut SessionContext<'_>) -> Result<()> {
    ctx.presenter
        .show(&Screen::Notice(config.texts.end.clone()))?;
    ctx.input.wait_key(&[])?;
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_handles_both_payload_kinds() {
        let a: Box<dyn Any + Send> = Box::new("static");
        let b: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let c: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*a), "static");
        assert_eq!(panic_message(&*b), "owned");
        assert_eq!(panic_message(&*c), "unknown panic");
    }
}
