use std::path::Path;

use chrono::Local;
use clap::Args;
use wordpace_core::collab::headless::{FixedIdentity, RecordingPresenter, ScriptedInput};
use wordpace_core::collab::LoggingTriggerSink;
use wordpace_core::{
    run_session, AbortReason, ManualClock, SessionContext, SessionOutcome, SessionReport,
    SystemClock,
};

use super::load_config;
use crate::terminal::{TerminalIdentity, TerminalInput, TerminalPresenter, TerminalSession};

#[derive(Args)]
pub struct RunArgs {
    /// Participant id (prompted for if omitted)
    #[arg(long)]
    participant: Option<String>,

    /// Dry run: simulated time, no display, questions answered automatically
    #[arg(long, requires = "participant")]
    simulate: bool,

    /// With --simulate, start over instead of resuming prior data
    #[arg(long, requires = "simulate")]
    fresh: bool,
}

pub fn run(args: RunArgs, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    let mut triggers = LoggingTriggerSink;

    let report = if args.simulate {
        let participant = args.participant.unwrap_or_default();
        let mut identity = FixedIdentity::new(&participant);
        if args.fresh {
            identity = identity.declining_resume();
        }
        let answer = config.keys.responses.first().cloned().unwrap_or_default();
        let mut input = ScriptedInput::new().answering(&answer);
        let mut presenter = RecordingPresenter::new();
        let mut clock = ManualClock::new(Local::now().time());
        let mut ctx = SessionContext {
            presenter: &mut presenter,
            input: &mut input,
            triggers: &mut triggers,
            identity: &mut identity,
            clock: &mut clock,
        };
        run_session(&config, &mut ctx)?
    } else {
        let session = TerminalSession::enter()?;
        let mut presenter = TerminalPresenter;
        let mut input = TerminalInput;
        let mut identity = TerminalIdentity::new(args.participant);
        let mut clock = SystemClock::new();
        let mut ctx = SessionContext {
            presenter: &mut presenter,
            input: &mut input,
            triggers: &mut triggers,
            identity: &mut identity,
            clock: &mut clock,
        };
        let result = run_session(&config, &mut ctx);
        drop(session);
        result?
    };

    match report {
        None => println!("Session cancelled"),
        Some(report) => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &SessionReport) {
    let outcome = match &report.outcome {
        SessionOutcome::Completed => "completed".to_string(),
        SessionOutcome::Aborted(AbortReason::UserQuit) => "quit by operator".to_string(),
        SessionOutcome::Aborted(AbortReason::Failure(message)) => format!("aborted: {message}"),
    };
    println!("Participant:  {}", report.participant);
    println!("Outcome:      {outcome}");
    if report.resume_point > 0 {
        println!("Resumed at:   trial {}", report.resume_point);
    }
    println!(
        "Trials:       {} run, {} in order",
        report.trials_executed, report.total_trials
    );
    println!("Trial report: {}", report.paths.trials.display());
    println!("Word report:  {}", report.paths.words.display());
    for path in &report.discarded {
        println!("Moved aside:  {}", path.display());
    }
}
