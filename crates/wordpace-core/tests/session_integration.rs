//! End-to-end session tests with simulated time and scripted input.

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use chrono::NaiveTime;
use common::{parse_offset, question, records, sentence, Harness};
use wordpace_core::collab::headless::{FixedIdentity, RecordingPresenter, RecordingTriggerSink, ScriptedInput};
use wordpace_core::collab::{InputSource, Presenter, Screen, SessionContext};
use wordpace_core::error::Result;
use wordpace_core::journal::{TRIAL_HEADER, WORD_HEADER};
use wordpace_core::timeline::{Clock, ControllerState, ManualClock};
use wordpace_core::{run_session, AbortReason, CoreError, SessionOutcome};

const SEVEN_WORDS: &str = "w1 w2 w3 w4 w5 w6 w7";

/// Polls per word hold with default timing.
const SLICES: u64 = 45;

/// The cancel poll after each trial's fixation stage.
const POST_FIXATION: u64 = 1;

/// Structural check of a finalized trial report.
fn assert_well_formed_trial_report(path: &std::path::Path) -> Vec<Vec<String>> {
    let rows = records(path);
    assert!(rows[0][0].starts_with("# First SPACE pressed at: "));
    assert!(rows[1][0].starts_with("# Experiment duration: "));
    assert_eq!(rows[2], TRIAL_HEADER.to_vec());
    for row in &rows[3..] {
        assert_eq!(row.len(), TRIAL_HEADER.len());
    }
    rows[3..].to_vec()
}

#[test]
fn test_cancel_mid_sentence_pauses_within_one_slice_and_resumes_at_same_word() {
    let harness = Harness::new().with_order(vec![sentence(1, SEVEN_WORDS)]);
    // Second slice of word 3.
    let mut input = ScriptedInput::new().press_at_poll(POST_FIXATION + 2 * SLICES + 2, "escape");
    let run = harness.run(&mut FixedIdentity::new("p1"), &mut input);
    let report = run.report();
    assert_eq!(report.outcome, SessionOutcome::Completed);

    assert_eq!(
        run.presenter.words(),
        vec!["w1", "w2", "w3", "w3", "w4", "w5", "w6", "w7"]
    );

    let words = records(&report.paths.words);
    assert_eq!(words[0], WORD_HEADER.to_vec());
    let ids: Vec<&str> = words[1..].iter().map(|r| r[2].as_str()).collect();
    assert_eq!(ids, vec!["w1", "w2", "w3", "", "", "w4", "w5", "w6", "w7"]);
    assert_eq!(words[4][1], "PAUSE_START");
    assert_eq!(words[5][1], "PAUSE_RESUME");

    let word3 = parse_offset(&words[3][3]);
    let paused = parse_offset(&words[4][3]);
    assert!(paused >= word3);
    assert!(paused - word3 <= Duration::from_millis(10));

    // The pause notice replaced word 3, then word 3 came back.
    let screens = &run.presenter.screens;
    let notice = screens
        .iter()
        .position(|s| matches!(s, Screen::Notice(text) if text.starts_with("PAUSE")))
        .unwrap();
    assert_eq!(screens[notice - 1], Screen::Word("w3".into()));
    assert_eq!(screens[notice + 1], Screen::Word("w3".into()));
}

#[test]
fn test_full_session_with_questions_and_breaks() {
    let mut harness = Harness::new();
    harness.config.sequencing.question_interval = 3;
    harness.config.blocks.count = 2;
    harness.write_catalog(
        "a1,A,11,The cat sat,,,3,cat\n\
         b1,B,12,Dogs bark loudly,,,3,bark\n\
         a2,A,11,A bird sang,,,3,bird\n\
         b2,B,12,Rain fell down,,,3,fell\n\
         a3,A,11,Wind blew hard,Did the wind blow?,n,3,blew\n\
         b3,B,12,Snow was cold,Was the snow warm?,o,3,cold\n",
    );

    let mut input = ScriptedInput::new().answering("n");
    let run = harness.run(&mut FixedIdentity::new("p1"), &mut input);
    let report = run.report();

    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(report.total_trials, 8);
    assert_eq!(report.trials_executed, 8);
    assert_eq!(report.final_state, ControllerState::Complete);
    assert!(harness
        .config
        .paths
        .order_dir
        .join("p1_randomized_list.csv")
        .exists());

    let rows = assert_well_formed_trial_report(&report.paths.trials);
    let questions: Vec<_> = rows.iter().filter(|r| r[1].starts_with("Q_")).collect();
    assert_eq!(questions.len(), 2);
    for q in &questions {
        assert_eq!(q[5], "n");
        assert_eq!(q[3], q[2]);
    }
    let markers: Vec<&str> = rows
        .iter()
        .filter(|r| r[0].is_empty())
        .map(|r| r[1].as_str())
        .collect();
    assert_eq!(markers, vec!["BREAK_START_block1", "BREAK_END_block1"]);

    // Check pulse first, then one onset pulse per trial kind.
    let pulses = run.triggers.pulses();
    assert_eq!(pulses[0], 255);
    assert_eq!(pulses.iter().filter(|c| **c == 254).count(), 2);
    assert_eq!(pulses.iter().filter(|c| **c == 1).count(), 6);
    assert_eq!(pulses.iter().filter(|c| **c == 100).count(), 18);

    assert_eq!(
        run.presenter.screens.last(),
        Some(&Screen::Notice(harness.config.texts.end.clone()))
    );
}

#[test]
fn test_instruction_latency_is_first_summary_row() {
    let harness = Harness::new().with_order(vec![sentence(1, "hello")]);
    let run = harness.run(&mut FixedIdentity::new("p1"), &mut ScriptedInput::new());
    let rows = records(&run.report().paths.trials);
    // The manual clock does not advance while waiting for a key.
    assert_eq!(rows[0][0], "# First SPACE pressed at: 0:00:00");
    assert_eq!(
        run.presenter.screens[0],
        Screen::Notice(harness.config.texts.instructions.clone())
    );
}

/// Manual clock shared between the session and the scripted reader.
#[derive(Clone)]
struct SharedClock(Rc<RefCell<ManualClock>>);

impl Clock for SharedClock {
    fn elapsed(&self) -> Duration {
        self.0.borrow().elapsed()
    }

    fn wall_time(&self) -> NaiveTime {
        self.0.borrow().wall_time()
    }

    fn wait(&mut self, duration: Duration) {
        self.0.borrow_mut().wait(duration);
    }
}

/// Takes `reading` of simulated time before pressing the start key.
struct SlowReader {
    clock: SharedClock,
    reading: Duration,
    started: bool,
    inner: ScriptedInput,
}

impl InputSource for SlowReader {
    fn poll_keys(&mut self, accepted: &[&str]) -> Result<Vec<String>> {
        self.inner.poll_keys(accepted)
    }

    fn wait_key(&mut self, accepted: &[&str]) -> Result<String> {
        if !self.started && accepted == ["space"] {
            self.started = true;
            self.clock.0.borrow_mut().advance(self.reading);
        }
        self.inner.wait_key(accepted)
    }
}

#[test]
fn test_event_times_count_from_the_start_key() {
    let harness = Harness::new().with_order(vec![sentence(1, "hello")]);
    let clock = SharedClock(Rc::new(RefCell::new(ManualClock::new(
        NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
    ))));
    let mut input = SlowReader {
        clock: clock.clone(),
        reading: Duration::from_secs(60),
        started: false,
        inner: ScriptedInput::new(),
    };
    let mut presenter = RecordingPresenter::new();
    let mut triggers = RecordingTriggerSink::new();
    let mut identity = FixedIdentity::new("p1");
    let mut session_clock = clock.clone();
    let mut ctx = SessionContext {
        presenter: &mut presenter,
        input: &mut input,
        triggers: &mut triggers,
        identity: &mut identity,
        clock: &mut session_clock,
    };
    let report = run_session(&harness.config, &mut ctx).unwrap().unwrap();

    let rows = records(&report.paths.trials);
    assert_eq!(rows[0][0], "# First SPACE pressed at: 0:01:00");
    // 250 + 1000 + 100 fixation stage, 10 pulse, 450 hold, 100 gap.
    assert_eq!(rows[1][0], "# Experiment duration: 0:00:01.910000");
    assert_eq!(rows[3][6], "0:00:01.350000");

    let words = records(&report.paths.words);
    assert_eq!(words[1][3], "0:00:01.360000");
    assert_eq!(report.duration, Duration::from_millis(1910));
}

#[test]
fn test_injected_failure_still_finalizes_reports() {
    let harness = Harness::new().with_order(vec![
        sentence(1, "one two"),
        sentence(2, "three four"),
        sentence(3, "five six"),
    ]);
    // Fails during the second word of trial 2.
    let mut input = ScriptedInput::new().fail_at_poll(2 * POST_FIXATION + 3 * SLICES + 5);
    let run = harness.run(&mut FixedIdentity::new("p1"), &mut input);
    let report = run.report();

    match &report.outcome {
        SessionOutcome::Aborted(AbortReason::Failure(message)) => {
            assert!(message.contains("scripted input failure"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(report.trials_executed, 1);

    let rows = assert_well_formed_trial_report(&report.paths.trials);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][1], "s1");

    let words = records(&report.paths.words);
    let shown: Vec<&str> = words[1..].iter().map(|r| r[2].as_str()).collect();
    assert_eq!(shown, vec!["one", "two", "three", "four"]);
}

struct PanickingPresenter {
    inner: RecordingPresenter,
    panic_on_word: &'static str,
}

impl Presenter for PanickingPresenter {
    fn show(&mut self, screen: &Screen) -> Result<()> {
        if *screen == Screen::Word(self.panic_on_word.to_string()) {
            panic!("display lost");
        }
        self.inner.show(screen)
    }
}

#[test]
fn test_panic_in_trial_loop_is_caught_and_saved() {
    let harness = Harness::new().with_order(vec![sentence(1, "alpha"), sentence(2, "beta")]);
    let mut presenter = PanickingPresenter {
        inner: RecordingPresenter::new(),
        panic_on_word: "beta",
    };
    let mut triggers = RecordingTriggerSink::new();
    let report = harness
        .run_with(
            &mut FixedIdentity::new("p1"),
            &mut ScriptedInput::new(),
            &mut presenter,
            &mut triggers,
        )
        .unwrap()
        .unwrap();

    assert_eq!(
        report.outcome,
        SessionOutcome::Aborted(AbortReason::Failure("display lost".into()))
    );
    let rows = assert_well_formed_trial_report(&report.paths.trials);
    assert_eq!(rows.len(), 1);
}

#[test]
fn test_quit_from_pause_ends_session_as_user_abort() {
    let harness = Harness::new().with_order(vec![sentence(1, "a b"), sentence(2, "c d")]);
    let mut input = ScriptedInput::new()
        .press_at_poll(POST_FIXATION + SLICES + 3, "escape")
        .then_wait("space")
        .then_wait("q");
    let run = harness.run(&mut FixedIdentity::new("p1"), &mut input);
    let report = run.report();

    assert_eq!(report.outcome, SessionOutcome::Aborted(AbortReason::UserQuit));
    assert_eq!(report.final_state, ControllerState::Aborted);
    assert_eq!(report.trials_executed, 0);

    let rows = assert_well_formed_trial_report(&report.paths.trials);
    let ids: Vec<&str> = rows.iter().map(|r| r[1].as_str()).collect();
    assert_eq!(ids, vec!["PAUSE_START"]);
}

#[test]
fn test_pause_during_question_keeps_waiting_for_answer() {
    let harness = Harness::new().with_order(vec![
        sentence(1, "x"),
        question(2, "s1", "Was it x?", "n"),
    ]);
    // First question poll comes after both post-fixation polls.
    let mut input = ScriptedInput::new()
        .press_at_poll(2 * POST_FIXATION + SLICES + 1, "escape")
        .press_at_poll(2 * POST_FIXATION + SLICES + 4, "o");
    let run = harness.run(&mut FixedIdentity::new("p1"), &mut input);
    let report = run.report();
    assert_eq!(report.outcome, SessionOutcome::Completed);

    let rows = assert_well_formed_trial_report(&report.paths.trials);
    let ids: Vec<&str> = rows.iter().map(|r| r[1].as_str()).collect();
    assert_eq!(ids, vec!["s1", "PAUSE_START", "PAUSE_RESUME", "Q_s1"]);
    assert_eq!(rows[3][5], "o");

    let screens = &run.presenter.screens;
    let notice = screens
        .iter()
        .position(|s| matches!(s, Screen::Notice(text) if text.starts_with("PAUSE")))
        .unwrap();
    assert!(matches!(&screens[notice - 1], Screen::Question { .. }));
    assert!(matches!(&screens[notice + 1], Screen::Question { .. }));
}

#[test]
fn test_cancelled_identity_runs_nothing() {
    let harness = Harness::new().with_order(vec![sentence(1, "x")]);
    let run = harness.run(&mut FixedIdentity::cancelled(), &mut ScriptedInput::new());
    assert!(matches!(run.result, Ok(None)));
    assert!(run.presenter.screens.is_empty());
    assert!(!harness.config.paths.log_dir.exists());
}

#[test]
fn test_invalid_participant_id_is_a_configuration_error() {
    let harness = Harness::new();
    let run = harness.run(&mut FixedIdentity::new("../escape"), &mut ScriptedInput::new());
    assert!(matches!(run.result, Err(CoreError::Config(_))));
}

#[test]
fn test_missing_catalog_fails_before_anything_is_recorded() {
    let harness = Harness::new();
    let run = harness.run(&mut FixedIdentity::new("p1"), &mut ScriptedInput::new());
    assert!(matches!(run.result, Err(CoreError::Config(_))));
    assert!(run.triggers.writes.is_empty());
    assert!(!harness.config.paths.log_dir.exists());
}
