//! Shared fixtures for session-level integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use tempfile::TempDir;
use wordpace_core::collab::headless::{FixedIdentity, RecordingPresenter, RecordingTriggerSink, ScriptedInput};
use wordpace_core::collab::Presenter;
use wordpace_core::error::Result;
use wordpace_core::stimulus::SequencedTrial;
use wordpace_core::{run_session, Config, ManualClock, ParticipantId, SessionContext, SessionReport, StimulusSequencer, TrialList};

pub const PARTICIPANT: &str = "p1";

/// A config rooted in a temp directory.
pub struct Harness {
    pub dir: TempDir,
    pub config: Config,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.catalog = dir.path().join("stimuli.csv");
        config.paths.order_dir = dir.path().join("logs_order");
        config.paths.log_dir = dir.path().join("logs_experiment");
        Self { dir, config }
    }

    /// Persist `trials` as the participant's order, bypassing the catalog.
    pub fn with_order(self, trials: Vec<SequencedTrial>) -> Self {
        let path = StimulusSequencer::from_config(&self.config).order_path(&pid());
        TrialList::new(trials).unwrap().save_new(&path).unwrap();
        self
    }

    pub fn write_catalog(&self, body: &str) {
        let header = "id,condition,condition_code,sentence,question,correct_answer,word_count,target_word\n";
        fs::write(&self.config.paths.catalog, format!("{header}{body}")).unwrap();
    }

    pub fn log_path(&self, name: &str) -> PathBuf {
        self.config.paths.log_dir.join(name)
    }

    pub fn run(&self, identity: &mut FixedIdentity, input: &mut ScriptedInput) -> Run {
        let mut presenter = RecordingPresenter::new();
        let mut triggers = RecordingTriggerSink::new();
        let result = self.run_with(identity, input, &mut presenter, &mut triggers);
        Run {
            result,
            presenter,
            triggers,
        }
    }

    pub fn run_with(
        &self,
        identity: &mut FixedIdentity,
        input: &mut ScriptedInput,
        presenter: &mut dyn Presenter,
        triggers: &mut RecordingTriggerSink,
    ) -> Result<Option<SessionReport>> {
        let mut clock = ManualClock::new(NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        let mut ctx = SessionContext {
            presenter,
            input,
            triggers,
            identity,
            clock: &mut clock,
        };
        run_session(&self.config, &mut ctx)
    }
}

pub struct Run {
    pub result: Result<Option<SessionReport>>,
    pub presenter: RecordingPresenter,
    pub triggers: RecordingTriggerSink,
}

impl Run {
    pub fn report(&self) -> &SessionReport {
        match &self.result {
            Ok(Some(report)) => report,
            other => panic!("expected a session report, got {other:?}"),
        }
    }
}

pub fn pid() -> ParticipantId {
    ParticipantId::parse(PARTICIPANT).unwrap()
}

pub fn sentence(num: u32, text: &str) -> SequencedTrial {
    SequencedTrial {
        trial_num: num,
        id: format!("s{num}"),
        condition: "A".into(),
        condition_code: 11,
        word_count: text.split_whitespace().count() as u32,
        target_word: String::new(),
        sentence: text.into(),
        correct_answer: String::new(),
    }
}

pub fn question(num: u32, parent: &str, text: &str, answer: &str) -> SequencedTrial {
    SequencedTrial {
        id: format!("Q_{parent}"),
        condition_code: 50,
        sentence: text.into(),
        correct_answer: answer.into(),
        ..sentence(num, "")
    }
}

/// Every record of a CSV artifact, without header handling.
pub fn records(path: &std::path::Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

/// Parse an `H:MM:SS[.ffffff]` offset.
pub fn parse_offset(text: &str) -> Duration {
    let (hms, micros) = match text.split_once('.') {
        Some((hms, frac)) => (hms, frac.parse::<u64>().unwrap()),
        None => (text, 0),
    };
    let parts: Vec<u64> = hms.split(':').map(|p| p.parse().unwrap()).collect();
    Duration::from_secs(parts[0] * 3600 + parts[1] * 60 + parts[2]) + Duration::from_micros(micros)
}
