//! Session journal: the two event streams of one participant, startup
//! recovery, and finalization.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;

use super::entry::{format_elapsed, EventTime, MarkerKind, TimelineEvent, TrialRow, WordRow};
use super::recovery::{scan_candidates, RecoveryScan};
use super::stream::EventStream;
use crate::collab::IdentityPrompt;
use crate::error::{ConfigError, JournalError, Result};
use crate::participant::ParticipantId;
use crate::storage::{Config, ResumeRouting};

/// Paths of one pair of stream artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalPaths {
    pub trials: PathBuf,
    pub words: PathBuf,
}

impl JournalPaths {
    /// `<dir>/<pid>_data<suffix>.csv` and `<dir>/<pid>_word_log<suffix>.csv`.
    pub fn new(log_dir: &Path, participant: &ParticipantId, suffix: &str) -> Self {
        Self {
            trials: log_dir.join(format!("{participant}_data{suffix}.csv")),
            words: log_dir.join(format!("{participant}_word_log{suffix}.csv")),
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Path> {
        [self.trials.as_path(), self.words.as_path()].into_iter()
    }
}

/// Values written as the two summary rows of the trial report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Time from showing the instructions to the start key.
    pub first_response_latency: Duration,
    pub duration: Duration,
}

impl SessionSummary {
    fn preamble(&self) -> Vec<String> {
        vec![
            format!(
                "# First SPACE pressed at: {}",
                format_elapsed(self.first_response_latency)
            ),
            format!("# Experiment duration: {}", format_elapsed(self.duration)),
        ]
    }
}

/// Prior artifacts found for a participant, without side effects.
pub fn inspect(config: &Config, participant: &ParticipantId) -> Result<Option<RecoveryScan>> {
    let (base, suffixed) = candidate_paths(config, participant);
    Ok(scan_candidates(&[base.trials, suffixed.trials])?)
}

fn candidate_paths(config: &Config, participant: &ParticipantId) -> (JournalPaths, JournalPaths) {
    let dir = &config.paths.log_dir;
    (
        JournalPaths::new(dir, participant, ""),
        JournalPaths::new(dir, participant, &config.recovery.suffix),
    )
}

/// Both streams of a running session.
///
/// Rows are durable as soon as [`record`](SessionJournal::record) returns.
/// [`finalize`](SessionJournal::finalize) rewrites both artifacts as complete
/// reports; it runs at most once, and `Drop` runs it if nobody did.
#[derive(Debug)]
pub struct SessionJournal {
    trials: EventStream<TrialRow>,
    words: EventStream<WordRow>,
    resume_point: u32,
    discarded: Vec<PathBuf>,
    summary: SessionSummary,
    finalized: bool,
}

impl SessionJournal {
    /// Open the journal for `participant`, running startup recovery.
    ///
    /// If a prior trial artifact has progress, the operator is asked whether
    /// to resume. Otherwise any prior artifacts are moved aside and the
    /// session starts from scratch. A resumed journal has no new rows until
    /// [`mark_resumed`](SessionJournal::mark_resumed) is called.
    pub fn open(
        config: &Config,
        participant: &ParticipantId,
        identity: &mut dyn IdentityPrompt,
    ) -> Result<Self> {
        let dir = &config.paths.log_dir;
        fs::create_dir_all(dir).map_err(|e| ConfigError::SaveFailed {
            path: dir.clone(),
            message: e.to_string(),
        })?;

        let (base, suffixed) = candidate_paths(config, participant);
        let scan = scan_candidates(&[base.trials.clone(), suffixed.trials.clone()])?;

        let resume_point = match &scan {
            Some(scan) if scan.has_progress() => {
                tracing::info!(
                    participant = %participant,
                    resume_point = scan.resume_point,
                    path = %scan.path.display(),
                    "Prior session data found"
                );
                if identity.confirm_resume(participant, scan.resume_point)? {
                    scan.resume_point
                } else {
                    0
                }
            }
            _ => 0,
        };

        let mut discarded = Vec::new();
        let paths = if resume_point > 0 {
            match config.recovery.routing {
                ResumeRouting::SameArtifact => base,
                ResumeRouting::Suffixed => suffixed,
            }
        } else {
            for path in base.iter().chain(suffixed.iter()) {
                if path.exists() {
                    discarded.push(move_aside(path)?);
                }
            }
            base
        };

        Ok(Self {
            trials: EventStream::open(&paths.trials)?,
            words: EventStream::open(&paths.words)?,
            resume_point,
            discarded,
            summary: SessionSummary::default(),
            finalized: false,
        })
    }

    /// Write the `RESUME_DETECTED` marker as the first new row of both
    /// streams. Does nothing for a fresh session.
    pub fn mark_resumed(&mut self, at: EventTime) -> Result<(), JournalError> {
        if self.resume_point == 0 {
            return Ok(());
        }
        tracing::info!(resume_point = self.resume_point, "Resuming session");
        self.record(&TimelineEvent::marker(MarkerKind::ResumeDetected, at))
    }

    /// Trials numbered below this are skipped. 0 for a fresh session.
    pub fn resume_point(&self) -> u32 {
        self.resume_point
    }

    pub fn paths(&self) -> JournalPaths {
        JournalPaths {
            trials: self.trials.path().to_path_buf(),
            words: self.words.path().to_path_buf(),
        }
    }

    /// Prior artifacts moved aside when a resume was declined.
    pub fn discarded(&self) -> &[PathBuf] {
        &self.discarded
    }

    pub fn trial_rows(&self) -> &[TrialRow] {
        self.trials.rows()
    }

    pub fn word_rows(&self) -> &[WordRow] {
        self.words.rows()
    }

    pub fn set_first_response_latency(&mut self, latency: Duration) {
        self.summary.first_response_latency = latency;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Durably append `event` to the stream(s) it belongs to.
    pub fn record(&mut self, event: &TimelineEvent) -> Result<(), JournalError> {
        if let Some(row) = event.trial_row() {
            self.trials.append(row)?;
        }
        if let Some(row) = event.word_row() {
            self.words.append(row)?;
        }
        self.summary.duration = self.summary.duration.max(event.at().elapsed);
        Ok(())
    }

    /// Rewrite both artifacts as finished reports.
    ///
    /// Later calls are no-ops. Both artifacts are attempted even if the
    /// first rewrite fails; the first error is returned.
    pub fn finalize(&mut self, duration: Duration) -> Result<(), JournalError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        self.summary.duration = duration;

        let trials = self.trials.rewrite(&self.summary.preamble());
        let words = self.words.rewrite(&[]);
        tracing::info!(
            trials = %self.trials.path().display(),
            words = %self.words.path().display(),
            "Journal finalized"
        );
        trials.and(words)
    }
}

impl Drop for SessionJournal {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        let duration = self.summary.duration;
        if let Err(e) = self.finalize(duration) {
            tracing::error!(error = %e, "Failed to finalize journal on drop");
        }
    }
}

/// Rename `path` to `<stem>_discarded_<timestamp>.csv` next to it.
fn move_aside(path: &Path) -> Result<PathBuf, JournalError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = Local::now().format("%Y%m%dT%H%M%S");
    let target = path.with_file_name(format!("{stem}_discarded_{stamp}.csv"));
    fs::rename(path, &target).map_err(|source| JournalError::DiscardFailed {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::warn!(from = %path.display(), to = %target.display(), "Moved prior artifact aside");
    Ok(target)
}
