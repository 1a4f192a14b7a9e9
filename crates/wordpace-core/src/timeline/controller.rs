//! Trial timeline controller.
//!
//! Drives the sequenced trials through a fixed per-trial schedule and
//! records every onset in the journal.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Fixation -> (WordPresentation | QuestionPresentation) -> RecordOutcome
//!      -> (Fixation | BlockBreak | Complete)
//!
//! WordPresentation | QuestionPresentation -> Paused -> (back | Aborted)
//! ```
//!
//! Pause and quit are [`Signal`] values returned from poll points. `Err` is
//! only used for real failures (journal I/O, collaborator errors).

use std::ops::Range;
use std::time::Duration;

use crate::collab::{Screen, SessionContext};
use crate::error::Result;
use crate::journal::{EventTime, MarkerKind, SessionJournal, TimelineEvent, TrialRecord, WordEvent};
use crate::stimulus::{SequencedTrial, TrialList};
use crate::storage::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Fixation { trial: u32 },
    /// `word` is 1-based.
    WordPresentation { trial: u32, word: usize },
    QuestionPresentation { trial: u32 },
    Paused,
    RecordOutcome { trial: u32 },
    /// `block` is the 1-based block that just ended.
    BlockBreak { block: usize },
    Complete,
    Aborted,
}

/// What a poll point asks the controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Continue,
    Pause,
    Abort,
}

/// How the trial loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerOutcome {
    Completed,
    /// The operator chose quit while paused.
    Quit,
}

/// Index ranges of `count` contiguous blocks over `total` trials.
///
/// Every block has `total / count` trials; the last takes the remainder.
pub fn block_ranges(total: usize, count: usize) -> Vec<Range<usize>> {
    let count = count.max(1);
    let size = total / count;
    (0..count)
        .map(|block| {
            let start = block * size;
            let end = if block == count - 1 { total } else { start + size };
            start..end
        })
        .collect()
}

pub struct TrialTimelineController<'a> {
    config: &'a Config,
    trials: &'a TrialList,
    resume_point: u32,
    origin: Duration,
    state: ControllerState,
    executed: usize,
}

impl<'a> TrialTimelineController<'a> {
    /// `origin` is the clock reading all event offsets are relative to.
    pub fn new(config: &'a Config, trials: &'a TrialList, resume_point: u32, origin: Duration) -> Self {
        Self {
            config,
            trials,
            resume_point,
            origin,
            state: ControllerState::Idle,
            executed: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Trials presented so far in this session.
    pub fn executed(&self) -> usize {
        self.executed
    }

    pub fn resume_point(&self) -> u32 {
        self.resume_point
    }

    // ── Run ──────────────────────────────────────────────────────────

    /// Present every trial from the resume point on.
    pub fn run(
        &mut self,
        ctx: &mut SessionContext<'_>,
        journal: &mut SessionJournal,
    ) -> Result<ControllerOutcome> {
        let trials = self.trials;
        let total = trials.len();
        let blocks = block_ranges(total, self.config.blocks.count);
        let last_block = blocks.len() - 1;

        for (block, range) in blocks.into_iter().enumerate() {
            let mut ran_any = false;
            for trial in &trials.trials()[range] {
                if trial.trial_num < self.resume_point {
                    continue;
                }
                ran_any = true;
                tracing::info!("Trial {} of {}", trial.trial_num, total);

                if self.run_trial(ctx, journal, trial)? == Signal::Abort {
                    self.state = ControllerState::Aborted;
                    return Ok(ControllerOutcome::Quit);
                }
            }

            if block < last_block && ran_any {
                self.block_break(ctx, journal, block + 1)?;
            }
        }

        self.state = ControllerState::Complete;
        Ok(ControllerOutcome::Completed)
    }

    fn run_trial(
        &mut self,
        ctx: &mut SessionContext<'_>,
        journal: &mut SessionJournal,
        trial: &SequencedTrial,
    ) -> Result<Signal> {
        let config = self.config;
        let timing = &config.timing;
        self.state = ControllerState::Fixation {
            trial: trial.trial_num,
        };

        ctx.presenter.show(&Screen::Blank)?;
        ctx.clock.wait(ms(timing.pre_fixation_blank_ms));
        ctx.presenter
            .show(&Screen::Fixation(config.texts.fixation.clone()))?;
        ctx.clock.wait(ms(timing.fixation_ms));
        ctx.presenter.show(&Screen::Blank)?;
        ctx.clock.wait(ms(timing.post_fixation_blank_ms));
        if self.poll_cancel(ctx)? == Signal::Pause {
            if self.pause(ctx, journal, &Screen::Blank)? == Signal::Abort {
                return Ok(Signal::Abort);
            }
            self.state = ControllerState::Fixation {
                trial: trial.trial_num,
            };
        }

        let onset = self.stamp(ctx);
        let response = if trial.is_question() {
            match self.present_question(ctx, journal, trial)? {
                Some(key) => key,
                None => return Ok(Signal::Abort),
            }
        } else {
            if self.present_words(ctx, journal, trial)? == Signal::Abort {
                return Ok(Signal::Abort);
            }
            String::new()
        };

        self.state = ControllerState::RecordOutcome {
            trial: trial.trial_num,
        };
        let question = if trial.is_question() {
            trial.sentence.clone()
        } else {
            String::new()
        };
        journal.record(&TimelineEvent::Trial(TrialRecord {
            trial_num: trial.trial_num,
            sentence_id: trial.id.clone(),
            sentence: trial.sentence.clone(),
            question,
            correct_answer: trial.correct_answer.clone(),
            response,
            at: onset,
        }))?;
        self.executed += 1;
        Ok(Signal::Continue)
    }

    fn present_words(
        &mut self,
        ctx: &mut SessionContext<'_>,
        journal: &mut SessionJournal,
        trial: &SequencedTrial,
    ) -> Result<Signal> {
        let config = self.config;
        let timing = &config.timing;
        let slices = timing.word_hold_slices();

        self.pulse(ctx, config.triggers.sentence_onset)?;

        for (index, word) in trial.words().enumerate() {
            let state = ControllerState::WordPresentation {
                trial: trial.trial_num,
                word: index + 1,
            };
            self.state = state;

            let at = self.stamp(ctx);
            ctx.triggers.set_data(config.triggers.word_onset)?;
            let screen = Screen::Word(word.to_string());
            ctx.presenter.show(&screen)?;
            journal.record(&TimelineEvent::Word(WordEvent {
                trial_num: trial.trial_num,
                sentence_id: trial.id.clone(),
                word: word.to_string(),
                at,
            }))?;

            let mut cleared = false;
            for slice in 0..slices {
                if self.poll_cancel(ctx)? == Signal::Pause {
                    if self.pause(ctx, journal, &screen)? == Signal::Abort {
                        return Ok(Signal::Abort);
                    }
                    self.state = state;
                }
                ctx.clock.wait(timing.poll_slice());
                if slice == timing.word_trigger_clear_slice {
                    ctx.triggers.set_data(0)?;
                    cleared = true;
                }
            }
            if !cleared {
                ctx.triggers.set_data(0)?;
            }

            ctx.presenter.show(&Screen::Blank)?;
            ctx.clock.wait(ms(timing.inter_word_ms));
        }
        Ok(Signal::Continue)
    }

    /// Returns the chosen response key, or `None` if the operator quit.
    fn present_question(
        &mut self,
        ctx: &mut SessionContext<'_>,
        journal: &mut SessionJournal,
        trial: &SequencedTrial,
    ) -> Result<Option<String>> {
        let config = self.config;
        let keys = &config.keys;
        self.state = ControllerState::QuestionPresentation {
            trial: trial.trial_num,
        };

        self.pulse(ctx, config.triggers.question_onset)?;
        let screen = Screen::Question {
            text: trial.sentence.clone(),
            hint: config.texts.question_hint.clone(),
        };
        ctx.presenter.show(&screen)?;

        let mut accepted = vec![keys.cancel.as_str()];
        accepted.extend(keys.responses.iter().map(String::as_str));

        loop {
            let pressed = ctx.input.poll_keys(&accepted)?;
            if pressed.iter().any(|k| *k == keys.cancel) {
                if self.pause(ctx, journal, &screen)? == Signal::Abort {
                    return Ok(None);
                }
                self.state = ControllerState::QuestionPresentation {
                    trial: trial.trial_num,
                };
                continue;
            }
            if let Some(key) = pressed.into_iter().find(|k| keys.responses.contains(k)) {
                return Ok(Some(key));
            }
            ctx.clock.wait(config.timing.poll_slice());
        }
    }

    fn poll_cancel(&mut self, ctx: &mut SessionContext<'_>) -> Result<Signal> {
        let cancel = self.config.keys.cancel.as_str();
        let pressed = ctx.input.poll_keys(&[cancel])?;
        if pressed.iter().any(|k| k == cancel) {
            Ok(Signal::Pause)
        } else {
            Ok(Signal::Continue)
        }
    }

    /// Block on the pause notice. `redraw` is shown again on continue.
    fn pause(
        &mut self,
        ctx: &mut SessionContext<'_>,
        journal: &mut SessionJournal,
        redraw: &Screen,
    ) -> Result<Signal> {
        let config = self.config;
        self.state = ControllerState::Paused;
        journal.record(&TimelineEvent::marker(MarkerKind::PauseStart, self.stamp(ctx)))?;
        tracing::info!("Paused");

        ctx.presenter.show(&Screen::Notice(config.texts.pause.clone()))?;
        let key = ctx
            .input
            .wait_key(&[config.keys.resume.as_str(), config.keys.quit.as_str()])?;
        if key == config.keys.quit {
            tracing::info!("Quit requested while paused");
            return Ok(Signal::Abort);
        }

        journal.record(&TimelineEvent::marker(MarkerKind::PauseResume, self.stamp(ctx)))?;
        ctx.presenter.show(redraw)?;
        Ok(Signal::Continue)
    }

    fn block_break(
        &mut self,
        ctx: &mut SessionContext<'_>,
        journal: &mut SessionJournal,
        block: usize,
    ) -> Result<()> {
        let config = self.config;
        self.state = ControllerState::BlockBreak { block };
        journal.record(&TimelineEvent::marker(MarkerKind::BreakStart(block), self.stamp(ctx)))?;
        tracing::info!(block, "Block break");

        ctx.presenter
            .show(&Screen::Notice(config.texts.block_break.clone()))?;
        ctx.input.wait_key(&[config.keys.break_continue.as_str()])?;

        journal.record(&TimelineEvent::marker(MarkerKind::BreakEnd(block), self.stamp(ctx)))?;
        Ok(())
    }

    /// Assert `code`, hold for the pulse width, clear.
    fn pulse(&self, ctx: &mut SessionContext<'_>, code: u8) -> Result<()> {
        ctx.triggers.set_data(code)?;
        ctx.clock.wait(ms(self.config.timing.trigger_pulse_ms));
        ctx.triggers.set_data(0)
    }

    fn stamp(&self, ctx: &SessionContext<'_>) -> EventTime {
        EventTime::capture(&*ctx.clock, self.origin)
    }
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}
