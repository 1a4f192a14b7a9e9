//! Timeline event types and their row encodings.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::timeline::Clock;

/// Header of the trial-outcome stream.
pub const TRIAL_HEADER: [&str; 8] = [
    "trial_num",
    "sentence_id",
    "sentence",
    "question",
    "correct_answer",
    "response",
    "event_time",
    "real_time",
];

/// Header of the word-event stream.
pub const WORD_HEADER: [&str; 5] = ["trial_num", "sentence_id", "word", "event_time", "real_time"];

/// When an event happened: offset from session start plus local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTime {
    pub elapsed: Duration,
    pub wall: NaiveTime,
}

impl EventTime {
    /// Stamp "now" relative to `origin`.
    pub fn capture(clock: &dyn Clock, origin: Duration) -> Self {
        Self {
            elapsed: clock.elapsed().saturating_sub(origin),
            wall: clock.wall_time(),
        }
    }

    pub fn elapsed_text(&self) -> String {
        format_elapsed(self.elapsed)
    }

    pub fn wall_text(&self) -> String {
        self.wall.format("%H:%M:%S%.3f").to_string()
    }
}

/// `H:MM:SS[.ffffff]`, the way the analysis scripts expect offsets.
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match d.subsec_micros() {
        0 => format!("{h}:{m:02}:{s:02}"),
        micros => format!("{h}:{m:02}:{s:02}.{micros:06}"),
    }
}

/// Reserved tags interleaved with real events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerKind {
    ResumeDetected,
    PauseStart,
    PauseResume,
    /// 1-based number of the block that just ended.
    BreakStart(usize),
    BreakEnd(usize),
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerKind::ResumeDetected => f.write_str("RESUME_DETECTED"),
            MarkerKind::PauseStart => f.write_str("PAUSE_START"),
            MarkerKind::PauseResume => f.write_str("PAUSE_RESUME"),
            MarkerKind::BreakStart(block) => write!(f, "BREAK_START_block{block}"),
            MarkerKind::BreakEnd(block) => write!(f, "BREAK_END_block{block}"),
        }
    }
}

/// Outcome of one presented trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialRecord {
    pub trial_num: u32,
    pub sentence_id: String,
    pub sentence: String,
    pub question: String,
    pub correct_answer: String,
    /// Empty for sentence trials; the pressed key for questions.
    pub response: String,
    pub at: EventTime,
}

/// Onset of one presented word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordEvent {
    pub trial_num: u32,
    pub sentence_id: String,
    pub word: String,
    pub at: EventTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMarker {
    pub kind: MarkerKind,
    pub at: EventTime,
}

/// Everything the journal records.
///
/// Trial records go to the trial stream, word events to the word stream,
/// and control markers to both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEvent {
    Trial(TrialRecord),
    Word(WordEvent),
    Marker(ControlMarker),
}

impl TimelineEvent {
    pub fn marker(kind: MarkerKind, at: EventTime) -> Self {
        TimelineEvent::Marker(ControlMarker { kind, at })
    }

    pub fn at(&self) -> EventTime {
        match self {
            TimelineEvent::Trial(r) => r.at,
            TimelineEvent::Word(w) => w.at,
            TimelineEvent::Marker(m) => m.at,
        }
    }

    pub fn trial_row(&self) -> Option<TrialRow> {
        match self {
            TimelineEvent::Trial(r) => Some(TrialRow {
                trial_num: r.trial_num.to_string(),
                sentence_id: r.sentence_id.clone(),
                sentence: r.sentence.clone(),
                question: r.question.clone(),
                correct_answer: r.correct_answer.clone(),
                response: r.response.clone(),
                event_time: r.at.elapsed_text(),
                real_time: r.at.wall_text(),
            }),
            TimelineEvent::Marker(m) => Some(TrialRow {
                sentence_id: m.kind.to_string(),
                event_time: m.at.elapsed_text(),
                real_time: m.at.wall_text(),
                ..TrialRow::default()
            }),
            TimelineEvent::Word(_) => None,
        }
    }

    pub fn word_row(&self) -> Option<WordRow> {
        match self {
            TimelineEvent::Word(w) => Some(WordRow {
                trial_num: w.trial_num.to_string(),
                sentence_id: w.sentence_id.clone(),
                word: w.word.clone(),
                event_time: w.at.elapsed_text(),
                real_time: w.at.wall_text(),
            }),
            TimelineEvent::Marker(m) => Some(WordRow {
                sentence_id: m.kind.to_string(),
                event_time: m.at.elapsed_text(),
                real_time: m.at.wall_text(),
                ..WordRow::default()
            }),
            TimelineEvent::Trial(_) => None,
        }
    }
}

/// A row of the trial stream as written to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialRow {
    pub trial_num: String,
    pub sentence_id: String,
    pub sentence: String,
    pub question: String,
    pub correct_answer: String,
    pub response: String,
    pub event_time: String,
    pub real_time: String,
}

/// A row of the word stream as written to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRow {
    pub trial_num: String,
    pub sentence_id: String,
    pub word: String,
    pub event_time: String,
    pub real_time: String,
}

/// Rows that can be rebuilt from a positional CSV record.
pub trait JournalRow: Serialize + Clone {
    const HEADER: &'static [&'static str];

    fn from_record(record: &csv::StringRecord) -> Self;
}

impl JournalRow for TrialRow {
    const HEADER: &'static [&'static str] = &TRIAL_HEADER;

    fn from_record(record: &csv::StringRecord) -> Self {
        let field = |i: usize| record.get(i).unwrap_or_default().to_string();
        Self {
            trial_num: field(0),
            sentence_id: field(1),
            sentence: field(2),
            question: field(3),
            correct_answer: field(4),
            response: field(5),
            event_time: field(6),
            real_time: field(7),
        }
    }
}

impl JournalRow for WordRow {
    const HEADER: &'static [&'static str] = &WORD_HEADER;

    fn from_record(record: &csv::StringRecord) -> Self {
        let field = |i: usize| record.get(i).unwrap_or_default().to_string();
        Self {
            trial_num: field(0),
            sentence_id: field(1),
            word: field(2),
            event_time: field(3),
            real_time: field(4),
        }
    }
}
