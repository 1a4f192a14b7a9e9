//! Full-screen terminal front-end: stimulus display, keyboard input and the
//! operator prompt, all on top of crossterm.

use std::io::{self, stdout, Stdout, Write};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{execute, queue};

use wordpace_core::collab::{IdentityPrompt, InputSource, Presenter, Screen};
use wordpace_core::{CoreError, ParticipantId};

type CoreResult<T> = wordpace_core::error::Result<T>;

fn collab(err: io::Error) -> CoreError {
    CoreError::Collaborator(err.to_string())
}

/// Raw mode + alternate screen for the lifetime of the value.
///
/// Dropping it restores the terminal, including after a panic.
pub struct TerminalSession {
    out: Stdout,
}

impl TerminalSession {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut out = stdout();
        if let Err(err) = execute!(out, EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(err);
        }
        Ok(Self { out })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = execute!(self.out, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Draws each screen centered, replacing what was there.
#[derive(Default)]
pub struct TerminalPresenter;

impl TerminalPresenter {
    fn draw(&self, lines: &[(String, bool)]) -> io::Result<()> {
        let mut out = stdout();
        let (cols, rows) = terminal::size()?;
        queue!(out, Clear(ClearType::All))?;

        let top = (rows / 2).saturating_sub(lines.len() as u16 / 2);
        for (offset, (line, bold)) in lines.iter().enumerate() {
            let width = line.chars().count() as u16;
            let x = (cols / 2).saturating_sub(width / 2);
            queue!(out, MoveTo(x, top + offset as u16))?;
            if *bold {
                queue!(out, SetAttribute(Attribute::Bold), Print(line), SetAttribute(Attribute::Reset))?;
            } else {
                queue!(out, Print(line))?;
            }
        }
        out.flush()
    }
}

fn plain_lines(text: &str) -> Vec<(String, bool)> {
    text.lines().map(|l| (l.to_string(), false)).collect()
}

impl Presenter for TerminalPresenter {
    fn show(&mut self, screen: &Screen) -> CoreResult<()> {
        let lines = match screen {
            Screen::Blank => Vec::new(),
            Screen::Fixation(mark) => vec![(mark.clone(), true)],
            Screen::Word(word) => vec![(word.clone(), true)],
            Screen::Question { text, hint } => {
                let mut lines = plain_lines(text);
                lines.push((String::new(), false));
                lines.extend(plain_lines(hint));
                lines
            }
            Screen::Notice(text) => plain_lines(text),
        };
        self.draw(&lines).map_err(collab)
    }
}

/// Lowercase key name as used in the config (`"space"`, `"escape"`, `"n"`).
pub fn key_name(key: &KeyEvent) -> Option<String> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char(' ') => Some("space".into()),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some("ctrl-c".into()),
        KeyCode::Char(c) => Some(c.to_lowercase().collect()),
        KeyCode::Esc => Some("escape".into()),
        KeyCode::Enter => Some("enter".into()),
        KeyCode::Backspace => Some("backspace".into()),
        _ => None,
    }
}

fn read_key() -> io::Result<Option<(KeyEvent, String)>> {
    match event::read()? {
        Event::Key(key) => Ok(key_name(&key).map(|name| (key, name))),
        _ => Ok(None),
    }
}

/// Keyboard input through crossterm's event queue.
#[derive(Default)]
pub struct TerminalInput;

impl InputSource for TerminalInput {
    fn poll_keys(&mut self, accepted: &[&str]) -> CoreResult<Vec<String>> {
        let mut keys = Vec::new();
        while event::poll(Duration::ZERO).map_err(collab)? {
            if let Some((_, name)) = read_key().map_err(collab)? {
                if accepted.contains(&name.as_str()) {
                    keys.push(name);
                }
            }
        }
        Ok(keys)
    }

    fn wait_key(&mut self, accepted: &[&str]) -> CoreResult<String> {
        loop {
            if let Some((_, name)) = read_key().map_err(collab)? {
                if accepted.is_empty() || accepted.contains(&name.as_str()) {
                    return Ok(name);
                }
            }
        }
    }
}

/// Operator prompt drawn on the stimulus screen.
pub struct TerminalIdentity {
    preset: Option<String>,
}

impl TerminalIdentity {
    /// With `preset`, the id prompt is skipped.
    pub fn new(preset: Option<String>) -> Self {
        Self { preset }
    }

    fn read_line(&self, label: &str) -> io::Result<Option<String>> {
        let presenter = TerminalPresenter;
        let mut buffer = String::new();
        loop {
            presenter.draw(&[
                (label.to_string(), true),
                (format!("> {buffer}_"), false),
                (String::new(), false),
                ("ENTER: confirm, ESC: cancel".to_string(), false),
            ])?;
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Enter => return Ok(Some(buffer)),
                KeyCode::Esc => return Ok(None),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(None),
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(c) => buffer.push(c),
                _ => {}
            }
        }
    }
}

impl IdentityPrompt for TerminalIdentity {
    fn participant_id(&mut self) -> CoreResult<Option<String>> {
        if let Some(id) = self.preset.take() {
            return Ok(Some(id));
        }
        self.read_line("Participant ID").map_err(collab)
    }

    fn confirm_resume(&mut self, participant: &ParticipantId, resume_point: u32) -> CoreResult<bool> {
        let presenter = TerminalPresenter;
        presenter
            .draw(&[
                (format!("Previous data found for {participant}"), true),
                (format!("Continue from trial {resume_point}?"), false),
                (String::new(), false),
                ("Y: resume, N: start over".to_string(), false),
            ])
            .map_err(collab)?;
        let mut input = TerminalInput;
        let key = input.wait_key(&["y", "n"])?;
        Ok(key == "y")
    }
}
