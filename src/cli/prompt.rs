//! Interactive password prompt.

use std::io::{self, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::error::{AppError, Result};

/// What a key press does to the password being typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Submit,
    Cancel,
}

/// Leaves raw mode when dropped.
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Read a password from the terminal without echo.
///
/// # Errors
///
/// Returns `PromptCancelled` on Ctrl-C or Esc, or `Io` if the terminal
/// cannot be put into raw mode.
pub fn read_password(prompt: &str) -> Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{prompt}")?;
    stderr.flush()?;

    let result = {
        let _raw = RawMode::enable()?;
        read_until_submit()
    };
    writeln!(stderr)?;
    result
}

fn read_until_submit() -> Result<String> {
    let mut password = String::new();
    loop {
        if let Event::Key(key) = event::read()? {
            match apply_key(&mut password, key) {
                KeyOutcome::Continue => {}
                KeyOutcome::Submit => return Ok(password),
                KeyOutcome::Cancel => return Err(AppError::PromptCancelled),
            }
        }
    }
}

fn apply_key(password: &mut String, key: KeyEvent) -> KeyOutcome {
    if key.kind == KeyEventKind::Release {
        return KeyOutcome::Continue;
    }
    match key.code {
        KeyCode::Enter => KeyOutcome::Submit,
        KeyCode::Esc => KeyOutcome::Cancel,
        KeyCode::Char('c' | 'd') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            KeyOutcome::Cancel
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            password.clear();
            KeyOutcome::Continue
        }
        KeyCode::Char(c) => {
            password.push(c);
            KeyOutcome::Continue
        }
        KeyCode::Backspace => {
            password.pop();
            KeyOutcome::Continue
        }
        _ => KeyOutcome::Continue,
    }
}
