//! Terminal key input mapped to logical session signals.
//!
//! `q`, `Esc`, and `Ctrl-C` cancel the session; `p` and `Space` trigger a
//! manual capture. The physical mapping lives entirely here — the session
//! loop only ever sees a [`Signal`].

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::debug;

use crate::traits::{InputPoll, Signal};

/// Non-blocking keyboard poll for an interactive terminal.
///
/// Raw mode is enabled for the lifetime of the value so key presses arrive
/// without a newline, and restored on drop.
pub struct TerminalInput {
    raw: bool,
}

impl TerminalInput {
    /// Enable raw mode and build the poller.
    pub fn new() -> std::io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self { raw: true })
    }
}

impl Drop for TerminalInput {
    fn drop(&mut self) {
        if self.raw {
            let _ = disable_raw_mode();
        }
    }
}

impl InputPoll for TerminalInput {
    fn poll(&mut self) -> Option<Signal> {
        // At most one key event is consumed per tick.
        match event::poll(Duration::ZERO) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(err) => {
                debug!(error = %err, "input poll failed");
                return None;
            }
        }

        let Ok(Event::Key(key)) = event::read() else {
            return None;
        };
        if key.kind != KeyEventKind::Press {
            return None;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Signal::Cancel)
            }
            KeyCode::Char('q' | 'Q') | KeyCode::Esc => Some(Signal::Cancel),
            KeyCode::Char('p' | 'P' | ' ') => Some(Signal::Shutter),
            _ => None,
        }
    }
}
