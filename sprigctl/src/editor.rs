//! Line editor for the sprigctl REPL

use rustyline::{
    error::ReadlineError, history::DefaultHistory, Completer, Helper, Highlighter, Hinter,
    Validator,
};
use sprig::{LineReader, ReadError};
use std::io;
use tracing::warn;

/// Custom rustyline::Editor
type Editor = rustyline::Editor<ReplHelper, DefaultHistory>;

/// Blocks are completed by the session, so every line is accepted as typed
#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
pub struct ReplHelper {}

/// Terminal line source with in-memory history
pub struct ReplEditor {
    rl: Editor,
}

impl ReplEditor {
    pub fn new() -> rustyline::Result<Self> {
        let mut rl = rustyline::Editor::new()?;
        rl.set_helper(Some(ReplHelper {}));
        Ok(Self { rl })
    }
}

impl LineReader for ReplEditor {
    fn read_line(&mut self, prompt: &str) -> Result<String, ReadError> {
        match self.rl.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(e) = self.rl.add_history_entry(line.as_str()) {
                        warn!("Failed to add history entry - {e}");
                    }
                }
                Ok(line)
            }
            Err(ReadlineError::Interrupted) => Err(ReadError::Interrupted),
            Err(ReadlineError::Eof) => Err(ReadError::Eof),
            Err(ReadlineError::Io(e)) => Err(ReadError::Io(e)),
            Err(e) => Err(ReadError::Io(io::Error::other(e))),
        }
    }
}
