//! Sources of interactive input lines
use std::io::{self, BufRead, Write};

/// Failure to read a line
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// Reading was interrupted, e.g. by Control-C at the prompt. Not fatal.
    #[error("Interrupted")]
    Interrupted,

    #[error("End of input")]
    Eof,

    #[error("Failed to read line - {0}")]
    Io(#[from] io::Error),
}

/// A source of input lines that shows a prompt before each read
pub trait LineReader {
    /// Read one line, without its line terminator
    fn read_line(&mut self, prompt: &str) -> Result<String, ReadError>;
}

/// Line reader over any buffered reader, e.g. a non-interactive stdin
#[derive(Debug)]
pub struct BufLines<R> {
    reader: R,
    show_prompt: bool,
}

impl<R: BufRead> BufLines<R> {
    pub fn new(reader: R, show_prompt: bool) -> Self {
        Self {
            reader,
            show_prompt,
        }
    }
}

impl<R: BufRead> LineReader for BufLines<R> {
    fn read_line(&mut self, prompt: &str) -> Result<String, ReadError> {
        if self.show_prompt {
            print!("{prompt}");
            io::stdout().flush()?;
        }
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(ReadError::Eof);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}
