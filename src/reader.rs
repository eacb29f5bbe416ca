//! Sources of input lines for the interactive loop.

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, IsTerminal, Write};

/// What a single read produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A line without its terminator.
    Line(String),
    /// The user pressed Ctrl-C; the partial line is discarded.
    Interrupted,
    /// End of input.
    Eof,
}

/// Prints a prompt and reads one line.
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome>;
}

/// Line editor for terminals. History is not recorded.
pub struct EditorReader {
    editor: DefaultEditor,
}

impl EditorReader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(err) => Err(err.into()),
        }
    }
}

/// Reader for non-interactive input: writes the prompt to `output` and reads
/// a line from `input`.
pub struct PlainReader<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PlainReader<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> LineReader for PlainReader<R, W> {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(ReadOutcome::Eof);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(ReadOutcome::Line(line))
    }
}

/// Picks the line editor when stdin is a terminal and a plain buffered reader
/// otherwise.
pub fn stdio_reader() -> Result<Box<dyn LineReader>> {
    if io::stdin().is_terminal() {
        Ok(Box::new(EditorReader::new()?))
    } else {
        Ok(Box::new(PlainReader::new(io::stdin().lock(), io::stdout())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_plain_reader_prompts_and_strips_terminators() {
        let mut reader = PlainReader::new(Cursor::new("first\nsecond\r\nlast"), Vec::new());

        assert_eq!(reader.read_line("$ ").unwrap(), ReadOutcome::Line("first".into()));
        assert_eq!(reader.read_line("$ ").unwrap(), ReadOutcome::Line("second".into()));
        assert_eq!(reader.read_line("$ ").unwrap(), ReadOutcome::Line("last".into()));
        assert_eq!(reader.read_line("$ ").unwrap(), ReadOutcome::Eof);

        assert_eq!(String::from_utf8(reader.into_output()).unwrap(), "$ $ $ $ ");
    }

    #[test]
    fn test_plain_reader_keeps_blank_lines() {
        let mut reader = PlainReader::new(Cursor::new("\n  \n"), Vec::new());
        assert_eq!(reader.read_line("").unwrap(), ReadOutcome::Line("".into()));
        assert_eq!(reader.read_line("").unwrap(), ReadOutcome::Line("  ".into()));
        assert_eq!(reader.read_line("").unwrap(), ReadOutcome::Eof);
    }
}
