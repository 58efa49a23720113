//! Line input for pipesh
//!
//! A terminal gets a rustyline editor (history off); anything else is read
//! as a plain stream. Both hand out one line at a time with the newline
//! stripped, and skip lines that are blank or comments.

use std::io::{self, BufRead, BufReader, IsTerminal, Write};

use rustyline::config::Config;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use super::parser;

#[derive(Debug, PartialEq, Eq)]
pub enum InputResult {
    Line(String),
    Interrupt,
    Eof,
}

/// Lazy line sequence over any reader.
///
/// Yields lines with the trailing newline removed and drops blank ones.
/// Ends at end-of-input; a read error is yielded once and then ends it.
pub struct InputLines<R> {
    reader: R,
    done: bool,
}

impl<R: BufRead> InputLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }

    fn read_raw(&mut self) -> io::Result<Option<String>> {
        let mut buf = String::new();
        if self.reader.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        let stripped = buf.strip_suffix('\n').unwrap_or(&buf);
        let stripped = stripped.strip_suffix('\r').unwrap_or(stripped);
        Ok(Some(stripped.to_string()))
    }
}

impl<R: BufRead> Iterator for InputLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.read_raw() {
                Ok(Some(line)) if parser::is_blank(&line) => continue,
                Ok(Some(line)) => return Some(Ok(line)),
                Ok(None) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

enum Source {
    Editor(DefaultEditor),
    Stream {
        lines: InputLines<Box<dyn BufRead>>,
        show_prompt: bool,
    },
}

/// The controlling input of a shell session.
pub struct LineReader {
    source: Source,
}

impl LineReader {
    /// Editor when stdin is a terminal, plain stream otherwise.
    pub fn from_stdin() -> Self {
        if io::stdin().is_terminal() {
            match Self::interactive() {
                Ok(reader) => return reader,
                Err(e) => tracing::warn!("line editor unavailable, reading plain stdin: {}", e),
            }
            return Self::stream(BufReader::new(io::stdin()), true);
        }
        Self::stream(BufReader::new(io::stdin()), false)
    }

    pub fn interactive() -> io::Result<Self> {
        let config = Config::builder().auto_add_history(false).build();
        let editor = DefaultEditor::with_config(config).map_err(readline_to_io)?;
        Ok(Self {
            source: Source::Editor(editor),
        })
    }

    /// Plain stream source. `show_prompt` writes the prompt to stdout before each read.
    pub fn stream<R: BufRead + 'static>(reader: R, show_prompt: bool) -> Self {
        Self {
            source: Source::Stream {
                lines: InputLines::new(Box::new(reader)),
                show_prompt,
            },
        }
    }

    pub fn is_interactive(&self) -> bool {
        match &self.source {
            Source::Editor(_) => true,
            Source::Stream { show_prompt, .. } => *show_prompt,
        }
    }

    /// Block until a non-blank line, an interrupt, or end-of-input.
    pub fn read_line(&mut self, prompt: &str) -> io::Result<InputResult> {
        match &mut self.source {
            Source::Editor(editor) => loop {
                match editor.readline(prompt) {
                    Ok(line) if parser::is_blank(&line) => continue,
                    Ok(line) => return Ok(InputResult::Line(line)),
                    Err(ReadlineError::Interrupted) => return Ok(InputResult::Interrupt),
                    Err(ReadlineError::Eof) => return Ok(InputResult::Eof),
                    Err(e) => return Err(readline_to_io(e)),
                }
            },
            Source::Stream { lines, show_prompt } => {
                if *show_prompt {
                    let mut out = io::stdout();
                    write!(out, "{}", prompt)?;
                    out.flush()?;
                }
                match lines.next() {
                    Some(Ok(line)) => Ok(InputResult::Line(line)),
                    Some(Err(e)) => Err(e),
                    None => Ok(InputResult::Eof),
                }
            }
        }
    }
}

fn readline_to_io(err: ReadlineError) -> io::Error {
    match err {
        ReadlineError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_strips_newlines_and_skips_blank() {
        let input = Cursor::new("echo a\n\n   \r\npwd\r\n# note\nls | wc");
        let lines: Vec<String> = InputLines::new(input).map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["echo a", "pwd", "ls | wc"]);
    }

    #[test]
    fn test_empty_input_ends_immediately() {
        let mut lines = InputLines::new(Cursor::new(""));
        assert!(lines.next().is_none());
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_stream_reader_reports_eof() {
        let mut reader = LineReader::stream(Cursor::new("echo hi\n"), false);
        assert!(!reader.is_interactive());
        assert_eq!(
            reader.read_line("$ ").unwrap(),
            InputResult::Line("echo hi".to_string())
        );
        assert_eq!(reader.read_line("$ ").unwrap(), InputResult::Eof);
        assert_eq!(reader.read_line("$ ").unwrap(), InputResult::Eof);
    }

    #[test]
    fn test_read_error_ends_sequence() {
        struct Broken;
        impl io::Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "device gone"))
            }
        }

        let mut lines = InputLines::new(BufReader::new(Broken));
        assert!(matches!(lines.next(), Some(Err(_))));
        assert!(lines.next().is_none());
    }
}
