//! Pipeline parser
//!
//! A line is split on `|` into stages, and each stage on whitespace into
//! tokens. There is no quoting, no expansion and no other operator:
//!
//! - Simple command: `ls -la`
//! - Pipeline: `ls | grep foo | head`
//!
//! A stage with no tokens (`a || b`, `| wc`, `ls |`) rejects the whole line.

use super::error::ParseError;

/// Stage separator.
pub const SEPARATOR: char = '|';

/// One pipeline stage: program name followed by its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    argv: Vec<String>,
}

impl Command {
    /// Build a command from tokens. Returns `None` when there are no tokens.
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() {
            None
        } else {
            Some(Self { argv })
        }
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

/// Ordered, non-empty sequence of stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Command>,
}

impl Pipeline {
    pub fn stages(&self) -> &[Command] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The only stage of a single-stage pipeline.
    pub fn single(&self) -> Option<&Command> {
        match self.stages.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// True for lines the shell skips without dispatching.
pub fn is_blank(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Parse one line into a pipeline.
pub fn parse(line: &str) -> Result<Pipeline, ParseError> {
    if is_blank(line) {
        return Err(ParseError::Empty);
    }

    let mut stages = Vec::new();
    for (index, segment) in line.split(SEPARATOR).enumerate() {
        let tokens: Vec<String> = segment.split_whitespace().map(str::to_string).collect();
        let command = Command::new(tokens).ok_or(ParseError::EmptyStage { index })?;
        stages.push(command);
    }

    Ok(Pipeline { stages })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(s: &str) -> Command {
        Command::new(s.split_whitespace().map(str::to_string).collect()).unwrap()
    }

    #[test]
    fn test_simple_split() {
        let pipeline = parse("ls -la").unwrap();
        assert_eq!(pipeline.stages(), &[cmd("ls -la")]);
        assert_eq!(pipeline.single().unwrap().program(), "ls");
        assert_eq!(pipeline.single().unwrap().args(), &["-la".to_string()]);
    }

    #[test]
    fn test_collapses_whitespace() {
        let pipeline = parse("  echo \t a    b  ").unwrap();
        assert_eq!(
            pipeline.single().unwrap().argv(),
            &["echo".to_string(), "a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_parse_pipeline() {
        let pipeline = parse("ls | grep src|wc -l").unwrap();
        assert_eq!(
            pipeline.stages(),
            &[
                cmd("ls"),
                cmd("grep src"),
                cmd("wc -l"),
            ]
        );
        assert!(pipeline.single().is_none());
    }

    #[test]
    fn test_empty_stage_rejected() {
        assert_eq!(parse("ls || wc"), Err(ParseError::EmptyStage { index: 1 }));
        assert_eq!(parse("ls |   | wc"), Err(ParseError::EmptyStage { index: 1 }));
    }

    #[test]
    fn test_leading_and_trailing_separator_rejected() {
        assert_eq!(parse("| wc"), Err(ParseError::EmptyStage { index: 0 }));
        assert_eq!(parse("ls |"), Err(ParseError::EmptyStage { index: 1 }));
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert!(is_blank(""));
        assert!(is_blank("   \t"));
        assert!(is_blank("  # just a note"));
        assert!(!is_blank("echo #not a comment"));
        assert_eq!(parse("   "), Err(ParseError::Empty));
    }

    #[test]
    fn test_no_quote_handling() {
        let pipeline = parse("echo 'a b'").unwrap();
        assert_eq!(pipeline.single().unwrap().args(), &["'a".to_string(), "b'".to_string()]);
    }
}
