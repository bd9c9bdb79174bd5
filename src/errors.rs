use std::fmt;
use thiserror::Error;

/// Reason a fast-import stream could not be parsed
///
/// Every variant is fatal: the parser stops at the first one and never
/// tries to resynchronise on the next keyword.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A line at command level does not start with a known keyword
    #[error("Invalid command '{command}'")]
    InvalidCommand { command: String },

    /// A section required by the grammar is absent
    #[error("Command {command} is missing section {section}")]
    MissingSection { command: String, section: String },

    /// A section is present but malformed
    #[error("Bad format for section {section} in command {command}: found '{text}'")]
    BadFormat {
        command: String,
        section: String,
        text: String,
    },

    /// End of input inside an exact-length payload
    #[error("Unexpected EOF - expected {expected} bytes, found {found}")]
    MissingBytes { expected: usize, found: usize },

    /// End of input inside a delimited payload
    #[error("Unexpected EOF - expected '{terminator}' terminator")]
    MissingTerminator { terminator: String },

    /// A numeric field is not a base-10 integer
    #[error("Invalid number for {field}: '{text}'")]
    InvalidNumber { field: String, text: String },

    /// Mark syntax other than `:<id>`
    #[error("Invalid mark '{text}'")]
    InvalidMark { text: String },

    /// Absolute or otherwise unusable path
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// `feature done` was announced but the stream ended without `done`
    #[error("Stream end before 'done' command")]
    PrematureEndOfStream,

    /// Payload larger than the configured limit
    #[error("Payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// More commands than the configured limit
    #[error("Command count exceeds limit of {limit}")]
    TooManyCommands { limit: usize },
}

/// A grammar violation together with the 1-based input line it was found on
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(line: usize, kind: ParseErrorKind) -> Self {
        Self { line, kind }
    }

    /// Human-readable reason without the line prefix
    pub fn reason(&self) -> String {
        self.kind.to_string()
    }
}

/// Top-level error type for stream parsing, filtering and writing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FastImportError {
    // ========== STREAM ERRORS (1000-1099) ==========
    /// The input violates the fast-import grammar
    #[error(transparent)]
    Parse(#[from] ParseError),

    // ========== I/O ERRORS (2000-2099) ==========
    /// Reading the source or writing the sink failed
    #[error("I/O error while {context}: {reason}")]
    Io { context: String, reason: String },

    // ========== CONFIGURATION ERRORS (3000-3099) ==========
    /// Filter or parser configuration is unusable
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },
}

impl FastImportError {
    /// Get the error code for machine-readable processing
    pub fn code(&self) -> u16 {
        match self {
            Self::Parse(err) => match err.kind {
                ParseErrorKind::InvalidCommand { .. } => 1001,
                ParseErrorKind::MissingSection { .. } => 1002,
                ParseErrorKind::BadFormat { .. } => 1003,
                ParseErrorKind::MissingBytes { .. } => 1004,
                ParseErrorKind::MissingTerminator { .. } => 1005,
                ParseErrorKind::InvalidNumber { .. } => 1006,
                ParseErrorKind::InvalidMark { .. } => 1007,
                ParseErrorKind::InvalidPath { .. } => 1008,
                ParseErrorKind::PrematureEndOfStream => 1009,
                ParseErrorKind::PayloadTooLarge { .. } => 1010,
                ParseErrorKind::TooManyCommands { .. } => 1011,
            },
            Self::Io { .. } => 2001,
            Self::InvalidConfig { .. } => 3001,
        }
    }

    /// Get the error category for grouping related errors
    pub fn category(&self) -> ErrorCategory {
        match self.code() {
            1000..=1099 => ErrorCategory::Stream,
            2000..=2099 => ErrorCategory::IO,
            3000..=3099 => ErrorCategory::Configuration,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Line number of the offending input, for parse failures
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Parse(err) => Some(err.line),
            _ => None,
        }
    }

    pub fn io(context: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            reason: err.to_string(),
        }
    }
}

/// Error categories for grouping related error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Stream,
    IO,
    Configuration,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream => write!(f, "Stream"),
            Self::IO => write!(f, "I/O"),
            Self::Configuration => write!(f, "Configuration"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Result type alias for stream operations
pub type FastImportResult<T> = Result<T, FastImportError>;

impl From<std::io::Error> for FastImportError {
    fn from(err: std::io::Error) -> Self {
        FastImportError::Io {
            context: "accessing stream".to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_unique() {
        let mut codes = std::collections::HashSet::new();

        let kinds = vec![
            ParseErrorKind::InvalidCommand { command: "x".to_string() },
            ParseErrorKind::MissingSection { command: "x".to_string(), section: "y".to_string() },
            ParseErrorKind::BadFormat {
                command: "x".to_string(),
                section: "y".to_string(),
                text: "z".to_string(),
            },
            ParseErrorKind::MissingBytes { expected: 1, found: 0 },
            ParseErrorKind::MissingTerminator { terminator: "EOT".to_string() },
            ParseErrorKind::InvalidNumber { field: "x".to_string(), text: "y".to_string() },
            ParseErrorKind::InvalidMark { text: "x".to_string() },
            ParseErrorKind::InvalidPath { path: "/x".to_string(), reason: "y".to_string() },
            ParseErrorKind::PrematureEndOfStream,
            ParseErrorKind::PayloadTooLarge { size: 2, limit: 1 },
            ParseErrorKind::TooManyCommands { limit: 1 },
        ];
        let mut errors: Vec<FastImportError> = kinds
            .into_iter()
            .map(|kind| ParseError::new(1, kind).into())
            .collect();
        errors.push(FastImportError::Io { context: "x".to_string(), reason: "y".to_string() });
        errors.push(FastImportError::InvalidConfig { field: "x".to_string(), reason: "y".to_string() });

        for error in &errors {
            assert!(codes.insert(error.code()), "duplicate code {}", error.code());
        }
    }

    #[test]
    fn test_parse_error_display_carries_line() {
        let err = ParseError::new(
            7,
            ParseErrorKind::MissingBytes { expected: 10, found: 3 },
        );
        assert_eq!(err.to_string(), "line 7: Unexpected EOF - expected 10 bytes, found 3");
        assert_eq!(err.reason(), "Unexpected EOF - expected 10 bytes, found 3");

        let wrapped: FastImportError = err.into();
        assert_eq!(wrapped.line(), Some(7));
        assert_eq!(wrapped.category(), ErrorCategory::Stream);
        assert_eq!(wrapped.to_string(), "line 7: Unexpected EOF - expected 10 bytes, found 3");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = FastImportError::io("writing output", &io);
        assert_eq!(err.category(), ErrorCategory::IO);
        assert_eq!(err.line(), None);
        assert!(err.to_string().contains("writing output"));
    }
}
