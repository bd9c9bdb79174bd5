use crate::errors::{ParseError, ParseErrorKind};

/// Configuration for resource limits while parsing a fast-import stream
///
/// Limits keep a hostile or corrupt stream from forcing huge allocations:
/// a `data <N>` header is checked before any byte of the payload is read.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Maximum size of a single payload (blob, message, inline data)
    pub max_payload_size: usize,

    /// Maximum number of top-level commands, 0 meaning unlimited
    pub max_commands: usize,

    /// Fail with `PrematureEndOfStream` when input ends without `done`,
    /// even if the stream never announced `feature done`
    pub require_done: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 512 * 1024 * 1024, // large binary blobs do occur in real exports
            max_commands: 0,
            require_done: false,
        }
    }
}

impl ParserConfig {
    /// Tight limits for untrusted input
    pub fn strict() -> Self {
        Self {
            max_payload_size: 64 * 1024 * 1024,
            max_commands: 10_000_000,
            require_done: true,
        }
    }

    /// No practical limits
    pub fn permissive() -> Self {
        Self {
            max_payload_size: usize::MAX,
            max_commands: 0,
            require_done: false,
        }
    }

    /// Check if a payload size is acceptable before allocating for it
    pub fn check_payload_size(&self, size: usize, line: usize) -> Result<(), ParseError> {
        if size > self.max_payload_size {
            return Err(ParseError::new(
                line,
                ParseErrorKind::PayloadTooLarge {
                    size,
                    limit: self.max_payload_size,
                },
            ));
        }
        Ok(())
    }

    /// Check if command count is within limits
    pub fn check_command_count(&self, count: usize, line: usize) -> Result<(), ParseError> {
        if self.max_commands != 0 && count > self.max_commands {
            return Err(ParseError::new(
                line,
                ParseErrorKind::TooManyCommands {
                    limit: self.max_commands,
                },
            ));
        }
        Ok(())
    }
}

/// Running counters for one parse
#[derive(Debug, Default, Clone)]
pub struct ResourceTracker {
    pub command_count: usize,
    pub payload_bytes: usize,
    pub largest_payload: usize,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_command(&mut self, config: &ParserConfig, line: usize) -> Result<(), ParseError> {
        self.command_count += 1;
        config.check_command_count(self.command_count, line)
    }

    pub fn track_payload(&mut self, size: usize) {
        self.payload_bytes = self.payload_bytes.saturating_add(size);
        self.largest_payload = self.largest_payload.max(size);
    }
}

impl std::fmt::Display for ResourceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Commands: {}, Payload: {:.1}MB (largest {} bytes)",
            self.command_count,
            self.payload_bytes as f64 / (1024.0 * 1024.0),
            self.largest_payload
        )
    }
}
