//! Fast-import Parser Interface Module
//!
//! Convenience functions over `StreamParser` for inputs already in memory,
//! and the matching writers.

use super::commands::Command;
use super::parsing::StreamParser;
use crate::errors::{FastImportError, FastImportResult};
use crate::traits::FastImportWriter;
use crate::{ParserConfig, ResourceTracker};
use bytes::BytesMut;
use std::io::Write;

/// Parse a complete stream with default configuration
pub fn parse_commands(data: &[u8]) -> FastImportResult<Vec<Command>> {
    let mut tracker = ResourceTracker::new();
    parse_commands_with_config(data, &ParserConfig::default(), &mut tracker)
}

/// Parse a complete stream with resource tracking and limits
pub fn parse_commands_with_config(
    data: &[u8],
    config: &ParserConfig,
    tracker: &mut ResourceTracker,
) -> FastImportResult<Vec<Command>> {
    let mut parser = StreamParser::with_config(data, config.clone());
    let result = parser.by_ref().collect::<FastImportResult<Vec<_>>>();
    *tracker = parser.tracker().clone();
    result
}

/// Write a single command to `writer`
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> FastImportResult<()> {
    let mut buffer = BytesMut::new();
    command.write_to(&mut buffer);
    writer
        .write_all(&buffer)
        .map_err(|e| FastImportError::io("writing output", &e))
}

/// Write commands in order to `writer`
pub fn write_commands<'a, W, I>(writer: &mut W, commands: I) -> FastImportResult<()>
where
    W: Write,
    I: IntoIterator<Item = &'a Command>,
{
    for command in commands {
        write_command(writer, command)?;
    }
    Ok(())
}
