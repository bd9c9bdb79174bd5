//! Fast-import Stream Module
//!
//! This module contains the command model of a git fast-import stream, the
//! lazy stream parser and the serializer writing commands back out.

pub mod commands;
pub mod parser;
pub mod parsing;
pub mod serialization;


pub use commands::{
    Command, DataRef, FileChange, FileMode, Mark, ObjectRef, PersonStamp, Property, StampDate,
};
pub use parser::{parse_commands, parse_commands_with_config, write_command, write_commands};
pub use parsing::StreamParser;

pub use crate::parser_config::ParserConfig;
