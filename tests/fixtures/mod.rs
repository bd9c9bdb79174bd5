//! Test fixtures and data generators
//!
//! This module contains builders for creating fast-import test streams.

pub mod builders;

pub use builders::*;
