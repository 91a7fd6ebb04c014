//! CLI command implementations
//!
//! Each command is a thin wrapper over the library: it opens the repository,
//! calls into the core and prints the result.

pub mod build;
mod common;
pub mod ready;
pub mod results;
