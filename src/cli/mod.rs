//! Command-line interface definition and dispatch

mod dispatch;
mod types;

pub use dispatch::dispatch;
pub use types::Cli;
