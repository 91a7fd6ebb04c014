pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod git;
pub mod graph;
pub mod logging;
pub mod orchestrator;
pub mod readiness;
pub mod stages;
pub mod store;
pub mod validation;

pub use error::{BtError, Result};
