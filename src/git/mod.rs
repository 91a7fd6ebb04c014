//! Git-backed object store
//!
//! This module provides:
//! - A git command runner with consistent error handling
//! - `GitObjectStore`, which implements `ObjectStore` with git plumbing commands

pub mod runner;
mod store;

pub use store::GitObjectStore;

use crate::error::{BtError, Result};

/// Check that the git binary is available on PATH
pub fn check_git_available() -> Result<()> {
    which::which("git")
        .map(|_| ())
        .map_err(|e| BtError::store("locate git", format!("git not found on PATH: {e}")))
}
