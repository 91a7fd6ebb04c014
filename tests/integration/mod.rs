//! Integration tests for bt against real git repositories
//!
//! These tests build temporary repositories with the `git` CLI and drive the
//! orchestrator, the readiness query and the `bt` binary end to end.

pub mod build_cycle;
pub mod cli;
pub mod concurrency;
pub mod generators;
pub mod helpers;
pub mod readiness;
