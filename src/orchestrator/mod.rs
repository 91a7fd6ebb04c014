//! Build orchestration
//!
//! The orchestrator drives one revision at a time. A cycle reads the current
//! revision, loads its stage graph, then runs waves of ready stages until no
//! stage is ready. Every decision re-reads the result store, so several
//! orchestrators can share one repository.

mod cycle;
mod daemon;
mod orchestrator;


pub use cycle::CycleReport;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
