//! Derby Deterministic Simulation Testing (DST) Harness
//!
//! This crate runs the race engine against a virtual clock so that whole
//! races, including pauses and resets, replay exactly from a seed.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: the virtual clock only moves when the run loop sleeps
//! - **Race randomness**: the engine's seed hint is derived from the master seed
//! - **Host timing**: when a scenario pauses or resets comes from a separate
//!   seeded stream
//!
//! # Usage
//!
//! ```ignore
//! use derby_sim::{ScenarioRunner, ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::ResetMidRun);
//! assert!(result.passed);
//! ```

mod context;
mod report;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use report::{placements_table, RunSummary};
pub use runner::{ScenarioError, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
