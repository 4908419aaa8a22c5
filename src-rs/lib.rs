//! Resilience harness for standalone GUI applications.
//!
//! A run launches the application (killing stale instances first), brings
//! its window forward, drives it with a scripted navigation sequence or a
//! time-boxed chaos campaign, and reports SUCCESS if the process is still
//! alive at the end. Screenshots are taken at startup and at the end for
//! offline review.

pub mod artifacts;
pub mod backend;
pub mod chaos;
pub mod config;
pub mod error;
pub mod focus;
pub mod navigate;
pub mod orchestrator;
pub mod process;
pub mod target;

pub use config::{Mode, RunConfig, Timings};
pub use error::HarnessError;
pub use orchestrator::{Orchestrator, Outcome, RunResult};
pub use target::ApplicationTarget;
