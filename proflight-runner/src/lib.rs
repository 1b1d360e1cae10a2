//! Proflight runner library.
//!
//! Exposes the runner internals for integration testing.
//! In production, `proflight` is used as a binary (main.rs).
//!
//! # Module Structure
//!
//! - [`cli`]: command-line flags
//! - [`app`]: configuration loading, planning and run assembly
//! - [`scenario`]: scenario matrix and resource naming
//! - [`sequencer`]: bounded create steps and reverse-order teardown
//! - [`topology`]: direct-instance and containerized step sequences
//! - [`runner`]: parallel scenario execution and reports
//! - [`logging`]: tracing subscriber setup
//! - [`error`]: runner errors and exit codes

pub mod app;
pub mod cli;
pub mod error;
pub mod logging;
pub mod runner;
pub mod scenario;
pub mod sequencer;
pub mod topology;

pub use error::RunError;
pub use runner::{RunSummary, ScenarioReport, TestScenarioRunner};
pub use sequencer::{CleanupFailure, ProvisioningSequencer, TeardownStack};
