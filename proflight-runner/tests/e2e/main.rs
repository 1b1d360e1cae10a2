//! E2E tests for proflight-runner.
//!
//! Drive complete scenarios (provision, poll, validate, teardown) against
//! an in-memory cloud with a paused tokio clock, so multi-minute deadlines
//! run instantly.
//!
//! # Test Structure
//!
//! - `helpers/` -- mock cloud and configuration builders
//! - `scenarios/` -- one file per behavior area
//!
//! # Running
//!
//! ```bash
//! cargo test -p proflight-runner --test e2e
//! ```

mod helpers;
mod scenarios;
