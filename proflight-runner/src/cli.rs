//! CLI argument definitions for the `proflight` binary.
//!
//! Uses `clap` v4 derive macros. Flags override the configuration file
//! and environment variables (CLI > env > file > defaults).

use std::path::PathBuf;

use clap::Parser;

use proflight_core::HarnessConfig;

/// Profiling agent integration test harness.
///
/// Provisions VMs and container clusters, runs a profiled workload on
/// each and checks that profiles reach the profiling backend.
#[derive(Parser, Debug, Default)]
#[command(name = "proflight")]
#[command(version, about, long_about = None)]
pub struct RunnerCli {
    /// Path to a proflight.toml configuration file.
    ///
    /// Without it, built-in defaults plus environment overrides are used.
    #[arg(short, long, env = "PROFLIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Git commit of the agent to test.
    #[arg(long)]
    pub commit: Option<String>,

    /// Bucket used to store transient build contexts.
    #[arg(long)]
    pub bucket_name: Option<String>,

    /// Cloud project id (env: `GCLOUD_TESTS_GOLANG_PROJECT_ID`).
    #[arg(long)]
    pub project_id: Option<String>,

    /// Compute zone (env: `GCLOUD_TESTS_GOLANG_ZONE`).
    #[arg(long)]
    pub zone: Option<String>,

    /// Run identifier embedded in every resource name (default: unix time).
    #[arg(long)]
    pub run_id: Option<String>,

    /// Only run scenarios whose name contains this substring.
    #[arg(long)]
    pub only: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Print the scenario matrix and exit without provisioning anything.
    #[arg(long)]
    pub list: bool,
}

impl RunnerCli {
    /// Apply flag overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut HarnessConfig) {
        if let Some(commit) = &self.commit {
            config.run.commit.clone_from(commit);
        }
        if let Some(bucket) = &self.bucket_name {
            config.cloud.bucket_name.clone_from(bucket);
        }
        if let Some(project_id) = &self.project_id {
            config.cloud.project_id.clone_from(project_id);
        }
        if let Some(zone) = &self.zone {
            config.cloud.zone.clone_from(zone);
        }
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
    }
}
