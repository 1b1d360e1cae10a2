//! Scenario matrix construction.
//!
//! One [`ScenarioConfig`] per (topology, runtime version) pair. Every
//! resource name embeds the run id and the runtime tag so that parallel
//! scenarios, and parallel runs, never collide.

use proflight_core::types::ResourceNames;
use proflight_core::{ConfigError, HarnessConfig, ImageRef, RunId, ScenarioConfig, Topology};

/// Prefix shared by every resource the harness creates.
pub const RESOURCE_PREFIX: &str = "profiler-test";

/// File name of the build context object.
const BUILD_CONTEXT_FILE: &str = "Dockerfile.tar.gz";

/// GKE rejects cluster names longer than this.
pub const MAX_CLUSTER_NAME_LEN: usize = 40;

/// Compute Engine and Kubernetes reject names longer than this.
pub const MAX_RESOURCE_NAME_LEN: usize = 63;

/// Build the full scenario matrix: direct-instance versions first, then
/// containerized versions, each in configuration order.
pub fn build_matrix(config: &HarnessConfig, run_id: &RunId) -> Vec<ScenarioConfig> {
    let direct = config
        .run
        .direct_versions
        .iter()
        .map(|v| build_scenario(config, run_id, Topology::DirectInstance, v));
    let containerized = config
        .run
        .containerized_versions
        .iter()
        .map(|v| build_scenario(config, run_id, Topology::Containerized, v));

    direct.chain(containerized).collect()
}

/// Reject scenarios whose derived resource names exceed the API limits.
///
/// Runs before any cloud call, so an overlong run id or runtime version is
/// a configuration error rather than a failed create.
pub fn check_resource_names(scenarios: &[ScenarioConfig]) -> Result<(), ConfigError> {
    for scenario in scenarios {
        let names = &scenario.resources;
        let checks: &[(&str, usize)] = match scenario.topology {
            Topology::DirectInstance => &[(names.instance.as_str(), MAX_RESOURCE_NAME_LEN)],
            Topology::Containerized => &[
                (names.cluster.as_str(), MAX_CLUSTER_NAME_LEN),
                (names.workload.as_str(), MAX_RESOURCE_NAME_LEN),
            ],
        };
        for &(name, limit) in checks {
            if name.len() > limit {
                return Err(ConfigError::InvalidValue {
                    field: "run_id".to_owned(),
                    reason: format!(
                        "resource name '{name}' of scenario {} is {} chars, limit is {limit}; \
                         use a shorter run id",
                        scenario.name,
                        name.len()
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Keep only scenarios whose name contains `pattern`.
pub fn filter(scenarios: Vec<ScenarioConfig>, pattern: Option<&str>) -> Vec<ScenarioConfig> {
    match pattern {
        Some(p) if !p.is_empty() => scenarios.into_iter().filter(|s| s.name.contains(p)).collect(),
        _ => scenarios,
    }
}

/// Runtime tag used in resource names, e.g. `go` + `1.22` -> `go122`.
pub fn runtime_tag(runtime_name: &str, version: &str) -> String {
    runtime_name
        .chars()
        .chain(version.chars())
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn build_scenario(
    config: &HarnessConfig,
    run_id: &RunId,
    topology: Topology,
    version: &str,
) -> ScenarioConfig {
    let tag = runtime_tag(&config.run.runtime_name, version);
    let base = format!("{RESOURCE_PREFIX}-{tag}-{run_id}");
    let service = format!("{base}-{}", topology.service_suffix());

    let resources = ResourceNames {
        instance: base.clone(),
        cluster: format!("{RESOURCE_PREFIX}-cluster-{tag}-{run_id}"),
        workload: format!("{RESOURCE_PREFIX}-pod-{tag}-{run_id}"),
        source_object: format!("{RESOURCE_PREFIX}/{run_id}/{tag}/{BUILD_CONTEXT_FILE}"),
        image: ImageRef::new(
            config.cloud.registry.clone(),
            format!("{}/{base}", config.cloud.project_id),
        ),
    };

    ScenarioConfig {
        name: service.clone(),
        service,
        runtime_version: version.to_owned(),
        topology,
        expected_profiles: config.run.profile_types.clone(),
        expected_function: config.run.expected_function.clone(),
        completion_marker: config.run.completion_marker.clone(),
        resources,
    }
}
