//! Topology step sequences.
//!
//! Each [`Topology`] variant maps to its own ordered list of steps; both
//! share the [`ProvisioningSequencer`] for bounded creation and teardown
//! and the [`RemoteJobPoller`] for waiting on remote state.
//!
//! # Direct instance
//!
//! 1. Render the startup script
//! 2. Create the VM (script in `startup-script` metadata)
//! 3. Poll the serial port for the completion marker
//!
//! # Containerized
//!
//! 1. Render the Dockerfile and pack it into a gzipped tar
//! 2. Upload the build context
//! 3. Submit the image build and wait for the operation
//! 4. Create the cluster and wait for the operation
//! 5. Deploy the workload pod
//! 6. Poll the pod log for the completion marker

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, TimeDelta, Utc};
use tracing::info;

use proflight_core::cloud::{
    BuildSpec, ClusterSpec, InstanceSpec, ObjectAcl, ObjectWrite, OperationStatus, ProfileQuery,
    WorkloadSpec,
};
use proflight_core::{
    CategoryFailure, CloudClients, HarnessConfig, HarnessError, ProfileValidator,
    RemoteJobPoller, ResourceHandle, ResourceKind, ScenarioConfig, Template, Topology,
};
use proflight_gcp::archive::{BUILD_CONTEXT_CONTENT_TYPE, build_context};

use crate::sequencer::ProvisioningSequencer;

/// Scope granted to the VM so the agent can upload profiles.
pub const MONITORING_WRITE_SCOPE: &str = "https://www.googleapis.com/auth/monitoring.write";

/// Scope granted to cluster nodes so they can pull the built image.
pub const STORAGE_READ_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_only";

/// Tag pushed by the image build and pulled by the workload.
const IMAGE_TAG: &str = "latest";

/// Startup payload templates, parsed once per run.
#[derive(Debug, Clone)]
pub struct Payloads {
    startup: Template,
    dockerfile: Template,
}

impl Payloads {
    /// Parse the templates shipped with the binary.
    pub fn builtin() -> Result<Self, HarnessError> {
        Self::parse(
            include_str!("../templates/startup.sh"),
            include_str!("../templates/Dockerfile.tmpl"),
        )
    }

    /// Parse custom template texts.
    pub fn parse(startup: &str, dockerfile: &str) -> Result<Self, HarnessError> {
        Ok(Self {
            startup: Template::parse("startup.sh", startup)?,
            dockerfile: Template::parse("Dockerfile", dockerfile)?,
        })
    }

    /// Render the VM startup script for `scenario`.
    pub fn startup_script(
        &self,
        scenario: &ScenarioConfig,
        commit: &str,
    ) -> Result<String, HarnessError> {
        self.startup.render(&template_vars(scenario, commit))
    }

    /// Render the Dockerfile for `scenario`.
    pub fn dockerfile(
        &self,
        scenario: &ScenarioConfig,
        commit: &str,
    ) -> Result<String, HarnessError> {
        self.dockerfile.render(&template_vars(scenario, commit))
    }
}

fn template_vars<'a>(
    scenario: &'a ScenarioConfig,
    commit: &'a str,
) -> [(&'static str, &'a str); 4] {
    [
        ("RuntimeVersion", scenario.runtime_version.as_str()),
        ("Commit", commit),
        ("Service", scenario.service.as_str()),
        ("CompletionMarker", scenario.completion_marker.as_str()),
    ]
}

/// Shared, read-only inputs of every scenario task.
#[derive(Debug, Clone)]
pub struct ScenarioEnv {
    /// Cloud service clients.
    pub clients: CloudClients,
    /// Validated configuration.
    pub config: Arc<HarnessConfig>,
    /// Parsed payload templates.
    pub payloads: Arc<Payloads>,
}

/// Provision the scenario's resources and wait for the workload to finish.
///
/// Returns once the completion marker was observed. Resources created on
/// the way are registered on `seq` whether or not this succeeds.
pub async fn provision(
    seq: &mut ProvisioningSequencer,
    env: &ScenarioEnv,
    scenario: &ScenarioConfig,
) -> Result<(), HarnessError> {
    match scenario.topology {
        Topology::DirectInstance => run_direct_instance(seq, env, scenario).await,
        Topology::Containerized => run_containerized(seq, env, scenario).await,
    }
}

async fn run_direct_instance(
    seq: &mut ProvisioningSequencer,
    env: &ScenarioEnv,
    scenario: &ScenarioConfig,
) -> Result<(), HarnessError> {
    let cfg = &env.config;
    let timeouts = &cfg.timeouts;
    let startup_script = env.payloads.startup_script(scenario, &cfg.run.commit)?;

    let compute = Arc::clone(&env.clients.compute);
    let instance = scenario.resources.instance.clone();
    let spec = InstanceSpec {
        name: instance.clone(),
        machine_type: cfg.cloud.machine_type.clone(),
        source_image: cfg.cloud.source_image.clone(),
        startup_script,
        scopes: vec![MONITORING_WRITE_SCOPE.to_owned()],
    };
    let handle = ResourceHandle::new(ResourceKind::Instance, &instance).at(&cfg.cloud.zone);
    let release = {
        let compute = Arc::clone(&compute);
        let instance = instance.clone();
        move || async move { compute.delete_instance(&instance).await }
    };
    seq.acquire("create instance", handle, compute.create_instance(spec), release)
        .await?;

    let poller = RemoteJobPoller::new(
        format!("serial output of {instance}"),
        timeouts.poll_interval(),
        timeouts.instance_deadline(),
    )
    .with_cancellation(seq.cancel_token().clone());
    let compute_ref = compute.as_ref();
    let instance_ref = instance.as_str();
    let marker = scenario.completion_marker.as_str();
    poller
        .poll(
            move || compute_ref.serial_output(instance_ref),
            |output: &String| output.contains(marker),
        )
        .await
        .into_result("poll serial output", timeouts.instance_deadline())?;

    info!(instance = %instance, "workload finished on instance");
    Ok(())
}

async fn run_containerized(
    seq: &mut ProvisioningSequencer,
    env: &ScenarioEnv,
    scenario: &ScenarioConfig,
) -> Result<(), HarnessError> {
    let cfg = &env.config;
    let timeouts = &cfg.timeouts;
    let names = &scenario.resources;

    // 1. build context
    let dockerfile = env.payloads.dockerfile(scenario, &cfg.run.commit)?;
    let archive = build_context(&[("Dockerfile", dockerfile.as_bytes())])?;

    // 2. upload
    let storage = Arc::clone(&env.clients.storage);
    let bucket = cfg.cloud.bucket_name.clone();
    let object = ObjectWrite {
        bucket: bucket.clone(),
        key: names.source_object.clone(),
        bytes: archive,
        content_type: BUILD_CONTEXT_CONTENT_TYPE.to_owned(),
        acl: ObjectAcl::PublicRead,
    };
    let handle = ResourceHandle::new(ResourceKind::SourceObject, &names.source_object).at(&bucket);
    let release = {
        let storage = Arc::clone(&storage);
        let bucket = bucket.clone();
        let key = names.source_object.clone();
        move || async move { storage.delete(&bucket, &key).await }
    };
    seq.acquire("upload build context", handle, storage.write(object), release)
        .await?;

    // 3. image build
    let build = Arc::clone(&env.clients.build);
    let image = names.image.clone();
    let spec = BuildSpec {
        source_bucket: bucket,
        source_object: names.source_object.clone(),
        image: image.clone(),
    };
    let release = {
        let build = Arc::clone(&build);
        let image = image.clone();
        move || async move { build.delete_image(&image).await }
    };
    let build_op = seq
        .acquire(
            "submit image build",
            ResourceHandle::new(ResourceKind::Image, image.to_string()),
            build.submit_build(spec),
            release,
        )
        .await?;

    let build_ref = build.as_ref();
    let build_op_ref = build_op.as_str();
    let status = operation_poller(
        seq,
        format!("image build {build_op}"),
        timeouts.operation_poll_interval(),
        timeouts.build_deadline(),
    )
    .poll(
        move || build_ref.get_operation(build_op_ref),
        |s: &OperationStatus| s.done,
    )
    .await
    .into_result("image build", timeouts.build_deadline())?;
    operation_outcome("image build", status)?;
    info!(image = %image, "image built");

    // 4. cluster
    let cluster = Arc::clone(&env.clients.cluster);
    let cluster_name = names.cluster.clone();
    let spec = ClusterSpec {
        name: cluster_name.clone(),
        node_count: cfg.cloud.cluster_node_count,
        machine_type: cfg.cloud.machine_type.clone(),
        scopes: vec![STORAGE_READ_SCOPE.to_owned()],
    };
    let release = {
        let cluster = Arc::clone(&cluster);
        let cluster_name = cluster_name.clone();
        move || async move { cluster.delete_cluster(&cluster_name).await }
    };
    let cluster_op = seq
        .acquire(
            "create cluster",
            ResourceHandle::new(ResourceKind::Cluster, &cluster_name).at(&cfg.cloud.zone),
            cluster.create_cluster(spec),
            release,
        )
        .await?;

    let cluster_ref = cluster.as_ref();
    let cluster_op_ref = cluster_op.as_str();
    let status = operation_poller(
        seq,
        format!("cluster operation {cluster_op}"),
        timeouts.operation_poll_interval(),
        timeouts.cluster_deadline(),
    )
    .poll(
        move || cluster_ref.get_operation(cluster_op_ref),
        |s: &OperationStatus| s.done,
    )
    .await
    .into_result("cluster creation", timeouts.cluster_deadline())?;
    operation_outcome("cluster creation", status)?;
    info!(cluster = %cluster_name, "cluster ready");

    // 5. workload; the pod is released together with the cluster
    let workload = seq
        .step("connect to cluster", timeouts.create_timeout(), cluster.connect(&cluster_name))
        .await?;
    let pod = names.workload.clone();
    let spec = WorkloadSpec {
        name: pod.clone(),
        image: image.with_tag(IMAGE_TAG),
    };
    seq.step("deploy workload", timeouts.deploy_timeout(), workload.deploy(spec))
        .await?;

    // 6. wait for the marker
    let workload_ref = workload.as_ref();
    let pod_ref = pod.as_str();
    let marker = scenario.completion_marker.as_str();
    RemoteJobPoller::new(
        format!("log of pod {pod}"),
        timeouts.poll_interval(),
        timeouts.workload_deadline(),
    )
    .with_cancellation(seq.cancel_token().clone())
    .poll(
        move || workload_ref.fetch_log(pod_ref),
        |log: &String| log.contains(marker),
    )
    .await
    .into_result("poll pod log", timeouts.workload_deadline())?;

    info!(pod = %pod, "workload finished in cluster");
    Ok(())
}

fn operation_poller(
    seq: &ProvisioningSequencer,
    label: String,
    interval: Duration,
    deadline: Duration,
) -> RemoteJobPoller {
    RemoteJobPoller::new(label, interval, deadline).with_cancellation(seq.cancel_token().clone())
}

fn operation_outcome(step: &str, status: OperationStatus) -> Result<(), HarnessError> {
    match status.error {
        Some(reason) => Err(HarnessError::Provisioning {
            step: step.to_owned(),
            reason: format!("operation {} failed: {reason}", status.id),
        }),
        None => Ok(()),
    }
}

/// Query every expected profile category over the configured window and
/// validate each response independently.
///
/// Each query runs as a sequencer step, bounded by the query timeout and by
/// the scenario's cancellation token. A timed out or cancelled query fails
/// its category only.
pub async fn validate_profiles(
    seq: &ProvisioningSequencer,
    env: &ScenarioEnv,
    scenario: &ScenarioConfig,
) -> Vec<CategoryFailure> {
    let timeouts = &env.config.timeouts;
    let window = TimeDelta::from_std(timeouts.query_window()).unwrap_or(TimeDelta::hours(1));
    let end = Utc::now();
    let start = end - window;
    let start = start.to_rfc3339_opts(SecondsFormat::Secs, true);
    let end = end.to_rfc3339_opts(SecondsFormat::Secs, true);

    let profiler = env.clients.profiler.as_ref();
    let limit = timeouts.query_timeout();
    let validator = ProfileValidator::new(scenario.expected_function.clone());
    validator
        .validate_categories(&scenario.expected_profiles, |profile_type| {
            let query = ProfileQuery {
                service: scenario.service.clone(),
                start: start.clone(),
                end: end.clone(),
                profile_type,
            };
            async move {
                let step = format!("query {profile_type} profile");
                seq.step(&step, limit, profiler.query(query)).await
            }
        })
        .await
}
