//! In-memory cloud for E2E scenario tests.
//!
//! One [`MockCloud`] implements every service trait. Each call is appended
//! to a shared log so tests can assert on ordering, and a [`MockBehavior`]
//! injects failures, hangs, and panics by resource name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use proflight_core::cloud::{
    BuildService, BuildSpec, ClusterService, ClusterSpec, ComputeService, InstanceSpec,
    ObjectStore, ObjectWrite, OperationStatus, ProfileQuery, ProfileQueryBackend, WorkloadClient,
    WorkloadSpec,
};
use proflight_core::error::RemoteError;
use proflight_core::{
    BoxFuture, CloudClients, HarnessError, ImageRef, ProfileType, ResourceHandle, ResourceKind,
};

/// A profile response that passes validation.
pub const VALID_PROFILE: &str = r#"{"profile":{"functions":{"name":["main.busywork","main.main"]}},"numProfiles":5,"deployments":[{}]}"#;

/// A profile response with zero profiles.
pub const EMPTY_PROFILE: &str = r#"{"profile":{"functions":{"name":["main.busywork"]}},"numProfiles":0,"deployments":[{}]}"#;

/// Failure injection knobs. Name patterns match by substring.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Marker text appended to serial output / pod log.
    pub marker: String,
    /// Number of output polls before the marker appears (per resource).
    pub marker_after_polls: u32,
    /// Output never contains the marker.
    pub never_finish: bool,
    /// Output polls fail with a transient error this many times first.
    pub transient_output_errors: u32,
    /// `create_instance` fails for matching instance names.
    pub fail_create: Vec<String>,
    /// `create_instance` panics for matching instance names.
    pub panic_create: Vec<String>,
    /// Delete calls fail for matching resource names.
    pub fail_delete: Vec<String>,
    /// The image build operation finishes with this error.
    pub build_error: Option<String>,
    /// Profile types answered with [`EMPTY_PROFILE`].
    pub empty_profiles: Vec<ProfileType>,
    /// Profile queries never answer.
    pub hang_queries: bool,
    /// `connect` panics after the cluster exists.
    pub panic_connect: bool,
    /// Delete calls panic for matching resource names.
    pub panic_delete: Vec<String>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            marker: "busybench finished profiling".to_owned(),
            marker_after_polls: 1,
            never_finish: false,
            transient_output_errors: 0,
            fail_create: Vec::new(),
            panic_create: Vec::new(),
            fail_delete: Vec::new(),
            build_error: None,
            empty_profiles: Vec::new(),
            hang_queries: false,
            panic_connect: false,
            panic_delete: Vec::new(),
        }
    }
}

#[derive(Default)]
struct State {
    calls: Vec<String>,
    output_polls: HashMap<String, u32>,
    instances: Vec<InstanceSpec>,
    objects: Vec<ObjectWrite>,
    builds: Vec<BuildSpec>,
    clusters: Vec<ClusterSpec>,
    workloads: Vec<WorkloadSpec>,
    queries: Vec<ProfileQuery>,
}

/// Shared mock cloud. Cheap to clone; all clones share state.
#[derive(Clone, Default)]
pub struct MockCloud {
    behavior: Arc<MockBehavior>,
    state: Arc<Mutex<State>>,
}

#[allow(dead_code)]
impl MockCloud {
    /// Mock with default (always succeeding) behavior.
    pub fn new() -> Self {
        Self::with(MockBehavior::default())
    }

    /// Mock with custom behavior.
    pub fn with(behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(behavior),
            state: Arc::default(),
        }
    }

    /// Client bundle backed by this mock.
    pub fn clients(&self) -> CloudClients {
        let this = Arc::new(self.clone());
        CloudClients {
            compute: this.clone(),
            build: this.clone(),
            cluster: this.clone(),
            storage: this.clone(),
            profiler: this,
        }
    }

    /// Every recorded call, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Recorded calls whose text starts with `prefix`.
    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// Recorded calls mentioning `name`, in order.
    pub fn calls_for(&self, name: &str) -> Vec<String> {
        self.calls().into_iter().filter(|c| c.contains(name)).collect()
    }

    /// Recorded delete calls, in order.
    pub fn deletes(&self) -> Vec<String> {
        self.calls_starting_with("delete_")
    }

    /// Instance specs received by `create_instance`.
    pub fn instances(&self) -> Vec<InstanceSpec> {
        self.state.lock().unwrap().instances.clone()
    }

    /// Objects received by `write`.
    pub fn objects(&self) -> Vec<ObjectWrite> {
        self.state.lock().unwrap().objects.clone()
    }

    /// Build specs received by `submit_build`.
    pub fn builds(&self) -> Vec<BuildSpec> {
        self.state.lock().unwrap().builds.clone()
    }

    /// Cluster specs received by `create_cluster`.
    pub fn clusters(&self) -> Vec<ClusterSpec> {
        self.state.lock().unwrap().clusters.clone()
    }

    /// Workload specs received by `deploy`.
    pub fn workloads(&self) -> Vec<WorkloadSpec> {
        self.state.lock().unwrap().workloads.clone()
    }

    /// Profile queries received.
    pub fn queries(&self) -> Vec<ProfileQuery> {
        self.state.lock().unwrap().queries.clone()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn matches(patterns: &[String], name: &str) -> bool {
        patterns.iter().any(|p| name.contains(p.as_str()))
    }

    fn remove(&self, kind: &str, name: &str) -> Result<(), HarnessError> {
        self.record(format!("delete_{kind} {name}"));
        if Self::matches(&self.behavior.panic_delete, name) {
            panic!("mock panic while deleting {name}");
        }
        if Self::matches(&self.behavior.fail_delete, name) {
            return Err(HarnessError::Remote(RemoteError::Api {
                status: 403,
                message: format!("PERMISSION_DENIED: cannot delete {name}"),
            }));
        }
        Ok(())
    }

    /// Output of a VM or pod after one more poll.
    fn output(&self, kind: &str, name: &str) -> Result<String, HarnessError> {
        self.record(format!("{kind} {name}"));
        let polls = {
            let mut state = self.state.lock().unwrap();
            let polls = state.output_polls.entry(name.to_owned()).or_insert(0);
            *polls += 1;
            *polls
        };

        let b = &self.behavior;
        if polls <= b.transient_output_errors {
            return Err(HarnessError::Remote(RemoteError::NotReady(format!(
                "{name} is still starting"
            ))));
        }
        let effective = polls - b.transient_output_errors;
        if !b.never_finish && effective >= b.marker_after_polls {
            Ok(format!("running benchmark...\n{}\n", b.marker))
        } else {
            Ok("running benchmark...\n".to_owned())
        }
    }
}

impl ComputeService for MockCloud {
    fn create_instance(
        &self,
        spec: InstanceSpec,
    ) -> BoxFuture<'_, Result<ResourceHandle, HarnessError>> {
        Box::pin(async move {
            self.record(format!("create_instance {}", spec.name));
            if Self::matches(&self.behavior.panic_create, &spec.name) {
                panic!("mock panic while creating {}", spec.name);
            }
            if Self::matches(&self.behavior.fail_create, &spec.name) {
                return Err(HarnessError::Remote(RemoteError::Api {
                    status: 403,
                    message: "QUOTA_EXCEEDED: instances".to_owned(),
                }));
            }
            let handle = ResourceHandle::new(ResourceKind::Instance, spec.name.clone());
            self.state.lock().unwrap().instances.push(spec);
            Ok(handle)
        })
    }

    fn delete_instance<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), HarnessError>> {
        Box::pin(async move { self.remove("instance", name) })
    }

    fn serial_output<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<String, HarnessError>> {
        Box::pin(async move { self.output("serial_output", name) })
    }
}

impl BuildService for MockCloud {
    fn submit_build(&self, spec: BuildSpec) -> BoxFuture<'_, Result<String, HarnessError>> {
        Box::pin(async move {
            self.record(format!("submit_build {}", spec.image));
            self.state.lock().unwrap().builds.push(spec);
            Ok("operations/build/1".to_owned())
        })
    }

    fn get_operation<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<OperationStatus, HarnessError>> {
        Box::pin(async move {
            self.record(format!("get_build_operation {id}"));
            Ok(OperationStatus {
                id: id.to_owned(),
                done: true,
                error: self.behavior.build_error.clone(),
            })
        })
    }

    fn delete_image<'a>(&'a self, image: &'a ImageRef) -> BoxFuture<'a, Result<(), HarnessError>> {
        Box::pin(async move { self.remove("image", &image.to_string()) })
    }
}

impl ClusterService for MockCloud {
    fn create_cluster(&self, spec: ClusterSpec) -> BoxFuture<'_, Result<String, HarnessError>> {
        Box::pin(async move {
            self.record(format!("create_cluster {}", spec.name));
            self.state.lock().unwrap().clusters.push(spec);
            Ok("operation-1".to_owned())
        })
    }

    fn get_operation<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<OperationStatus, HarnessError>> {
        Box::pin(async move {
            self.record(format!("get_cluster_operation {id}"));
            Ok(OperationStatus::succeeded(id))
        })
    }

    fn delete_cluster<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), HarnessError>> {
        Box::pin(async move { self.remove("cluster", name) })
    }

    fn connect<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Arc<dyn WorkloadClient>, HarnessError>> {
        Box::pin(async move {
            self.record(format!("connect {name}"));
            if self.behavior.panic_connect {
                panic!("kube client init panicked");
            }
            let client: Arc<dyn WorkloadClient> = Arc::new(self.clone());
            Ok(client)
        })
    }
}

impl WorkloadClient for MockCloud {
    fn deploy(&self, spec: WorkloadSpec) -> BoxFuture<'_, Result<(), HarnessError>> {
        Box::pin(async move {
            self.record(format!("deploy {}", spec.name));
            self.state.lock().unwrap().workloads.push(spec);
            Ok(())
        })
    }

    fn fetch_log<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<String, HarnessError>> {
        Box::pin(async move { self.output("fetch_log", name) })
    }
}

impl ObjectStore for MockCloud {
    fn write(&self, object: ObjectWrite) -> BoxFuture<'_, Result<(), HarnessError>> {
        Box::pin(async move {
            self.record(format!("write_object {}", object.key));
            self.state.lock().unwrap().objects.push(object);
            Ok(())
        })
    }

    fn delete<'a>(
        &'a self,
        _bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<(), HarnessError>> {
        Box::pin(async move { self.remove("object", key) })
    }
}

impl ProfileQueryBackend for MockCloud {
    fn query(&self, query: ProfileQuery) -> BoxFuture<'_, Result<Vec<u8>, HarnessError>> {
        Box::pin(async move {
            self.record(format!("query {} {}", query.profile_type, query.service));
            if self.behavior.hang_queries {
                std::future::pending::<()>().await;
            }
            let body = if self.behavior.empty_profiles.contains(&query.profile_type) {
                EMPTY_PROFILE
            } else {
                VALID_PROFILE
            };
            self.state.lock().unwrap().queries.push(query);
            Ok(body.as_bytes().to_vec())
        })
    }
}
