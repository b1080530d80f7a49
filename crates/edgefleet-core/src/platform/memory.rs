//! In-process cluster used for dry runs and tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::deploy::workload::{EndpointSpec, WorkloadSpec};
use crate::error::PlatformError;

use super::{ClusterPlatform, PlatformResult};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub workload_creates: usize,
    pub workload_updates: usize,
    pub endpoint_creates: usize,
    pub endpoint_updates: usize,
}

#[derive(Debug, Default)]
struct ClusterState {
    workloads: BTreeMap<String, WorkloadSpec>,
    endpoints: BTreeMap<String, EndpointSpec>,
    calls: CallCounts,
}

#[derive(Debug, Default)]
pub struct InMemoryCluster {
    state: Mutex<ClusterState>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        // state is plain data; a panic mid-update cannot leave it torn
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn workloads(&self) -> Vec<WorkloadSpec> {
        self.lock().workloads.values().cloned().collect()
    }

    pub fn endpoints(&self) -> Vec<EndpointSpec> {
        self.lock().endpoints.values().cloned().collect()
    }

    pub fn workload(&self, name: &str) -> Option<WorkloadSpec> {
        self.lock().workloads.get(name).cloned()
    }

    pub fn endpoint(&self, name: &str) -> Option<EndpointSpec> {
        self.lock().endpoints.get(name).cloned()
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }
}

impl ClusterPlatform for InMemoryCluster {
    async fn create_workload(&self, spec: &WorkloadSpec) -> PlatformResult<()> {
        let mut state = self.lock();
        if state.workloads.contains_key(&spec.name) {
            return Err(PlatformError::AlreadyExists {
                kind: "deployment",
                name: spec.name.clone(),
            });
        }
        state.calls.workload_creates += 1;
        state.workloads.insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn update_workload(&self, spec: &WorkloadSpec) -> PlatformResult<()> {
        let mut state = self.lock();
        let Some(existing) = state.workloads.get_mut(&spec.name) else {
            return Err(PlatformError::NotFound {
                kind: "deployment",
                name: spec.name.clone(),
            });
        };
        *existing = spec.clone();
        state.calls.workload_updates += 1;
        Ok(())
    }

    async fn create_endpoint(&self, spec: &EndpointSpec) -> PlatformResult<()> {
        let mut state = self.lock();
        if state.endpoints.contains_key(&spec.name) {
            return Err(PlatformError::AlreadyExists {
                kind: "service",
                name: spec.name.clone(),
            });
        }
        state.calls.endpoint_creates += 1;
        state.endpoints.insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn update_endpoint(&self, spec: &EndpointSpec) -> PlatformResult<()> {
        let mut state = self.lock();
        let Some(existing) = state.endpoints.get_mut(&spec.name) else {
            return Err(PlatformError::NotFound {
                kind: "service",
                name: spec.name.clone(),
            });
        };
        *existing = spec.clone();
        state.calls.endpoint_updates += 1;
        Ok(())
    }
}
