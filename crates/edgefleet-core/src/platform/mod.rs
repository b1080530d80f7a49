//! Cluster orchestration collaborator.
//!
//! Platforms expose plain create and update calls keyed by resource name.
//! The provided `create_or_update_*` methods turn an `AlreadyExists` answer
//! into an in-place update, which is what makes re-provisioning idempotent.

pub mod kube;
pub mod memory;

use std::future::Future;

use tracing::debug;

use crate::deploy::workload::{EndpointSpec, WorkloadSpec};
use crate::error::PlatformError;

pub use kube::KubeClient;
pub use memory::InMemoryCluster;

pub type PlatformResult<T> = Result<T, PlatformError>;

pub trait ClusterPlatform: Sync {
    /// Fails with `PlatformError::AlreadyExists` when the name is taken.
    fn create_workload(
        &self,
        spec: &WorkloadSpec,
    ) -> impl Future<Output = PlatformResult<()>> + Send;

    fn update_workload(
        &self,
        spec: &WorkloadSpec,
    ) -> impl Future<Output = PlatformResult<()>> + Send;

    /// Fails with `PlatformError::AlreadyExists` when the name is taken.
    fn create_endpoint(
        &self,
        spec: &EndpointSpec,
    ) -> impl Future<Output = PlatformResult<()>> + Send;

    fn update_endpoint(
        &self,
        spec: &EndpointSpec,
    ) -> impl Future<Output = PlatformResult<()>> + Send;

    fn create_or_update_workload(
        &self,
        spec: &WorkloadSpec,
    ) -> impl Future<Output = PlatformResult<()>> + Send {
        async move {
            match self.create_workload(spec).await {
                Err(err) if err.is_already_exists() => {
                    debug!(workload = %spec.name, "workload exists, updating in place");
                    self.update_workload(spec).await
                }
                other => other,
            }
        }
    }

    fn create_or_update_endpoint(
        &self,
        spec: &EndpointSpec,
    ) -> impl Future<Output = PlatformResult<()>> + Send {
        async move {
            match self.create_endpoint(spec).await {
                Err(err) if err.is_already_exists() => {
                    debug!(endpoint = %spec.name, "endpoint exists, updating in place");
                    self.update_endpoint(spec).await
                }
                other => other,
            }
        }
    }
}
