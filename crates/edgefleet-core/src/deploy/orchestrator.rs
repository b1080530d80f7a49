//! Batch provisioning of one application onto a set of devices.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::access::{AccessScopeResolver, DeviceFilter, DeviceQuery};
use crate::config::FleetConfig;
use crate::error::{Error, Result};
use crate::platform::ClusterPlatform;
use crate::store::FleetStore;
use crate::types::{Application, ApplicationId, DeviceId, InstanceId, PrincipalId};

use super::health::clear_app_issue;
use super::ports::PortAllocator;
use super::workload::{DEFAULT_CONTAINER_PORT, WorkloadPlan, reachable_path};

/// Knobs that shape workloads and reachable paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploySettings {
    pub ports: PortAllocator,
    pub container_port: u16,
    pub scheme: String,
    pub host: String,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            ports: PortAllocator::default(),
            container_port: DEFAULT_CONTAINER_PORT,
            scheme: "http".to_string(),
            host: "localhost".to_string(),
        }
    }
}

impl DeploySettings {
    pub fn from_config(config: &FleetConfig) -> anyhow::Result<Self> {
        Ok(Self {
            ports: config.ports.allocator()?,
            container_port: config.cluster.container_port,
            scheme: config.endpoint.scheme.clone(),
            host: config.endpoint.host.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDeployment {
    pub device_id: DeviceId,
    pub instance_id: InstanceId,
    pub workload: String,
    pub endpoint: String,
    pub node_port: u16,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub application_id: ApplicationId,
    pub deployments: Vec<DeviceDeployment>,
}

/// Provisions workloads device by device.
///
/// Fails fast: the first per-device failure stops the batch and is returned.
/// Devices provisioned before it stay provisioned; callers re-read instance
/// state to learn which prefix completed.
pub struct DeploymentOrchestrator<'a, S: ?Sized, P> {
    store: &'a S,
    platform: &'a P,
    settings: DeploySettings,
}

impl<'a, S, P> DeploymentOrchestrator<'a, S, P>
where
    S: FleetStore + ?Sized,
    P: ClusterPlatform,
{
    pub fn new(store: &'a S, platform: &'a P, settings: DeploySettings) -> Self {
        Self {
            store,
            platform,
            settings,
        }
    }

    pub fn settings(&self) -> &DeploySettings {
        &self.settings
    }

    pub async fn provision(
        &self,
        principal: PrincipalId,
        app: ApplicationId,
        device_ids: &[DeviceId],
    ) -> Result<ProvisionReport> {
        self.authorize(principal, device_ids)?;

        let application = self
            .store
            .application(app)?
            .ok_or(Error::ApplicationNotFound(app))?;

        info!(
            principal,
            app,
            devices = device_ids.len(),
            "provisioning application"
        );

        let mut deployments = Vec::with_capacity(device_ids.len());
        for &device in device_ids {
            match self.provision_device(&application, device).await {
                Ok(deployment) => deployments.push(deployment),
                Err(err) => {
                    warn!(
                        app,
                        device,
                        completed = deployments.len(),
                        error = %err,
                        "provisioning halted"
                    );
                    return Err(err);
                }
            }
        }

        Ok(ProvisionReport {
            application_id: app,
            deployments,
        })
    }

    /// Every requested device must be visible to the principal. Runs before
    /// any side effect.
    fn authorize(&self, principal: PrincipalId, device_ids: &[DeviceId]) -> Result<()> {
        let requested: BTreeSet<DeviceId> = device_ids.iter().copied().collect();
        let visible: HashSet<DeviceId> = AccessScopeResolver::new(self.store)
            .scoped_devices(principal, DeviceQuery::new().filter(DeviceFilter::Ids(requested)))?
            .into_iter()
            .map(|device| device.id)
            .collect();

        match device_ids.iter().find(|id| !visible.contains(id)) {
            Some(&denied) => {
                warn!(principal, device = denied, "device outside principal scope");
                Err(Error::AccessDenied(denied))
            }
            None => Ok(()),
        }
    }

    async fn provision_device(
        &self,
        application: &Application,
        device: DeviceId,
    ) -> Result<DeviceDeployment> {
        let instance_id = self.store.record_pending_instance(device, application.id)?;
        // the reset may have taken the device's last instance out of `error`
        clear_app_issue(self.store, device)?;

        let node_port = self.settings.ports.allocate_port(device);
        let plan = WorkloadPlan::for_pair(
            device,
            application.id,
            application.image_reference(),
            self.settings.container_port,
            node_port,
        );

        let orchestration = |source| Error::OrchestrationFailure {
            device_id: device,
            source,
        };
        self.platform
            .create_or_update_workload(&plan.workload)
            .await
            .map_err(orchestration)?;
        self.platform
            .create_or_update_endpoint(&plan.endpoint)
            .await
            .map_err(orchestration)?;

        let path = reachable_path(
            &self.settings.scheme,
            &self.settings.host,
            node_port,
            application.endpoint_path.as_deref(),
        );
        self.store
            .set_instance_path(device, application.id, &path)?;

        debug!(device, app = application.id, %path, "device provisioned");
        Ok(DeviceDeployment {
            device_id: device,
            instance_id,
            workload: plan.workload.name,
            endpoint: plan.endpoint.name,
            node_port,
            path,
        })
    }
}
