//! Workload and endpoint descriptions for one (device, application) pair.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ApplicationId, DeviceId};

pub const DEFAULT_CONTAINER_PORT: u16 = 5000;

pub const DEVICE_LABEL: &str = "device_id";
pub const APP_LABEL: &str = "app_id";

/// Canonical, idempotent name for the pair's workload.
pub fn workload_name(device: DeviceId, app: ApplicationId) -> String {
    format!("edge-device-{}-app-{}", device, app)
}

pub fn endpoint_name(workload: &str) -> String {
    format!("{}-service", workload)
}

/// Labels used both on the workload and as the endpoint's selector.
pub fn pair_labels(device: DeviceId, app: ApplicationId) -> BTreeMap<String, String> {
    BTreeMap::from([
        (DEVICE_LABEL.to_string(), device.to_string()),
        (APP_LABEL.to_string(), app.to_string()),
    ])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub name: String,
    pub container_name: String,
    pub image: String,
    pub container_port: u16,
    pub replicas: u32,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub name: String,
    pub selector: BTreeMap<String, String>,
    pub port: u16,
    pub target_port: u16,
    pub node_port: u16,
}

/// Both resources for one pair, keyed by the same canonical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadPlan {
    pub workload: WorkloadSpec,
    pub endpoint: EndpointSpec,
}

impl WorkloadPlan {
    pub fn for_pair(
        device: DeviceId,
        app: ApplicationId,
        image: &str,
        container_port: u16,
        node_port: u16,
    ) -> Self {
        let name = workload_name(device, app);
        let labels = pair_labels(device, app);
        Self {
            endpoint: EndpointSpec {
                name: endpoint_name(&name),
                selector: labels.clone(),
                port: container_port,
                target_port: container_port,
                node_port,
            },
            workload: WorkloadSpec {
                name,
                container_name: format!("app-{}", app),
                image: image.to_string(),
                container_port,
                replicas: 1,
                labels,
            },
        }
    }
}

/// Externally reachable URL for a node port, with an optional path suffix.
pub fn reachable_path(scheme: &str, host: &str, port: u16, suffix: Option<&str>) -> String {
    match suffix.map(str::trim).filter(|s| !s.is_empty()) {
        Some(suffix) if suffix.starts_with('/') => {
            format!("{}://{}:{}{}", scheme, host, port, suffix)
        }
        Some(suffix) => format!("{}://{}:{}/{}", scheme, host, port, suffix),
        None => format!("{}://{}:{}", scheme, host, port),
    }
}
