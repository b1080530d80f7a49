//! Configuration for the cluster connection, port range, endpoints and inventory.
//!
//! Every section is optional; an absent `edgefleet.toml` yields the defaults.

pub mod store;

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::deploy::ports::{DEFAULT_PORT_BASE, DEFAULT_PORT_WIDTH, PortAllocator};
use crate::deploy::workload::DEFAULT_CONTAINER_PORT;

pub use store::ConfigStore;

pub const TOKEN_ENV: &str = "EDGEFLEET_CLUSTER_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FleetConfig {
    pub cluster: ClusterConfig,
    pub ports: PortsConfig,
    pub endpoint: EndpointConfig,
    pub inventory: InventoryConfig,
}

impl FleetConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.cluster.api_url)
            .with_context(|| format!("Invalid cluster api_url: {}", self.cluster.api_url))?;
        if self.cluster.namespace.trim().is_empty() {
            anyhow::bail!("Cluster namespace must not be empty");
        }
        if self.cluster.container_port == 0 {
            anyhow::bail!("Container port must be greater than zero");
        }
        self.ports.allocator()?;
        if self.endpoint.host.trim().is_empty() {
            anyhow::bail!("Endpoint host must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub api_url: String,
    pub namespace: String,
    /// Inline bearer token; prefer `token_file` or the environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
    pub accept_invalid_certs: bool,
    pub container_port: u16,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            api_url: "https://127.0.0.1:6443".to_string(),
            namespace: "edge-devices".to_string(),
            token: None,
            token_file: None,
            accept_invalid_certs: false,
            container_port: DEFAULT_CONTAINER_PORT,
        }
    }
}

impl ClusterConfig {
    /// Bearer token: inline value, then `EDGEFLEET_CLUSTER_TOKEN`, then `token_file`.
    pub fn resolve_token(&self) -> anyhow::Result<Option<String>> {
        if let Some(token) = &self.token {
            return Ok(Some(token.clone()));
        }
        if let Ok(token) = std::env::var(TOKEN_ENV)
            && !token.trim().is_empty()
        {
            return Ok(Some(token.trim().to_string()));
        }
        if let Some(path) = &self.token_file {
            let token = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read token file: {}", path.display()))?;
            return Ok(Some(token.trim().to_string()));
        }
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortsConfig {
    pub base: u16,
    pub width: u16,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_PORT_BASE,
            width: DEFAULT_PORT_WIDTH,
        }
    }
}

impl PortsConfig {
    pub fn allocator(&self) -> anyhow::Result<PortAllocator> {
        PortAllocator::new(self.base, self.width)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub scheme: String,
    pub host: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InventoryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl InventoryConfig {
    /// Configured path, else `<data dir>/edgefleet/inventory.json`.
    pub fn resolve_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let base = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot determine local data directory"))?;
        Ok(base.join("edgefleet").join("inventory.json"))
    }
}
