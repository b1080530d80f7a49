//! Application context for unified dependency injection.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::config::{ConfigStore, FleetConfig};
use crate::deploy::DeploySettings;
use crate::platform::KubeClient;
use crate::store::MemoryStore;

/// Loaded configuration plus the paths the collaborators are built from.
///
/// Frontends create this once and hand out stores and clients from it.
#[derive(Debug, Clone)]
pub struct AppContext {
    config_path: PathBuf,
    inventory_path: PathBuf,
    config: FleetConfig,
}

impl AppContext {
    /// Load the config at `config_path` (or the default location) and resolve
    /// the inventory path, with `inventory_override` taking precedence.
    pub fn load(
        config_path: Option<PathBuf>,
        inventory_override: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let store = match config_path {
            Some(path) => ConfigStore::from_path(path),
            None => ConfigStore::from_default_location()?,
        };
        let config = store.load()?;
        Self::with_config(store.config_path().to_path_buf(), config, inventory_override)
    }

    /// Build a context from an already loaded config (used by tests).
    pub fn with_config(
        config_path: PathBuf,
        config: FleetConfig,
        inventory_override: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let inventory_path = match inventory_override {
            Some(path) => path,
            None => config.inventory.resolve_path()?,
        };
        debug!(
            config = %config_path.display(),
            inventory = %inventory_path.display(),
            "context loaded"
        );
        Ok(Self {
            config_path,
            inventory_path,
            config,
        })
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn inventory_path(&self) -> &Path {
        &self.inventory_path
    }

    /// Get a ConfigStore for the loaded config file.
    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::from_path(self.config_path.clone())
    }

    /// Open the inventory with write-through persistence.
    pub fn open_store(&self) -> anyhow::Result<MemoryStore> {
        MemoryStore::open(&self.inventory_path).with_context(|| {
            format!("Failed to open inventory: {}", self.inventory_path.display())
        })
    }

    pub fn deploy_settings(&self) -> anyhow::Result<DeploySettings> {
        DeploySettings::from_config(&self.config)
    }

    /// Get a KubeClient for the configured cluster.
    pub fn kube_client(&self) -> anyhow::Result<KubeClient> {
        KubeClient::new(&self.config.cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_override_wins_over_config() {
        let mut config = FleetConfig::default();
        config.inventory.path = Some(PathBuf::from("/srv/fleet/inventory.json"));

        let ctx = AppContext::with_config(
            PathBuf::from("/etc/edgefleet.toml"),
            config.clone(),
            Some(PathBuf::from("/tmp/override.json")),
        )
        .unwrap();
        assert_eq!(ctx.inventory_path(), Path::new("/tmp/override.json"));

        let ctx =
            AppContext::with_config(PathBuf::from("/etc/edgefleet.toml"), config, None).unwrap();
        assert_eq!(ctx.inventory_path(), Path::new("/srv/fleet/inventory.json"));
    }

    #[test]
    fn settings_follow_config() {
        let mut config = FleetConfig::default();
        config.ports.base = 31000;
        config.ports.width = 100;
        config.endpoint.host = "fleet.example".to_string();

        let ctx = AppContext::with_config(
            PathBuf::from("edgefleet.toml"),
            config,
            Some(PathBuf::from("inventory.json")),
        )
        .unwrap();
        let settings = ctx.deploy_settings().unwrap();
        assert_eq!(settings.ports.allocate_port(105), 31005);
        assert_eq!(settings.host, "fleet.example");
    }
}
