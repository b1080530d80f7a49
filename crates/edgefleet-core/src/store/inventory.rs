//! Inventory snapshot: the serialized form of the fleet's tables.
//!
//! Snapshots are JSON documents written atomically (tmp + rename). Relation
//! tables mirror the many-to-many joins between principals, roles, tags,
//! devices, sensors and applications.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::types::{
    Application, ApplicationId, ApplicationInstance, Device, DeviceId, LogEntry, PrincipalId,
    Role, RoleId, Sensor, SensorId, Tag, TagId,
};

const INVENTORY_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalRecord {
    pub id: PrincipalId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalRole {
    pub principal_id: PrincipalId,
    pub role_id: RoleId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleTag {
    pub role_id: RoleId,
    pub tag_id: TagId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceTag {
    pub device_id: DeviceId,
    pub tag_id: TagId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceSensor {
    pub device_id: DeviceId,
    pub sensor_id: SensorId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationSensor {
    pub application_id: ApplicationId,
    pub sensor_id: SensorId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub version: u32,
    #[serde(default)]
    pub principals: Vec<PrincipalRecord>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub principal_roles: Vec<PrincipalRole>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub role_tags: Vec<RoleTag>,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub device_tags: Vec<DeviceTag>,
    #[serde(default)]
    pub sensors: Vec<Sensor>,
    #[serde(default)]
    pub device_sensors: Vec<DeviceSensor>,
    #[serde(default)]
    pub applications: Vec<Application>,
    #[serde(default)]
    pub application_sensors: Vec<ApplicationSensor>,
    #[serde(default)]
    pub instances: Vec<ApplicationInstance>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    pub fn new() -> Self {
        Self {
            version: INVENTORY_VERSION,
            principals: Vec::new(),
            roles: Vec::new(),
            principal_roles: Vec::new(),
            tags: Vec::new(),
            role_tags: Vec::new(),
            devices: Vec::new(),
            device_tags: Vec::new(),
            sensors: Vec::new(),
            device_sensors: Vec::new(),
            applications: Vec::new(),
            application_sensors: Vec::new(),
            instances: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Load a snapshot; a missing file is an empty inventory.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read inventory: {}", path.display()))?;
        let inventory: Inventory = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse inventory: {}", path.display()))?;
        inventory.validate()?;
        Ok(inventory)
    }

    /// Save atomically (tmp + rename).
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create inventory directory: {}", parent.display())
            })?;
        }

        let json =
            serde_json::to_vec_pretty(self).context("Failed to serialize inventory to JSON")?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write inventory: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace inventory: {}", path.display()))?;
        Ok(())
    }

    /// Check the format version and that every relation row points at a
    /// known record.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.version != INVENTORY_VERSION {
            anyhow::bail!("Unsupported inventory version: {}", self.version);
        }

        let principals = unique_ids("principal", self.principals.iter().map(|p| p.id))?;
        let roles = unique_ids("role", self.roles.iter().map(|r| r.id))?;
        let tags = unique_ids("tag", self.tags.iter().map(|t| t.id))?;
        let devices = unique_ids("device", self.devices.iter().map(|d| d.id))?;
        let sensors = unique_ids("sensor", self.sensors.iter().map(|s| s.id))?;
        let apps = unique_ids("application", self.applications.iter().map(|a| a.id))?;
        unique_ids("instance", self.instances.iter().map(|i| i.id))?;

        for link in &self.principal_roles {
            ensure_known("principal", &principals, link.principal_id)?;
            ensure_known("role", &roles, link.role_id)?;
        }
        for link in &self.role_tags {
            ensure_known("role", &roles, link.role_id)?;
            ensure_known("tag", &tags, link.tag_id)?;
        }
        for link in &self.device_tags {
            ensure_known("device", &devices, link.device_id)?;
            ensure_known("tag", &tags, link.tag_id)?;
        }
        for link in &self.device_sensors {
            ensure_known("device", &devices, link.device_id)?;
            ensure_known("sensor", &sensors, link.sensor_id)?;
        }
        for link in &self.application_sensors {
            ensure_known("application", &apps, link.application_id)?;
            ensure_known("sensor", &sensors, link.sensor_id)?;
        }

        let mut pairs = HashSet::new();
        for instance in &self.instances {
            ensure_known("device", &devices, instance.device_id)?;
            ensure_known("application", &apps, instance.app_id)?;
            if !pairs.insert((instance.device_id, instance.app_id)) {
                anyhow::bail!(
                    "Duplicate instance of application {} on device {}",
                    instance.app_id,
                    instance.device_id
                );
            }
        }
        Ok(())
    }

    pub fn next_instance_id(&self) -> i64 {
        self.instances.iter().map(|i| i.id).max().unwrap_or(0) + 1
    }
}

fn unique_ids(kind: &str, ids: impl Iterator<Item = i64>) -> anyhow::Result<HashSet<i64>> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            anyhow::bail!("Duplicate {} id: {}", kind, id);
        }
    }
    Ok(seen)
}

fn ensure_known(kind: &str, known: &HashSet<i64>, id: i64) -> anyhow::Result<()> {
    if !known.contains(&id) {
        anyhow::bail!("Relation references unknown {} {}", kind, id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_inventory_is_valid() {
        assert!(Inventory::new().validate().is_ok());
        assert_eq!(Inventory::new().next_instance_id(), 1);
    }

    #[test]
    fn dangling_relation_is_rejected() {
        let mut inventory = Inventory::new();
        inventory.role_tags.push(RoleTag {
            role_id: 1,
            tag_id: 2,
        });
        let err = inventory.validate().unwrap_err().to_string();
        assert!(err.contains("unknown role 1"), "{}", err);
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut inventory = Inventory::new();
        inventory.version = 9;
        assert!(inventory.validate().is_err());
    }
}
