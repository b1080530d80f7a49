//! In-process `FleetStore` over an `Inventory`, optionally written through to disk.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};

use crate::access::{DeviceOrder, DeviceQuery};
use crate::error::StoreError;
use crate::types::{
    Application, ApplicationId, ApplicationInstance, Device, DeviceId, DeviceStatus, InstanceId,
    InstanceStatus, LogEntry, Principal, PrincipalId, Role, Sensor, SensorId, Tag, TagType,
};

use super::{FleetStore, Inventory, LogQuery, StoreResult};

#[derive(Debug)]
pub struct MemoryStore {
    inventory: RwLock<Inventory>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new(inventory: Inventory) -> Self {
        Self {
            inventory: RwLock::new(inventory),
            path: None,
        }
    }

    /// Open a snapshot file; every successful mutation is saved back to it.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let inventory = Inventory::load(&path)?;
        Ok(Self {
            inventory: RwLock::new(inventory),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy of the current tables.
    pub fn snapshot(&self) -> StoreResult<Inventory> {
        Ok(self.read()?.clone())
    }

    /// In-memory copy with no backing file; its mutations are never saved.
    pub fn detached(&self) -> StoreResult<MemoryStore> {
        Ok(MemoryStore::new(self.snapshot()?))
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inventory>> {
        self.inventory
            .read()
            .map_err(|_| StoreError::Unavailable("inventory lock poisoned".to_string()))
    }

    /// Apply `f` to a copy, persist it, then publish it. A failed save leaves
    /// the in-memory tables untouched.
    fn mutate<T>(&self, f: impl FnOnce(&mut Inventory) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self
            .inventory
            .write()
            .map_err(|_| StoreError::Unavailable("inventory lock poisoned".to_string()))?;
        let mut next = guard.clone();
        let value = f(&mut next)?;
        if let Some(path) = &self.path {
            next.save(path)?;
        }
        *guard = next;
        Ok(value)
    }
}

impl Inventory {
    fn tags_of(&self, device: DeviceId) -> Vec<Tag> {
        let ids: HashSet<_> = self
            .device_tags
            .iter()
            .filter(|link| link.device_id == device)
            .map(|link| link.tag_id)
            .collect();
        self.tags
            .iter()
            .filter(|tag| ids.contains(&tag.id))
            .cloned()
            .collect()
    }

    fn roles_of(&self, principal: PrincipalId) -> Vec<Role> {
        let ids: HashSet<_> = self
            .principal_roles
            .iter()
            .filter(|link| link.principal_id == principal)
            .map(|link| link.role_id)
            .collect();
        self.roles
            .iter()
            .filter(|role| ids.contains(&role.id))
            .cloned()
            .collect()
    }
}

impl FleetStore for MemoryStore {
    fn roles_for_principal(&self, principal: PrincipalId) -> StoreResult<Vec<Role>> {
        Ok(self.read()?.roles_of(principal))
    }

    fn location_tags_for_principal(
        &self,
        principal: PrincipalId,
    ) -> StoreResult<BTreeSet<String>> {
        let inv = self.read()?;
        let roles: HashSet<_> = inv.roles_of(principal).iter().map(|r| r.id).collect();
        let tag_ids: HashSet<_> = inv
            .role_tags
            .iter()
            .filter(|link| roles.contains(&link.role_id))
            .map(|link| link.tag_id)
            .collect();
        Ok(inv
            .tags
            .iter()
            .filter(|tag| tag.tag_type == TagType::Location && tag_ids.contains(&tag.id))
            .map(|tag| tag.name.clone())
            .collect())
    }

    fn query_devices(&self, query: &DeviceQuery) -> StoreResult<Vec<Device>> {
        if query.matches_nothing() {
            return Ok(Vec::new());
        }
        let inv = self.read()?;
        let mut devices: Vec<Device> = inv
            .devices
            .iter()
            .filter(|device| query.matches(device, &inv.tags_of(device.id)))
            .cloned()
            .collect();
        match query.ordering() {
            Some(DeviceOrder::Id) => devices.sort_by_key(|d| d.id),
            Some(DeviceOrder::Name) => devices.sort_by(|a, b| a.name.cmp(&b.name)),
            None => {}
        }
        Ok(devices)
    }

    fn tags_for_devices(&self, devices: &[DeviceId]) -> StoreResult<HashMap<DeviceId, Vec<Tag>>> {
        let inv = self.read()?;
        Ok(devices
            .iter()
            .map(|id| (*id, inv.tags_of(*id)))
            .filter(|(_, tags)| !tags.is_empty())
            .collect())
    }

    fn installed_devices(
        &self,
        app: ApplicationId,
        devices: &[DeviceId],
    ) -> StoreResult<HashSet<DeviceId>> {
        let wanted: HashSet<_> = devices.iter().copied().collect();
        Ok(self
            .read()?
            .instances
            .iter()
            .filter(|i| i.app_id == app && wanted.contains(&i.device_id))
            .map(|i| i.device_id)
            .collect())
    }

    fn required_sensors(&self, app: ApplicationId) -> StoreResult<HashSet<SensorId>> {
        Ok(self
            .read()?
            .application_sensors
            .iter()
            .filter(|link| link.application_id == app)
            .map(|link| link.sensor_id)
            .collect())
    }

    fn device_sensors(
        &self,
        devices: &[DeviceId],
    ) -> StoreResult<HashMap<DeviceId, HashSet<SensorId>>> {
        let wanted: HashSet<_> = devices.iter().copied().collect();
        let mut map: HashMap<DeviceId, HashSet<SensorId>> = HashMap::new();
        for link in &self.read()?.device_sensors {
            if wanted.contains(&link.device_id) {
                map.entry(link.device_id).or_default().insert(link.sensor_id);
            }
        }
        Ok(map)
    }

    fn application(&self, app: ApplicationId) -> StoreResult<Option<Application>> {
        Ok(self
            .read()?
            .applications
            .iter()
            .find(|a| a.id == app)
            .cloned())
    }

    fn applications_with_sensors(&self) -> StoreResult<Vec<(Application, Vec<Sensor>)>> {
        let inv = self.read()?;
        Ok(inv
            .applications
            .iter()
            .map(|app| {
                let ids: HashSet<_> = inv
                    .application_sensors
                    .iter()
                    .filter(|link| link.application_id == app.id)
                    .map(|link| link.sensor_id)
                    .collect();
                let sensors = inv
                    .sensors
                    .iter()
                    .filter(|s| ids.contains(&s.id))
                    .cloned()
                    .collect();
                (app.clone(), sensors)
            })
            .collect())
    }

    fn instances_for_devices(
        &self,
        devices: &[DeviceId],
    ) -> StoreResult<HashMap<DeviceId, Vec<ApplicationInstance>>> {
        let wanted: HashSet<_> = devices.iter().copied().collect();
        let mut map: HashMap<DeviceId, Vec<ApplicationInstance>> = HashMap::new();
        for instance in &self.read()?.instances {
            if wanted.contains(&instance.device_id) {
                map.entry(instance.device_id)
                    .or_default()
                    .push(instance.clone());
            }
        }
        Ok(map)
    }

    fn instance(&self, id: InstanceId) -> StoreResult<Option<ApplicationInstance>> {
        Ok(self.read()?.instances.iter().find(|i| i.id == id).cloned())
    }

    fn record_pending_instance(
        &self,
        device: DeviceId,
        app: ApplicationId,
    ) -> StoreResult<InstanceId> {
        self.mutate(|inv| {
            if !inv.devices.iter().any(|d| d.id == device) {
                return Err(StoreError::Constraint(format!("unknown device {}", device)));
            }
            if !inv.applications.iter().any(|a| a.id == app) {
                return Err(StoreError::Constraint(format!("unknown application {}", app)));
            }
            if let Some(existing) = inv
                .instances
                .iter_mut()
                .find(|i| i.device_id == device && i.app_id == app)
            {
                existing.status = InstanceStatus::Pending;
                return Ok(existing.id);
            }
            let id = inv.next_instance_id();
            inv.instances.push(ApplicationInstance {
                id,
                app_id: app,
                device_id: device,
                status: InstanceStatus::Pending,
                path: String::new(),
            });
            Ok(id)
        })
    }

    fn set_instance_path(
        &self,
        device: DeviceId,
        app: ApplicationId,
        path: &str,
    ) -> StoreResult<()> {
        self.mutate(|inv| {
            let instance = inv
                .instances
                .iter_mut()
                .find(|i| i.device_id == device && i.app_id == app)
                .ok_or_else(|| {
                    StoreError::NotFound(format!(
                        "instance of application {} on device {}",
                        app, device
                    ))
                })?;
            instance.path = path.to_string();
            Ok(())
        })
    }

    fn set_instance_status(&self, id: InstanceId, status: InstanceStatus) -> StoreResult<()> {
        self.mutate(|inv| {
            let instance = inv
                .instances
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| StoreError::NotFound(format!("instance {}", id)))?;
            instance.status = status;
            Ok(())
        })
    }

    fn set_device_status(&self, device: DeviceId, status: DeviceStatus) -> StoreResult<()> {
        self.mutate(|inv| {
            let record = inv
                .devices
                .iter_mut()
                .find(|d| d.id == device)
                .ok_or_else(|| StoreError::NotFound(format!("device {}", device)))?;
            record.status = status;
            Ok(())
        })
    }

    fn principals(&self) -> StoreResult<Vec<Principal>> {
        let inv = self.read()?;
        Ok(inv
            .principals
            .iter()
            .map(|p| Principal {
                id: p.id,
                name: p.name.clone(),
                roles: inv.roles_of(p.id),
            })
            .collect())
    }

    fn principal(&self, id: PrincipalId) -> StoreResult<Option<Principal>> {
        let inv = self.read()?;
        Ok(inv.principals.iter().find(|p| p.id == id).map(|p| Principal {
            id: p.id,
            name: p.name.clone(),
            roles: inv.roles_of(p.id),
        }))
    }

    fn logs(&self, query: &LogQuery) -> StoreResult<Vec<LogEntry>> {
        let mut logs: Vec<LogEntry> = self
            .read()?
            .logs
            .iter()
            .filter(|log| query.device_id.is_none_or(|d| log.device_id == d))
            .filter(|log| {
                query
                    .app_instance_id
                    .is_none_or(|i| log.app_instance_id == Some(i))
            })
            .filter(|log| query.start.is_none_or(|s| log.timestamp >= s))
            .filter(|log| query.end.is_none_or(|e| log.timestamp <= e))
            .cloned()
            .collect();
        logs.sort_by_key(|log| (log.timestamp, log.id));
        Ok(logs)
    }
}
