//! Scoped read views over the fleet: device listings, the map, the app store,
//! principals and logs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::{AccessScopeResolver, DeviceOrder, DeviceQuery};
use crate::error::{Error, Result};
use crate::store::{FleetStore, LogQuery};
use crate::types::{
    Application, ApplicationId, Device, DeviceId, DeviceStatus, InstanceId, InstanceStatus,
    LogEntry, Principal, PrincipalId, Sensor, Tag, TagType,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceView {
    pub instance_id: InstanceId,
    pub application_id: ApplicationId,
    pub name: String,
    pub description: String,
    pub version: String,
    pub status: InstanceStatus,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceWithApplications {
    pub device_id: DeviceId,
    pub name: String,
    pub status: DeviceStatus,
    pub last_contact: DateTime<Utc>,
    pub connection_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub ip_address: String,
    pub applications: Vec<InstanceView>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMapEntry {
    pub id: DeviceId,
    pub name: String,
    pub status: DeviceStatus,
    /// Name of the device's first location tag, empty when untagged.
    pub municipality: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppStoreEntry {
    pub id: ApplicationId,
    pub name: String,
    pub version: String,
    pub description: String,
    pub sensors: Vec<Sensor>,
}

#[derive(Debug)]
pub struct Catalog<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: FleetStore + ?Sized> Catalog<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    fn visible_devices(&self, principal: PrincipalId) -> Result<Vec<Device>> {
        AccessScopeResolver::new(self.store)
            .scoped_devices(principal, DeviceQuery::new().order_by(DeviceOrder::Id))
    }

    /// Devices the principal can see, with their instances and tags.
    pub fn devices_with_applications(
        &self,
        principal: PrincipalId,
    ) -> Result<Vec<DeviceWithApplications>> {
        let devices = self.visible_devices(principal)?;
        let ids: Vec<DeviceId> = devices.iter().map(|d| d.id).collect();

        let mut tags = self.store.tags_for_devices(&ids)?;
        let mut instances = self.store.instances_for_devices(&ids)?;
        let applications: HashMap<ApplicationId, Application> = self
            .store
            .applications_with_sensors()?
            .into_iter()
            .map(|(app, _)| (app.id, app))
            .collect();

        Ok(devices
            .into_iter()
            .map(|device| {
                let mut applications: Vec<InstanceView> = instances
                    .remove(&device.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|instance| {
                        let app = applications.get(&instance.app_id);
                        InstanceView {
                            instance_id: instance.id,
                            application_id: instance.app_id,
                            name: app.map(|a| a.name.clone()).unwrap_or_default(),
                            description: app.map(|a| a.description.clone()).unwrap_or_default(),
                            version: app.map(|a| a.version.clone()).unwrap_or_default(),
                            status: instance.status,
                            path: instance.path,
                        }
                    })
                    .collect();
                applications.sort_by_key(|a| a.instance_id);

                DeviceWithApplications {
                    device_id: device.id,
                    name: device.name,
                    status: device.status,
                    last_contact: device.last_contact,
                    connection_type: device.connection_type,
                    latitude: device.coordinates.latitude,
                    longitude: device.coordinates.longitude,
                    ip_address: device.ip_address,
                    applications,
                    tags: tags.remove(&device.id).unwrap_or_default(),
                }
            })
            .collect())
    }

    /// Compact per-device entries for the map view.
    pub fn device_map(&self, principal: PrincipalId) -> Result<Vec<DeviceMapEntry>> {
        let devices = self.visible_devices(principal)?;
        let ids: Vec<DeviceId> = devices.iter().map(|d| d.id).collect();
        let tags = self.store.tags_for_devices(&ids)?;

        Ok(devices
            .into_iter()
            .map(|device| {
                let municipality = tags
                    .get(&device.id)
                    .and_then(|list| list.iter().find(|t| t.tag_type == TagType::Location))
                    .map(|t| t.name.clone())
                    .unwrap_or_default();
                DeviceMapEntry {
                    id: device.id,
                    name: device.name,
                    status: device.status,
                    municipality,
                    latitude: device.coordinates.latitude,
                    longitude: device.coordinates.longitude,
                }
            })
            .collect())
    }

    /// Every application with its required sensors, ordered by id.
    pub fn app_store(&self) -> Result<Vec<AppStoreEntry>> {
        let mut entries: Vec<AppStoreEntry> = self
            .store
            .applications_with_sensors()?
            .into_iter()
            .map(|(app, sensors)| AppStoreEntry {
                id: app.id,
                name: app.name,
                version: app.version,
                description: app.description,
                sensors,
            })
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    pub fn principals(&self) -> Result<Vec<Principal>> {
        Ok(self.store.principals()?)
    }

    pub fn principal(&self, id: PrincipalId) -> Result<Option<Principal>> {
        Ok(self.store.principal(id)?)
    }

    /// Logs for a device and/or instance, optionally bounded in time.
    pub fn logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>> {
        if query.device_id.is_none() && query.app_instance_id.is_none() {
            return Err(Error::InvalidRequest(
                "a device id or application instance id is required".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (query.start, query.end)
            && start > end
        {
            return Err(Error::InvalidRequest(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok(self.store.logs(query)?)
    }
}
