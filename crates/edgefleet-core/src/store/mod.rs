//! Persistence collaborator contract and the bundled inventory-backed store.

pub mod inventory;
pub mod memory;

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::access::DeviceQuery;
use crate::error::StoreError;
use crate::types::{
    Application, ApplicationId, ApplicationInstance, Device, DeviceId, DeviceStatus, InstanceId,
    InstanceStatus, LogEntry, Principal, PrincipalId, Role, Sensor, SensorId, Tag,
};

pub use inventory::Inventory;
pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Filters for a log read; `None` fields are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub device_id: Option<DeviceId>,
    pub app_instance_id: Option<InstanceId>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Everything the pipeline reads from and writes to storage.
///
/// Implementations serialize their own concurrency; every method takes
/// `&self` the way a pooled database handle would.
pub trait FleetStore {
    fn roles_for_principal(&self, principal: PrincipalId) -> StoreResult<Vec<Role>>;

    /// Distinct names of `location` tags granted through the principal's roles.
    fn location_tags_for_principal(&self, principal: PrincipalId)
    -> StoreResult<BTreeSet<String>>;

    /// Devices matching `query`, honouring its ordering when present.
    fn query_devices(&self, query: &DeviceQuery) -> StoreResult<Vec<Device>>;

    fn tags_for_devices(&self, devices: &[DeviceId]) -> StoreResult<HashMap<DeviceId, Vec<Tag>>>;

    /// Subset of `devices` already carrying an instance of `app`.
    fn installed_devices(
        &self,
        app: ApplicationId,
        devices: &[DeviceId],
    ) -> StoreResult<HashSet<DeviceId>>;

    fn required_sensors(&self, app: ApplicationId) -> StoreResult<HashSet<SensorId>>;

    fn device_sensors(
        &self,
        devices: &[DeviceId],
    ) -> StoreResult<HashMap<DeviceId, HashSet<SensorId>>>;

    fn application(&self, app: ApplicationId) -> StoreResult<Option<Application>>;

    fn applications_with_sensors(&self) -> StoreResult<Vec<(Application, Vec<Sensor>)>>;

    fn instances_for_devices(
        &self,
        devices: &[DeviceId],
    ) -> StoreResult<HashMap<DeviceId, Vec<ApplicationInstance>>>;

    fn instance(&self, id: InstanceId) -> StoreResult<Option<ApplicationInstance>>;

    /// Create the instance for (device, app) in `pending`, or reset the
    /// existing one to `pending`. Never produces a second row for the pair.
    fn record_pending_instance(
        &self,
        device: DeviceId,
        app: ApplicationId,
    ) -> StoreResult<InstanceId>;

    fn set_instance_path(&self, device: DeviceId, app: ApplicationId, path: &str)
    -> StoreResult<()>;

    fn set_instance_status(&self, id: InstanceId, status: InstanceStatus) -> StoreResult<()>;

    fn set_device_status(&self, device: DeviceId, status: DeviceStatus) -> StoreResult<()>;

    fn principals(&self) -> StoreResult<Vec<Principal>>;

    fn principal(&self, id: PrincipalId) -> StoreResult<Option<Principal>>;

    fn logs(&self, query: &LogQuery) -> StoreResult<Vec<LogEntry>>;
}
