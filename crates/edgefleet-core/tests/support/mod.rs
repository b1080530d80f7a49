//! Shared fixtures: a small two-municipality fleet plus fault-injecting
//! collaborators.
#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};

use edgefleet_core::access::DeviceQuery;
use edgefleet_core::deploy::{EndpointSpec, WorkloadSpec};
use edgefleet_core::error::{PlatformError, StoreError};
use edgefleet_core::platform::{ClusterPlatform, InMemoryCluster, PlatformResult};
use edgefleet_core::store::inventory::{
    ApplicationSensor, DeviceSensor, DeviceTag, PrincipalRecord, PrincipalRole, RoleTag,
};
use edgefleet_core::store::{FleetStore, Inventory, LogQuery, MemoryStore, StoreResult};
use edgefleet_core::types::*;

pub const ADMIN: PrincipalId = 1;
pub const GOES_OPERATOR: PrincipalId = 2;
pub const OBSERVER: PrincipalId = 3;
pub const TWO_TOWN_OPERATOR: PrincipalId = 4;
pub const UNKNOWN_PRINCIPAL: PrincipalId = 99;

pub const GOES_1: DeviceId = 1;
pub const GOES_2: DeviceId = 2;
pub const MIDDELBURG_1: DeviceId = 3;
pub const UNTAGGED: DeviceId = 4;

pub const TEMPERATURE: SensorId = 1;
pub const HUMIDITY: SensorId = 2;
pub const CAMERA: SensorId = 3;

/// Needs temperature and humidity; serves `/measurements`.
pub const CLIMATE_APP: ApplicationId = 1;
/// Needs a camera.
pub const COUNTER_APP: ApplicationId = 2;
/// No sensor requirements; already installed on `GOES_2`.
pub const HEARTBEAT_APP: ApplicationId = 3;

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
}

fn role(id: RoleId, name: &str, restricted: bool) -> Role {
    Role {
        id,
        name: name.to_string(),
        description: String::new(),
        is_admin: !restricted,
        is_restricted: restricted,
    }
}

fn tag(id: TagId, name: &str, tag_type: TagType) -> Tag {
    Tag {
        id,
        name: name.to_string(),
        tag_type,
        is_editable: false,
        owner_id: None,
    }
}

fn device(id: DeviceId, name: &str, latitude: f64, longitude: f64) -> Device {
    Device {
        id,
        name: name.to_string(),
        status: DeviceStatus::Online,
        last_contact: at(12),
        connection_type: "lte".to_string(),
        ip_address: format!("10.20.0.{}", id),
        coordinates: Coordinates {
            latitude,
            longitude,
        },
        performance_metric: 0.9,
    }
}

fn application(id: ApplicationId, name: &str, endpoint_path: Option<&str>) -> Application {
    Application {
        id,
        name: name.to_string(),
        version: "1.0.0".to_string(),
        description: format!("{} service", name),
        repo_url: format!("registry.local/{}:1.0.0", name.to_lowercase()),
        endpoint_path: endpoint_path.map(str::to_string),
    }
}

pub fn fixture() -> Inventory {
    let mut inv = Inventory::new();

    inv.principals = vec![
        PrincipalRecord { id: ADMIN, name: "Ada".to_string() },
        PrincipalRecord { id: GOES_OPERATOR, name: "Gerrit".to_string() },
        PrincipalRecord { id: OBSERVER, name: "Noor".to_string() },
        PrincipalRecord { id: TWO_TOWN_OPERATOR, name: "Mila".to_string() },
    ];
    inv.roles = vec![
        role(1, "Administrator", false),
        role(2, "Goes operator", true),
        role(3, "Observer", true),
        role(4, "Middelburg operator", true),
    ];
    inv.principal_roles = vec![
        PrincipalRole { principal_id: ADMIN, role_id: 1 },
        PrincipalRole { principal_id: GOES_OPERATOR, role_id: 2 },
        PrincipalRole { principal_id: OBSERVER, role_id: 3 },
        PrincipalRole { principal_id: TWO_TOWN_OPERATOR, role_id: 2 },
        PrincipalRole { principal_id: TWO_TOWN_OPERATOR, role_id: 4 },
    ];
    inv.tags = vec![
        tag(1, "Goes", TagType::Location),
        tag(2, "Middelburg", TagType::Location),
        tag(3, "Outdoor", TagType::Category),
    ];
    inv.role_tags = vec![
        RoleTag { role_id: 2, tag_id: 1 },
        // category tags never widen scope
        RoleTag { role_id: 3, tag_id: 3 },
        RoleTag { role_id: 4, tag_id: 2 },
    ];
    inv.devices = vec![
        device(GOES_1, "goes-harbour", 51.504, 3.889),
        device(GOES_2, "goes-market", 51.503, 3.891),
        device(MIDDELBURG_1, "middelburg-abbey", 51.499, 3.613),
        device(UNTAGGED, "spare-unit", 51.45, 3.58),
    ];
    inv.device_tags = vec![
        DeviceTag { device_id: GOES_1, tag_id: 3 },
        DeviceTag { device_id: GOES_1, tag_id: 1 },
        DeviceTag { device_id: GOES_2, tag_id: 1 },
        DeviceTag { device_id: MIDDELBURG_1, tag_id: 2 },
    ];
    inv.sensors = vec![
        Sensor { id: TEMPERATURE, name: "Temperature".to_string() },
        Sensor { id: HUMIDITY, name: "Humidity".to_string() },
        Sensor { id: CAMERA, name: "Camera".to_string() },
    ];
    inv.device_sensors = vec![
        DeviceSensor { device_id: GOES_1, sensor_id: TEMPERATURE },
        DeviceSensor { device_id: GOES_1, sensor_id: HUMIDITY },
        DeviceSensor { device_id: GOES_2, sensor_id: TEMPERATURE },
        DeviceSensor { device_id: MIDDELBURG_1, sensor_id: TEMPERATURE },
        DeviceSensor { device_id: MIDDELBURG_1, sensor_id: HUMIDITY },
        DeviceSensor { device_id: MIDDELBURG_1, sensor_id: CAMERA },
    ];
    inv.applications = vec![
        application(CLIMATE_APP, "Climate", Some("/measurements")),
        application(COUNTER_APP, "Counter", None),
        application(HEARTBEAT_APP, "Heartbeat", None),
    ];
    inv.application_sensors = vec![
        ApplicationSensor { application_id: CLIMATE_APP, sensor_id: TEMPERATURE },
        ApplicationSensor { application_id: CLIMATE_APP, sensor_id: HUMIDITY },
        ApplicationSensor { application_id: COUNTER_APP, sensor_id: CAMERA },
    ];
    inv.instances = vec![ApplicationInstance {
        id: 1,
        app_id: HEARTBEAT_APP,
        device_id: GOES_2,
        status: InstanceStatus::Online,
        path: "http://localhost:30002".to_string(),
    }];
    inv.logs = vec![
        LogEntry {
            id: 1,
            device_id: GOES_2,
            app_instance_id: None,
            description: "Device booted".to_string(),
            warning_level: WarningLevel::Info,
            timestamp: at(8),
        },
        LogEntry {
            id: 2,
            device_id: GOES_2,
            app_instance_id: Some(1),
            description: "Heartbeat missed".to_string(),
            warning_level: WarningLevel::Warning,
            timestamp: at(10),
        },
        LogEntry {
            id: 3,
            device_id: MIDDELBURG_1,
            app_instance_id: None,
            description: "Camera offline".to_string(),
            warning_level: WarningLevel::Error,
            timestamp: at(9),
        },
    ];
    inv
}

pub fn store() -> MemoryStore {
    MemoryStore::new(fixture())
}

/// Which store call should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Roles,
    LocationTags,
    /// The n-th (0-based) `record_pending_instance` call.
    RecordPending(usize),
    SetPath,
    InstalledDevices,
    RequiredSensors,
    DeviceSensors,
}

/// Store wrapper that fails one kind of call and counts reads and writes.
pub struct FaultyStore {
    inner: MemoryStore,
    fault: Option<Fault>,
    pending_calls: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore, fault: Option<Fault>) -> Self {
        Self {
            inner,
            fault,
            pending_calls: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Count a read and fail it when `fault` is the configured one.
    fn read(&self, fault: Fault, what: &str) -> StoreResult<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fault == Some(fault) {
            return Err(Self::unavailable(what));
        }
        Ok(())
    }

    fn count_read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn unavailable(what: &str) -> StoreError {
        StoreError::Unavailable(format!("{} lookup timed out", what))
    }
}

impl FleetStore for FaultyStore {
    fn roles_for_principal(&self, principal: PrincipalId) -> StoreResult<Vec<Role>> {
        self.read(Fault::Roles, "role")?;
        self.inner.roles_for_principal(principal)
    }

    fn location_tags_for_principal(
        &self,
        principal: PrincipalId,
    ) -> StoreResult<BTreeSet<String>> {
        self.read(Fault::LocationTags, "tag")?;
        self.inner.location_tags_for_principal(principal)
    }

    fn query_devices(&self, query: &DeviceQuery) -> StoreResult<Vec<Device>> {
        self.count_read();
        self.inner.query_devices(query)
    }

    fn tags_for_devices(&self, devices: &[DeviceId]) -> StoreResult<HashMap<DeviceId, Vec<Tag>>> {
        self.count_read();
        self.inner.tags_for_devices(devices)
    }

    fn installed_devices(
        &self,
        app: ApplicationId,
        devices: &[DeviceId],
    ) -> StoreResult<HashSet<DeviceId>> {
        self.read(Fault::InstalledDevices, "installed device")?;
        self.inner.installed_devices(app, devices)
    }

    fn required_sensors(&self, app: ApplicationId) -> StoreResult<HashSet<SensorId>> {
        self.read(Fault::RequiredSensors, "required sensor")?;
        self.inner.required_sensors(app)
    }

    fn device_sensors(
        &self,
        devices: &[DeviceId],
    ) -> StoreResult<HashMap<DeviceId, HashSet<SensorId>>> {
        self.read(Fault::DeviceSensors, "device sensor")?;
        self.inner.device_sensors(devices)
    }

    fn application(&self, app: ApplicationId) -> StoreResult<Option<Application>> {
        self.count_read();
        self.inner.application(app)
    }

    fn applications_with_sensors(&self) -> StoreResult<Vec<(Application, Vec<Sensor>)>> {
        self.count_read();
        self.inner.applications_with_sensors()
    }

    fn instances_for_devices(
        &self,
        devices: &[DeviceId],
    ) -> StoreResult<HashMap<DeviceId, Vec<ApplicationInstance>>> {
        self.count_read();
        self.inner.instances_for_devices(devices)
    }

    fn instance(&self, id: InstanceId) -> StoreResult<Option<ApplicationInstance>> {
        self.count_read();
        self.inner.instance(id)
    }

    fn record_pending_instance(
        &self,
        device: DeviceId,
        app: ApplicationId,
    ) -> StoreResult<InstanceId> {
        let call = self.pending_calls.fetch_add(1, Ordering::SeqCst);
        if self.fault == Some(Fault::RecordPending(call)) {
            return Err(StoreError::Constraint("instance insert rejected".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.record_pending_instance(device, app)
    }

    fn set_instance_path(
        &self,
        device: DeviceId,
        app: ApplicationId,
        path: &str,
    ) -> StoreResult<()> {
        if self.fault == Some(Fault::SetPath) {
            return Err(StoreError::Unavailable("path update timed out".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_instance_path(device, app, path)
    }

    fn set_instance_status(&self, id: InstanceId, status: InstanceStatus) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_instance_status(id, status)
    }

    fn set_device_status(&self, device: DeviceId, status: DeviceStatus) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_device_status(device, status)
    }

    fn principals(&self) -> StoreResult<Vec<Principal>> {
        self.count_read();
        self.inner.principals()
    }

    fn principal(&self, id: PrincipalId) -> StoreResult<Option<Principal>> {
        self.count_read();
        self.inner.principal(id)
    }

    fn logs(&self, query: &LogQuery) -> StoreResult<Vec<LogEntry>> {
        self.count_read();
        self.inner.logs(query)
    }
}

/// Cluster that rejects workloads whose name is listed, and records every
/// workload name it was asked to create.
#[derive(Default)]
pub struct FailingCluster {
    inner: InMemoryCluster,
    reject_workloads: HashSet<String>,
    reject_endpoints: HashSet<String>,
    attempted: Mutex<Vec<String>>,
}

impl FailingCluster {
    pub fn rejecting_workload(name: &str) -> Self {
        Self {
            reject_workloads: [name.to_string()].into(),
            ..Self::default()
        }
    }

    pub fn rejecting_endpoint(name: &str) -> Self {
        Self {
            reject_endpoints: [name.to_string()].into(),
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &InMemoryCluster {
        &self.inner
    }

    pub fn attempted(&self) -> Vec<String> {
        self.attempted.lock().unwrap().clone()
    }

    fn rejected(name: &str) -> PlatformError {
        PlatformError::Rejected {
            status: 422,
            message: format!("{} is invalid", name),
        }
    }
}

impl ClusterPlatform for FailingCluster {
    async fn create_workload(&self, spec: &WorkloadSpec) -> PlatformResult<()> {
        self.attempted.lock().unwrap().push(spec.name.clone());
        if self.reject_workloads.contains(&spec.name) {
            return Err(Self::rejected(&spec.name));
        }
        self.inner.create_workload(spec).await
    }

    async fn update_workload(&self, spec: &WorkloadSpec) -> PlatformResult<()> {
        self.inner.update_workload(spec).await
    }

    async fn create_endpoint(&self, spec: &EndpointSpec) -> PlatformResult<()> {
        if self.reject_endpoints.contains(&spec.name) {
            return Err(Self::rejected(&spec.name));
        }
        self.inner.create_endpoint(spec).await
    }

    async fn update_endpoint(&self, spec: &EndpointSpec) -> PlatformResult<()> {
        self.inner.update_endpoint(spec).await
    }
}
