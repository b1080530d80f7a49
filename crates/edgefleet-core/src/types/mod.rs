//! Shared domain types for principals, devices, applications and their bindings.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type PrincipalId = i64;
pub type RoleId = i64;
pub type TagId = i64;
pub type DeviceId = i64;
pub type ApplicationId = i64;
pub type InstanceId = i64;
pub type SensorId = i64;
pub type LogId = i64;

/// An authenticated actor whose roles determine device visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_admin: bool,
    /// `false` grants visibility over every device.
    #[serde(default = "default_restricted")]
    pub is_restricted: bool,
}

fn default_restricted() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagType {
    Location,
    Category,
    Custom,
}

impl TagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagType::Location => "location",
            TagType::Category => "category",
            TagType::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    #[serde(rename = "type")]
    pub tag_type: TagType,
    #[serde(default)]
    pub is_editable: bool,
    #[serde(default)]
    pub owner_id: Option<PrincipalId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Offline,
    Error,
    AppIssue,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Error => "error",
            DeviceStatus::AppIssue => "app_issue",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub status: DeviceStatus,
    pub last_contact: DateTime<Utc>,
    #[serde(default)]
    pub connection_type: String,
    #[serde(default)]
    pub ip_address: String,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub performance_metric: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: SensorId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Source reference; used verbatim as the container image.
    pub repo_url: String,
    /// Suffix appended to the reachable endpoint, e.g. `/measurements`.
    #[serde(default)]
    pub endpoint_path: Option<String>,
}

impl Application {
    pub fn image_reference(&self) -> &str {
        &self.repo_url
    }
}

/// Lifecycle of one application bound to one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Provisioning,
    Online,
    Error,
    Offline,
}

impl InstanceStatus {
    /// Whether health reporting may move an instance from `self` to `next`.
    pub fn can_transition_to(self, next: InstanceStatus) -> bool {
        use InstanceStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Pending, Provisioning) => true,
            (Provisioning, Online | Error | Offline) => true,
            (Online | Error | Offline, Online | Error | Offline) => true,
            // redeploy of a running instance
            (Online | Error | Offline, Provisioning) => true,
            // a fresh provision request resets any state
            (_, Pending) => true,
            _ => false,
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceStatus::Pending => "pending",
            InstanceStatus::Provisioning => "provisioning",
            InstanceStatus::Online => "online",
            InstanceStatus::Error => "error",
            InstanceStatus::Offline => "offline",
        };
        f.write_str(s)
    }
}

impl FromStr for InstanceStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(InstanceStatus::Pending),
            "provisioning" => Ok(InstanceStatus::Provisioning),
            "online" => Ok(InstanceStatus::Online),
            "error" => Ok(InstanceStatus::Error),
            "offline" => Ok(InstanceStatus::Offline),
            _ => anyhow::bail!(
                "Unknown instance status: '{}'. Use pending, provisioning, online, error or offline",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInstance {
    pub id: InstanceId,
    pub app_id: ApplicationId,
    pub device_id: DeviceId,
    pub status: InstanceStatus,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: LogId,
    pub device_id: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_instance_id: Option<InstanceId>,
    pub description: String,
    pub warning_level: WarningLevel,
    pub timestamp: DateTime<Utc>,
}
