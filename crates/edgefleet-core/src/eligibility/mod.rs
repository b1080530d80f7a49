//! Install eligibility: non-duplication plus sensor coverage, computed per batch.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::access::{AccessScopeResolver, DeviceOrder, DeviceQuery};
use crate::error::Result;
use crate::store::FleetStore;
use crate::types::{ApplicationId, DeviceId, PrincipalId, SensorId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityReason {
    AlreadyInstalled,
    MissingSensors,
    Eligible,
}

impl fmt::Display for EligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EligibilityReason::AlreadyInstalled => "Application already installed",
            EligibilityReason::MissingSensors => "Required sensors not present",
            EligibilityReason::Eligible => "Device is eligible",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub device_id: DeviceId,
    pub eligible: bool,
    pub already_installed: bool,
    pub reason: EligibilityReason,
}

/// Eligibility result with the device's display name and the reason's
/// rendered text attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleDevice {
    pub device: String,
    #[serde(flatten)]
    pub result: EligibilityResult,
    pub message: String,
}

/// Pure decision for one device.
pub fn evaluate(
    device_id: DeviceId,
    installed: bool,
    required: &HashSet<SensorId>,
    present: Option<&HashSet<SensorId>>,
) -> EligibilityResult {
    let has_all = required.is_empty() || present.is_some_and(|p| required.is_subset(p));
    let reason = if installed {
        EligibilityReason::AlreadyInstalled
    } else if !has_all {
        EligibilityReason::MissingSensors
    } else {
        EligibilityReason::Eligible
    };
    EligibilityResult {
        device_id,
        eligible: !installed && has_all,
        already_installed: installed,
        reason,
    }
}

#[derive(Debug)]
pub struct EligibilityEngine<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: FleetStore + ?Sized> EligibilityEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// One result per input device, in input order. Three batch lookups,
    /// none at all for an empty batch.
    pub fn compute_eligibility(
        &self,
        device_ids: &[DeviceId],
        app: ApplicationId,
    ) -> Result<Vec<EligibilityResult>> {
        if device_ids.is_empty() {
            return Ok(Vec::new());
        }

        let installed = self.store.installed_devices(app, device_ids)?;
        let required = self.store.required_sensors(app)?;
        let sensors = self.store.device_sensors(device_ids)?;

        let results: Vec<EligibilityResult> = device_ids
            .iter()
            .map(|id| evaluate(*id, installed.contains(id), &required, sensors.get(id)))
            .collect();

        debug!(
            app,
            devices = device_ids.len(),
            eligible = results.iter().filter(|r| r.eligible).count(),
            "computed eligibility"
        );
        Ok(results)
    }

    /// Eligibility of every device `principal` can see, ordered by device id.
    pub fn eligible_devices_for(
        &self,
        principal: PrincipalId,
        app: ApplicationId,
    ) -> Result<Vec<EligibleDevice>> {
        let devices = AccessScopeResolver::new(self.store)
            .scoped_devices(principal, DeviceQuery::new().order_by(DeviceOrder::Id))?;
        let ids: Vec<DeviceId> = devices.iter().map(|d| d.id).collect();
        let results = self.compute_eligibility(&ids, app)?;

        Ok(devices
            .into_iter()
            .zip(results)
            .map(|(device, result)| EligibleDevice {
                device: device.name,
                message: result.reason.to_string(),
                result,
            })
            .collect())
    }
}
