//! Health-driven instance status transitions and the device `app_issue` aggregate.

use tracing::info;

use crate::access::{DeviceFilter, DeviceQuery};
use crate::error::{Error, Result, StoreError};
use crate::store::FleetStore;
use crate::types::{ApplicationInstance, DeviceId, DeviceStatus, InstanceId, InstanceStatus};

/// Apply a reported status to an instance.
///
/// An instance entering `error` flags its device `app_issue`; once no
/// instance on the device is in `error` any more, the flag returns to
/// `online`. Other device statuses are owned by device heartbeats and left
/// alone.
pub fn report_instance_status<S: FleetStore + ?Sized>(
    store: &S,
    instance_id: InstanceId,
    status: InstanceStatus,
) -> Result<ApplicationInstance> {
    let mut instance = store
        .instance(instance_id)?
        .ok_or_else(|| StoreError::NotFound(format!("instance {}", instance_id)))?;

    if !instance.status.can_transition_to(status) {
        return Err(Error::InvalidTransition {
            instance: instance_id,
            from: instance.status,
            to: status,
        });
    }

    store.set_instance_status(instance_id, status)?;
    instance.status = status;

    if status == InstanceStatus::Error {
        info!(
            instance = instance_id,
            device = instance.device_id,
            "instance entered error, flagging device"
        );
        store.set_device_status(instance.device_id, DeviceStatus::AppIssue)?;
    } else {
        clear_app_issue(store, instance.device_id)?;
    }

    Ok(instance)
}

/// Return an `app_issue` device to `online` once none of its instances is in
/// `error`.
pub(crate) fn clear_app_issue<S: FleetStore + ?Sized>(store: &S, device: DeviceId) -> Result<()> {
    let instances = store.instances_for_devices(&[device])?;
    let any_error = instances
        .get(&device)
        .is_some_and(|list| list.iter().any(|i| i.status == InstanceStatus::Error));
    if any_error {
        return Ok(());
    }

    let query = DeviceQuery::new()
        .filter(DeviceFilter::Ids([device].into()))
        .filter(DeviceFilter::Status(DeviceStatus::AppIssue));
    if !store.query_devices(&query)?.is_empty() {
        store.set_device_status(device, DeviceStatus::Online)?;
    }
    Ok(())
}
