//! Install eligibility over the fixture fleet.

mod support;

use edgefleet_core::eligibility::{EligibilityEngine, EligibilityReason};
use edgefleet_core::error::Error;

use support::*;

#[test]
fn results_follow_input_order() {
    let store = store();
    let results = EligibilityEngine::new(&store)
        .compute_eligibility(&[MIDDELBURG_1, GOES_2, GOES_1, UNTAGGED], CLIMATE_APP)
        .unwrap();

    let summary: Vec<_> = results.iter().map(|r| (r.device_id, r.reason)).collect();
    assert_eq!(
        summary,
        vec![
            (MIDDELBURG_1, EligibilityReason::Eligible),
            (GOES_2, EligibilityReason::MissingSensors),
            (GOES_1, EligibilityReason::Eligible),
            (UNTAGGED, EligibilityReason::MissingSensors),
        ]
    );
}

#[test]
fn installed_application_wins_over_sensor_coverage() {
    let store = store();
    let results = EligibilityEngine::new(&store)
        .compute_eligibility(&[GOES_1, GOES_2], HEARTBEAT_APP)
        .unwrap();

    assert!(results[0].eligible);
    assert!(!results[1].eligible);
    assert!(results[1].already_installed);
    assert_eq!(results[1].reason, EligibilityReason::AlreadyInstalled);
    assert_eq!(
        results[1].reason.to_string(),
        "Application already installed"
    );
}

#[test]
fn application_without_requirements_fits_sensorless_devices() {
    let store = store();
    let results = EligibilityEngine::new(&store)
        .compute_eligibility(&[UNTAGGED], HEARTBEAT_APP)
        .unwrap();
    assert!(results[0].eligible);
    assert_eq!(results[0].reason.to_string(), "Device is eligible");
}

#[test]
fn empty_batch_returns_nothing_without_touching_the_store() {
    let store = FaultyStore::new(store(), None);
    assert!(
        EligibilityEngine::new(&store)
            .compute_eligibility(&[], CLIMATE_APP)
            .unwrap()
            .is_empty()
    );
    assert_eq!(store.reads(), 0);
}

#[test]
fn full_batch_makes_exactly_three_lookups() {
    let store = FaultyStore::new(store(), None);
    EligibilityEngine::new(&store)
        .compute_eligibility(&[GOES_1, GOES_2, MIDDELBURG_1], CLIMATE_APP)
        .unwrap();
    assert_eq!(store.reads(), 3);
}

#[test]
fn any_failed_lookup_fails_the_whole_batch() {
    for fault in [Fault::InstalledDevices, Fault::RequiredSensors, Fault::DeviceSensors] {
        let store = FaultyStore::new(store(), Some(fault));
        let err = EligibilityEngine::new(&store)
            .compute_eligibility(&[GOES_1, MIDDELBURG_1], CLIMATE_APP)
            .unwrap_err();
        assert!(
            matches!(err, Error::PersistenceFailure(_)),
            "{:?} gave {}",
            fault,
            err
        );
        assert!(!err.is_client_error());
    }
}

#[test]
fn failed_lookup_fails_the_scoped_listing() {
    let store = FaultyStore::new(store(), Some(Fault::DeviceSensors));
    let err = EligibilityEngine::new(&store)
        .eligible_devices_for(ADMIN, CLIMATE_APP)
        .unwrap_err();
    assert!(matches!(err, Error::PersistenceFailure(_)));
}

#[test]
fn scoped_listing_is_ordered_and_named() {
    let store = store();
    let listing = EligibilityEngine::new(&store)
        .eligible_devices_for(GOES_OPERATOR, COUNTER_APP)
        .unwrap();

    let names: Vec<_> = listing.iter().map(|e| e.device.as_str()).collect();
    assert_eq!(names, vec!["goes-harbour", "goes-market"]);
    assert!(listing.iter().all(|e| !e.result.eligible));
    assert!(
        listing
            .iter()
            .all(|e| e.result.reason.to_string() == "Required sensors not present")
    );
}

#[test]
fn scoped_listing_serializes_flat() {
    let store = store();
    let listing = EligibilityEngine::new(&store)
        .eligible_devices_for(TWO_TOWN_OPERATOR, COUNTER_APP)
        .unwrap();

    let json = serde_json::to_value(&listing).unwrap();
    let last = &json[2];
    assert_eq!(last["device"], "middelburg-abbey");
    assert_eq!(last["device_id"], MIDDELBURG_1);
    assert_eq!(last["eligible"], true);
    assert_eq!(last["reason"], "eligible");
    assert_eq!(last["message"], "Device is eligible");
    assert_eq!(json[0]["message"], "Required sensors not present");
}
