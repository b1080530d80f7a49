//! Scope resolution and scoped device reads against the fixture fleet.

mod support;

use edgefleet_core::access::{AccessScopeResolver, DeviceFilter, DeviceOrder, DeviceQuery, ScopeDecision};
use edgefleet_core::error::{Error, ScopeLookup};
use edgefleet_core::store::FleetStore;
use edgefleet_core::types::DeviceStatus;

use support::*;

fn ids(devices: &[edgefleet_core::types::Device]) -> Vec<i64> {
    devices.iter().map(|d| d.id).collect()
}

#[test]
fn unrestricted_role_sees_every_device() {
    let store = store();
    let resolver = AccessScopeResolver::new(&store);

    assert_eq!(resolver.resolve_scope(ADMIN).unwrap(), ScopeDecision::Unrestricted);
    let devices = resolver
        .scoped_devices(ADMIN, DeviceQuery::new().order_by(DeviceOrder::Id))
        .unwrap();
    assert_eq!(ids(&devices), vec![GOES_1, GOES_2, MIDDELBURG_1, UNTAGGED]);
}

#[test]
fn restricted_role_sees_only_its_municipality() {
    let store = store();
    let resolver = AccessScopeResolver::new(&store);

    assert_eq!(
        resolver.resolve_scope(GOES_OPERATOR).unwrap(),
        ScopeDecision::restricted(["Goes"])
    );
    let devices = resolver
        .scoped_devices(GOES_OPERATOR, DeviceQuery::new().order_by(DeviceOrder::Id))
        .unwrap();
    assert_eq!(ids(&devices), vec![GOES_1, GOES_2]);
}

#[test]
fn tags_from_several_roles_are_unioned() {
    let store = store();
    let devices = AccessScopeResolver::new(&store)
        .scoped_devices(TWO_TOWN_OPERATOR, DeviceQuery::new().order_by(DeviceOrder::Id))
        .unwrap();
    assert_eq!(ids(&devices), vec![GOES_1, GOES_2, MIDDELBURG_1]);
}

#[test]
fn category_tags_do_not_grant_visibility() {
    let store = store();
    let resolver = AccessScopeResolver::new(&store);

    assert_eq!(
        resolver.resolve_scope(OBSERVER).unwrap(),
        ScopeDecision::RestrictedToNone
    );
    assert!(resolver.scoped_devices(OBSERVER, DeviceQuery::new()).unwrap().is_empty());
}

#[test]
fn principal_without_roles_sees_nothing() {
    let store = store();
    let resolver = AccessScopeResolver::new(&store);

    assert_eq!(
        resolver.resolve_scope(UNKNOWN_PRINCIPAL).unwrap(),
        ScopeDecision::RestrictedToNone
    );
    assert!(
        resolver
            .scoped_devices(UNKNOWN_PRINCIPAL, DeviceQuery::new())
            .unwrap()
            .is_empty()
    );
}

#[test]
fn caller_filters_are_combined_with_scope() {
    let store = store();
    store.set_device_status(GOES_2, DeviceStatus::Offline).unwrap();

    let devices = AccessScopeResolver::new(&store)
        .scoped_devices(
            TWO_TOWN_OPERATOR,
            DeviceQuery::new()
                .filter(DeviceFilter::Status(DeviceStatus::Online))
                .order_by(DeviceOrder::Name),
        )
        .unwrap();
    // goes-harbour, middelburg-abbey
    assert_eq!(ids(&devices), vec![GOES_1, MIDDELBURG_1]);
}

#[test]
fn failed_role_lookup_names_the_lookup() {
    let store = FaultyStore::new(store(), Some(Fault::Roles));
    let err = AccessScopeResolver::new(&store)
        .resolve_scope(GOES_OPERATOR)
        .unwrap_err();

    match err {
        Error::PrincipalLookupFailed {
            principal, lookup, ..
        } => {
            assert_eq!(principal, GOES_OPERATOR);
            assert_eq!(lookup, ScopeLookup::Roles);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failed_tag_lookup_names_the_lookup() {
    let store = FaultyStore::new(store(), Some(Fault::LocationTags));
    let err = AccessScopeResolver::new(&store)
        .resolve_scope(GOES_OPERATOR)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::PrincipalLookupFailed {
            lookup: ScopeLookup::LocationTags,
            ..
        }
    ));
    assert!(!err.is_client_error());
}

#[test]
fn unrestricted_principal_skips_the_tag_lookup() {
    let store = FaultyStore::new(store(), Some(Fault::LocationTags));
    assert_eq!(
        AccessScopeResolver::new(&store).resolve_scope(ADMIN).unwrap(),
        ScopeDecision::Unrestricted
    );
}
