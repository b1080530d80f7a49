//! Resolve a principal's roles into a device-visibility decision.

use tracing::debug;

use crate::error::{Error, Result, ScopeLookup};
use crate::store::FleetStore;
use crate::types::{Device, PrincipalId};

use super::predicate::{DeviceQuery, ScopeDecision, has_unrestricted_role};

#[derive(Debug)]
pub struct AccessScopeResolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: FleetStore + ?Sized> AccessScopeResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Decide what `principal` may see. Lookup failures are errors, never a
    /// default allow.
    pub fn resolve_scope(&self, principal: PrincipalId) -> Result<ScopeDecision> {
        let roles = self
            .store
            .roles_for_principal(principal)
            .map_err(|source| Error::PrincipalLookupFailed {
                principal,
                lookup: ScopeLookup::Roles,
                source,
            })?;

        if has_unrestricted_role(&roles) {
            debug!(principal, "principal holds an unrestricted role");
            return Ok(ScopeDecision::Unrestricted);
        }

        let tags = self
            .store
            .location_tags_for_principal(principal)
            .map_err(|source| Error::PrincipalLookupFailed {
                principal,
                lookup: ScopeLookup::LocationTags,
                source,
            })?;

        let decision = ScopeDecision::restricted(tags);
        debug!(principal, ?decision, "resolved restricted scope");
        Ok(decision)
    }

    /// Run `query` limited to what `principal` may see.
    pub fn scoped_devices(&self, principal: PrincipalId, query: DeviceQuery) -> Result<Vec<Device>> {
        let decision = self.resolve_scope(principal)?;
        self.devices_for(&decision, query)
    }

    /// Run `query` under an already resolved decision.
    pub fn devices_for(&self, decision: &ScopeDecision, query: DeviceQuery) -> Result<Vec<Device>> {
        let query = query.scoped(decision);
        Ok(self.store.query_devices(&query)?)
    }
}
