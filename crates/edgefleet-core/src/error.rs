//! Error kinds surfaced by the access, eligibility and deployment pipeline.

use std::fmt;

use thiserror::Error;

use crate::types::{ApplicationId, DeviceId, InstanceId, InstanceStatus, PrincipalId};

/// Which lookup failed while resolving a principal's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeLookup {
    Roles,
    LocationTags,
}

impl fmt::Display for ScopeLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeLookup::Roles => f.write_str("roles"),
            ScopeLookup::LocationTags => f.write_str("location tags"),
        }
    }
}

/// Failure reported by the persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// Failure reported by the orchestration platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The named resource already exists; callers fall back to an update.
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    #[error("platform rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("platform transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid platform response: {0}")]
    InvalidResponse(String),
}

impl PlatformError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, PlatformError::AlreadyExists { .. })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to look up {lookup} for principal {principal}: {source}")]
    PrincipalLookupFailed {
        principal: PrincipalId,
        lookup: ScopeLookup,
        #[source]
        source: StoreError,
    },
    #[error("principal does not have access to device {0}")]
    AccessDenied(DeviceId),
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error("orchestration failed for device {device_id}: {source}")]
    OrchestrationFailure {
        device_id: DeviceId,
        #[source]
        source: PlatformError,
    },
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("instance {instance} cannot move from {from} to {to}")]
    InvalidTransition {
        instance: InstanceId,
        from: InstanceStatus,
        to: InstanceStatus,
    },
}

impl Error {
    /// Client errors are correctable by the caller; everything else is a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::AccessDenied(_)
                | Error::ApplicationNotFound(_)
                | Error::InvalidRequest(_)
                | Error::InvalidTransition { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
