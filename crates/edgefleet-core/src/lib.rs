//! Edgefleet Core Library
//!
//! Access scoping, application eligibility and deployment orchestration for
//! a fleet of edge devices. Persistence and the cluster API are collaborators
//! behind the `FleetStore` and `ClusterPlatform` traits.

pub mod access;
pub mod catalog;
pub mod config;
pub mod context;
pub mod deploy;
pub mod eligibility;
pub mod error;
pub mod platform;
pub mod store;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Access
    pub use crate::access::{AccessScopeResolver, DeviceFilter, DeviceOrder, DeviceQuery, ScopeDecision};

    // Read views
    pub use crate::catalog::Catalog;

    // Configuration
    pub use crate::config::{ConfigStore, FleetConfig};
    pub use crate::context::AppContext;

    // Deployment
    pub use crate::deploy::{
        DeploySettings, DeploymentOrchestrator, PortAllocator, ProvisionReport,
        report_instance_status,
    };

    // Eligibility
    pub use crate::eligibility::{EligibilityEngine, EligibilityReason, EligibilityResult};

    // Errors
    pub use crate::error::{Error, PlatformError, Result, StoreError};

    // Collaborators
    pub use crate::platform::{ClusterPlatform, InMemoryCluster, KubeClient};
    pub use crate::store::{FleetStore, Inventory, LogQuery, MemoryStore};

    // Domain types
    pub use crate::types::*;
}
