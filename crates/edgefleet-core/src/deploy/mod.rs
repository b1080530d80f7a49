//! Deployment: port allocation, workload planning, batch provisioning and
//! instance health transitions.

pub mod health;
pub mod orchestrator;
pub mod ports;
pub mod workload;

pub use health::report_instance_status;
pub use orchestrator::{DeploySettings, DeploymentOrchestrator, DeviceDeployment, ProvisionReport};
pub use ports::PortAllocator;
pub use workload::{EndpointSpec, WorkloadPlan, WorkloadSpec, reachable_path, workload_name};
