//! Access scoping: roles and location tags to device-read predicates.

pub mod predicate;
pub mod resolver;

pub use predicate::{
    DeviceFilter, DeviceOrder, DeviceQuery, ScopeDecision, SqlFragment, SqlParam,
    has_unrestricted_role,
};
pub use resolver::AccessScopeResolver;
