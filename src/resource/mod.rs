//! Desired-state resources.
//!
//! # Data Flow
//! ```text
//! config file [[routes]]
//!     → ProxyRoute (spec from config, metadata/status from the state store)
//!     → controller reads spec, writes external_name + status
//!     → state store persists metadata + status
//! ```
//!
//! # Design Decisions
//! - The external identifier lives on the resource, never in the controller
//! - Status is only written by the controller and the runner

pub mod types;

pub use types::{
    Condition, ConditionKind, ConditionReason, ConditionStatus, ObjectMeta, ProxyRoute,
    ProxyRouteObservation, ProxyRouteParameters, ProxyRouteStatus, RouteMatch,
    SelectionPolicyKind, UpstreamSpec, UpstreamStatus, DEFAULT_SERVER_NAME,
};
