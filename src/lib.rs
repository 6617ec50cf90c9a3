//! Reconciliation engine for Caddy reverse proxy routes.
//!
//! Desired routes are declared in a TOML file; the controller keeps the
//! matching routes present on one or more Caddy servers through the admin
//! API and records the observed state back onto each resource.

pub mod admin;
pub mod config;
pub mod controller;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod resource;
pub mod routing;

pub use config::schema::ControllerConfig;
pub use controller::{Connector, Reconciler};
pub use lifecycle::Shutdown;
pub use resource::types::ProxyRoute;
