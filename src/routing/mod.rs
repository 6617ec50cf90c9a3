//! Route shaping subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyRouteParameters (desired)
//!     → translate.rs (desired → wire shape)
//!     → RemoteRoute
//!     → identity.rs (match conditions → stable identifier)
//!     → identifier used to re-locate the route in the server's array
//! ```
//!
//! # Design Decisions
//! - Both stages are pure functions without I/O
//! - Deterministic: the same route always yields the same identifier
//! - The backend assigns no durable IDs, so identity is derived, not stored

pub mod identity;
pub mod translate;

pub use identity::{route_id, DEFAULT_ROUTE_ID};
pub use translate::to_remote_route;
