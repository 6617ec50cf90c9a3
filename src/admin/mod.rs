//! Caddy admin API subsystem.
//!
//! # Data Flow
//! ```text
//! controller operation
//!     → client.rs (HTTP exchange under a CallContext)
//!     → types.rs (JSON wire shapes)
//!     → error.rs (status → AdminError)
//! ```
//!
//! # Design Decisions
//! - One stateless client value per reconciliation; the pool is injected
//! - 404 handling is per operation (missing array vs. missing route)
//! - Response bodies are decoded and dropped immediately

pub mod client;
pub mod context;
pub mod error;
pub mod types;

pub use client::{build_http_client, AdminClient};
pub use context::CallContext;
pub use error::{AdminError, AdminResult};
pub use types::{RemoteRoute, UpstreamHealth};
