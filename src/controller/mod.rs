//! Reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! Desired routes (config file, reloads)
//!     → runner.rs (schedule due resources, bounded concurrency)
//!     → external.rs (observe → create | update, or delete when removed)
//!     → admin::AdminClient (Caddy admin API)
//!     → resource status written back, store.rs persists it
//! ```
//!
//! # Design Decisions
//! - The external client holds no state; identifiers live on the resource
//! - One reconcile never retries inline; failures are rescheduled with backoff
//! - Every reconcile runs in its own span with a fresh reconcile ID

pub mod error;
pub mod external;
pub mod runner;
pub mod store;

use async_trait::async_trait;

use crate::admin::CallContext;

pub use error::{ControllerError, ControllerResult};
pub use external::{Connector, ExternalObservation, ProxyRouteExternal};
pub use runner::{PassSummary, ReconcileAction, Reconciler};
pub use store::{PersistedState, StateStore, StoreError};

/// Lifecycle operations against the system that owns the real resource.
///
/// Implementations may mutate the resource to record the external
/// identifier, conditions and observed status.
#[async_trait]
pub trait ExternalClient: Send + Sync {
    type Resource: Send;

    /// Report whether the resource exists and matches its desired state.
    async fn observe(
        &self,
        ctx: &CallContext,
        resource: &mut Self::Resource,
    ) -> ControllerResult<ExternalObservation>;

    async fn create(&self, ctx: &CallContext, resource: &mut Self::Resource)
        -> ControllerResult<()>;

    async fn update(&self, ctx: &CallContext, resource: &mut Self::Resource)
        -> ControllerResult<()>;

    /// Remove the external resource. Absence counts as success.
    async fn delete(&self, ctx: &CallContext, resource: &mut Self::Resource)
        -> ControllerResult<()>;
}
