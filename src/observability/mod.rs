//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Controller and runner produce:
//!     → logging.rs (structured log events within reconcile spans)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured key/value fields for machine parsing
//! - Reconcile ID flows through every event of one pass
//! - Metrics endpoint is opt-in

pub mod logging;
pub mod metrics;
