//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Failed reconciliation of a resource:
//!     → runner increments the resource's failure count
//!     → backoff.rs (exponential delay + jitter)
//!     → resource skipped until the delay has passed
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every admin API call has a deadline
//! - The controller never retries inline; only the runner reschedules
//! - Jittered backoff keeps many failing resources from retrying in lockstep

pub mod backoff;
