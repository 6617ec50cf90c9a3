//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! controller. All types derive Serde traits for deserialization from the
//! TOML config file.

use serde::{Deserialize, Serialize};

use crate::resource::types::{ProxyRoute, ProxyRouteParameters};

/// Root configuration for the route controller.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControllerConfig {
    /// Reconcile loop settings.
    pub controller: ReconcileConfig,

    /// Admin API transport settings.
    pub http: HttpConfig,

    /// Backoff applied to failing resources.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Desired routes.
    pub routes: Vec<RouteConfig>,
}

impl ControllerConfig {
    /// Desired resources with empty metadata and status.
    pub fn desired_routes(&self) -> Vec<ProxyRoute> {
        self.routes
            .iter()
            .map(|route| ProxyRoute::new(route.name.clone(), route.spec.clone()))
            .collect()
    }
}

/// Reconcile loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Seconds between full reconcile passes.
    pub poll_interval_secs: u64,

    /// Resources reconciled in parallel within one pass.
    pub max_concurrent_reconciles: usize,

    /// Where external identifiers and status are persisted, if anywhere.
    pub state_file: Option<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            max_concurrent_reconciles: 4,
            state_file: None,
        }
    }
}

/// Admin API transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Total time for one admin API exchange in seconds.
    pub request_timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 60_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One desired route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Resource name, unique across the file.
    pub name: String,

    #[serde(flatten)]
    pub spec: ProxyRouteParameters,
}
