//! ProxyRoute resource definitions.
//!
//! This module defines the desired-state object the controller reconciles
//! together with the observed status it writes back. All types derive Serde
//! traits so they can be read from the configuration file and persisted to
//! the state store.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::admin::types::UpstreamHealth;

/// Virtual server routes are added to when none is configured.
pub const DEFAULT_SERVER_NAME: &str = "srv0";

/// A reverse proxy route managed on a Caddy server.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProxyRoute {
    pub metadata: ObjectMeta,
    pub spec: ProxyRouteParameters,
    #[serde(default)]
    pub status: ProxyRouteStatus,
}

/// Identity of the resource on the desired-state side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ObjectMeta {
    /// Unique resource name.
    pub name: String,

    /// Identifier of the route in the backend; unset until first created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_name: Option<String>,
}

impl ProxyRoute {
    pub fn new(name: impl Into<String>, spec: ProxyRouteParameters) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                external_name: None,
            },
            spec,
            status: ProxyRouteStatus::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Persisted external identifier, treating an empty string as unset.
    pub fn external_name(&self) -> Option<&str> {
        self.metadata
            .external_name
            .as_deref()
            .filter(|id| !id.is_empty())
    }

    pub fn set_external_name(&mut self, id: impl Into<String>) {
        self.metadata.external_name = Some(id.into());
    }

    /// Target virtual server, defaulting to `srv0`.
    pub fn server_name(&self) -> &str {
        self.spec
            .server_name
            .as_deref()
            .unwrap_or(DEFAULT_SERVER_NAME)
    }

    pub fn set_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        for condition in conditions {
            self.status.set_condition(condition);
        }
    }
}

/// Desired state of a Caddy reverse proxy route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProxyRouteParameters {
    /// Caddy admin API endpoint, e.g. `http://localhost:2019`.
    pub caddy_endpoint: String,

    /// Name of the Caddy server to add this route to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,

    /// Conditions a request must satisfy for this route to apply.
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_conditions: Option<RouteMatch>,

    /// Backends to proxy to. At least one is required.
    #[serde(default)]
    pub upstreams: Vec<UpstreamSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancing: Option<LoadBalancingSpec>,

    /// Request and response header manipulation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HeaderSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_checks: Option<HealthCheckSpec>,

    /// TLS towards upstreams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<UpstreamTlsSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteMatch {
    /// Request host names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host: Vec<String>,

    /// Request paths, wildcards such as `/api/*` allowed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub method: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpstreamSpec {
    /// `host:port` to dial.
    pub dial: String,

    /// Maximum concurrent requests to this upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_requests: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoadBalancingSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<SelectionPolicyKind>,

    /// How long to keep trying to select an available backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub try_duration: Option<String>,

    /// Wait between selection attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub try_interval: Option<String>,
}

/// Upstream selection policies understood by the reverse proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicyKind {
    Random,
    RoundRobin,
    LeastConn,
    IpHash,
    Header,
    Cookie,
}

impl SelectionPolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::RoundRobin => "round_robin",
            Self::LeastConn => "least_conn",
            Self::IpHash => "ip_hash",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

impl fmt::Display for SelectionPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeaderSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<HeaderManipulation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<HeaderManipulation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeaderManipulation {
    /// Replace header values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set: BTreeMap<String, Vec<String>>,

    /// Append header values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add: BTreeMap<String, Vec<String>>,

    /// Remove headers by name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HealthCheckSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<ActiveHealthCheckSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passive: Option<PassiveHealthCheckSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ActiveHealthCheckSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PassiveHealthCheckSpec {
    /// Failed requests before an upstream is marked down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fails: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unhealthy_latency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpstreamTlsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// SNI / verification name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_skip_verify: Option<bool>,
}

impl UpstreamTlsSpec {
    pub fn is_enabled(&self) -> bool {
        self.enabled == Some(true)
    }
}

/// Observed state written back by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProxyRouteStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub at_provider: ProxyRouteObservation,
}

impl ProxyRouteStatus {
    /// Replace the condition of the same kind, or append it.
    pub fn set_condition(&mut self, condition: Condition) {
        match self
            .conditions
            .iter_mut()
            .find(|existing| existing.kind == condition.kind)
        {
            Some(existing) => *existing = condition,
            None => self.conditions.push(condition),
        }
    }

    pub fn condition(&self, kind: ConditionKind) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.kind == kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProxyRouteObservation {
    /// Identifier of the route last observed in the backend.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub route_id: String,

    /// Latest proxy-wide upstream health snapshot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upstream_statuses: Vec<UpstreamStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpstreamStatus {
    pub address: String,
    pub healthy: bool,
    /// Active requests to this upstream.
    pub num_requests: u64,
}

impl From<UpstreamHealth> for UpstreamStatus {
    fn from(health: UpstreamHealth) -> Self {
        Self {
            address: health.address,
            healthy: health.healthy,
            num_requests: health.num_requests,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ConditionKind {
    /// Whether the route is usable in the backend.
    Ready,
    /// Whether the last reconciliation succeeded.
    Synced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ConditionReason {
    Available,
    Creating,
    Deleting,
    ReconcileSuccess,
    ReconcileError,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Condition {
    pub kind: ConditionKind,
    pub status: ConditionStatus,
    pub reason: ConditionReason,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Condition {
    pub fn available() -> Self {
        Self::ready(ConditionStatus::True, ConditionReason::Available)
    }

    pub fn creating() -> Self {
        Self::ready(ConditionStatus::False, ConditionReason::Creating)
    }

    pub fn deleting() -> Self {
        Self::ready(ConditionStatus::False, ConditionReason::Deleting)
    }

    pub fn reconcile_success() -> Self {
        Self {
            kind: ConditionKind::Synced,
            status: ConditionStatus::True,
            reason: ConditionReason::ReconcileSuccess,
            message: String::new(),
        }
    }

    pub fn reconcile_error(message: impl Into<String>) -> Self {
        Self {
            kind: ConditionKind::Synced,
            status: ConditionStatus::False,
            reason: ConditionReason::ReconcileError,
            message: message.into(),
        }
    }

    fn ready(status: ConditionStatus, reason: ConditionReason) -> Self {
        Self {
            kind: ConditionKind::Ready,
            status,
            reason,
            message: String::new(),
        }
    }
}
