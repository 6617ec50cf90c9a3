//! Desired state to wire shape translation.
//!
//! # Responsibilities
//! - Map `ProxyRouteParameters` onto a single `RemoteRoute`
//! - Emit exactly one `reverse_proxy` handler carrying every configured block
//!
//! # Design Decisions
//! - Total and pure: every parameter set maps to exactly one route
//! - A wire block is present iff its source block is present; nothing is
//!   defaulted here (the server name is resolved before this stage)
//! - The transport block only appears when TLS is explicitly enabled
//! - Produced routes are always terminal

use crate::admin::types::{
    ActiveHealthCheck, Handler, HeaderOps, Headers, HealthChecks, LoadBalancing, MatchSet,
    PassiveHealthCheck, RemoteRoute, SelectionPolicy, TlsConfig, Transport, Upstream,
    REVERSE_PROXY_HANDLER,
};
use crate::resource::types::{
    HeaderManipulation, HeaderSpec, HealthCheckSpec, LoadBalancingSpec, ProxyRouteParameters,
    RouteMatch, UpstreamSpec, UpstreamTlsSpec,
};

/// Transport protocol used for upstream TLS.
const TLS_TRANSPORT_PROTOCOL: &str = "http";

/// Translate desired parameters into the route the admin API stores.
pub fn to_remote_route(params: &ProxyRouteParameters) -> RemoteRoute {
    let handler = Handler {
        handler: REVERSE_PROXY_HANDLER.to_string(),
        routes: Vec::new(),
        upstreams: params.upstreams.iter().map(upstream).collect(),
        load_balancing: params.load_balancing.as_ref().map(load_balancing),
        headers: params.headers.as_ref().map(headers),
        health_checks: params.health_checks.as_ref().map(health_checks),
        transport: params.tls.as_ref().and_then(transport),
    };

    RemoteRoute {
        match_sets: params
            .match_conditions
            .as_ref()
            .map(match_set)
            .into_iter()
            .collect(),
        handle: vec![handler],
        terminal: true,
    }
}

fn match_set(m: &RouteMatch) -> MatchSet {
    MatchSet {
        host: m.host.clone(),
        path: m.path.clone(),
        method: m.method.clone(),
        header: m.headers.clone(),
    }
}

fn upstream(u: &UpstreamSpec) -> Upstream {
    Upstream {
        dial: u.dial.clone(),
        max_requests: u.max_requests,
    }
}

fn load_balancing(lb: &LoadBalancingSpec) -> LoadBalancing {
    LoadBalancing {
        selection_policy: lb.policy.map(|policy| SelectionPolicy {
            policy: policy.as_str().to_string(),
        }),
        try_duration: lb.try_duration.clone(),
        try_interval: lb.try_interval.clone(),
    }
}

fn headers(h: &HeaderSpec) -> Headers {
    Headers {
        request: h.request.as_ref().map(header_ops),
        response: h.response.as_ref().map(header_ops),
    }
}

fn header_ops(ops: &HeaderManipulation) -> HeaderOps {
    HeaderOps {
        set: ops.set.clone(),
        add: ops.add.clone(),
        delete: ops.delete.clone(),
    }
}

fn health_checks(hc: &HealthCheckSpec) -> HealthChecks {
    HealthChecks {
        active: hc.active.as_ref().map(|active| ActiveHealthCheck {
            path: active.path.clone(),
            interval: active.interval.clone(),
            timeout: active.timeout.clone(),
        }),
        passive: hc.passive.as_ref().map(|passive| PassiveHealthCheck {
            max_fails: passive.max_fails,
            unhealthy_latency: passive.unhealthy_latency.clone(),
        }),
    }
}

fn transport(tls: &UpstreamTlsSpec) -> Option<Transport> {
    if !tls.is_enabled() {
        return None;
    }
    Some(Transport {
        protocol: TLS_TRANSPORT_PROTOCOL.to_string(),
        tls: Some(TlsConfig {
            server_name: tls.server_name.clone(),
            insecure_skip_verify: tls.insecure_skip_verify,
        }),
    })
}
