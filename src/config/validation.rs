//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, at least one upstream)
//! - Check admin endpoints are usable URLs
//! - Detect routes that would collide on the same server
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ControllerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::config::schema::{ControllerConfig, RouteConfig};
use crate::resource::types::DEFAULT_SERVER_NAME;
use crate::routing::{route_id, to_remote_route};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("controller.poll_interval_secs must be greater than 0")]
    ZeroPollInterval,

    #[error("controller.max_concurrent_reconciles must be greater than 0")]
    ZeroConcurrency,

    #[error("route at position {0} has an empty name")]
    EmptyName(usize),

    #[error("route name '{0}' is used more than once")]
    DuplicateName(String),

    #[error("route '{route}': invalid caddy_endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        route: String,
        endpoint: String,
        reason: String,
    },

    #[error("route '{0}' needs at least one upstream")]
    NoUpstreams(String),

    #[error("route '{route}': upstream {index} has an empty dial address")]
    EmptyDial { route: String, index: usize },

    #[error("routes '{first}' and '{second}' share identity '{route_id}' on {endpoint} server {server}")]
    IdentityCollision {
        first: String,
        second: String,
        route_id: String,
        endpoint: String,
        server: String,
    },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ControllerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.controller.poll_interval_secs == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }
    if config.controller.max_concurrent_reconciles == 0 {
        errors.push(ValidationError::ZeroConcurrency);
    }

    let mut names = HashSet::new();
    for (position, route) in config.routes.iter().enumerate() {
        if route.name.is_empty() {
            errors.push(ValidationError::EmptyName(position));
        } else if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateName(route.name.clone()));
        }
        validate_route(route, &mut errors);
    }

    check_identity_collisions(&config.routes, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(route: &RouteConfig, errors: &mut Vec<ValidationError>) {
    let endpoint = &route.spec.caddy_endpoint;
    match url::Url::parse(endpoint) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::InvalidEndpoint {
            route: route.name.clone(),
            endpoint: endpoint.clone(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError::InvalidEndpoint {
            route: route.name.clone(),
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        }),
    }

    if route.spec.upstreams.is_empty() {
        errors.push(ValidationError::NoUpstreams(route.name.clone()));
    }
    for (index, upstream) in route.spec.upstreams.iter().enumerate() {
        if upstream.dial.trim().is_empty() {
            errors.push(ValidationError::EmptyDial {
                route: route.name.clone(),
                index,
            });
        }
    }
}

/// Two managed routes with the same identity on the same server would
/// overwrite each other's entries.
fn check_identity_collisions(routes: &[RouteConfig], errors: &mut Vec<ValidationError>) {
    let mut seen: HashMap<(String, String, String), &str> = HashMap::new();

    for route in routes {
        let endpoint = route.spec.caddy_endpoint.trim_end_matches('/').to_string();
        let server = route
            .spec
            .server_name
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string());
        let id = route_id(&to_remote_route(&route.spec));

        let key = (endpoint, server, id);
        if let Some(first) = seen.get(&key) {
            let (endpoint, server, route_id) = key;
            errors.push(ValidationError::IdentityCollision {
                first: first.to_string(),
                second: route.name.clone(),
                route_id,
                endpoint,
                server,
            });
        } else {
            seen.insert(key, route.name.as_str());
        }
    }
}
