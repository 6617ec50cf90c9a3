//! Route identity.
//!
//! # Responsibilities
//! - Derive a stable identifier for a route entry from its match conditions
//! - Let the client re-locate a route inside an index-addressed array
//!
//! # Design Decisions
//! - Only the first matcher set is consulted; further sets are ignored
//! - Host, path and method contribute, in that order; header matchers never do
//! - Routes differing only in handlers share an identifier and collide
//! - No hashing: the identifier stays human readable in status and logs

use crate::admin::types::{MatchSet, RemoteRoute};

/// Identifier of a route without host, path or method conditions.
pub const DEFAULT_ROUTE_ID: &str = "default";

/// Compute the identifier of `route`.
pub fn route_id(route: &RemoteRoute) -> String {
    match route.match_sets.first() {
        Some(set) => match_set_id(set),
        None => DEFAULT_ROUTE_ID.to_string(),
    }
}

fn match_set_id(set: &MatchSet) -> String {
    let parts: Vec<String> = [
        ("host", &set.host),
        ("path", &set.path),
        ("method", &set.method),
    ]
    .into_iter()
    .filter(|(_, values)| !values.is_empty())
    .map(|(field, values)| format!("{}:{}", field, values.join(",")))
    .collect();

    if parts.is_empty() {
        return DEFAULT_ROUTE_ID.to_string();
    }
    parts.join("|")
}
