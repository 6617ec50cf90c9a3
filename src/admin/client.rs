//! Caddy admin API client.
//!
//! # Responsibilities
//! - List, create and delete routes of a named server
//! - Re-locate routes by derived identity (the backend has no route IDs)
//! - Fetch the proxy-wide upstream health snapshot
//! - Map HTTP statuses onto `AdminError`
//!
//! # Design Decisions
//! - Stateless apart from the base endpoint and the shared connection pool
//! - Every call runs under the caller's `CallContext`
//! - Update is delete-then-create and is NOT atomic
//! - Delete addresses the route by its index at scan time; a concurrent
//!   writer can shift the array between the scan and the DELETE

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::admin::context::CallContext;
use crate::admin::error::{AdminError, AdminResult};
use crate::admin::types::{RemoteRoute, UpstreamHealth};
use crate::config::schema::HttpConfig;
use crate::routing::identity::route_id;

const USER_AGENT: &str = concat!("proxy-route-controller/", env!("CARGO_PKG_VERSION"));

/// Build the connection pool shared by all admin clients.
pub fn build_http_client(config: &HttpConfig) -> AdminResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;
    Ok(client)
}

/// Client for one Caddy admin endpoint.
#[derive(Clone)]
pub struct AdminClient {
    endpoint: String,
    http: reqwest::Client,
}

/// Status and body of a completed exchange.
struct Reply {
    status: StatusCode,
    body: Vec<u8>,
}

impl Reply {
    fn into_backend_error(self) -> AdminError {
        AdminError::Backend {
            status: self.status.as_u16(),
            body: String::from_utf8_lossy(&self.body).into_owned(),
        }
    }

    /// Decode a JSON array, treating an empty body or `null` as empty.
    fn decode_list<T: DeserializeOwned>(&self) -> AdminResult<Vec<T>> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let items: Option<Vec<T>> = serde_json::from_slice(&self.body)?;
        Ok(items.unwrap_or_default())
    }
}

impl AdminClient {
    /// Create a client for `endpoint`; a trailing slash is ignored.
    pub fn new(endpoint: &str, http: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn routes_url(&self, server: &str) -> String {
        format!("{}/config/apps/http/servers/{}/routes", self.endpoint, server)
    }

    async fn fetch(&self, ctx: &CallContext, request: RequestBuilder) -> AdminResult<Reply> {
        ctx.run(async move {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?.to_vec();
            Ok(Reply { status, body })
        })
        .await
    }

    /// Fetch the server's route array.
    ///
    /// A missing array endpoint is `AdminError::NotFound`, distinct from an
    /// empty array.
    pub async fn list_routes(
        &self,
        ctx: &CallContext,
        server: &str,
    ) -> AdminResult<Vec<RemoteRoute>> {
        let reply = self.fetch(ctx, self.http.get(self.routes_url(server))).await?;

        if reply.status == StatusCode::NOT_FOUND {
            return Err(AdminError::NotFound);
        }
        if !reply.status.is_success() {
            return Err(reply.into_backend_error());
        }
        reply.decode_list()
    }

    /// Append `route` to the server's route array and return its identifier.
    ///
    /// Not idempotent: posting the same route twice stores it twice.
    pub async fn create_route(
        &self,
        ctx: &CallContext,
        server: &str,
        route: &RemoteRoute,
    ) -> AdminResult<String> {
        let body = serde_json::to_vec(route)?;
        let request = self
            .http
            .post(self.routes_url(server))
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        let reply = self.fetch(ctx, request).await?;
        if !reply.status.is_success() {
            return Err(reply.into_backend_error());
        }

        let id = route_id(route);
        tracing::debug!(server = %server, route_id = %id, "Route appended");
        Ok(id)
    }

    /// Locate the first route whose identity equals `id`, with its index.
    pub async fn find_route(
        &self,
        ctx: &CallContext,
        server: &str,
        id: &str,
    ) -> AdminResult<Option<(usize, RemoteRoute)>> {
        let routes = self.list_routes(ctx, server).await?;
        Ok(routes
            .into_iter()
            .enumerate()
            .find(|(_, route)| route_id(route) == id))
    }

    /// Fetch the route identified by `id`.
    pub async fn get_route(
        &self,
        ctx: &CallContext,
        server: &str,
        id: &str,
    ) -> AdminResult<RemoteRoute> {
        match self.find_route(ctx, server, id).await? {
            Some((_, route)) => Ok(route),
            None => Err(AdminError::NotFound),
        }
    }

    /// Delete the route identified by `id`.
    ///
    /// A missing route array or a route that is no longer present counts as
    /// already deleted.
    pub async fn delete_route(&self, ctx: &CallContext, server: &str, id: &str) -> AdminResult<()> {
        let index = match self.find_route(ctx, server, id).await {
            Ok(Some((index, _))) => index,
            Ok(None) | Err(AdminError::NotFound) => {
                tracing::debug!(server = %server, route_id = %id, "Route already absent");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let url = format!("{}/{}", self.routes_url(server), index);
        let reply = self.fetch(ctx, self.http.delete(url)).await?;
        if !reply.status.is_success() {
            return Err(reply.into_backend_error());
        }

        tracing::debug!(server = %server, route_id = %id, index, "Route deleted");
        Ok(())
    }

    /// Replace the route identified by `id` with `route`.
    ///
    /// Deletes first, then appends; a failure in between leaves the route
    /// absent until the next successful create.
    pub async fn update_route(
        &self,
        ctx: &CallContext,
        server: &str,
        id: &str,
        route: &RemoteRoute,
    ) -> AdminResult<()> {
        self.delete_route(ctx, server, id).await?;
        let new_id = self.create_route(ctx, server, route).await?;

        if new_id != id {
            tracing::debug!(
                server = %server,
                old_route_id = %id,
                new_route_id = %new_id,
                "Route re-created under a different identity"
            );
        }
        Ok(())
    }

    /// Fetch the proxy-wide upstream health snapshot.
    pub async fn upstream_health(&self, ctx: &CallContext) -> AdminResult<Vec<UpstreamHealth>> {
        let url = format!("{}/reverse_proxy/upstreams", self.endpoint);
        let reply = self.fetch(ctx, self.http.get(url)).await?;

        if !reply.status.is_success() {
            return Err(reply.into_backend_error());
        }
        reply.decode_list()
    }
}

impl std::fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
