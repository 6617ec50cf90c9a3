//! External client for ProxyRoute resources.
//!
//! # Responsibilities
//! - Observe whether the desired route exists in the backend
//! - Create, update and delete the backend route
//! - Write the external identifier and observed status onto the resource
//!
//! # Design Decisions
//! - No state between invocations; identifier and status live on the resource
//! - Admin API failures are wrapped with an operation label, never retried
//! - Upstream health is best effort and never fails an observation
//! - Observation always reports "not up to date" so every pass re-applies
//!   the desired route

use async_trait::async_trait;

use crate::admin::types::RemoteRoute;
use crate::admin::{build_http_client, AdminClient, AdminError, CallContext};
use crate::config::schema::HttpConfig;
use crate::controller::error::{ControllerError, ControllerResult};
use crate::controller::ExternalClient;
use crate::resource::types::{Condition, ProxyRoute, ProxyRouteParameters, UpstreamStatus};
use crate::routing::to_remote_route;

/// Result of observing a resource in the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
}

impl ExternalObservation {
    fn absent() -> Self {
        Self::default()
    }
}

/// Produces a fresh [`ProxyRouteExternal`] per reconciliation.
#[derive(Debug, Clone)]
pub struct Connector {
    http: reqwest::Client,
}

impl Connector {
    /// Share an existing connection pool.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, AdminError> {
        Ok(Self::new(build_http_client(config)?))
    }

    /// Build a client for the endpoint named on `resource`.
    pub fn connect(&self, resource: &ProxyRoute) -> ControllerResult<ProxyRouteExternal> {
        let endpoint = &resource.spec.caddy_endpoint;
        url::Url::parse(endpoint).map_err(|e| ControllerError::NewClient {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        Ok(ProxyRouteExternal::new(AdminClient::new(
            endpoint,
            self.http.clone(),
        )))
    }
}

/// Observes, then creates, updates or deletes the backend route of one
/// ProxyRoute.
#[derive(Debug, Clone)]
pub struct ProxyRouteExternal {
    client: AdminClient,
}

impl ProxyRouteExternal {
    pub fn new(client: AdminClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExternalClient for ProxyRouteExternal {
    type Resource = ProxyRoute;

    async fn observe(
        &self,
        ctx: &CallContext,
        cr: &mut ProxyRoute,
    ) -> ControllerResult<ExternalObservation> {
        let Some(route_id) = cr.external_name().map(str::to_owned) else {
            return Ok(ExternalObservation::absent());
        };

        let route = match self.client.get_route(ctx, cr.server_name(), &route_id).await {
            Ok(route) => route,
            Err(AdminError::NotFound) => {
                tracing::debug!(route_id = %route_id, "Route not present in backend");
                return Ok(ExternalObservation::absent());
            }
            Err(e) => return Err(ControllerError::GetRoute(e)),
        };

        cr.status.at_provider.route_id = route_id;

        match self.client.upstream_health(ctx).await {
            Ok(upstreams) => {
                cr.status.at_provider.upstream_statuses =
                    upstreams.into_iter().map(UpstreamStatus::from).collect();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to get upstream status");
            }
        }

        let up_to_date = is_up_to_date(&cr.spec, &route);
        cr.set_conditions([Condition::available()]);

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: up_to_date,
        })
    }

    async fn create(&self, ctx: &CallContext, cr: &mut ProxyRoute) -> ControllerResult<()> {
        cr.set_conditions([Condition::creating()]);

        let route = to_remote_route(&cr.spec);
        let route_id = self
            .client
            .create_route(ctx, cr.server_name(), &route)
            .await
            .map_err(ControllerError::CreateRoute)?;

        tracing::info!(route_id = %route_id, "Proxy route created");
        cr.set_external_name(route_id);
        Ok(())
    }

    async fn update(&self, ctx: &CallContext, cr: &mut ProxyRoute) -> ControllerResult<()> {
        let route = to_remote_route(&cr.spec);
        // The stored identifier addresses the old entry even when the new
        // match conditions derive a different one; it is not rotated here.
        let route_id = cr.external_name().unwrap_or_default();

        self.client
            .update_route(ctx, cr.server_name(), route_id, &route)
            .await
            .map_err(ControllerError::UpdateRoute)?;

        tracing::debug!(route_id = %route_id, "Proxy route re-applied");
        Ok(())
    }

    async fn delete(&self, ctx: &CallContext, cr: &mut ProxyRoute) -> ControllerResult<()> {
        cr.set_conditions([Condition::deleting()]);

        let Some(route_id) = cr.external_name() else {
            return Ok(());
        };

        self.client
            .delete_route(ctx, cr.server_name(), route_id)
            .await
            .map_err(ControllerError::DeleteRoute)?;

        tracing::info!(route_id = %route_id, "Proxy route deleted");
        Ok(())
    }
}

/// Field-level comparison is not performed; every existing route is
/// re-applied on each pass.
fn is_up_to_date(_desired: &ProxyRouteParameters, _observed: &RemoteRoute) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::types::{ConditionKind, ConditionReason, RouteMatch, UpstreamSpec};
    use mockito::{Matcher, Mock, Server};

    const ROUTES_PATH: &str = "/config/apps/http/servers/srv0/routes";
    const A_ROUTE: &str = r#"[{"match":[{"host":["a.com"]}],"handle":[{"handler":"reverse_proxy","upstreams":[{"dial":"b:80"}]}],"terminal":true}]"#;

    fn resource(endpoint: &str) -> ProxyRoute {
        ProxyRoute::new(
            "web",
            ProxyRouteParameters {
                caddy_endpoint: endpoint.to_string(),
                match_conditions: Some(RouteMatch {
                    host: vec!["a.com".to_string()],
                    ..Default::default()
                }),
                upstreams: vec![UpstreamSpec {
                    dial: "b:80".to_string(),
                    max_requests: None,
                }],
                ..Default::default()
            },
        )
    }

    fn external(server: &Server) -> ProxyRouteExternal {
        Connector::new(reqwest::Client::new())
            .connect(&resource(&server.url()))
            .unwrap()
    }

    /// Mocks failing the test if any admin API call is made.
    async fn forbid_all(server: &mut Server) -> Vec<Mock> {
        let mut mocks = Vec::new();
        for method in ["GET", "POST", "DELETE"] {
            mocks.push(
                server
                    .mock(method, Matcher::Any)
                    .expect(0)
                    .create_async()
                    .await,
            );
        }
        mocks
    }

    fn ready_reason(cr: &ProxyRoute) -> ConditionReason {
        cr.status.condition(ConditionKind::Ready).unwrap().reason
    }

    #[tokio::test]
    async fn test_observe_without_identifier_makes_no_call() {
        let mut server = Server::new_async().await;
        let any = forbid_all(&mut server).await;

        let mut cr = resource(&server.url());
        let obs = external(&server)
            .observe(&CallContext::background(), &mut cr)
            .await
            .unwrap();

        assert!(!obs.resource_exists);
        for mock in any {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_observe_existing_route_is_never_up_to_date() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", ROUTES_PATH)
            .with_status(200)
            .with_body(A_ROUTE)
            .create_async()
            .await;
        server
            .mock("GET", "/reverse_proxy/upstreams")
            .with_status(200)
            .with_body(r#"[{"address":"b:80","healthy":true,"num_requests":4}]"#)
            .create_async()
            .await;

        let mut cr = resource(&server.url());
        cr.set_external_name("host:a.com");

        let obs = external(&server)
            .observe(&CallContext::background(), &mut cr)
            .await
            .unwrap();

        assert!(obs.resource_exists);
        assert!(!obs.resource_up_to_date);
        assert_eq!(cr.status.at_provider.route_id, "host:a.com");
        assert_eq!(cr.status.at_provider.upstream_statuses.len(), 1);
        assert_eq!(cr.status.at_provider.upstream_statuses[0].num_requests, 4);
        assert_eq!(ready_reason(&cr), ConditionReason::Available);
    }

    #[tokio::test]
    async fn test_observe_tolerates_upstream_health_failure() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", ROUTES_PATH)
            .with_status(200)
            .with_body(A_ROUTE)
            .create_async()
            .await;
        server
            .mock("GET", "/reverse_proxy/upstreams")
            .with_status(500)
            .create_async()
            .await;

        let mut cr = resource(&server.url());
        cr.set_external_name("host:a.com");

        let obs = external(&server)
            .observe(&CallContext::background(), &mut cr)
            .await
            .unwrap();

        assert!(obs.resource_exists);
        assert!(cr.status.at_provider.upstream_statuses.is_empty());
    }

    #[tokio::test]
    async fn test_observe_missing_route_reports_absent() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", ROUTES_PATH)
            .with_status(404)
            .create_async()
            .await;

        let mut cr = resource(&server.url());
        cr.set_external_name("host:a.com");

        let obs = external(&server)
            .observe(&CallContext::background(), &mut cr)
            .await
            .unwrap();
        assert_eq!(obs, ExternalObservation::default());
    }

    #[tokio::test]
    async fn test_observe_backend_failure_is_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", ROUTES_PATH)
            .with_status(502)
            .create_async()
            .await;

        let mut cr = resource(&server.url());
        cr.set_external_name("host:a.com");

        let err = external(&server)
            .observe(&CallContext::background(), &mut cr)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::GetRoute(_)));
        assert!(err.to_string().starts_with("cannot get proxy route"));
    }

    #[tokio::test]
    async fn test_create_persists_identifier() {
        let mut server = Server::new_async().await;
        let post = server
            .mock("POST", ROUTES_PATH)
            .with_status(200)
            .create_async()
            .await;

        let mut cr = resource(&server.url());
        external(&server)
            .create(&CallContext::background(), &mut cr)
            .await
            .unwrap();

        post.assert_async().await;
        assert_eq!(cr.external_name(), Some("host:a.com"));
        assert_eq!(ready_reason(&cr), ConditionReason::Creating);
    }

    #[tokio::test]
    async fn test_create_failure_keeps_identifier_unset() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", ROUTES_PATH)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let mut cr = resource(&server.url());
        let err = external(&server)
            .create(&CallContext::background(), &mut cr)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "cannot create proxy route: caddy API returned status 500: boom"
        );
        assert_eq!(cr.external_name(), None);
    }

    #[tokio::test]
    async fn test_delete_without_identifier_makes_no_call() {
        let mut server = Server::new_async().await;
        let any = forbid_all(&mut server).await;

        let mut cr = resource(&server.url());
        external(&server)
            .delete(&CallContext::background(), &mut cr)
            .await
            .unwrap();

        for mock in any {
            mock.assert_async().await;
        }
        assert_eq!(ready_reason(&cr), ConditionReason::Deleting);
    }

    #[tokio::test]
    async fn test_delete_failure_is_labelled() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", ROUTES_PATH)
            .with_status(500)
            .create_async()
            .await;

        let mut cr = resource(&server.url());
        cr.set_external_name("host:a.com");

        let err = external(&server)
            .delete(&CallContext::background(), &mut cr)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::DeleteRoute(_)));
    }

    #[tokio::test]
    async fn test_update_failure_is_labelled() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", ROUTES_PATH)
            .with_status(200)
            .with_body(A_ROUTE)
            .create_async()
            .await;
        server
            .mock("DELETE", format!("{ROUTES_PATH}/0").as_str())
            .with_status(200)
            .create_async()
            .await;
        server
            .mock("POST", ROUTES_PATH)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let mut cr = resource(&server.url());
        cr.set_external_name("host:a.com");

        let err = external(&server)
            .update(&CallContext::background(), &mut cr)
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::UpdateRoute(_)));
        assert_eq!(
            err.to_string(),
            "cannot update proxy route: caddy API returned status 500: boom"
        );
        assert_eq!(cr.external_name(), Some("host:a.com"));
    }

    #[test]
    fn test_connect_rejects_invalid_endpoint() {
        let err = Connector::new(reqwest::Client::new())
            .connect(&resource("not a url"))
            .unwrap_err();
        assert!(err.to_string().starts_with("cannot create new Caddy client"));
    }
}
