//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;

use proxy_route_controller::resource::types::{
    ProxyRoute, ProxyRouteParameters, RouteMatch, UpstreamSpec,
};

#[derive(Default)]
struct FakeState {
    servers: HashMap<String, Vec<Value>>,
    upstreams: Vec<Value>,
    requests: Vec<String>,
}

type Shared = Arc<Mutex<FakeState>>;

/// In-memory stand-in for the Caddy admin API.
///
/// Serves the route array of each configured server plus the upstream
/// snapshot, and records every request as `"METHOD path"`.
#[derive(Clone)]
pub struct FakeCaddy {
    pub url: String,
    state: Shared,
}

impl FakeCaddy {
    /// Routes currently stored for `server`.
    pub fn routes(&self, server: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .servers
            .get(server)
            .cloned()
            .unwrap_or_default()
    }

    pub fn add_server(&self, server: &str) {
        self.state
            .lock()
            .unwrap()
            .servers
            .entry(server.to_string())
            .or_default();
    }

    pub fn push_route(&self, server: &str, route: Value) {
        self.state
            .lock()
            .unwrap()
            .servers
            .entry(server.to_string())
            .or_default()
            .push(route);
    }

    pub fn set_upstreams(&self, upstreams: Vec<Value>) {
        self.state.lock().unwrap().upstreams = upstreams;
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }
}

/// Start a fake admin API with an empty `srv0`.
pub async fn start_fake_caddy() -> FakeCaddy {
    let state: Shared = Arc::default();
    state
        .lock()
        .unwrap()
        .servers
        .insert("srv0".to_string(), Vec::new());

    let app = Router::new()
        .route(
            "/config/apps/http/servers/{server}/routes",
            get(list_routes).post(append_route),
        )
        .route(
            "/config/apps/http/servers/{server}/routes/{index}",
            delete(delete_route),
        )
        .route("/reverse_proxy/upstreams", get(upstreams))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeCaddy {
        url: format!("http://{addr}"),
        state,
    }
}

fn routes_path(server: &str) -> String {
    format!("/config/apps/http/servers/{server}/routes")
}

async fn list_routes(State(state): State<Shared>, Path(server): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push(format!("GET {}", routes_path(&server)));
    match state.servers.get(&server) {
        Some(routes) => Json(routes.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn append_route(
    State(state): State<Shared>,
    Path(server): Path<String>,
    Json(route): Json<Value>,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    state.requests.push(format!("POST {}", routes_path(&server)));
    match state.servers.get_mut(&server) {
        Some(routes) => {
            routes.push(route);
            StatusCode::OK
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn delete_route(
    State(state): State<Shared>,
    Path((server, index)): Path<(String, usize)>,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    state
        .requests
        .push(format!("DELETE {}/{index}", routes_path(&server)));
    match state.servers.get_mut(&server) {
        Some(routes) if index < routes.len() => {
            routes.remove(index);
            StatusCode::OK
        }
        _ => StatusCode::NOT_FOUND,
    }
}

async fn upstreams(State(state): State<Shared>) -> Json<Vec<Value>> {
    let mut state = state.lock().unwrap();
    state.requests.push("GET /reverse_proxy/upstreams".to_string());
    Json(state.upstreams.clone())
}

/// Start a backend whose every response, whatever the method or path,
/// comes from `f`. Returns the base URL.
pub async fn start_programmable_backend<F, Fut>(f: F) -> String
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let f = Arc::new(f);
    let app = Router::new().fallback(move || {
        let f = f.clone();
        async move {
            let (status, body) = f().await;
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
            (status, body)
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

/// Address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// HTTP client that never goes through an environment proxy.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// A resource routing `host` to one upstream through `endpoint`.
pub fn host_route(name: &str, endpoint: &str, host: &str) -> ProxyRoute {
    ProxyRoute::new(
        name,
        ProxyRouteParameters {
            caddy_endpoint: endpoint.to_string(),
            match_conditions: Some(RouteMatch {
                host: vec![host.to_string()],
                ..Default::default()
            }),
            upstreams: vec![UpstreamSpec {
                dial: "backend:8080".to_string(),
                max_requests: None,
            }],
            ..Default::default()
        },
    )
}
