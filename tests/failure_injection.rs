//! Failure injection tests for the admin API client and reconcile loop.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use proxy_route_controller::admin::{AdminClient, AdminError, CallContext};
use proxy_route_controller::config::{ReconcileConfig, RetryConfig};
use proxy_route_controller::controller::{Connector, ControllerError, Reconciler};
use proxy_route_controller::resource::types::ConditionKind;

mod common;

fn new_reconciler(base_delay_ms: u64) -> Reconciler {
    Reconciler::new(
        Connector::new(common::http_client()),
        ReconcileConfig {
            poll_interval_secs: 60,
            max_concurrent_reconciles: 4,
            state_file: None,
        },
        RetryConfig {
            base_delay_ms,
            max_delay_ms: base_delay_ms * 4,
        },
    )
}

#[tokio::test]
async fn test_backend_error_carries_status_and_body() {
    let url = common::start_programmable_backend(|| async {
        (500, "loading config: boom".to_string())
    })
    .await;
    let client = AdminClient::new(&url, common::http_client());

    let err = client
        .list_routes(&CallContext::background(), "srv0")
        .await
        .unwrap_err();
    match err {
        AdminError::Backend { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "loading config: boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_undecodable_reply_is_encoding_error() {
    let url = common::start_programmable_backend(|| async { (200, "<html>".to_string()) }).await;
    let client = AdminClient::new(&url, common::http_client());

    let err = client
        .list_routes(&CallContext::background(), "srv0")
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::Encoding(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let addr = common::closed_port().await;
    let client = AdminClient::new(&format!("http://{addr}"), common::http_client());

    let err = client
        .list_routes(&CallContext::background(), "srv0")
        .await
        .unwrap_err();
    assert!(err.is_transport(), "got {err:?}");
}

#[tokio::test]
async fn test_deadline_bounds_slow_backend() {
    let url = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        (200, "[]".to_string())
    })
    .await;
    let client = AdminClient::new(&url, common::http_client());

    let ctx = CallContext::background().with_timeout(Duration::from_millis(100));
    let err = client.list_routes(&ctx, "srv0").await.unwrap_err();
    assert!(matches!(err, AdminError::Timeout));
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_call() {
    let url = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        (200, "[]".to_string())
    })
    .await;
    let client = AdminClient::new(&url, common::http_client());

    let token = CancellationToken::new();
    let ctx = CallContext::background().with_cancellation(token.clone());
    let canceller = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    };

    let (result, _) = tokio::join!(client.list_routes(&ctx, "srv0"), canceller);
    assert!(matches!(result.unwrap_err(), AdminError::Cancelled));
}

#[tokio::test]
async fn test_failed_create_is_retried_after_backoff() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let url = common::start_programmable_backend(move || {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                (503, "Service Unavailable".to_string())
            } else {
                (200, String::new())
            }
        }
    })
    .await;

    let reconciler = new_reconciler(20);
    reconciler.set_desired(vec![common::host_route("web", &url, "a.com")]);

    let first = reconciler.run_pass().await;
    assert_eq!(first.failed, 1);
    let synced = reconciler
        .resource("web")
        .unwrap()
        .status
        .condition(ConditionKind::Synced)
        .cloned()
        .unwrap();
    assert!(synced.message.contains("503"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = reconciler.run_pass().await;
    assert_eq!(second.created, 1);
    assert_eq!(
        reconciler.resource("web").unwrap().external_name(),
        Some("host:a.com")
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_one_failing_endpoint_does_not_block_others() {
    let healthy = common::start_fake_caddy().await;
    let broken = common::start_programmable_backend(|| async {
        (500, "broken".to_string())
    })
    .await;

    let reconciler = new_reconciler(1_000);
    reconciler.set_desired(vec![
        common::host_route("good", &healthy.url, "a.com"),
        common::host_route("bad", &broken, "b.com"),
    ]);

    let summary = reconciler.run_pass().await;
    assert_eq!(summary.created, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(healthy.routes("srv0").len(), 1);
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_reconcile() {
    let url = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        (200, String::new())
    })
    .await;

    let reconciler = new_reconciler(1_000);
    reconciler.set_desired(vec![common::host_route("web", &url, "a.com")]);

    let (_updates_tx, updates_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let run = reconciler.run(updates_rx, shutdown_rx);
    let trigger = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = shutdown_tx.send(());
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(run, trigger);
    })
    .await
    .expect("shutdown did not interrupt the pass");

    let synced = reconciler
        .resource("web")
        .unwrap()
        .status
        .condition(ConditionKind::Synced)
        .cloned()
        .unwrap();
    let expected = ControllerError::CreateRoute(AdminError::Cancelled).to_string();
    assert_eq!(synced.message, expected);
}
