//! Reconcile runner.
//!
//! # Responsibilities
//! - Track every managed resource, desired or pending deletion
//! - Reconcile due resources with bounded concurrency
//! - Reschedule failures with exponential backoff
//! - Persist identifiers and status after each pass
//!
//! # Design Decisions
//! - Entries are cloned out of the map; no guard is held across an await
//! - One route array is touched by one reconcile at a time
//! - Removed resources stay tracked until their route is deleted
//! - A reload marks every resource due immediately
//! - Shutdown cancels in-flight admin calls and waits for the pass to finish

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::admin::{AdminError, CallContext};
use crate::config::schema::{ControllerConfig, ReconcileConfig, RetryConfig};
use crate::controller::error::ControllerResult;
use crate::controller::external::Connector;
use crate::controller::store::{PersistedState, StateStore, StoreError};
use crate::controller::ExternalClient;
use crate::observability::metrics;
use crate::resilience::backoff::retry_delay;
use crate::resource::types::{Condition, ProxyRoute};
use crate::routing::{route_id, to_remote_route};

/// What one reconcile did to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    Updated,
    Deleted,
}

/// Counts for one pass over the due resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl PassSummary {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, outcome: &ControllerResult<ReconcileAction>) {
        match outcome {
            Ok(ReconcileAction::Created) => self.created += 1,
            Ok(ReconcileAction::Updated) => self.updated += 1,
            Ok(ReconcileAction::Deleted) => self.deleted += 1,
            Err(_) => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone)]
struct ManagedRoute {
    resource: ProxyRoute,
    desired: bool,
    failures: u32,
    next_attempt: Instant,
}

impl ManagedRoute {
    fn new(resource: ProxyRoute, desired: bool, now: Instant) -> Self {
        Self {
            resource,
            desired,
            failures: 0,
            next_attempt: now,
        }
    }
}

/// Drives managed resources toward their desired state.
pub struct Reconciler {
    connector: Connector,
    settings: ReconcileConfig,
    retries: RetryConfig,
    managed: DashMap<String, ManagedRoute>,
    store: Option<StateStore>,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(connector: Connector, settings: ReconcileConfig, retries: RetryConfig) -> Self {
        Self {
            connector,
            settings,
            retries,
            managed: DashMap::new(),
            store: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(connector: Connector, config: &ControllerConfig) -> Self {
        let mut reconciler = Self::new(
            connector,
            config.controller.clone(),
            config.retries.clone(),
        );
        if let Some(path) = &config.controller.state_file {
            reconciler = reconciler.with_store(StateStore::new(path));
        }
        reconciler
    }

    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Token cancelling every in-flight reconcile.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.settings.poll_interval_secs)
    }

    /// Load persisted state, if a store is configured.
    ///
    /// Restored resources are treated as removed until [`set_desired`]
    /// claims them again.
    ///
    /// [`set_desired`]: Reconciler::set_desired
    pub fn restore(&self) -> Result<usize, StoreError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let state = store.load()?;
        let count = state.routes.len();
        self.restore_state(state);
        tracing::info!(path = ?store.path(), resources = count, "Restored persisted state");
        Ok(count)
    }

    pub fn restore_state(&self, state: PersistedState) {
        let now = Instant::now();
        for (name, resource) in state.routes {
            self.managed
                .insert(name, ManagedRoute::new(resource, false, now));
        }
        metrics::record_managed_resources(self.managed.len());
    }

    /// Replace the desired set.
    ///
    /// Known resources keep their external identifier and status; resources
    /// missing from `desired` are scheduled for deletion. Everything is due
    /// immediately.
    pub fn set_desired(&self, desired: Vec<ProxyRoute>) {
        let now = Instant::now();
        let names: HashSet<&str> = desired.iter().map(ProxyRoute::name).collect();

        for mut entry in self.managed.iter_mut() {
            if !names.contains(entry.key().as_str()) {
                entry.desired = false;
                entry.failures = 0;
                entry.next_attempt = now;
            }
        }

        for route in desired {
            match self.managed.entry(route.name().to_string()) {
                Entry::Occupied(mut occupied) => {
                    let managed = occupied.get_mut();
                    managed.resource.spec = route.spec;
                    managed.desired = true;
                    managed.failures = 0;
                    managed.next_attempt = now;
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(ManagedRoute::new(route, true, now));
                }
            }
        }

        metrics::record_managed_resources(self.managed.len());
    }

    /// Current view of a managed resource.
    pub fn resource(&self, name: &str) -> Option<ProxyRoute> {
        self.managed.get(name).map(|m| m.resource.clone())
    }

    pub fn managed_count(&self) -> usize {
        self.managed.len()
    }

    pub fn snapshot(&self) -> PersistedState {
        PersistedState {
            routes: self
                .managed
                .iter()
                .map(|entry| (entry.key().clone(), entry.resource.clone()))
                .collect(),
        }
    }

    /// Write the current snapshot to the store, if one is configured.
    pub fn persist(&self) -> Result<(), StoreError> {
        match &self.store {
            Some(store) => store.save(&self.snapshot()),
            None => Ok(()),
        }
    }

    /// Reconcile every resource whose next attempt is due.
    ///
    /// Resources sharing one route array (same endpoint and server) run one
    /// after another; different arrays run concurrently up to
    /// `max_concurrent_reconciles`.
    pub async fn run_pass(&self) -> PassSummary {
        let now = Instant::now();
        let mut groups: BTreeMap<RouteTarget, Vec<String>> = BTreeMap::new();
        for entry in self.managed.iter().filter(|entry| entry.next_attempt <= now) {
            groups
                .entry(RouteTarget::of(&entry.resource))
                .or_default()
                .push(entry.key().clone());
        }

        let limit = self.settings.max_concurrent_reconciles.max(1);
        let outcomes: Vec<Vec<ControllerResult<ReconcileAction>>> =
            stream::iter(groups.into_values())
                .map(|names| self.reconcile_group(names))
                .buffer_unordered(limit)
                .collect()
                .await;

        let mut summary = PassSummary::default();
        for outcome in outcomes.iter().flatten() {
            summary.record(outcome);
        }
        metrics::record_managed_resources(self.managed.len());
        summary
    }

    /// Run passes until shutdown, applying config reloads between passes.
    pub async fn run(
        &self,
        mut updates: mpsc::UnboundedReceiver<ControllerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(
            poll_interval_secs = self.settings.poll_interval_secs,
            max_concurrent = self.settings.max_concurrent_reconciles,
            "Reconcile loop starting"
        );

        loop {
            let pass = self.run_pass();
            tokio::pin!(pass);

            let summary = tokio::select! {
                summary = &mut pass => summary,
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, cancelling in-flight reconciles");
                    self.cancel.cancel();
                    let summary = pass.await;
                    self.log_pass(&summary);
                    self.persist_logged();
                    break;
                }
            };
            self.log_pass(&summary);
            self.persist_logged();

            tokio::select! {
                _ = tokio::time::sleep_until(self.next_wakeup()) => {}
                Some(config) = updates.recv() => {
                    tracing::info!(routes = config.routes.len(), "Applying reloaded desired routes");
                    self.set_desired(config.desired_routes());
                }
                _ = shutdown.recv() => {
                    tracing::info!("Reconcile loop received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn next_wakeup(&self) -> Instant {
        self.managed
            .iter()
            .map(|entry| entry.next_attempt)
            .min()
            .unwrap_or_else(|| Instant::now() + self.poll_interval())
    }

    fn log_pass(&self, summary: &PassSummary) {
        if summary.is_clean() {
            tracing::debug!(
                created = summary.created,
                updated = summary.updated,
                deleted = summary.deleted,
                "Reconcile pass complete"
            );
        } else {
            tracing::warn!(
                created = summary.created,
                updated = summary.updated,
                deleted = summary.deleted,
                failed = summary.failed,
                "Reconcile pass complete with failures"
            );
        }
    }

    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            tracing::error!(error = %e, "Failed to persist controller state");
        }
    }

    async fn reconcile_group(
        &self,
        mut names: Vec<String>,
    ) -> Vec<ControllerResult<ReconcileAction>> {
        names.sort();
        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            if let Some(outcome) = self.reconcile_named(name).await {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Reconcile one entry and write the result back. `None` when the entry
    /// vanished before it was picked up.
    async fn reconcile_named(&self, name: String) -> Option<ControllerResult<ReconcileAction>> {
        let managed = self.managed.get(&name).map(|entry| entry.value().clone())?;
        let mut resource = managed.resource;

        let span = tracing::info_span!(
            "reconcile",
            reconcile_id = %Uuid::new_v4(),
            resource = %name,
            server = %resource.server_name(),
        );
        let outcome = self
            .reconcile(&mut resource, managed.desired)
            .instrument(span)
            .await;

        match &outcome {
            Ok(action) => {
                resource.set_conditions([Condition::reconcile_success()]);
                tracing::debug!(resource = %name, action = ?action, "Reconciled");
            }
            Err(e) => {
                resource.set_conditions([Condition::reconcile_error(e.to_string())]);
            }
        }

        if matches!(outcome, Ok(ReconcileAction::Deleted))
            && self
                .managed
                .remove_if(&name, |_, current| !current.desired)
                .is_some()
        {
            return Some(outcome);
        }

        if let Some(mut current) = self.managed.get_mut(&name) {
            current.resource.metadata = resource.metadata;
            current.resource.status = resource.status;
            match &outcome {
                Ok(_) => {
                    current.failures = 0;
                    current.next_attempt = Instant::now() + self.poll_interval();
                }
                Err(e) => {
                    current.failures = current.failures.saturating_add(1);
                    let delay = retry_delay(current.failures, &self.retries);
                    current.next_attempt = Instant::now() + delay;
                    tracing::warn!(
                        resource = %name,
                        error = %e,
                        transport = e.admin_error().is_some_and(AdminError::is_transport),
                        failures = current.failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "Reconcile failed, backing off"
                    );
                }
            }
        }

        Some(outcome)
    }

    async fn reconcile(
        &self,
        resource: &mut ProxyRoute,
        desired: bool,
    ) -> ControllerResult<ReconcileAction> {
        let ctx = CallContext::background()
            .with_cancellation(self.cancel.child_token())
            .with_timeout(self.poll_interval());

        let external = self.connector.connect(resource)?;

        if !desired {
            timed("delete", external.delete(&ctx, resource)).await?;
            return Ok(ReconcileAction::Deleted);
        }

        let observation = timed("observe", external.observe(&ctx, resource)).await?;
        if !observation.resource_exists {
            timed("create", external.create(&ctx, resource)).await?;
            return Ok(ReconcileAction::Created);
        }

        // Always false today, so an existing route is re-applied every pass.
        if !observation.resource_up_to_date {
            timed("update", external.update(&ctx, resource)).await?;

            // The re-created route carries the identity of the current match
            // conditions; track that one from now on.
            let applied = route_id(&to_remote_route(&resource.spec));
            if resource.external_name() != Some(applied.as_str()) {
                tracing::info!(
                    old_route_id = resource.external_name().unwrap_or_default(),
                    new_route_id = %applied,
                    "Route identifier changed"
                );
                resource.set_external_name(applied);
            }
        }
        Ok(ReconcileAction::Updated)
    }
}

/// The route array a resource lives in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RouteTarget {
    endpoint: String,
    server: String,
}

impl RouteTarget {
    fn of(resource: &ProxyRoute) -> Self {
        Self {
            endpoint: resource
                .spec
                .caddy_endpoint
                .trim_end_matches('/')
                .to_string(),
            server: resource.server_name().to_string(),
        }
    }
}

async fn timed<T>(
    operation: &'static str,
    fut: impl Future<Output = ControllerResult<T>>,
) -> ControllerResult<T> {
    let started = std::time::Instant::now();
    let result = fut.await;
    metrics::record_operation(operation, result.is_ok(), started);
    result
}
