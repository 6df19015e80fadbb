//! List-and-watch loop feeding one kind's store.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tokio_stream::StreamExt;
use tracing::{debug, info, trace, warn};

use crate::controlplane::{ControlPlane, WatchEvent, WatchEventType};
use crate::error::EngineError;
use crate::kind::ResourceKind;
use crate::object::{ObjectList, ResourceObject};
use crate::stats::{KindStatus, SyncStats};
use crate::store::ResourceStore;

const BACKOFF_INITIAL_MS: u64 = 200;
const BACKOFF_MAX_MS: u64 = 10_000;

/// Exponential retry delay.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    current: Duration,
}

impl Backoff {
    pub(crate) fn new() -> Self {
        Self {
            current: Duration::from_millis(BACKOFF_INITIAL_MS),
        }
    }

    /// Delay to wait now; doubles the following one up to the cap.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(Duration::from_millis(BACKOFF_MAX_MS));
        delay
    }

    pub(crate) fn reset(&mut self) {
        self.current = Duration::from_millis(BACKOFF_INITIAL_MS);
    }
}

/// Namespaces whose objects are kept. Empty means every namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceScope {
    namespaces: BTreeSet<String>,
}

impl NamespaceScope {
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespaces: namespaces.into_iter().map(Into::into).collect(),
        }
    }

    /// Cluster-scoped objects are always in scope.
    pub fn contains(&self, object: &ResourceObject) -> bool {
        !object.kind.is_namespaced()
            || self.namespaces.is_empty()
            || self.namespaces.contains(object.namespace())
    }
}

enum ListOutcome {
    Synced(u64),
    Failed,
    Cancelled,
}

/// Keeps one [`ResourceStore`] in sync with the control plane.
pub struct ResourceWatcher {
    kind: ResourceKind,
    control_plane: Arc<dyn ControlPlane>,
    store: Arc<ResourceStore>,
    stats: Arc<SyncStats>,
    scope: Arc<NamespaceScope>,
    resync_interval: Duration,
}

impl ResourceWatcher {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        store: Arc<ResourceStore>,
        stats: Arc<SyncStats>,
        scope: Arc<NamespaceScope>,
        resync_interval: Duration,
    ) -> Self {
        Self {
            kind: store.kind(),
            control_plane,
            store,
            stats,
            scope,
            resync_interval,
        }
    }

    /// List until it succeeds, then watch until shutdown, resyncing
    /// periodically.
    ///
    /// `status` moves from [`KindStatus::Starting`] to `Running` after the
    /// first successful list, or to `Failed` while that list keeps failing.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>, status: watch::Sender<KindStatus>) {
        let mut backoff = Backoff::new();
        let Some(mut version) = self
            .initial_list(&mut shutdown, &status, &mut backoff)
            .await
        else {
            debug!(kind = %self.kind, "Watcher stopped before the first list");
            return;
        };

        let mut resync = interval_at(
            Instant::now() + self.resync_interval,
            self.resync_interval,
        );
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        'watch: loop {
            if *shutdown.borrow() {
                break;
            }

            let opened = tokio::select! {
                _ = shutdown.changed() => break,
                opened = self.control_plane.watch(self.kind, version) => opened,
            };

            let mut stream = match opened {
                Ok(stream) => stream,
                Err(e) if e.is_expired() => {
                    info!(kind = %self.kind, resource_version = version, "Watch expired, re-listing");
                    match self.resync(&mut shutdown).await {
                        ListOutcome::Synced(listed) => version = listed,
                        ListOutcome::Failed => {
                            if !self.pause(&mut backoff, &mut shutdown).await {
                                break;
                            }
                        }
                        ListOutcome::Cancelled => break,
                    }
                    continue;
                }
                Err(e) => {
                    warn!(kind = %self.kind, error = %e, "Failed to open watch");
                    self.stats.record_watch_restart();
                    if !self.pause(&mut backoff, &mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };
            debug!(kind = %self.kind, resource_version = version, "Watch opened");

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break 'watch,

                    _ = resync.tick() => match self.resync(&mut shutdown).await {
                        ListOutcome::Synced(listed) => version = version.max(listed),
                        ListOutcome::Failed => {}
                        ListOutcome::Cancelled => break 'watch,
                    },

                    item = stream.next() => match item {
                        Some(Ok(event)) => {
                            // Already covered by a newer listing.
                            if event.resource_version <= version {
                                continue;
                            }
                            version = event.resource_version;
                            self.apply_event(event);
                            backoff.reset();
                        }
                        Some(Err(e)) if e.is_expired() => {
                            info!(kind = %self.kind, resource_version = version, "Watch expired, re-listing");
                            match self.resync(&mut shutdown).await {
                                ListOutcome::Synced(listed) => version = listed,
                                ListOutcome::Failed => {
                                    if !self.pause(&mut backoff, &mut shutdown).await {
                                        break 'watch;
                                    }
                                }
                                ListOutcome::Cancelled => break 'watch,
                            }
                            continue 'watch;
                        }
                        Some(Err(e)) => {
                            warn!(kind = %self.kind, error = %e, "Watch failed, restarting");
                            self.stats.record_watch_restart();
                            if !self.pause(&mut backoff, &mut shutdown).await {
                                break 'watch;
                            }
                            continue 'watch;
                        }
                        None => {
                            debug!(kind = %self.kind, "Watch stream ended, restarting");
                            self.stats.record_watch_restart();
                            if !self.pause(&mut backoff, &mut shutdown).await {
                                break 'watch;
                            }
                            continue 'watch;
                        }
                    },
                }
            }
        }

        debug!(kind = %self.kind, "Watcher stopped");
    }

    /// Retry the first list with backoff. Returns `None` on shutdown.
    async fn initial_list(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        status: &watch::Sender<KindStatus>,
        backoff: &mut Backoff,
    ) -> Option<u64> {
        loop {
            if *shutdown.borrow() {
                return None;
            }
            let listed = tokio::select! {
                _ = shutdown.changed() => return None,
                listed = self.control_plane.list(self.kind) => listed,
            };

            match listed {
                Ok(listing) => {
                    self.apply_listing(&listing);
                    info!(
                        kind = %self.kind,
                        objects = self.store.len(),
                        resource_version = listing.resource_version,
                        "Initial list complete"
                    );
                    status.send_replace(KindStatus::Running);
                    backoff.reset();
                    return Some(listing.resource_version);
                }
                Err(source) => {
                    self.stats.record_list_failure();
                    let e = EngineError::StartFailed {
                        kind: self.kind,
                        source,
                    };
                    warn!(kind = %self.kind, error = %e, "Initial list failed, retrying");
                    status.send_replace(KindStatus::Failed(e.to_string()));
                    if !self.pause(backoff, shutdown).await {
                        return None;
                    }
                }
            }
        }
    }

    fn apply_event(&self, event: WatchEvent) {
        self.stats.record_event();

        if event.object.kind != self.kind {
            warn!(kind = %self.kind, object_kind = %event.object.kind, "Ignoring event of another kind");
            return;
        }
        if !self.scope.contains(&event.object) {
            trace!(kind = %self.kind, namespace = event.object.namespace(), "Event outside namespace scope");
            return;
        }

        let identity = event.object.identity();
        match event.event_type {
            WatchEventType::Added | WatchEventType::Modified => {
                match self.store.upsert(identity.clone(), &event.object) {
                    Ok(families) => {
                        trace!(kind = %self.kind, object = %identity, families, "Object stored");
                    }
                    Err(e) => {
                        warn!(kind = %self.kind, object = %identity, error = %e, "Metric generation failed");
                        self.stats.record_generation_errors(1);
                    }
                }
            }
            WatchEventType::Deleted => {
                if self.store.delete(&identity) {
                    trace!(kind = %self.kind, object = %identity, "Object removed");
                }
            }
        }
    }

    fn apply_listing(&self, listing: &ObjectList) {
        let in_scope = listing
            .items
            .iter()
            .filter(|object| object.kind == self.kind && self.scope.contains(object));
        let report = self.store.reconcile(in_scope);

        for (identity, e) in &report.failed {
            warn!(kind = %self.kind, object = %identity, error = %e, "Metric generation failed");
        }
        self.stats.record_generation_errors(report.failed.len());
    }

    /// Re-list and reconcile. A shutdown during the list discards its result.
    async fn resync(&self, shutdown: &mut watch::Receiver<bool>) -> ListOutcome {
        let listed = tokio::select! {
            _ = shutdown.changed() => return ListOutcome::Cancelled,
            listed = self.control_plane.list(self.kind) => listed,
        };

        match listed {
            Ok(listing) => {
                self.stats.record_resync();
                self.apply_listing(&listing);
                debug!(
                    kind = %self.kind,
                    objects = self.store.len(),
                    resource_version = listing.resource_version,
                    "Resync complete"
                );
                ListOutcome::Synced(listing.resource_version)
            }
            Err(e) => {
                warn!(kind = %self.kind, error = %e, "Resync list failed");
                self.stats.record_list_failure();
                ListOutcome::Failed
            }
        }
    }

    /// Sleep for the next backoff delay. Returns `false` on shutdown.
    async fn pause(&self, backoff: &mut Backoff, shutdown: &mut watch::Receiver<bool>) -> bool {
        let delay = backoff.next_delay();
        trace!(kind = %self.kind, delay_ms = delay.as_millis() as u64, "Backing off");
        tokio::select! {
            _ = shutdown.changed() => false,
            _ = sleep(delay) => true,
        }
    }
}
