//! Engine construction and the running engine handle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kubesight_common::Sample;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::controlplane::ControlPlane;
use crate::error::{EngineError, Result};
use crate::filter::{AllowDenyFilter, FilterConfig};
use crate::generator::{GeneratorFn, GeneratorRegistry};
use crate::join::{JoinSpec, LabelJoiner};
use crate::kind::ResourceKind;
use crate::publisher::{self, EmitReport, MetricSender, Snapshot};
use crate::stats::{KindReport, KindStatus, SyncStats};
use crate::store::{ResourceStore, StoreSnapshot};
use crate::watcher::{NamespaceScope, ResourceWatcher};

/// Default interval between full re-lists.
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Collects the engine configuration.
///
/// # Example
///
/// ```ignore
/// let engine = Builder::new(control_plane)
///     .with_kinds([ResourceKind::Namespace, ResourceKind::Pod])
///     .with_filter(FilterConfig::deny(["kube_pod_container_*"]))
///     .with_joins(vec![JoinSpec::new(
///         ResourceKind::Namespace,
///         ResourceKind::Pod,
///         ["namespace"],
///         ["label_team"],
///     )])
///     .start()?;
///
/// engine.wait_for_initial_lists().await;
/// let snapshot = engine.publish();
/// ```
pub struct Builder {
    control_plane: Arc<dyn ControlPlane>,
    kinds: Vec<ResourceKind>,
    filter: FilterConfig,
    joins: Vec<JoinSpec>,
    resync_interval: Duration,
    namespaces: Vec<String>,
    registry: GeneratorRegistry,
}

impl Builder {
    /// Start a configuration with every built-in kind enabled.
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            control_plane,
            kinds: ResourceKind::ALL.to_vec(),
            filter: FilterConfig::default(),
            joins: Vec::new(),
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            namespaces: Vec::new(),
            registry: GeneratorRegistry::builtin(),
        }
    }

    /// Kinds to serve, in publish order.
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = ResourceKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_joins(mut self, joins: Vec<JoinSpec>) -> Self {
        self.joins = joins;
        self
    }

    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    /// Restrict namespaced kinds to these namespaces. Empty means all.
    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    /// Register or replace the generator of a kind.
    pub fn with_generator(mut self, kind: ResourceKind, generator: GeneratorFn) -> Self {
        self.registry.register(kind, generator);
        self
    }

    /// Validate the configuration.
    ///
    /// Every configuration error surfaces here, before anything talks to the
    /// control plane.
    pub fn build(self) -> Result<EngineSetup> {
        if self.kinds.is_empty() {
            return Err(EngineError::Config("no resource kinds enabled".to_string()));
        }
        if self.resync_interval.is_zero() {
            return Err(EngineError::Config(
                "resync interval must be greater than zero".to_string(),
            ));
        }

        let mut kinds = Vec::with_capacity(self.kinds.len());
        for kind in &self.kinds {
            if kinds.iter().any(|(k, _)| k == kind) {
                return Err(EngineError::Config(format!(
                    "resource kind '{}' enabled more than once",
                    kind
                )));
            }
            let generator = self
                .registry
                .get(*kind)
                .ok_or_else(|| EngineError::UnknownKind(kind.to_string()))?;
            kinds.push((*kind, generator));
        }

        let filter = Arc::new(AllowDenyFilter::new(&self.filter)?);

        for join in &self.joins {
            join.validate(&self.kinds)?;
        }

        Ok(EngineSetup {
            control_plane: self.control_plane,
            kinds,
            filter,
            joiner: LabelJoiner::new(self.joins),
            resync_interval: self.resync_interval,
            scope: Arc::new(NamespaceScope::new(self.namespaces)),
        })
    }

    /// Validate and start in one step. Must be called within a tokio runtime.
    pub fn start(self) -> Result<Engine> {
        Ok(self.build()?.start())
    }
}

/// A validated configuration, ready to start.
pub struct EngineSetup {
    control_plane: Arc<dyn ControlPlane>,
    kinds: Vec<(ResourceKind, GeneratorFn)>,
    filter: Arc<AllowDenyFilter>,
    joiner: LabelJoiner,
    resync_interval: Duration,
    scope: Arc<NamespaceScope>,
}

impl EngineSetup {
    /// Spawn one watcher per kind and return immediately.
    ///
    /// Each watcher performs its own first list, retried with backoff until it
    /// succeeds, so a kind that is slow or failing never holds back the
    /// others. Use [`Engine::wait_for_initial_lists`] to wait for the first
    /// attempts.
    pub fn start(self) -> Engine {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut kinds = Vec::with_capacity(self.kinds.len());
        let mut tasks = Vec::with_capacity(self.kinds.len());

        for (kind, generator) in self.kinds {
            let store = Arc::new(ResourceStore::new(kind, generator, Arc::clone(&self.filter)));
            let stats = Arc::new(SyncStats::default());
            let watcher = ResourceWatcher::new(
                Arc::clone(&self.control_plane),
                Arc::clone(&store),
                Arc::clone(&stats),
                Arc::clone(&self.scope),
                self.resync_interval,
            );

            let (status_tx, status_rx) = watch::channel(KindStatus::Starting);
            tasks.push(tokio::spawn(watcher.run(shutdown_rx.clone(), status_tx)));
            kinds.push(KindHandle {
                kind,
                store,
                stats,
                status: status_rx,
            });
        }

        info!(
            kinds = kinds.len(),
            joins = self.joiner.specs().len(),
            "Engine started"
        );

        Engine {
            kinds,
            joiner: self.joiner,
            shutdown: shutdown_tx,
            tasks,
        }
    }
}

struct KindHandle {
    kind: ResourceKind,
    store: Arc<ResourceStore>,
    stats: Arc<SyncStats>,
    status: watch::Receiver<KindStatus>,
}

/// A running engine. Dropping it stops the watchers.
pub struct Engine {
    kinds: Vec<KindHandle>,
    joiner: LabelJoiner,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Snapshot every store, apply the joins and flatten.
    ///
    /// Samples come out in kind order, then object identity order, then
    /// generation order.
    pub fn publish(&self) -> Snapshot {
        let snapshots: HashMap<ResourceKind, StoreSnapshot> = self
            .kinds
            .iter()
            .map(|handle| (handle.kind, handle.store.snapshot()))
            .collect();
        let joins = self.joiner.prepare(&snapshots);

        let mut samples = Vec::new();
        for handle in &self.kinds {
            let Some(snapshot) = snapshots.get(&handle.kind) else {
                continue;
            };
            let enrich = joins.targets(handle.kind);
            for families in snapshot.values() {
                for family in families.iter() {
                    for metric in &family.metrics {
                        let labels = if enrich {
                            joins.enrich(handle.kind, &metric.labels)
                        } else {
                            metric.labels.clone()
                        };
                        samples.push(Sample {
                            name: family.name.clone(),
                            labels,
                            value: metric.value,
                        });
                    }
                }
            }
        }

        debug!(samples = samples.len(), "Snapshot published");
        Snapshot { samples }
    }

    /// Publish and send every sample, then commit.
    pub async fn emit(&self, sender: &dyn MetricSender, extra_tags: &[String]) -> EmitReport {
        let snapshot = self.publish();
        publisher::emit(&snapshot, sender, extra_tags).await
    }

    /// Status and counters of every kind, in configuration order.
    pub fn status(&self) -> Vec<KindReport> {
        self.kinds
            .iter()
            .map(|handle| KindReport {
                kind: handle.kind,
                status: handle.status.borrow().clone(),
                stats: handle.stats.snapshot(handle.store.len()),
            })
            .collect()
    }

    /// Wait until every kind has finished its first list attempt, whether it
    /// succeeded or failed. A list that never answers keeps this pending, so
    /// callers bound it with a timeout.
    pub async fn wait_for_initial_lists(&self) {
        for handle in &self.kinds {
            let mut status = handle.status.clone();
            // An error means the watcher exited, which only happens on shutdown.
            let _ = status.wait_for(|s| !s.is_starting()).await;
        }
    }

    /// Enabled kinds, in configuration order.
    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.kinds.iter().map(|handle| handle.kind).collect()
    }

    pub fn store(&self, kind: ResourceKind) -> Option<Arc<ResourceStore>> {
        self.kinds
            .iter()
            .find(|handle| handle.kind == kind)
            .map(|handle| Arc::clone(&handle.store))
    }

    /// Stop every watcher and wait for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "Watcher task failed");
            }
        }
        info!("Engine stopped");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}
