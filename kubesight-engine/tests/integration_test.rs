//! Integration tests for the engine.
//!
//! These tests drive a running engine through an in-memory control plane and
//! check what gets published.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kubesight_engine::{
    Builder, ControlPlane, ControlPlaneError, Engine, FilterConfig, GenerateError, JoinSpec,
    KindStatus, MemoryControlPlane, Metric, MetricFamily, MetricSender, ObjectIdentity, ObjectList,
    ResourceKind, ResourceObject, SendError, Snapshot, WatchStream,
};
use parking_lot::Mutex;
use serde_json::json;

/// Poll `condition` until it holds or five seconds pass.
async fn eventually<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn pod(namespace: &str, name: &str, phase: &str) -> ResourceObject {
    ResourceObject::new(ResourceKind::Pod, name)
        .in_namespace(namespace)
        .with_status(json!({ "phase": phase }))
}

fn namespace(name: &str, team: &str) -> ResourceObject {
    ResourceObject::new(ResourceKind::Namespace, name)
        .with_label("team", team)
        .with_status(json!({ "phase": "Active" }))
}

/// Namespace generator exposing raw metadata labels.
fn raw_namespace_labels(object: &ResourceObject) -> Result<Vec<MetricFamily>, GenerateError> {
    let metric = Metric::new(1.0)
        .with_label("namespace", object.name())
        .with_labels(object.metadata.labels.clone());
    Ok(vec![MetricFamily::new("namespace_labels").with_metric(metric)])
}

/// Phases set to 1 for a pod in `kube_pod_status_phase`.
fn active_phases(snapshot: &Snapshot, pod: &str) -> Vec<String> {
    snapshot
        .family("kube_pod_status_phase")
        .filter(|s| s.label("pod") == Some(pod) && s.value == 1.0)
        .filter_map(|s| s.label("phase").map(str::to_string))
        .collect()
}

fn mentions_pod(snapshot: &Snapshot, pod: &str) -> bool {
    snapshot.iter().any(|s| s.label("pod") == Some(pod))
}

/// Give spawned watchers time to open their streams.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Start an engine and wait for every kind's first list attempt.
async fn start(control_plane: &Arc<MemoryControlPlane>, configure: fn(Builder) -> Builder) -> Engine {
    let engine = configure(Builder::new(control_plane.clone())).start().unwrap();
    engine.wait_for_initial_lists().await;
    engine
}

#[tokio::test]
async fn test_namespace_labels_join_onto_pods() {
    let cp = Arc::new(MemoryControlPlane::new());
    cp.apply(namespace("default", "platform"));
    cp.apply(pod("default", "web-0", "Running"));
    cp.apply(pod("orphan", "lost-0", "Running"));

    let engine = start(&cp, |b| {
        b.with_kinds([ResourceKind::Namespace, ResourceKind::Pod])
            .with_generator(ResourceKind::Namespace, raw_namespace_labels)
            .with_joins(vec![JoinSpec::new(
                ResourceKind::Namespace,
                ResourceKind::Pod,
                ["namespace"],
                ["team"],
            )])
    })
    .await;

    let snapshot = engine.publish();

    let info = snapshot
        .family("kube_pod_info")
        .find(|s| s.label("pod") == Some("web-0"))
        .unwrap();
    assert!(info.tags().contains(&"team:platform".to_string()));

    // A pod whose namespace is unknown is published unchanged.
    let lost = snapshot
        .family("kube_pod_info")
        .find(|s| s.label("pod") == Some("lost-0"))
        .unwrap();
    assert_eq!(lost.label("team"), None);

    // The join is not written back into the store.
    let stored = engine
        .store(ResourceKind::Pod)
        .unwrap()
        .get(&ObjectIdentity::namespaced("default", "web-0"))
        .unwrap();
    assert!(stored.iter().all(|f| f.metrics.iter().all(|m| m.label("team").is_none())));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_update_replaces_previous_metrics() {
    let cp = Arc::new(MemoryControlPlane::new());
    let engine = start(&cp, |b| b.with_kinds([ResourceKind::Pod])).await;

    cp.apply(pod("default", "a", "Running"));
    eventually("pod a running", || {
        active_phases(&engine.publish(), "a") == vec!["Running"]
    })
    .await;

    cp.apply(pod("default", "a", "Pending"));
    eventually("pod a pending", || {
        active_phases(&engine.publish(), "a") == vec!["Pending"]
    })
    .await;

    engine.shutdown().await;
}

#[tokio::test]
async fn test_delete_removes_metrics() {
    let cp = Arc::new(MemoryControlPlane::new());
    cp.apply(pod("default", "a", "Running"));
    cp.apply(pod("default", "b", "Running"));
    let engine = start(&cp, |b| b.with_kinds([ResourceKind::Pod])).await;
    assert!(mentions_pod(&engine.publish(), "a"));

    cp.delete(ResourceKind::Pod, &ObjectIdentity::namespaced("default", "a"));
    eventually("pod a removed", || !mentions_pod(&engine.publish(), "a")).await;
    assert!(mentions_pod(&engine.publish(), "b"));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_resync_removes_silently_deleted_object() {
    let cp = Arc::new(MemoryControlPlane::new());
    cp.apply(pod("default", "a", "Running"));
    let engine = start(&cp, |b| {
        b.with_kinds([ResourceKind::Pod])
            .with_resync_interval(Duration::from_millis(100))
    })
    .await;
    assert!(mentions_pod(&engine.publish(), "a"));

    cp.delete_silently(ResourceKind::Pod, &ObjectIdentity::namespaced("default", "a"));
    eventually("resync removes pod a", || !mentions_pod(&engine.publish(), "a")).await;

    let status = engine.status();
    assert!(status[0].stats.resyncs >= 1);
    assert_eq!(status[0].stats.objects, 0);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_failed_initial_list_degrades_only_that_kind() {
    let cp = Arc::new(MemoryControlPlane::new());
    cp.apply(ResourceObject::new(ResourceKind::Node, "worker-1"));
    cp.apply(pod("default", "a", "Running"));
    cp.fail_lists(ResourceKind::Node, "forbidden");

    let engine = start(&cp, |b| b.with_kinds([ResourceKind::Node, ResourceKind::Pod])).await;

    let status = engine.status();
    assert_eq!(status[0].kind, ResourceKind::Node);
    assert!(matches!(&status[0].status, KindStatus::Failed(reason) if reason.contains("forbidden")));
    assert!(status[0].stats.list_failures >= 1);
    assert_eq!(status[1].status, KindStatus::Running);

    let snapshot = engine.publish();
    assert!(snapshot.family("kube_node_info").next().is_none());
    assert!(mentions_pod(&snapshot, "a"));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_kind_recovers_after_initial_list_failure() {
    let cp = Arc::new(MemoryControlPlane::new());
    cp.fail_lists(ResourceKind::Node, "transient network error");

    let engine = start(&cp, |b| {
        b.with_kinds([ResourceKind::Node])
            .with_resync_interval(Duration::from_millis(100))
    })
    .await;
    assert!(matches!(engine.status()[0].status, KindStatus::Failed(_)));

    cp.restore(ResourceKind::Node);
    cp.apply(ResourceObject::new(ResourceKind::Node, "worker-1"));

    eventually("node listed after restore", || {
        engine.publish().family("kube_node_info").next().is_some()
    })
    .await;
    assert_eq!(engine.status()[0].status, KindStatus::Running);

    engine.shutdown().await;
}

/// Answers every call like the wrapped control plane, except that lists of
/// `stuck` never complete.
struct StuckLists {
    inner: Arc<MemoryControlPlane>,
    stuck: ResourceKind,
}

#[async_trait]
impl ControlPlane for StuckLists {
    async fn list(&self, kind: ResourceKind) -> Result<ObjectList, ControlPlaneError> {
        if kind == self.stuck {
            std::future::pending::<()>().await;
        }
        self.inner.list(kind).await
    }

    async fn watch(&self, kind: ResourceKind, since: u64) -> Result<WatchStream, ControlPlaneError> {
        self.inner.watch(kind, since).await
    }
}

#[tokio::test]
async fn test_hanging_list_does_not_block_other_kinds() {
    let cp = Arc::new(MemoryControlPlane::new());
    cp.apply(ResourceObject::new(ResourceKind::Node, "worker-1"));
    cp.apply(pod("default", "a", "Running"));
    let stuck = Arc::new(StuckLists {
        inner: cp.clone(),
        stuck: ResourceKind::Node,
    });

    let engine = Builder::new(stuck)
        .with_kinds([ResourceKind::Node, ResourceKind::Pod])
        .start()
        .unwrap();

    eventually("pods published", || mentions_pod(&engine.publish(), "a")).await;
    let status = engine.status();
    assert_eq!(status[0].status, KindStatus::Starting);
    assert_eq!(status[1].status, KindStatus::Running);

    // The pending list observes shutdown.
    tokio::time::timeout(Duration::from_secs(2), engine.shutdown())
        .await
        .expect("shutdown blocked by a pending list");
}

#[tokio::test]
async fn test_recovers_from_expired_watch() {
    let cp = Arc::new(MemoryControlPlane::with_log_capacity(4));
    cp.apply(pod("default", "a", "Running"));
    let engine = start(&cp, |b| b.with_kinds([ResourceKind::Pod])).await;
    settle().await;

    cp.compact(ResourceKind::Pod);
    cp.apply(pod("default", "b", "Running"));

    eventually("pod b after re-list", || mentions_pod(&engine.publish(), "b")).await;
    assert!(mentions_pod(&engine.publish(), "a"));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_recovers_from_broken_watch() {
    let cp = Arc::new(MemoryControlPlane::new());
    let engine = start(&cp, |b| b.with_kinds([ResourceKind::Pod])).await;
    settle().await;

    cp.fail_watches(ResourceKind::Pod, "connection reset");
    cp.apply(pod("default", "b", "Running"));
    cp.restore(ResourceKind::Pod);

    eventually("pod b after restart", || mentions_pod(&engine.publish(), "b")).await;
    assert!(engine.status()[0].stats.watch_restarts >= 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_namespace_scope() {
    let cp = Arc::new(MemoryControlPlane::new());
    cp.apply(pod("prod", "api-0", "Running"));
    cp.apply(pod("dev", "api-0-dev", "Running"));
    cp.apply(ResourceObject::new(ResourceKind::Node, "worker-1"));

    let engine = start(&cp, |b| {
        b.with_kinds([ResourceKind::Node, ResourceKind::Pod])
            .with_namespaces(["prod"])
    })
    .await;

    cp.apply(pod("dev", "late-0", "Running"));
    cp.apply(pod("prod", "late-1", "Running"));
    eventually("late prod pod", || mentions_pod(&engine.publish(), "late-1")).await;

    let snapshot = engine.publish();
    assert!(mentions_pod(&snapshot, "api-0"));
    assert!(!mentions_pod(&snapshot, "api-0-dev"));
    assert!(!mentions_pod(&snapshot, "late-0"));
    assert!(snapshot.family("kube_node_info").next().is_some());

    engine.shutdown().await;
}

#[tokio::test]
async fn test_filter_drops_families_before_storage() {
    let cp = Arc::new(MemoryControlPlane::new());
    cp.apply(pod("default", "a", "Running"));

    let engine = start(&cp, |b| {
        b.with_kinds([ResourceKind::Pod])
            .with_filter(FilterConfig::allow(["kube_pod_status_*"]))
    })
    .await;

    let snapshot = engine.publish();
    assert!(!snapshot.is_empty());
    assert!(snapshot.iter().all(|s| s.name.starts_with("kube_pod_status_")));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_malformed_object_is_skipped_and_counted() {
    let cp = Arc::new(MemoryControlPlane::new());
    cp.apply(pod("default", "good", "Running"));
    cp.apply(
        ResourceObject::new(ResourceKind::Pod, "bad")
            .in_namespace("default")
            .with_status(json!({ "containerStatuses": [{ "name": "app", "restartCount": "x" }] })),
    );

    let engine = start(&cp, |b| b.with_kinds([ResourceKind::Pod])).await;

    let snapshot = engine.publish();
    assert!(mentions_pod(&snapshot, "good"));
    assert!(!mentions_pod(&snapshot, "bad"));
    assert_eq!(engine.status()[0].stats.generation_errors, 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_publish_is_stable() {
    let cp = Arc::new(MemoryControlPlane::new());
    for name in ["c", "a", "b"] {
        cp.apply(pod("default", name, "Running"));
    }
    let engine = start(&cp, |b| b.with_kinds([ResourceKind::Pod])).await;

    let first = engine.publish();
    assert_eq!(first, engine.publish());

    let order: Vec<&str> = first
        .family("kube_pod_info")
        .filter_map(|s| s.label("pod"))
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);

    engine.shutdown().await;
}

#[derive(Default)]
struct FlakySender {
    sent: Mutex<Vec<String>>,
    commits: Mutex<usize>,
}

#[async_trait]
impl MetricSender for FlakySender {
    async fn gauge(&self, name: &str, _value: f64, tags: &[String]) -> Result<(), SendError> {
        if name == "kube_pod_info" {
            return Err(SendError::Rejected("backend full".to_string()));
        }
        self.sent.lock().push(format!("{} {}", name, tags.join(",")));
        Ok(())
    }

    async fn commit(&self) -> Result<(), SendError> {
        *self.commits.lock() += 1;
        Ok(())
    }
}

#[tokio::test]
async fn test_emit_survives_sender_failures() {
    let cp = Arc::new(MemoryControlPlane::new());
    cp.apply(pod("default", "a", "Running"));
    let engine = start(&cp, |b| b.with_kinds([ResourceKind::Pod])).await;

    let sender = FlakySender::default();
    let report = engine.emit(&sender, &["cluster:test".to_string()]).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.emitted, engine.publish().len() - 1);
    assert!(report.committed);
    assert_eq!(*sender.commits.lock(), 1);
    assert!(sender.sent.lock().iter().all(|line| line.ends_with("cluster:test")));

    engine.shutdown().await;
}
