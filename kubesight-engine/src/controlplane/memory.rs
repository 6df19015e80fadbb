//! In-process control plane.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use super::{ControlPlane, WatchEvent, WatchEventType, WatchStream};
use crate::error::ControlPlaneError;
use crate::kind::ResourceKind;
use crate::object::{ObjectIdentity, ObjectList, ResourceObject};

const DEFAULT_LOG_CAPACITY: usize = 1024;
const BROADCAST_CAPACITY: usize = 256;

type StreamItem = Result<WatchEvent, ControlPlaneError>;

/// A control plane kept entirely in memory.
///
/// Every mutation bumps a global resource version and is appended to a bounded
/// per-kind event log. Watches resume from the log; asking for a version older
/// than the log retains fails with [`ControlPlaneError::Expired`], like a
/// compacted API server.
pub struct MemoryControlPlane {
    inner: Mutex<Inner>,
}

struct Inner {
    version: u64,
    log_capacity: usize,
    kinds: HashMap<ResourceKind, KindState>,
}

struct KindState {
    objects: BTreeMap<ObjectIdentity, ResourceObject>,
    log: VecDeque<WatchEvent>,
    /// Oldest version a watch may resume from.
    compacted_through: u64,
    sender: broadcast::Sender<StreamItem>,
    list_failure: Option<String>,
    watch_failure: Option<String>,
}

impl KindState {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            objects: BTreeMap::new(),
            log: VecDeque::new(),
            compacted_through: 0,
            sender,
            list_failure: None,
            watch_failure: None,
        }
    }
}

impl Inner {
    fn state(&mut self, kind: ResourceKind) -> &mut KindState {
        self.kinds.entry(kind).or_insert_with(KindState::new)
    }

    fn record(&mut self, event_type: WatchEventType, mut object: ResourceObject) -> u64 {
        self.version += 1;
        let version = self.version;
        let capacity = self.log_capacity;
        object.metadata.resource_version = Some(version.to_string());

        let state = self.state(object.kind);
        let identity = object.identity();
        match event_type {
            WatchEventType::Deleted => {
                state.objects.remove(&identity);
            }
            _ => {
                state.objects.insert(identity, object.clone());
            }
        }

        let event = WatchEvent {
            event_type,
            object,
            resource_version: version,
        };
        state.log.push_back(event.clone());
        while state.log.len() > capacity {
            if let Some(dropped) = state.log.pop_front() {
                state.compacted_through = dropped.resource_version;
            }
        }
        // No receivers is fine.
        let _ = state.sender.send(Ok(event));
        version
    }
}

impl MemoryControlPlane {
    /// Create an empty control plane.
    pub fn new() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// Create an empty control plane retaining at most `capacity` events per kind.
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                version: 0,
                log_capacity: capacity.max(1),
                kinds: HashMap::new(),
            }),
        }
    }

    /// Create or update an object. Returns the new resource version.
    pub fn apply(&self, object: ResourceObject) -> u64 {
        let mut inner = self.inner.lock();
        let identity = object.identity();
        let exists = inner.state(object.kind).objects.contains_key(&identity);
        let event_type = if exists {
            WatchEventType::Modified
        } else {
            WatchEventType::Added
        };
        inner.record(event_type, object)
    }

    /// Delete an object and notify watchers. Returns false if it did not exist.
    pub fn delete(&self, kind: ResourceKind, identity: &ObjectIdentity) -> bool {
        let mut inner = self.inner.lock();
        let Some(object) = inner.state(kind).objects.get(identity).cloned() else {
            return false;
        };
        inner.record(WatchEventType::Deleted, object);
        true
    }

    /// Delete an object without emitting an event, as if the notification
    /// was lost. Only a re-list reveals the removal.
    pub fn delete_silently(&self, kind: ResourceKind, identity: &ObjectIdentity) -> bool {
        let mut inner = self.inner.lock();
        inner.version += 1;
        inner.state(kind).objects.remove(identity).is_some()
    }

    /// Make `list` fail for a kind until [`restore`](Self::restore) is called.
    pub fn fail_lists(&self, kind: ResourceKind, reason: impl Into<String>) {
        self.inner.lock().state(kind).list_failure = Some(reason.into());
    }

    /// Make `watch` fail for a kind and break its open streams.
    pub fn fail_watches(&self, kind: ResourceKind, reason: impl Into<String>) {
        let reason = reason.into();
        let mut inner = self.inner.lock();
        let state = inner.state(kind);
        state.watch_failure = Some(reason.clone());
        let _ = state.sender.send(Err(ControlPlaneError::Unavailable(reason)));
    }

    /// Clear injected failures for a kind.
    pub fn restore(&self, kind: ResourceKind) {
        let mut inner = self.inner.lock();
        let state = inner.state(kind);
        state.list_failure = None;
        state.watch_failure = None;
    }

    /// Drop the event log of a kind. Open streams receive
    /// [`ControlPlaneError::Expired`] and must re-list.
    pub fn compact(&self, kind: ResourceKind) {
        let mut inner = self.inner.lock();
        let version = inner.version;
        let state = inner.state(kind);
        state.log.clear();
        state.compacted_through = version;
        let _ = state.sender.send(Err(ControlPlaneError::Expired(version)));
    }

    /// Current global resource version.
    pub fn resource_version(&self) -> u64 {
        self.inner.lock().version
    }

    /// Current objects of a kind, in identity order.
    pub fn objects(&self, kind: ResourceKind) -> Vec<ResourceObject> {
        self.inner
            .lock()
            .kinds
            .get(&kind)
            .map(|s| s.objects.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of objects of a kind.
    pub fn object_count(&self, kind: ResourceKind) -> usize {
        self.inner
            .lock()
            .kinds
            .get(&kind)
            .map(|s| s.objects.len())
            .unwrap_or(0)
    }
}

impl Default for MemoryControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ControlPlane for MemoryControlPlane {
    async fn list(&self, kind: ResourceKind) -> Result<ObjectList, ControlPlaneError> {
        let mut inner = self.inner.lock();
        let version = inner.version;
        let state = inner.state(kind);
        if let Some(reason) = &state.list_failure {
            return Err(ControlPlaneError::Unavailable(reason.clone()));
        }
        Ok(ObjectList {
            resource_version: version,
            items: state.objects.values().cloned().collect(),
        })
    }

    async fn watch(
        &self,
        kind: ResourceKind,
        since: u64,
    ) -> Result<WatchStream, ControlPlaneError> {
        let mut inner = self.inner.lock();
        let current = inner.version;
        let state = inner.state(kind);
        if let Some(reason) = &state.watch_failure {
            return Err(ControlPlaneError::Unavailable(reason.clone()));
        }
        if since < state.compacted_through {
            return Err(ControlPlaneError::Expired(since));
        }

        let backlog: Vec<StreamItem> = state
            .log
            .iter()
            .filter(|event| event.resource_version > since)
            .cloned()
            .map(Ok)
            .collect();
        // Subscribing under the lock leaves no gap between backlog and live events.
        let live = BroadcastStream::new(state.sender.subscribe()).map(move |item| match item {
            Ok(item) => item,
            Err(BroadcastStreamRecvError::Lagged(_)) => Err(ControlPlaneError::Expired(current)),
        });

        Ok(Box::pin(tokio_stream::iter(backlog).chain(live)))
    }
}
