//! The control-plane seam.
//!
//! The engine only needs two calls per kind: a full listing and a resumable
//! change stream. [`MemoryControlPlane`] is a complete in-process
//! implementation used by tests and by fixture-driven runs.

mod memory;

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

use crate::error::ControlPlaneError;
use crate::kind::ResourceKind;
use crate::object::{ObjectList, ResourceObject};

pub use memory::MemoryControlPlane;

/// Kind of change carried by a [`WatchEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
}

/// One change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    pub event_type: WatchEventType,
    pub object: ResourceObject,
    /// Control-plane version at which the change happened.
    pub resource_version: u64,
}

/// An infinite change stream. Ends or fails when the server drops it; the
/// watcher then resumes from the last version it saw.
pub type WatchStream =
    Pin<Box<dyn Stream<Item = Result<WatchEvent, ControlPlaneError>> + Send + 'static>>;

/// Client handle for the cluster control plane.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// List every object of a kind.
    async fn list(&self, kind: ResourceKind) -> Result<ObjectList, ControlPlaneError>;

    /// Stream changes of a kind that happened after `since`.
    ///
    /// Returns [`ControlPlaneError::Expired`] when `since` is too old to resume.
    async fn watch(
        &self,
        kind: ResourceKind,
        since: u64,
    ) -> Result<WatchStream, ControlPlaneError>;
}
