//! KubeSight Engine
//!
//! Keeps per-kind caches of cluster objects in sync with the control plane and
//! turns them into labeled metrics.
//!
//! # Overview
//!
//! - [`ControlPlane`] is the list-and-watch seam; [`MemoryControlPlane`] is an
//!   in-process implementation
//! - [`GeneratorRegistry`] maps each [`ResourceKind`] to the function turning
//!   one object into metric families
//! - [`AllowDenyFilter`] drops families by name before they are stored
//! - [`ResourceStore`] caches the generated families of one kind
//! - [`ResourceWatcher`] feeds a store from list, watch and periodic resync
//! - [`LabelJoiner`] copies labels across kinds at publish time
//! - [`Builder`] wires everything into a running [`Engine`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use kubesight_engine::{Builder, MemoryControlPlane, ResourceKind};
//!
//! let control_plane = Arc::new(MemoryControlPlane::new());
//! let engine = Builder::new(control_plane)
//!     .with_kinds([ResourceKind::Pod])
//!     .start()?;
//!
//! engine.wait_for_initial_lists().await;
//! for sample in engine.publish() {
//!     println!("{} {:?} {}", sample.name, sample.tags(), sample.value);
//! }
//! ```

mod builder;
pub mod controlplane;
mod error;
mod filter;
pub mod generator;
mod join;
mod kind;
mod object;
mod publisher;
mod stats;
mod store;
mod watcher;

pub use builder::{Builder, DEFAULT_RESYNC_INTERVAL, Engine, EngineSetup};
pub use controlplane::{ControlPlane, MemoryControlPlane, WatchEvent, WatchEventType, WatchStream};
pub use error::{ControlPlaneError, EngineError, GenerateError, Result, SendError};
pub use filter::{AllowDenyFilter, FilterConfig};
pub use generator::{GeneratorFn, GeneratorRegistry, parse_quantity};
pub use join::{JoinSpec, LabelJoiner, PreparedJoins};
pub use kind::ResourceKind;
pub use object::{ObjectIdentity, ObjectList, ObjectMeta, ResourceObject};
pub use publisher::{EmitReport, MetricSender, Snapshot, emit};
pub use stats::{KindReport, KindStatus, SyncStats, SyncStatsSnapshot};
pub use store::{ReconcileReport, ResourceStore, StoreSnapshot};
pub use watcher::{NamespaceScope, ResourceWatcher};

// Re-export the metric model so users need a single dependency
pub use kubesight_common::{Labels, Metric, MetricFamily, Sample};
