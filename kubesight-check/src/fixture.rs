//! Fixture-driven cluster state.
//!
//! The check reads cluster objects from a JSON5 file and serves them through
//! a [`MemoryControlPlane`]. With reloading enabled the file is re-read before
//! every run and the differences are applied as watch events.

use std::collections::BTreeMap;
use std::path::Path;

use kubesight_common::load_config;
use kubesight_engine::{MemoryControlPlane, ObjectIdentity, ResourceKind, ResourceObject};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CheckError, Result};

/// Contents of a fixture file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub objects: Vec<ResourceObject>,
}

/// Changes applied by [`Fixture::sync`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixtureSync {
    pub applied: usize,
    pub deleted: usize,
}

impl Fixture {
    /// Read a fixture file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_config(path).map_err(CheckError::Fixture)
    }

    /// Make the control plane hold exactly the fixture's objects.
    ///
    /// Unchanged objects produce no event. When an identity appears twice,
    /// the later object wins.
    pub fn sync(&self, control_plane: &MemoryControlPlane) -> FixtureSync {
        let mut wanted: BTreeMap<(ResourceKind, ObjectIdentity), &ResourceObject> = BTreeMap::new();
        for object in &self.objects {
            wanted.insert((object.kind, object.identity()), object);
        }

        let mut result = FixtureSync::default();
        for kind in ResourceKind::ALL {
            for existing in control_plane.objects(kind) {
                let key = (kind, existing.identity());
                match wanted.get(&key).map(|desired| same_content(&existing, desired)) {
                    Some(true) => {
                        wanted.remove(&key);
                    }
                    Some(false) => {}
                    None => {
                        control_plane.delete(kind, &key.1);
                        result.deleted += 1;
                    }
                }
            }
        }

        for object in wanted.into_values() {
            control_plane.apply(object.clone());
            result.applied += 1;
        }

        debug!(
            applied = result.applied,
            deleted = result.deleted,
            "Fixture synchronized"
        );
        result
    }
}

/// Equality ignoring the version stamped by the control plane.
fn same_content(stored: &ResourceObject, desired: &ResourceObject) -> bool {
    let mut stored = stored.clone();
    stored.metadata.resource_version = desired.metadata.resource_version.clone();
    &stored == desired
}
