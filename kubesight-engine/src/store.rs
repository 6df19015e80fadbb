//! Per-kind cache of generated metric families.

use std::collections::BTreeMap;
use std::sync::Arc;

use kubesight_common::MetricFamily;
use parking_lot::RwLock;
use tracing::trace;

use crate::error::GenerateError;
use crate::filter::AllowDenyFilter;
use crate::generator::GeneratorFn;
use crate::kind::ResourceKind;
use crate::object::{ObjectIdentity, ResourceObject};

/// Immutable copy of a store's content, in identity order.
pub type StoreSnapshot = BTreeMap<ObjectIdentity, Arc<Vec<MetricFamily>>>;

/// Outcome of [`ResourceStore::reconcile`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Objects (re)generated from the listing.
    pub upserted: usize,
    /// Previously stored identities no longer present.
    pub removed: usize,
    /// Listed objects whose generation failed.
    pub failed: Vec<(ObjectIdentity, GenerateError)>,
}

/// Authoritative cache for one kind.
///
/// Each entry holds `filter(generate(object))` for the latest observed state
/// of the object. Entries are replaced wholesale, so readers never see a mix
/// of old and new families for one identity.
pub struct ResourceStore {
    kind: ResourceKind,
    generator: GeneratorFn,
    filter: Arc<AllowDenyFilter>,
    entries: RwLock<StoreSnapshot>,
}

impl ResourceStore {
    pub fn new(kind: ResourceKind, generator: GeneratorFn, filter: Arc<AllowDenyFilter>) -> Self {
        Self {
            kind,
            generator,
            filter,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Regenerate an object and replace its entry.
    ///
    /// Returns the number of families stored. On error the previous entry is
    /// removed and nothing is stored.
    pub fn upsert(
        &self,
        identity: ObjectIdentity,
        object: &ResourceObject,
    ) -> Result<usize, GenerateError> {
        match self.generate(object) {
            Ok(families) => {
                let count = families.len();
                self.entries.write().insert(identity, Arc::new(families));
                Ok(count)
            }
            Err(e) => {
                self.entries.write().remove(&identity);
                Err(e)
            }
        }
    }

    /// Remove an entry. Returns whether it existed.
    pub fn delete(&self, identity: &ObjectIdentity) -> bool {
        self.entries.write().remove(identity).is_some()
    }

    /// Replace the whole content with the regeneration of a full listing.
    pub fn reconcile<'a, I>(&self, objects: I) -> ReconcileReport
    where
        I: IntoIterator<Item = &'a ResourceObject>,
    {
        let mut report = ReconcileReport::default();
        let mut fresh = BTreeMap::new();

        for object in objects {
            let identity = object.identity();
            match self.generate(object) {
                Ok(families) => {
                    fresh.insert(identity, Arc::new(families));
                    report.upserted += 1;
                }
                Err(e) => report.failed.push((identity, e)),
            }
        }

        let mut entries = self.entries.write();
        report.removed = entries.keys().filter(|id| !fresh.contains_key(*id)).count();
        *entries = fresh;
        drop(entries);

        trace!(
            kind = %self.kind,
            upserted = report.upserted,
            removed = report.removed,
            failed = report.failed.len(),
            "Store reconciled"
        );
        report
    }

    /// Copy of the current content.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.entries.read().clone()
    }

    /// Families currently stored for one identity.
    pub fn get(&self, identity: &ObjectIdentity) -> Option<Arc<Vec<MetricFamily>>> {
        self.entries.read().get(identity).cloned()
    }

    pub fn contains(&self, identity: &ObjectIdentity) -> bool {
        self.entries.read().contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn generate(&self, object: &ResourceObject) -> Result<Vec<MetricFamily>, GenerateError> {
        let mut families = (self.generator)(object)?;
        families.retain(|family| self.filter.allows(&family.name));
        Ok(families)
    }
}

impl std::fmt::Debug for ResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStore")
            .field("kind", &self.kind)
            .field("filter", &self.filter)
            .field("entries", &self.len())
            .finish()
    }
}
