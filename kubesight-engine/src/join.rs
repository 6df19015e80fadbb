//! Read-time label joins across kinds.
//!
//! A [`JoinSpec`] copies labels from metrics of a source kind onto metrics of
//! a target kind when both carry the same values for the correlation labels.
//! The namespace → pod join, for instance, correlates on `namespace` and
//! copies namespace labels such as `team` onto every pod metric.
//!
//! Joins are computed on each publish from store snapshots and never written
//! back into a store.

use std::collections::{BTreeSet, HashMap};

use kubesight_common::Labels;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{EngineError, Result};
use crate::kind::ResourceKind;
use crate::store::StoreSnapshot;

/// One label join between two kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    #[serde(alias = "source_kind")]
    pub source: ResourceKind,
    #[serde(alias = "target_kind")]
    pub target: ResourceKind,
    /// Labels whose values must be equal on both sides.
    pub correlation_labels: BTreeSet<String>,
    /// Labels copied from the source onto the target.
    pub joined_labels: BTreeSet<String>,
}

impl JoinSpec {
    pub fn new<C, J, S>(
        source: ResourceKind,
        target: ResourceKind,
        correlation_labels: C,
        joined_labels: J,
    ) -> Self
    where
        C: IntoIterator<Item = S>,
        J: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source,
            target,
            correlation_labels: correlation_labels.into_iter().map(Into::into).collect(),
            joined_labels: joined_labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Check the join against the enabled kinds.
    pub fn validate(&self, enabled: &[ResourceKind]) -> Result<()> {
        if self.correlation_labels.is_empty() {
            return Err(EngineError::Join(format!(
                "{} -> {}: correlation_labels must not be empty",
                self.source, self.target
            )));
        }
        if self.joined_labels.is_empty() {
            return Err(EngineError::Join(format!(
                "{} -> {}: joined_labels must not be empty",
                self.source, self.target
            )));
        }
        for kind in [self.source, self.target] {
            if !enabled.contains(&kind) {
                return Err(EngineError::Join(format!(
                    "{} -> {}: kind '{}' is not enabled",
                    self.source, self.target, kind
                )));
            }
        }
        Ok(())
    }

    /// Correlation values of a label set, if it carries all of them.
    fn key(&self, labels: &Labels) -> Option<Vec<String>> {
        self.correlation_labels
            .iter()
            .map(|name| labels.get(name).cloned())
            .collect()
    }
}

/// Applies a fixed list of joins.
#[derive(Debug, Clone, Default)]
pub struct LabelJoiner {
    specs: Vec<JoinSpec>,
}

impl LabelJoiner {
    pub fn new(specs: Vec<JoinSpec>) -> Self {
        Self { specs }
    }

    pub fn specs(&self) -> &[JoinSpec] {
        &self.specs
    }

    /// Build the lookup tables for one publish.
    ///
    /// A source kind without a snapshot yields an empty table, so its joins
    /// never match.
    pub fn prepare(&self, sources: &HashMap<ResourceKind, StoreSnapshot>) -> PreparedJoins<'_> {
        let tables = self
            .specs
            .iter()
            .map(|spec| {
                let mut table: HashMap<Vec<String>, Labels> = HashMap::new();
                let Some(snapshot) = sources.get(&spec.source) else {
                    return (spec, table);
                };
                for families in snapshot.values() {
                    for metric in families.iter().flat_map(|f| f.metrics.iter()) {
                        let Some(key) = spec.key(&metric.labels) else {
                            continue;
                        };
                        let entry = table.entry(key).or_default();
                        for name in &spec.joined_labels {
                            if let Some(value) = metric.labels.get(name) {
                                entry.insert(name.clone(), value.clone());
                            }
                        }
                    }
                }
                (spec, table)
            })
            .collect();

        PreparedJoins { tables }
    }
}

/// Join lookup tables built from one set of snapshots.
#[derive(Debug)]
pub struct PreparedJoins<'a> {
    tables: Vec<(&'a JoinSpec, HashMap<Vec<String>, Labels>)>,
}

impl PreparedJoins<'_> {
    /// Labels of a target metric after applying every join on its kind.
    ///
    /// Labels the metric already has are never overwritten. Among joins, the
    /// one listed last wins.
    pub fn enrich(&self, target: ResourceKind, labels: &Labels) -> Labels {
        let mut joined = Labels::new();
        for (spec, table) in &self.tables {
            if spec.target != target {
                continue;
            }
            match spec.key(labels).and_then(|key| table.get(&key)) {
                Some(extra) => {
                    joined.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                None => {
                    trace!(source = %spec.source, target = %spec.target, "No join match");
                }
            }
        }

        let mut enriched = labels.clone();
        for (name, value) in joined {
            enriched.entry(name).or_insert(value);
        }
        enriched
    }

    /// Whether any join applies to this kind.
    pub fn targets(&self, kind: ResourceKind) -> bool {
        self.tables.iter().any(|(spec, _)| spec.target == kind)
    }
}
