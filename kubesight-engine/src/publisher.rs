//! Snapshot flattening and emission to a telemetry sender.

use async_trait::async_trait;
use kubesight_common::Sample;
use tracing::{debug, warn};

use crate::error::SendError;

/// Flattened, post-join view of every store at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub samples: Vec<Sample>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Samples of one family.
    pub fn family<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Sample> + 'a {
        self.samples.iter().filter(move |s| s.name == name)
    }
}

impl IntoIterator for Snapshot {
    type Item = Sample;
    type IntoIter = std::vec::IntoIter<Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.into_iter()
    }
}

/// Destination of emitted samples.
#[async_trait]
pub trait MetricSender: Send + Sync {
    /// Submit one gauge value with its `key:value` tags.
    async fn gauge(&self, name: &str, value: f64, tags: &[String]) -> Result<(), SendError>;

    /// Flush everything submitted since the last commit.
    async fn commit(&self) -> Result<(), SendError>;
}

/// Outcome of one emission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    pub emitted: usize,
    pub failed: usize,
    pub committed: bool,
}

/// Send every sample, then commit.
///
/// A failing sample is logged and counted; the rest are still sent and the
/// commit always happens.
pub async fn emit(
    snapshot: &Snapshot,
    sender: &dyn MetricSender,
    extra_tags: &[String],
) -> EmitReport {
    let mut report = EmitReport::default();

    for sample in snapshot.iter() {
        let mut tags = sample.tags();
        tags.extend(extra_tags.iter().cloned());

        match sender.gauge(&sample.name, sample.value, &tags).await {
            Ok(()) => report.emitted += 1,
            Err(e) => {
                warn!(metric = %sample.name, error = %e, "Failed to send sample");
                report.failed += 1;
            }
        }
    }

    match sender.commit().await {
        Ok(()) => report.committed = true,
        Err(e) => warn!(error = %e, "Failed to commit samples"),
    }

    debug!(
        emitted = report.emitted,
        failed = report.failed,
        "Emission complete"
    );
    report
}
