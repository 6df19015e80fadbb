//! Check configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use kubesight_common::LoggingConfig;
use kubesight_engine::{
    AllowDenyFilter, Builder, FilterConfig, JoinSpec, MemoryControlPlane, ResourceKind,
};
use serde::{Deserialize, Serialize};

use crate::error::{CheckError, Result};

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Engine settings.
    #[serde(default)]
    pub kube_state_metrics: KsmConfig,

    /// Where the cluster state comes from.
    pub control_plane: ControlPlaneConfig,

    /// Where samples go.
    #[serde(default)]
    pub sender: SenderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine settings of the check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KsmConfig {
    /// Enabled kinds, in publish order.
    #[serde(default = "default_collectors")]
    pub collectors: Vec<String>,

    /// Families to keep (glob patterns).
    #[serde(default, alias = "metrics")]
    pub metric_allowlist: Vec<String>,

    /// Families to drop (glob patterns).
    #[serde(default)]
    pub metric_denylist: Vec<String>,

    #[serde(default)]
    pub label_joins: Vec<JoinSpec>,

    /// Namespaces to watch (empty = all).
    #[serde(default)]
    pub namespaces: Vec<String>,

    /// Static `key:value` tags added to every sample.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Seconds between full re-lists.
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,

    /// Seconds between check runs.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Seconds to wait at startup for every collector's first list. Collectors
    /// still listing afterwards keep retrying in the background.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

fn default_collectors() -> Vec<String> {
    ResourceKind::ALL
        .iter()
        .map(|kind| kind.as_str().to_string())
        .collect()
}

fn default_resync_interval() -> u64 {
    30
}

fn default_interval() -> u64 {
    15
}

fn default_startup_timeout() -> u64 {
    10
}

impl Default for KsmConfig {
    fn default() -> Self {
        Self {
            collectors: default_collectors(),
            metric_allowlist: Vec::new(),
            metric_denylist: Vec::new(),
            label_joins: Vec::new(),
            namespaces: Vec::new(),
            tags: Vec::new(),
            resync_interval_secs: default_resync_interval(),
            interval_secs: default_interval(),
            startup_timeout_secs: default_startup_timeout(),
        }
    }
}

impl KsmConfig {
    /// Enabled kinds, parsed.
    pub fn kinds(&self) -> Result<Vec<ResourceKind>> {
        Ok(ResourceKind::parse_list(&self.collectors)?)
    }

    pub fn filter(&self) -> FilterConfig {
        FilterConfig {
            metric_allowlist: self.metric_allowlist.clone(),
            metric_denylist: self.metric_denylist.clone(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    /// Engine builder for this configuration.
    pub fn builder(&self, control_plane: Arc<MemoryControlPlane>) -> Result<Builder> {
        Ok(Builder::new(control_plane)
            .with_kinds(self.kinds()?)
            .with_filter(self.filter())
            .with_joins(self.label_joins.clone())
            .with_namespaces(self.namespaces.iter().cloned())
            .with_resync_interval(self.resync_interval()))
    }

    fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(CheckError::validation("interval_secs must be greater than 0"));
        }
        if self.resync_interval_secs == 0 {
            return Err(CheckError::validation(
                "resync_interval_secs must be greater than 0",
            ));
        }
        if let Some(tag) = self.tags.iter().find(|tag| !tag.contains(':')) {
            return Err(CheckError::validation(format!(
                "tag '{}' is not of the form key:value",
                tag
            )));
        }

        let kinds = self.kinds()?;
        AllowDenyFilter::new(&self.filter())?;
        for join in &self.label_joins {
            join.validate(&kinds)?;
        }
        Ok(())
    }
}

/// Source of cluster state.
///
/// Objects are read from a JSON5 fixture file of the form
/// `{ objects: [ { kind, metadata, spec, status }, ... ] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    pub fixture: PathBuf,

    /// Re-read the fixture before every run and apply the differences.
    #[serde(default)]
    pub reload: bool,
}

/// Sample destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SenderConfig {
    /// Log every sample through `tracing`.
    #[default]
    Log,
    /// One JSON object per line, written at commit.
    JsonLines {
        /// Output file, appended to (stdout when absent).
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

impl CheckConfig {
    /// Load configuration from a JSON5 file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(CheckError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string and validate it.
    pub fn parse(content: &str) -> Result<Self> {
        let config: CheckConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.kube_state_metrics.validate()
    }
}
