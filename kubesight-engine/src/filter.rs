//! Allow/deny filtering of metric families by name.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Metric family filtering configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Glob patterns of families to keep (empty = no allowlist).
    #[serde(default, alias = "metrics")]
    pub metric_allowlist: Vec<String>,

    /// Glob patterns of families to drop (empty = no denylist).
    #[serde(default)]
    pub metric_denylist: Vec<String>,
}

impl FilterConfig {
    /// Keep only the given families.
    pub fn allow<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            metric_allowlist: patterns.into_iter().map(Into::into).collect(),
            metric_denylist: Vec::new(),
        }
    }

    /// Drop the given families.
    pub fn deny<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            metric_allowlist: Vec::new(),
            metric_denylist: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

/// Compiled filter. Exactly one mode is active.
#[derive(Debug, Clone, Default)]
pub enum AllowDenyFilter {
    #[default]
    AllowAll,
    /// Keep families matching any pattern.
    Allow(Vec<glob::Pattern>),
    /// Drop families matching any pattern.
    Deny(Vec<glob::Pattern>),
}

impl AllowDenyFilter {
    /// Compile a filter from configuration.
    pub fn new(config: &FilterConfig) -> Result<Self> {
        match (
            config.metric_allowlist.is_empty(),
            config.metric_denylist.is_empty(),
        ) {
            (true, true) => Ok(Self::AllowAll),
            (false, true) => Ok(Self::Allow(compile(&config.metric_allowlist)?)),
            (true, false) => Ok(Self::Deny(compile(&config.metric_denylist)?)),
            (false, false) => Err(EngineError::Filter(
                "metric_allowlist and metric_denylist are mutually exclusive".to_string(),
            )),
        }
    }

    /// Whether a family with this name is retained.
    pub fn allows(&self, name: &str) -> bool {
        match self {
            Self::AllowAll => true,
            Self::Allow(patterns) => patterns.iter().any(|p| p.matches(name)),
            Self::Deny(patterns) => !patterns.iter().any(|p| p.matches(name)),
        }
    }
}

fn compile(patterns: &[String]) -> Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| {
            if p.is_empty() {
                return Err(EngineError::Filter("empty metric pattern".to_string()));
            }
            glob::Pattern::new(p)
                .map_err(|e| EngineError::Filter(format!("invalid pattern '{}': {}", p, e)))
        })
        .collect()
}
