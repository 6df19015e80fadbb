use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label set of a metric. Keys are unique and iterate in sorted order.
pub type Labels = BTreeMap<String, String>;

/// A single labeled observation inside a [`MetricFamily`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Label key/value pairs identifying the series.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,

    /// The observed value.
    pub value: f64,
}

impl Metric {
    /// Create a metric without labels.
    pub fn new(value: f64) -> Self {
        Self {
            labels: Labels::new(),
            value,
        }
    }

    /// Add a label to this metric.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add multiple labels to this metric.
    pub fn with_labels<I, K, V>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.labels
            .extend(labels.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Get a label value.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// A named group of metrics sharing the same semantic meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFamily {
    /// Family name (e.g., "kube_pod_status_phase").
    pub name: String,

    /// The metrics of this family, in generation order.
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

impl MetricFamily {
    /// Create an empty family.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metrics: Vec::new(),
        }
    }

    /// Append a metric to this family.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    /// Append a metric in place.
    pub fn push(&mut self, metric: Metric) {
        self.metrics.push(metric);
    }

    /// Whether the family holds no metrics.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// One flattened `(name, labels, value)` tuple handed to a sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Metric family name.
    pub name: String,

    /// Labels after enrichment.
    #[serde(default)]
    pub labels: Labels,

    /// The observed value.
    pub value: f64,
}

impl Sample {
    /// Create a sample from a family name and one of its metrics.
    pub fn new(name: impl Into<String>, metric: Metric) -> Self {
        Self {
            name: name.into(),
            labels: metric.labels,
            value: metric.value,
        }
    }

    /// Render labels as `key:value` tags, in label order.
    pub fn tags(&self) -> Vec<String> {
        self.labels
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v))
            .collect()
    }

    /// Get a label value.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Sanitize a string into a valid label name.
///
/// Invalid characters collapse into a single underscore and a leading digit is
/// prefixed with an underscore.
pub fn sanitize_label_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 1);
    let mut last_was_underscore = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            result.push(c);
            last_was_underscore = c == '_';
        } else if !last_was_underscore {
            result.push('_');
            last_was_underscore = true;
        }
    }

    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }

    if result.is_empty() {
        return "_".to_string();
    }

    result
}
