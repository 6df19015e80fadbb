//! Metric family generators.
//!
//! A generator is a plain function turning one object into its metric
//! families. It must be deterministic: the same object always yields the same
//! families, so a regeneration fully replaces the previous result.

mod deployment;
mod namespace;
mod node;
mod pod;
mod quantity;
mod service;

use std::collections::HashMap;

use chrono::DateTime;
use kubesight_common::{Metric, MetricFamily, sanitize_label_name};
use serde_json::Value;

use crate::error::GenerateError;
use crate::kind::ResourceKind;
use crate::object::ResourceObject;

pub use quantity::parse_quantity;

/// Signature of a generator.
pub type GeneratorFn = fn(&ResourceObject) -> Result<Vec<MetricFamily>, GenerateError>;

/// Maps each kind to the generator producing its families.
#[derive(Debug, Clone)]
pub struct GeneratorRegistry {
    generators: HashMap<ResourceKind, GeneratorFn>,
}

impl GeneratorRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            generators: HashMap::new(),
        }
    }

    /// Registry with the built-in generator of every kind.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(ResourceKind::Namespace, namespace::generate);
        registry.register(ResourceKind::Node, node::generate);
        registry.register(ResourceKind::Pod, pod::generate);
        registry.register(ResourceKind::Deployment, deployment::generate);
        registry.register(ResourceKind::Service, service::generate);
        registry
    }

    /// Register or replace the generator of a kind.
    pub fn register(&mut self, kind: ResourceKind, generator: GeneratorFn) {
        self.generators.insert(kind, generator);
    }

    pub fn get(&self, kind: ResourceKind) -> Option<GeneratorFn> {
        self.generators.get(&kind).copied()
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.generators.contains_key(&kind)
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// Field accessors shared by the built-in generators. A missing field is
// `None`; a field of the wrong type is an error.

pub(crate) fn get_str<'a>(
    doc: &'a Value,
    pointer: &str,
) -> Result<Option<&'a str>, GenerateError> {
    match doc.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(GenerateError::invalid(
            pointer,
            format!("expected string, got {}", other),
        )),
    }
}

pub(crate) fn get_i64(doc: &Value, pointer: &str) -> Result<Option<i64>, GenerateError> {
    match doc.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| GenerateError::invalid(pointer, format!("expected integer, got {}", n))),
        Some(other) => Err(GenerateError::invalid(
            pointer,
            format!("expected integer, got {}", other),
        )),
    }
}

pub(crate) fn get_bool(doc: &Value, pointer: &str) -> Result<Option<bool>, GenerateError> {
    match doc.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(GenerateError::invalid(
            pointer,
            format!("expected boolean, got {}", other),
        )),
    }
}

pub(crate) fn get_array<'a>(
    doc: &'a Value,
    pointer: &str,
) -> Result<&'a [Value], GenerateError> {
    match doc.pointer(pointer) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(GenerateError::invalid(
            pointer,
            format!("expected array, got {}", other),
        )),
    }
}

pub(crate) fn bool_value(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// `<family>{base..., label_<key>=<value>...} 1` for the object's metadata labels.
pub(crate) fn labels_family(name: &str, base: &[(&str, &str)], object: &ResourceObject) -> MetricFamily {
    let metric = Metric::new(1.0)
        .with_labels(base.iter().copied())
        .with_labels(object.metadata.labels.iter().map(|(k, v)| {
            (format!("label_{}", sanitize_label_name(k)), v.clone())
        }));
    MetricFamily::new(name).with_metric(metric)
}

/// `<family>{base...} <unix seconds>` from the creation timestamp, if set.
pub(crate) fn created_family(
    name: &str,
    base: &[(&str, &str)],
    object: &ResourceObject,
) -> Result<Option<MetricFamily>, GenerateError> {
    let Some(timestamp) = object.metadata.creation_timestamp.as_deref() else {
        return Ok(None);
    };
    let parsed = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| GenerateError::invalid("metadata.creationTimestamp", e.to_string()))?;
    let metric = Metric::new(parsed.timestamp() as f64).with_labels(base.iter().copied());
    Ok(Some(MetricFamily::new(name).with_metric(metric)))
}

/// One metric per condition status, set to 1 for the observed one.
///
/// The candidate status (`true`, `false`, `unknown`) goes into the `key`
/// label.
pub(crate) fn condition_metrics(
    base: &[(&str, &str)],
    status: &str,
    extra: &[(&str, &str)],
    key: &str,
) -> Vec<Metric> {
    ["true", "false", "unknown"]
        .into_iter()
        .map(|candidate| {
            Metric::new(bool_value(status.eq_ignore_ascii_case(candidate)))
                .with_labels(base.iter().copied())
                .with_labels(extra.iter().copied())
                .with_label(key, candidate)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_registry_covers_all_kinds() {
        let registry = GeneratorRegistry::builtin();
        for kind in ResourceKind::ALL {
            assert!(registry.contains(kind), "missing generator for {}", kind);
        }
        assert!(!GeneratorRegistry::empty().contains(ResourceKind::Pod));
    }

    #[test]
    fn test_register_overrides() {
        fn nothing(_: &ResourceObject) -> Result<Vec<MetricFamily>, GenerateError> {
            Ok(Vec::new())
        }

        let mut registry = GeneratorRegistry::builtin();
        registry.register(ResourceKind::Pod, nothing);

        let pod = ResourceObject::new(ResourceKind::Pod, "a").in_namespace("default");
        let generator = registry.get(ResourceKind::Pod).unwrap();
        assert!(generator(&pod).unwrap().is_empty());
    }

    #[test]
    fn test_field_accessors() {
        let doc = json!({ "replicas": 3, "paused": true, "name": "x", "items": [1], "ratio": 0.5 });

        assert_eq!(get_i64(&doc, "/replicas").unwrap(), Some(3));
        assert_eq!(get_i64(&doc, "/missing").unwrap(), None);
        assert!(get_i64(&doc, "/ratio").is_err());
        assert!(get_i64(&doc, "/name").is_err());
        assert_eq!(get_bool(&doc, "/paused").unwrap(), Some(true));
        assert_eq!(get_str(&doc, "/name").unwrap(), Some("x"));
        assert_eq!(get_array(&doc, "/items").unwrap().len(), 1);
        assert!(get_array(&doc, "/missing").unwrap().is_empty());
        assert!(get_array(&doc, "/name").is_err());
    }

    #[test]
    fn test_created_family() {
        let object = ResourceObject::new(ResourceKind::Node, "n1").created_at("2024-01-01T00:00:00Z");
        let family = created_family("kube_node_created", &[("node", "n1")], &object)
            .unwrap()
            .unwrap();
        assert_eq!(family.metrics[0].value, 1_704_067_200.0);

        let bad = ResourceObject::new(ResourceKind::Node, "n1").created_at("yesterday");
        assert!(created_family("kube_node_created", &[], &bad).is_err());
    }

    #[test]
    fn test_condition_metrics() {
        let metrics = condition_metrics(&[("node", "n1")], "True", &[("condition", "Ready")], "status");
        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[0].label("status"), Some("true"));
        assert_eq!(metrics[0].value, 1.0);
        assert_eq!(metrics[1].value, 0.0);
        assert_eq!(metrics[2].value, 0.0);
    }

    #[test]
    fn test_condition_metrics_label_key() {
        let metrics = condition_metrics(&[("pod", "web-0")], "False", &[], "condition");
        let set: Vec<_> = metrics
            .iter()
            .filter(|m| m.value == 1.0)
            .map(|m| m.label("condition"))
            .collect();
        assert_eq!(set, vec![Some("false")]);
        assert!(metrics.iter().all(|m| m.label("status").is_none()));
    }
}
