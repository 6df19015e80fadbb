use kubesight_common::{Metric, MetricFamily};

use super::{bool_value, created_family, get_bool, get_i64, labels_family};
use crate::error::GenerateError;
use crate::object::ResourceObject;

pub(super) fn generate(object: &ResourceObject) -> Result<Vec<MetricFamily>, GenerateError> {
    let name = object.name();
    if name.is_empty() {
        return Err(GenerateError::MissingField("metadata.name".to_string()));
    }
    let namespace = object.namespace();
    if namespace.is_empty() {
        return Err(GenerateError::MissingField("metadata.namespace".to_string()));
    }
    let base = [("namespace", namespace), ("deployment", name)];

    let mut families = vec![labels_family("kube_deployment_labels", &base, object)];

    if let Some(family) = created_family("kube_deployment_created", &base, object)? {
        families.push(family);
    }

    let gauge = |family: &str, value: f64| {
        MetricFamily::new(family).with_metric(Metric::new(value).with_labels(base))
    };

    // An unset spec.replicas means one replica.
    let desired = get_i64(&object.spec, "/replicas")?.unwrap_or(1);
    let paused = get_bool(&object.spec, "/paused")?.unwrap_or(false);
    families.push(gauge("kube_deployment_spec_replicas", desired as f64));
    families.push(gauge("kube_deployment_spec_paused", bool_value(paused)));

    for (family, pointer) in [
        ("kube_deployment_status_replicas", "/replicas"),
        ("kube_deployment_status_replicas_available", "/availableReplicas"),
        ("kube_deployment_status_replicas_unavailable", "/unavailableReplicas"),
        ("kube_deployment_status_replicas_updated", "/updatedReplicas"),
    ] {
        let value = get_i64(&object.status, pointer)?.unwrap_or(0);
        families.push(gauge(family, value as f64));
    }

    Ok(families)
}
