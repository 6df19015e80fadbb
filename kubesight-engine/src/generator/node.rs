use kubesight_common::{Metric, MetricFamily, sanitize_label_name};
use serde_json::Value;

use super::{
    bool_value, condition_metrics, created_family, get_array, get_bool, get_str, labels_family,
    parse_quantity,
};
use crate::error::GenerateError;
use crate::object::ResourceObject;

pub(super) fn generate(object: &ResourceObject) -> Result<Vec<MetricFamily>, GenerateError> {
    let name = object.name();
    if name.is_empty() {
        return Err(GenerateError::MissingField("metadata.name".to_string()));
    }
    let base = [("node", name)];
    let status = &object.status;

    let info = Metric::new(1.0)
        .with_labels(base)
        .with_label(
            "kernel_version",
            get_str(status, "/nodeInfo/kernelVersion")?.unwrap_or_default(),
        )
        .with_label(
            "os_image",
            get_str(status, "/nodeInfo/osImage")?.unwrap_or_default(),
        )
        .with_label(
            "container_runtime_version",
            get_str(status, "/nodeInfo/containerRuntimeVersion")?.unwrap_or_default(),
        )
        .with_label(
            "kubelet_version",
            get_str(status, "/nodeInfo/kubeletVersion")?.unwrap_or_default(),
        )
        .with_label(
            "provider_id",
            get_str(&object.spec, "/providerID")?.unwrap_or_default(),
        );

    let mut families = vec![
        MetricFamily::new("kube_node_info").with_metric(info),
        labels_family("kube_node_labels", &base, object),
    ];

    if let Some(family) = created_family("kube_node_created", &base, object)? {
        families.push(family);
    }

    let unschedulable = get_bool(&object.spec, "/unschedulable")?.unwrap_or(false);
    families.push(
        MetricFamily::new("kube_node_spec_unschedulable")
            .with_metric(Metric::new(bool_value(unschedulable)).with_labels(base)),
    );

    let mut conditions = MetricFamily::new("kube_node_status_condition");
    for condition in get_array(status, "/conditions")? {
        let kind = get_str(condition, "/type")?
            .ok_or_else(|| GenerateError::MissingField("status.conditions[].type".to_string()))?;
        let state = get_str(condition, "/status")?.unwrap_or("Unknown");
        for metric in condition_metrics(&base, state, &[("condition", kind)], "status") {
            conditions.push(metric);
        }
    }
    if !conditions.is_empty() {
        families.push(conditions);
    }

    for (family_name, pointer) in [
        ("kube_node_status_capacity", "/capacity"),
        ("kube_node_status_allocatable", "/allocatable"),
    ] {
        if let Some(family) = resource_family(family_name, pointer, &base, status)? {
            families.push(family);
        }
    }

    Ok(families)
}

/// `{resource, unit}` metrics from a resource-list map (capacity/allocatable).
fn resource_family(
    family_name: &str,
    pointer: &str,
    base: &[(&str, &str)],
    status: &Value,
) -> Result<Option<MetricFamily>, GenerateError> {
    let resources = match status.pointer(pointer) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(GenerateError::invalid(
                format!("status{}", pointer.replace('/', ".")),
                format!("expected object, got {}", other),
            ));
        }
    };

    let mut family = MetricFamily::new(family_name);
    for (resource, raw) in resources {
        let field = format!("status{}.{}", pointer.replace('/', "."), resource);
        let value = match raw {
            Value::String(s) => parse_quantity(&field, s)?,
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| GenerateError::invalid(&field, "not a number"))?,
            other => {
                return Err(GenerateError::invalid(
                    &field,
                    format!("expected quantity, got {}", other),
                ));
            }
        };
        family.push(
            Metric::new(value)
                .with_labels(base.iter().copied())
                .with_label("resource", sanitize_label_name(resource))
                .with_label("unit", unit_of(resource)),
        );
    }
    Ok(Some(family))
}

fn unit_of(resource: &str) -> &'static str {
    match resource {
        "cpu" => "core",
        "memory" | "ephemeral-storage" | "storage" => "byte",
        r if r.starts_with("hugepages-") => "byte",
        _ => "integer",
    }
}
