use kubesight_common::{Metric, MetricFamily};

use super::{
    bool_value, condition_metrics, created_family, get_array, get_bool, get_i64, get_str,
    labels_family,
};
use crate::error::GenerateError;
use crate::object::ResourceObject;

const PHASES: [&str; 5] = ["Pending", "Running", "Succeeded", "Failed", "Unknown"];

pub(super) fn generate(object: &ResourceObject) -> Result<Vec<MetricFamily>, GenerateError> {
    let name = object.name();
    if name.is_empty() {
        return Err(GenerateError::MissingField("metadata.name".to_string()));
    }
    let namespace = object.namespace();
    if namespace.is_empty() {
        return Err(GenerateError::MissingField("metadata.namespace".to_string()));
    }
    let base = [("namespace", namespace), ("pod", name)];
    let status = &object.status;

    let info = Metric::new(1.0)
        .with_labels(base)
        .with_label("uid", object.metadata.uid.as_deref().unwrap_or_default())
        .with_label(
            "node",
            get_str(&object.spec, "/nodeName")?.unwrap_or_default(),
        )
        .with_label("host_ip", get_str(status, "/hostIP")?.unwrap_or_default())
        .with_label("pod_ip", get_str(status, "/podIP")?.unwrap_or_default());

    let mut families = vec![
        MetricFamily::new("kube_pod_info").with_metric(info),
        labels_family("kube_pod_labels", &base, object),
    ];

    if let Some(family) = created_family("kube_pod_created", &base, object)? {
        families.push(family);
    }

    if let Some(phase) = get_str(status, "/phase")? {
        let mut family = MetricFamily::new("kube_pod_status_phase");
        for candidate in PHASES {
            family.push(
                Metric::new(bool_value(phase == candidate))
                    .with_labels(base)
                    .with_label("phase", candidate),
            );
        }
        families.push(family);
    }

    for condition in get_array(status, "/conditions")? {
        if get_str(condition, "/type")? == Some("Ready") {
            let state = get_str(condition, "/status")?.unwrap_or("Unknown");
            let mut family = MetricFamily::new("kube_pod_status_ready");
            for metric in condition_metrics(&base, state, &[], "condition") {
                family.push(metric);
            }
            families.push(family);
            break;
        }
    }

    let containers = get_array(status, "/containerStatuses")?;
    if !containers.is_empty() {
        let mut restarts = MetricFamily::new("kube_pod_container_status_restarts_total");
        let mut ready = MetricFamily::new("kube_pod_container_status_ready");
        for container in containers {
            let container_name = get_str(container, "/name")?.ok_or_else(|| {
                GenerateError::MissingField("status.containerStatuses[].name".to_string())
            })?;
            let restart_count = get_i64(container, "/restartCount")?.unwrap_or(0);
            if restart_count < 0 {
                return Err(GenerateError::invalid(
                    "status.containerStatuses[].restartCount",
                    format!("negative restart count {}", restart_count),
                ));
            }
            let is_ready = get_bool(container, "/ready")?.unwrap_or(false);

            restarts.push(
                Metric::new(restart_count as f64)
                    .with_labels(base)
                    .with_label("container", container_name),
            );
            ready.push(
                Metric::new(bool_value(is_ready))
                    .with_labels(base)
                    .with_label("container", container_name),
            );
        }
        families.push(restarts);
        families.push(ready);
    }

    Ok(families)
}
