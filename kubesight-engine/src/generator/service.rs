use kubesight_common::{Metric, MetricFamily};

use super::{created_family, get_str, labels_family};
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
    let base = [("namespace", namespace), ("service", name)];

    let info = Metric::new(1.0).with_labels(base).with_label(
        "cluster_ip",
        get_str(&object.spec, "/clusterIP")?.unwrap_or_default(),
    );
    let service_type = get_str(&object.spec, "/type")?.unwrap_or("ClusterIP");

    let mut families = vec![
        MetricFamily::new("kube_service_info").with_metric(info),
        labels_family("kube_service_labels", &base, object),
    ];
    if let Some(family) = created_family("kube_service_created", &base, object)? {
        families.push(family);
    }
    families.push(
        MetricFamily::new("kube_service_spec_type")
            .with_metric(Metric::new(1.0).with_labels(base).with_label("type", service_type)),
    );

    Ok(families)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ResourceKind;
    use serde_json::json;

    #[test]
    fn test_service_families() {
        let service = ResourceObject::new(ResourceKind::Service, "db")
            .in_namespace("prod")
            .created_at("2024-01-01T00:00:00Z")
            .with_spec(json!({ "clusterIP": "10.96.0.10", "type": "NodePort" }));

        let families = generate(&service).unwrap();
        let names: Vec<&str> = families.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "kube_service_info",
                "kube_service_labels",
                "kube_service_created",
                "kube_service_spec_type"
            ]
        );
        assert_eq!(families[0].metrics[0].label("cluster_ip"), Some("10.96.0.10"));
        assert_eq!(families[3].metrics[0].label("type"), Some("NodePort"));
    }

    #[test]
    fn test_service_type_defaults_to_cluster_ip() {
        let service = ResourceObject::new(ResourceKind::Service, "db").in_namespace("prod");
        let families = generate(&service).unwrap();
        let spec_type = families.last().unwrap();
        assert_eq!(spec_type.metrics[0].label("type"), Some("ClusterIP"));
    }
}
