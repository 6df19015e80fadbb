use kubesight_common::{Metric, MetricFamily};

use super::{bool_value, created_family, get_str, labels_family};
use crate::error::GenerateError;
use crate::object::ResourceObject;

const PHASES: [&str; 2] = ["Active", "Terminating"];

pub(super) fn generate(object: &ResourceObject) -> Result<Vec<MetricFamily>, GenerateError> {
    let name = object.name();
    if name.is_empty() {
        return Err(GenerateError::MissingField("metadata.name".to_string()));
    }
    let base = [("namespace", name)];

    let mut families = vec![labels_family("kube_namespace_labels", &base, object)];

    if let Some(family) = created_family("kube_namespace_created", &base, object)? {
        families.push(family);
    }

    if let Some(phase) = get_str(&object.status, "/phase")? {
        let mut family = MetricFamily::new("kube_namespace_status_phase");
        for candidate in PHASES {
            family.push(
                Metric::new(bool_value(phase == candidate))
                    .with_labels(base)
                    .with_label("phase", candidate),
            );
        }
        families.push(family);
    }

    Ok(families)
}
