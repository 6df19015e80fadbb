//! Resource kinds served by the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A class of cluster object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    #[serde(alias = "namespaces")]
    Namespace,
    #[serde(alias = "nodes")]
    Node,
    #[serde(alias = "pods")]
    Pod,
    #[serde(alias = "deployments")]
    Deployment,
    #[serde(alias = "services")]
    Service,
}

impl ResourceKind {
    /// Every kind with a built-in generator.
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Namespace,
        ResourceKind::Node,
        ResourceKind::Pod,
        ResourceKind::Deployment,
        ResourceKind::Service,
    ];

    /// Canonical (singular) name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Namespace => "namespace",
            ResourceKind::Node => "node",
            ResourceKind::Pod => "pod",
            ResourceKind::Deployment => "deployment",
            ResourceKind::Service => "service",
        }
    }

    /// Whether objects of this kind live inside a namespace.
    pub fn is_namespaced(&self) -> bool {
        !matches!(self, ResourceKind::Namespace | ResourceKind::Node)
    }

    /// Parse an ordered list of kind names, rejecting unknown and duplicate names.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<ResourceKind>, EngineError> {
        let mut kinds = Vec::with_capacity(names.len());
        for name in names {
            let kind: ResourceKind = name.as_ref().parse()?;
            if kinds.contains(&kind) {
                return Err(EngineError::Config(format!(
                    "resource kind '{}' enabled more than once",
                    kind
                )));
            }
            kinds.push(kind);
        }
        Ok(kinds)
    }
}

impl FromStr for ResourceKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "namespace" | "namespaces" => Ok(ResourceKind::Namespace),
            "node" | "nodes" => Ok(ResourceKind::Node),
            "pod" | "pods" => Ok(ResourceKind::Pod),
            "deployment" | "deployments" => Ok(ResourceKind::Deployment),
            "service" | "services" => Ok(ResourceKind::Service),
            _ => Err(EngineError::UnknownKind(s.to_string())),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_singular_and_plural() {
        assert_eq!("pod".parse::<ResourceKind>().unwrap(), ResourceKind::Pod);
        assert_eq!("Pods".parse::<ResourceKind>().unwrap(), ResourceKind::Pod);
        assert_eq!(
            "namespaces".parse::<ResourceKind>().unwrap(),
            ResourceKind::Namespace
        );
    }

    #[test]
    fn test_unknown_kind() {
        let err = "cronjob".parse::<ResourceKind>().unwrap_err();
        assert!(matches!(err, EngineError::UnknownKind(name) if name == "cronjob"));
    }

    #[test]
    fn test_parse_list_keeps_order_and_rejects_duplicates() {
        let kinds = ResourceKind::parse_list(&["nodes", "pods", "namespace"]).unwrap();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::Node,
                ResourceKind::Pod,
                ResourceKind::Namespace
            ]
        );

        assert!(ResourceKind::parse_list(&["pod", "pods"]).is_err());
    }

    #[test]
    fn test_namespaced() {
        assert!(ResourceKind::Pod.is_namespaced());
        assert!(!ResourceKind::Node.is_namespaced());
        assert!(!ResourceKind::Namespace.is_namespaced());
    }

    #[test]
    fn test_serde_alias() {
        let kind: ResourceKind = serde_json::from_str("\"deployments\"").unwrap();
        assert_eq!(kind, ResourceKind::Deployment);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"deployment\"");
    }
}
