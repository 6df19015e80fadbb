//! Control-plane objects as seen by the engine.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kind::ResourceKind;

/// Object metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name, unique within its namespace.
    pub name: String,

    /// Namespace (namespaced kinds only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Cluster-wide unique identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Resource version assigned by the control plane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    /// RFC 3339 creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// One object of a known kind.
///
/// `spec` and `status` are kept as raw JSON documents; generators read the
/// fields they need and report malformed content as a
/// [`GenerateError`](crate::GenerateError).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    pub kind: ResourceKind,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Value,
    #[serde(default)]
    pub status: Value,
}

impl ResourceObject {
    /// Create an object with empty spec and status.
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            metadata: ObjectMeta {
                name: name.into(),
                ..Default::default()
            },
            spec: Value::Null,
            status: Value::Null,
        }
    }

    /// Place the object in a namespace.
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metadata.namespace = Some(namespace.into());
        self
    }

    /// Set the object's UID.
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.metadata.uid = Some(uid.into());
        self
    }

    /// Add a metadata label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// Set the creation timestamp.
    pub fn created_at(mut self, timestamp: impl Into<String>) -> Self {
        self.metadata.creation_timestamp = Some(timestamp.into());
        self
    }

    /// Replace the spec document.
    pub fn with_spec(mut self, spec: Value) -> Self {
        self.spec = spec;
        self
    }

    /// Replace the status document.
    pub fn with_status(mut self, status: Value) -> Self {
        self.status = status;
        self
    }

    /// Stable key of this object within its kind.
    pub fn identity(&self) -> ObjectIdentity {
        let namespace = if self.kind.is_namespaced() {
            self.metadata.namespace.clone()
        } else {
            None
        };
        ObjectIdentity {
            namespace,
            name: self.metadata.name.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Namespace, or the empty string for cluster-scoped objects.
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }
}

/// Key of one object within a kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectIdentity {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectIdentity {
    /// Identity of a namespaced object.
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Identity of a cluster-scoped object.
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A full listing of one kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectList {
    /// Control-plane version the listing is consistent with.
    pub resource_version: u64,
    pub items: Vec<ResourceObject>,
}
