//! Object identity.
//!
//! Every cached object is addressed by its namespace and name. The key is
//! ordered so store iteration and reconciliation deltas are deterministic.

use kube::{Resource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bound satisfied by every object type an informer can track.
pub trait Tracked: Resource + Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

impl<K> Tracked for K where K: Resource + Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

/// Stable identity of a cached object within one resource kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Namespace, `None` for cluster-scoped objects
    pub namespace: Option<String>,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Creates a key from its parts.
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(ToString::to_string),
            name: name.into(),
        }
    }

    /// Derives the key of an object from its metadata.
    ///
    /// Returns `None` when the object carries no name (e.g. a create request
    /// relying on `generateName`), which cannot happen for objects returned by
    /// the API server.
    pub fn for_object<K: Resource>(obj: &K) -> Option<Self> {
        let name = obj.meta().name.clone()?;
        Some(Self {
            namespace: obj.namespace(),
            name,
        })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Pod;
    use kube::api::ObjectMeta;

    #[test]
    fn test_key_from_namespaced_object() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("web-0".to_string()),
                namespace: Some("shop".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let key = ObjectKey::for_object(&pod).expect("pod has a name");
        assert_eq!(key, ObjectKey::new(Some("shop"), "web-0"));
        assert_eq!(key.to_string(), "shop/web-0");
    }

    #[test]
    fn test_key_requires_name() {
        let pod = Pod::default();
        assert!(ObjectKey::for_object(&pod).is_none());
    }

    #[test]
    fn test_cluster_scoped_display() {
        assert_eq!(ObjectKey::new(None, "pv-1").to_string(), "pv-1");
    }
}
