//! Reconciliation of the Kubernetes objects backing a `Cluster`.
//!
//! The main components are:
//! - [`StatefulSetResource`]: synthesizes the broker StatefulSet and converges the live one
//! - [`StatefulSetStore`]: the API seam used to read and write StatefulSets
//! - [`LabelPolicy`]: labels stamped on the objects the operator owns
//! - [`SynthesisPolicy`]: fixed defaults (memory, storage, paths) used during synthesis

pub(crate) mod configmap;
pub(crate) mod image;
pub mod labels;
#[cfg(test)]
pub(crate) mod mock;
pub(crate) mod ownership;
pub mod policy;
pub(crate) mod quantity;
pub mod statefulset;
pub mod store;

use std::fmt;

use api_types::Cluster;
use async_trait::async_trait;
use error_stack::Report;
use kube::ResourceExt;
use thiserror::Error;

pub use configmap::config_map_key;
pub use image::ImageReference;
pub use labels::ClusterLabels;
pub use labels::LabelPolicy;
pub use policy::SynthesisPolicy;
pub use statefulset::synthesize;
pub use statefulset::StatefulSetResource;
pub use store::KubeStatefulSets;
pub use store::StatefulSetStore;
pub use store::StoreError;

/// Namespace used when a `Cluster` carries none.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Namespace/name pair identifying an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of the object owned by `cluster`, which shares the cluster's namespace and name.
    pub fn for_cluster(cluster: &Cluster) -> Self {
        Self::new(
            cluster
                .namespace()
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            cluster.name_any(),
        )
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Errors that can occur while synthesizing or converging a managed resource.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Invalid image reference: {message}")]
    InvalidImage { message: String },
    #[error("Invalid labels: {message}")]
    InvalidLabels { message: String },
    #[error("Failed to set owner reference: {message}")]
    Ownership { message: String },
    #[error("failed to get {kind} {key}")]
    Read { kind: &'static str, key: ObjectKey },
    #[error("failed to create {kind} {key}")]
    Create { kind: &'static str, key: ObjectKey },
    #[error("failed to update {kind} {key}")]
    Update { kind: &'static str, key: ObjectKey },
}

/// Result of a single [`Resource::ensure`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The object was absent and has been created
    Created,
    /// The object exists and already matches the cluster
    Converged,
    /// The object existed with a different replica count and was updated
    Scaled { from: i32, to: i32 },
}

/// An object managed on behalf of a `Cluster`.
#[async_trait]
pub trait Resource: Send {
    type Object;

    /// Drive the live object toward the cluster's requirements.
    async fn ensure(&mut self) -> Result<EnsureOutcome, Report<ResourceError>>;

    /// Build the complete desired object.
    fn obj(&self) -> Result<Self::Object, Report<ResourceError>>;

    /// Namespace/name used to look up and create the object.
    fn key(&self) -> ObjectKey;

    /// Kubernetes kind of the managed object.
    fn kind(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use api_types::ClusterSpec;
    use kube::api::ObjectMeta;

    use super::*;

    #[test]
    fn key_follows_cluster_identity() {
        let mut cluster = Cluster::new("c1", ClusterSpec::default());
        cluster.metadata.namespace = Some("ns1".to_string());

        let key = ObjectKey::for_cluster(&cluster);

        assert_eq!(key, ObjectKey::new("ns1", "c1"));
        assert_eq!(key.to_string(), "ns1/c1");
    }

    #[test]
    fn key_defaults_namespace() {
        let cluster = Cluster {
            metadata: ObjectMeta {
                name: Some("c1".to_string()),
                ..Default::default()
            },
            spec: ClusterSpec::default(),
        };

        assert_eq!(ObjectKey::for_cluster(&cluster).namespace, DEFAULT_NAMESPACE);
    }
}
