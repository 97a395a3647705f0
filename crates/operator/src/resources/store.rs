use async_trait::async_trait;
use error_stack::Report;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::api::PostParams;
use kube::Api;
use kube::Client;
use thiserror::Error;

use super::ObjectKey;
use super::DEFAULT_NAMESPACE;

/// Errors returned by a [`StatefulSetStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("StatefulSet {key} not found")]
    NotFound { key: ObjectKey },
    #[error("StatefulSet {key} was modified concurrently")]
    Conflict { key: ObjectKey },
    #[error("Kubernetes API request `{operation}` for StatefulSet {key} failed")]
    Request {
        operation: &'static str,
        key: ObjectKey,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Read and write access to StatefulSets.
///
/// Writes go through the API server's optimistic concurrency: an update carrying a stale
/// resource version fails with [`StoreError::Conflict`] and is never retried here.
#[async_trait]
pub trait StatefulSetStore: Send + Sync {
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if no StatefulSet exists under `key`
    /// - [`StoreError::Request`] for any other failure
    async fn get(&self, key: &ObjectKey) -> Result<StatefulSet, Report<StoreError>>;

    /// # Errors
    ///
    /// - [`StoreError::Conflict`] if the object already exists
    /// - [`StoreError::Request`] for any other failure
    async fn create(&self, sts: &StatefulSet) -> Result<StatefulSet, Report<StoreError>>;

    /// Replace the object, guarded by its `metadata.resourceVersion`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the object has been deleted
    /// - [`StoreError::Conflict`] if the object changed since it was read
    /// - [`StoreError::Request`] for any other failure
    async fn update(&self, sts: &StatefulSet) -> Result<StatefulSet, Report<StoreError>>;
}

/// [`StatefulSetStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStatefulSets {
    client: Client,
}

impl KubeStatefulSets {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<StatefulSet> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl StatefulSetStore for KubeStatefulSets {
    async fn get(&self, key: &ObjectKey) -> Result<StatefulSet, Report<StoreError>> {
        self.api(&key.namespace)
            .get(&key.name)
            .await
            .map_err(|e| classify(e, "get", key))
    }

    async fn create(&self, sts: &StatefulSet) -> Result<StatefulSet, Report<StoreError>> {
        let key = object_key(sts);
        self.api(&key.namespace)
            .create(&PostParams::default(), sts)
            .await
            .map_err(|e| classify(e, "create", &key))
    }

    async fn update(&self, sts: &StatefulSet) -> Result<StatefulSet, Report<StoreError>> {
        let key = object_key(sts);
        self.api(&key.namespace)
            .replace(&key.name, &PostParams::default(), sts)
            .await
            .map_err(|e| classify(e, "update", &key))
    }
}

pub(crate) fn object_key(sts: &StatefulSet) -> ObjectKey {
    ObjectKey::new(
        sts.metadata
            .namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        sts.metadata.name.clone().unwrap_or_default(),
    )
}

/// Map API status codes onto store errors, keeping the original error in the report.
fn classify(error: kube::Error, operation: &'static str, key: &ObjectKey) -> Report<StoreError> {
    let context = match &error {
        kube::Error::Api(response) if response.code == 404 => {
            StoreError::NotFound { key: key.clone() }
        }
        kube::Error::Api(response) if response.code == 409 => {
            StoreError::Conflict { key: key.clone() }
        }
        _ => StoreError::Request {
            operation,
            key: key.clone(),
        },
    };
    Report::new(error).change_context(context)
}
