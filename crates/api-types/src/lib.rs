//! Shared API type definitions
//!
//! This crate contains the `Cluster` custom resource (`redpanda.vectorized.io/v1alpha1`)
//! consumed by the operator, together with the endpoint configuration it carries.

use k8s_openapi::api::core::v1::ResourceRequirements;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// API group of the cluster custom resource.
pub const GROUP: &str = "redpanda.vectorized.io";

/// Desired state of a Redpanda cluster.
#[derive(CustomResource, Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "redpanda.vectorized.io",
    version = "v1alpha1",
    kind = "Cluster",
    plural = "clusters",
    shortname = "rp",
    derive = "PartialEq",
    derive = "Default",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Container image repository, without a tag (e.g. "vectorized/redpanda")
    pub image: String,
    /// Image tag used together with `image`
    pub version: String,
    /// Number of brokers the cluster should run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Listener configuration for the brokers
    #[serde(default)]
    pub configuration: RedpandaConfig,
    /// Compute resources for the broker container, copied verbatim onto it
    #[serde(default)]
    pub resources: ResourceRequirements,
}

/// Network listeners exposed by every broker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedpandaConfig {
    /// Internal RPC listener
    #[serde(default)]
    pub rpc_server: SocketAddress,
    /// Kafka-compatible data plane listener
    #[serde(default)]
    pub kafka_api: SocketAddress,
    /// Admin HTTP listener
    #[serde(default)]
    pub admin_api: SocketAddress,
}

/// Address and port of a single listener.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SocketAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub port: i32,
}

impl SocketAddress {
    pub fn with_port(port: i32) -> Self {
        Self {
            address: None,
            port,
        }
    }
}

#[cfg(test)]
mod tests {
    use kube::CustomResourceExt;
    use kube::Resource;
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn spec_deserializes_from_camel_case() {
        let raw = serde_json::json!({
            "image": "vectorized/redpanda",
            "version": "v21.4.1",
            "replicas": 3,
            "configuration": {
                "rpcServer": { "port": 33145 },
                "kafkaApi": { "port": 9092 },
                "adminApi": { "port": 9644 }
            },
            "resources": {
                "limits": { "memory": "4Gi", "cpu": "2" }
            }
        });

        let spec: ClusterSpec = serde_json::from_value(raw).unwrap();

        assert_eq!(spec.replicas, Some(3));
        assert_eq!(spec.configuration.kafka_api, SocketAddress::with_port(9092));
        assert_eq!(spec.configuration.admin_api.port, 9644);
        assert_eq!(spec.configuration.rpc_server.port, 33145);
        let limits = spec.resources.limits.unwrap();
        assert_eq!(limits["memory"].0, "4Gi");
    }

    #[test]
    fn replicas_are_optional() {
        let raw = serde_json::json!({ "image": "rp", "version": "v1" });
        let spec: ClusterSpec = serde_json::from_value(raw).unwrap();
        assert_eq!(spec.replicas, None);
        assert_eq!(spec.configuration, RedpandaConfig::default());
    }

    #[test]
    fn crd_metadata() {
        let crd = Cluster::crd();
        assert_eq!(crd.spec.group, GROUP);
        assert_eq!(crd.spec.names.kind, "Cluster");
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(Cluster::api_version(&()), "redpanda.vectorized.io/v1alpha1");
    }
}
