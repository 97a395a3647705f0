use std::path::Path;

use api_types::Cluster;
use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Api;
use kube::Client;
use kube::Config;
use kube::CustomResourceExt;
use thiserror::Error;

/// Errors raised while connecting to the API server at startup.
#[derive(Debug, Error)]
pub enum KubernetesError {
    #[error("Failed to load Kubernetes configuration: {message}")]
    Config { message: String },
    #[error("Failed to connect to Kubernetes API")]
    ConnectionFailed,
    #[error("CustomResourceDefinition {name} is not installed, apply the output of `crd` first")]
    CrdNotInstalled { name: &'static str },
    #[error("Failed to look up CustomResourceDefinition {name}")]
    CrdLookup { name: &'static str },
}

/// Connect using `kubeconfig`, or the in-cluster / `~/.kube/config` defaults, and make
/// sure the `Cluster` resource is served before any watch starts.
///
/// # Errors
///
/// - [`KubernetesError::Config`] if the configuration cannot be loaded
/// - [`KubernetesError::ConnectionFailed`] if no client can be built
/// - [`KubernetesError::CrdNotInstalled`] / [`KubernetesError::CrdLookup`] from
///   [`ensure_crd_installed`]
pub async fn connect(kubeconfig: Option<&Path>) -> Result<Client, Report<KubernetesError>> {
    let config = load_config(kubeconfig).await?;
    let client = Client::try_from(config).change_context(KubernetesError::ConnectionFailed)?;
    ensure_crd_installed(&client).await?;
    Ok(client)
}

async fn load_config(kubeconfig: Option<&Path>) -> Result<Config, Report<KubernetesError>> {
    let Some(path) = kubeconfig else {
        return Config::infer().await.change_context(KubernetesError::Config {
            message: "no in-cluster or default kubeconfig found".to_string(),
        });
    };

    let kubeconfig = Kubeconfig::read_from(path).change_context(KubernetesError::Config {
        message: format!("cannot read {}", path.display()),
    })?;
    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .change_context(KubernetesError::Config {
            message: format!("invalid kubeconfig {}", path.display()),
        })
}

/// Fail fast when the `Cluster` CRD is missing instead of retrying watches forever.
///
/// # Errors
///
/// - [`KubernetesError::CrdNotInstalled`] if the API server does not know the CRD
/// - [`KubernetesError::CrdLookup`] for any other lookup failure
pub async fn ensure_crd_installed(client: &Client) -> Result<(), Report<KubernetesError>> {
    let name = Cluster::crd_name();
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    match crds.get_opt(name).await {
        Ok(Some(_)) => {
            tracing::debug!("CustomResourceDefinition {name} is installed");
            Ok(())
        }
        Ok(None) => Err(Report::new(KubernetesError::CrdNotInstalled { name })),
        Err(e) => Err(Report::new(e).change_context(KubernetesError::CrdLookup { name })),
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test(tokio::test)]
    async fn unreadable_kubeconfig_is_a_config_error() {
        let err = load_config(Some(Path::new("/nonexistent/redpanda/kubeconfig")))
            .await
            .unwrap_err();

        assert!(matches!(
            err.current_context(),
            KubernetesError::Config { .. }
        ));
        assert!(err.to_string().contains("/nonexistent/redpanda/kubeconfig"));
    }

    #[test]
    fn missing_crd_names_the_resource() {
        let err = KubernetesError::CrdNotInstalled {
            name: Cluster::crd_name(),
        };
        assert!(err
            .to_string()
            .contains("clusters.redpanda.vectorized.io"));
    }
}
