use std::collections::BTreeMap;

use api_types::Cluster;
use error_stack::Report;
use kube::ResourceExt;

use super::ResourceError;

pub const NAME_KEY: &str = "app.kubernetes.io/name";
pub const INSTANCE_KEY: &str = "app.kubernetes.io/instance";
pub const COMPONENT_KEY: &str = "app.kubernetes.io/component";
pub const PART_OF_KEY: &str = "app.kubernetes.io/part-of";
pub const MANAGED_BY_KEY: &str = "app.kubernetes.io/managed-by";

/// Assigns the labels carried by the objects the operator owns.
///
/// These labels describe the owned object itself. Pods are selected with the
/// cluster's own labels instead, see [`selector_labels`].
pub trait LabelPolicy: Send + Sync {
    /// # Errors
    ///
    /// - [`ResourceError::InvalidLabels`] if the resulting label set is not valid
    fn labels_for(
        &self,
        cluster: &Cluster,
    ) -> Result<BTreeMap<String, String>, Report<ResourceError>>;
}

/// Recommended `app.kubernetes.io` labels merged under the cluster's own labels.
///
/// Labels set on the cluster take precedence over the defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterLabels;

impl LabelPolicy for ClusterLabels {
    fn labels_for(
        &self,
        cluster: &Cluster,
    ) -> Result<BTreeMap<String, String>, Report<ResourceError>> {
        let mut labels = cluster.labels().clone();
        for (key, value) in [
            (NAME_KEY, "redpanda".to_string()),
            (INSTANCE_KEY, cluster.name_any()),
            (COMPONENT_KEY, "database".to_string()),
            (PART_OF_KEY, "redpanda".to_string()),
            (MANAGED_BY_KEY, "redpanda-operator".to_string()),
        ] {
            labels.entry(key.to_string()).or_insert(value);
        }
        validate(&labels)?;
        Ok(labels)
    }
}

/// The cluster's own labels, used for pod templates, selectors and scheduling terms.
///
/// # Errors
///
/// - [`ResourceError::InvalidLabels`] if a cluster label is not a valid label
pub fn selector_labels(
    cluster: &Cluster,
) -> Result<BTreeMap<String, String>, Report<ResourceError>> {
    let labels = cluster.labels().clone();
    validate(&labels)?;
    Ok(labels)
}

/// Check keys and values against Kubernetes label syntax.
///
/// # Errors
///
/// - [`ResourceError::InvalidLabels`] naming the first offending key or value
pub fn validate(labels: &BTreeMap<String, String>) -> Result<(), Report<ResourceError>> {
    for (key, value) in labels {
        let (prefix, name) = match key.split_once('/') {
            Some((prefix, name)) => (Some(prefix), name),
            None => (None, key.as_str()),
        };
        if let Some(prefix) = prefix {
            if !is_dns_subdomain(prefix) {
                return Err(invalid(format!("key {key:?} has an invalid prefix")));
            }
        }
        if name.is_empty() || !is_label_value(name) {
            return Err(invalid(format!("key {key:?} has an invalid name")));
        }
        if !is_label_value(value) {
            return Err(invalid(format!("value {value:?} of key {key:?} is invalid")));
        }
    }
    Ok(())
}

/// Empty, or up to 63 alphanumerics, '-', '_' and '.', starting and ending alphanumeric.
fn is_label_value(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    value.len() <= 63
        && value.starts_with(|c: char| c.is_ascii_alphanumeric())
        && value.ends_with(|c: char| c.is_ascii_alphanumeric())
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn is_dns_subdomain(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 253
        && value.split('.').all(|part| {
            !part.is_empty()
                && part.len() <= 63
                && part.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
                && part.ends_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        })
}

fn invalid(message: String) -> Report<ResourceError> {
    Report::new(ResourceError::InvalidLabels { message })
}
