//! Broker StatefulSet synthesis and convergence.

use std::collections::BTreeMap;
use std::sync::Arc;

use api_types::Cluster;
use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::apps::v1::StatefulSetSpec;
use k8s_openapi::api::apps::v1::StatefulSetUpdateStrategy;
use k8s_openapi::api::core::v1::Affinity;
use k8s_openapi::api::core::v1::ConfigMapVolumeSource;
use k8s_openapi::api::core::v1::Container;
use k8s_openapi::api::core::v1::ContainerPort;
use k8s_openapi::api::core::v1::EmptyDirVolumeSource;
use k8s_openapi::api::core::v1::EnvVar;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::api::core::v1::PersistentVolumeClaimSpec;
use k8s_openapi::api::core::v1::PersistentVolumeClaimVolumeSource;
use k8s_openapi::api::core::v1::PodAffinityTerm;
use k8s_openapi::api::core::v1::PodAntiAffinity;
use k8s_openapi::api::core::v1::PodSecurityContext;
use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::api::core::v1::PodTemplateSpec;
use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::api::core::v1::TopologySpreadConstraint;
use k8s_openapi::api::core::v1::Volume;
use k8s_openapi::api::core::v1::VolumeMount;
use k8s_openapi::api::core::v1::WeightedPodAffinityTerm;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::debug;
use tracing::info;

use super::config_map_key;
use super::labels::selector_labels;
use super::ownership::set_controller_reference;
use super::quantity::canonical_binary;
use super::ClusterLabels;
use super::EnsureOutcome;
use super::ImageReference;
use super::LabelPolicy;
use super::ObjectKey;
use super::Resource;
use super::ResourceError;
use super::StatefulSetStore;
use super::SynthesisPolicy;

const KIND: &str = "StatefulSet";

/// Replica count the API server assumes when `spec.replicas` is unset.
pub const DEFAULT_REPLICAS: i32 = 1;

const DATA_VOLUME: &str = "datadir";
const CONFIG_MAP_VOLUME: &str = "configmap-dir";
const CONFIG_VOLUME: &str = "config-dir";

const HOSTNAME_TOPOLOGY_KEY: &str = "kubernetes.io/hostname";
const ZONE_TOPOLOGY_KEY: &str = "topology.kubernetes.io/zone";

/// Manages the StatefulSet running the brokers of one `Cluster`.
///
/// A fresh StatefulSet is always created with a single replica; later passes of
/// [`Resource::ensure`] scale it to the declared count. Only the replica count is
/// reconciled once the object exists.
pub struct StatefulSetResource<S, L = ClusterLabels> {
    store: S,
    cluster: Arc<Cluster>,
    policy: Arc<SynthesisPolicy>,
    labels: L,

    /// Object last read from or written to the API server. Overwritten on every
    /// pass; a cache for callers, not a source of truth.
    pub last_observed_state: Option<StatefulSet>,
}

impl<S: StatefulSetStore> StatefulSetResource<S> {
    pub fn new(store: S, cluster: Arc<Cluster>, policy: Arc<SynthesisPolicy>) -> Self {
        Self::with_labels(store, cluster, policy, ClusterLabels)
    }
}

impl<S: StatefulSetStore, L: LabelPolicy> StatefulSetResource<S, L> {
    pub fn with_labels(
        store: S,
        cluster: Arc<Cluster>,
        policy: Arc<SynthesisPolicy>,
        labels: L,
    ) -> Self {
        Self {
            store,
            cluster,
            policy,
            labels,
            last_observed_state: None,
        }
    }
}

#[async_trait]
impl<S: StatefulSetStore, L: LabelPolicy> Resource for StatefulSetResource<S, L> {
    type Object = StatefulSet;

    /// Run one convergence pass.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::Read`] if the StatefulSet cannot be read for any reason other
    ///   than being absent
    /// - synthesis errors when the StatefulSet is absent, before anything is written
    /// - [`ResourceError::Create`] / [`ResourceError::Update`] if the write is rejected
    #[tracing::instrument(skip(self))]
    async fn ensure(&mut self) -> Result<EnsureOutcome, Report<ResourceError>> {
        let key = self.key();

        let fetched = self.store.get(&key).await;
        let mut sts = match fetched {
            Ok(sts) => sts,
            Err(report) if report.current_context().is_not_found() => {
                let obj = self.obj()?;
                info!(%key, "Creating StatefulSet");
                let created = self
                    .store
                    .create(&obj)
                    .await
                    .change_context(ResourceError::Create { kind: KIND, key })?;
                self.last_observed_state = Some(created);
                return Ok(EnsureOutcome::Created);
            }
            Err(report) => {
                return Err(report.change_context(ResourceError::Read { kind: KIND, key }));
            }
        };

        self.last_observed_state = Some(sts.clone());

        // unset counts are defaulted by the API server, compare the effective values
        let declared = self.cluster.spec.replicas.unwrap_or(DEFAULT_REPLICAS);
        let live = sts
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(DEFAULT_REPLICAS);
        if live == declared {
            debug!(%key, replicas = live, "StatefulSet replicas match cluster");
            return Ok(EnsureOutcome::Converged);
        }

        info!(%key, from = live, to = declared, "Scaling StatefulSet");
        sts.spec.get_or_insert_with(StatefulSetSpec::default).replicas = Some(declared);
        let updated = self
            .store
            .update(&sts)
            .await
            .change_context(ResourceError::Update { kind: KIND, key })
            .attach_printable("failed to update StatefulSet replicas")?;
        self.last_observed_state = Some(updated);

        Ok(EnsureOutcome::Scaled {
            from: live,
            to: declared,
        })
    }

    fn obj(&self) -> Result<StatefulSet, Report<ResourceError>> {
        synthesize(&self.cluster, &self.labels, &self.policy)
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::for_cluster(&self.cluster)
    }

    fn kind(&self) -> &'static str {
        KIND
    }
}

/// Build the complete desired StatefulSet for `cluster`.
///
/// The object's own labels come from `labels`, while the pod template, selector and
/// scheduling terms use the cluster's labels as they are.
///
/// # Errors
///
/// - [`ResourceError::InvalidImage`] if image and version cannot be joined unambiguously
/// - [`ResourceError::InvalidLabels`] if either label set is invalid
/// - [`ResourceError::Ownership`] if the owner reference cannot be set
pub fn synthesize(
    cluster: &Cluster,
    labels: &impl LabelPolicy,
    policy: &SynthesisPolicy,
) -> Result<StatefulSet, Report<ResourceError>> {
    let key = ObjectKey::for_cluster(cluster);
    let resource_labels = labels.labels_for(cluster)?;
    let pod_labels = selector_labels(cluster)?;
    let image = ImageReference::parse(&cluster.spec.image, &cluster.spec.version)?.to_string();

    let mut sts = StatefulSet {
        metadata: ObjectMeta {
            namespace: Some(key.namespace.clone()),
            name: Some(key.name.clone()),
            labels: Some(resource_labels),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec {
            replicas: Some(DEFAULT_REPLICAS),
            pod_management_policy: Some("Parallel".to_string()),
            selector: label_selector(&pod_labels),
            update_strategy: Some(StatefulSetUpdateStrategy {
                type_: Some("RollingUpdate".to_string()),
                rolling_update: None,
            }),
            service_name: key.name.clone(),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    name: Some(key.name.clone()),
                    namespace: Some(key.namespace.clone()),
                    labels: Some(pod_labels.clone()),
                    ..Default::default()
                }),
                spec: Some(pod_spec(cluster, &key, &image, &pod_labels, policy)),
            },
            volume_claim_templates: Some(vec![data_claim_template(&key, &pod_labels, policy)]),
            ..Default::default()
        }),
        status: None,
    };

    set_controller_reference(cluster, &mut sts.metadata)?;

    Ok(sts)
}

fn pod_spec(
    cluster: &Cluster,
    key: &ObjectKey,
    image: &str,
    pod_labels: &BTreeMap<String, String>,
    policy: &SynthesisPolicy,
) -> PodSpec {
    let endpoints = &cluster.spec.configuration;
    let resources = &cluster.spec.resources;

    PodSpec {
        security_context: Some(PodSecurityContext {
            fs_group: Some(policy.fs_group),
            ..Default::default()
        }),
        volumes: Some(vec![
            Volume {
                name: DATA_VOLUME.to_string(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: DATA_VOLUME.to_string(),
                    read_only: None,
                }),
                ..Default::default()
            },
            Volume {
                name: CONFIG_MAP_VOLUME.to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: Some(config_map_key(cluster).name),
                    default_mode: Some(policy.config_map_default_mode),
                    ..Default::default()
                }),
                ..Default::default()
            },
            Volume {
                name: CONFIG_VOLUME.to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            },
        ]),
        init_containers: Some(vec![Container {
            name: "redpanda-configurator".to_string(),
            image: Some(image.to_string()),
            command: Some(vec!["/bin/sh".to_string(), "-c".to_string()]),
            args: Some(vec![policy.configurator_path()]),
            volume_mounts: Some(vec![
                mount(CONFIG_VOLUME, &policy.config_dir),
                mount(CONFIG_MAP_VOLUME, &policy.configurator_dir),
            ]),
            ..Default::default()
        }]),
        containers: vec![Container {
            name: "redpanda".to_string(),
            image: Some(image.to_string()),
            args: Some(vec![
                "--check=false".to_string(),
                "--smp 1".to_string(),
                format!("--memory {}", memory_argument(resources, policy)),
                "start".to_string(),
                "--".to_string(),
                "--default-log-level=debug".to_string(),
                "--reserve-memory 0M".to_string(),
            ]),
            env: Some(vec![EnvVar {
                name: "REDPANDA_ENVIRONMENT".to_string(),
                value: Some("kubernetes".to_string()),
                value_from: None,
            }]),
            ports: Some(vec![
                port("admin", endpoints.admin_api.port),
                port("kafka", endpoints.kafka_api.port),
                port("rpc", endpoints.rpc_server.port),
            ]),
            resources: Some(ResourceRequirements {
                limits: resources.limits.clone(),
                requests: resources.requests.clone(),
                claims: None,
            }),
            volume_mounts: Some(vec![
                mount(DATA_VOLUME, &policy.data_directory),
                mount(CONFIG_VOLUME, &policy.config_dir),
            ]),
            ..Default::default()
        }],
        affinity: Some(anti_affinity(key, pod_labels)),
        topology_spread_constraints: Some(vec![TopologySpreadConstraint {
            max_skew: 1,
            topology_key: ZONE_TOPOLOGY_KEY.to_string(),
            when_unsatisfiable: "ScheduleAnyway".to_string(),
            label_selector: Some(label_selector(pod_labels)),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

/// Keep brokers of one cluster off a shared host, as a hard rule and as a maximum
/// weight preference.
fn anti_affinity(key: &ObjectKey, pod_labels: &BTreeMap<String, String>) -> Affinity {
    let term = PodAffinityTerm {
        label_selector: Some(label_selector(pod_labels)),
        namespaces: Some(vec![key.namespace.clone()]),
        topology_key: HOSTNAME_TOPOLOGY_KEY.to_string(),
        ..Default::default()
    };

    Affinity {
        pod_anti_affinity: Some(PodAntiAffinity {
            required_during_scheduling_ignored_during_execution: Some(vec![term.clone()]),
            preferred_during_scheduling_ignored_during_execution: Some(vec![
                WeightedPodAffinityTerm {
                    weight: 100,
                    pod_affinity_term: term,
                },
            ]),
        }),
        ..Default::default()
    }
}

fn data_claim_template(
    key: &ObjectKey,
    pod_labels: &BTreeMap<String, String>,
    policy: &SynthesisPolicy,
) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            namespace: Some(key.namespace.clone()),
            name: Some(DATA_VOLUME.to_string()),
            labels: Some(pod_labels.clone()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(ResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    policy.default_storage.clone(),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: None,
    }
}

/// Memory limit in the broker's `--memory` notation: the canonical `Gi` suffix becomes `G`.
fn memory_argument(resources: &ResourceRequirements, policy: &SynthesisPolicy) -> String {
    let memory = resources
        .limits
        .as_ref()
        .and_then(|limits| limits.get("memory"))
        .unwrap_or(&policy.default_memory);
    canonical_binary(&memory.0).replace("Gi", "G")
}

fn label_selector(labels: &BTreeMap<String, String>) -> LabelSelector {
    LabelSelector {
        match_labels: Some(labels.clone()),
        match_expressions: None,
    }
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

fn port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        ..Default::default()
    }
}
