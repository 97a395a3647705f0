//! Controller loop driving [`StatefulSetResource`] passes for every `Cluster`.
//!
//! The kube runtime serializes reconciles per object, so at most one pass runs for a
//! given cluster at a time. Retries and periodic resyncs are expressed as requeue
//! actions; a pass itself never retries.

use std::sync::Arc;
use std::time::Duration;

use api_types::Cluster;
use error_stack::Report;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::runtime::controller::Action;
use kube::runtime::watcher;
use kube::runtime::Controller;
use kube::Api;
use kube::Client;
use kube::ResourceExt;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::RunArgs;
use crate::resources::EnsureOutcome;
use crate::resources::KubeStatefulSets;
use crate::resources::ObjectKey;
use crate::resources::Resource;
use crate::resources::ResourceError;
use crate::resources::StatefulSetResource;
use crate::resources::SynthesisPolicy;

/// Errors returned from a reconcile to the kube runtime.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Cluster is missing {0}")]
    MissingObjectKey(&'static str),
    #[error("Failed to get Cluster {key}")]
    ClusterGet {
        key: ObjectKey,
        #[source]
        source: kube::Error,
    },
    #[error("Failed to reconcile {key}: {report:?}")]
    Reconcile {
        key: ObjectKey,
        report: Report<ResourceError>,
    },
}

/// State shared by every reconcile.
pub struct Context {
    pub client: Client,
    pub policy: Arc<SynthesisPolicy>,
    pub requeue_interval: Duration,
    pub error_requeue: Duration,
}

impl Context {
    pub fn new(client: Client, args: &RunArgs) -> Self {
        Self {
            client,
            policy: Arc::new(args.synthesis_policy()),
            requeue_interval: args.requeue_interval(),
            error_requeue: args.error_requeue(),
        }
    }
}

/// Run the controller until a termination signal arrives.
pub async fn run(client: Client, args: &RunArgs) {
    let (clusters, statefulsets) = match &args.namespace {
        Some(ns) => (
            Api::<Cluster>::namespaced(client.clone(), ns),
            Api::<StatefulSet>::namespaced(client.clone(), ns),
        ),
        None => (
            Api::<Cluster>::all(client.clone()),
            Api::<StatefulSet>::all(client.clone()),
        ),
    };

    info!(namespace = ?args.namespace, "Starting cluster controller");

    Controller::new(clusters, watcher::Config::default())
        .owns(statefulsets, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, Arc::new(Context::new(client, args)))
        .for_each(|res| async move {
            match res {
                Ok((obj, action)) => debug!("reconciled {obj}: {action:?}"),
                Err(e) => warn!("reconcile failed: {e}"),
            }
        })
        .await;

    info!("Cluster controller terminated");
}

/// Run one convergence pass for `cluster`.
#[tracing::instrument(skip(cluster, ctx), fields(cluster = %cluster.name_any()))]
async fn reconcile(cluster: Arc<Cluster>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let name = cluster
        .metadata
        .name
        .as_deref()
        .ok_or(ControllerError::MissingObjectKey(".metadata.name"))?;
    let namespace = cluster
        .metadata
        .namespace
        .as_deref()
        .ok_or(ControllerError::MissingObjectKey(".metadata.namespace"))?;
    let key = ObjectKey::new(namespace, name);

    // The cached object may be stale; act on the latest spec only.
    let api = Api::<Cluster>::namespaced(ctx.client.clone(), namespace);
    let Some(cluster) = api
        .get_opt(name)
        .await
        .map_err(|source| ControllerError::ClusterGet {
            key: key.clone(),
            source,
        })?
    else {
        info!("{key} not found, end reconcile");
        return Ok(Action::await_change());
    };

    if cluster.metadata.deletion_timestamp.is_some() {
        debug!("{key} is being deleted, owned StatefulSet is garbage collected");
        return Ok(Action::await_change());
    }

    let mut statefulset = StatefulSetResource::new(
        KubeStatefulSets::new(ctx.client.clone()),
        Arc::new(cluster),
        ctx.policy.clone(),
    );
    let outcome = statefulset
        .ensure()
        .await
        .map_err(|report| ControllerError::Reconcile {
            key: key.clone(),
            report,
        })?;

    match outcome {
        EnsureOutcome::Created => info!("Created StatefulSet {key}"),
        EnsureOutcome::Scaled { from, to } => {
            info!("Scaled StatefulSet {key} from {from} to {to} replicas")
        }
        EnsureOutcome::Converged => debug!("StatefulSet {key} converged"),
    }

    Ok(Action::requeue(ctx.requeue_interval))
}

/// The controller triggers this on reconcile errors
fn error_policy(cluster: Arc<Cluster>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    warn!(
        cluster = %cluster.name_any(),
        "Reconcile failed due to error: {error}"
    );
    Action::requeue(ctx.error_requeue)
}
