use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap::Subcommand;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use utils::version;

use crate::resources::policy::DEFAULT_MEMORY;
use crate::resources::policy::DEFAULT_STORAGE;
use crate::resources::SynthesisPolicy;

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the cluster controller
    Run(RunArgs),
    /// Print the Cluster CustomResourceDefinition as YAML
    Crd,
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (defaults to cluster config or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        env = "WATCH_NAMESPACE",
        help = "Kubernetes namespace to watch for clusters (empty for all namespaces)"
    )]
    pub namespace: Option<String>,

    #[arg(
        long,
        default_value = "300",
        help = "Seconds between periodic reconciliations of a converged cluster"
    )]
    pub requeue_interval_secs: u64,

    #[arg(
        long,
        default_value = "10",
        help = "Seconds to wait before retrying a failed reconciliation"
    )]
    pub error_requeue_secs: u64,

    #[arg(
        long,
        env = "REDPANDA_DEFAULT_MEMORY",
        default_value = DEFAULT_MEMORY,
        help = "Broker memory used when a cluster declares no memory limit"
    )]
    pub default_memory: String,

    #[arg(
        long,
        env = "REDPANDA_DEFAULT_STORAGE",
        default_value = DEFAULT_STORAGE,
        help = "Capacity requested by each broker's data volume claim"
    )]
    pub default_storage: String,
}

impl RunArgs {
    pub fn synthesis_policy(&self) -> SynthesisPolicy {
        SynthesisPolicy {
            default_memory: Quantity(self.default_memory.clone()),
            default_storage: Quantity(self.default_storage.clone()),
            ..SynthesisPolicy::default()
        }
    }

    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_interval_secs)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }
}
