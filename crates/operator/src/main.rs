use anyhow::Result;
use api_types::Cluster;
use clap::Parser;
use kube::CustomResourceExt;
use redpanda_operator::config::Cli;
use redpanda_operator::config::Commands;
use redpanda_operator::config::RunArgs;
use redpanda_operator::controller;
use redpanda_operator::kube_client;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(run_args) => run_controller(run_args).await,
        Commands::Crd => print_crd(),
    }
}

async fn run_controller(run_args: RunArgs) -> Result<()> {
    utils::logging::init();

    tracing::info!("Starting redpanda operator {}", &**version::VERSION);

    let client = kube_client::connect(run_args.kubeconfig.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;

    controller::run(client, &run_args).await;

    Ok(())
}

fn print_crd() -> Result<()> {
    print!("{}", serde_yaml::to_string(&Cluster::crd())?);
    Ok(())
}
