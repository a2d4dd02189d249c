//! Condor Operator - CRD-driven Kubernetes operator for HTCondor pools

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use condor_operator::bootstrap::TokenBootstrap;
use condor_operator::controller::{error_policy, reconcile, Context};
use condor_operator::crd::CondorCluster;
use condor_operator::jobset::JobSet;
use condor_operator::template::ScriptEngine;

/// Condor Operator - runs HTCondor pools as JobSets
#[derive(Parser, Debug)]
#[command(name = "condor-operator", version, about, long_about = None)]
struct Cli {
    /// Generate the CondorCluster CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Log output format
    #[arg(
        long,
        env = "CONDOR_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text,
        global = true
    )]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches CondorCluster records and materializes each one as an
    /// entrypoint ConfigMap, a headless Service and a JobSet.
    Controller(ControllerArgs),

    /// Mint the pool token for one cluster and print it
    ///
    /// Starts (or reuses) the token helper Pod and reads the token from its log.
    Token(TokenArgs),
}

/// Controller mode arguments
#[derive(Parser, Debug)]
struct ControllerArgs {
    /// Only watch this namespace (all namespaces when unset)
    #[arg(long, env = "CONDOR_NAMESPACE")]
    namespace: Option<String>,

    /// Seconds before re-checking a record after creating objects
    #[arg(long, env = "CONDOR_REQUEUE_SECS", default_value = "5")]
    requeue_secs: u64,

    /// Seconds between periodic resyncs of converged records
    #[arg(long, env = "CONDOR_RESYNC_SECS", default_value = "300")]
    resync_secs: u64,

    /// Seconds before retrying after a transient error
    #[arg(long, env = "CONDOR_ERROR_REQUEUE_SECS", default_value = "30")]
    error_requeue_secs: u64,
}

/// Token mode arguments
#[derive(Parser, Debug)]
struct TokenArgs {
    /// CondorCluster name
    #[arg(long)]
    name: String,

    /// CondorCluster namespace
    #[arg(long, env = "CONDOR_NAMESPACE", default_value = "default")]
    namespace: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let registry = tracing_subscriber::registry().with(EnvFilter::from_default_env());
    match cli.log_format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }

    if cli.crd {
        let crd = serde_yaml::to_string(&CondorCluster::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    let command = cli
        .command
        .unwrap_or_else(|| Commands::Controller(ControllerArgs::parse_from(["controller"])));
    match command {
        Commands::Token(args) => run_token(args).await,
        Commands::Controller(args) => run_controller(args).await,
    }
}

/// Run the CondorCluster controller until SIGINT/SIGTERM
async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let ctx = Arc::new(
        Context::builder(client.clone())
            .requeue_after(Duration::from_secs(args.requeue_secs))
            .resync_after(Duration::from_secs(args.resync_secs))
            .error_requeue_after(Duration::from_secs(args.error_requeue_secs))
            .build()?,
    );

    let (clusters, jobsets): (Api<CondorCluster>, Api<JobSet>) = match &args.namespace {
        Some(ns) => (
            Api::namespaced(client.clone(), ns),
            Api::namespaced(client, ns),
        ),
        None => (Api::all(client.clone()), Api::all(client)),
    };

    tracing::info!(
        namespace = args.namespace.as_deref().unwrap_or("*"),
        "Starting CondorCluster controller"
    );

    Controller::new(clusters, WatcherConfig::default())
        .owns(jobsets, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "Cluster reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Cluster reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("Controller stopped");
    Ok(())
}

/// Run one token bootstrap and print the token
async fn run_token(args: TokenArgs) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let clusters: Api<CondorCluster> = Api::namespaced(client.clone(), &args.namespace);
    let cluster = clusters.get(&args.name).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to get CondorCluster {}/{}: {}",
            args.namespace,
            args.name,
            e
        )
    })?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let bootstrap = TokenBootstrap::from_client(client, Arc::new(ScriptEngine::new()?));
    let token = bootstrap.obtain(&cluster, &cancel).await?;
    println!("{token}");
    Ok(())
}
