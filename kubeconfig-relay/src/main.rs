use anyhow::{Context, Result};
use clap::Parser;
use kubeconfig_relay::config::{ConfigOverrides, RelayConfig};
use kubeconfig_relay::docker::DockerInventory;
use kubeconfig_relay::kubernetes::{self, watch, KubeSecretStore};
use kubeconfig_relay::shutdown::ShutdownCoordinator;
use kubeconfig_relay::{logging, SecretSync, SyncSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Rewrites cluster kubeconfig secrets to reach the API server through a
/// Docker load balancer host port
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Absolute path to the kubeconfig file; in-cluster credentials when omitted
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Docker host address
    #[arg(long)]
    host: Option<String>,

    /// Namespace to watch
    #[arg(short, long)]
    namespace: Option<String>,

    /// Suffix appended to the cluster name for the mutated kubeconfig secret
    #[arg(long)]
    suffix: Option<String>,

    /// Disable TLS verification in mutated kubeconfigs
    #[arg(long)]
    disable_tls_verify: Option<bool>,

    /// Docker API port
    #[arg(long)]
    docker_port: Option<u16>,

    /// Deadline for each Docker and Kubernetes call, in seconds
    #[arg(long)]
    call_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Print a sample configuration file and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            kubeconfig: self.kubeconfig.clone(),
            host: self.host.clone(),
            namespace: self.namespace.clone(),
            suffix: self.suffix.clone(),
            disable_tls_verify: self.disable_tls_verify,
            docker_port: self.docker_port,
            call_timeout_secs: self.call_timeout,
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", RelayConfig::generate_sample());
        return Ok(());
    }

    let config = RelayConfig::load(cli.config.as_deref(), &cli.overrides())
        .context("Failed to load configuration")?;

    let _log_guard = logging::init(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        return Err(anyhow::anyhow!("Invalid configuration: {}", e));
    }
    let config = Arc::new(config);

    let inventory = DockerInventory::connect(&config.docker_endpoint(), config.call_timeout())
        .await
        .with_context(|| format!("Failed to connect to Docker at {}", config.docker_endpoint()))?;

    let client = kubernetes::connect(config.kubeconfig.as_deref())
        .await
        .context("Failed to build Kubernetes client")?;
    let store = KubeSecretStore::new(client, &config.namespace);

    let stream = watch::open_secret_watch(store.api())
        .await
        .with_context(|| format!("Failed to watch secrets in namespace {}", config.namespace))?;

    info!(
        "Watching namespace {} for kubeconfig secrets (suffix {}, tls verification {})",
        config.namespace,
        config.suffix,
        if config.disable_tls_verify { "disabled" } else { "enabled" }
    );

    let coordinator = ShutdownCoordinator::new();
    let signal_coordinator = coordinator.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_coordinator.wait_for_signal().await {
            error!("Failed to install signal handlers: {}", e);
        }
    });

    let (tx, rx) = mpsc::channel(config.event_buffer);
    let pump = tokio::spawn(watch::pump_events(stream, tx, coordinator.subscribe()));

    let sync = SecretSync::new(SyncSettings::from(config.as_ref()), store, inventory);
    let stats = sync.run(rx, coordinator.subscribe()).await;

    // The loop may exit first on shutdown; stop the pump as well
    coordinator.shutdown();
    let forwarded = pump.await.unwrap_or_default();

    info!(
        "Sync loop finished: {} events forwarded, {} processed, {} created, {} updated, {} deleted, {} failed",
        forwarded, stats.received, stats.created, stats.updated, stats.deleted, stats.failed
    );

    Ok(())
}
