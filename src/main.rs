//! lfs-gateway -- Git LFS server backed by object storage.
//!
//! Stateless by construction: the storage bucket is the single source of
//! truth, so every startup is a clean start and shutdown needs no
//! cleanup. SIGTERM/SIGINT handlers only stop accepting connections and
//! let in-flight requests drain.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use lfs_gateway::auth::{static_credential_check, AuthHook};
use lfs_gateway::config::LoggingConfig;
use lfs_gateway::locator::ScopePath;
use lfs_gateway::storage::backend::ObjectStore;

/// Command-line arguments for the lfs-gateway server.
#[derive(Parser, Debug)]
#[command(
    name = "lfs-gateway",
    version,
    about = "Git LFS server backed by object storage"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "lfs-gateway.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = lfs_gateway::config::load_config(&cli.config)?;
    init_tracing(&config.logging);
    info!("Loaded configuration from {}", cli.config);

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    // Initialize Prometheus metrics recorder and register metric descriptions.
    lfs_gateway::metrics::init_metrics();
    lfs_gateway::metrics::describe_metrics();
    info!("Prometheus metrics initialized");

    // The scope template decides where the LFS routes mount and how the
    // project scope is extracted from request paths.
    let scope_path = ScopePath::parse(&config.server.scope_path)?;
    info!("LFS endpoints mounted under {}", config.server.scope_path);

    // Initialize the storage backend based on config.
    let url_expiry = Duration::from_secs(config.storage.url_expiry_seconds);
    let storage: Arc<dyn ObjectStore> = match config.storage.backend.as_str() {
        "memory" => {
            let memory_config = config.storage.memory.clone().unwrap_or_default();
            info!(
                "Memory object store initialized: endpoint={}",
                memory_config.endpoint
            );
            Arc::new(lfs_gateway::storage::memory::MemoryObjectStore::new(
                &memory_config.endpoint,
                url_expiry,
            ))
        }
        "aws" | _ => {
            let aws_config = config.storage.aws.as_ref().ok_or_else(|| {
                anyhow::anyhow!("storage.backend is 'aws' but storage.aws config section is missing")
            })?;
            Arc::new(lfs_gateway::storage::aws::AwsObjectStore::new(aws_config, url_expiry).await?)
        }
    };

    // Register the built-in credential check when a pair is configured;
    // otherwise the gateway runs in open-access mode.
    let auth = AuthHook::new();
    if config.auth.has_credentials() {
        auth.register(static_credential_check(
            config.auth.username.clone(),
            config.auth.password.clone(),
        ));
        info!("Basic authentication enabled for user {}", config.auth.username);
    } else {
        info!("No credentials configured; running in open-access mode");
    }

    let state = Arc::new(lfs_gateway::AppState {
        config: config.clone(),
        scope_path,
        storage,
        auth,
    });

    let app = lfs_gateway::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("lfs-gateway listening on {}", bind_addr);

    // Graceful shutdown: on SIGTERM/SIGINT, stop accepting new connections
    // and wait for in-flight requests to complete.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("lfs-gateway shut down");

    Ok(())
}

/// Initialize tracing from the logging config; `RUST_LOG` wins when set.
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(logging.level.clone()));

    if logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
