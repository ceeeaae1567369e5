//! rerouter-background: owns rule storage and the redirect engine, and
//! answers settings-client requests over the bridge.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use rerouter_background::{BadgeIndicator, Handler};
use rerouter_bridge::{BridgeServer, RequestReceiver, Transport};
use rerouter_core::config::{self, StorageBackendKind};
use rerouter_core::Config;
use rerouter_rules::{InMemoryEngine, RuleService, RuleStore};
use rerouter_storage::KvStore;

/// Background process for the rerouter URL redirector.
#[derive(Parser, Debug)]
#[command(name = "rerouter-background", version, about)]
struct Cli {
    /// Bridge endpoint to bind (`ipc://<path>` or `tcp://<host>:<port>`).
    #[arg(long, env = "BRIDGE_ENDPOINT")]
    endpoint: Option<String>,

    /// Directory holding persisted rule state.
    #[arg(long, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Storage backend: `local` or `memory`.
    #[arg(long, env = "STORAGE_BACKEND")]
    backend: Option<StorageBackendKind>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(endpoint) = cli.endpoint {
        config.bridge.endpoint = endpoint;
    }
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(backend) = cli.backend {
        config.storage.backend = backend;
    }
    config.log_summary();

    let kv = KvStore::from_config(&config.storage).context("failed to open rule storage")?;
    if !kv.backend().is_durable() {
        warn!("memory storage backend: rules are lost when this process exits");
    }

    let service = Arc::new(RuleService::new(
        RuleStore::new(kv),
        Arc::new(InMemoryEngine::new()),
    ));
    let handler = Handler::new(service, Arc::new(BadgeIndicator::new()));

    match handler.start().await {
        Ok(active) => info!(active, "initial rule set installed"),
        Err(e) => error!(error = %e, "initial rebuild failed; continuing with empty rule set"),
    }

    let transport: Transport = config
        .bridge
        .endpoint
        .parse()
        .context("invalid bridge endpoint")?;
    let server = BridgeServer::bind(&transport)
        .await
        .with_context(|| format!("failed to bind {transport}"))?;
    info!(endpoint = %transport, "rerouter background ready");

    loop {
        tokio::select! {
            result = server.recv_request() => {
                let (token, msg) = match result {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "dropping unreadable request");
                        continue;
                    }
                };
                let response = handler.handle_message(&msg).await;
                if let Err(e) = server.respond(token, msg.correlation_id, &response).await {
                    warn!(error = %e, topic = %msg.topic, "failed to send reply");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    transport
        .remove_stale_socket()
        .context("failed to remove IPC socket")?;
    Ok(())
}
