//! Ledger gateway.
//!
//! Fronts one channel of a permissioned ledger network with a small HTTP API.
//!
//! # Architecture Overview
//!
//! ```text
//!   HTTP client
//!       │  POST /v1/transactions, GET /v1/transactions/{id}
//!       ▼
//!   http::GatewayServer ──▶ client::ChannelClient
//!                               │
//!                               ├──▶ channel::ChannelBuilder     (once: join or create)
//!                               ├──▶ proposal::ProposalDispatcher (fan-out to peers)
//!                               └──▶ commit::CommitCoordinator    (orderers + commit wait)
//!                                         │
//!                                         ▼
//!                               network::RemoteTransport ──▶ peers / orderers
//!
//!   cross-cutting: config · registry · identity · observability · lifecycle
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use ledger_gateway::config::load_config;
use ledger_gateway::http::GatewayServer;
use ledger_gateway::identity::FileCredentialProvider;
use ledger_gateway::lifecycle::{shutdown_signal, Shutdown};
use ledger_gateway::network::RemoteTransport;
use ledger_gateway::observability::{logging, metrics};
use ledger_gateway::registry::OrganizationRegistry;
use ledger_gateway::ChannelClient;

#[derive(Parser)]
#[command(name = "ledger-gateway")]
#[command(about = "HTTP gateway submitting transactions to a permissioned ledger channel", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config/gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Arc::new(load_config(&args.config)?);

    logging::init_logging(&config.observability);
    tracing::info!("ledger-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        org = %config.client.org,
        channel = %config.client.channel,
        chaincode = %config.client.chaincode,
        tls = config.sdk.tls,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut registry = OrganizationRegistry::from_config(&config)?;
    if config.credentials.load_peer_admins {
        let provider = FileCredentialProvider::new(config.credentials.crypto_root.clone());
        registry.load_peer_admins(&provider)?;
    }

    let transport = RemoteTransport::new(config.sdk.proposal_wait())?;
    let shutdown = Shutdown::new();
    let client = ChannelClient::new(config.clone(), Arc::new(registry), Arc::new(transport))
        .with_shutdown(shutdown.clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = GatewayServer::new(Arc::new(client), &config.listener);

    let signals = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signals.trigger();
    });

    server.run(listener, shutdown).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
