mod accept_stream;
mod formatter;
mod handlers;
mod metrics;
mod poller;
mod rpc_client;
mod server_loop;
mod types;

use crate::types::GenericBoxedStream;
use accept_stream::tcp_accept_stream;
use clap::Parser;
use handlers::handle_connection;
use metrics::{new_store, MetricsStore};
use rpc_client::{PeerSource, RpcClient};
use server_loop::{serve_stream, shutdown_channel, ShutdownReceiver};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    net::{TcpListener, TcpStream},
    signal,
    sync::watch,
    task,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_RPC_URL: &str = "http://geth.ethereum.svc.cluster.local:8545";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Args {
    /// JSON-RPC endpoint of the node to watch
    #[arg(long, env = "GETH_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
    #[arg(long, env = "METRICS_HOST", default_value = "0.0.0.0")]
    host: String,
    #[arg(long, env = "METRICS_PORT", default_value = "8080")]
    port: u16,
    #[arg(
        long,
        env = "POLL_INTERVAL_SECS",
        default_value = "10",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Peer polling interval, in seconds"
    )]
    poll_interval: u64,
    #[arg(
        long,
        env = "RPC_TIMEOUT_SECS",
        default_value = "10",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Timeout for each admin_peers call, in seconds"
    )]
    rpc_timeout: u64,
}

impl Args {
    // an exported but empty GETH_RPC_URL means "use the default"
    fn rpc_url(&self) -> &str {
        if self.rpc_url.trim().is_empty() {
            DEFAULT_RPC_URL
        } else {
            self.rpc_url.trim()
        }
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let args = Args::parse();

    let client = match RpcClient::connect(args.rpc_url(), Duration::from_secs(args.rpc_timeout)) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to connect to Geth: {}", e);
            return Err(e.into());
        }
    };
    info!("Watching node at {}", client.endpoint());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to start metrics server on {}: {}", addr, e);
            return Err(e.into());
        }
    };

    let store = new_store();
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let server_handle = tokio::spawn(run_metrics_server(
        listener,
        store.clone(),
        shutdown_rx.clone(),
    ));

    let source: Arc<dyn PeerSource> = Arc::new(client);
    let poller_handle = tokio::spawn(poller::run_poller(
        source,
        store,
        Duration::from_secs(args.poll_interval),
        shutdown_rx,
    ));

    tokio::spawn(forward_interrupt(shutdown_tx));

    // Wait for both the server and the poller to exit
    tokio::try_join!(server_handle, poller_handle)?;

    Ok(())
}

// The request stays visible to tasks that start listening after it was sent
async fn forward_interrupt(shutdown: watch::Sender<bool>) {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    shutdown.send_replace(true);
}

async fn run_metrics_server(listener: TcpListener, store: MetricsStore, shutdown: ShutdownReceiver) {
    match listener.local_addr() {
        Ok(addr) => info!("Starting metrics server on {}", addr),
        Err(e) => error!("Metrics listener has no local address: {}", e),
    }

    let stream: GenericBoxedStream<(TcpStream, SocketAddr)> =
        Box::pin(tcp_accept_stream(listener));

    serve_stream(stream, shutdown, move |(stream, _addr)| {
        let store = store.clone();
        task::spawn(async move {
            handle_connection(stream, store).await;
        })
    })
    .await;

    info!("Metrics server exited");
}
