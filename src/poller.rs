use crate::formatter::format_snapshot;
use crate::metrics::{MetricsStore, PeerMetrics};
use crate::rpc_client::{PeerSource, RemoteQueryError};
use crate::server_loop::{shutdown_requested, ShutdownReceiver};
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

#[derive(Debug)]
pub enum CycleOutcome {
    /// The gauge now holds this peer count.
    Updated(usize),
    /// The gauge was left untouched.
    Failed(RemoteQueryError),
}

/// Run one polling cycle: query the node, publish the count, log the snapshot.
///
/// On failure the gauge keeps its previous value and nothing is rendered.
pub async fn poll_once(source: &dyn PeerSource, metrics: &PeerMetrics) -> CycleOutcome {
    match source.fetch_peers().await {
        Ok(peers) => {
            metrics.set_peer_count(peers.len());
            debug!("Peer count updated to {}", peers.len());
            info!("\n{}", format_snapshot(&peers, Local::now().naive_local()));
            CycleOutcome::Updated(peers.len())
        }
        Err(e) => {
            error!("Error fetching peers: {}", e);
            CycleOutcome::Failed(e)
        }
    }
}

/// Poll on a fixed cadence until shutdown is requested.
///
/// Ticks stay on a fixed grid anchored at the first tick rather than being
/// chained after each call. A call that overruns the period makes the next
/// tick start right after it returns, after which ticks fall back onto the
/// original grid.
pub async fn run_poller(
    source: Arc<dyn PeerSource>,
    metrics: MetricsStore,
    period: Duration,
    shutdown: ShutdownReceiver,
) {
    info!("Starting peer monitoring every {:?}", period);

    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown_signal = shutdown_requested(shutdown);
    tokio::pin!(shutdown_signal);

    loop {
        tokio::select! {
            _ = async {
                ticker.tick().await;
                poll_once(source.as_ref(), &metrics).await;
            } => {}
            _ = &mut shutdown_signal => {
                info!("Poller: shutdown signal received");
                break;
            }
        }
    }

    info!("Poller exited");
}
