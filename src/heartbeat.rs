use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::gateway::Gateway;
use crate::pool::Connector;
use crate::store::Stores;

/// Logs chat-server load and pool occupancy every `period` until `shutdown`
/// fires.
pub async fn run<S: Connector, K: Connector>(
    period: Duration,
    gateway: Arc<Gateway>,
    stores: Arc<Stores<S, K>>,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // First tick completes immediately; skip it so the first report comes one
    // period after startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => report(&gateway, &stores),
        }
    }

    info!("heartbeat stopped");
}

fn report<S: Connector, K: Connector>(gateway: &Gateway, stores: &Stores<S, K>) {
    for server in gateway.registry().snapshot() {
        info!(
            "chat server {} ({}:{}) load {}",
            server.name, server.host, server.port, server.load
        );
    }

    for stats in stores.stats() {
        info!(
            "pool {}: {} idle, {} checked out, {} pending of {}{}",
            stats.name,
            stats.idle,
            stats.checked_out,
            stats.pending,
            stats.capacity,
            if stats.closed { " (closed)" } else { "" }
        );
    }

    info!("{} session tokens on file", gateway.tokens().len());
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
