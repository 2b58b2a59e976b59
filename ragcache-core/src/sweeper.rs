//! Background TTL sweeper.
//!
//! A long-lived tokio task that periodically expires entries and flushes
//! stats. It acquires the same per-layer writer locks as foreground stores,
//! in short bursts, so lookups are never starved.

use crate::cache::SemanticCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle to a running TTL sweep task.
///
/// Dropping the handle detaches the task; call
/// [`shutdown`](TtlSweeper::shutdown) for a graceful stop.
pub struct TtlSweeper {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl TtlSweeper {
    /// Start sweeping `cache` at its configured interval.
    #[must_use]
    pub fn start(cache: Arc<SemanticCache>) -> Self {
        Self::with_interval(cache, None)
    }

    /// Start sweeping with an explicit interval (overrides configuration).
    #[must_use]
    pub fn with_interval(cache: Arc<SemanticCache>, interval: Option<Duration>) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let period = interval.unwrap_or(cache.config().ttl_sweep_interval);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick fires immediately; skip it so a fresh cache is
            // not swept before it has seen any traffic.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = cache.sweep_expired().await {
                            warn!(error = %e, "ttl sweep failed");
                        }
                        if let Err(e) = cache.flush_daily_stats().await {
                            warn!(error = %e, "stats flush failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("ttl sweeper shutting down");
                        break;
                    }
                }
            }
        });

        Self {
            handle,
            shutdown_tx,
        }
    }

    /// Stop the sweep task and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}
