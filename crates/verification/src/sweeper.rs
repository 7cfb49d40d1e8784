//! Periodic sweep of expired assets.
//!
//! Reads already delete expired rows before looking anything up, so nothing
//! depends on this loop running. It only keeps expired secrets from piling up
//! in the table between reads.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::MissedTickBehavior;

use crate::stores::AssetStore;

/// Sweep every `period` until `shutdown` resolves. Returns the number of
/// sweeps attempted. Failed sweeps are logged and retried on the next tick.
pub async fn run<F>(store: Arc<dyn AssetStore>, period: Duration, shutdown: F) -> u64
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut sweeps = 0;
    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                sweeps += 1;
                match store.clear_expired().await {
                    Ok(deleted) => tracing::info!(deleted, "expired verification assets swept"),
                    Err(err) => {
                        tracing::error!("sweep failed: {:?}", err);
                        sentry::capture_error(
                            err.as_ref() as &(dyn std::error::Error + Send + Sync + 'static)
                        );
                    }
                }
            }
        }
    }

    tracing::info!(sweeps, "sweeper stopped");
    sweeps
}
