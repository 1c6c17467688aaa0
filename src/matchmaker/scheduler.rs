//! Periodic driver for the matchmaker sweep

use crate::matchmaker::sweep::{Matchmaker, TickOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Runs [`Matchmaker::run_tick`] on a fixed interval until told to stop
pub struct MatchmakerScheduler {
    matchmaker: Arc<Matchmaker>,
    interval: Duration,
}

impl MatchmakerScheduler {
    pub fn new(matchmaker: Arc<Matchmaker>, interval: Duration) -> Self {
        Self {
            matchmaker,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the loop. It exits once `shutdown` fires or its sender is dropped.
    ///
    /// The first sweep runs one full interval after spawning. Ticks that
    /// fall behind are skipped rather than bunched up. A sweep in flight
    /// always finishes before the loop exits.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut ticker = tokio::time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                "Matchmaker started ({}ms interval)",
                self.interval.as_millis()
            );

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => {
                        info!("Matchmaker stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        // Failed sweeps are logged by run_tick
                        if let Ok(TickOutcome::Completed(report)) = self.matchmaker.run_tick().await {
                            debug!(
                                "Sweep matched {} pairs, evicted {}",
                                report.matched_pairs.len(),
                                report.evicted
                            );
                        }
                    }
                }
            }
        })
    }
}
