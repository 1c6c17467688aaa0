//! Queue engine: the join, poll and drop operations
//!
//! Each operation reads one record, applies its change and writes it back
//! with compare-and-swap. The engine keeps no player state of its own.

use crate::error::{MatchmakingError, Result, StoreError};
use crate::metrics::MetricsCollector;
use crate::queue::context::EngineContext;
use crate::store::PlayerStore;
use crate::types::{Millis, Player, QueueState};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on re-reads when a poll races another writer
const MAX_POLL_ATTEMPTS: usize = 5;

/// Result of a queue operation as seen by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatus {
    pub state: QueueState,
    pub player: Option<Player>,
    /// Idle time before this poll refreshed `last_seen`
    pub time_since_last_seen: Option<Millis>,
}

impl QueueStatus {
    pub fn not_in_queue() -> Self {
        Self {
            state: QueueState::NotInQueue,
            player: None,
            time_since_last_seen: None,
        }
    }

    pub fn queued(player: Player) -> Self {
        Self {
            state: player.state(),
            player: Some(player),
            time_since_last_seen: None,
        }
    }

    fn with_idle(mut self, idle: Millis) -> Self {
        self.time_since_last_seen = Some(idle);
        self
    }
}

/// Join/poll/drop against a [`PlayerStore`]
#[derive(Clone)]
pub struct QueueEngine {
    store: Arc<dyn PlayerStore>,
    context: Arc<EngineContext>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl QueueEngine {
    pub fn new(store: Arc<dyn PlayerStore>, context: Arc<EngineContext>) -> Self {
        Self {
            store,
            context,
            metrics: None,
        }
    }

    /// Record operation counters into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    /// Enter the queue. Idempotent: an existing record is returned untouched.
    pub async fn join(&self, player_id: &str, criteria: Option<&str>) -> Result<QueueStatus> {
        let result = self.join_inner(player_id, criteria).await;
        self.record("join", &result);
        result
    }

    /// Report queue state and refresh `last_seen`
    pub async fn poll(&self, player_id: &str) -> Result<QueueStatus> {
        let result = self.poll_inner(player_id).await;
        self.record("poll", &result);
        result
    }

    /// Leave the queue. Fails with `PlayerNotFound` if not queued.
    pub async fn drop_player(&self, player_id: &str) -> Result<()> {
        let result = self.drop_inner(player_id).await;
        self.record("drop", &result);
        result
    }

    async fn join_inner(&self, player_id: &str, criteria: Option<&str>) -> Result<QueueStatus> {
        self.store.refresh_expiry().await?;

        if let Some(existing) = self.store.get(player_id).await? {
            debug!(
                "Player {} already queued ({}), join is a no-op",
                player_id,
                existing.state()
            );
            return Ok(QueueStatus::queued(existing));
        }

        let criteria = criteria
            .filter(|c| !c.is_empty())
            .unwrap_or(self.context.default_criteria())
            .to_string();
        let player = Player::new(player_id.to_string(), criteria, self.context.now());

        match self.store.upsert(&player).await {
            Ok(stored) => {
                info!(
                    "Player {} joined the queue with criteria '{}'",
                    stored.id, stored.criteria
                );
                Ok(QueueStatus::queued(stored))
            }
            Err(StoreError::Conflict { .. }) => {
                // Lost a race with a concurrent join for the same player
                match self.store.get(player_id).await? {
                    Some(existing) => Ok(QueueStatus::queued(existing)),
                    None => Err(StoreError::Conflict {
                        player_id: player_id.to_string(),
                    }
                    .into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn poll_inner(&self, player_id: &str) -> Result<QueueStatus> {
        self.store.refresh_expiry().await?;

        for attempt in 1..=MAX_POLL_ATTEMPTS {
            let Some(mut player) = self.store.get(player_id).await? else {
                return Ok(QueueStatus::not_in_queue());
            };

            let idle = player.touch(self.context.now());

            match self.store.upsert(&player).await {
                Ok(stored) => return Ok(QueueStatus::queued(stored).with_idle(idle)),
                Err(StoreError::Conflict { .. }) => {
                    debug!(
                        "Poll for {} raced another writer (attempt {}/{})",
                        player_id, attempt, MAX_POLL_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(
            "Poll for {} gave up after {} conflicting writes",
            player_id, MAX_POLL_ATTEMPTS
        );
        Err(StoreError::Conflict {
            player_id: player_id.to_string(),
        }
        .into())
    }

    async fn drop_inner(&self, player_id: &str) -> Result<()> {
        self.store.refresh_expiry().await?;

        if self.store.delete(player_id, None).await? {
            info!("Player {} removed from queue", player_id);
            Ok(())
        } else {
            Err(MatchmakingError::PlayerNotFound {
                player_id: player_id.to_string(),
            })
        }
    }

    fn record<T>(&self, operation: &str, result: &Result<T>) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        metrics.record_queue_operation(operation);
        if let Err(e) = result {
            let kind = match e {
                MatchmakingError::PlayerNotFound { .. } => "not_found",
                MatchmakingError::Store(StoreError::Conflict { .. }) => "conflict",
                MatchmakingError::Store(_) => "store",
                _ => "other",
            };
            metrics.record_queue_error(operation, kind);
        }
    }
}
