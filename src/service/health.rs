//! Health checks for the matchmaking queue
//!
//! Probes store reachability and whether the matchmaker is still sweeping.

use crate::matchmaker::Matchmaker;
use crate::store::PlayerStore;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Sweeps older than this many intervals mark the scheduler degraded
const STALE_TICK_INTERVALS: u32 = 3;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge encoding (0=unhealthy, 1=degraded, 2=healthy)
    pub fn as_gauge(self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn worst(self, other: HealthStatus) -> HealthStatus {
        if self.as_gauge() <= other.as_gauge() {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: QueueStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional error message if not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Queue figures gathered while probing the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub players_in_queue: Option<usize>,
    pub players_matched: Option<usize>,
    pub millis_since_last_tick: Option<u64>,
}

impl HealthCheck {
    /// Probe the store and the matchmaker
    pub async fn check(
        service: &str,
        store: &dyn PlayerStore,
        matchmaker: &Matchmaker,
        interval: Duration,
    ) -> Self {
        let mut stats = QueueStats::default();

        let store_check = Self::check_store(store, &mut stats).await;
        let scheduler_check = Self::check_scheduler(matchmaker, interval, &mut stats);
        let status = store_check.status.worst(scheduler_check.status);

        HealthCheck {
            status,
            service: service.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks: vec![store_check, scheduler_check],
            stats,
        }
    }

    async fn check_store(store: &dyn PlayerStore, stats: &mut QueueStats) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match store.snapshot().await {
            Ok(players) => {
                stats.players_in_queue = Some(players.len());
                stats.players_matched = Some(players.iter().filter(|p| p.matched).count());
                (HealthStatus::Healthy, None)
            }
            Err(e) => {
                error!("Store health check failed: {}", e);
                (HealthStatus::Unhealthy, Some(e.to_string()))
            }
        };

        ComponentCheck {
            name: "store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_scheduler(
        matchmaker: &Matchmaker,
        interval: Duration,
        stats: &mut QueueStats,
    ) -> ComponentCheck {
        let start = Instant::now();
        let since_last = matchmaker.since_last_tick();
        stats.millis_since_last_tick = since_last.map(|d| d.as_millis() as u64);

        let (status, message) = match since_last {
            None => (
                HealthStatus::Healthy,
                Some("waiting for first sweep".to_string()),
            ),
            Some(elapsed) if elapsed > interval * STALE_TICK_INTERVALS => {
                debug!("Last sweep started {:?} ago", elapsed);
                (
                    HealthStatus::Degraded,
                    Some(format!("last sweep {}ms ago", elapsed.as_millis())),
                )
            }
            Some(_) => (HealthStatus::Healthy, None),
        };

        ComponentCheck {
            name: "matchmaker".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
