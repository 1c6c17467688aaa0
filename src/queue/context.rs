//! Engine context: the clock and match-id source shared by the queue engine
//! and the matchmaker, plus the queue policy values they both apply.

use crate::types::{MatchId, Millis, DEFAULT_CRITERIA};
use crate::utils::generate_match_id;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of process-relative timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> Millis;
}

/// Milliseconds elapsed since the clock was created
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Millis {
        self.epoch.elapsed().as_millis() as Millis
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn starting_at(now: Millis) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: Millis) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

/// Source of match identifiers. Collisions must be effectively impossible.
pub trait MatchIdGenerator: Send + Sync {
    fn next_id(&self) -> MatchId;
}

/// Random v4 UUIDs
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidMatchIds;

impl MatchIdGenerator for UuidMatchIds {
    fn next_id(&self) -> MatchId {
        generate_match_id()
    }
}

/// `match-1`, `match-2`, ... unique within the process
#[derive(Debug, Default)]
pub struct SequentialMatchIds {
    next: AtomicU64,
}

impl MatchIdGenerator for SequentialMatchIds {
    fn next_id(&self) -> MatchId {
        let id = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        format!("match-{}", id)
    }
}

/// Shared context handed to every queue operation and sweep
#[derive(Clone)]
pub struct EngineContext {
    clock: Arc<dyn Clock>,
    match_ids: Arc<dyn MatchIdGenerator>,
    default_criteria: String,
    player_timeout: Duration,
}

impl EngineContext {
    /// Default player timeout before the sweep evicts an unmatched player
    pub const DEFAULT_PLAYER_TIMEOUT: Duration = Duration::from_millis(60_000);

    pub fn new(clock: Arc<dyn Clock>, match_ids: Arc<dyn MatchIdGenerator>) -> Self {
        Self {
            clock,
            match_ids,
            default_criteria: DEFAULT_CRITERIA.to_string(),
            player_timeout: Self::DEFAULT_PLAYER_TIMEOUT,
        }
    }

    /// Monotonic clock and random match ids
    pub fn production() -> Self {
        Self::new(Arc::new(MonotonicClock::new()), Arc::new(UuidMatchIds))
    }

    pub fn with_default_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.default_criteria = criteria.into();
        self
    }

    pub fn with_player_timeout(mut self, timeout: Duration) -> Self {
        self.player_timeout = timeout;
        self
    }

    pub fn now(&self) -> Millis {
        self.clock.now()
    }

    pub fn next_match_id(&self) -> MatchId {
        self.match_ids.next_id()
    }

    pub fn default_criteria(&self) -> &str {
        &self.default_criteria
    }

    pub fn player_timeout(&self) -> Duration {
        self.player_timeout
    }

    /// Player timeout in clock units
    pub fn player_timeout_ms(&self) -> Millis {
        self.player_timeout.as_millis() as Millis
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("now", &self.now())
            .field("default_criteria", &self.default_criteria)
            .field("player_timeout", &self.player_timeout)
            .finish()
    }
}
