//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parlor_queue::error::{StoreError, StoreResult};
use parlor_queue::queue::{EngineContext, ManualClock, SequentialMatchIds};
use parlor_queue::store::{InMemoryPlayerStore, PlayerStore};
use parlor_queue::types::Player;
use parlor_queue::{Matchmaker, QueueEngine};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Engine and matchmaker over one in-memory store with a manual clock
pub struct TestSystem {
    pub store: Arc<InMemoryPlayerStore>,
    pub clock: Arc<ManualClock>,
    pub engine: QueueEngine,
    pub matchmaker: Matchmaker,
}

impl TestSystem {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryPlayerStore::new());
        let clock = Arc::new(ManualClock::starting_at(0));
        let context = test_context(clock.clone());

        Self {
            engine: QueueEngine::new(store.clone(), context.clone()),
            matchmaker: Matchmaker::new(store.clone(), context),
            store,
            clock,
        }
    }
}

pub fn test_context(clock: Arc<ManualClock>) -> Arc<EngineContext> {
    Arc::new(
        EngineContext::new(clock, Arc::new(SequentialMatchIds::default()))
            .with_player_timeout(TEST_TIMEOUT),
    )
}

/// Wraps an in-memory store and fails calls on demand
#[derive(Default)]
pub struct FaultyStore {
    pub inner: InMemoryPlayerStore,
    fail_snapshot: AtomicBool,
    /// Writes still allowed before the outage; `None` means no outage
    write_budget: Mutex<Option<usize>>,
    writes: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_snapshot(&self, fail: bool) {
        self.fail_snapshot.store(fail, Ordering::SeqCst);
    }

    /// Let `count` more writes through, then fail every write
    pub fn fail_writes_after(&self, count: usize) {
        *self.write_budget.lock().unwrap() = Some(count);
    }

    pub fn restore_writes(&self) {
        *self.write_budget.lock().unwrap() = None;
    }

    /// Writes that reached the inner store
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn unavailable() -> StoreError {
        StoreError::Unavailable {
            message: "injected failure".to_string(),
        }
    }

    fn check_writes(&self) -> StoreResult<()> {
        match self.write_budget.lock().unwrap().as_mut() {
            Some(0) => return Err(Self::unavailable()),
            Some(left) => *left -= 1,
            None => {}
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl PlayerStore for FaultyStore {
    async fn snapshot(&self) -> StoreResult<Vec<Player>> {
        if self.fail_snapshot.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.snapshot().await
    }

    async fn get(&self, player_id: &str) -> StoreResult<Option<Player>> {
        self.inner.get(player_id).await
    }

    async fn upsert(&self, player: &Player) -> StoreResult<Player> {
        self.check_writes()?;
        self.inner.upsert(player).await
    }

    async fn delete(&self, player_id: &str, expected_version: Option<u64>) -> StoreResult<bool> {
        self.check_writes()?;
        self.inner.delete(player_id, expected_version).await
    }

    async fn refresh_expiry(&self) -> StoreResult<()> {
        self.inner.refresh_expiry().await
    }
}
