//! Store wrappers for exercising sweeps under contention and outages

use crate::error::{StoreError, StoreResult};
use crate::store::{InMemoryPlayerStore, PlayerStore};
use crate::types::Player;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::Notify;

/// Holds every snapshot until `release` is notified
pub(crate) struct GatedStore {
    pub inner: InMemoryPlayerStore,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedStore {
    pub fn new(inner: InMemoryPlayerStore) -> Self {
        Self {
            inner,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl PlayerStore for GatedStore {
    async fn snapshot(&self) -> StoreResult<Vec<Player>> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.snapshot().await
    }

    async fn get(&self, player_id: &str) -> StoreResult<Option<Player>> {
        self.inner.get(player_id).await
    }

    async fn upsert(&self, player: &Player) -> StoreResult<Player> {
        self.inner.upsert(player).await
    }

    async fn delete(&self, player_id: &str, expected: Option<u64>) -> StoreResult<bool> {
        self.inner.delete(player_id, expected).await
    }

    async fn refresh_expiry(&self) -> StoreResult<()> {
        self.inner.refresh_expiry().await
    }
}

/// Lets a fixed number of writes through, then fails every write
pub(crate) struct OutageStore {
    pub inner: InMemoryPlayerStore,
    write_budget: Mutex<Option<usize>>,
}

impl OutageStore {
    pub fn new(inner: InMemoryPlayerStore) -> Self {
        Self {
            inner,
            write_budget: Mutex::new(None),
        }
    }

    pub fn allow_writes(&self, count: usize) {
        *self.write_budget.lock().unwrap() = Some(count);
    }

    pub fn end_outage(&self) {
        *self.write_budget.lock().unwrap() = None;
    }

    fn spend_write(&self) -> StoreResult<()> {
        let mut budget = self.write_budget.lock().unwrap();
        match budget.as_mut() {
            None => Ok(()),
            Some(0) => Err(StoreError::Unavailable {
                message: "store outage".to_string(),
            }),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl PlayerStore for OutageStore {
    async fn snapshot(&self) -> StoreResult<Vec<Player>> {
        self.inner.snapshot().await
    }

    async fn get(&self, player_id: &str) -> StoreResult<Option<Player>> {
        self.inner.get(player_id).await
    }

    async fn upsert(&self, player: &Player) -> StoreResult<Player> {
        self.spend_write()?;
        self.inner.upsert(player).await
    }

    async fn delete(&self, player_id: &str, expected: Option<u64>) -> StoreResult<bool> {
        self.spend_write()?;
        self.inner.delete(player_id, expected).await
    }

    async fn refresh_expiry(&self) -> StoreResult<()> {
        self.inner.refresh_expiry().await
    }
}
