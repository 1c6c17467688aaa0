//! In-memory player store
//!
//! Mirrors the semantics of the Redis backend, including the collection-level
//! TTL: when the TTL lapses without a refresh the whole collection is dropped.

use super::{check_version, next_revision, PlayerStore};
use crate::error::{StoreError, StoreResult};
use crate::types::{Player, PlayerId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Default)]
struct Collection {
    players: HashMap<PlayerId, Player>,
    expires_at: Option<Instant>,
}

impl Collection {
    fn expire_if_due(&mut self, now: Instant) {
        if matches!(self.expires_at, Some(deadline) if now >= deadline) {
            debug!(
                "Player collection expired, discarding {} records",
                self.players.len()
            );
            self.players.clear();
            self.expires_at = None;
        }
    }
}

/// Player store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryPlayerStore {
    collection: RwLock<Collection>,
    ttl: Option<Duration>,
}

impl InMemoryPlayerStore {
    /// Create a store whose collection never expires
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose collection expires `ttl` after the last refresh
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            collection: RwLock::new(Collection::default()),
            ttl: Some(ttl),
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.collection
            .read()
            .map(|c| c.players.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_collection<T>(&self, op: impl FnOnce(&mut Collection) -> StoreResult<T>) -> StoreResult<T> {
        let mut collection = self
            .collection
            .write()
            .map_err(|_| StoreError::Unavailable {
                message: "Failed to acquire players lock".to_string(),
            })?;
        collection.expire_if_due(Instant::now());
        op(&mut collection)
    }
}

#[async_trait]
impl PlayerStore for InMemoryPlayerStore {
    async fn snapshot(&self) -> StoreResult<Vec<Player>> {
        self.with_collection(|c| Ok(c.players.values().cloned().collect()))
    }

    async fn get(&self, player_id: &str) -> StoreResult<Option<Player>> {
        self.with_collection(|c| Ok(c.players.get(player_id).cloned()))
    }

    async fn upsert(&self, player: &Player) -> StoreResult<Player> {
        self.with_collection(|c| {
            check_version(c.players.get(&player.id), player)?;
            let stored = next_revision(player);
            c.players.insert(stored.id.clone(), stored.clone());
            Ok(stored)
        })
    }

    async fn delete(&self, player_id: &str, expected_version: Option<u64>) -> StoreResult<bool> {
        self.with_collection(|c| {
            let removable = match (c.players.get(player_id), expected_version) {
                (Some(_), None) => true,
                (Some(stored), Some(expected)) => stored.version == expected,
                (None, _) => false,
            };
            if removable {
                c.players.remove(player_id);
            }
            Ok(removable)
        })
    }

    async fn refresh_expiry(&self) -> StoreResult<()> {
        let ttl = self.ttl;
        self.with_collection(|c| {
            c.expires_at = ttl.map(|ttl| Instant::now() + ttl);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(id: &str) -> Player {
        Player::new(id.to_string(), "default".to_string(), 0)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryPlayerStore::new();

        let stored = store.upsert(&fresh("a")).await.unwrap();
        assert_eq!(stored.version, 1);

        let loaded = store.get("a").await.unwrap().unwrap();
        assert_eq!(loaded, stored);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_insert_conflicts() {
        let store = InMemoryPlayerStore::new();
        store.upsert(&fresh("a")).await.unwrap();

        let err = store.upsert(&fresh("a")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = InMemoryPlayerStore::new();
        let v1 = store.upsert(&fresh("a")).await.unwrap();

        let mut first = v1.clone();
        first.last_seen = 10;
        store.upsert(&first).await.unwrap();

        let mut stale = v1;
        stale.matched = true;
        assert!(store.upsert(&stale).await.is_err());

        let current = store.get("a").await.unwrap().unwrap();
        assert_eq!(current.last_seen, 10);
        assert!(!current.matched);
        assert_eq!(current.version, 2);
    }

    #[tokio::test]
    async fn test_conditional_delete() {
        let store = InMemoryPlayerStore::new();
        let stored = store.upsert(&fresh("a")).await.unwrap();

        assert!(!store.delete("a", Some(stored.version + 1)).await.unwrap());
        assert!(store.delete("a", Some(stored.version)).await.unwrap());
        assert!(!store.delete("a", None).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_collection_expires_after_ttl() {
        let store = InMemoryPlayerStore::with_ttl(Duration::from_millis(20));
        store.upsert(&fresh("a")).await.unwrap();
        store.refresh_expiry().await.unwrap();
        assert_eq!(store.snapshot().await.unwrap().len(), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collection_without_refresh_does_not_expire() {
        let store = InMemoryPlayerStore::with_ttl(Duration::from_millis(5));
        store.upsert(&fresh("a")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.snapshot().await.unwrap().len(), 1);
    }
}
