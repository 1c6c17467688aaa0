//! Player store interface and implementations
//!
//! The queue engine and the matchmaker depend only on [`PlayerStore`]. Every
//! call may suspend and may fail; no atomicity is assumed across calls.
//! Writes are guarded by the record `version` (compare-and-swap) so that a
//! poll refreshing `last_seen` and a sweep assigning a match cannot silently
//! overwrite each other.

pub mod memory;
pub mod redis;

pub use memory::InMemoryPlayerStore;
pub use self::redis::RedisPlayerStore;

use crate::error::{StoreError, StoreResult};
use crate::types::Player;
use async_trait::async_trait;

/// Keyed collection of queued players
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Read every record. Order is backend defined but stable for one call.
    async fn snapshot(&self) -> StoreResult<Vec<Player>>;

    /// Read one record
    async fn get(&self, player_id: &str) -> StoreResult<Option<Player>>;

    /// Insert or update a record with compare-and-swap on `version`.
    ///
    /// A record with `version == 0` is inserted only when absent. Any other
    /// version must equal the stored version. On success the stored record,
    /// carrying the incremented version, is returned.
    async fn upsert(&self, player: &Player) -> StoreResult<Player>;

    /// Remove a record. With `expected_version` the delete only happens if
    /// the stored version still matches. Returns whether a record was removed.
    async fn delete(&self, player_id: &str, expected_version: Option<u64>) -> StoreResult<bool>;

    /// Extend the time-to-live of the whole collection
    async fn refresh_expiry(&self) -> StoreResult<()>;
}

/// Apply the compare-and-swap rule shared by all backends
pub(crate) fn check_version(stored: Option<&Player>, incoming: &Player) -> StoreResult<()> {
    let stored_version = stored.map(|p| p.version);
    match (stored_version, incoming.version) {
        (None, 0) => Ok(()),
        (Some(current), expected) if expected != 0 && current == expected => Ok(()),
        _ => Err(StoreError::Conflict {
            player_id: incoming.id.clone(),
        }),
    }
}

/// The record as it is written after a successful compare-and-swap
pub(crate) fn next_revision(incoming: &Player) -> Player {
    let mut stored = incoming.clone();
    stored.version = incoming.version + 1;
    stored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(version: u64) -> Player {
        let mut p = Player::new("p".to_string(), "default".to_string(), 0);
        p.version = version;
        p
    }

    #[test]
    fn test_insert_requires_absent_record() {
        assert!(check_version(None, &player(0)).is_ok());
        assert!(check_version(Some(&player(1)), &player(0)).is_err());
    }

    #[test]
    fn test_update_requires_matching_version() {
        assert!(check_version(Some(&player(3)), &player(3)).is_ok());
        assert_eq!(
            check_version(Some(&player(4)), &player(3)),
            Err(StoreError::Conflict {
                player_id: "p".to_string()
            })
        );
        assert!(check_version(None, &player(3)).is_err());
    }

    #[test]
    fn test_next_revision_bumps_version() {
        assert_eq!(next_revision(&player(0)).version, 1);
        assert_eq!(next_revision(&player(7)).version, 8);
    }
}
