//! Redis-backed player store
//!
//! All players live in one hash (the collection), one JSON document per
//! player id. Compare-and-swap writes run as Lua scripts so the version
//! check and the write happen atomically on the server.

use super::PlayerStore;
use crate::error::{StoreError, StoreResult};
use crate::types::Player;
use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client, Script};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// KEYS[1] = collection, ARGV[1] = player id, ARGV[2] = expected version,
/// ARGV[3] = new document. Returns 1 when written, 0 on version mismatch.
const UPSERT_SCRIPT: &str = r#"
local current = redis.call('HGET', KEYS[1], ARGV[1])
local expected = tonumber(ARGV[2])
if current then
  local stored = cjson.decode(current)['version'] or 1
  if expected == 0 or stored ~= expected then
    return 0
  end
elseif expected ~= 0 then
  return 0
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[3])
return 1
"#;

/// KEYS[1] = collection, ARGV[1] = player id, ARGV[2] = expected version.
/// Returns 1 when deleted, 0 when absent or the version differs.
const DELETE_SCRIPT: &str = r#"
local current = redis.call('HGET', KEYS[1], ARGV[1])
if not current then
  return 0
end
local stored = cjson.decode(current)['version'] or 1
if stored ~= tonumber(ARGV[2]) then
  return 0
end
return redis.call('HDEL', KEYS[1], ARGV[1])
"#;

/// Player store kept in a single Redis hash
#[derive(Clone)]
pub struct RedisPlayerStore {
    connection: ConnectionManager,
    collection: String,
    ttl: Duration,
    upsert_script: Script,
    delete_script: Script,
}

impl RedisPlayerStore {
    /// Connect to Redis at `url`, storing players in the hash `collection`
    pub async fn connect(url: &str, collection: &str, ttl: Duration) -> StoreResult<Self> {
        info!("Connecting to Redis player store: {}", url);

        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self {
            connection,
            collection: collection.to_string(),
            ttl,
            upsert_script: Script::new(UPSERT_SCRIPT),
            delete_script: Script::new(DELETE_SCRIPT),
        })
    }

    fn decode(player_id: &str, json: &str) -> StoreResult<Player> {
        serde_json::from_str(json).map_err(|e| StoreError::Corrupt {
            player_id: player_id.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl PlayerStore for RedisPlayerStore {
    async fn snapshot(&self) -> StoreResult<Vec<Player>> {
        let mut conn = self.connection.clone();
        let raw: HashMap<String, String> = conn.hgetall(&self.collection).await?;

        let mut players = Vec::with_capacity(raw.len());
        for (player_id, json) in raw {
            match Self::decode(&player_id, &json) {
                Ok(player) => players.push(player),
                // A single unreadable document must not stall the whole queue
                Err(e) => warn!("Skipping record in snapshot: {}", e),
            }
        }
        Ok(players)
    }

    async fn get(&self, player_id: &str) -> StoreResult<Option<Player>> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.hget(&self.collection, player_id).await?;
        raw.map(|json| Self::decode(player_id, &json)).transpose()
    }

    async fn upsert(&self, player: &Player) -> StoreResult<Player> {
        let stored = super::next_revision(player);
        let document = serde_json::to_string(&stored).map_err(|e| StoreError::Corrupt {
            player_id: player.id.clone(),
            message: e.to_string(),
        })?;

        let mut conn = self.connection.clone();
        let written: i64 = self
            .upsert_script
            .key(&self.collection)
            .arg(&player.id)
            .arg(player.version)
            .arg(document)
            .invoke_async(&mut conn)
            .await?;

        if written == 1 {
            Ok(stored)
        } else {
            Err(StoreError::Conflict {
                player_id: player.id.clone(),
            })
        }
    }

    async fn delete(&self, player_id: &str, expected_version: Option<u64>) -> StoreResult<bool> {
        let mut conn = self.connection.clone();
        let removed: i64 = match expected_version {
            None => conn.hdel(&self.collection, player_id).await?,
            Some(version) => {
                self.delete_script
                    .key(&self.collection)
                    .arg(player_id)
                    .arg(version)
                    .invoke_async(&mut conn)
                    .await?
            }
        };
        Ok(removed > 0)
    }

    async fn refresh_expiry(&self) -> StoreResult<()> {
        let mut conn = self.connection.clone();
        let _: bool = conn
            .expire(&self.collection, self.ttl.as_secs() as i64)
            .await?;
        Ok(())
    }
}
