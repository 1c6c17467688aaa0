//! Common types used throughout the matchmaking queue

use serde::{Deserialize, Serialize};

/// Stable identifier derived from an external identity
pub type PlayerId = String;

/// Identifier shared by the two players of one pairing
pub type MatchId = String;

/// Process-relative timestamp in milliseconds
pub type Millis = u64;

/// Criteria assigned to players that join without specifying one
pub const DEFAULT_CRITERIA: &str = "default";

/// Queue state reported to clients.
///
/// Never persisted: it is derived from the presence of a record and its
/// `matched` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueState {
    NotInQueue,
    InQueue,
    MatchedInQueue,
}

impl QueueState {
    /// Numeric state code exposed over HTTP
    pub fn code(self) -> u8 {
        match self {
            QueueState::NotInQueue => 0,
            QueueState::InQueue => 1,
            QueueState::MatchedInQueue => 2,
        }
    }

    /// Human readable state message exposed over HTTP
    pub fn message(self) -> &'static str {
        match self {
            QueueState::NotInQueue => "not in queue.",
            QueueState::InQueue => "in queue.",
            QueueState::MatchedInQueue => "matched in queue.",
        }
    }
}

impl std::fmt::Display for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Pairing embedded in both matched player records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub id: MatchId,
    pub players: [PlayerId; 2],
}

impl MatchInfo {
    pub fn new(id: MatchId, first: PlayerId, second: PlayerId) -> Self {
        Self {
            id,
            players: [first, second],
        }
    }

    /// The other participant, if `player_id` takes part in this match
    pub fn partner_of(&self, player_id: &str) -> Option<&PlayerId> {
        match &self.players {
            [a, b] if a == player_id => Some(b),
            [a, b] if b == player_id => Some(a),
            _ => None,
        }
    }
}

/// Persisted queue record, one per queued player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub criteria: String,
    pub matched: bool,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_info: Option<MatchInfo>,
    pub last_seen: Millis,
    /// Creation time, used to scan the queue in join order
    #[serde(default)]
    pub joined_at: Millis,
    /// Optimistic concurrency version. Zero means "never persisted".
    /// Stored documents without one are read as the first revision.
    #[serde(default = "first_revision")]
    pub version: u64,
}

fn first_revision() -> u64 {
    1
}

impl Player {
    /// Create a fresh, unpersisted queue record
    pub fn new(id: PlayerId, criteria: String, now: Millis) -> Self {
        Self {
            id,
            criteria,
            matched: false,
            match_info: None,
            last_seen: now,
            joined_at: now,
            version: 0,
        }
    }

    pub fn state(&self) -> QueueState {
        if self.matched {
            QueueState::MatchedInQueue
        } else {
            QueueState::InQueue
        }
    }

    /// Whether the sweep may pair this player with `other`
    pub fn is_compatible_with(&self, other: &Player) -> bool {
        !self.matched && !other.matched && self.id != other.id && self.criteria == other.criteria
    }

    /// Milliseconds since the player was last seen. Clamped at zero.
    pub fn idle_for(&self, now: Millis) -> Millis {
        now.saturating_sub(self.last_seen)
    }

    /// Refresh `last_seen`, returning the idle time before the refresh.
    /// `last_seen` never moves backwards.
    pub fn touch(&mut self, now: Millis) -> Millis {
        let idle = self.idle_for(now);
        self.last_seen = self.last_seen.max(now);
        idle
    }

    pub fn assign_match(&mut self, info: MatchInfo) {
        self.matched = true;
        self.match_info = Some(info);
    }

    pub fn clear_match(&mut self) {
        self.matched = false;
        self.match_info = None;
    }
}
