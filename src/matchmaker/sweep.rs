//! One matchmaker sweep over the whole queue
//!
//! A sweep reads a single snapshot, walks it in join order, evicts players
//! that stopped polling and pairs each remaining unmatched player with the
//! first compatible partner. Both halves of a pair are claimed with
//! compare-and-swap; if the partner cannot be claimed the first claim is
//! rolled back so no player is left half matched. A rollback lost to a store
//! outage is repaired at the start of the next sweep.

use crate::error::{Result, StoreError, StoreResult};
use crate::metrics::MetricsCollector;
use crate::queue::context::EngineContext;
use crate::store::PlayerStore;
use crate::types::{MatchInfo, Player, PlayerId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Upper bound on re-reads when claiming or releasing a player
const MAX_WRITE_ATTEMPTS: usize = 3;

/// What one completed sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Records in the snapshot
    pub queue_size: usize,
    /// Unmatched records examined
    pub considered: usize,
    /// Players removed for inactivity
    pub evicted: usize,
    /// Pairs formed, in the order they were formed
    pub matched_pairs: Vec<MatchInfo>,
    /// Version conflicts met while writing
    pub conflicts: usize,
    /// Half-finished matches released before pairing
    pub repaired: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(TickReport),
    /// Another sweep was still in flight
    Skipped,
}

enum PairAttempt {
    Paired(MatchInfo),
    FirstUnavailable,
    SecondUnavailable,
}

/// Pairs compatible players and evicts idle ones
pub struct Matchmaker {
    store: Arc<dyn PlayerStore>,
    context: Arc<EngineContext>,
    metrics: Option<Arc<MetricsCollector>>,
    tick_guard: tokio::sync::Mutex<()>,
    last_tick: Mutex<Option<Instant>>,
}

impl Matchmaker {
    pub fn new(store: Arc<dyn PlayerStore>, context: Arc<EngineContext>) -> Self {
        Self {
            store,
            context,
            metrics: None,
            tick_guard: tokio::sync::Mutex::new(()),
            last_tick: Mutex::new(None),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Time since the most recent sweep started, if any has run
    pub fn since_last_tick(&self) -> Option<Duration> {
        self.last_tick
            .lock()
            .ok()
            .and_then(|last| last.map(|at| at.elapsed()))
    }

    /// Run one sweep unless another one is still in flight.
    ///
    /// A failed snapshot read abandons the sweep before any write. A failed
    /// write abandons the rest of the sweep; the next tick starts afresh.
    pub async fn run_tick(&self) -> Result<TickOutcome> {
        let Ok(_guard) = self.tick_guard.try_lock() else {
            warn!("Previous matchmaking job still running, skipping tick");
            if let Some(metrics) = &self.metrics {
                metrics.record_tick_skipped();
            }
            return Ok(TickOutcome::Skipped);
        };

        let started = Instant::now();
        let since_last = self.mark_started(started);

        match self.sweep(since_last).await {
            Ok(report) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_tick_completed(
                        report.queue_size,
                        report.matched_pairs.len(),
                        report.evicted,
                        report.conflicts,
                        started.elapsed(),
                    );
                }
                Ok(TickOutcome::Completed(report))
            }
            Err(e) => {
                error!("Matchmaking job abandoned: {}", e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_tick_failed(started.elapsed());
                }
                Err(e)
            }
        }
    }

    fn mark_started(&self, at: Instant) -> Option<Duration> {
        let mut last = self.last_tick.lock().ok()?;
        last.replace(at).map(|previous| at.duration_since(previous))
    }

    async fn sweep(&self, since_last: Option<Duration>) -> Result<TickReport> {
        let mut snapshot = self.store.snapshot().await?;
        order_for_sweep(&mut snapshot);

        info!(
            "Last matchmaking job: {}ms, in-queue: {}",
            since_last.map(|d| d.as_millis()).unwrap_or_default(),
            snapshot.len()
        );

        let now = self.context.now();
        let timeout = self.context.player_timeout_ms();
        let mut report = TickReport {
            queue_size: snapshot.len(),
            ..TickReport::default()
        };
        self.repair_half_matches(&mut snapshot, &mut report).await?;
        // Players matched, evicted or found unavailable during this tick
        let mut settled: HashSet<PlayerId> = HashSet::new();

        for i in 0..snapshot.len() {
            let player = &snapshot[i];
            if player.matched || settled.contains(&player.id) {
                continue;
            }
            report.considered += 1;

            if player.idle_for(now) > timeout {
                settled.insert(player.id.clone());
                if self.store.delete(&player.id, Some(player.version)).await? {
                    info!("Player timed out: {}", player.id);
                    report.evicted += 1;
                } else {
                    debug!(
                        "Player {} changed since the snapshot, not evicting",
                        player.id
                    );
                }
                continue;
            }

            let candidates: Vec<usize> = (0..snapshot.len())
                .filter(|&j| {
                    let other = &snapshot[j];
                    j != i
                        && !settled.contains(&other.id)
                        && player.is_compatible_with(other)
                        && other.idle_for(now) <= timeout
                })
                .collect();

            for j in candidates {
                match self.pair(player, &snapshot[j], &mut report).await? {
                    PairAttempt::Paired(info) => {
                        settled.insert(player.id.clone());
                        settled.insert(snapshot[j].id.clone());
                        report.matched_pairs.push(info);
                        break;
                    }
                    PairAttempt::FirstUnavailable => {
                        settled.insert(player.id.clone());
                        break;
                    }
                    PairAttempt::SecondUnavailable => {
                        settled.insert(snapshot[j].id.clone());
                    }
                }
            }
        }

        debug!(
            "Matchmaking job done: considered {}, evicted {}, matched {} pairs",
            report.considered,
            report.evicted,
            report.matched_pairs.len()
        );
        Ok(report)
    }

    /// Release players whose match the partner never received.
    ///
    /// Only the sweep writes matches and sweeps never overlap, so a matched
    /// player whose partner is queued without the same match id is a leftover
    /// from an abandoned pairing. A partner that already left the queue is
    /// not a leftover.
    async fn repair_half_matches(
        &self,
        snapshot: &mut [Player],
        report: &mut TickReport,
    ) -> StoreResult<()> {
        let match_ids: HashMap<PlayerId, Option<String>> = snapshot
            .iter()
            .map(|p| (p.id.clone(), p.match_info.as_ref().map(|m| m.id.clone())))
            .collect();

        for player in snapshot.iter_mut() {
            let Some(info) = player.match_info.clone() else {
                continue;
            };
            let Some(partner) = info.partner_of(&player.id) else {
                continue;
            };
            let partner_holds_match = match match_ids.get(partner) {
                None => continue,
                Some(partner_match) => partner_match.as_deref() == Some(info.id.as_str()),
            };
            if partner_holds_match {
                continue;
            }

            warn!(
                "Releasing {} from match {}, partner {} never joined it",
                player.id, info.id, partner
            );
            if let Some(released) = self.release(player.clone(), &info, report).await? {
                *player = released;
                report.repaired += 1;
            }
        }
        Ok(())
    }

    async fn pair(
        &self,
        first: &Player,
        second: &Player,
        report: &mut TickReport,
    ) -> StoreResult<PairAttempt> {
        let info = MatchInfo::new(
            self.context.next_match_id(),
            first.id.clone(),
            second.id.clone(),
        );

        let Some(claimed_first) = self.claim(first, &info, report).await? else {
            return Ok(PairAttempt::FirstUnavailable);
        };

        match self.claim(second, &info, report).await {
            Ok(Some(_)) => {
                info!(
                    "Matched {} with {} (match {}, criteria '{}')",
                    first.id, second.id, info.id, first.criteria
                );
                Ok(PairAttempt::Paired(info))
            }
            Ok(None) => {
                self.release(claimed_first, &info, report).await?;
                Ok(PairAttempt::SecondUnavailable)
            }
            Err(e) => {
                if let Err(rollback) = self.release(claimed_first, &info, report).await {
                    warn!(
                        "Could not release {} from match {}, left for the next sweep: {}",
                        first.id, info.id, rollback
                    );
                }
                Err(e)
            }
        }
    }

    /// Write `info` onto the player. `None` when the player is gone, already
    /// matched or no longer has the criteria seen in the snapshot.
    async fn claim(
        &self,
        seen: &Player,
        info: &MatchInfo,
        report: &mut TickReport,
    ) -> StoreResult<Option<Player>> {
        let mut current = seen.clone();

        for _ in 0..MAX_WRITE_ATTEMPTS {
            if current.matched || current.criteria != seen.criteria {
                return Ok(None);
            }

            let mut updated = current.clone();
            updated.assign_match(info.clone());

            match self.store.upsert(&updated).await {
                Ok(stored) => return Ok(Some(stored)),
                Err(StoreError::Conflict { .. }) => {
                    report.conflicts += 1;
                    match self.store.get(&seen.id).await? {
                        Some(fresh) => current = fresh,
                        None => return Ok(None),
                    }
                }
                Err(e) => return Err(e),
            }
        }

        debug!("Giving up claiming {} for match {}", seen.id, info.id);
        Ok(None)
    }

    /// Undo a claim made for `info`, leaving any newer state alone.
    /// Returns the released record when this call cleared the match.
    async fn release(
        &self,
        claimed: Player,
        info: &MatchInfo,
        report: &mut TickReport,
    ) -> StoreResult<Option<Player>> {
        let mut current = claimed;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            if current.match_info.as_ref().map(|m| &m.id) != Some(&info.id) {
                return Ok(None);
            }

            let mut reverted = current.clone();
            reverted.clear_match();

            match self.store.upsert(&reverted).await {
                Ok(stored) => {
                    debug!("Released {} from abandoned match {}", current.id, info.id);
                    return Ok(Some(stored));
                }
                Err(StoreError::Conflict { .. }) => {
                    report.conflicts += 1;
                    match self.store.get(&current.id).await? {
                        Some(fresh) => current = fresh,
                        None => return Ok(None),
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::Conflict {
            player_id: current.id,
        })
    }
}

/// Scan order: first joined first, ties broken by id
pub fn order_for_sweep(players: &mut [Player]) {
    players.sort_by(|a, b| {
        a.joined_at
            .cmp(&b.joined_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
