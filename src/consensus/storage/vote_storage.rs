//! VoteStorage: all rounds the node currently tracks.
//!
//! A single `RwLock` guards the round map. Inserts take the write lock, so the
//! check-and-freeze of a round is atomic and each round yields at most one
//! terminal outcome. Readers share the lock and never see a half-applied batch.

use crate::consensus::cluster_order::RoundOrders;
use crate::consensus::round::Round;
use crate::consensus::storage::round_storage::{InsertReport, RoundStorage};
use crate::consensus::types::{ConsensusOutcomeType, Equivocation, FreezedRound, OrderKind, Outcome, VoteMessage};
use crate::utils::metrics::{self, METRICS};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Heights kept behind the current one when no window is configured
pub const DEFAULT_WINDOW: u64 = 10;

#[derive(Debug)]
struct Inner {
    rounds: BTreeMap<Round, RoundStorage>,
    current: Round,
}

#[derive(Debug)]
pub struct VoteStorage {
    inner: RwLock<Inner>,
    window: u64,
}

impl VoteStorage {
    pub fn new(window: u64) -> Self {
        Self {
            inner: RwLock::new(Inner { rounds: BTreeMap::new(), current: Round::default() }),
            window,
        }
    }

    fn is_stale(&self, current: Round, round: Round) -> bool {
        round.height.saturating_add(self.window) < current.height
    }

    /// Insert a batch of votes for `round`. Returns the transition this batch caused, if any.
    /// `orders` is `None` while the node has no ordering for the round; votes are then only retained.
    pub fn insert(&self, round: Round, votes: Vec<VoteMessage>, orders: Option<&RoundOrders>) -> Option<Outcome> {
        let mut inner = self.inner.write();
        let current = inner.current;
        if self.is_stale(current, round) {
            debug!("ignoring {} votes for pruned round {}", votes.len(), round);
            return None;
        }
        if round.height > current.height.saturating_add(self.window) {
            debug!("ignoring {} votes for round {}, too far ahead of {}", votes.len(), round, current);
            return None;
        }

        let storage = inner.rounds.entry(round).or_insert_with(|| RoundStorage::new(round));
        if storage.is_frozen() {
            debug!("round {} is frozen, ignoring {} votes", round, votes.len());
            return None;
        }

        let report = storage.insert(votes);
        log_report(round, &report, storage.equivocations());

        if round > current {
            if report.accepted > 0 && storage.mark_future_reported() {
                return Some(Outcome {
                    kind: ConsensusOutcomeType::Future,
                    round,
                    hash: None,
                    votes: storage.votes(),
                    decided_by: OrderKind::Primary,
                });
            }
            return None;
        }

        let outcome = storage.evaluate(orders?)?;
        storage.freeze(outcome.clone());
        Some(outcome)
    }

    /// Decide `round` from the votes already held, freezing it if they suffice.
    /// The flag is true when this call froze the round, false for a stored decision.
    pub fn evaluate(&self, round: Round, orders: &RoundOrders) -> Option<(Outcome, bool)> {
        let mut inner = self.inner.write();
        let storage = inner.rounds.get_mut(&round)?;
        if let Some(decision) = storage.decision() {
            return Some((decision.clone(), false));
        }
        let outcome = storage.evaluate(orders)?;
        storage.freeze(outcome.clone());
        Some((outcome, true))
    }

    /// Move the current round forward and drop rounds outside the retention window
    pub fn advance(&self, round: Round) {
        let mut inner = self.inner.write();
        if round <= inner.current {
            return;
        }
        inner.current = round;
        let floor = round.height.saturating_sub(self.window);
        let before = inner.rounds.len();
        inner.rounds.retain(|r, _| r.height >= floor);
        let pruned = before - inner.rounds.len();
        if pruned > 0 {
            debug!("pruned {} rounds below height {}", pruned, floor);
        }
    }

    pub fn current_round(&self) -> Round {
        self.inner.read().current
    }

    pub fn is_frozen(&self, round: Round) -> bool {
        let inner = self.inner.read();
        if self.is_stale(inner.current, round) {
            return true;
        }
        inner.rounds.get(&round).map_or(false, |s| s.is_frozen())
    }

    pub fn decision(&self, round: Round) -> Option<Outcome> {
        self.inner.read().rounds.get(&round).and_then(|s| s.decision().cloned())
    }

    pub fn votes(&self, round: Round) -> Vec<VoteMessage> {
        self.inner.read().rounds.get(&round).map(|s| s.votes()).unwrap_or_default()
    }

    pub fn voters(&self, round: Round) -> usize {
        self.inner.read().rounds.get(&round).map_or(0, |s| s.voters())
    }

    pub fn equivocations(&self, round: Round) -> Vec<Equivocation> {
        self.inner.read().rounds.get(&round).map(|s| s.equivocations().to_vec()).unwrap_or_default()
    }

    /// Rounds decided locally that are still retained
    pub fn frozen_rounds(&self) -> Vec<FreezedRound> {
        self.inner
            .read()
            .rounds
            .values()
            .filter(|s| s.is_frozen())
            .map(|s| FreezedRound { round: s.round() })
            .collect()
    }

    pub fn tracked_rounds(&self) -> usize {
        self.inner.read().rounds.len()
    }
}

impl Default for VoteStorage {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

fn log_report(round: Round, report: &InsertReport, evidence: &[Equivocation]) {
    if report.duplicates > 0 {
        METRICS.add_counter(metrics::VOTES_DUPLICATE, report.duplicates as u64);
        debug!("round {}: ignored {} duplicate votes", round, report.duplicates);
    }
    if report.equivocations > 0 {
        METRICS.add_counter(metrics::VOTES_EQUIVOCATION, report.equivocations as u64);
        for e in &evidence[evidence.len() - report.equivocations..] {
            warn!(
                "round {}: peer {} equivocated ({:?} then {:?})",
                round,
                e.offender(),
                e.first.hash,
                e.second.hash
            );
        }
    }
    if report.foreign_round > 0 {
        warn!("round {}: dropped {} votes carrying another round", round, report.foreign_round);
    }
}
