//! Votes of a single round, grouped by hash, with first-seen-per-key counting.

use crate::consensus::cluster_order::{ClusterOrdering, RoundOrders};
use crate::consensus::round::Round;
use crate::consensus::storage::block_storage::BlockStorage;
use crate::consensus::supermajority::{has_supermajority, is_rejected};
use crate::consensus::types::{ConsensusOutcomeType, Equivocation, OrderKind, Outcome, VoteMessage, YacHash};
use crate::crypto::PublicKey;
use std::collections::HashMap;

/// What happened to each vote of an inserted batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InsertReport {
    pub accepted: usize,
    pub duplicates: usize,
    pub equivocations: usize,
    pub foreign_round: usize,
}

enum Tally {
    Decided { kind: ConsensusOutcomeType, hash: YacHash, votes: Vec<VoteMessage> },
    Rejected { votes: Vec<VoteMessage> },
    Undecided,
}

#[derive(Clone, Debug)]
pub struct RoundStorage {
    round: Round,
    blocks: Vec<BlockStorage>,
    /// key -> hash it counts towards (the first one seen)
    voters: HashMap<PublicKey, YacHash>,
    equivocations: Vec<Equivocation>,
    decision: Option<Outcome>,
    future_reported: bool,
}

impl RoundStorage {
    pub fn new(round: Round) -> Self {
        Self {
            round,
            blocks: vec![],
            voters: HashMap::new(),
            equivocations: vec![],
            decision: None,
            future_reported: false,
        }
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn insert(&mut self, votes: Vec<VoteMessage>) -> InsertReport {
        let mut report = InsertReport::default();
        for vote in votes {
            if vote.hash.round != self.round {
                report.foreign_round += 1;
                continue;
            }
            let counted = self.voters.get(&vote.public_key).cloned();
            match counted {
                Some(hash) if hash == vote.hash => report.duplicates += 1,
                Some(hash) => {
                    if self.equivocations.iter().any(|e| e.second == vote) {
                        report.duplicates += 1;
                        continue;
                    }
                    if let Some(first) = self.first_vote(&vote.public_key, &hash) {
                        self.equivocations.push(Equivocation { first, second: vote });
                        report.equivocations += 1;
                    }
                }
                None => {
                    self.voters.insert(vote.public_key.clone(), vote.hash.clone());
                    let idx = match self.blocks.iter().position(|b| b.hash() == &vote.hash) {
                        Some(i) => i,
                        None => {
                            self.blocks.push(BlockStorage::new(vote.hash.clone()));
                            self.blocks.len() - 1
                        }
                    };
                    self.blocks[idx].insert(vote);
                    report.accepted += 1;
                }
            }
        }
        report
    }

    fn first_vote(&self, key: &PublicKey, hash: &YacHash) -> Option<VoteMessage> {
        self.blocks
            .iter()
            .find(|b| b.hash() == hash)
            .and_then(|b| b.votes().iter().find(|v| &v.public_key == key).cloned())
    }

    fn tally(&self, order: &ClusterOrdering) -> Tally {
        let peers = order.number_of_peers();
        let counts: Vec<usize> = self.blocks.iter().map(|b| b.count_in(order)).collect();

        // non-empty hashes take precedence over the empty one
        let winner = self
            .blocks
            .iter()
            .zip(&counts)
            .filter(|(b, c)| !b.hash().is_empty() && has_supermajority(**c, peers))
            .map(|(b, _)| (ConsensusOutcomeType::Commit, b))
            .next()
            .or_else(|| {
                self.blocks
                    .iter()
                    .zip(&counts)
                    .find(|(b, c)| b.hash().is_empty() && has_supermajority(**c, peers))
                    .map(|(b, _)| (ConsensusOutcomeType::Nothing, b))
            });
        if let Some((kind, block)) = winner {
            return Tally::Decided { kind, hash: block.hash().clone(), votes: block.votes_in(order) };
        }

        let voted: usize = counts.iter().sum();
        let max = counts.iter().copied().max().unwrap_or(0);
        if is_rejected(max, voted, peers) {
            let votes = self.blocks.iter().flat_map(|b| b.votes_in(order)).collect();
            return Tally::Rejected { votes };
        }
        Tally::Undecided
    }

    /// Outcome the collected votes imply under the given orderings, if any.
    /// Commit/Nothing under either ordering wins; Reject needs every ordering to reject.
    pub fn evaluate(&self, orders: &RoundOrders) -> Option<Outcome> {
        let primary = self.tally(&orders.primary);
        let alternative = orders.alternative.as_ref().map(|a| self.tally(a));

        let decided = |tally: Tally, decided_by: OrderKind| match tally {
            Tally::Decided { kind, hash, votes } => Some(Outcome {
                kind,
                round: self.round,
                hash: if kind == ConsensusOutcomeType::Commit { Some(hash) } else { None },
                votes,
                decided_by,
            }),
            _ => None,
        };

        match (primary, alternative) {
            (p @ Tally::Decided { .. }, _) => decided(p, OrderKind::Primary),
            (_, Some(a @ Tally::Decided { .. })) => decided(a, OrderKind::Alternative),
            (Tally::Rejected { votes }, None) | (Tally::Rejected { votes }, Some(Tally::Rejected { .. })) => {
                Some(Outcome {
                    kind: ConsensusOutcomeType::Reject,
                    round: self.round,
                    hash: None,
                    votes,
                    decided_by: OrderKind::Primary,
                })
            }
            _ => None,
        }
    }

    pub fn freeze(&mut self, outcome: Outcome) {
        if self.decision.is_none() {
            self.decision = Some(outcome);
        }
    }

    pub fn decision(&self) -> Option<&Outcome> {
        self.decision.as_ref()
    }

    pub fn is_frozen(&self) -> bool {
        self.decision.is_some()
    }

    /// True the first time only
    pub fn mark_future_reported(&mut self) -> bool {
        !std::mem::replace(&mut self.future_reported, true)
    }

    /// Counted votes, in first-seen order of their hashes
    pub fn votes(&self) -> Vec<VoteMessage> {
        self.blocks.iter().flat_map(|b| b.votes().iter().cloned()).collect()
    }

    pub fn voters(&self) -> usize {
        self.voters.len()
    }

    pub fn equivocations(&self) -> &[Equivocation] {
        &self.equivocations
    }
}
