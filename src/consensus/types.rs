use crate::consensus::round::Round;
use crate::crypto::{PublicKey, Signature};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Candidate decision for a round. Both hashes empty means "no block this round".
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YacHash {
    pub round: Round,
    pub proposal_hash: Vec<u8>,
    pub block_hash: Vec<u8>,
}

impl YacHash {
    pub fn new(round: Round, proposal_hash: Vec<u8>, block_hash: Vec<u8>) -> Self {
        Self { round, proposal_hash, block_hash }
    }

    pub fn empty(round: Round) -> Self {
        Self { round, proposal_hash: vec![], block_hash: vec![] }
    }

    pub fn is_empty(&self) -> bool {
        self.proposal_hash.is_empty() && self.block_hash.is_empty()
    }

    /// Bytes covered by a vote signature:
    /// height_be || counter_be || len_be(proposal) || proposal || len_be(block) || block
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + self.proposal_hash.len() + self.block_hash.len());
        out.extend_from_slice(&self.round.height.to_be_bytes());
        out.extend_from_slice(&self.round.counter.to_be_bytes());
        out.extend_from_slice(&(self.proposal_hash.len() as u64).to_be_bytes());
        out.extend_from_slice(&self.proposal_hash);
        out.extend_from_slice(&(self.block_hash.len() as u64).to_be_bytes());
        out.extend_from_slice(&self.block_hash);
        out
    }
}

impl fmt::Debug for YacHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "YacHash{{round: {}, empty}}", self.round);
        }
        write!(
            f,
            "YacHash{{round: {}, proposal: {}, block: {}}}",
            self.round,
            hex::encode(&self.proposal_hash),
            hex::encode(&self.block_hash)
        )
    }
}

/// A peer's signed endorsement of a hash
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteMessage {
    pub hash: YacHash,
    pub signature: Signature,
    pub public_key: PublicKey,
}

impl VoteMessage {
    pub fn round(&self) -> Round {
        self.hash.round
    }
}

/// Round the node has decided locally and will not vote in again
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FreezedRound {
    pub round: Round,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsensusOutcomeType {
    /// a non-empty hash collected a supermajority
    Commit,
    /// votes split so that no hash can reach a supermajority
    Reject,
    /// peers agreed on the empty hash
    Nothing,
    /// votes arrived for a round ahead of ours
    Future,
}

/// Which cluster ordering the decision was reached under
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    Primary,
    Alternative,
}

/// Result of a round, surfaced through the outcome stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub kind: ConsensusOutcomeType,
    pub round: Round,
    /// winning hash, only set for `Commit`
    pub hash: Option<YacHash>,
    /// votes backing the outcome
    pub votes: Vec<VoteMessage>,
    pub decided_by: OrderKind,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, ConsensusOutcomeType::Future)
    }
}

/// A key that signed two different hashes in one round
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Equivocation {
    pub first: VoteMessage,
    pub second: VoteMessage,
}

impl Equivocation {
    pub fn offender(&self) -> &PublicKey {
        &self.first.public_key
    }
}

/// utility: hash bytes to a Vec<u8>
pub fn hash_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().to_vec()
}
