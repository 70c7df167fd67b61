use crate::consensus::round::Round;
use crate::consensus::types::{hash_bytes, YacHash};

/// What this node votes for in a round. In a full node this is the ordering
/// service / block simulator; every honest peer must derive the same hash.
pub trait ProposalSource: Send + Sync + 'static {
    fn next_hash(&self, round: Round) -> YacHash;
}

/// Always proposes "no block"
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyProposalSource;

impl ProposalSource for EmptyProposalSource {
    fn next_hash(&self, round: Round) -> YacHash {
        YacHash::empty(round)
    }
}

/// Deterministic stand-in block per round, identical on every node
#[derive(Clone, Copy, Debug, Default)]
pub struct DemoProposalSource;

impl ProposalSource for DemoProposalSource {
    fn next_hash(&self, round: Round) -> YacHash {
        let mut seed = Vec::with_capacity(16);
        seed.extend_from_slice(&round.height.to_be_bytes());
        seed.extend_from_slice(&round.counter.to_be_bytes());
        let proposal = hash_bytes(&[b"proposal".as_slice(), seed.as_slice()].concat());
        let block = hash_bytes(&[b"block".as_slice(), seed.as_slice()].concat());
        YacHash::new(round, proposal, block)
    }
}
