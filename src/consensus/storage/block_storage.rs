use crate::consensus::cluster_order::ClusterOrdering;
use crate::consensus::types::{VoteMessage, YacHash};
use crate::crypto::PublicKey;

/// Votes collected for one hash within a round
#[derive(Clone, Debug)]
pub struct BlockStorage {
    hash: YacHash,
    votes: Vec<VoteMessage>,
}

impl BlockStorage {
    pub fn new(hash: YacHash) -> Self {
        Self { hash, votes: vec![] }
    }

    pub fn hash(&self) -> &YacHash {
        &self.hash
    }

    /// Returns false if the key already signed this hash
    pub fn insert(&mut self, vote: VoteMessage) -> bool {
        if vote.hash != self.hash || self.contains_key(&vote.public_key) {
            return false;
        }
        self.votes.push(vote);
        true
    }

    pub fn contains_key(&self, key: &PublicKey) -> bool {
        self.votes.iter().any(|v| &v.public_key == key)
    }

    pub fn votes(&self) -> &[VoteMessage] {
        &self.votes
    }

    /// Votes cast by members of `order`
    pub fn votes_in(&self, order: &ClusterOrdering) -> Vec<VoteMessage> {
        self.votes.iter().filter(|v| order.contains_key(&v.public_key)).cloned().collect()
    }

    pub fn count_in(&self, order: &ClusterOrdering) -> usize {
        self.votes.iter().filter(|v| order.contains_key(&v.public_key)).count()
    }
}
