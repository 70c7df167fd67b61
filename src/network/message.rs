use crate::consensus::round::Round;
use crate::consensus::types::{VoteMessage, YacHash};
use crate::crypto::{PublicKey, Signature, SignatureAlgorithm};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Wire-level messages. Keep stable and small.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// Ordered vote bundle; a bundle is one network message
    State(StateMessage),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StateMessage {
    pub votes: Vec<WireVote>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WireVote {
    pub height: u64,
    pub counter: u64,
    pub proposal_hash: Vec<u8>,
    pub block_hash: Vec<u8>,
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
    /// signature scheme of `public_key`, see `SignatureAlgorithm::tag`
    pub algorithm_tag: u8,
}

impl From<&VoteMessage> for WireVote {
    fn from(v: &VoteMessage) -> Self {
        Self {
            height: v.hash.round.height,
            counter: v.hash.round.counter,
            proposal_hash: v.hash.proposal_hash.clone(),
            block_hash: v.hash.block_hash.clone(),
            signature: v.signature.0.clone(),
            public_key: v.public_key.bytes.clone(),
            algorithm_tag: v.public_key.algorithm.tag(),
        }
    }
}

impl WireVote {
    pub fn into_vote(self) -> crate::utils::Result<VoteMessage> {
        let algorithm = SignatureAlgorithm::from_tag(self.algorithm_tag)?;
        Ok(VoteMessage {
            hash: YacHash::new(Round::new(self.height, self.counter), self.proposal_hash, self.block_hash),
            signature: Signature(self.signature),
            public_key: PublicKey::new(algorithm, self.public_key),
        })
    }
}

impl StateMessage {
    pub fn from_votes(votes: &[VoteMessage]) -> Self {
        Self { votes: votes.iter().map(WireVote::from).collect() }
    }

    /// Votes with an unknown algorithm tag are dropped one by one
    pub fn into_votes(self) -> Vec<VoteMessage> {
        self.votes
            .into_iter()
            .filter_map(|w| match w.into_vote() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("dropping wire vote: {}", e);
                    None
                }
            })
            .collect()
    }
}
