//! Cluster ordering: the deterministic peer list and supermajority threshold for a round.
//!
//! Peers are sorted by address (then key) so every honest node computes the same order
//! and threshold from the same peer set.

use crate::consensus::round::Round;
use crate::consensus::supermajority::supermajority_threshold;
use crate::crypto::PublicKey;
use crate::utils::{Result, YacError};
use async_trait::async_trait;
use std::sync::Arc;

/// A known consensus participant
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Peer {
    pub address: String,
    pub public_key: PublicKey,
}

impl Peer {
    pub fn new(address: impl Into<String>, public_key: PublicKey) -> Self {
        Self { address: address.into(), public_key }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterOrdering {
    peers: Vec<Peer>,
}

impl ClusterOrdering {
    /// Build an ordering from an arbitrary peer list. Identical entries collapse;
    /// one address or one key registered twice with different partners is malformed.
    pub fn create(mut peers: Vec<Peer>) -> Result<Self> {
        if peers.is_empty() {
            return Err(YacError::EmptyPeerList);
        }
        for p in &peers {
            if p.address.trim().is_empty() {
                return Err(YacError::MalformedPeer("empty address".into()));
            }
            if p.public_key.bytes.is_empty() {
                return Err(YacError::MalformedPeer(format!("peer {} has an empty key", p.address)));
            }
        }
        peers.sort();
        peers.dedup();
        for pair in peers.windows(2) {
            if pair[0].address == pair[1].address {
                return Err(YacError::MalformedPeer(format!("address {} registered twice", pair[0].address)));
            }
        }
        let mut keys: Vec<&PublicKey> = peers.iter().map(|p| &p.public_key).collect();
        keys.sort();
        if keys.windows(2).any(|k| k[0] == k[1]) {
            return Err(YacError::MalformedPeer("public key registered twice".into()));
        }
        Ok(Self { peers })
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn number_of_peers(&self) -> usize {
        self.peers.len()
    }

    pub fn supermajority_threshold(&self) -> usize {
        supermajority_threshold(self.peers.len())
    }

    pub fn contains_key(&self, key: &PublicKey) -> bool {
        self.peer_by_key(key).is_some()
    }

    pub fn peer_by_key(&self, key: &PublicKey) -> Option<&Peer> {
        self.peers.iter().find(|p| &p.public_key == key)
    }
}

/// Primary ordering for a round plus the optional alternative used during reconfiguration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundOrders {
    pub primary: ClusterOrdering,
    pub alternative: Option<ClusterOrdering>,
}

impl RoundOrders {
    pub fn new(primary: ClusterOrdering, alternative: Option<ClusterOrdering>) -> Self {
        Self { primary, alternative }
    }

    pub fn contains_key(&self, key: &PublicKey) -> bool {
        self.primary.contains_key(key) || self.alternative.as_ref().map_or(false, |a| a.contains_key(key))
    }

    pub fn peer_by_key(&self, key: &PublicKey) -> Option<&Peer> {
        self.primary
            .peer_by_key(key)
            .or_else(|| self.alternative.as_ref().and_then(|a| a.peer_by_key(key)))
    }

    /// Union of both orderings, primary first, each address once
    pub fn all_peers(&self) -> Vec<Peer> {
        let mut out: Vec<Peer> = self.primary.peers().to_vec();
        if let Some(alt) = &self.alternative {
            for p in alt.peers() {
                if !out.iter().any(|o| o.address == p.address) {
                    out.push(p.clone());
                }
            }
        }
        out
    }
}

/// Source of the peer set valid for a round (world state in a full node)
#[async_trait]
pub trait PeerDirectory: Send + Sync + 'static {
    async fn current_peers(&self, round: Round) -> Result<Vec<Peer>>;
}

/// Fixed peer set, e.g. from the node config
#[derive(Clone, Debug)]
pub struct StaticPeerDirectory {
    peers: Vec<Peer>,
}

impl StaticPeerDirectory {
    pub fn new(peers: Vec<Peer>) -> Self {
        Self { peers }
    }
}

#[async_trait]
impl PeerDirectory for StaticPeerDirectory {
    async fn current_peers(&self, _round: Round) -> Result<Vec<Peer>> {
        Ok(self.peers.clone())
    }
}

/// Derives `ClusterOrdering`s from a peer directory
pub struct ClusterOrderingProvider<D: PeerDirectory> {
    directory: Arc<D>,
}

impl<D: PeerDirectory> ClusterOrderingProvider<D> {
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    pub async fn for_round(&self, round: Round) -> Result<ClusterOrdering> {
        let peers = self.directory.current_peers(round).await?;
        ClusterOrdering::create(peers)
    }
}
