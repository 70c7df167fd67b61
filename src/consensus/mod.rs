//! Consensus module (YAC: vote, collect, decide)
//!
//! Public surface:
//! - YacGate: casts the local vote, admits peer bundles, emits round outcomes
//! - round, types, cluster_order, supermajority, crypto_provider, storage, transport

pub mod round;
pub mod types;
pub mod supermajority;
pub mod cluster_order;
pub mod crypto_provider;
pub mod storage;
pub mod transport;
pub mod gate;

pub use cluster_order::{ClusterOrdering, ClusterOrderingProvider, Peer, PeerDirectory, RoundOrders, StaticPeerDirectory};
pub use crypto_provider::{CryptoProviderImpl, YacCryptoProvider};
pub use gate::{CommitSink, GateConfig, GateState, HashGate, YacGate};
pub use round::Round;
pub use storage::VoteStorage;
pub use transport::{YacNetwork, YacNetworkNotifications};
pub use types::{ConsensusOutcomeType, Equivocation, FreezedRound, OrderKind, Outcome, VoteMessage, YacHash};
