//! Node orchestration: wire up keys, vote transport, consensus gate and the round driver.

use crate::consensus::cluster_order::{ClusterOrderingProvider, StaticPeerDirectory};
use crate::consensus::crypto_provider::CryptoProviderImpl;
use crate::consensus::gate::{CommitSink, HashGate, YacGate};
use crate::consensus::round::Round;
use crate::consensus::transport::YacNetworkNotifications;
use crate::consensus::types::{ConsensusOutcomeType, Outcome};
use crate::crypto::Keypair;
use crate::network::{TcpYacNetwork, YacServer};
use crate::node::config::NodeConfig;
use crate::node::proposal::ProposalSource;
use crate::node::service_handle::ServiceHandle;
use crate::utils::{YacError, METRICS};
use anyhow::Result;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Main Node object
pub struct Node {
    cfg: NodeConfig,
    proposals: Arc<dyn ProposalSource>,
    commit_sink: Option<Arc<dyn CommitSink>>,
}

/// A started node. Dropping it does not stop the tasks; call `shutdown`.
pub struct RunningNode {
    pub handle: ServiceHandle,
    pub gate: YacGate,
    pub local_addr: SocketAddr,
}

impl RunningNode {
    pub async fn shutdown(self) -> Result<()> {
        self.gate.stop();
        self.handle.shutdown().await
    }
}

impl Node {
    pub fn new(cfg: NodeConfig, proposals: Arc<dyn ProposalSource>) -> Self {
        Self { cfg, proposals, commit_sink: None }
    }

    pub fn with_commit_sink(mut self, sink: Arc<dyn CommitSink>) -> Self {
        self.commit_sink = Some(sink);
        self
    }

    /// Start the node: spawn subsystems and return the handle for graceful shutdown.
    pub async fn start(self) -> Result<RunningNode> {
        let (mut svc_handle, shutdown_rx) = ServiceHandle::new();
        let algorithm = self.cfg.algorithm()?;
        let peers = self.cfg.peer_list()?;

        // A node without a usable key still follows the network but never votes
        let crypto = match Keypair::load(algorithm, &self.cfg.node.key_file) {
            Ok(kp) => {
                let public = kp.public();
                info!("loaded {} signing key {}", algorithm, public);
                if !peers.iter().any(|p| p.public_key == public) {
                    warn!("local key {} is not in the peer list, peers will ignore our votes", public);
                }
                CryptoProviderImpl::new(Arc::new(kp))
            }
            Err(e) => {
                error!("cannot load signing key from {}: {}", self.cfg.node.key_file, e);
                CryptoProviderImpl::without_key()
            }
        };

        let network = Arc::new(TcpYacNetwork::new(self.cfg.send_timeout()));
        let (gate, outcomes) = YacGate::new(Arc::new(crypto), network, self.commit_sink.clone(), self.cfg.gate_config());

        let (server, local_addr) = YacServer::bind(&self.cfg.node.bind).await?;
        {
            let handler: Arc<dyn YacNetworkNotifications> = Arc::new(gate.clone());
            let shutdown_rx = shutdown_rx.clone();
            svc_handle.attach(
                "vote server",
                tokio::spawn(async move {
                    server.run(handler, shutdown_rx).await;
                    Ok(())
                }),
            );
        }

        let driver = RoundDriver {
            gate: gate.clone(),
            orderings: ClusterOrderingProvider::new(Arc::new(StaticPeerDirectory::new(peers.clone()))),
            proposals: self.proposals.clone(),
            round_delay: self.cfg.round_delay(),
        };
        svc_handle.attach("round driver", tokio::spawn(driver.run(outcomes, shutdown_rx)));

        info!("Node started, votes on {}, {} peers", local_addr, peers.len());
        Ok(RunningNode { handle: svc_handle, gate, local_addr })
    }
}

/// Round a node moves to once `outcome` is known
pub fn next_round(outcome: &Outcome) -> Round {
    match outcome.kind {
        ConsensusOutcomeType::Commit | ConsensusOutcomeType::Nothing => outcome.round.next_height(),
        ConsensusOutcomeType::Reject => outcome.round.next_counter(),
        ConsensusOutcomeType::Future => outcome.round,
    }
}

/// Consumes gate outcomes and keeps the node voting round after round
struct RoundDriver {
    gate: YacGate,
    orderings: ClusterOrderingProvider<StaticPeerDirectory>,
    proposals: Arc<dyn ProposalSource>,
    round_delay: Duration,
}

impl RoundDriver {
    async fn run(self, mut outcomes: mpsc::UnboundedReceiver<Outcome>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut round = Round::new(1, 0);
        let mut pending: VecDeque<Outcome> = self.enter(round).await.into_iter().collect();

        loop {
            let outcome = match pending.pop_front() {
                Some(o) => o,
                None => tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                    next = outcomes.recv() => match next {
                        Some(o) => o,
                        None => break,
                    },
                },
            };

            let next = next_round(&outcome);
            if next <= round {
                debug!("outcome {:?} of round {} is behind round {}", outcome.kind, outcome.round, round);
                continue;
            }
            if outcome.is_terminal() && !self.round_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.round_delay) => {}
                    _ = shutdown.changed() => break,
                }
            }
            round = next;
            pending.extend(self.enter(round).await);
        }

        self.gate.stop();
        info!("round driver stopped at round {}, counters: {}", round, METRICS.to_json());
        Ok(())
    }

    /// Switch the gate to `round` and vote. Returns the outcome if the round was already decided.
    async fn enter(&self, round: Round) -> Option<Outcome> {
        let order = match self.orderings.for_round(round).await {
            Ok(o) => o,
            Err(e) => {
                error!("no cluster ordering for round {}: {}", round, e);
                return None;
            }
        };
        match self.gate.process_round_switch(round, order.peers()) {
            Ok(Some(decided)) => return Some(decided),
            Ok(None) => {}
            Err(e) => {
                warn!("round switch to {} failed: {}", round, e);
                return None;
            }
        }
        if let Err(e) = self.gate.vote(self.proposals.next_hash(round), order, None) {
            match e {
                YacError::MissingKey | YacError::InvalidKey(_) => error!("cannot vote in round {}: {}", round, e),
                _ => debug!("no vote in round {}: {}", round, e),
            }
        }
        None
    }
}
