#![allow(dead_code)]

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use yac_node::consensus::transport::deliver_state;
use yac_node::consensus::{
    ClusterOrdering, CommitSink, CryptoProviderImpl, GateConfig, Outcome, Peer, Round, VoteMessage, YacGate, YacHash,
    YacNetwork,
};
use yac_node::consensus::HashGate;
use yac_node::crypto::{Keypair, SignatureAlgorithm};
use yac_node::utils::YacError;

pub fn keys(n: usize) -> Vec<Arc<Keypair>> {
    (0..n)
        .map(|i| {
            let alg = if i % 2 == 0 { SignatureAlgorithm::Ed25519Sha256 } else { SignatureAlgorithm::Ed25519Blake3 };
            Arc::new(Keypair::generate(alg))
        })
        .collect()
}

pub fn quiet_config() -> GateConfig {
    GateConfig { max_rebroadcasts: 0, ..GateConfig::default() }
}

pub async fn next_outcome(rx: &mut mpsc::UnboundedReceiver<Outcome>) -> Outcome {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an outcome")
        .expect("outcome stream closed")
}

#[derive(Default)]
pub struct RecordingSink {
    pub commits: Mutex<Vec<(YacHash, Round)>>,
}

impl CommitSink for RecordingSink {
    fn on_commit(&self, hash: &YacHash, round: Round) {
        self.commits.lock().push((hash.clone(), round));
    }
}

/// In-memory delivery between gates; each delivery runs on its own task
#[derive(Default)]
pub struct Hub {
    gates: RwLock<HashMap<String, YacGate>>,
    down: RwLock<HashSet<String>>,
}

impl Hub {
    pub fn register(&self, address: &str, gate: YacGate) {
        self.gates.write().insert(address.to_string(), gate);
    }

    pub fn take_down(&self, address: &str) {
        self.down.write().insert(address.to_string());
    }
}

pub struct LoopbackNetwork {
    from: String,
    hub: Arc<Hub>,
}

impl YacNetwork for LoopbackNetwork {
    fn send_state(&self, to: &Peer, state: Vec<VoteMessage>) {
        if self.hub.down.read().contains(&to.address) {
            return;
        }
        let target = match self.hub.gates.read().get(&to.address) {
            Some(g) => g.clone(),
            None => return,
        };
        let from = self.from.clone();
        tokio::spawn(async move {
            deliver_state(state, &from, &target);
        });
    }
}

pub struct LoopbackCluster {
    pub hub: Arc<Hub>,
    pub peers: Vec<Peer>,
    pub gates: Vec<YacGate>,
    pub outcomes: Vec<mpsc::UnboundedReceiver<Outcome>>,
    pub sinks: Vec<Arc<RecordingSink>>,
}

impl LoopbackCluster {
    pub fn new(n: usize) -> Self {
        let hub = Arc::new(Hub::default());
        let keys = keys(n);
        let peers: Vec<Peer> =
            keys.iter().enumerate().map(|(i, k)| Peer::new(format!("node-{}", i), k.public())).collect();
        let mut gates = vec![];
        let mut outcomes = vec![];
        let mut sinks = vec![];
        for (i, key) in keys.iter().enumerate() {
            let net = Arc::new(LoopbackNetwork { from: peers[i].address.clone(), hub: hub.clone() });
            let sink = Arc::new(RecordingSink::default());
            let (gate, rx) = YacGate::new(
                Arc::new(CryptoProviderImpl::new(key.clone())),
                net,
                Some(sink.clone() as Arc<dyn CommitSink>),
                quiet_config(),
            );
            hub.register(&peers[i].address, gate.clone());
            gates.push(gate);
            outcomes.push(rx);
            sinks.push(sink);
        }
        Self { hub, peers, gates, outcomes, sinks }
    }

    pub fn order(&self) -> ClusterOrdering {
        ClusterOrdering::create(self.peers.clone()).unwrap()
    }

    pub fn switch(&self, nodes: std::ops::Range<usize>, round: Round) {
        for i in nodes {
            assert_eq!(self.gates[i].process_round_switch(round, &self.peers).unwrap(), None);
        }
    }

    /// Peers' votes may already have frozen the round on node `i`
    pub fn vote(&self, i: usize, hash: YacHash) {
        match self.gates[i].vote(hash, self.order(), None) {
            Ok(()) | Err(YacError::RoundFrozen(_)) => {}
            Err(e) => panic!("node {} failed to vote: {}", i, e),
        }
    }
}
