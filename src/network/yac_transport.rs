//! TCP implementation of the vote transport.
//!
//! `TcpYacNetwork` queues bundles on a per-peer outbound link; `YacServer` accepts
//! connections and hands decoded bundles to the consensus gate.

use crate::consensus::cluster_order::Peer;
use crate::consensus::transport::{deliver_state, YacNetwork, YacNetworkNotifications};
use crate::consensus::types::VoteMessage;
use crate::network::connection::{Connection, OutboundLink};
use crate::network::message::{StateMessage, WireMessage};
use crate::network::tcp;
use crate::utils::metrics::{self, METRICS};
use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

pub struct TcpYacNetwork {
    links: Mutex<HashMap<String, OutboundLink>>,
    send_timeout: Duration,
}

impl TcpYacNetwork {
    pub fn new(send_timeout: Duration) -> Self {
        Self { links: Mutex::new(HashMap::new()), send_timeout }
    }
}

impl YacNetwork for TcpYacNetwork {
    fn send_state(&self, to: &Peer, state: Vec<VoteMessage>) {
        if tokio::runtime::Handle::try_current().is_err() {
            METRICS.inc_counter(metrics::SEND_FAILED);
            warn!("no runtime, dropping {} votes for {}", state.len(), to.address);
            return;
        }
        let msg = WireMessage::State(StateMessage::from_votes(&state));
        let mut links = self.links.lock();
        let stale = links.get(&to.address).map_or(true, |l| l.is_closed());
        if stale {
            links.insert(to.address.clone(), OutboundLink::spawn(to.address.clone(), self.send_timeout));
        }
        if let Some(link) = links.get(&to.address) {
            match link.try_send(msg) {
                Ok(()) => debug!("queued {} votes for {}", state.len(), to.address),
                Err(e) => {
                    METRICS.inc_counter(metrics::SEND_FAILED);
                    warn!("Could not send votes to {}: {}", to.address, e);
                }
            }
        }
    }
}

pub struct YacServer {
    listener: TcpListener,
}

impl YacServer {
    /// Bind the listener; returns the actual local address (useful with port 0)
    pub async fn bind(addr: &str) -> Result<(Self, SocketAddr)> {
        let listener = tcp::bind(addr).await?;
        let local = listener.local_addr()?;
        info!("listening for votes on {}", local);
        Ok((Self { listener }, local))
    }

    /// Accept connections and deliver bundles to `handler` until `shutdown` flips to true
    pub async fn run(self, handler: Arc<dyn YacNetworkNotifications>, mut shutdown: watch::Receiver<bool>) {
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<(SocketAddr, WireMessage)>();
        let mut conns: Vec<Connection> = Vec::new();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => match Connection::spawn(stream, inbound_tx.clone()) {
                        Ok(conn) => {
                            debug!("accepted connection from {}", peer_addr);
                            reap_finished(&mut conns);
                            conns.push(conn);
                        }
                        Err(e) => warn!("failed to set up connection from {}: {}", peer_addr, e),
                    },
                    Err(e) => warn!("accept error: {}", e),
                },
                Some((from, msg)) = inbound_rx.recv() => match msg {
                    WireMessage::State(state) => {
                        deliver_state(state.into_votes(), &from.to_string(), handler.as_ref());
                    }
                },
            }
        }

        for conn in conns {
            conn.close();
        }
        info!("vote server stopped");
    }
}

/// Drop connections whose peer already went away
fn reap_finished(conns: &mut Vec<Connection>) {
    let before = conns.len();
    conns.retain(|c| !c.is_finished());
    if conns.len() < before {
        debug!("released {} closed connections", before - conns.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_closed_connections_are_released() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut conns = Vec::new();
        let mut clients = Vec::new();
        for _ in 0..3 {
            clients.push(TcpStream::connect(addr).await.unwrap());
            let (stream, _) = listener.accept().await.unwrap();
            conns.push(Connection::spawn(stream, tx.clone()).unwrap());
        }

        clients.truncate(1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        reap_finished(&mut conns);
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].peer_addr, clients[0].local_addr().unwrap());
    }
}
