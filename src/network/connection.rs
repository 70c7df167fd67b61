use crate::network::codec::{decode_message, encode_message, FrameCodec};
use crate::network::message::WireMessage;
use crate::network::tcp;
use crate::utils::metrics::{self, METRICS};
use crate::utils::YacError;
use anyhow::Result;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Outbound queue capacity per peer link
pub const OUT_CAP: usize = 1024;

/// Where deserialized inbound wire messages are delivered
pub type InboundSender = mpsc::UnboundedSender<(SocketAddr, WireMessage)>;
/// Outbound sender into a peer link
pub type OutboundSender = mpsc::Sender<WireMessage>;

/// An accepted inbound connection. The read task runs in background until the
/// peer hangs up or `close` is called. Malformed frames are skipped; the stream stays open.
pub struct Connection {
    pub peer_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    reader: JoinHandle<()>,
}

impl Connection {
    pub fn spawn(stream: TcpStream, inbound_tx: InboundSender) -> Result<Connection> {
        let peer_addr = stream.peer_addr()?;
        let mut reader = Framed::new(stream, FrameCodec::new());
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let reader_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => {
                        debug!("reader shutting down for {}", peer_addr);
                        return;
                    }
                    maybe = reader.next() => {
                        match maybe {
                            Some(Ok(bytes)) => match decode_message(&bytes) {
                                Ok(msg) => {
                                    if inbound_tx.send((peer_addr, msg)).is_err() {
                                        return;
                                    }
                                }
                                Err(e) => {
                                    METRICS.inc_counter(metrics::BUNDLES_DROPPED);
                                    warn!("undecodable frame from {}: {}", peer_addr, e);
                                }
                            },
                            Some(Err(e)) => {
                                warn!("read error from {}: {:?}", peer_addr, e);
                                return;
                            }
                            None => {
                                debug!("peer {} closed connection", peer_addr);
                                return;
                            }
                        }
                    }
                }
            }
        });

        Ok(Self { peer_addr, shutdown: shutdown_tx, reader: reader_task })
    }

    /// True once the read task has exited, e.g. after the peer hung up
    pub fn is_finished(&self) -> bool {
        self.reader.is_finished()
    }

    /// Force-close connection (signal the read task to stop)
    pub fn close(self) {
        let _ = self.shutdown.send(());
    }
}

/// Outgoing half towards one peer address: a queue drained by a writer task that
/// dials lazily and redials after a failed write. A message whose write fails is
/// dropped, never retried.
pub struct OutboundLink {
    pub addr: String,
    outbound: OutboundSender,
}

impl OutboundLink {
    /// Must be called inside a tokio runtime
    pub fn spawn(addr: String, send_timeout: Duration) -> Self {
        let (out_tx, mut out_rx) = mpsc::channel::<WireMessage>(OUT_CAP);
        let target = addr.clone();

        tokio::spawn(async move {
            let mut writer: Option<Framed<TcpStream, FrameCodec>> = None;
            while let Some(msg) = out_rx.recv().await {
                let frame = match encode_message(&msg) {
                    Ok(f) => f,
                    Err(e) => {
                        warn!("serialize error sending to {}: {}", target, e);
                        continue;
                    }
                };
                if writer.is_none() {
                    match tcp::connect(&target, send_timeout).await {
                        Ok(stream) => {
                            info!("connected to {}", target);
                            writer = Some(Framed::new(stream, FrameCodec::new()));
                        }
                        Err(e) => {
                            METRICS.inc_counter(metrics::SEND_FAILED);
                            warn!("Could not send votes to {}: {}", target, e);
                            continue;
                        }
                    }
                }
                if let Some(w) = writer.as_mut() {
                    let sent = tokio::time::timeout(send_timeout, w.send(frame)).await;
                    if !matches!(sent, Ok(Ok(()))) {
                        METRICS.inc_counter(metrics::SEND_FAILED);
                        warn!("Could not send votes to {}: write failed or timed out", target);
                        writer = None;
                    }
                }
            }
            debug!("outbound link to {} closed", target);
        });

        Self { addr, outbound: out_tx }
    }

    /// Queue without waiting. Fails when the queue is full or the writer is gone.
    pub fn try_send(&self, msg: WireMessage) -> crate::utils::Result<()> {
        self.outbound
            .try_send(msg)
            .map_err(|e| YacError::Network(format!("queue to {} unavailable: {}", self.addr, e)))
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}
