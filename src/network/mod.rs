//! Network module - framing, wire messages, TCP connections and the YAC vote transport.
//! Exposes TcpYacNetwork, YacServer, WireMessage.

pub mod codec;
pub mod message;
pub mod connection;
pub mod tcp;
pub mod yac_transport;

pub use connection::{Connection, OutboundLink};
pub use message::{StateMessage, WireMessage, WireVote};
pub use yac_transport::{TcpYacNetwork, YacServer};
