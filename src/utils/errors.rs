use crate::consensus::round::Round;
use thiserror::Error;

/// Unified error type for the consensus node
#[derive(Error, Debug)]
pub enum YacError {
    #[error("peer list for round is empty")]
    EmptyPeerList,

    #[error("malformed peer: {0}")]
    MalformedPeer(String),

    #[error("local signing key is missing")]
    MissingKey,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("unknown signature algorithm tag {0}")]
    UnknownAlgorithm(u8),

    #[error("consensus gate is stopped")]
    Stopped,

    #[error("already voted in round {0}")]
    AlreadyVoted(Round),

    #[error("round {0} is frozen")]
    RoundFrozen(Round),

    #[error("round {0} is behind the current round")]
    StaleRound(Round),

    #[error("network error: {0}")]
    Network(String),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias
pub type Result<T> = std::result::Result<T, YacError>;
