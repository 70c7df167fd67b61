//! YAC consensus node: leaderless supermajority voting over signed vote bundles.

pub mod consensus;
pub mod crypto;
pub mod network;
pub mod node;
pub mod utils;
