//! Node configuration, loaded from TOML. Every section is optional and falls back to defaults.
//!
//! ```toml
//! [node]
//! bind = "0.0.0.0:10001"
//! key_file = "node.key"
//! algorithm = "ed25519-sha256"
//!
//! [consensus]
//! vote_delay_ms = 1000
//!
//! [[peers]]
//! address = "10.0.0.2:10001"
//! public_key = "<64 hex chars>"
//! ```

use crate::consensus::cluster_order::Peer;
use crate::consensus::gate::GateConfig;
use crate::crypto::{PublicKey, SignatureAlgorithm};
use crate::utils::serde_helpers::hex_bytes;
use crate::utils::{Result, YacError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeSection,
    pub consensus: ConsensusSection,
    pub peers: Vec<PeerEntry>,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    pub bind: String,
    pub key_file: String,
    pub algorithm: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:10001".into(),
            key_file: "node.key".into(),
            algorithm: SignatureAlgorithm::default().name().into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusSection {
    /// rebroadcast period of our own vote
    pub vote_delay_ms: u64,
    pub max_rebroadcasts: u32,
    /// heights retained behind the current round
    pub storage_window: u64,
    pub send_timeout_ms: u64,
    /// pause after a decided round before voting the next one
    pub round_delay_ms: u64,
}

impl Default for ConsensusSection {
    fn default() -> Self {
        Self {
            vote_delay_ms: 1000,
            max_rebroadcasts: 5,
            storage_window: 10,
            send_timeout_ms: 3000,
            round_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerEntry {
    pub address: String,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    /// defaults to `[node] algorithm`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { filter: "info".into() }
    }
}

impl NodeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|e| YacError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(data: &str) -> Result<Self> {
        let cfg: NodeConfig = toml::from_str(data).map_err(|e| YacError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.peers.is_empty() {
            return Err(YacError::Config("at least one [[peers]] entry is required".into()));
        }
        self.algorithm()?;
        let mut seen = HashSet::new();
        for p in &self.peers {
            if !seen.insert(p.address.as_str()) {
                return Err(YacError::Config(format!("duplicate peer address {}", p.address)));
            }
            if p.public_key.len() != 32 {
                return Err(YacError::Config(format!(
                    "peer {}: public key must be 32 bytes, got {}",
                    p.address,
                    p.public_key.len()
                )));
            }
        }
        self.peer_list()?;
        Ok(())
    }

    pub fn algorithm(&self) -> Result<SignatureAlgorithm> {
        parse_algorithm(&self.node.algorithm)
    }

    pub fn peer_list(&self) -> Result<Vec<Peer>> {
        let default_alg = self.algorithm()?;
        self.peers
            .iter()
            .map(|p| {
                let alg = match &p.algorithm {
                    Some(a) => parse_algorithm(a)?,
                    None => default_alg,
                };
                Ok(Peer::new(p.address.clone(), PublicKey::new(alg, p.public_key.clone())))
            })
            .collect()
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            vote_delay: Duration::from_millis(self.consensus.vote_delay_ms),
            max_rebroadcasts: self.consensus.max_rebroadcasts,
            storage_window: self.consensus.storage_window,
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.consensus.send_timeout_ms)
    }

    pub fn round_delay(&self) -> Duration {
        Duration::from_millis(self.consensus.round_delay_ms)
    }
}

fn parse_algorithm(s: &str) -> Result<SignatureAlgorithm> {
    s.parse().map_err(|_| YacError::Config(format!("unknown signature algorithm {:?}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "3b6a27bcceb6a42d62a3a8d02a6f0d73653215771de243a63ac048a18b59da29";
    const KEY_B: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

    #[test]
    fn test_parse_full_config() {
        let cfg = NodeConfig::from_toml_str(&format!(
            r#"
            [node]
            bind = "127.0.0.1:7001"
            key_file = "/tmp/a.key"
            algorithm = "ed25519-blake3"

            [consensus]
            vote_delay_ms = 250
            max_rebroadcasts = 2

            [[peers]]
            address = "127.0.0.1:7001"
            public_key = "{KEY_A}"

            [[peers]]
            address = "127.0.0.1:7002"
            public_key = "{KEY_B}"
            algorithm = "ed25519-sha256"

            [logging]
            filter = "debug"
            "#
        ))
        .unwrap();
        assert_eq!(cfg.algorithm().unwrap(), SignatureAlgorithm::Ed25519Blake3);
        assert_eq!(cfg.consensus.storage_window, 10);
        assert_eq!(cfg.gate_config().vote_delay, Duration::from_millis(250));
        let peers = cfg.peer_list().unwrap();
        assert_eq!(peers[0].public_key.algorithm, SignatureAlgorithm::Ed25519Blake3);
        assert_eq!(peers[1].public_key.algorithm, SignatureAlgorithm::Ed25519Sha256);
        assert_eq!(peers[1].public_key.to_hex(), KEY_B);
        assert_eq!(cfg.logging.filter, "debug");
    }

    #[test]
    fn test_sections_default() {
        let cfg = NodeConfig::from_toml_str(&format!(
            "[[peers]]\naddress = \"127.0.0.1:7001\"\npublic_key = \"{KEY_A}\"\n"
        ))
        .unwrap();
        assert_eq!(cfg.node.bind, "0.0.0.0:10001");
        assert_eq!(cfg.algorithm().unwrap(), SignatureAlgorithm::Ed25519Sha256);
        assert_eq!(cfg.consensus.max_rebroadcasts, 5);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(matches!(NodeConfig::from_toml_str(""), Err(YacError::Config(_))));
        assert!(NodeConfig::from_toml_str("[[peers]]\naddress = \"a:1\"\npublic_key = \"zz\"\n").is_err());
        assert!(NodeConfig::from_toml_str("[[peers]]\naddress = \"a:1\"\npublic_key = \"abcd\"\n").is_err());
        let dup = format!(
            "[[peers]]\naddress = \"a:1\"\npublic_key = \"{KEY_A}\"\n[[peers]]\naddress = \"a:1\"\npublic_key = \"{KEY_B}\"\n"
        );
        assert!(NodeConfig::from_toml_str(&dup).is_err());
        let bad_alg = format!("[node]\nalgorithm = \"rsa\"\n[[peers]]\naddress = \"a:1\"\npublic_key = \"{KEY_A}\"\n");
        assert!(NodeConfig::from_toml_str(&bad_alg).is_err());
    }
}
