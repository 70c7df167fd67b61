use crate::crypto::{Keypair, PublicKey};
use crate::utils::{Result, YacError};
use ed25519_dalek::{Signature as DalekSig, Signer as DalekSigner, Verifier as DalekVerifier};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Signature schemes a peer key can be registered under.
/// The payload is digested first and the 32-byte digest is signed with Ed25519.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    Ed25519Sha256,
    Ed25519Blake3,
}

impl SignatureAlgorithm {
    /// Tag carried on the wire next to the public key
    pub fn tag(self) -> u8 {
        match self {
            SignatureAlgorithm::Ed25519Sha256 => 0,
            SignatureAlgorithm::Ed25519Blake3 => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(SignatureAlgorithm::Ed25519Sha256),
            1 => Ok(SignatureAlgorithm::Ed25519Blake3),
            other => Err(YacError::UnknownAlgorithm(other)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SignatureAlgorithm::Ed25519Sha256 => "ed25519-sha256",
            SignatureAlgorithm::Ed25519Blake3 => "ed25519-blake3",
        }
    }

    pub fn digest(self, msg: &[u8]) -> [u8; 32] {
        match self {
            SignatureAlgorithm::Ed25519Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(msg);
                let mut out = [0u8; 32];
                out.copy_from_slice(&hasher.finalize());
                out
            }
            SignatureAlgorithm::Ed25519Blake3 => *blake3::hash(msg).as_bytes(),
        }
    }
}

impl Default for SignatureAlgorithm {
    fn default() -> Self {
        SignatureAlgorithm::Ed25519Sha256
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = YacError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ed25519-sha256" => Ok(SignatureAlgorithm::Ed25519Sha256),
            "ed25519-blake3" => Ok(SignatureAlgorithm::Ed25519Blake3),
            other => Err(YacError::Config(format!("unknown signature algorithm '{}'", other))),
        }
    }
}

/// Opaque signature bytes; length depends on the algorithm.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.0))
    }
}

/// Trait for signing
pub trait Signer {
    fn sign(&self, msg: &[u8]) -> Signature;
}

/// Trait for verifying
pub trait Verifier {
    fn verify(&self, msg: &[u8], sig: &Signature) -> Result<()>;
}

impl Signer for Keypair {
    fn sign(&self, msg: &[u8]) -> Signature {
        let digest = self.algorithm.digest(msg);
        let sig = self.keypair.sign(&digest);
        Signature(sig.to_bytes().to_vec())
    }
}

impl Verifier for PublicKey {
    fn verify(&self, msg: &[u8], sig: &Signature) -> Result<()> {
        let pk = ed25519_dalek::PublicKey::from_bytes(&self.bytes)
            .map_err(|e| YacError::InvalidKey(e.to_string()))?;
        let ds = DalekSig::try_from(sig.0.as_slice())
            .map_err(|e| YacError::InvalidKey(format!("malformed signature: {}", e)))?;
        let digest = self.algorithm.digest(msg);
        pk.verify(&digest, &ds)
            .map_err(|_| YacError::InvalidKey("signature verification failed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_both_algorithms() {
        for alg in [SignatureAlgorithm::Ed25519Sha256, SignatureAlgorithm::Ed25519Blake3] {
            let kp = Keypair::generate(alg);
            let sig = kp.sign(b"payload");
            assert!(kp.public().verify(b"payload", &sig).is_ok());
            assert!(kp.public().verify(b"other", &sig).is_err());
        }
    }

    #[test]
    fn test_algorithm_mismatch_fails() {
        let kp = Keypair::generate(SignatureAlgorithm::Ed25519Sha256);
        let sig = kp.sign(b"payload");
        let mut pk = kp.public();
        pk.algorithm = SignatureAlgorithm::Ed25519Blake3;
        assert!(pk.verify(b"payload", &sig).is_err());
    }

    #[test]
    fn test_tags_and_names() {
        assert_eq!(SignatureAlgorithm::from_tag(1).unwrap(), SignatureAlgorithm::Ed25519Blake3);
        assert!(matches!(SignatureAlgorithm::from_tag(9), Err(YacError::UnknownAlgorithm(9))));
        assert_eq!("ed25519-sha256".parse::<SignatureAlgorithm>().unwrap(), SignatureAlgorithm::Ed25519Sha256);
        assert!("rsa".parse::<SignatureAlgorithm>().is_err());
    }
}
