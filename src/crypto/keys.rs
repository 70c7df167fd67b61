use crate::crypto::SignatureAlgorithm;
use crate::utils::{Result, YacError};
use ed25519_dalek::{Keypair as DalekKeypair, PublicKey as DalekPublic, SecretKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Public key tagged with the algorithm it verifies under.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey {
    pub algorithm: SignatureAlgorithm,
    pub bytes: Vec<u8>,
}

impl PublicKey {
    pub fn new(algorithm: SignatureAlgorithm, bytes: Vec<u8>) -> Self {
        Self { algorithm, bytes }
    }

    pub fn from_hex(algorithm: SignatureAlgorithm, s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| YacError::InvalidKey(e.to_string()))?;
        if bytes.len() != ed25519_dalek::PUBLIC_KEY_LENGTH {
            return Err(YacError::InvalidKey(format!("public key must be {} bytes", ed25519_dalek::PUBLIC_KEY_LENGTH)));
        }
        Ok(Self { algorithm, bytes })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}:{})", self.algorithm, self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Local signing key. Not `Clone`; share it behind an `Arc`.
pub struct Keypair {
    pub algorithm: SignatureAlgorithm,
    pub keypair: DalekKeypair,
}

impl Keypair {
    /// Generate a new random keypair
    pub fn generate(algorithm: SignatureAlgorithm) -> Self {
        let seed: [u8; 32] = rand::random();
        let sk = SecretKey::from_bytes(&seed).expect("32-byte seed is always a valid secret key");
        let pk = DalekPublic::from(&sk);
        Self { algorithm, keypair: DalekKeypair { secret: sk, public: pk } }
    }

    /// Construct from raw seed bytes
    pub fn from_seed(algorithm: SignatureAlgorithm, secret: &[u8]) -> Result<Self> {
        let sk = SecretKey::from_bytes(secret).map_err(|e| YacError::InvalidKey(e.to_string()))?;
        let pk = DalekPublic::from(&sk);
        Ok(Self { algorithm, keypair: DalekKeypair { secret: sk, public: pk } })
    }

    /// Load a hex-encoded seed from disk
    pub fn load<P: AsRef<Path>>(algorithm: SignatureAlgorithm, path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => YacError::MissingKey,
            _ => YacError::Io(e),
        })?;
        let seed = hex::decode(data.trim()).map_err(|e| YacError::InvalidKey(e.to_string()))?;
        Self::from_seed(algorithm, &seed)
    }

    /// Write the seed as hex to disk
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, hex::encode(self.seed_bytes()))?;
        Ok(())
    }

    /// Get public key
    pub fn public(&self) -> PublicKey {
        PublicKey::new(self.algorithm, self.keypair.public.to_bytes().to_vec())
    }

    /// Export secret as bytes
    pub fn seed_bytes(&self) -> [u8; 32] {
        self.keypair.secret.to_bytes()
    }
}
