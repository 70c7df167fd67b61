use crate::consensus::types::{VoteMessage, YacHash};
use crate::crypto::{Keypair, Signer, Verifier};
use crate::utils::{Result, YacError};
use std::sync::Arc;
use tracing::debug;

/// Signs this node's votes and verifies incoming ones
pub trait YacCryptoProvider: Send + Sync + 'static {
    /// Fails only when the local key is missing or unusable
    fn sign(&self, hash: &YacHash) -> Result<VoteMessage>;

    /// All-or-nothing: false if any vote in the bundle fails to verify
    fn verify(&self, votes: &[VoteMessage]) -> bool;
}

/// Provider backed by the node keypair; the algorithm travels with each public key.
pub struct CryptoProviderImpl {
    keypair: Option<Arc<Keypair>>,
}

impl CryptoProviderImpl {
    pub fn new(keypair: Arc<Keypair>) -> Self {
        Self { keypair: Some(keypair) }
    }

    /// Verify-only provider for a node whose signing key could not be loaded
    pub fn without_key() -> Self {
        Self { keypair: None }
    }
}

impl YacCryptoProvider for CryptoProviderImpl {
    fn sign(&self, hash: &YacHash) -> Result<VoteMessage> {
        let keypair = self.keypair.as_ref().ok_or(YacError::MissingKey)?;
        let signature = keypair.sign(&hash.canonical_bytes());
        Ok(VoteMessage {
            hash: hash.clone(),
            signature,
            public_key: keypair.public(),
        })
    }

    fn verify(&self, votes: &[VoteMessage]) -> bool {
        votes.iter().all(|vote| match vote.public_key.verify(&vote.hash.canonical_bytes(), &vote.signature) {
            Ok(()) => true,
            Err(e) => {
                debug!("vote from {} failed verification: {}", vote.public_key, e);
                false
            }
        })
    }
}
