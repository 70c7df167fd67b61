//! Crypto module: key management, signing, verification.
//!
//! - Keys: generation, hex seed files, algorithm-tagged public keys
//! - Sign: digest-then-Ed25519 signatures over SHA-256 or BLAKE3

pub mod keys;
pub mod sign;

pub use keys::{Keypair, PublicKey};
pub use sign::{Signature, SignatureAlgorithm, Signer, Verifier};
