//! Ed25519 key pair owned by an unlocked wallet session

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{ErrorCode, HawalaError, HawalaResult};

/// Ed25519 signing key and its public half.
///
/// The signing key is wiped on drop.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// From the 32-byte ed25519 seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// From the 64-byte secret key (seed followed by the public key)
    pub fn from_secret_key(secret: &[u8]) -> HawalaResult<Self> {
        let bytes: &[u8; 64] = secret
            .try_into()
            .map_err(|_| HawalaError::crypto_error("Secret key must be 64 bytes"))?;
        let signing_key = SigningKey::from_keypair_bytes(bytes)
            .map_err(|_| HawalaError::crypto_error("Secret key does not match its public key"))?;
        Ok(Self { signing_key })
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// 64-byte secret key (seed ‖ public key)
    pub fn secret_key(&self) -> Zeroizing<[u8; 64]> {
        Zeroizing::new(self.signing_key.to_keypair_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

/// Verify an ed25519 signature against a raw public key
pub fn verify_signature(public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> HawalaResult<()> {
    let key = VerifyingKey::from_bytes(public_key)
        .map_err(|_| HawalaError::new(ErrorCode::InvalidPublicKey, "Invalid ed25519 public key"))?;
    key.verify(message, &Signature::from_bytes(signature))
        .map_err(|_| HawalaError::crypto_error("Signature verification failed"))
}
