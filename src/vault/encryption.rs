//! Seed Encryption at Rest
//!
//! AES-256-GCM with a key derived from the wallet password. Every encryption
//! draws a fresh salt and nonce. The record's version tag names the KDF:
//! - 1: PBKDF2-HMAC-SHA256, 100,000 iterations
//! - 2: Argon2id, 64 MiB, 3 passes, 4 lanes

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{HawalaError, HawalaResult};
use crate::utils::{base64_decode, base64_encode};

pub const KDF_PBKDF2: u8 = 1;
pub const KDF_ARGON2ID: u8 = 2;

const PBKDF2_ITERATIONS: u32 = 100_000;
const ARGON2_MEMORY_KIB: u32 = 65_536;
const ARGON2_PASSES: u32 = 3;
const ARGON2_LANES: u32 = 4;

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Encrypted seed record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSeed {
    /// KDF version tag
    pub version: u8,
    /// 96-bit nonce, base64
    pub iv: String,
    /// Ciphertext with the GCM tag, base64
    pub ciphertext: String,
    /// Base64
    pub salt: String,
}

pub fn is_supported_kdf(version: u8) -> bool {
    matches!(version, KDF_PBKDF2 | KDF_ARGON2ID)
}

fn derive_key(version: u8, password: &str, salt: &[u8]) -> HawalaResult<Zeroizing<[u8; KEY_LEN]>> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    match version {
        KDF_ARGON2ID => {
            use argon2::{Algorithm, Argon2, Params, Version};

            let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_PASSES, ARGON2_LANES, Some(KEY_LEN))
                .map_err(|e| HawalaError::crypto_error(format!("Invalid KDF params: {}", e)))?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password_into(password.as_bytes(), salt, &mut key[..])
                .map_err(|e| HawalaError::crypto_error(format!("Key derivation failed: {}", e)))?;
        }
        // Unknown tags still pay for a derivation before failing
        _ => pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key[..]),
    }
    Ok(key)
}

/// Encrypt `plaintext` under `password` with the KDF named by `kdf_version`
pub fn encrypt(plaintext: &[u8], password: &str, kdf_version: u8) -> HawalaResult<EncryptedSeed> {
    if !is_supported_kdf(kdf_version) {
        return Err(HawalaError::invalid_input(format!("Unsupported KDF version {}", kdf_version)));
    }

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let key = derive_key(kdf_version, password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| HawalaError::crypto_error(format!("Failed to create cipher: {}", e)))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| HawalaError::crypto_error(format!("Encryption failed: {}", e)))?;

    Ok(EncryptedSeed {
        version: kdf_version,
        iv: base64_encode(&nonce),
        ciphertext: base64_encode(&ciphertext),
        salt: base64_encode(&salt),
    })
}

/// Decrypt a record. A wrong password and a damaged record fail the same way.
pub fn decrypt(record: &EncryptedSeed, password: &str) -> HawalaResult<Zeroizing<Vec<u8>>> {
    let salt = base64_decode(&record.salt).ok().filter(|s| s.len() == SALT_LEN);
    let nonce = base64_decode(&record.iv).ok().filter(|n| n.len() == NONCE_LEN);
    let ciphertext = base64_decode(&record.ciphertext).ok();

    let fallback_salt = [0u8; SALT_LEN];
    let key = derive_key(record.version, password, salt.as_deref().unwrap_or(&fallback_salt))?;

    let (Some(nonce), Some(ciphertext), true, true) =
        (nonce, ciphertext, salt.is_some(), is_supported_kdf(record.version))
    else {
        return Err(authentication_failed());
    };

    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| HawalaError::crypto_error(format!("Failed to create cipher: {}", e)))?;
    cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
        .map(Zeroizing::new)
        .map_err(|_| authentication_failed())
}

fn authentication_failed() -> HawalaError {
    HawalaError::auth_failed("Incorrect password or corrupted seed record")
}
