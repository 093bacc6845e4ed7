//! Password Verification Record
//!
//! PBKDF2-HMAC-SHA256 hash of the wallet password with a random salt.
//! Comparison is constant time.

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{HawalaError, HawalaResult};
use crate::utils::{base64_decode, base64_encode};

pub const PASSWORD_RECORD_VERSION: u8 = 1;
pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 100_000;
const MIN_PASSWORD_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 32;
const HASH_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordRecord {
    pub version: u8,
    /// Base64
    pub hash: String,
    /// Base64
    pub salt: String,
    pub iterations: u32,
}

fn hash_password(password: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; HASH_LEN]> {
    let mut out = Zeroizing::new([0u8; HASH_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out[..]);
    out
}

impl PasswordRecord {
    /// Hash `password` with a fresh salt
    pub fn create(password: &str, iterations: u32) -> HawalaResult<Self> {
        if iterations < MIN_PASSWORD_ITERATIONS {
            return Err(HawalaError::invalid_input(format!(
                "Password hashing needs at least {} iterations",
                MIN_PASSWORD_ITERATIONS
            )));
        }
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let hash = hash_password(password, &salt, iterations);
        Ok(Self {
            version: PASSWORD_RECORD_VERSION,
            hash: base64_encode(&hash[..]),
            salt: base64_encode(&salt),
            iterations,
        })
    }

    /// True when `password` matches. A malformed record never matches.
    pub fn verify(&self, password: &str) -> bool {
        if self.version != PASSWORD_RECORD_VERSION || self.iterations == 0 {
            return false;
        }
        let (Ok(salt), Ok(expected)) = (base64_decode(&self.salt), base64_decode(&self.hash)) else {
            return false;
        };
        let actual = hash_password(password, &salt, self.iterations);
        bool::from(actual[..].ct_eq(&expected[..]))
    }
}
