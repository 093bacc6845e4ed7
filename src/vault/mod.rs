//! Key & Mnemonic Vault
//!
//! Keeps the mnemonic encrypted at rest and hands out unlocked wallet
//! sessions. Records live in the injected key-value store under
//! `vault/password` and `vault/seed`.

mod encryption;
mod password;
mod session;

pub use encryption::*;
pub use password::*;
pub use session::*;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use zeroize::Zeroizing;

use crate::error::{ErrorCode, HawalaError, HawalaResult};
use crate::store::{get_json, put_json, KeyValueStore, VAULT_PASSWORD_KEY, VAULT_SEED_KEY};
use crate::wallet::{keypair_from_mnemonic, validate_mnemonic, WalletDescriptor, WalletOptions, WalletVersion};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    /// KDF for new seed records
    pub kdf_version: u8,
    /// PBKDF2 iterations for the password record
    pub pbkdf2_iterations: u32,
    pub session_idle_timeout_secs: u64,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            kdf_version: KDF_ARGON2ID,
            pbkdf2_iterations: DEFAULT_PASSWORD_ITERATIONS,
            session_idle_timeout_secs: DEFAULT_IDLE_TIMEOUT.as_secs(),
        }
    }
}

impl VaultSettings {
    pub fn validate(&self) -> HawalaResult<()> {
        if !is_supported_kdf(self.kdf_version) {
            return Err(HawalaError::invalid_input(format!(
                "Unsupported KDF version {}",
                self.kdf_version
            )));
        }
        if self.pbkdf2_iterations < DEFAULT_PASSWORD_ITERATIONS {
            return Err(HawalaError::invalid_input(format!(
                "Password hashing needs at least {} iterations",
                DEFAULT_PASSWORD_ITERATIONS
            )));
        }
        if self.session_idle_timeout_secs == 0 {
            return Err(HawalaError::invalid_input("Session idle timeout must be positive"));
        }
        Ok(())
    }
}

pub struct Vault<S: KeyValueStore> {
    store: S,
    settings: VaultSettings,
}

impl<S: KeyValueStore> Vault<S> {
    pub fn new(store: S, settings: VaultSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    pub fn has_password(&self) -> HawalaResult<bool> {
        Ok(self.store.get(VAULT_PASSWORD_KEY)?.is_some())
    }

    pub fn has_seed(&self) -> HawalaResult<bool> {
        Ok(self.store.get(VAULT_SEED_KEY)?.is_some())
    }

    /// Store a fresh password record, replacing any previous one
    pub fn setup_password(&self, password: &str) -> HawalaResult<()> {
        let record = PasswordRecord::create(password, self.settings.pbkdf2_iterations)?;
        put_json(&self.store, VAULT_PASSWORD_KEY, &record)?;
        crate::log_info!("vault", "Password record stored", iterations = record.iterations);
        Ok(())
    }

    /// False on mismatch, on a missing record, and when the store is unreadable
    pub fn verify_password(&self, password: &str) -> bool {
        match get_json::<PasswordRecord>(&self.store, VAULT_PASSWORD_KEY) {
            Ok(Some(record)) => record.verify(password),
            Ok(None) => false,
            Err(e) => {
                crate::log_warn!("vault", "Password record unreadable", error = e.message);
                false
            }
        }
    }

    pub fn encrypt(&self, plaintext: &[u8], password: &str) -> HawalaResult<EncryptedSeed> {
        encrypt(plaintext, password, self.settings.kdf_version)
    }

    pub fn decrypt(&self, record: &EncryptedSeed, password: &str) -> HawalaResult<Zeroizing<Vec<u8>>> {
        decrypt(record, password)
    }

    fn seed_record(&self) -> HawalaResult<EncryptedSeed> {
        get_json(&self.store, VAULT_SEED_KEY)?
            .ok_or_else(|| HawalaError::storage("No encrypted seed stored"))
    }

    /// Validate, normalize and store the phrase encrypted under `password`
    pub fn store_mnemonic(&self, phrase: &str, password: &str) -> HawalaResult<()> {
        validate_mnemonic(phrase, "")?;
        let normalized = Zeroizing::new(
            phrase
                .split_whitespace()
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
                .join(" "),
        );
        let record = self.encrypt(normalized.as_bytes(), password)?;
        put_json(&self.store, VAULT_SEED_KEY, &record)?;
        crate::log_info!("vault", "Encrypted seed stored", kdf_version = record.version);
        Ok(())
    }

    pub fn load_mnemonic(&self, password: &str) -> HawalaResult<SecretString> {
        let record = self.seed_record()?;
        let plaintext = self.decrypt(&record, password)?;
        phrase_from_plaintext(&plaintext)
    }

    /// Re-encrypt the seed under `new_password` and replace the password record.
    /// If the password record cannot be written the previous seed record is put
    /// back, so both records keep answering to the old password.
    pub fn change_password(&self, old_password: &str, new_password: &str) -> HawalaResult<()> {
        let previous = self.seed_record()?;
        let plaintext = self.decrypt(&previous, old_password)?;
        let reencrypted = self.encrypt(&plaintext, new_password)?;
        let password_record = PasswordRecord::create(new_password, self.settings.pbkdf2_iterations)?;

        put_json(&self.store, VAULT_SEED_KEY, &reencrypted)?;
        if let Err(e) = put_json(&self.store, VAULT_PASSWORD_KEY, &password_record) {
            if let Err(rollback) = put_json(&self.store, VAULT_SEED_KEY, &previous) {
                crate::log_error!("vault", "Seed rollback failed after password write error", error = rollback.message);
                return Err(e.with_details(format!("seed rollback failed: {}", rollback.message)));
            }
            crate::log_warn!("vault", "Password change rolled back", error = e.message);
            return Err(e);
        }
        crate::log_info!("vault", "Password changed");
        Ok(())
    }

    /// True when the stored seed uses a different KDF than configured
    pub fn needs_migration(&self) -> HawalaResult<bool> {
        Ok(self.seed_record()?.version != self.settings.kdf_version)
    }

    /// Re-encrypt the seed under the configured KDF. Returns whether it changed.
    pub fn migrate(&self, password: &str) -> HawalaResult<bool> {
        let record = self.seed_record()?;
        if record.version == self.settings.kdf_version {
            return Ok(false);
        }
        let plaintext = self.decrypt(&record, password)?;
        let migrated = self.encrypt(&plaintext, password)?;
        put_json(&self.store, VAULT_SEED_KEY, &migrated)?;
        crate::log_info!(
            "vault",
            "Seed record migrated",
            from_kdf = record.version,
            to_kdf = migrated.version,
        );
        Ok(true)
    }

    /// Decrypt the seed and open a session for one wallet version
    pub fn unlock(
        &self,
        password: &str,
        version: WalletVersion,
        options: WalletOptions,
    ) -> HawalaResult<WalletSession> {
        let phrase = self.load_mnemonic(password)?;
        let keypair = keypair_from_mnemonic(phrase.expose_secret(), "")?;
        let descriptor = WalletDescriptor::from_keypair(version, &keypair, options)?;

        if let Err(e) = self.migrate(password) {
            crate::log_warn!("vault", "Seed migration skipped", error = e.message);
        }

        crate::log_info!("vault", "Wallet unlocked", version = version, address = descriptor.address());
        WalletSession::new(
            keypair,
            descriptor,
            Duration::from_secs(self.settings.session_idle_timeout_secs),
        )
    }
}

fn phrase_from_plaintext(plaintext: &[u8]) -> HawalaResult<SecretString> {
    let phrase = std::str::from_utf8(plaintext)
        .map_err(|_| HawalaError::new(ErrorCode::AuthenticationFailed, "Incorrect password or corrupted seed record"))?;
    Ok(SecretString::from(phrase.to_string()))
}
