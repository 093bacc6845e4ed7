//! Wallet Session
//!
//! Holds the decrypted key pair of one wallet while it is unlocked:
//! - explicit `lock()` drops the key material
//! - an idle timeout locks the session on the next access
//! - every key access refreshes the activity clock

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::address::TonAddress;
use crate::error::{HawalaError, HawalaResult};
use crate::wallet::{KeyPair, WalletDescriptor};

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Locked,
    /// Locked by the idle timeout
    Expired,
}

#[derive(Debug)]
struct SessionInner {
    keypair: Option<KeyPair>,
    last_activity: Instant,
    state: SessionState,
}

#[derive(Debug)]
pub struct WalletSession {
    descriptor: WalletDescriptor,
    idle_timeout: Duration,
    inner: Mutex<SessionInner>,
}

impl WalletSession {
    pub fn new(keypair: KeyPair, descriptor: WalletDescriptor, idle_timeout: Duration) -> HawalaResult<Self> {
        if &keypair.public_key() != descriptor.public_key() {
            return Err(HawalaError::crypto_error("Key pair does not belong to this wallet"));
        }
        Ok(Self {
            descriptor,
            idle_timeout,
            inner: Mutex::new(SessionInner {
                keypair: Some(keypair),
                last_activity: Instant::now(),
                state: SessionState::Active,
            }),
        })
    }

    pub fn descriptor(&self) -> &WalletDescriptor {
        &self.descriptor
    }

    pub fn address(&self) -> &TonAddress {
        self.descriptor.address()
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    fn inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lock the session if it sat idle past the timeout
    fn expire_if_idle(&self, inner: &mut SessionInner) {
        if inner.state == SessionState::Active && inner.last_activity.elapsed() >= self.idle_timeout {
            inner.keypair = None;
            inner.state = SessionState::Expired;
            crate::log_info!("session", "Session locked after idle timeout", wallet = self.descriptor.address());
        }
    }

    pub fn state(&self) -> SessionState {
        let mut inner = self.inner();
        self.expire_if_idle(&mut inner);
        inner.state
    }

    pub fn is_locked(&self) -> bool {
        self.state() != SessionState::Active
    }

    /// Drop the key material
    pub fn lock(&self) {
        let mut inner = self.inner();
        inner.keypair = None;
        inner.state = SessionState::Locked;
        crate::log_info!("session", "Session locked", wallet = self.descriptor.address());
    }

    /// Re-arm a locked session with the wallet's key pair
    pub fn unlock(&self, keypair: KeyPair) -> HawalaResult<()> {
        if &keypair.public_key() != self.descriptor.public_key() {
            return Err(HawalaError::crypto_error("Key pair does not belong to this wallet"));
        }
        let mut inner = self.inner();
        inner.keypair = Some(keypair);
        inner.last_activity = Instant::now();
        inner.state = SessionState::Active;
        Ok(())
    }

    /// Run `f` with the key pair. Fails with `WalletLocked` when locked.
    pub fn with_keypair<T>(&self, f: impl FnOnce(&KeyPair) -> HawalaResult<T>) -> HawalaResult<T> {
        let mut inner = self.inner();
        self.expire_if_idle(&mut inner);
        inner.last_activity = Instant::now();
        match inner.keypair.as_ref() {
            Some(keypair) => f(keypair),
            None => Err(HawalaError::wallet_locked("Wallet session is locked")),
        }
    }

    pub fn sign(&self, message: &[u8]) -> HawalaResult<[u8; 64]> {
        self.with_keypair(|kp| Ok(kp.sign(message)))
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.get_mut() {
            inner.keypair = None;
        }
    }
}
