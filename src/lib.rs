//! Hawala TON Core
//!
//! Non-custodial TON wallet core for the Hawala wallet.
//!
//! # Architecture
//!
//! This crate provides:
//! - **vault**: Encrypted mnemonic storage and unlocked wallet sessions
//! - **wallet**: TON mnemonics, key pairs and wallet contract descriptors (v1 to v5, highload)
//! - **highload**: Query-id issuance and batch packing for highload wallets
//! - **tx**: Message layouts, signing and the sender
//! - **api**: Chain clients with retry, circuit breaking and provider fallback
//! - **cell**: TVM cells and bag-of-cells serialization
//!
//! # Security
//!
//! Key material lives only inside an unlocked `WalletSession` and is wiped
//! when the session locks or drops. The mnemonic is stored encrypted with
//! AES-256-GCM under a password-derived key.
//!
//! # Example
//!
//! ```rust,ignore
//! use hawala_ton_core::{api, store::FileStore, vault::Vault, tx::WalletSender};
//!
//! let config = CoreConfig::from_file("hawala-ton.json")?;
//! let vault = Vault::new(FileStore::open(&dir)?, config.vault.clone());
//! let session = vault.unlock(&password, WalletVersion::V4R2, WalletOptions::default())?;
//! let sender = WalletSender::new(Arc::new(api::client_from_config(&config)?), engine, (&config).into());
//! let receipt = sender.send_transfers(&session, &[TransferIntent::new(to, to_nano("1.5")?)]).await?;
//! ```

pub mod address;
pub mod api;
pub mod cell;
pub mod config;
pub mod error;
pub mod highload;
pub mod store;
pub mod tx;
pub mod types;
pub mod utils;
pub mod vault;
pub mod wallet;

// Re-export key types for convenience
pub use address::TonAddress;
pub use config::CoreConfig;
pub use error::{ErrorCategory, ErrorCode, HawalaError, HawalaResult};
pub use types::*;
pub use utils::init_logging;
pub use vault::{Vault, WalletSession};
pub use wallet::{restore_wallet, KeyPair, WalletDescriptor, WalletOptions, WalletVersion};
