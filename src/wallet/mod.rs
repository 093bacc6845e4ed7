//! Wallet Module
//!
//! Key material, mnemonic handling and the wallet contract descriptors
//! that turn a public key into an address.

mod code;
mod descriptor;
mod keypair;
pub mod mnemonic;
mod version;

pub use code::*;
pub use descriptor::*;
pub use keypair::*;
pub use mnemonic::{generate_mnemonic, keypair_from_mnemonic, validate_mnemonic, TON_MNEMONIC_WORDS};
pub use version::*;

use crate::error::HawalaResult;

/// Restore a key pair from a phrase and build the descriptor for `version`
pub fn restore_wallet(
    phrase: &str,
    version: WalletVersion,
    options: WalletOptions,
) -> HawalaResult<(KeyPair, WalletDescriptor)> {
    let keypair = keypair_from_mnemonic(phrase, "")?;
    let descriptor = WalletDescriptor::from_keypair(version, &keypair, options)?;
    Ok((keypair, descriptor))
}
