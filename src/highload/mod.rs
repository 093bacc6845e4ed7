//! Highload Wallet Support
//!
//! Query-id issuance for the query-authorized wallets and batch packing
//! for highload v3.

mod packer;
mod query_id;

pub use packer::*;
pub use query_id::*;
