//! Wallet Contract Descriptors
//!
//! A descriptor binds a public key to one contract version and derives the
//! wallet's init data, `StateInit` and address. It is pure and immutable.

use std::sync::Arc;

use super::code::ContractCode;
use super::keypair::KeyPair;
use super::version::WalletVersion;
use crate::address::{TonAddress, BASE_WORKCHAIN, MASTER_WORKCHAIN};
use crate::cell::{compute_digest, ArcCell, Cell, CellBuilder};
use crate::error::{HawalaError, HawalaResult};
use crate::types::Network;

/// Largest highload v3 timeout (22-bit field)
pub const MAX_HIGHLOAD_TIMEOUT: u32 = (1 << 22) - 1;
/// Largest v5r1 subwallet number (15-bit field)
pub const MAX_V5_SUBWALLET_NUMBER: u32 = (1 << 15) - 1;

/// Default validity window for counter-scheme messages, in seconds
pub const DEFAULT_MESSAGE_TTL: u32 = 60;

/// Optional parameters for building a descriptor
#[derive(Debug, Clone)]
pub struct WalletOptions {
    pub workchain: i32,
    pub subwallet_id: Option<u32>,
    /// Highload v3 replay window, or the validity window for other versions
    pub timeout: Option<u32>,
    pub network: Network,
    /// Code to use instead of the bundled code. It must match the bundled
    /// code where the version has one.
    pub code: Option<ContractCode>,
}

impl Default for WalletOptions {
    fn default() -> Self {
        Self {
            workchain: BASE_WORKCHAIN,
            subwallet_id: None,
            timeout: None,
            network: Network::Mainnet,
            code: None,
        }
    }
}

impl WalletOptions {
    pub fn network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn workchain(mut self, workchain: i32) -> Self {
        self.workchain = workchain;
        self
    }

    pub fn subwallet_id(mut self, id: u32) -> Self {
        self.subwallet_id = Some(id);
        self
    }

    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn code(mut self, code: ContractCode) -> Self {
        self.code = Some(code);
        self
    }
}

/// Everything needed to address and authorize one wallet contract
#[derive(Debug, Clone)]
pub struct WalletDescriptor {
    version: WalletVersion,
    workchain: i32,
    subwallet_id: u32,
    timeout: u32,
    network: Network,
    public_key: [u8; 32],
    code: ContractCode,
    data: ArcCell,
    address: TonAddress,
}

impl WalletDescriptor {
    pub fn new(version: WalletVersion, public_key: [u8; 32], options: WalletOptions) -> HawalaResult<Self> {
        if options.workchain != BASE_WORKCHAIN && options.workchain != MASTER_WORKCHAIN {
            return Err(HawalaError::invalid_input(format!(
                "Unsupported workchain {}",
                options.workchain
            )));
        }

        let subwallet_id = options
            .subwallet_id
            .unwrap_or_else(|| version.default_subwallet_id(options.workchain));
        if version == WalletVersion::V5R1 && subwallet_id > MAX_V5_SUBWALLET_NUMBER {
            return Err(HawalaError::invalid_input(format!(
                "v5r1 subwallet number must fit 15 bits, got {}",
                subwallet_id
            )));
        }

        let timeout = options.timeout.unwrap_or(match version {
            WalletVersion::HighloadV3 => super::version::DEFAULT_HIGHLOAD_TIMEOUT,
            _ => DEFAULT_MESSAGE_TTL,
        });
        if timeout == 0 || (version == WalletVersion::HighloadV3 && timeout > MAX_HIGHLOAD_TIMEOUT) {
            return Err(HawalaError::invalid_input(format!("Invalid timeout {}", timeout)));
        }

        let code = match options.code {
            Some(code) => {
                code.check_version(version)?;
                code
            }
            None => ContractCode::bundled(version)?,
        };

        let mut descriptor = Self {
            version,
            workchain: options.workchain,
            subwallet_id,
            timeout,
            network: options.network,
            public_key,
            code,
            data: Cell::empty(),
            address: TonAddress::new(options.workchain, [0u8; 32]),
        };
        descriptor.data = descriptor.build_init_data()?;
        descriptor.address = TonAddress::new(descriptor.workchain, descriptor.state_init_hash())
            .set_testnet(descriptor.network.is_testnet());
        Ok(descriptor)
    }

    pub fn from_keypair(version: WalletVersion, keypair: &KeyPair, options: WalletOptions) -> HawalaResult<Self> {
        Self::new(version, keypair.public_key(), options)
    }

    pub fn version(&self) -> WalletVersion {
        self.version
    }

    pub fn workchain(&self) -> i32 {
        self.workchain
    }

    /// Subwallet id as configured (the subwallet number for v5r1)
    pub fn subwallet_id(&self) -> u32 {
        self.subwallet_id
    }

    pub fn timeout(&self) -> u32 {
        self.timeout
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    pub fn code(&self) -> &ContractCode {
        &self.code
    }

    pub fn init_data(&self) -> &ArcCell {
        &self.data
    }

    pub fn address(&self) -> &TonAddress {
        &self.address
    }

    /// The id written into signed messages. For v5r1 this mixes the network,
    /// the workchain and the subwallet number into one 32-bit value.
    pub fn wallet_id(&self) -> u32 {
        match self.version {
            WalletVersion::V5R1 => {
                let context = (1u32 << 31)
                    | ((self.workchain as i8 as u8 as u32) << 23)
                    | (self.subwallet_id & MAX_V5_SUBWALLET_NUMBER);
                (self.network.global_id() as u32) ^ context
            }
            _ => self.subwallet_id,
        }
    }

    fn build_init_data(&self) -> HawalaResult<ArcCell> {
        let mut b = CellBuilder::new();
        match self.version {
            WalletVersion::V1R1
            | WalletVersion::V1R2
            | WalletVersion::V1R3
            | WalletVersion::V2R1
            | WalletVersion::V2R2 => {
                b.store_uint(0, 32)?.store_bytes(&self.public_key)?;
            }
            WalletVersion::V3R1 | WalletVersion::V3R2 | WalletVersion::HighloadV1 => {
                b.store_uint(0, 32)?
                    .store_uint(self.subwallet_id as u128, 32)?
                    .store_bytes(&self.public_key)?;
            }
            WalletVersion::V4R2 => {
                b.store_uint(0, 32)?
                    .store_uint(self.subwallet_id as u128, 32)?
                    .store_bytes(&self.public_key)?
                    // empty plugins dictionary
                    .store_bit(false)?;
            }
            WalletVersion::V5R1 => {
                b.store_bit(true)?
                    .store_uint(0, 32)?
                    .store_uint(self.wallet_id() as u128, 32)?
                    .store_bytes(&self.public_key)?
                    // empty extensions dictionary
                    .store_bit(false)?;
            }
            WalletVersion::HighloadV2 => {
                b.store_uint(self.subwallet_id as u128, 32)?
                    .store_uint(0, 64)?
                    .store_bytes(&self.public_key)?
                    // empty old_queries dictionary
                    .store_bit(false)?;
            }
            WalletVersion::HighloadV3 => {
                b.store_bytes(&self.public_key)?
                    .store_uint(self.subwallet_id as u128, 32)?
                    // old_queries, queries, last_clean_time
                    .store_uint(0, 1 + 1 + 64)?
                    .store_uint(self.timeout as u128, 22)?;
            }
        }
        Ok(b.build()?)
    }

    /// `StateInit` representation hash from the code and data digests
    fn state_init_hash(&self) -> [u8; 32] {
        // split_depth:0 special:0 code:1 data:1 library:0
        let bits = [0b0011_0000u8];
        compute_digest(&bits, 5, &[self.code.digest(), self.data.digest()]).hash
    }

    /// Full `StateInit` cell for deployment
    pub fn state_init(&self) -> HawalaResult<ArcCell> {
        let mut b = CellBuilder::new();
        b.store_uint(0b00110, 5)?
            .store_ref(Arc::clone(self.code.cell()))?
            .store_ref(self.data.clone())?;
        Ok(b.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    const PUBLIC_KEY: &str = "ee5ced52345b7e8b702309a95d48ea004425cd0ec8d42893569ebceec9a3238a";

    fn public_key() -> [u8; 32] {
        hex::decode(PUBLIC_KEY).unwrap().try_into().unwrap()
    }

    #[test]
    fn test_v4r2_address_and_state_init() {
        let d = WalletDescriptor::new(WalletVersion::V4R2, public_key(), WalletOptions::default()).unwrap();
        assert_eq!(
            d.address().to_raw(),
            "0:e7a5a487b6f556fec6658380f4630dfdc6fe5e1a6228b4ebcc06ee5714441aaa"
        );
        assert_eq!(d.address().to_string(), "EQDnpaSHtvVW_sZlg4D0Yw39xv5eGmIotOvMBu5XFEQaqnj6");
        assert_eq!(d.state_init().unwrap().hash(), d.address().hash);
    }

    #[test]
    fn test_foreign_code_is_rejected() {
        let v3_code = ContractCode::bundled(WalletVersion::V3R2).unwrap();
        let err = WalletDescriptor::new(
            WalletVersion::V4R2,
            public_key(),
            WalletOptions::default().code(v3_code),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidBoc);

        // Supplying the matching code is the same as the bundled default
        let v4_code = ContractCode::bundled(WalletVersion::V4R2).unwrap();
        let d = WalletDescriptor::new(
            WalletVersion::V4R2,
            public_key(),
            WalletOptions::default().code(v4_code),
        )
        .unwrap();
        assert_eq!(d.address().to_string(), "EQDnpaSHtvVW_sZlg4D0Yw39xv5eGmIotOvMBu5XFEQaqnj6");
    }

    #[test]
    fn test_v3r2_address_and_state_init() {
        let d = WalletDescriptor::new(WalletVersion::V3R2, public_key(), WalletOptions::default()).unwrap();
        assert_eq!(
            d.address().clone().set_bounceable(false).to_string(),
            "UQBrYcnIMDsJOqlHUl_-Nqpk3Os0oW_tQKGkWhh94-01jXTE"
        );
        // With the full code available the cell hash matches the shortcut
        assert_eq!(d.state_init().unwrap().hash(), d.address().hash);
    }

    #[test]
    fn test_v5r1_wallet_id() {
        let d = WalletDescriptor::new(WalletVersion::V5R1, public_key(), WalletOptions::default()).unwrap();
        assert_eq!(d.wallet_id(), 2_147_483_409);

        let testnet = WalletDescriptor::new(
            WalletVersion::V5R1,
            public_key(),
            WalletOptions::default().network(Network::Testnet),
        )
        .unwrap();
        assert_eq!(testnet.wallet_id(), 2_147_483_645);
        assert!(testnet.address().testnet);
        assert_ne!(testnet.address().hash, d.address().hash);
    }

    #[test]
    fn test_highload_v3_address() {
        let d = WalletDescriptor::new(WalletVersion::HighloadV3, public_key(), WalletOptions::default()).unwrap();
        assert_eq!(d.subwallet_id(), 0x10ad);
        assert_eq!(d.timeout(), 3600);
        assert_eq!(d.init_data().bit_len(), 256 + 32 + 66 + 22);
        assert_eq!(
            d.address().to_raw(),
            "0:138bb166f5c7dc59f5ca8a5929dfb2fb3d95e37478dcda549c557212a4007a82"
        );
        assert_eq!(d.address().to_string(), "EQATi7Fm9cfcWfXKilkp37L7PZXjdHjc2lScVXISpAB6gnb3");
        assert_eq!(d.state_init().unwrap().hash(), d.address().hash);
    }

    #[test]
    fn test_highload_v1_requires_code() {
        let err = WalletDescriptor::new(WalletVersion::HighloadV1, public_key(), WalletOptions::default())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CodeUnavailable);

        let code = ContractCode::bundled(WalletVersion::V3R2).unwrap();
        let d = WalletDescriptor::new(WalletVersion::HighloadV1, public_key(), WalletOptions::default().code(code))
            .unwrap();
        // seqno first, which is what makes it counter-authorized
        let mut s = d.init_data().parse();
        assert_eq!(s.load_u32(32).unwrap(), 0);
        assert_eq!(s.load_u32(32).unwrap(), 698_983_191);
    }

    #[test]
    fn test_subwallet_changes_address() {
        let a = WalletDescriptor::new(WalletVersion::V3R2, public_key(), WalletOptions::default()).unwrap();
        let b = WalletDescriptor::new(
            WalletVersion::V3R2,
            public_key(),
            WalletOptions::default().subwallet_id(7),
        )
        .unwrap();
        assert_ne!(a.address().hash, b.address().hash);
    }

    #[test]
    fn test_invalid_options() {
        assert!(WalletDescriptor::new(WalletVersion::V4R2, public_key(), WalletOptions::default().workchain(5)).is_err());
        assert!(WalletDescriptor::new(
            WalletVersion::V5R1,
            public_key(),
            WalletOptions::default().subwallet_id(1 << 15)
        )
        .is_err());
    }
}
