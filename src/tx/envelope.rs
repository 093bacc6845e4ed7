//! Signed Envelopes
//!
//! Every wallet version signs the representation hash of a version-specific
//! cell and wraps the signature and that cell into the external message body.
//! Versions split into two families by how they stop replays:
//! - counter: an on-chain seqno (v1 to v5, highload v1)
//! - query: a client-managed query id (highload v2 and v3)

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cell::{build_dict, ArcCell, Cell, CellBuilder};
use crate::error::{HawalaError, HawalaResult};
use crate::highload::QueryId;
use crate::types::send_mode;
use crate::wallet::{verify_signature, AuthScheme, KeyPair, WalletDescriptor, WalletVersion};

use super::message::{external_message, out_list, OutAction};

/// Prefix of a v5r1 external signed request ("sign")
pub const V5_SIGNED_EXTERNAL_OP: u32 = 0x7369_676e;
/// `valid_until` used for the very first (deploying) request
pub const NO_EXPIRY: u32 = u32::MAX;

/// Seqno and expiry for a counter-authorized request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterToken {
    pub seqno: u32,
    pub valid_until: u32,
}

/// Query id and timestamp for a query-authorized request.
/// The timestamp is `valid_until` for highload v2 and `created_at` for v3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryToken {
    pub query_id: QueryId,
    pub timestamp: u32,
}

/// Signature plus the body it was placed in
#[derive(Debug, Clone)]
pub struct SignedBody {
    pub signature: [u8; 64],
    pub body: ArcCell,
}

/// Builds and signs request bodies for one authorization family
pub trait EnvelopeBuilder {
    type Token;

    fn descriptor(&self) -> &WalletDescriptor;

    /// The cell whose hash is signed
    fn signing_cell(&self, token: &Self::Token, messages: &[OutAction]) -> HawalaResult<ArcCell>;

    /// Combine the signature with the signed cell
    fn assemble(&self, signature: &[u8; 64], signed: &ArcCell) -> HawalaResult<ArcCell>;

    fn max_messages(&self) -> usize {
        self.descriptor().version().max_actions()
    }

    fn sign(&self, keypair: &KeyPair, token: &Self::Token, messages: &[OutAction]) -> HawalaResult<SignedBody> {
        if &keypair.public_key() != self.descriptor().public_key() {
            return Err(HawalaError::crypto_error("Key pair does not belong to this wallet"));
        }
        let signed = self.signing_cell(token, messages)?;
        let signature = keypair.sign(&signed.hash());
        let body = self.assemble(&signature, &signed)?;
        Ok(SignedBody { signature, body })
    }
}

fn check_count(max: usize, messages: &[OutAction]) -> HawalaResult<()> {
    if messages.len() > max {
        return Err(HawalaError::batch_too_large(format!(
            "{} messages exceed the wallet limit of {}",
            messages.len(),
            max
        )));
    }
    Ok(())
}

/// `(mode:8, ^msg)` entries appended to the signed cell
fn store_inline_messages(b: &mut CellBuilder, messages: &[OutAction]) -> HawalaResult<()> {
    for m in messages {
        b.store_uint(m.mode as u128, 8)?.store_ref(m.message.clone())?;
    }
    Ok(())
}

/// `HashmapE 16` of `(mode:8, ^msg)` keyed by position
fn message_dict(messages: &[OutAction]) -> HawalaResult<Option<ArcCell>> {
    let mut map = BTreeMap::new();
    for (i, m) in messages.iter().enumerate() {
        let mut v = CellBuilder::new();
        v.store_uint(m.mode as u128, 8)?.store_ref(m.message.clone())?;
        map.insert(i as u64, v.build()?);
    }
    Ok(build_dict(16, &map)?)
}

/// Signature first, then the signed bits and references inline
fn signature_head(signature: &[u8; 64], signed: &Cell) -> HawalaResult<ArcCell> {
    let mut b = CellBuilder::new();
    b.store_bytes(signature)?.store_cell_contents(signed)?;
    Ok(b.build()?)
}

// =============================================================================
// Counter scheme
// =============================================================================

/// Seqno-protected wallets
#[derive(Debug, Clone)]
pub struct CounterAuthorized {
    descriptor: WalletDescriptor,
}

impl CounterAuthorized {
    pub fn new(descriptor: WalletDescriptor) -> HawalaResult<Self> {
        if descriptor.version().auth_scheme() != AuthScheme::Counter {
            return Err(HawalaError::invalid_input(format!(
                "{} is not seqno-authorized",
                descriptor.version()
            )));
        }
        Ok(Self { descriptor })
    }

    /// Expiry for a request at `now`. The deploying request never expires,
    /// except on v5r1 where the contract requires a real deadline.
    pub fn valid_until(&self, seqno: u32, now: u32, ttl: u32) -> u32 {
        if seqno == 0 && self.descriptor.version() != WalletVersion::V5R1 {
            NO_EXPIRY
        } else {
            now.saturating_add(ttl)
        }
    }
}

impl EnvelopeBuilder for CounterAuthorized {
    type Token = CounterToken;

    fn descriptor(&self) -> &WalletDescriptor {
        &self.descriptor
    }

    fn signing_cell(&self, token: &CounterToken, messages: &[OutAction]) -> HawalaResult<ArcCell> {
        check_count(self.max_messages(), messages)?;
        let d = &self.descriptor;
        let mut b = CellBuilder::new();
        match d.version() {
            WalletVersion::V1R1 | WalletVersion::V1R2 | WalletVersion::V1R3 => {
                b.store_uint(token.seqno as u128, 32)?;
                store_inline_messages(&mut b, messages)?;
            }
            WalletVersion::V2R1 | WalletVersion::V2R2 => {
                b.store_uint(token.seqno as u128, 32)?
                    .store_uint(token.valid_until as u128, 32)?;
                store_inline_messages(&mut b, messages)?;
            }
            WalletVersion::V3R1 | WalletVersion::V3R2 => {
                b.store_uint(d.wallet_id() as u128, 32)?
                    .store_uint(token.valid_until as u128, 32)?
                    .store_uint(token.seqno as u128, 32)?;
                store_inline_messages(&mut b, messages)?;
            }
            WalletVersion::V4R2 => {
                b.store_uint(d.wallet_id() as u128, 32)?
                    .store_uint(token.valid_until as u128, 32)?
                    .store_uint(token.seqno as u128, 32)?
                    .store_uint(0, 8)?; // simple send
                store_inline_messages(&mut b, messages)?;
            }
            WalletVersion::V5R1 => {
                let actions: Vec<OutAction> = messages
                    .iter()
                    .map(|m| OutAction::new(m.mode | send_mode::IGNORE_ERRORS, m.message.clone()))
                    .collect();
                let list = if actions.is_empty() {
                    None
                } else {
                    Some(out_list(&actions)?)
                };
                b.store_uint(V5_SIGNED_EXTERNAL_OP as u128, 32)?
                    .store_uint(d.wallet_id() as u128, 32)?
                    .store_uint(token.valid_until as u128, 32)?
                    .store_uint(token.seqno as u128, 32)?
                    .store_maybe_ref(list)?
                    .store_bit(false)?; // no extended actions
            }
            WalletVersion::HighloadV1 => {
                b.store_uint(d.wallet_id() as u128, 32)?
                    .store_uint(token.valid_until as u128, 32)?
                    .store_uint(token.seqno as u128, 32)?
                    .store_maybe_ref(message_dict(messages)?)?;
            }
            WalletVersion::HighloadV2 | WalletVersion::HighloadV3 => {
                return Err(HawalaError::internal("Query-authorized version in counter builder"));
            }
        }
        Ok(b.build()?)
    }

    fn assemble(&self, signature: &[u8; 64], signed: &ArcCell) -> HawalaResult<ArcCell> {
        if self.descriptor.version() == WalletVersion::V5R1 {
            let mut b = CellBuilder::new();
            b.store_cell_contents(signed)?.store_bytes(signature)?;
            return Ok(b.build()?);
        }
        signature_head(signature, signed)
    }
}

// =============================================================================
// Query scheme
// =============================================================================

/// Query-id protected highload wallets
#[derive(Debug, Clone)]
pub struct QueryAuthorized {
    descriptor: WalletDescriptor,
}

impl QueryAuthorized {
    pub fn new(descriptor: WalletDescriptor) -> HawalaResult<Self> {
        if descriptor.version().auth_scheme() != AuthScheme::Query {
            return Err(HawalaError::invalid_input(format!(
                "{} is not query-authorized",
                descriptor.version()
            )));
        }
        Ok(Self { descriptor })
    }

    /// Highload v2 query id: expiry in the high 32 bits
    pub fn highload_v2_query_id(token: &QueryToken) -> u64 {
        ((token.timestamp as u64) << 32) | token.query_id.combined() as u64
    }
}

impl EnvelopeBuilder for QueryAuthorized {
    type Token = QueryToken;

    fn descriptor(&self) -> &WalletDescriptor {
        &self.descriptor
    }

    fn max_messages(&self) -> usize {
        match self.descriptor.version() {
            WalletVersion::HighloadV3 => 1,
            v => v.max_actions(),
        }
    }

    fn signing_cell(&self, token: &QueryToken, messages: &[OutAction]) -> HawalaResult<ArcCell> {
        let d = &self.descriptor;
        let mut b = CellBuilder::new();
        match d.version() {
            WalletVersion::HighloadV2 => {
                check_count(self.max_messages(), messages)?;
                b.store_uint(d.wallet_id() as u128, 32)?
                    .store_uint(Self::highload_v2_query_id(token) as u128, 64)?
                    .store_maybe_ref(message_dict(messages)?)?;
            }
            WalletVersion::HighloadV3 => {
                let [message] = messages else {
                    return Err(HawalaError::invalid_input(
                        "Highload v3 requests carry exactly one message; pack batches first",
                    ));
                };
                b.store_uint(d.wallet_id() as u128, 32)?
                    .store_ref(message.message.clone())?
                    .store_uint(message.mode as u128, 8)?
                    .store_uint(token.query_id.combined() as u128, 23)?
                    .store_uint(token.timestamp as u128, 64)?
                    .store_uint(d.timeout() as u128, 22)?;
            }
            v => {
                return Err(HawalaError::internal(format!("{} in query builder", v)));
            }
        }
        Ok(b.build()?)
    }

    fn assemble(&self, signature: &[u8; 64], signed: &ArcCell) -> HawalaResult<ArcCell> {
        if self.descriptor.version() == WalletVersion::HighloadV3 {
            let mut b = CellBuilder::new();
            b.store_bytes(signature)?.store_ref(Arc::clone(signed))?;
            return Ok(b.build()?);
        }
        signature_head(signature, signed)
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// The authorization capability a descriptor exposes
#[derive(Debug, Clone)]
pub enum Authorization {
    Counter(CounterAuthorized),
    Query(QueryAuthorized),
}

impl WalletDescriptor {
    pub fn authorization(&self) -> Authorization {
        match self.version().auth_scheme() {
            AuthScheme::Counter => Authorization::Counter(CounterAuthorized {
                descriptor: self.clone(),
            }),
            AuthScheme::Query => Authorization::Query(QueryAuthorized {
                descriptor: self.clone(),
            }),
        }
    }
}

// =============================================================================
// External message
// =============================================================================

/// A signed request ready for submission. Never re-signed; resubmitting the
/// same BOC is idempotent on chain.
#[derive(Debug, Clone)]
pub struct SignedExternalMessage {
    signature: [u8; 64],
    envelope: ArcCell,
}

impl SignedExternalMessage {
    /// Wrap a signed body for `descriptor`, attaching `StateInit` when deploying
    pub fn new(descriptor: &WalletDescriptor, signed: SignedBody, deploy: bool) -> HawalaResult<Self> {
        let state_init = if deploy {
            Some(descriptor.state_init()?)
        } else {
            None
        };
        let envelope = external_message(descriptor.address(), state_init, signed.body)?;
        Ok(Self {
            signature: signed.signature,
            envelope,
        })
    }

    pub fn signature(&self) -> &[u8; 64] {
        &self.signature
    }

    pub fn envelope(&self) -> &ArcCell {
        &self.envelope
    }

    /// Hash of the external message, used to track it on chain
    pub fn hash_hex(&self) -> String {
        self.envelope.digest().hash_hex()
    }

    pub fn to_boc(&self) -> Vec<u8> {
        self.envelope.to_boc()
    }

    pub fn to_boc_base64(&self) -> String {
        self.envelope.to_boc_base64()
    }
}

/// Check a body produced by [`EnvelopeBuilder::sign`] against the wallet key
pub fn verify_body(descriptor: &WalletDescriptor, body: &Cell) -> HawalaResult<()> {
    let (signature, signed_hash) = match descriptor.version() {
        WalletVersion::HighloadV3 => {
            let mut s = body.parse();
            let sig = s.load_bytes(64)?;
            (sig, s.load_ref()?.hash())
        }
        WalletVersion::V5R1 => {
            let bits = body.bit_len();
            if bits < 512 {
                return Err(HawalaError::parse_error("Body too short for a signature"));
            }
            let mut signed = CellBuilder::new();
            for i in 0..bits - 512 {
                signed.store_bit(body.bit(i))?;
            }
            for child in body.refs() {
                signed.store_ref(child.clone())?;
            }
            let mut s = body.parse();
            for _ in 0..bits - 512 {
                s.load_bit()?;
            }
            (s.load_bytes(64)?, signed.build()?.hash())
        }
        _ => {
            let mut s = body.parse();
            let sig = s.load_bytes(64)?;
            (sig, s.remainder()?.hash())
        }
    };
    let signature: [u8; 64] = signature
        .try_into()
        .map_err(|_| HawalaError::parse_error("Malformed signature"))?;
    verify_signature(descriptor.public_key(), &signed_hash, &signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::TonAddress;
    use crate::tx::InternalMessage;
    use crate::wallet::{ContractCode, WalletOptions};

    fn keypair() -> KeyPair {
        KeyPair::from_seed(&[42u8; 32])
    }

    fn descriptor(version: WalletVersion) -> WalletDescriptor {
        let mut options = WalletOptions::default();
        if version == WalletVersion::HighloadV1 {
            // Highload v1 code is caller-supplied and only its digest matters here
            options = options.code(ContractCode::bundled(WalletVersion::V3R2).unwrap());
        }
        WalletDescriptor::from_keypair(version, &keypair(), options).unwrap()
    }

    fn message(amount: u128) -> OutAction {
        let msg = InternalMessage::new(TonAddress::new(0, [9; 32]), amount)
            .to_cell()
            .unwrap();
        OutAction::new(send_mode::DEFAULT, msg)
    }

    fn sign_any(d: &WalletDescriptor, messages: &[OutAction]) -> HawalaResult<SignedBody> {
        match d.authorization() {
            Authorization::Counter(c) => c.sign(
                &keypair(),
                &CounterToken {
                    seqno: 3,
                    valid_until: 1_700_000_060,
                },
                messages,
            ),
            Authorization::Query(q) => q.sign(
                &keypair(),
                &QueryToken {
                    query_id: QueryId::new(1, 2).unwrap(),
                    timestamp: 1_700_000_000,
                },
                messages,
            ),
        }
    }

    #[test]
    fn test_every_version_signs_verifiably() {
        for version in WalletVersion::ALL {
            let d = descriptor(version);
            let signed = sign_any(&d, &[message(1)]).unwrap();
            verify_body(&d, &signed.body).unwrap();
        }
    }

    #[test]
    fn test_v4r2_body_layout() {
        let d = descriptor(WalletVersion::V4R2);
        let signed = sign_any(&d, &[message(1), message(2)]).unwrap();
        let mut s = signed.body.parse();
        assert_eq!(s.load_bytes(64).unwrap(), signed.signature.to_vec());
        assert_eq!(s.load_u32(32).unwrap(), 698_983_191);
        assert_eq!(s.load_u32(32).unwrap(), 1_700_000_060);
        assert_eq!(s.load_u32(32).unwrap(), 3);
        assert_eq!(s.load_uint(8).unwrap(), 0);
        assert_eq!(s.load_uint(8).unwrap(), send_mode::DEFAULT as u128);
        assert_eq!(signed.body.refs().len(), 2);
    }

    #[test]
    fn test_v5r1_forces_ignore_errors_and_tail_signature() {
        let d = descriptor(WalletVersion::V5R1);
        let plain = OutAction::new(send_mode::PAY_GAS_SEPARATELY, message(1).message);
        let signed = sign_any(&d, &[plain]).unwrap();
        let mut s = signed.body.parse();
        assert_eq!(s.load_u32(32).unwrap(), V5_SIGNED_EXTERNAL_OP);
        assert_eq!(s.load_u32(32).unwrap(), d.wallet_id());
        s.load_u32(32).unwrap();
        assert_eq!(s.load_u32(32).unwrap(), 3);
        let list = s.load_maybe_ref().unwrap().unwrap();
        let actions = crate::tx::parse_out_list(list).unwrap();
        assert_eq!(actions[0].mode, send_mode::PAY_GAS_SEPARATELY | send_mode::IGNORE_ERRORS);
        assert!(!s.load_bit().unwrap());
        assert_eq!(s.load_bytes(64).unwrap(), signed.signature.to_vec());
    }

    #[test]
    fn test_highload_v3_layout() {
        let d = descriptor(WalletVersion::HighloadV3);
        let signed = sign_any(&d, &[message(7)]).unwrap();
        let mut s = signed.body.parse();
        s.load_bytes(64).unwrap();
        let inner = s.load_ref().unwrap();
        let mut s = inner.parse();
        assert_eq!(s.load_u32(32).unwrap(), 0x10ad);
        s.load_ref().unwrap();
        assert_eq!(s.load_uint(8).unwrap(), send_mode::DEFAULT as u128);
        assert_eq!(s.load_uint(23).unwrap(), (1 << 10) + 2);
        assert_eq!(s.load_u64(64).unwrap(), 1_700_000_000);
        assert_eq!(s.load_uint(22).unwrap(), 3600);
        s.end_parse().unwrap();

        assert!(sign_any(&d, &[message(1), message(2)]).is_err());
    }

    #[test]
    fn test_highload_v2_query_id() {
        let token = QueryToken {
            query_id: QueryId::new(1, 2).unwrap(),
            timestamp: 100,
        };
        assert_eq!(QueryAuthorized::highload_v2_query_id(&token), (100u64 << 32) | 1026);
        let d = descriptor(WalletVersion::HighloadV2);
        let too_many: Vec<_> = (0..255).map(|i| message(i as u128)).collect();
        let err = sign_any(&d, &too_many).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::BatchTooLarge);
    }

    #[test]
    fn test_legacy_message_limit_and_wrong_key() {
        let d = descriptor(WalletVersion::V3R2);
        let five: Vec<_> = (0..5).map(|i| message(i as u128)).collect();
        assert!(sign_any(&d, &five).is_err());

        let Authorization::Counter(c) = d.authorization() else {
            panic!("v3r2 is seqno-authorized");
        };
        let other = KeyPair::from_seed(&[1u8; 32]);
        let token = CounterToken { seqno: 0, valid_until: NO_EXPIRY };
        assert!(c.sign(&other, &token, &[]).is_err());
    }

    #[test]
    fn test_valid_until_for_first_request() {
        let Authorization::Counter(v4) = descriptor(WalletVersion::V4R2).authorization() else {
            panic!();
        };
        assert_eq!(v4.valid_until(0, 1000, 60), NO_EXPIRY);
        assert_eq!(v4.valid_until(1, 1000, 60), 1060);
        let Authorization::Counter(v5) = descriptor(WalletVersion::V5R1).authorization() else {
            panic!();
        };
        assert_eq!(v5.valid_until(0, 1000, 60), 1060);
    }

    #[test]
    fn test_deploy_requires_code() {
        let d = descriptor(WalletVersion::V3R2);
        let signed = sign_any(&d, &[]).unwrap();
        let ext = SignedExternalMessage::new(&d, signed.clone(), true).unwrap();
        assert_eq!(ext.envelope().refs().len(), 2);
        assert!(!ext.to_boc_base64().is_empty());

        let v4 = descriptor(WalletVersion::V4R2);
        let signed = sign_any(&v4, &[]).unwrap();
        assert!(SignedExternalMessage::new(&v4, signed.clone(), true).is_err());
        assert!(SignedExternalMessage::new(&v4, signed, false).is_ok());
    }
}
