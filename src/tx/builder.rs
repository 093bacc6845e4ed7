//! Message Builder
//!
//! Turns transfer intents into wallet actions and signs them into external
//! messages once the caller has the authorization token.

use crate::address::TonAddress;
use crate::error::{ErrorCode, HawalaError, HawalaResult};
use crate::highload::{ActionPacker, BatchAction, QueryId};
use crate::types::{JettonTransferIntent, TransferIntent};
use crate::wallet::{KeyPair, WalletDescriptor, WalletVersion};

use super::envelope::{
    Authorization, CounterToken, EnvelopeBuilder, QueryToken, SignedExternalMessage,
};
use super::message::OutAction;
use super::payload::{comment_body, jetton_transfer_body};

/// Action for a native TON transfer
pub fn transfer_action(intent: &TransferIntent) -> HawalaResult<BatchAction> {
    let mut action = BatchAction::new(intent.destination.clone(), intent.amount)
        .with_bounce(intent.bounce)
        .with_send_mode(intent.send_mode);
    if let Some(text) = &intent.comment {
        action = action.with_body(comment_body(text)?);
    }
    Ok(action)
}

/// Action for a jetton transfer; `owner` is the sending wallet
pub fn jetton_action(intent: &JettonTransferIntent, owner: &TonAddress) -> HawalaResult<BatchAction> {
    if intent.attached_ton <= intent.forward_ton_amount {
        return Err(HawalaError::invalid_input(
            "Attached TON must exceed the forwarded amount to pay for processing",
        ));
    }
    let body = jetton_transfer_body(intent, owner)?;
    // Jetton wallets always exist, so a bounce returns the TON on failure
    Ok(BatchAction::new(intent.jetton_wallet.clone(), intent.attached_ton)
        .with_bounce(true)
        .with_body(body))
}

/// Builds signed external messages for one wallet
pub struct MessageBuilder<'a> {
    descriptor: &'a WalletDescriptor,
    keypair: &'a KeyPair,
}

impl<'a> MessageBuilder<'a> {
    pub fn new(descriptor: &'a WalletDescriptor, keypair: &'a KeyPair) -> Self {
        Self { descriptor, keypair }
    }

    pub fn descriptor(&self) -> &WalletDescriptor {
        self.descriptor
    }

    /// Seqno-authorized request. Seqno 0 deploys the wallet with the same message.
    pub fn counter_message(
        &self,
        seqno: u32,
        now: u32,
        ttl: u32,
        actions: &[BatchAction],
    ) -> HawalaResult<SignedExternalMessage> {
        let Authorization::Counter(auth) = self.descriptor.authorization() else {
            return Err(HawalaError::invalid_input(format!(
                "{} uses query ids, not seqno",
                self.descriptor.version()
            )));
        };
        let messages = to_out_actions(actions)?;
        let token = CounterToken {
            seqno,
            valid_until: auth.valid_until(seqno, now, ttl),
        };
        let signed = auth.sign(self.keypair, &token, &messages)?;
        SignedExternalMessage::new(self.descriptor, signed, seqno == 0)
    }

    /// Query-authorized request. `timestamp` is the expiry for highload v2
    /// and the creation time for highload v3.
    pub fn query_message(
        &self,
        query_id: QueryId,
        timestamp: u32,
        messages: &[OutAction],
        deploy: bool,
    ) -> HawalaResult<SignedExternalMessage> {
        let Authorization::Query(auth) = self.descriptor.authorization() else {
            return Err(HawalaError::invalid_input(format!(
                "{} uses seqno, not query ids",
                self.descriptor.version()
            )));
        };
        let token = QueryToken { query_id, timestamp };
        let signed = auth.sign(self.keypair, &token, messages)?;
        SignedExternalMessage::new(self.descriptor, signed, deploy)
    }

    /// Messages a query-authorized request carries. Highload v3 sends one
    /// transfer directly and packs anything larger into internal transfers.
    pub fn query_payload(
        &self,
        actions: &[BatchAction],
        query_id: QueryId,
        batch_value: u128,
    ) -> HawalaResult<Vec<OutAction>> {
        if actions.is_empty() {
            return Err(HawalaError::new(ErrorCode::EmptyBatch, "Batch has no actions"));
        }
        match self.descriptor.version() {
            WalletVersion::HighloadV3 if actions.len() > 1 => {
                let packer = ActionPacker::new(self.descriptor.address().clone(), batch_value);
                let packed = packer.pack(actions, query_id)?;
                Ok(vec![OutAction::new(packed.mode, packed.message)])
            }
            _ => to_out_actions(actions),
        }
    }
}

fn to_out_actions(actions: &[BatchAction]) -> HawalaResult<Vec<OutAction>> {
    actions.iter().map(BatchAction::to_out_action).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::{parse_external_message, parse_out_list, InternalMessage};
    use crate::wallet::WalletOptions;

    fn keypair() -> KeyPair {
        KeyPair::from_seed(&[5u8; 32])
    }

    fn dest() -> TonAddress {
        TonAddress::new(0, [0x33; 32])
    }

    #[test]
    fn test_transfer_action_with_comment() {
        let intent = TransferIntent::new(dest().set_bounceable(false), 10).with_comment("hello");
        let action = transfer_action(&intent).unwrap();
        assert!(!action.bounce);
        let out = action.to_out_action().unwrap();
        let msg = InternalMessage::parse(&out.message).unwrap();
        let body = msg.body.unwrap();
        assert_eq!(crate::tx::parse_comment(&body).unwrap().unwrap(), "hello");
    }

    #[test]
    fn test_jetton_action_requires_fee_margin() {
        let intent = JettonTransferIntent {
            jetton_wallet: dest(),
            destination: TonAddress::new(0, [1; 32]),
            response_destination: None,
            jetton_amount: 5,
            forward_ton_amount: 10,
            attached_ton: 10,
            comment: None,
            query_id: 0,
        };
        assert!(jetton_action(&intent, &dest()).is_err());
    }

    #[test]
    fn test_counter_message_deploys_at_seqno_zero() {
        let kp = keypair();
        let d = WalletDescriptor::from_keypair(WalletVersion::V3R2, &kp, WalletOptions::default()).unwrap();
        let builder = MessageBuilder::new(&d, &kp);
        let actions = vec![transfer_action(&TransferIntent::new(dest(), 1)).unwrap()];

        let first = builder.counter_message(0, 1000, 60, &actions).unwrap();
        let parsed = parse_external_message(first.envelope()).unwrap();
        assert!(parsed.state_init.is_some());
        assert!(parsed.destination.same_account(d.address()));

        let later = builder.counter_message(1, 1000, 60, &actions).unwrap();
        assert!(parse_external_message(later.envelope()).unwrap().state_init.is_none());
        assert_ne!(first.hash_hex(), later.hash_hex());

        assert!(builder.query_message(QueryId::new(0, 0).unwrap(), 0, &[], false).is_err());
    }

    #[test]
    fn test_highload_v3_payload() {
        let kp = keypair();
        let d = WalletDescriptor::from_keypair(WalletVersion::HighloadV3, &kp, WalletOptions::default()).unwrap();
        let builder = MessageBuilder::new(&d, &kp);
        let qid = QueryId::new(2, 3).unwrap();

        let single = vec![transfer_action(&TransferIntent::new(dest(), 1)).unwrap()];
        let direct = builder.query_payload(&single, qid, 0).unwrap();
        let msg = InternalMessage::parse(&direct[0].message).unwrap();
        assert!(msg.destination.same_account(&dest()));

        let many: Vec<_> = (0..3)
            .map(|i| transfer_action(&TransferIntent::new(dest(), i + 1)).unwrap())
            .collect();
        let packed = builder.query_payload(&many, qid, 0).unwrap();
        assert_eq!(packed.len(), 1);
        let hop = InternalMessage::parse(&packed[0].message).unwrap();
        assert!(hop.destination.same_account(d.address()));
        let body = hop.body.unwrap();
        let mut s = body.parse();
        s.load_u32(32).unwrap();
        s.load_u64(64).unwrap();
        assert_eq!(parse_out_list(s.load_ref().unwrap()).unwrap().len(), 3);

        let signed = builder.query_message(qid, 1000, &packed, true).unwrap();
        assert!(!signed.to_boc().is_empty());
        assert!(builder.query_payload(&[], qid, 0).is_err());
    }
}
