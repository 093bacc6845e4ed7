//! Wallet Flow Integration Tests
//!
//! Vault → session → sender → chain client, against an in-process chain.

use async_trait::async_trait;
use hawala_ton_core::api::{AccountStatus, ChainClient, CircuitConfig, ResilientClient, RetryPolicy};
use hawala_ton_core::cell::Cell;
use hawala_ton_core::highload::{ActionPacker, QueryIdCursor, QueryIdEngine};
use hawala_ton_core::store::{FileStore, MemoryStore};
use hawala_ton_core::tx::{
    parse_comment, parse_external_message, verify_body, InternalMessage, SendToken, SenderConfig, WalletSender,
};
use hawala_ton_core::vault::{Vault, VaultSettings, KDF_PBKDF2};
use hawala_ton_core::wallet::{WalletOptions, WalletVersion};
use hawala_ton_core::{ErrorCode, HawalaError, HawalaResult, TonAddress, TransferIntent};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MNEMONIC: &str = "advance achieve above agree addict airport accident allow alien adjust afford accident airport almost alpha air amount already absorb addict almost acoustic amazing adapt";

// MARK: - Helpers

/// In-process chain: fixed seqno and status, records every submitted BOC
struct FakeChain {
    seqno: u32,
    status: AccountStatus,
    failures_before_success: Mutex<u32>,
    submitted: Mutex<Vec<Vec<u8>>>,
}

impl FakeChain {
    fn new(seqno: u32, status: AccountStatus) -> Arc<Self> {
        Arc::new(Self {
            seqno,
            status,
            failures_before_success: Mutex::new(0),
            submitted: Mutex::new(Vec::new()),
        })
    }

    fn flaky(failures: u32) -> Arc<Self> {
        let chain = Self::new(5, AccountStatus::Active);
        *chain.failures_before_success.lock().unwrap() = failures;
        chain
    }

    fn submitted(&self) -> Vec<Vec<u8>> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    fn name(&self) -> &str {
        "fake"
    }

    async fn get_seqno(&self, _: &TonAddress) -> HawalaResult<u32> {
        Ok(self.seqno)
    }

    async fn get_balance(&self, _: &TonAddress) -> HawalaResult<u128> {
        Ok(10_000_000_000)
    }

    async fn get_account_status(&self, _: &TonAddress) -> HawalaResult<AccountStatus> {
        Ok(self.status)
    }

    async fn send_boc(&self, boc: &[u8]) -> HawalaResult<()> {
        let mut failures = self.failures_before_success.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(HawalaError::provider_unavailable("502 Bad Gateway"));
        }
        self.submitted.lock().unwrap().push(boc.to_vec());
        Ok(())
    }
}

fn clock() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_720_000_000)
}

fn vault() -> Vault<Arc<MemoryStore>> {
    let vault = Vault::new(
        Arc::new(MemoryStore::new()),
        VaultSettings {
            kdf_version: KDF_PBKDF2,
            ..VaultSettings::default()
        },
    );
    vault.setup_password("correct horse battery").unwrap();
    vault.store_mnemonic(MNEMONIC, "correct horse battery").unwrap();
    vault
}

fn recipients(n: usize) -> Vec<TransferIntent> {
    (0..n)
        .map(|i| {
            let mut hash = [0u8; 32];
            hash[..8].copy_from_slice(&(i as u64).to_be_bytes());
            TransferIntent::new(TonAddress::new(0, hash), 1_000_000 + i as u128)
        })
        .collect()
}

fn temp_dir(name: &str) -> std::path::PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let dir = std::env::temp_dir().join(format!("hawala-ton-{}-{}-{}", name, std::process::id(), nanos));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// MARK: - Counter wallets

#[tokio::test]
async fn test_v4r2_send_from_vault() {
    let vault = vault();
    assert!(vault.verify_password("correct horse battery"));
    let session = vault
        .unlock("correct horse battery", WalletVersion::V4R2, WalletOptions::default())
        .unwrap();
    assert_eq!(
        session.address().to_string(),
        "EQDnpaSHtvVW_sZlg4D0Yw39xv5eGmIotOvMBu5XFEQaqnj6"
    );

    let chain = FakeChain::new(7, AccountStatus::Active);
    let engine = Arc::new(QueryIdEngine::new(MemoryStore::new()));
    let sender = WalletSender::new(chain.clone(), engine, SenderConfig::default()).with_clock(clock);

    let intents = vec![TransferIntent::new(TonAddress::new(0, [1; 32]), 5_000).with_comment("rent")];
    let receipt = sender.send_transfers(&session, &intents).await.unwrap();

    assert_eq!(receipt.token, SendToken::Seqno(7));
    assert!(!receipt.deployed);
    let submitted = chain.submitted();
    assert_eq!(submitted, vec![receipt.boc.clone()]);

    let ext = parse_external_message(&Cell::from_boc(&submitted[0]).unwrap()).unwrap();
    assert!(ext.destination.same_account(session.address()));
    assert!(ext.state_init.is_none());
    verify_body(session.descriptor(), &ext.body).unwrap();
}

#[tokio::test]
async fn test_v4r2_comment_transfer_decodes_back() {
    let vault = vault();
    let session = vault
        .unlock("correct horse battery", WalletVersion::V4R2, WalletOptions::default())
        .unwrap();

    let chain = FakeChain::new(5, AccountStatus::Active);
    let engine = Arc::new(QueryIdEngine::new(MemoryStore::new()));
    let sender = WalletSender::new(chain.clone(), engine, SenderConfig::default()).with_clock(clock);

    let recipient = TonAddress::new(0, [0x5a; 32]);
    let intents = vec![TransferIntent::new(recipient.clone(), 1).with_comment("hi")];
    let receipt = sender.send_transfers(&session, &intents).await.unwrap();
    assert_eq!(receipt.token, SendToken::Seqno(5));

    let ext = parse_external_message(&Cell::from_boc(&chain.submitted()[0]).unwrap()).unwrap();
    verify_body(session.descriptor(), &ext.body).unwrap();

    let mut body = ext.body.parse();
    body.load_bytes(64).unwrap(); // signature
    assert_eq!(body.load_u32(32).unwrap(), 698_983_191);
    assert_eq!(body.load_u32(32).unwrap(), 1_720_000_060);
    assert_eq!(body.load_u32(32).unwrap(), 5);
    assert_eq!(body.load_uint(8).unwrap(), 0);
    body.load_uint(8).unwrap(); // send mode

    assert_eq!(ext.body.refs().len(), 1);
    let transfer = InternalMessage::parse(&ext.body.refs()[0]).unwrap();
    assert!(transfer.destination.same_account(&recipient));
    assert_eq!(transfer.amount, 1);
    let comment = transfer.body.expect("comment body");
    assert_eq!(parse_comment(&comment).unwrap(), Some("hi".to_string()));
}

#[tokio::test]
async fn test_wrong_password_never_reaches_chain() {
    let vault = vault();
    let err = vault
        .unlock("wrong", WalletVersion::V4R2, WalletOptions::default())
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthenticationFailed);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_transient_submit_failures_are_retried() {
    let vault = vault();
    let session = vault
        .unlock("correct horse battery", WalletVersion::V3R2, WalletOptions::default())
        .unwrap();

    let chain = FakeChain::flaky(2);
    let retry = RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 2,
        jitter: 0.0,
    };
    let client = Arc::new(
        ResilientClient::new(retry, Duration::from_secs(1)).with_provider(chain.clone(), &CircuitConfig::default()),
    );
    let engine = Arc::new(QueryIdEngine::new(MemoryStore::new()));
    let sender = WalletSender::new(client, engine, SenderConfig::default()).with_clock(clock);

    let receipt = sender.send_transfers(&session, &recipients(2)).await.unwrap();
    assert_eq!(receipt.token, SendToken::Seqno(5));
    // The identical BOC is what finally lands
    assert_eq!(chain.submitted(), vec![receipt.boc]);
}

// MARK: - Highload wallets

#[tokio::test]
async fn test_highload_v3_large_batch_is_chained() {
    let vault = vault();
    let session = vault
        .unlock("correct horse battery", WalletVersion::HighloadV3, WalletOptions::default())
        .unwrap();

    let chain = FakeChain::new(0, AccountStatus::Active);
    let engine = Arc::new(QueryIdEngine::with_clock(MemoryStore::new(), clock));
    let sender = WalletSender::new(chain.clone(), engine.clone(), SenderConfig::default()).with_clock(clock);

    let receipt = sender.send_transfers(&session, &recipients(600)).await.unwrap();
    assert_eq!(receipt.attempts, 1);

    let ext = parse_external_message(&Cell::from_boc(&receipt.boc).unwrap()).unwrap();
    verify_body(session.descriptor(), &ext.body).unwrap();
    let signed = &ext.body.refs()[0];
    let hop = &signed.refs()[0];
    let packer = ActionPacker::new(session.address().clone(), 0);
    assert_eq!(packer.flatten(hop).unwrap(), vec![253, 253, 94]);

    let SendToken::QueryId { query_id, .. } = receipt.token else {
        panic!("highload v3 must use a query id");
    };
    match engine.peek(session.address()).unwrap() {
        QueryIdCursor::Next(next) => assert!(next > query_id),
        other => panic!("unexpected cursor {:?}", other),
    }
}

#[tokio::test]
async fn test_query_ids_survive_restart() {
    let dir = temp_dir("restart");
    let vault = vault();
    let session = vault
        .unlock("correct horse battery", WalletVersion::HighloadV2, WalletOptions::default())
        .unwrap();
    let chain = FakeChain::new(0, AccountStatus::Active);

    let first = {
        let engine = Arc::new(QueryIdEngine::new(FileStore::open(&dir).unwrap()));
        let sender = WalletSender::new(chain.clone(), engine, SenderConfig::default()).with_clock(clock);
        sender.send_transfers(&session, &recipients(3)).await.unwrap()
    };
    let second = {
        let engine = Arc::new(QueryIdEngine::new(FileStore::open(&dir).unwrap()));
        let sender = WalletSender::new(chain.clone(), engine, SenderConfig::default()).with_clock(clock);
        sender.send_transfers(&session, &recipients(3)).await.unwrap()
    };

    match (first.token, second.token) {
        (SendToken::QueryId { query_id: a, .. }, SendToken::QueryId { query_id: b, .. }) => {
            assert_eq!(b, a.successor().unwrap());
        }
        other => panic!("unexpected tokens {:?}", other),
    }
    assert_eq!(chain.submitted().len(), 2);
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_locked_session_blocks_highload_send() {
    let vault = vault();
    let session = vault
        .unlock("correct horse battery", WalletVersion::HighloadV2, WalletOptions::default())
        .unwrap();
    session.lock();

    let chain = FakeChain::new(0, AccountStatus::Active);
    let engine = Arc::new(QueryIdEngine::new(MemoryStore::new()));
    let sender = WalletSender::new(chain.clone(), engine, SenderConfig::default());
    let err = sender.send_transfers(&session, &recipients(1)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::WalletLocked);
    assert!(chain.submitted().is_empty());
}
