//! Balance Watcher
//!
//! Background task that polls a wallet balance and publishes snapshots over
//! a watch channel. It only reads chain state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::client::ChainClient;
use crate::address::TonAddress;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub address: String,
    /// Nanotons
    pub balance: u128,
    pub fetched_at: DateTime<Utc>,
}

pub struct BalanceWatcher {
    receiver: watch::Receiver<Option<BalanceSnapshot>>,
    handle: JoinHandle<()>,
}

impl BalanceWatcher {
    /// Start polling on the current tokio runtime. The first poll runs immediately.
    pub fn spawn<C>(client: Arc<C>, address: TonAddress, interval: Duration) -> Self
    where
        C: ChainClient + ?Sized + 'static,
    {
        let (sender, receiver) = watch::channel(None);
        let period = interval.max(Duration::from_millis(10));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let label = address.to_string();

            loop {
                ticker.tick().await;
                match client.get_balance(&address).await {
                    Ok(balance) => {
                        let snapshot = BalanceSnapshot {
                            address: label.clone(),
                            balance,
                            fetched_at: Utc::now(),
                        };
                        if sender.send(Some(snapshot)).is_err() {
                            // Every receiver is gone
                            break;
                        }
                    }
                    Err(e) => {
                        crate::log_warn!(
                            "watcher",
                            "Balance poll failed, keeping last snapshot",
                            address = label,
                            error = e.message,
                        );
                    }
                }
            }
        });

        Self { receiver, handle }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<BalanceSnapshot>> {
        self.receiver.clone()
    }

    pub fn latest(&self) -> Option<BalanceSnapshot> {
        self.receiver.borrow().clone()
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for BalanceWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AccountStatus;
    use crate::error::{HawalaError, HawalaResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Balance grows by one each poll; every third poll fails
    struct Counting {
        polls: AtomicU32,
    }

    #[async_trait]
    impl ChainClient for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        async fn get_seqno(&self, _: &TonAddress) -> HawalaResult<u32> {
            Ok(0)
        }
        async fn get_balance(&self, _: &TonAddress) -> HawalaResult<u128> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if n % 3 == 0 {
                Err(HawalaError::timeout("poll timed out"))
            } else {
                Ok(n as u128)
            }
        }
        async fn get_account_status(&self, _: &TonAddress) -> HawalaResult<AccountStatus> {
            Ok(AccountStatus::Active)
        }
        async fn send_boc(&self, _: &[u8]) -> HawalaResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publishes_snapshots() {
        let client = Arc::new(Counting { polls: AtomicU32::new(0) });
        let address = TonAddress::new(0, [8; 32]);
        let watcher = BalanceWatcher::spawn(client.clone(), address.clone(), Duration::from_millis(10));
        let mut rx = watcher.subscribe();

        rx.changed().await.unwrap();
        let first = rx.borrow().clone().unwrap();
        assert_eq!(first.balance, 1);
        assert_eq!(first.address, address.to_string());

        // Poll 3 fails; the next published value comes from poll 4
        rx.changed().await.unwrap();
        rx.changed().await.unwrap();
        let later = watcher.latest().unwrap();
        assert!(later.balance >= 4);
        assert!(later.balance % 3 != 0);
        assert!(later.fetched_at >= first.fetched_at);
        watcher.stop();
    }
}
