//! Highload Query IDs
//!
//! Highload wallets reject replays by remembering recently used query ids
//! instead of keeping a seqno. A query id is a `(shift, bit_number)` pair:
//! 13 bits of shift and 10 bits of bit number, combined into 23 bits.
//!
//! The engine hands out ids in strictly increasing order per wallet address
//! and persists the advanced state before returning, so a restart never
//! issues the same id twice.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::address::TonAddress;
use crate::error::{HawalaError, HawalaResult};
use crate::store::{get_json, put_json, KeyValueStore, QUERY_ID_PREFIX};

/// Largest shift value (13 bits)
pub const MAX_SHIFT: u16 = 8191;
/// Largest bit number. 1023 is reserved by the contract.
pub const MAX_BIT_NUMBER: u16 = 1022;

const RECORD_VERSION: u8 = 1;
/// Shift value recorded once every id has been issued
const EXHAUSTED_SHIFT: u16 = MAX_SHIFT + 1;

/// One highload query id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryId {
    shift: u16,
    bit_number: u16,
}

impl QueryId {
    pub fn new(shift: u16, bit_number: u16) -> HawalaResult<Self> {
        if shift > MAX_SHIFT || bit_number > MAX_BIT_NUMBER {
            return Err(HawalaError::invalid_input(format!(
                "Query id out of range: shift {} bit {}",
                shift, bit_number
            )));
        }
        Ok(Self { shift, bit_number })
    }

    /// Starting point for a wallet with no stored state
    pub fn seeded(now: SystemTime) -> Self {
        let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            shift: (since_epoch.as_secs() % (MAX_SHIFT as u64 + 1)) as u16,
            bit_number: (since_epoch.as_millis() % (MAX_BIT_NUMBER as u128 + 1)) as u16,
        }
    }

    pub fn from_combined(combined: u32) -> HawalaResult<Self> {
        Self::new((combined >> 10) as u16, (combined & 0x3ff) as u16)
    }

    pub fn shift(&self) -> u16 {
        self.shift
    }

    pub fn bit_number(&self) -> u16 {
        self.bit_number
    }

    /// `(shift << 10) + bit_number`, the 23-bit on-chain value
    pub fn combined(&self) -> u32 {
        ((self.shift as u32) << 10) + self.bit_number as u32
    }

    /// The following id, or `None` past the last one
    pub fn successor(&self) -> Option<QueryId> {
        if self.bit_number < MAX_BIT_NUMBER {
            Some(Self {
                shift: self.shift,
                bit_number: self.bit_number + 1,
            })
        } else if self.shift < MAX_SHIFT {
            Some(Self {
                shift: self.shift + 1,
                bit_number: 0,
            })
        } else {
            None
        }
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.shift, self.bit_number)
    }
}

/// Where a wallet's query-id sequence stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIdCursor {
    /// Nothing issued yet; the first `next` seeds from the clock
    Fresh,
    /// The id the next call to `next` returns
    Next(QueryId),
    /// Every id has been issued
    Exhausted,
}

#[derive(Debug, Serialize, Deserialize)]
struct QueryIdRecord {
    version: u8,
    shift: u16,
    bit_number: u16,
}

impl QueryIdRecord {
    fn from_cursor(cursor: Option<QueryId>) -> Self {
        match cursor {
            Some(q) => Self {
                version: RECORD_VERSION,
                shift: q.shift,
                bit_number: q.bit_number,
            },
            None => Self {
                version: RECORD_VERSION,
                shift: EXHAUSTED_SHIFT,
                bit_number: 0,
            },
        }
    }

    fn into_cursor(self, key: &str) -> HawalaResult<QueryIdCursor> {
        if self.version != RECORD_VERSION {
            return Err(HawalaError::storage(format!(
                "Unsupported query id record version {} at {}",
                self.version, key
            )));
        }
        if self.shift == EXHAUSTED_SHIFT {
            return Ok(QueryIdCursor::Exhausted);
        }
        QueryId::new(self.shift, self.bit_number)
            .map(QueryIdCursor::Next)
            .map_err(|e| HawalaError::storage(format!("Corrupt query id record at {}", key)).with_details(e.message))
    }
}

/// Issues and persists query ids, one serialized sequence per wallet address
pub struct QueryIdEngine<S: KeyValueStore> {
    store: S,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    clock: fn() -> SystemTime,
}

impl<S: KeyValueStore> QueryIdEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemTime::now)
    }

    pub fn with_clock(store: S, clock: fn() -> SystemTime) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return the current id for `address` and persist its successor
    pub fn next(&self, address: &TonAddress) -> HawalaResult<QueryId> {
        let key = record_key(address);
        let lock = self.lock_for(&key)?;
        let _guard = lock
            .lock()
            .map_err(|_| HawalaError::internal("Query id lock poisoned"))?;

        let current = match self.load(&key)? {
            QueryIdCursor::Fresh => QueryId::seeded((self.clock)()),
            QueryIdCursor::Next(q) => q,
            QueryIdCursor::Exhausted => {
                return Err(HawalaError::query_id_exhausted(format!(
                    "All query ids issued for {}; rotate the wallet or reseed after the timeout window",
                    address
                )));
            }
        };

        let advanced = current.successor();
        put_json(&self.store, &key, &QueryIdRecord::from_cursor(advanced))?;
        if advanced.is_none() {
            crate::log_warn!("query_id", "Query id space exhausted", address = address.to_string());
        }
        crate::log_debug!("query_id", "Issued query id", query_id = current, address = address.to_string());
        Ok(current)
    }

    /// Read-only view of the sequence
    pub fn peek(&self, address: &TonAddress) -> HawalaResult<QueryIdCursor> {
        self.load(&record_key(address))
    }

    /// Restart the sequence from the clock. Only safe once the contract's
    /// timeout window has passed since the last send.
    pub fn reseed(&self, address: &TonAddress) -> HawalaResult<QueryId> {
        let seeded = QueryId::seeded((self.clock)());
        self.write_locked(address, seeded)?;
        crate::log_info!("query_id", "Reseeded query ids", query_id = seeded, address = address.to_string());
        Ok(seeded)
    }

    /// Set the next id explicitly. The sequence may not move backwards.
    pub fn restore(&self, address: &TonAddress, next: QueryId) -> HawalaResult<()> {
        let key = record_key(address);
        let lock = self.lock_for(&key)?;
        let _guard = lock
            .lock()
            .map_err(|_| HawalaError::internal("Query id lock poisoned"))?;

        match self.load(&key)? {
            QueryIdCursor::Next(current) if next < current => {
                return Err(HawalaError::invalid_input(format!(
                    "Cannot restore query id {} behind current {}",
                    next, current
                )));
            }
            QueryIdCursor::Exhausted => {
                return Err(HawalaError::query_id_exhausted("Query id space already exhausted"));
            }
            _ => {}
        }
        put_json(&self.store, &key, &QueryIdRecord::from_cursor(Some(next)))
    }

    fn write_locked(&self, address: &TonAddress, next: QueryId) -> HawalaResult<()> {
        let key = record_key(address);
        let lock = self.lock_for(&key)?;
        let _guard = lock
            .lock()
            .map_err(|_| HawalaError::internal("Query id lock poisoned"))?;
        put_json(&self.store, &key, &QueryIdRecord::from_cursor(Some(next)))
    }

    fn load(&self, key: &str) -> HawalaResult<QueryIdCursor> {
        match get_json::<QueryIdRecord>(&self.store, key)? {
            Some(record) => record.into_cursor(key),
            None => Ok(QueryIdCursor::Fresh),
        }
    }

    fn lock_for(&self, key: &str) -> HawalaResult<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| HawalaError::internal("Query id lock table poisoned"))?;
        Ok(locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }
}

/// Store key for an address; raw form so flags never split the sequence
pub fn record_key(address: &TonAddress) -> String {
    format!("{}{}", QUERY_ID_PREFIX, address.to_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::store::MemoryStore;
    use std::collections::HashSet;
    use std::time::Duration;

    fn fixed_clock() -> SystemTime {
        // secs % 8192 = 100, millis % 1023 = 5
        UNIX_EPOCH + Duration::from_millis(8192 * 1000 * 3 + 100_000 + 5)
    }

    fn address() -> TonAddress {
        TonAddress::new(0, [0xAB; 32])
    }

    #[test]
    fn test_combined_and_successor() {
        let q = QueryId::new(3, 7).unwrap();
        assert_eq!(q.combined(), (3 << 10) + 7);
        assert_eq!(QueryId::from_combined(q.combined()).unwrap(), q);

        let end_of_shift = QueryId::new(3, MAX_BIT_NUMBER).unwrap();
        assert_eq!(end_of_shift.successor(), Some(QueryId::new(4, 0).unwrap()));
        assert_eq!(QueryId::new(MAX_SHIFT, MAX_BIT_NUMBER).unwrap().successor(), None);
        assert!(QueryId::new(0, 1023).is_err());
        assert!(QueryId::new(8192, 0).is_err());
    }

    #[test]
    fn test_seeded_from_clock() {
        let q = QueryId::seeded(fixed_clock());
        let secs = fixed_clock().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let millis = fixed_clock().duration_since(UNIX_EPOCH).unwrap().as_millis();
        assert_eq!(q.shift() as u64, secs % 8192);
        assert_eq!(q.bit_number() as u128, millis % 1023);
    }

    #[test]
    fn test_next_is_monotonic_and_persisted() {
        let store = Arc::new(MemoryStore::new());
        let engine = QueryIdEngine::with_clock(store.clone(), fixed_clock);
        let addr = address();

        assert_eq!(engine.peek(&addr).unwrap(), QueryIdCursor::Fresh);
        let first = engine.next(&addr).unwrap();
        assert_eq!(first, QueryId::seeded(fixed_clock()));
        let second = engine.next(&addr).unwrap();
        assert!(second > first);

        // A new engine over the same store continues the sequence
        let restarted = QueryIdEngine::with_clock(store, fixed_clock);
        let third = restarted.next(&addr).unwrap();
        assert_eq!(Some(third), second.successor());
    }

    #[test]
    fn test_exhaustion() {
        let engine = QueryIdEngine::new(MemoryStore::new());
        let addr = address();
        engine
            .restore(&addr, QueryId::new(MAX_SHIFT, MAX_BIT_NUMBER - 1).unwrap())
            .unwrap();
        engine.next(&addr).unwrap();
        let last = engine.next(&addr).unwrap();
        assert_eq!(last.combined(), (8191 << 10) + 1022);
        assert_eq!(engine.peek(&addr).unwrap(), QueryIdCursor::Exhausted);

        let err = engine.next(&addr).unwrap_err();
        assert_eq!(err.code, ErrorCode::QueryIdExhausted);
        assert!(!err.is_retryable());

        // Reseeding after the timeout window starts a new sequence
        engine.reseed(&addr).unwrap();
        assert!(engine.next(&addr).is_ok());
    }

    #[test]
    fn test_restore_cannot_go_backwards() {
        let engine = QueryIdEngine::new(MemoryStore::new());
        let addr = address();
        engine.restore(&addr, QueryId::new(10, 10).unwrap()).unwrap();
        assert!(engine.restore(&addr, QueryId::new(10, 9).unwrap()).is_err());
        engine.restore(&addr, QueryId::new(11, 0).unwrap()).unwrap();
        assert_eq!(engine.next(&addr).unwrap(), QueryId::new(11, 0).unwrap());
    }

    #[test]
    fn test_addresses_are_independent() {
        let engine = QueryIdEngine::with_clock(MemoryStore::new(), fixed_clock);
        let a = engine.next(&TonAddress::new(0, [1; 32])).unwrap();
        let b = engine.next(&TonAddress::new(0, [2; 32])).unwrap();
        assert_eq!(a, b);
        // Bounceable and non-bounceable forms share one sequence
        let bounceable = TonAddress::new(0, [1; 32]);
        let plain = bounceable.clone().set_bounceable(false);
        assert_eq!(record_key(&bounceable), record_key(&plain));
    }

    #[test]
    fn test_concurrent_next_never_duplicates() {
        let engine = Arc::new(QueryIdEngine::with_clock(MemoryStore::new(), fixed_clock));
        let addr = address();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let addr = addr.clone();
                std::thread::spawn(move || {
                    (0..50).map(|_| engine.next(&addr).unwrap()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for q in handle.join().unwrap() {
                assert!(seen.insert(q), "duplicate {}", q);
            }
        }
        assert_eq!(seen.len(), 400);
    }

    #[test]
    fn test_corrupt_record_version() {
        let store = MemoryStore::new();
        let addr = address();
        store
            .put(&record_key(&addr), br#"{"version":9,"shift":1,"bit_number":1}"#)
            .unwrap();
        let engine = QueryIdEngine::new(store);
        assert_eq!(engine.next(&addr).unwrap_err().code, ErrorCode::StorageError);
    }
}
