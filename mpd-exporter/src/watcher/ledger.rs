//! Billing ledger: the last billed segment start offset per billing key.

use dashmap::DashMap;

use crate::domain::BillingKey;

/// Storage for billed offsets.
///
/// Values never decrease: `advance` with an offset at or below the stored one
/// is a no-op.
pub trait BillingLedgerStore: Send + Sync + 'static {
    /// Last billed start offset, `None` if nothing was billed yet.
    fn last_billed(&self, key: &BillingKey) -> Option<u64>;

    /// Record `offset` as billed. Returns the stored value afterwards.
    fn advance(&self, key: &BillingKey, offset: u64) -> u64;
}

/// Process-local ledger. Lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    offsets: DashMap<BillingKey, u64>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

impl BillingLedgerStore for InMemoryLedger {
    fn last_billed(&self, key: &BillingKey) -> Option<u64> {
        self.offsets.get(key).map(|v| *v.value())
    }

    fn advance(&self, key: &BillingKey, offset: u64) -> u64 {
        // Entry guard makes the read-modify-write atomic per key.
        let mut entry = self.offsets.entry(key.clone()).or_insert(offset);
        if offset > *entry {
            *entry = offset;
        }
        *entry
    }
}
