//! Per-account nonce accounting.

use crate::{BackendError, NodeBackend, TransactionReceipt, TxHash};
use alloy_primitives::Address;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::Mutex;

#[derive(Default)]
struct Accounts {
    /// Next nonce per account as last read from the backend.
    chain: HashMap<Address, u64>,
    /// Hashes of submitted transactions not yet mined or dropped.
    pending: HashMap<Address, HashSet<TxHash>>,
}

/// Tracks the next usable nonce per account.
///
/// The derived next nonce is `chain nonce + pending transactions in flight`.
/// Both maps live under one lock so a reader always observes a consistent
/// pair. Accounts are created lazily on first reference and kept for the
/// process lifetime; [`forget`](Self::forget) drops an account no longer in
/// use.
pub(crate) struct NonceTracker {
    backend: Arc<dyn NodeBackend>,
    accounts: Mutex<Accounts>,
}

impl NonceTracker {
    pub(crate) fn new(backend: Arc<dyn NodeBackend>) -> Self {
        Self { backend, accounts: Mutex::new(Accounts::default()) }
    }

    /// The nonce to assign to the account's next submission. Fetches the
    /// chain nonce from the backend on first reference.
    pub(crate) async fn next_nonce(&self, address: Address) -> Result<u64, BackendError> {
        let mut accounts = self.accounts.lock().await;
        let chain = match accounts.chain.get(&address) {
            Some(nonce) => *nonce,
            None => {
                let fetched = self.backend.nonce(address).await?;
                trace!(%address, nonce = fetched, "fetched initial chain nonce");
                accounts.chain.insert(address, fetched);
                fetched
            }
        };
        let in_flight = accounts.pending.get(&address).map_or(0, |set| set.len() as u64);
        Ok(chain + in_flight)
    }

    /// Records a submitted transaction as in flight for its sender.
    pub(crate) async fn record_pending(&self, address: Address, hash: TxHash) {
        self.accounts.lock().await.pending.entry(address).or_default().insert(hash);
    }

    /// Settles a receipt that appeared in a mined block.
    pub(crate) async fn on_mined(&self, receipt: &TransactionReceipt) {
        self.settle(receipt).await;
    }

    /// Settles a receipt reported as dropped from the mempool.
    pub(crate) async fn on_dropped(&self, receipt: &TransactionReceipt) {
        self.settle(receipt).await;
    }

    /// Removes the hash from the sender's pending set and re-reads the chain
    /// nonce. A hash that was already settled is a no-op, so each pending
    /// entry is removed exactly once.
    async fn settle(&self, receipt: &TransactionReceipt) {
        let mut accounts = self.accounts.lock().await;
        let removed = accounts
            .pending
            .get_mut(&receipt.from)
            .is_some_and(|set| set.remove(&receipt.transaction_hash));
        if !removed {
            return;
        }
        debug!(tx = %receipt.transaction_hash, from = %receipt.from, "settled pending transaction");
        match self.backend.nonce(receipt.from).await {
            Ok(fresh) => {
                // The chain nonce never moves backwards once observed higher.
                let entry = accounts.chain.entry(receipt.from).or_insert(fresh);
                *entry = (*entry).max(fresh);
            }
            Err(err) => warn!(%err, from = %receipt.from, "failed to refresh chain nonce"),
        }
    }

    /// Drops all state for an account.
    pub(crate) async fn forget(&self, address: Address) {
        let mut accounts = self.accounts.lock().await;
        accounts.chain.remove(&address);
        accounts.pending.remove(&address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{test_receipt, MockBackend};
    use alloy_primitives::B256;

    #[tokio::test]
    async fn fetches_chain_nonce_lazily() {
        let backend = MockBackend::new();
        backend.set_nonce(Address::repeat_byte(1), 7);
        let tracker = NonceTracker::new(backend.clone());

        assert_eq!(tracker.next_nonce(Address::repeat_byte(1)).await.unwrap(), 7);
        assert_eq!(backend.nonce_queries(), 1);
        // Second read is served from the tracked value.
        assert_eq!(tracker.next_nonce(Address::repeat_byte(1)).await.unwrap(), 7);
        assert_eq!(backend.nonce_queries(), 1);
    }

    #[tokio::test]
    async fn pending_transactions_offset_the_nonce() {
        let backend = MockBackend::new();
        let sender = Address::repeat_byte(1);
        backend.set_nonce(sender, 7);
        let tracker = NonceTracker::new(backend);

        tracker.record_pending(sender, B256::repeat_byte(0xaa)).await;
        tracker.record_pending(sender, B256::repeat_byte(0xbb)).await;
        assert_eq!(tracker.next_nonce(sender).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn settling_removes_pending_and_rereads_backend() {
        let backend = MockBackend::new();
        let sender = Address::repeat_byte(1);
        backend.set_nonce(sender, 7);
        let tracker = NonceTracker::new(backend.clone());

        let hash = B256::repeat_byte(0xaa);
        assert_eq!(tracker.next_nonce(sender).await.unwrap(), 7);
        tracker.record_pending(sender, hash).await;

        backend.set_nonce(sender, 8);
        tracker.on_mined(&test_receipt(hash, sender, None)).await;
        assert_eq!(tracker.next_nonce(sender).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn settling_twice_is_a_no_op() {
        let backend = MockBackend::new();
        let sender = Address::repeat_byte(1);
        let tracker = NonceTracker::new(backend.clone());

        let hash = B256::repeat_byte(0xaa);
        tracker.record_pending(sender, hash).await;
        let receipt = test_receipt(hash, sender, None);
        tracker.on_mined(&receipt).await;
        let queries = backend.nonce_queries();
        tracker.on_dropped(&receipt).await;
        // No pending entry was removed, so no refresh happened either.
        assert_eq!(backend.nonce_queries(), queries);
    }

    #[tokio::test]
    async fn chain_nonce_never_decreases() {
        let backend = MockBackend::new();
        let sender = Address::repeat_byte(1);
        backend.set_nonce(sender, 9);
        let tracker = NonceTracker::new(backend.clone());
        assert_eq!(tracker.next_nonce(sender).await.unwrap(), 9);

        let hash = B256::repeat_byte(0xaa);
        tracker.record_pending(sender, hash).await;
        // A lagging backend reports an older nonce; the tracker keeps 9.
        backend.set_nonce(sender, 3);
        tracker.on_mined(&test_receipt(hash, sender, None)).await;
        assert_eq!(tracker.next_nonce(sender).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn forget_drops_account_state() {
        let backend = MockBackend::new();
        let sender = Address::repeat_byte(1);
        backend.set_nonce(sender, 7);
        let tracker = NonceTracker::new(backend.clone());

        assert_eq!(tracker.next_nonce(sender).await.unwrap(), 7);
        tracker.forget(sender).await;
        assert_eq!(tracker.next_nonce(sender).await.unwrap(), 7);
        assert_eq!(backend.nonce_queries(), 2);
    }
}
