//! Confirmation watching for submitted transactions.

use crate::{
    BackendError, BlockInfo, EventHub, NodeBackend, TransactionInfo, TransactionReceipt,
    TransactionStatus, TxHash,
};
use futures::FutureExt;
use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use thiserror::Error;
use tokio::{
    select,
    sync::{broadcast, oneshot},
    time::{interval_at, Instant, MissedTickBehavior},
};

/// Terminal failure of a confirmation wait.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The transaction was removed from the mempool without inclusion.
    #[error("transaction dropped: {0}")]
    Dropped(String),
    /// The transaction was mined but on-chain execution failed.
    #[error("transaction {hash} reverted: {error}")]
    Reverted {
        /// The reverted transaction.
        hash: TxHash,
        /// Error string reported in the receipt.
        error: String,
    },
    /// No inclusion was observed within the configured block window.
    #[error("transaction not included within {0} blocks")]
    InclusionTimeout(u64),
    /// The node reports the transaction as executed but has no receipt.
    #[error("transaction receipt not found")]
    ReceiptMissing,
    /// A backend query failed while watching.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The watcher task stopped before the transaction resolved.
    #[error("confirmation watcher stopped")]
    WatcherGone,
}

/// Future resolving to the receipt of a watched transaction.
///
/// Dropping the future cancels the watch and disposes every internal
/// subscription.
pub struct PendingConfirmation {
    tx_hash: TxHash,
    rx: oneshot::Receiver<Result<TransactionReceipt, WatchError>>,
}

impl fmt::Debug for PendingConfirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingConfirmation").field("tx_hash", &self.tx_hash).finish()
    }
}

impl PendingConfirmation {
    /// The watched transaction's hash.
    pub const fn tx_hash(&self) -> &TxHash {
        &self.tx_hash
    }
}

impl Future for PendingConfirmation {
    type Output = Result<TransactionReceipt, WatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.rx
            .poll_unpin(cx)
            .map(|res| res.unwrap_or_else(|_| Err(WatchError::WatcherGone)))
    }
}

/// Spawns per-transaction watch tasks over the shared notification streams.
pub(crate) struct ConfirmationWatcher {
    backend: Arc<dyn NodeBackend>,
    events: Arc<EventHub>,
    block_wait_limit: u64,
    poll_interval: Duration,
}

impl ConfirmationWatcher {
    pub(crate) fn new(
        backend: Arc<dyn NodeBackend>,
        events: Arc<EventHub>,
        block_wait_limit: u64,
        poll_interval: Duration,
    ) -> Self {
        Self { backend, events, block_wait_limit, poll_interval }
    }

    /// Starts watching a transaction.
    ///
    /// Races four observation sources until the first terminal outcome: the
    /// drop notifications, a per-block receipt query, the inclusion-timeout
    /// window starting at the current head block, and a periodic poll as a
    /// liveness fallback for missed block notifications.
    pub(crate) fn watch(&self, tx_hash: TxHash) -> PendingConfirmation {
        let (done, rx) = oneshot::channel();
        let task = WatchTask {
            backend: self.backend.clone(),
            tx_hash,
            start_block: self.events.current_block_number(),
            block_wait_limit: self.block_wait_limit,
            transactions: self.events.subscribe_transactions(),
            blocks: self.events.subscribe_blocks(),
            poll_interval: self.poll_interval,
        };
        tokio::spawn(task.run(done));
        PendingConfirmation { tx_hash, rx }
    }
}

struct WatchTask {
    backend: Arc<dyn NodeBackend>,
    tx_hash: TxHash,
    start_block: u64,
    block_wait_limit: u64,
    transactions: broadcast::Receiver<TransactionInfo>,
    blocks: broadcast::Receiver<BlockInfo>,
    poll_interval: Duration,
}

type Outcome = Result<TransactionReceipt, WatchError>;

impl WatchTask {
    async fn run(mut self, mut done: oneshot::Sender<Outcome>) {
        debug!(tx = %self.tx_hash, start_block = self.start_block, "watching");
        let mut poll = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            select! {
                // The caller dropped its confirmation future.
                () = done.closed() => {
                    trace!(tx = %self.tx_hash, "watch cancelled");
                    return;
                }

                note = self.transactions.recv() => match note {
                    Ok(info)
                        if info.transaction_hash == self.tx_hash
                            && info.status == TransactionStatus::Dropped =>
                    {
                        break Err(WatchError::Dropped(drop_reason(&info)));
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(tx = %self.tx_hash, skipped, "transaction stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },

                note = self.blocks.recv() => match note {
                    Ok(block) => {
                        if let Some(outcome) = self.check_included().await {
                            break outcome;
                        }
                        if block.number > self.start_block.saturating_add(self.block_wait_limit) {
                            break Err(WatchError::InclusionTimeout(self.block_wait_limit));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(tx = %self.tx_hash, skipped, "block stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },

                // Liveness fallback for missed block notifications.
                _ = poll.tick() => {
                    if let Some(outcome) = self.check_executed().await {
                        break outcome;
                    }
                }
            }
        };

        debug!(tx = %self.tx_hash, ok = outcome.is_ok(), "watch resolved");
        let _ = done.send(outcome);
    }

    /// Block path: any receipt the node hands back counts as inclusion.
    async fn check_included(&self) -> Option<Outcome> {
        match self.backend.transaction_info(self.tx_hash).await {
            Ok(Some(info)) => info.receipt.map(settle),
            Ok(None) => None,
            Err(err) => Some(Err(WatchError::Backend(err))),
        }
    }

    /// Poll path: only an `Executed` status is accepted.
    async fn check_executed(&self) -> Option<Outcome> {
        match self.backend.transaction_info(self.tx_hash).await {
            Ok(Some(info)) if info.status == TransactionStatus::Executed => match info.receipt {
                Some(receipt) => Some(settle(receipt)),
                None => Some(Err(WatchError::ReceiptMissing)),
            },
            Ok(_) => None,
            Err(err) => Some(Err(WatchError::Backend(err))),
        }
    }
}

fn settle(receipt: TransactionReceipt) -> Outcome {
    if receipt.success {
        Ok(receipt)
    } else {
        Err(WatchError::Reverted {
            hash: receipt.transaction_hash,
            error: receipt.error.unwrap_or_default(),
        })
    }
}

fn drop_reason(info: &TransactionInfo) -> String {
    info.receipt
        .as_ref()
        .and_then(|receipt| receipt.error.clone())
        .unwrap_or_else(|| "dropped from mempool".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{test_receipt, MockBackend};
    use alloy_primitives::{Address, B256};

    fn watcher(backend: &Arc<MockBackend>, limit: u64) -> (ConfirmationWatcher, Arc<EventHub>) {
        let events = Arc::new(EventHub::default());
        let watcher = ConfirmationWatcher::new(
            backend.clone(),
            events.clone(),
            limit,
            Duration::from_secs(10),
        );
        (watcher, events)
    }

    fn empty_block(number: u64) -> BlockInfo {
        BlockInfo { number, receipts: Vec::new() }
    }

    #[tokio::test]
    async fn resolves_on_mined_receipt() {
        let backend = MockBackend::new();
        let hash = B256::repeat_byte(0xaa);
        let (watcher, events) = watcher(&backend, 5);

        let pending = watcher.watch(hash);
        let receipt = test_receipt(hash, Address::repeat_byte(1), Some(Address::repeat_byte(2)));
        backend.put_info(TransactionInfo::executed(receipt.clone()));
        events.publish_block(empty_block(1));

        assert_eq!(pending.await.unwrap(), receipt);
    }

    #[tokio::test]
    async fn reverted_receipt_fails_with_error_string() {
        let backend = MockBackend::new();
        let hash = B256::repeat_byte(0xaa);
        let (watcher, events) = watcher(&backend, 5);

        let pending = watcher.watch(hash);
        let mut receipt = test_receipt(hash, Address::repeat_byte(1), Some(Address::repeat_byte(2)));
        receipt.success = false;
        receipt.error = Some("out of gas".into());
        backend.put_info(TransactionInfo::executed(receipt));
        events.publish_block(empty_block(1));

        match pending.await.unwrap_err() {
            WatchError::Reverted { hash: reverted, error } => {
                assert_eq!(reverted, hash);
                assert_eq!(error, "out of gas");
            }
            other => panic!("unexpected outcome: {other}"),
        }
    }

    #[tokio::test]
    async fn drop_notification_fails_the_wait() {
        let backend = MockBackend::new();
        let hash = B256::repeat_byte(0xaa);
        let (watcher, events) = watcher(&backend, 5);

        let pending = watcher.watch(hash);
        let mut receipt = test_receipt(hash, Address::repeat_byte(1), None);
        receipt.error = Some("replaced".into());
        events.publish_transaction(TransactionInfo::dropped(receipt));

        match pending.await.unwrap_err() {
            WatchError::Dropped(reason) => assert_eq!(reason, "replaced"),
            other => panic!("unexpected outcome: {other}"),
        }
    }

    #[tokio::test]
    async fn foreign_notifications_are_ignored() {
        let backend = MockBackend::new();
        let hash = B256::repeat_byte(0xaa);
        let (watcher, events) = watcher(&backend, 5);

        let pending = watcher.watch(hash);
        // A drop notification for some other transaction must not resolve us.
        let other = test_receipt(B256::repeat_byte(0xbb), Address::repeat_byte(1), None);
        events.publish_transaction(TransactionInfo::dropped(other));

        let receipt = test_receipt(hash, Address::repeat_byte(1), None);
        backend.put_info(TransactionInfo::executed(receipt.clone()));
        events.publish_block(empty_block(1));
        assert_eq!(pending.await.unwrap(), receipt);
    }

    #[tokio::test]
    async fn times_out_past_the_block_window() {
        let backend = MockBackend::new();
        let hash = B256::repeat_byte(0xaa);
        let (watcher, events) = watcher(&backend, 5);

        events.publish_block(empty_block(100));
        // Subscribe after the head snapshot is at 100.
        tokio::task::yield_now().await;
        let pending = watcher.watch(hash);
        events.publish_block(empty_block(106));

        match pending.await.unwrap_err() {
            WatchError::InclusionTimeout(limit) => assert_eq!(limit, 5),
            other => panic!("unexpected outcome: {other}"),
        }
    }

    #[tokio::test]
    async fn a_block_inside_the_window_does_not_time_out() {
        let backend = MockBackend::new();
        let hash = B256::repeat_byte(0xaa);
        let (watcher, events) = watcher(&backend, 5);

        events.publish_block(empty_block(100));
        tokio::task::yield_now().await;
        let pending = watcher.watch(hash);
        events.publish_block(empty_block(105));

        let receipt = test_receipt(hash, Address::repeat_byte(1), None);
        backend.put_info(TransactionInfo::executed(receipt.clone()));
        events.publish_block(empty_block(105));
        assert_eq!(pending.await.unwrap(), receipt);
    }

    #[tokio::test]
    async fn poll_fallback_finds_the_receipt_without_blocks() {
        let backend = MockBackend::new();
        let hash = B256::repeat_byte(0xaa);
        let events = Arc::new(EventHub::default());
        let watcher = ConfirmationWatcher::new(
            backend.clone(),
            events,
            5,
            Duration::from_millis(10),
        );

        let receipt = test_receipt(hash, Address::repeat_byte(1), None);
        backend.put_info(TransactionInfo::executed(receipt.clone()));
        let pending = watcher.watch(hash);

        // No block notifications at all; the poll stream must resolve us.
        assert_eq!(pending.await.unwrap(), receipt);
    }

    #[tokio::test]
    async fn pending_status_is_not_accepted_by_the_poll_path() {
        let backend = MockBackend::new();
        let hash = B256::repeat_byte(0xaa);
        let events = Arc::new(EventHub::default());
        let watcher = ConfirmationWatcher::new(
            backend.clone(),
            events.clone(),
            5,
            Duration::from_millis(10),
        );

        backend.put_info(TransactionInfo {
            transaction_hash: hash,
            receipt: None,
            status: TransactionStatus::Pending,
            block_hash: None,
        });
        let mut pending = watcher.watch(hash);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(futures::poll!(&mut pending).is_pending());

        let receipt = test_receipt(hash, Address::repeat_byte(1), None);
        backend.put_info(TransactionInfo::executed(receipt.clone()));
        assert_eq!(pending.await.unwrap(), receipt);
    }
}
