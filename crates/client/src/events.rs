//! Multicast source of block and transaction-status notifications.

use crate::{BlockInfo, TransactionInfo};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;

/// Default buffer depth of the notification channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// The long-lived notification publisher the proxy and its watchers share.
///
/// A backend implementation registered via
/// [`NodeBackend::register`](crate::NodeBackend::register) feeds blocks and
/// transaction-status updates in here; every consumer takes its own bounded
/// broadcast subscription. Slow subscribers lag rather than block the
/// publisher.
#[derive(Debug)]
pub struct EventHub {
    blocks: broadcast::Sender<BlockInfo>,
    transactions: broadcast::Sender<TransactionInfo>,
    head: watch::Sender<Option<u64>>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventHub {
    /// Creates a hub whose notification channels buffer `capacity` items per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (blocks, _) = broadcast::channel(capacity);
        let (transactions, _) = broadcast::channel(capacity);
        let (head, _) = watch::channel(None);
        Self { blocks, transactions, head }
    }

    /// Publishes a mined block.
    ///
    /// Advances the head-block number, emits an `Executed` status
    /// notification for every receipt in the block, then the block itself.
    pub fn publish_block(&self, block: BlockInfo) {
        trace!(number = block.number, receipts = block.receipts.len(), "block notification");
        self.head.send_replace(Some(block.number));
        for receipt in &block.receipts {
            self.publish_transaction(TransactionInfo::executed(receipt.clone()));
        }
        let _ = self.blocks.send(block);
    }

    /// Publishes a transaction-status notification.
    pub fn publish_transaction(&self, info: TransactionInfo) {
        trace!(tx = %info.transaction_hash, status = ?info.status, "transaction notification");
        let _ = self.transactions.send(info);
    }

    /// A new subscription to block notifications.
    pub fn subscribe_blocks(&self) -> broadcast::Receiver<BlockInfo> {
        self.blocks.subscribe()
    }

    /// A new subscription to transaction-status notifications.
    pub fn subscribe_transactions(&self) -> broadcast::Receiver<TransactionInfo> {
        self.transactions.subscribe()
    }

    /// Block notifications as a stream.
    pub fn observe_blocks(&self) -> BroadcastStream<BlockInfo> {
        self.subscribe_blocks().into()
    }

    /// Transaction-status notifications as a stream.
    pub fn observe_transactions(&self) -> BroadcastStream<TransactionInfo> {
        self.subscribe_transactions().into()
    }

    /// Height of the most recently published block, 0 before the first one.
    pub fn current_block_number(&self) -> u64 {
        self.head.borrow().unwrap_or(0)
    }

    /// Completes once at least one block notification has been received.
    pub async fn ready(&self) {
        let mut head = self.head.subscribe();
        let _ = head.wait_for(Option::is_some).await;
    }
}
