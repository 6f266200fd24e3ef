//! Domain types shared across the proxy core.

use crate::watch::PendingConfirmation;
use alloy_primitives::{Address, Bytes, B256, U256};

/// A transaction identifier.
pub type TxHash = B256;

/// A block identifier.
pub type BlockHash = B256;

/// An immutable description of a transaction to submit.
///
/// The derived equality and hash cover every field; that content identity
/// keys the submission-future map, so enqueuing an equal request while the
/// first is still live returns the original future.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransactionRequest {
    /// Sending account.
    pub from: Address,
    /// Recipient; `None` denotes contract creation.
    pub to: Option<Address>,
    /// Transferred value in smallest currency units.
    pub value: U256,
    /// Call or deployment payload.
    pub data: Bytes,
    /// Gas limit, inclusive of the safety pads applied by the proxy.
    pub gas_limit: u64,
    /// Gas price in smallest units per gas.
    pub gas_price: u128,
}

/// Where a transaction currently stands from the node's perspective.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Known to the node, not yet included in a block.
    Pending,
    /// Included in a mined block.
    Executed,
    /// Removed from the mempool without inclusion.
    Dropped,
}

/// The chain's record of an executed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// The canonical transaction hash.
    pub transaction_hash: TxHash,
    /// Sending account.
    pub from: Address,
    /// Receiving account; `None` for contract creation.
    pub to: Option<Address>,
    /// Address of the deployed contract, present iff this was a creation.
    pub contract_address: Option<Address>,
    /// Whether on-chain execution succeeded.
    pub success: bool,
    /// Execution error reported by the node, if any.
    pub error: Option<String>,
    /// Hash of the containing block.
    pub block_hash: BlockHash,
    /// Raw event records emitted during execution.
    pub logs: Vec<EventData>,
}

/// A transaction-status notification or query result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionInfo {
    /// The transaction hash.
    pub transaction_hash: TxHash,
    /// The receipt, once one exists.
    pub receipt: Option<TransactionReceipt>,
    /// Current status.
    pub status: TransactionStatus,
    /// Containing block, if included.
    pub block_hash: Option<BlockHash>,
}

impl TransactionInfo {
    /// Info for a receipt that was included in a mined block.
    pub fn executed(receipt: TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            block_hash: Some(receipt.block_hash),
            status: TransactionStatus::Executed,
            receipt: Some(receipt),
        }
    }

    /// Info for a transaction dropped from the mempool.
    pub fn dropped(receipt: TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            block_hash: None,
            status: TransactionStatus::Dropped,
            receipt: Some(receipt),
        }
    }
}

/// A mined block and the receipts it contains.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Height of the block.
    pub number: u64,
    /// Receipts of every transaction in the block.
    pub receipts: Vec<TransactionReceipt>,
}

/// A raw contract log entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventData {
    /// Indexed topics, the event signature first.
    pub topics: Vec<B256>,
    /// Non-indexed payload.
    pub data: Bytes,
    /// Hash of the emitting transaction.
    pub transaction_hash: TxHash,
}

/// Key for backend block lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockId {
    /// Lookup by height.
    Number(u64),
    /// Lookup by block hash.
    Hash(BlockHash),
}

/// Outcome of a successful submission: the canonical hash plus the
/// confirmation future for the eventual receipt.
#[derive(Debug)]
pub struct CallDetails {
    /// Hash under which the node tracks the transaction.
    pub transaction_hash: TxHash,
    /// Resolves when the transaction is mined, dropped or timed out.
    pub receipt: PendingConfirmation,
}
