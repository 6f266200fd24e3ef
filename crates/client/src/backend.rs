//! The low-level node gateway consumed by the proxy.

use crate::{BlockId, BlockInfo, EventHub, TransactionInfo, TransactionRequest, TxHash};
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by the node gateway.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The node could not be reached or the connection failed mid-call.
    #[error("transport error: {0}")]
    Transport(String),
    /// The node rejected the request.
    #[error("node rejected request: {0}")]
    Rejected(String),
}

/// Gateway to a blockchain node.
///
/// The proxy borrows the backend; it never owns the underlying connection.
/// `submit` is atomic with respect to the nonce it is handed: the node either
/// accepts the transaction under that nonce and returns its canonical hash,
/// or fails the call.
#[async_trait]
pub trait NodeBackend: Send + Sync + 'static {
    /// Submits a transaction under the given nonce, returning the canonical
    /// hash the node will use.
    async fn submit(
        &self,
        request: &TransactionRequest,
        nonce: u64,
    ) -> Result<TxHash, BackendError>;

    /// The account's next nonce as the chain sees it.
    async fn nonce(&self, address: Address) -> Result<u64, BackendError>;

    /// Estimated gas usage of the call, before any safety padding.
    async fn estimate_gas(
        &self,
        from: Address,
        to: Option<Address>,
        value: U256,
        data: &Bytes,
    ) -> Result<u64, BackendError>;

    /// Current gas price.
    async fn gas_price(&self) -> Result<u128, BackendError>;

    /// The account's balance.
    async fn balance(&self, address: Address) -> Result<U256, BackendError>;

    /// Whether the address is known to the chain.
    async fn address_exists(&self, address: Address) -> Result<bool, BackendError>;

    /// Code deployed at the address, empty for externally owned accounts.
    async fn code(&self, address: Address) -> Result<Bytes, BackendError>;

    /// Fetches a block by number or hash.
    async fn block(&self, id: BlockId) -> Result<Option<BlockInfo>, BackendError>;

    /// Fetches the current status of a transaction.
    async fn transaction_info(&self, hash: TxHash) -> Result<Option<TransactionInfo>, BackendError>;

    /// Attaches the event hub to the node's notification source. The backend
    /// feeds `publish_block`/`publish_transaction` from then on.
    fn register(&self, events: &Arc<EventHub>);
}
