//! Scripted backend for unit tests.

use crate::{
    BackendError, BlockId, BlockInfo, EventHub, NodeBackend, TransactionInfo, TransactionReceipt,
    TransactionRequest, TxHash,
};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// A receipt with sensible defaults for tests.
pub(crate) fn test_receipt(
    hash: TxHash,
    from: Address,
    to: Option<Address>,
) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: hash,
        from,
        to,
        contract_address: None,
        success: true,
        error: None,
        block_hash: B256::repeat_byte(0xb1),
        logs: Vec::new(),
    }
}

#[derive(Default)]
struct MockState {
    nonces: HashMap<Address, u64>,
    nonce_queries: usize,
    submitted: Vec<(TransactionRequest, u64)>,
    submit_failure: Option<String>,
    infos: HashMap<TxHash, TransactionInfo>,
    blocks: HashMap<u64, BlockInfo>,
    gas_estimate: u64,
    gas_price: u128,
    balances: HashMap<Address, U256>,
    code: HashMap<Address, Bytes>,
    hub: Option<Arc<EventHub>>,
}

/// In-memory [`NodeBackend`] with scripted responses.
///
/// Records every `submit` call together with the nonce it was handed, and
/// exposes the registered event hub so tests can push block and drop
/// notifications.
pub(crate) struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState { gas_estimate: 21_000, gas_price: 1_000_000_000, ..Default::default() }),
        })
    }

    pub(crate) fn set_nonce(&self, address: Address, nonce: u64) {
        self.state.lock().unwrap().nonces.insert(address, nonce);
    }

    pub(crate) fn nonce_queries(&self) -> usize {
        self.state.lock().unwrap().nonce_queries
    }

    pub(crate) fn submissions(&self) -> Vec<(TransactionRequest, u64)> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub(crate) fn fail_next_submit(&self, message: &str) {
        self.state.lock().unwrap().submit_failure = Some(message.into());
    }

    pub(crate) fn put_info(&self, info: TransactionInfo) {
        self.state.lock().unwrap().infos.insert(info.transaction_hash, info);
    }

    pub(crate) fn put_block(&self, block: BlockInfo) {
        self.state.lock().unwrap().blocks.insert(block.number, block);
    }

    pub(crate) fn set_gas_estimate(&self, gas: u64) {
        self.state.lock().unwrap().gas_estimate = gas;
    }

    pub(crate) fn set_balance(&self, address: Address, balance: U256) {
        self.state.lock().unwrap().balances.insert(address, balance);
    }

    /// The hub handed over via [`NodeBackend::register`].
    pub(crate) fn hub(&self) -> Arc<EventHub> {
        self.state.lock().unwrap().hub.clone().expect("backend not registered")
    }

    /// Deterministic hash a submission resolves to.
    pub(crate) fn expected_hash(request: &TransactionRequest, nonce: u64) -> TxHash {
        let mut preimage = request.from.to_vec();
        preimage.extend_from_slice(&nonce.to_be_bytes());
        keccak256(preimage)
    }
}

#[async_trait]
impl NodeBackend for MockBackend {
    async fn submit(
        &self,
        request: &TransactionRequest,
        nonce: u64,
    ) -> Result<TxHash, BackendError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.submit_failure.take() {
            return Err(BackendError::Rejected(message));
        }
        state.submitted.push((request.clone(), nonce));
        Ok(Self::expected_hash(request, nonce))
    }

    async fn nonce(&self, address: Address) -> Result<u64, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.nonce_queries += 1;
        Ok(state.nonces.get(&address).copied().unwrap_or(0))
    }

    async fn estimate_gas(
        &self,
        _from: Address,
        _to: Option<Address>,
        _value: U256,
        _data: &Bytes,
    ) -> Result<u64, BackendError> {
        Ok(self.state.lock().unwrap().gas_estimate)
    }

    async fn gas_price(&self) -> Result<u128, BackendError> {
        Ok(self.state.lock().unwrap().gas_price)
    }

    async fn balance(&self, address: Address) -> Result<U256, BackendError> {
        Ok(self.state.lock().unwrap().balances.get(&address).copied().unwrap_or(U256::ZERO))
    }

    async fn address_exists(&self, address: Address) -> Result<bool, BackendError> {
        let state = self.state.lock().unwrap();
        Ok(state.balances.contains_key(&address) || state.nonces.contains_key(&address))
    }

    async fn code(&self, address: Address) -> Result<Bytes, BackendError> {
        Ok(self.state.lock().unwrap().code.get(&address).cloned().unwrap_or_default())
    }

    async fn block(&self, id: BlockId) -> Result<Option<BlockInfo>, BackendError> {
        let state = self.state.lock().unwrap();
        let block = match id {
            BlockId::Number(number) => state.blocks.get(&number),
            BlockId::Hash(_) => None,
        };
        Ok(block.cloned())
    }

    async fn transaction_info(&self, hash: TxHash) -> Result<Option<TransactionInfo>, BackendError> {
        Ok(self.state.lock().unwrap().infos.get(&hash).cloned())
    }

    fn register(&self, events: &Arc<EventHub>) {
        self.state.lock().unwrap().hub = Some(events.clone());
    }
}
