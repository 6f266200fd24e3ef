//! The top-level node proxy.

use crate::{
    contract,
    filter::{self, AbiEvent, EventInfo, SolidityEvent},
    nonce::NonceTracker,
    submit::{SubmitWorker, Submitter, SUBMISSION_QUEUE_CAPACITY},
    watch::ConfirmationWatcher,
    AbiEventDef, AbiFunction, BlockId, BlockInfo, CallDetails, CompiledContract, Error, EventHub,
    NodeBackend, TransactionInfo, TransactionRequest, TransactionStatus, TxHash,
};
use alloy_primitives::{Address, Bytes, U256};
use futures_util::Stream;
use parking_lot::RwLock;
use pylon_abi::{
    ConverterRegistry, Decoder, Encoder, ListDecoderFactory, ListEncoderFactory,
    SolidityTypeGroup, Value,
};
use std::{fmt, sync::Arc, time::Duration};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};

/// Pessimistic pad applied to every gas estimate. Misestimation causes
/// user-visible reverts, so the pad errs on the generous side.
const GAS_ESTIMATE_PAD: u64 = 200_000;

/// Additional allowance for executing contract-creation code.
const CREATION_GAS_PAD: u64 = 15_000;

/// Default number of blocks to wait for inclusion.
const DEFAULT_BLOCK_WAIT_LIMIT: u64 = 10;

/// Default period of the confirmation poll fallback.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Proxy tuning knobs.
#[derive(Clone, Copy, Debug)]
pub struct ProxyConfig {
    /// Number of blocks to wait for inclusion before a confirmation times
    /// out.
    pub block_wait_limit: u64,
    /// Period of the confirmation poll fallback.
    pub poll_interval: Duration,
    /// Capacity of the submission queue; overflow surfaces
    /// [`SubmitError::BackpressureExceeded`](crate::SubmitError::BackpressureExceeded).
    pub queue_capacity: usize,
    /// Buffer depth of the notification channels.
    pub channel_capacity: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            block_wait_limit: DEFAULT_BLOCK_WAIT_LIMIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            queue_capacity: SUBMISSION_QUEUE_CAPACITY,
            channel_capacity: crate::events::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Client-side proxy between application code and a blockchain node.
///
/// Owns the event hub, the nonce tracker, the submission worker and the
/// confirmation watcher; borrows the backend. The worker tasks are torn
/// down when the proxy is dropped.
pub struct NodeProxy {
    backend: Arc<dyn NodeBackend>,
    events: Arc<EventHub>,
    nonces: Arc<NonceTracker>,
    submitter: Submitter,
    watcher: ConfirmationWatcher,
    registry: RwLock<ConverterRegistry>,
    tasks: Vec<JoinHandle<()>>,
}

impl fmt::Debug for NodeProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeProxy").field("events", &self.events).finish_non_exhaustive()
    }
}

impl NodeProxy {
    /// Connects the proxy to a backend.
    ///
    /// Registers the event hub with the backend's notification source and
    /// spawns the submission worker and the nonce-maintenance task. Must be
    /// called within a tokio runtime.
    pub fn connect(backend: Arc<dyn NodeBackend>, config: ProxyConfig) -> Self {
        let events = Arc::new(EventHub::new(config.channel_capacity));
        backend.register(&events);

        let nonces = Arc::new(NonceTracker::new(backend.clone()));
        let (submitter, worker, queue) = SubmitWorker::pipeline(
            backend.clone(),
            nonces.clone(),
            events.clone(),
            config.queue_capacity,
        );
        let worker_task = tokio::spawn(worker.run(queue));
        let maintenance_task = tokio::spawn(maintain_nonces(
            events.subscribe_blocks(),
            events.subscribe_transactions(),
            nonces.clone(),
        ));

        let watcher = ConfirmationWatcher::new(
            backend.clone(),
            events.clone(),
            config.block_wait_limit,
            config.poll_interval,
        );

        Self {
            backend,
            events,
            nonces,
            submitter,
            watcher,
            registry: RwLock::new(ConverterRegistry::default()),
            tasks: vec![worker_task, maintenance_task],
        }
    }

    /// The shared notification hub.
    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    /// Completes once the backend has reported at least one block.
    pub async fn ready(&self) {
        self.events.ready().await;
    }

    // --- transactions -----------------------------------------------------

    /// Submits a transaction and returns its hash together with the
    /// confirmation future for the eventual receipt.
    ///
    /// Gas price and padded gas limit are filled from the backend. The
    /// returned future resolves when the transaction is mined; it fails on
    /// revert, drop or inclusion timeout.
    pub async fn send_tx(
        &self,
        from: Address,
        to: Option<Address>,
        value: U256,
        data: Bytes,
    ) -> Result<CallDetails, Error> {
        let gas_limit = self.estimate_gas(from, to, value, &data).await?;
        let gas_price = self.backend.gas_price().await?;
        let request = TransactionRequest { from, to, value, data, gas_limit, gas_price };
        let transaction_hash = self.submitter.submit(request)?.await?;
        Ok(CallDetails { transaction_hash, receipt: self.watcher.watch(transaction_hash) })
    }

    /// The backend's gas estimate plus the proxy's safety pads.
    pub async fn estimate_gas(
        &self,
        from: Address,
        to: Option<Address>,
        value: U256,
        data: &Bytes,
    ) -> Result<u64, Error> {
        let base = self.backend.estimate_gas(from, to, value, data).await?;
        let creation = if to.is_none() { CREATION_GAS_PAD } else { 0 };
        Ok(base + creation + GAS_ESTIMATE_PAD)
    }

    /// Deploys a contract and returns the address it was created at.
    pub async fn publish(
        &self,
        contract: &CompiledContract,
        from: Address,
        args: &[Value],
    ) -> Result<Address, Error> {
        self.publish_with_value(contract, from, U256::ZERO, args).await
    }

    /// Deploys a contract, endowing it with `value`.
    pub async fn publish_with_value(
        &self,
        contract: &CompiledContract,
        from: Address,
        value: U256,
        args: &[Value],
    ) -> Result<Address, Error> {
        let data = contract::deployment_data(&self.registry.read(), contract, args)?;
        let details = self.send_tx(from, None, value, data).await?;
        let receipt = details.receipt.await?;
        receipt.contract_address.ok_or(Error::ContractNotDeployed)
    }

    // --- ABI --------------------------------------------------------------

    /// Encodes a call to a declared function.
    pub fn call_data(
        &self,
        contract: &CompiledContract,
        function: &str,
        args: &[Value],
    ) -> Result<Bytes, Error> {
        contract::call_data(&self.registry.read(), contract.function(function)?, args)
    }

    /// Decodes a function's return data.
    pub fn decode_return(&self, function: &AbiFunction, data: &[u8]) -> Result<Vec<Value>, Error> {
        contract::decode_return(&self.registry.read(), function, data)
    }

    /// Resolves a declared event against the converter registry.
    pub fn resolve_event(&self, event: &AbiEventDef) -> Result<AbiEvent, Error> {
        Ok(AbiEvent::resolve(&self.registry.read(), &event.name, &event.inputs)?)
    }

    /// Appends a scalar encoder to a type group.
    pub fn add_encoder(&self, group: SolidityTypeGroup, encoder: Arc<dyn Encoder>) {
        self.registry.write().add_encoder(group, encoder);
    }

    /// Appends a scalar decoder to a type group.
    pub fn add_decoder(&self, group: SolidityTypeGroup, decoder: Arc<dyn Decoder>) {
        self.registry.write().add_decoder(group, decoder);
    }

    /// Appends a collection-encoder factory.
    pub fn add_list_encoder(&self, factory: Arc<dyn ListEncoderFactory>) {
        self.registry.write().add_list_encoder(factory);
    }

    /// Appends a collection-decoder factory.
    pub fn add_list_decoder(&self, factory: Arc<dyn ListDecoderFactory>) {
        self.registry.write().add_list_decoder(factory);
    }

    /// Registers a host type as carrying no return value.
    pub fn add_void_type<T: ?Sized + 'static>(&self) {
        self.registry.write().add_void_type::<T>();
    }

    /// Whether the host type was registered as void.
    pub fn is_void_type<T: ?Sized + 'static>(&self) -> bool {
        self.registry.read().is_void_type::<T>()
    }

    // --- events -----------------------------------------------------------

    /// Live stream of parsed events emitted by `address`.
    pub fn observe_events<E: SolidityEvent>(
        &self,
        event: Arc<E>,
        address: Address,
    ) -> impl Stream<Item = E::Decoded> {
        filter::observe_events(&self.events, event, address)
    }

    /// Live stream of parsed events with their originating transaction hash.
    pub fn observe_events_with_info<E: SolidityEvent>(
        &self,
        event: Arc<E>,
        address: Address,
    ) -> impl Stream<Item = EventInfo<E::Decoded>> {
        filter::observe_events_with_info(&self.events, event, address)
    }

    /// Parsed events of a single block. A missing block yields an empty
    /// list.
    pub async fn events_at_block<E: SolidityEvent>(
        &self,
        event: &E,
        address: Address,
        block: BlockId,
    ) -> Result<Vec<E::Decoded>, Error> {
        Ok(self
            .events_at_block_with_info(event, address, block)
            .await?
            .into_iter()
            .map(|info| info.event)
            .collect())
    }

    /// [`events_at_block`](Self::events_at_block) with transaction hashes.
    pub async fn events_at_block_with_info<E: SolidityEvent>(
        &self,
        event: &E,
        address: Address,
        block: BlockId,
    ) -> Result<Vec<EventInfo<E::Decoded>>, Error> {
        match self.backend.block(block).await? {
            Some(block) => filter::collect_events(event, address, &block.receipts),
            None => Ok(Vec::new()),
        }
    }

    /// Parsed events of a single transaction. Fails with
    /// [`Error::ReceiptMissing`] when no receipt exists.
    pub async fn events_at_transaction<E: SolidityEvent>(
        &self,
        event: &E,
        address: Address,
        hash: TxHash,
    ) -> Result<Vec<E::Decoded>, Error> {
        Ok(self
            .events_at_transaction_with_info(event, address, hash)
            .await?
            .into_iter()
            .map(|info| info.event)
            .collect())
    }

    /// [`events_at_transaction`](Self::events_at_transaction) with
    /// transaction hashes.
    pub async fn events_at_transaction_with_info<E: SolidityEvent>(
        &self,
        event: &E,
        address: Address,
        hash: TxHash,
    ) -> Result<Vec<EventInfo<E::Decoded>>, Error> {
        let receipt = self
            .backend
            .transaction_info(hash)
            .await?
            .and_then(|info| info.receipt)
            .ok_or(Error::ReceiptMissing)?;
        filter::collect_events(event, address, std::slice::from_ref(&receipt))
    }

    // --- chain info -------------------------------------------------------

    /// Whether the address is known to the chain.
    pub async fn address_exists(&self, address: Address) -> Result<bool, Error> {
        Ok(self.backend.address_exists(address).await?)
    }

    /// The account's balance.
    pub async fn balance(&self, address: Address) -> Result<U256, Error> {
        Ok(self.backend.balance(address).await?)
    }

    /// Code deployed at the address.
    pub async fn code(&self, address: Address) -> Result<Bytes, Error> {
        Ok(self.backend.code(address).await?)
    }

    /// Height of the most recently observed block.
    pub fn current_block_number(&self) -> u64 {
        self.events.current_block_number()
    }

    /// Current status of a transaction.
    pub async fn transaction_info(&self, hash: TxHash) -> Result<Option<TransactionInfo>, Error> {
        Ok(self.backend.transaction_info(hash).await?)
    }

    /// Drops nonce state for an account no longer in use.
    pub async fn forget_account(&self, address: Address) {
        self.nonces.forget(address).await;
    }
}

impl Drop for NodeProxy {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Keeps the nonce tracker in sync with the chain: every receipt of a mined
/// block settles as mined, every dropped-status notification settles as
/// dropped.
async fn maintain_nonces(
    mut blocks: broadcast::Receiver<BlockInfo>,
    mut transactions: broadcast::Receiver<TransactionInfo>,
    nonces: Arc<NonceTracker>,
) {
    loop {
        tokio::select! {
            note = blocks.recv() => match note {
                Ok(block) => {
                    for receipt in &block.receipts {
                        nonces.on_mined(receipt).await;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "nonce maintenance lagged behind block stream");
                }
                Err(RecvError::Closed) => break,
            },
            note = transactions.recv() => match note {
                Ok(info) if info.status == TransactionStatus::Dropped => {
                    if let Some(receipt) = &info.receipt {
                        nonces.on_dropped(receipt).await;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "nonce maintenance lagged behind transaction stream");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!("notification channels closed, nonce maintenance exiting");
}
