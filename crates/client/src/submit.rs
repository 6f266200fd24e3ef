//! Single-writer transaction submission.
//!
//! All submissions funnel through one bounded FIFO queue drained by a single
//! worker task. The worker assigns the sender's next nonce and calls the
//! backend under one lock, which keeps nonces monotonic per account without
//! any cross-account coordination.

use crate::{
    nonce::NonceTracker, BackendError, EventHub, NodeBackend, TransactionRequest, TxHash,
};
use dashmap::{mapref::entry::Entry, DashMap};
use futures::{future::BoxFuture, FutureExt};
use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use thiserror::Error;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot, Mutex,
};

/// Capacity of the submission queue.
pub(crate) const SUBMISSION_QUEUE_CAPACITY: usize = 10_000;

/// Failure of a queued submission.
///
/// Cloneable so that every holder of a shared submission future observes the
/// same outcome.
#[derive(Clone, Debug, Error)]
pub enum SubmitError {
    /// The submission queue is full.
    #[error("submission queue is full")]
    BackpressureExceeded,
    /// The backend failed the nonce read or the submission itself.
    #[error(transparent)]
    Backend(#[from] Arc<BackendError>),
    /// The submission worker is no longer running.
    #[error("submission worker stopped")]
    WorkerGone,
}

impl SubmitError {
    fn backend(err: BackendError) -> Self {
        Self::Backend(Arc::new(err))
    }
}

type SharedSubmission = futures::future::Shared<BoxFuture<'static, Result<TxHash, SubmitError>>>;

/// Future resolving to the canonical hash of a queued submission.
///
/// Clones share one underlying completion: enqueuing a request equal to one
/// that is still live hands back the same future, so the backend sees the
/// request at most once.
#[derive(Clone)]
pub struct PendingSubmission {
    inner: SharedSubmission,
}

impl fmt::Debug for PendingSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSubmission").finish_non_exhaustive()
    }
}

impl PendingSubmission {
    fn new(rx: oneshot::Receiver<Result<TxHash, SubmitError>>) -> Self {
        let inner =
            async move { rx.await.unwrap_or(Err(SubmitError::WorkerGone)) }.boxed().shared();
        Self { inner }
    }
}

impl Future for PendingSubmission {
    type Output = Result<TxHash, SubmitError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

pub(crate) struct QueuedSubmission {
    request: TransactionRequest,
    done: oneshot::Sender<Result<TxHash, SubmitError>>,
}

/// Producer half of the submission pipeline.
pub(crate) struct Submitter {
    queue: mpsc::Sender<QueuedSubmission>,
    in_flight: Arc<DashMap<TransactionRequest, PendingSubmission>>,
}

impl Submitter {
    /// Enqueues a request, returning its submission future.
    ///
    /// At most one future exists per request identity at a time; an equal
    /// request enqueued while the first is still live returns the original
    /// future. A full queue fails with
    /// [`SubmitError::BackpressureExceeded`] instead of blocking.
    pub(crate) fn submit(
        &self,
        request: TransactionRequest,
    ) -> Result<PendingSubmission, SubmitError> {
        let (pending, done) = match self.in_flight.entry(request.clone()) {
            Entry::Occupied(existing) => return Ok(existing.get().clone()),
            Entry::Vacant(slot) => {
                let (done, rx) = oneshot::channel();
                let pending = PendingSubmission::new(rx);
                slot.insert(pending.clone());
                (pending, done)
            }
        };

        match self.queue.try_send(QueuedSubmission { request: request.clone(), done }) {
            Ok(()) => Ok(pending),
            Err(err) => {
                self.in_flight.remove(&request);
                let reason = match &err {
                    TrySendError::Full(_) => SubmitError::BackpressureExceeded,
                    TrySendError::Closed(_) => SubmitError::WorkerGone,
                };
                // Anyone who raced onto the map entry sees the same failure.
                let QueuedSubmission { done, .. } = err.into_inner();
                let _ = done.send(Err(reason.clone()));
                Err(reason)
            }
        }
    }
}

/// The single consumer draining the submission queue in FIFO order.
pub(crate) struct SubmitWorker {
    backend: Arc<dyn NodeBackend>,
    nonces: Arc<NonceTracker>,
    events: Arc<EventHub>,
    in_flight: Arc<DashMap<TransactionRequest, PendingSubmission>>,
    lock: Mutex<()>,
}

impl SubmitWorker {
    pub(crate) fn pipeline(
        backend: Arc<dyn NodeBackend>,
        nonces: Arc<NonceTracker>,
        events: Arc<EventHub>,
        capacity: usize,
    ) -> (Submitter, Self, mpsc::Receiver<QueuedSubmission>) {
        let (queue_tx, queue_rx) = mpsc::channel(capacity);
        let in_flight = Arc::new(DashMap::new());
        let submitter = Submitter { queue: queue_tx, in_flight: in_flight.clone() };
        let worker = Self { backend, nonces, events, in_flight, lock: Mutex::new(()) };
        (submitter, worker, queue_rx)
    }

    pub(crate) async fn run(self, mut queue: mpsc::Receiver<QueuedSubmission>) {
        // Hold back until the node has reported at least one block.
        self.events.ready().await;
        while let Some(job) = queue.recv().await {
            let result = self.process(&job.request).await;
            if let Err(err) = &result {
                warn!(%err, from = %job.request.from, "submission failed");
            }
            self.in_flight.remove(&job.request);
            let _ = job.done.send(result);
        }
        debug!("submission queue closed, worker exiting");
    }

    /// Steps 2-4 of a submission: nonce assignment, backend submit and the
    /// pending-set update are atomic with respect to each other.
    async fn process(&self, request: &TransactionRequest) -> Result<TxHash, SubmitError> {
        let _serialized = self.lock.lock().await;
        let nonce =
            self.nonces.next_nonce(request.from).await.map_err(SubmitError::backend)?;
        let hash = self.backend.submit(request, nonce).await.map_err(SubmitError::backend)?;
        self.nonces.record_pending(request.from, hash).await;
        debug!(tx = %hash, nonce, from = %request.from, "transaction submitted");
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mock::MockBackend, BlockInfo};
    use alloy_primitives::{Address, Bytes, U256};

    fn request(from: Address, value: u64) -> TransactionRequest {
        TransactionRequest {
            from,
            to: Some(Address::repeat_byte(0x99)),
            value: U256::from(value),
            data: Bytes::new(),
            gas_limit: 221_000,
            gas_price: 20_000_000_000,
        }
    }

    fn pipeline(
        backend: &Arc<MockBackend>,
        capacity: usize,
    ) -> (Submitter, Arc<EventHub>, tokio::task::JoinHandle<()>) {
        let events = Arc::new(EventHub::default());
        let nonces = Arc::new(NonceTracker::new(backend.clone()));
        let (submitter, worker, queue) =
            SubmitWorker::pipeline(backend.clone(), nonces, events.clone(), capacity);
        let handle = tokio::spawn(worker.run(queue));
        (submitter, events, handle)
    }

    #[tokio::test]
    async fn assigns_consecutive_nonces_in_fifo_order() {
        let backend = MockBackend::new();
        let sender = Address::repeat_byte(1);
        backend.set_nonce(sender, 7);
        let (submitter, events, _worker) = pipeline(&backend, SUBMISSION_QUEUE_CAPACITY);

        let first = submitter.submit(request(sender, 1)).unwrap();
        let second = submitter.submit(request(sender, 2)).unwrap();
        let third = submitter.submit(request(sender, 3)).unwrap();
        events.publish_block(BlockInfo { number: 1, receipts: Vec::new() });

        first.await.unwrap();
        second.await.unwrap();
        third.await.unwrap();

        let submissions = backend.submissions();
        assert_eq!(submissions.len(), 3);
        assert_eq!(
            submissions.iter().map(|(_, nonce)| *nonce).collect::<Vec<_>>(),
            vec![7, 8, 9]
        );
        assert_eq!(
            submissions.iter().map(|(req, _)| req.value).collect::<Vec<_>>(),
            vec![U256::from(1u64), U256::from(2u64), U256::from(3u64)]
        );
    }

    #[tokio::test]
    async fn interleaved_senders_stay_monotonic() {
        let backend = MockBackend::new();
        let alice = Address::repeat_byte(1);
        let bob = Address::repeat_byte(2);
        backend.set_nonce(alice, 5);
        backend.set_nonce(bob, 100);
        let (submitter, events, _worker) = pipeline(&backend, SUBMISSION_QUEUE_CAPACITY);

        let futures = vec![
            submitter.submit(request(alice, 1)).unwrap(),
            submitter.submit(request(bob, 2)).unwrap(),
            submitter.submit(request(alice, 3)).unwrap(),
        ];
        events.publish_block(BlockInfo { number: 1, receipts: Vec::new() });
        for pending in futures {
            pending.await.unwrap();
        }

        let nonces = |address| {
            backend
                .submissions()
                .iter()
                .filter(|(req, _)| req.from == address)
                .map(|(_, nonce)| *nonce)
                .collect::<Vec<_>>()
        };
        assert_eq!(nonces(alice), vec![5, 6]);
        assert_eq!(nonces(bob), vec![100]);
    }

    #[tokio::test]
    async fn equal_requests_share_one_submission() {
        let backend = MockBackend::new();
        let sender = Address::repeat_byte(1);
        let (submitter, events, _worker) = pipeline(&backend, SUBMISSION_QUEUE_CAPACITY);

        // The worker is gated on readiness, so both enqueues happen while the
        // request is still live.
        let first = submitter.submit(request(sender, 1)).unwrap();
        let second = submitter.submit(request(sender, 1)).unwrap();
        events.publish_block(BlockInfo { number: 1, receipts: Vec::new() });

        let (a, b) = (first.await.unwrap(), second.await.unwrap());
        assert_eq!(a, b);
        assert_eq!(backend.submissions().len(), 1);
    }

    #[tokio::test]
    async fn full_queue_fails_with_backpressure() {
        let backend = MockBackend::new();
        let sender = Address::repeat_byte(1);
        let (submitter, _events, _worker) = pipeline(&backend, 1);

        // No block was published, so the worker never drains the queue.
        submitter.submit(request(sender, 1)).unwrap();
        let err = submitter.submit(request(sender, 2)).unwrap_err();
        assert!(matches!(err, SubmitError::BackpressureExceeded));
        // A distinct request can be enqueued again once the map entry is gone.
        let err = submitter.submit(request(sender, 2)).unwrap_err();
        assert!(matches!(err, SubmitError::BackpressureExceeded));
    }

    #[tokio::test]
    async fn backend_failure_fails_the_future() {
        let backend = MockBackend::new();
        let sender = Address::repeat_byte(1);
        backend.fail_next_submit("nonce too low");
        let (submitter, events, _worker) = pipeline(&backend, SUBMISSION_QUEUE_CAPACITY);

        let pending = submitter.submit(request(sender, 1)).unwrap();
        events.publish_block(BlockInfo { number: 1, receipts: Vec::new() });
        let err = pending.await.unwrap_err();
        assert!(matches!(err, SubmitError::Backend(_)));
    }
}
