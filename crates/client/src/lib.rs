#![doc = include_str!("../README.md")]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    clippy::missing_const_for_fn,
    rustdoc::all
)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

/// Re-export of the ABI type model and converter registry.
pub use pylon_abi as abi;

mod backend;
pub use backend::{BackendError, NodeBackend};

mod contract;
pub use contract::{AbiConstructor, AbiEventDef, AbiFunction, CompiledContract};

mod error;
pub use error::Error;

mod events;
pub use events::{EventHub, DEFAULT_CHANNEL_CAPACITY};

mod filter;
pub use filter::{AbiEvent, EventInfo, EventParam, SolidityEvent};

mod nonce;

mod proxy;
pub use proxy::{NodeProxy, ProxyConfig};

mod submit;
pub use submit::{PendingSubmission, SubmitError};

mod types;
pub use types::{
    BlockHash, BlockId, BlockInfo, CallDetails, EventData, TransactionInfo, TransactionReceipt,
    TransactionRequest, TransactionStatus, TxHash,
};

mod watch;
pub use watch::{PendingConfirmation, WatchError};

#[cfg(test)]
pub(crate) mod mock;
