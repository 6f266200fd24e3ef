use crate::{BackendError, SubmitError, WatchError};
use pylon_abi::AbiError;
use thiserror::Error;

/// Error surfaced by the proxy's public API.
#[derive(Debug, Error)]
pub enum Error {
    /// ABI conversion failed.
    #[error(transparent)]
    Abi(#[from] AbiError),
    /// The submission queue rejected or failed the request.
    #[error(transparent)]
    Submit(#[from] SubmitError),
    /// The confirmation watcher reported a terminal failure.
    #[error(transparent)]
    Watch(#[from] WatchError),
    /// A backend call failed outside the submission path.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// No declared constructor accepts the supplied arguments.
    #[error("no constructor matches ({0})")]
    NoConstructorMatch(String),
    /// The contract declares no function of that name.
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    /// A function was invoked with the wrong number of arguments.
    #[error("function `{name}` takes {expected} argument(s), got {actual}")]
    ArgumentCount {
        /// Function name.
        name: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },
    /// The deployment receipt carries no contract address.
    #[error("deployment receipt carries no contract address")]
    ContractNotDeployed,
    /// No receipt exists for the queried transaction.
    #[error("transaction receipt not found")]
    ReceiptMissing,
}
