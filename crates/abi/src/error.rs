use crate::Value;
use thiserror::Error;

/// Errors produced while resolving or applying ABI converters.
#[derive(Debug, Error)]
pub enum AbiError {
    /// The parameter's type name does not name a known ABI primitive.
    #[error("unknown ABI type `{0}`")]
    UnknownType(String),
    /// No encoder has been registered for the type's group.
    #[error("no encoder registered for type `{0}`")]
    NoEncoderForType(String),
    /// No decoder has been registered for the type's group.
    #[error("no decoder registered for type `{0}`")]
    NoDecoderForType(String),
    /// A collection converter factory could not be instantiated.
    #[error("cannot construct collection converter: {0}")]
    ConverterConstruction(String),
    /// None of the resolved converters accepts the supplied host value.
    #[error("no `{expected}` converter accepts {actual} value")]
    ValueMismatch {
        /// Canonical name of the target ABI type.
        expected: String,
        /// Kind of the rejected value.
        actual: &'static str,
    },
    /// The wire data is truncated or otherwise malformed.
    #[error("malformed ABI data: {0}")]
    Decode(String),
}

impl AbiError {
    pub(crate) fn mismatch(expected: impl Into<String>, value: &Value) -> Self {
        Self::ValueMismatch { expected: expected.into(), actual: value.type_label() }
    }

    pub(crate) fn truncated(context: &str) -> Self {
        Self::Decode(format!("data truncated reading {context}"))
    }
}
