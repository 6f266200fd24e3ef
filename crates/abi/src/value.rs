use alloy_primitives::{Address, Bytes, B256, I256, U256};

/// A typed host value, the domain of the converter registry.
///
/// One wire type can accept several host representations (the registry keeps
/// converters in ordered lists for exactly that reason), but every host value
/// entering or leaving the registry is expressed through this enum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// An unsigned integer of any registered width.
    Uint(U256),
    /// A signed integer of any registered width.
    Int(I256),
    /// A boolean.
    Bool(bool),
    /// A 20-byte account address.
    Address(Address),
    /// A dynamically sized byte sequence.
    Bytes(Bytes),
    /// A left-aligned fixed-width byte string and its width in bytes.
    FixedBytes(B256, usize),
    /// A UTF-8 string.
    String(String),
    /// A homogeneous array of values.
    Array(Vec<Value>),
}

impl Value {
    /// Short kind label used in diagnostics.
    pub const fn type_label(&self) -> &'static str {
        match self {
            Self::Uint(_) => "uint",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::Address(_) => "address",
            Self::Bytes(_) => "bytes",
            Self::FixedBytes(..) => "fixed-bytes",
            Self::String(_) => "string",
            Self::Array(_) => "array",
        }
    }
}

impl From<U256> for Value {
    fn from(value: U256) -> Self {
        Self::Uint(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }
}

impl From<I256> for Value {
    fn from(value: I256) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Address> for Value {
    fn from(value: Address) -> Self {
        Self::Address(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Array(value)
    }
}
