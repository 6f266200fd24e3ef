//! Built-in scalar converters, one pair per type group.

use crate::{
    coder::{length_word, usize_word},
    AbiError, Decoder, Encoder, Value, WORD,
};
use alloy_primitives::{Address, Bytes, B256, I256, U256};

fn pad_right(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    let rem = out.len() % WORD;
    if rem != 0 {
        out.resize(out.len() + WORD - rem, 0);
    }
    out
}

fn word(data: &[u8], context: &str) -> Result<[u8; WORD], AbiError> {
    let slice = data.get(..WORD).ok_or_else(|| AbiError::truncated(context))?;
    let mut out = [0u8; WORD];
    out.copy_from_slice(slice);
    Ok(out)
}

/// Unsigned integers of any width, as one big-endian word.
#[derive(Clone, Copy, Debug, Default)]
pub struct UintCoder;

impl Encoder for UintCoder {
    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Uint(_))
    }

    fn encode(&self, value: &Value) -> Result<Bytes, AbiError> {
        match value {
            Value::Uint(n) => Ok(Bytes::copy_from_slice(&n.to_be_bytes::<WORD>())),
            other => Err(AbiError::mismatch("uint", other)),
        }
    }
}

impl Decoder for UintCoder {
    fn decode(&self, data: &[u8]) -> Result<Value, AbiError> {
        Ok(Value::Uint(U256::from_be_bytes(word(data, "uint word")?)))
    }
}

/// Signed integers of any width, as one sign-extended two's-complement word.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntCoder;

impl Encoder for IntCoder {
    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Int(_))
    }

    fn encode(&self, value: &Value) -> Result<Bytes, AbiError> {
        match value {
            Value::Int(n) => Ok(Bytes::copy_from_slice(&n.into_raw().to_be_bytes::<WORD>())),
            other => Err(AbiError::mismatch("int", other)),
        }
    }
}

impl Decoder for IntCoder {
    fn decode(&self, data: &[u8]) -> Result<Value, AbiError> {
        let raw = U256::from_be_bytes(word(data, "int word")?);
        Ok(Value::Int(I256::from_raw(raw)))
    }
}

/// Booleans, as a word holding 0 or 1.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoolCoder;

impl Encoder for BoolCoder {
    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Bool(_))
    }

    fn encode(&self, value: &Value) -> Result<Bytes, AbiError> {
        match value {
            Value::Bool(b) => {
                let mut out = [0u8; WORD];
                out[WORD - 1] = u8::from(*b);
                Ok(Bytes::copy_from_slice(&out))
            }
            other => Err(AbiError::mismatch("bool", other)),
        }
    }
}

impl Decoder for BoolCoder {
    fn decode(&self, data: &[u8]) -> Result<Value, AbiError> {
        let word = word(data, "bool word")?;
        Ok(Value::Bool(word.iter().any(|b| *b != 0)))
    }
}

/// Addresses, left-padded to one word.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddressCoder;

impl Encoder for AddressCoder {
    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Address(_))
    }

    fn encode(&self, value: &Value) -> Result<Bytes, AbiError> {
        match value {
            Value::Address(address) => {
                let mut out = [0u8; WORD];
                out[WORD - Address::len_bytes()..].copy_from_slice(address.as_slice());
                Ok(Bytes::copy_from_slice(&out))
            }
            other => Err(AbiError::mismatch("address", other)),
        }
    }
}

impl Decoder for AddressCoder {
    fn decode(&self, data: &[u8]) -> Result<Value, AbiError> {
        let word = word(data, "address word")?;
        Ok(Value::Address(Address::from_slice(&word[WORD - Address::len_bytes()..])))
    }
}

/// Fixed-width byte strings, right-aligned into one word.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedBytesCoder;

impl Encoder for FixedBytesCoder {
    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::FixedBytes(..))
    }

    fn encode(&self, value: &Value) -> Result<Bytes, AbiError> {
        match value {
            Value::FixedBytes(word, _) => Ok(Bytes::copy_from_slice(word.as_slice())),
            other => Err(AbiError::mismatch("fixed bytes", other)),
        }
    }
}

impl Decoder for FixedBytesCoder {
    fn decode(&self, data: &[u8]) -> Result<Value, AbiError> {
        let word = word(data, "fixed-bytes word")?;
        Ok(Value::FixedBytes(B256::from(word), WORD))
    }
}

/// Dynamic byte sequences, encoded as a length word followed by the padded
/// payload. Decoding of this shape goes through the collection decoders; see
/// [`ByteDecoder`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesEncoder;

impl Encoder for BytesEncoder {
    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Bytes(_))
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn encode(&self, value: &Value) -> Result<Bytes, AbiError> {
        match value {
            Value::Bytes(bytes) => {
                let mut out = length_word(bytes.len()).to_vec();
                out.extend_from_slice(&pad_right(bytes));
                Ok(out.into())
            }
            other => Err(AbiError::mismatch("bytes", other)),
        }
    }
}

/// The single-octet element of a packed `bytes` sequence.
///
/// Registered as the scalar decoder of the `bytes` group; the enclosing
/// collection decoder recognises its 1-byte element width and reassembles
/// the packed payload into a [`Value::Bytes`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ByteDecoder;

impl Decoder for ByteDecoder {
    fn element_width(&self) -> usize {
        1
    }

    fn decode(&self, data: &[u8]) -> Result<Value, AbiError> {
        let byte = data.first().ok_or_else(|| AbiError::truncated("byte element"))?;
        Ok(Value::Uint(U256::from(*byte)))
    }
}

/// UTF-8 strings over the `bytes` wire layout.
#[derive(Clone, Copy, Debug, Default)]
pub struct StringCoder;

impl Encoder for StringCoder {
    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::String(_))
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn encode(&self, value: &Value) -> Result<Bytes, AbiError> {
        match value {
            Value::String(s) => {
                let mut out = length_word(s.len()).to_vec();
                out.extend_from_slice(&pad_right(s.as_bytes()));
                Ok(out.into())
            }
            other => Err(AbiError::mismatch("string", other)),
        }
    }
}

impl Decoder for StringCoder {
    fn is_dynamic(&self) -> bool {
        true
    }

    fn decode(&self, data: &[u8]) -> Result<Value, AbiError> {
        let len = usize_word(data, 0)?;
        let payload =
            data.get(WORD..WORD + len).ok_or_else(|| AbiError::truncated("string payload"))?;
        String::from_utf8(payload.to_vec())
            .map(Value::String)
            .map_err(|err| AbiError::Decode(format!("invalid UTF-8 string: {err}")))
    }
}
