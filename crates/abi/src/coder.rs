//! Converter traits and the shared head/tail word codec.

use crate::{AbiError, Value};
use alloy_primitives::{Bytes, U256};
use std::sync::Arc;

/// Width in bytes of one ABI word.
pub const WORD: usize = 32;

/// Converts host values into their wire encoding.
///
/// Converters are resolved as ordered lists; callers probe `accepts` in
/// registration order and use the first encoder that takes the value.
pub trait Encoder: Send + Sync {
    /// Whether this encoder can encode the given host value.
    fn accepts(&self, value: &Value) -> bool;

    /// Whether the encoding is dynamically sized and therefore referenced
    /// through an offset word in the enclosing sequence.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Encodes the value. Static encoders yield whole words; dynamic encoders
    /// yield their complete tail encoding.
    fn encode(&self, value: &Value) -> Result<Bytes, AbiError>;
}

/// Converts wire encodings back into host values.
///
/// `decode` receives the slice starting at the converter's own position: the
/// head slot for static decoders, the offset target for dynamic ones.
pub trait Decoder: Send + Sync {
    /// Whether the wire shape is dynamically sized.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Number of head words a static decoder occupies in a sequence.
    fn head_words(&self) -> usize {
        1
    }

    /// Width in bytes of one element of this shape inside a packed
    /// collection. Word-shaped values report [`WORD`]; the single-octet
    /// element of a `bytes` sequence reports 1.
    fn element_width(&self) -> usize {
        WORD
    }

    /// Decodes a host value from the start of `data`.
    fn decode(&self, data: &[u8]) -> Result<Value, AbiError>;
}

/// Builds variable-length collection encoders over element encoders.
pub trait ListEncoderFactory: Send + Sync {
    /// Instantiates the dynamic (length-prefixed) shape.
    fn dynamic(&self, inner: Vec<Arc<dyn Encoder>>) -> Result<Arc<dyn Encoder>, AbiError>;

    /// Instantiates the fixed shape of exactly `size` elements.
    fn fixed(&self, inner: Vec<Arc<dyn Encoder>>, size: usize)
        -> Result<Arc<dyn Encoder>, AbiError>;
}

/// Builds collection decoders over element decoders.
pub trait ListDecoderFactory: Send + Sync {
    /// Instantiates the dynamic (length-prefixed) shape.
    fn dynamic(&self, inner: Vec<Arc<dyn Decoder>>) -> Result<Arc<dyn Decoder>, AbiError>;

    /// Instantiates the fixed shape of exactly `size` elements.
    fn fixed(&self, inner: Vec<Arc<dyn Decoder>>, size: usize)
        -> Result<Arc<dyn Decoder>, AbiError>;
}

enum Part {
    Head(Bytes),
    Tail(Bytes),
}

/// Encodes a sequence of already-paired encoders and values using the
/// standard head/tail layout: static parts inline, dynamic parts behind
/// offset words relative to the start of the sequence.
pub fn encode_sequence(items: &[(&dyn Encoder, &Value)]) -> Result<Bytes, AbiError> {
    let mut parts = Vec::with_capacity(items.len());
    let mut head_len = 0;
    for (encoder, value) in items {
        let encoded = encoder.encode(value)?;
        if encoder.is_dynamic() {
            head_len += WORD;
            parts.push(Part::Tail(encoded));
        } else {
            head_len += encoded.len();
            parts.push(Part::Head(encoded));
        }
    }

    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for part in &parts {
        match part {
            Part::Head(words) => head.extend_from_slice(words),
            Part::Tail(bytes) => {
                head.extend_from_slice(&length_word(head_len + tail.len()));
                tail.extend_from_slice(bytes);
            }
        }
    }
    head.extend_from_slice(&tail);
    Ok(head.into())
}

/// Decodes a sequence of values, one per decoder slot, from `data`.
///
/// Each slot is the ordered candidate list resolved from the registry for
/// one parameter position.
pub fn decode_sequence(
    slots: &[Vec<Arc<dyn Decoder>>],
    data: &[u8],
) -> Result<Vec<Value>, AbiError> {
    let mut out = Vec::with_capacity(slots.len());
    let mut head = 0;
    for slot in slots {
        let lead = slot.first().ok_or_else(|| AbiError::Decode("empty decoder slot".into()))?;
        if lead.is_dynamic() {
            let offset = usize_word(data, head)?;
            let tail = data.get(offset..).ok_or_else(|| AbiError::truncated("tail offset"))?;
            out.push(try_decode(slot, tail)?);
            head += 1;
        } else {
            let start = head * WORD;
            let slice = data.get(start..).ok_or_else(|| AbiError::truncated("head slot"))?;
            out.push(try_decode(slot, slice)?);
            head += lead.head_words();
        }
    }
    Ok(out)
}

/// Tries each decoder of a slot in registration order, returning the first
/// successful value.
pub fn try_decode(slot: &[Arc<dyn Decoder>], data: &[u8]) -> Result<Value, AbiError> {
    let mut last = None;
    for decoder in slot {
        match decoder.decode(data) {
            Ok(value) => return Ok(value),
            Err(err) => last = Some(err),
        }
    }
    Err(last.unwrap_or_else(|| AbiError::Decode("empty decoder slot".into())))
}

pub(crate) fn length_word(len: usize) -> [u8; WORD] {
    U256::from(len).to_be_bytes::<WORD>()
}

/// Reads the `index`-th word of `data` as a `usize`.
pub(crate) fn usize_word(data: &[u8], index: usize) -> Result<usize, AbiError> {
    let start = index * WORD;
    let word = data
        .get(start..start + WORD)
        .ok_or_else(|| AbiError::Decode(format!("data truncated at word {index}")))?;
    usize::try_from(U256::from_be_slice(word))
        .map_err(|_| AbiError::Decode("length word exceeds usize".into()))
}
