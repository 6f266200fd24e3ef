//! Collection converters parameterised over scalar element converters.

use crate::{
    coder::{length_word, usize_word},
    try_decode, AbiError, Decoder, Encoder, ListDecoderFactory, ListEncoderFactory, Value, WORD,
};
use alloy_primitives::Bytes;
use std::{fmt, sync::Arc};

fn element_encoder<'a>(
    inner: &'a [Arc<dyn Encoder>],
    value: &Value,
) -> Result<&'a dyn Encoder, AbiError> {
    inner
        .iter()
        .find(|encoder| encoder.accepts(value))
        .map(|encoder| encoder.as_ref())
        .ok_or_else(|| AbiError::mismatch("array element", value))
}

fn encode_elements(inner: &[Arc<dyn Encoder>], items: &[Value]) -> Result<Bytes, AbiError> {
    let mut chosen = Vec::with_capacity(items.len());
    for item in items {
        chosen.push((element_encoder(inner, item)?, item));
    }
    crate::encode_sequence(&chosen)
}

fn decode_elements(
    inner: &[Arc<dyn Decoder>],
    body: &[u8],
    len: usize,
) -> Result<Value, AbiError> {
    let dynamic = inner.iter().any(|decoder| decoder.is_dynamic());
    let stride = inner.first().map_or(1, |decoder| decoder.head_words()) * WORD;
    let mut items = Vec::with_capacity(len);
    for index in 0..len {
        let slice = if dynamic {
            let offset = usize_word(body, index)?;
            body.get(offset..).ok_or_else(|| AbiError::truncated("element offset"))?
        } else {
            body.get(index * stride..).ok_or_else(|| AbiError::truncated("element slot"))?
        };
        items.push(try_decode(inner, slice)?);
    }
    Ok(Value::Array(items))
}

fn accepts_elements(inner: &[Arc<dyn Encoder>], value: &Value) -> bool {
    match value {
        Value::Array(items) => {
            items.iter().all(|item| inner.iter().any(|encoder| encoder.accepts(item)))
        }
        _ => false,
    }
}

/// Variable-length array encoder: a length word followed by the element
/// sequence.
pub struct DynamicListEncoder {
    inner: Vec<Arc<dyn Encoder>>,
}

impl fmt::Debug for DynamicListEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicListEncoder").field("inner", &self.inner.len()).finish()
    }
}

impl Encoder for DynamicListEncoder {
    fn accepts(&self, value: &Value) -> bool {
        accepts_elements(&self.inner, value)
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn encode(&self, value: &Value) -> Result<Bytes, AbiError> {
        let Value::Array(items) = value else {
            return Err(AbiError::mismatch("array", value));
        };
        let mut out = length_word(items.len()).to_vec();
        out.extend_from_slice(&encode_elements(&self.inner, items)?);
        Ok(out.into())
    }
}

/// Fixed-length array encoder: the element sequence with no length prefix.
pub struct FixedListEncoder {
    inner: Vec<Arc<dyn Encoder>>,
    size: usize,
}

impl fmt::Debug for FixedListEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedListEncoder")
            .field("inner", &self.inner.len())
            .field("size", &self.size)
            .finish()
    }
}

impl Encoder for FixedListEncoder {
    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Array(items) if items.len() == self.size)
            && accepts_elements(&self.inner, value)
    }

    fn is_dynamic(&self) -> bool {
        self.inner.iter().any(|encoder| encoder.is_dynamic())
    }

    fn encode(&self, value: &Value) -> Result<Bytes, AbiError> {
        let Value::Array(items) = value else {
            return Err(AbiError::mismatch("array", value));
        };
        if items.len() != self.size {
            return Err(AbiError::ConverterConstruction(format!(
                "fixed array expects {} elements, got {}",
                self.size,
                items.len()
            )));
        }
        encode_elements(&self.inner, items)
    }
}

/// Variable-length collection decoder.
///
/// Reads a length word and then the element sequence. When the element
/// decoders report a packed 1-byte width (the `bytes` wire shape), the
/// payload is reassembled into a single [`Value::Bytes`] instead of an
/// element array.
pub struct DynamicListDecoder {
    inner: Vec<Arc<dyn Decoder>>,
}

impl fmt::Debug for DynamicListDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicListDecoder").field("inner", &self.inner.len()).finish()
    }
}

impl Decoder for DynamicListDecoder {
    fn is_dynamic(&self) -> bool {
        true
    }

    fn decode(&self, data: &[u8]) -> Result<Value, AbiError> {
        let len = usize_word(data, 0)?;
        let body = data.get(WORD..).ok_or_else(|| AbiError::truncated("list body"))?;
        if self.inner.iter().any(|decoder| decoder.element_width() == 1) {
            let payload = body.get(..len).ok_or_else(|| AbiError::truncated("packed payload"))?;
            return Ok(Value::Bytes(Bytes::copy_from_slice(payload)));
        }
        decode_elements(&self.inner, body, len)
    }
}

/// Fixed-length collection decoder.
pub struct FixedListDecoder {
    inner: Vec<Arc<dyn Decoder>>,
    size: usize,
}

impl fmt::Debug for FixedListDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedListDecoder")
            .field("inner", &self.inner.len())
            .field("size", &self.size)
            .finish()
    }
}

impl Decoder for FixedListDecoder {
    fn is_dynamic(&self) -> bool {
        self.inner.iter().any(|decoder| decoder.is_dynamic())
    }

    fn head_words(&self) -> usize {
        if self.is_dynamic() {
            1
        } else {
            self.size * self.inner.first().map_or(1, |decoder| decoder.head_words())
        }
    }

    fn decode(&self, data: &[u8]) -> Result<Value, AbiError> {
        decode_elements(&self.inner, data, self.size)
    }
}

/// The built-in factory for both collection shapes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ListCoderFactory;

impl ListEncoderFactory for ListCoderFactory {
    fn dynamic(&self, inner: Vec<Arc<dyn Encoder>>) -> Result<Arc<dyn Encoder>, AbiError> {
        if inner.is_empty() {
            return Err(AbiError::ConverterConstruction("empty element encoder list".into()));
        }
        Ok(Arc::new(DynamicListEncoder { inner }))
    }

    fn fixed(
        &self,
        inner: Vec<Arc<dyn Encoder>>,
        size: usize,
    ) -> Result<Arc<dyn Encoder>, AbiError> {
        if inner.is_empty() {
            return Err(AbiError::ConverterConstruction("empty element encoder list".into()));
        }
        Ok(Arc::new(FixedListEncoder { inner, size }))
    }
}

impl ListDecoderFactory for ListCoderFactory {
    fn dynamic(&self, inner: Vec<Arc<dyn Decoder>>) -> Result<Arc<dyn Decoder>, AbiError> {
        if inner.is_empty() {
            return Err(AbiError::ConverterConstruction("empty element decoder list".into()));
        }
        Ok(Arc::new(DynamicListDecoder { inner }))
    }

    fn fixed(
        &self,
        inner: Vec<Arc<dyn Decoder>>,
        size: usize,
    ) -> Result<Arc<dyn Decoder>, AbiError> {
        if inner.is_empty() {
            return Err(AbiError::ConverterConstruction("empty element decoder list".into()));
        }
        Ok(Arc::new(FixedListDecoder { inner, size }))
    }
}
