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

mod error;
pub use error::AbiError;

mod types;
pub use types::{AbiParam, SolidityType, SolidityTypeGroup};

mod value;
pub use value::Value;

mod coder;
pub use coder::{
    decode_sequence, encode_sequence, try_decode, Decoder, Encoder, ListDecoderFactory,
    ListEncoderFactory, WORD,
};

mod scalar;
pub use scalar::{
    AddressCoder, BoolCoder, ByteDecoder, BytesEncoder, FixedBytesCoder, IntCoder, StringCoder,
    UintCoder,
};

mod list;
pub use list::{
    DynamicListDecoder, DynamicListEncoder, FixedListDecoder, FixedListEncoder, ListCoderFactory,
};

mod registry;
pub use registry::ConverterRegistry;
