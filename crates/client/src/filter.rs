//! Decoded contract-event lookup, live and historical.

use crate::{
    Error, EventData, EventHub, TransactionInfo, TransactionReceipt, TransactionStatus, TxHash,
};
use alloy_primitives::{keccak256, Address, B256};
use futures_util::{stream, Stream, StreamExt};
use pylon_abi::{
    decode_sequence, try_decode, AbiError, AbiParam, ConverterRegistry, Decoder, Value,
};
use std::{fmt, sync::Arc};

/// A contract-event descriptor: recognises raw log entries and parses them
/// into a typed host representation.
pub trait SolidityEvent: Send + Sync + 'static {
    /// The parsed host representation.
    type Decoded: Send + 'static;

    /// Whether the raw log entry belongs to this event.
    fn matches(&self, log: &EventData) -> bool;

    /// Parses a matching log entry.
    fn parse(&self, log: &EventData) -> Result<Self::Decoded, Error>;
}

/// A parsed event together with the transaction that emitted it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventInfo<T> {
    /// The parsed event.
    pub event: T,
    /// Hash of the emitting transaction.
    pub transaction_hash: TxHash,
}

/// One parameter of an [`AbiEvent`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventParam {
    /// Shape of the parameter.
    pub param: AbiParam,
    /// Whether the parameter is indexed into a topic.
    pub indexed: bool,
}

impl EventParam {
    /// A non-indexed parameter carried in the data section.
    pub fn plain(param: AbiParam) -> Self {
        Self { param, indexed: false }
    }

    /// An indexed parameter carried as a topic.
    pub fn indexed(param: AbiParam) -> Self {
        Self { param, indexed: true }
    }
}

/// A registry-backed event descriptor decoding to [`Value`] lists.
///
/// Indexed parameters are decoded from the topic words (dynamic indexed
/// parameters appear on the wire only as their hash and surface as
/// [`Value::FixedBytes`]); the remaining parameters are decoded as a
/// sequence from the data section. Parameters keep their declaration order
/// in the output.
pub struct AbiEvent {
    name: String,
    topic: B256,
    slots: Vec<(bool, Vec<Arc<dyn Decoder>>)>,
}

impl fmt::Debug for AbiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbiEvent")
            .field("name", &self.name)
            .field("topic", &self.topic)
            .field("params", &self.slots.len())
            .finish()
    }
}

impl AbiEvent {
    /// Resolves the descriptor's decoders against the registry.
    pub fn resolve(
        registry: &ConverterRegistry,
        name: &str,
        inputs: &[EventParam],
    ) -> Result<Self, AbiError> {
        let signature = format!(
            "{name}({})",
            inputs.iter().map(|input| input.param.canonical_name()).collect::<Vec<_>>().join(",")
        );
        let slots = inputs
            .iter()
            .map(|input| Ok((input.indexed, registry.decoders(&input.param)?)))
            .collect::<Result<_, AbiError>>()?;
        Ok(Self { name: name.into(), topic: keccak256(signature.as_bytes()), slots })
    }

    /// The event's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The signature topic identifying this event.
    pub const fn topic(&self) -> &B256 {
        &self.topic
    }
}

impl SolidityEvent for AbiEvent {
    type Decoded = Vec<Value>;

    fn matches(&self, log: &EventData) -> bool {
        log.topics.first() == Some(&self.topic)
    }

    fn parse(&self, log: &EventData) -> Result<Vec<Value>, Error> {
        let data_slots = self
            .slots
            .iter()
            .filter(|(indexed, _)| !indexed)
            .map(|(_, slot)| slot.clone())
            .collect::<Vec<_>>();
        let mut data_values = decode_sequence(&data_slots, &log.data)?.into_iter();

        let mut topics = log.topics.iter().skip(1);
        let mut out = Vec::with_capacity(self.slots.len());
        for (indexed, slot) in &self.slots {
            if *indexed {
                let word = topics
                    .next()
                    .ok_or_else(|| AbiError::Decode("missing indexed topic".into()))?;
                let dynamic = slot.iter().any(|decoder| decoder.is_dynamic());
                if dynamic {
                    // Only the hash of a dynamic indexed value is on the wire.
                    out.push(Value::FixedBytes(*word, 32));
                } else {
                    out.push(try_decode(slot, word.as_slice()).map_err(Error::Abi)?);
                }
            } else {
                let value = data_values
                    .next()
                    .ok_or_else(|| AbiError::Decode("missing event data value".into()))?;
                out.push(value);
            }
        }
        Ok(out)
    }
}

/// The receipt of an `Executed` notification addressed to `address`.
fn receipt_for(info: TransactionInfo, address: Address) -> Option<TransactionReceipt> {
    if info.status != TransactionStatus::Executed {
        return None;
    }
    info.receipt.filter(|receipt| receipt.to == Some(address))
}

fn parse_if_match<E: SolidityEvent>(event: &E, log: &EventData) -> Option<(E::Decoded, TxHash)> {
    if !event.matches(log) {
        return None;
    }
    match event.parse(log) {
        Ok(decoded) => Some((decoded, log.transaction_hash)),
        Err(err) => {
            warn!(%err, tx = %log.transaction_hash, "skipping undecodable event");
            None
        }
    }
}

/// Live stream of parsed events emitted by `address`.
pub(crate) fn observe_events<E: SolidityEvent>(
    events: &EventHub,
    event: Arc<E>,
    address: Address,
) -> impl Stream<Item = E::Decoded> {
    observe_events_with_info(events, event, address).map(|info| info.event)
}

/// Live stream of parsed events with their originating transaction hash.
pub(crate) fn observe_events_with_info<E: SolidityEvent>(
    events: &EventHub,
    event: Arc<E>,
    address: Address,
) -> impl Stream<Item = EventInfo<E::Decoded>> {
    events
        .observe_transactions()
        .filter_map(|note| futures_util::future::ready(note.ok()))
        .filter_map(move |info| futures_util::future::ready(receipt_for(info, address)))
        .flat_map(|receipt| stream::iter(receipt.logs))
        .filter_map(move |log| {
            let decoded = parse_if_match(event.as_ref(), &log)
                .map(|(event, transaction_hash)| EventInfo { event, transaction_hash });
            futures_util::future::ready(decoded)
        })
}

/// Filters and parses the matching events of a batch of receipts.
pub(crate) fn collect_events<E: SolidityEvent>(
    event: &E,
    address: Address,
    receipts: &[TransactionReceipt],
) -> Result<Vec<EventInfo<E::Decoded>>, Error> {
    let mut out = Vec::new();
    for receipt in receipts {
        if receipt.to != Some(address) {
            continue;
        }
        for log in &receipt.logs {
            if event.matches(log) {
                out.push(EventInfo {
                    event: event.parse(log)?,
                    transaction_hash: log.transaction_hash,
                });
            }
        }
    }
    Ok(out)
}
