//! Compiled-contract ABI model and call encoding.

use crate::{filter::EventParam, Error};
use alloy_primitives::{keccak256, Bytes};
use pylon_abi::{decode_sequence, encode_sequence, AbiParam, ConverterRegistry, Encoder, Value};
use std::sync::Arc;

/// A declared constructor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbiConstructor {
    /// Constructor parameters.
    pub inputs: Vec<AbiParam>,
}

/// A declared function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbiFunction {
    /// Function name.
    pub name: String,
    /// Input parameters.
    pub inputs: Vec<AbiParam>,
    /// Return parameters.
    pub outputs: Vec<AbiParam>,
}

impl AbiFunction {
    /// Canonical signature, e.g. `transfer(address,uint256)`.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, canonical_names(&self.inputs))
    }

    /// The 4-byte call selector.
    pub fn selector(&self) -> [u8; 4] {
        let digest = keccak256(self.signature().as_bytes());
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&digest[..4]);
        selector
    }
}

/// A declared event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbiEventDef {
    /// Event name.
    pub name: String,
    /// Event parameters, indexed or plain, in declaration order.
    pub inputs: Vec<EventParam>,
}

/// ABI and deployment binary of a compiled contract.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompiledContract {
    /// Declared constructors. An empty list means the implicit zero-argument
    /// constructor.
    pub constructors: Vec<AbiConstructor>,
    /// Declared functions.
    pub functions: Vec<AbiFunction>,
    /// Declared events.
    pub events: Vec<AbiEventDef>,
    /// Deployment bytecode.
    pub binary: Bytes,
}

impl CompiledContract {
    /// Looks up a function by name.
    pub fn function(&self, name: &str) -> Result<&AbiFunction, Error> {
        self.functions
            .iter()
            .find(|function| function.name == name)
            .ok_or_else(|| Error::UnknownFunction(name.into()))
    }

    /// Looks up an event definition by name.
    pub fn event(&self, name: &str) -> Result<&AbiEventDef, Error> {
        self.events
            .iter()
            .find(|event| event.name == name)
            .ok_or_else(|| Error::UnknownFunction(name.into()))
    }
}

fn canonical_names(params: &[AbiParam]) -> String {
    params.iter().map(AbiParam::canonical_name).collect::<Vec<_>>().join(",")
}

/// Picks, per parameter position, the first registered encoder that accepts
/// the supplied value, then encodes the sequence.
fn encode_arguments(
    registry: &ConverterRegistry,
    params: &[AbiParam],
    values: &[Value],
) -> Result<Bytes, Error> {
    let mut chosen: Vec<(Arc<dyn Encoder>, &Value)> = Vec::with_capacity(values.len());
    for (param, value) in params.iter().zip(values) {
        let encoders = registry.encoders(param)?;
        let encoder = encoders
            .iter()
            .position(|encoder| encoder.accepts(value))
            .map(|index| encoders[index].clone())
            .ok_or_else(|| pylon_abi::AbiError::ValueMismatch {
                expected: param.canonical_name(),
                actual: value.type_label(),
            })?;
        chosen.push((encoder, value));
    }
    let items = chosen.iter().map(|(encoder, value)| (encoder.as_ref(), *value)).collect::<Vec<_>>();
    Ok(encode_sequence(&items)?)
}

/// Selects the constructor matching the supplied arguments: the first one
/// with matching arity whose every parameter has an encoder accepting the
/// corresponding value.
fn select_constructor<'c>(
    registry: &ConverterRegistry,
    contract: &'c CompiledContract,
    values: &[Value],
) -> Result<&'c AbiConstructor, Error> {
    for constructor in &contract.constructors {
        if constructor.inputs.len() != values.len() {
            continue;
        }
        let accepted = constructor.inputs.iter().zip(values).all(|(param, value)| {
            registry
                .encoders(param)
                .is_ok_and(|encoders| encoders.iter().any(|encoder| encoder.accepts(value)))
        });
        if accepted {
            return Ok(constructor);
        }
    }
    let labels =
        values.iter().map(|value| value.type_label()).collect::<Vec<_>>().join(", ");
    Err(Error::NoConstructorMatch(labels))
}

/// Assembles the deployment payload: the binary followed by the encoded
/// constructor arguments.
pub(crate) fn deployment_data(
    registry: &ConverterRegistry,
    contract: &CompiledContract,
    values: &[Value],
) -> Result<Bytes, Error> {
    if contract.constructors.is_empty() && values.is_empty() {
        return Ok(contract.binary.clone());
    }
    let constructor = select_constructor(registry, contract, values)?;
    let arguments = encode_arguments(registry, &constructor.inputs, values)?;
    let mut data = contract.binary.to_vec();
    data.extend_from_slice(&arguments);
    Ok(data.into())
}

/// Assembles the call payload: selector followed by the encoded arguments.
pub(crate) fn call_data(
    registry: &ConverterRegistry,
    function: &AbiFunction,
    values: &[Value],
) -> Result<Bytes, Error> {
    if function.inputs.len() != values.len() {
        return Err(Error::ArgumentCount {
            name: function.name.clone(),
            expected: function.inputs.len(),
            actual: values.len(),
        });
    }
    let mut data = function.selector().to_vec();
    data.extend_from_slice(&encode_arguments(registry, &function.inputs, values)?);
    Ok(data.into())
}

/// Decodes a function's return data, one value per declared output.
pub(crate) fn decode_return(
    registry: &ConverterRegistry,
    function: &AbiFunction,
    data: &[u8],
) -> Result<Vec<Value>, Error> {
    let slots = function
        .outputs
        .iter()
        .map(|param| registry.decoders(param))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(decode_sequence(&slots, data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{hex, Address, U256};

    fn transfer() -> AbiFunction {
        AbiFunction {
            name: "transfer".into(),
            inputs: vec![AbiParam::scalar("address"), AbiParam::scalar("uint256")],
            outputs: vec![AbiParam::scalar("bool")],
        }
    }

    #[test]
    fn selector_matches_the_canonical_hash() {
        assert_eq!(transfer().signature(), "transfer(address,uint256)");
        assert_eq!(transfer().selector(), hex!("a9059cbb"));
    }

    #[test]
    fn call_data_is_selector_plus_arguments() {
        let registry = ConverterRegistry::default();
        let recipient = Address::repeat_byte(2);
        let data = call_data(
            &registry,
            &transfer(),
            &[Value::Address(recipient), Value::Uint(U256::from(100u64))],
        )
        .unwrap();
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], hex!("a9059cbb"));
        assert_eq!(&data[16..36], recipient.as_slice());
        assert_eq!(data[4 + 64 - 1], 100);
    }

    #[test]
    fn call_data_checks_arity() {
        let registry = ConverterRegistry::default();
        let err = call_data(&registry, &transfer(), &[Value::Bool(true)]).unwrap_err();
        assert!(matches!(err, Error::ArgumentCount { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn return_data_decodes_per_output() {
        let registry = ConverterRegistry::default();
        let mut word = [0u8; 32];
        word[31] = 1;
        let decoded = decode_return(&registry, &transfer(), &word).unwrap();
        assert_eq!(decoded, vec![Value::Bool(true)]);
    }

    #[test]
    fn implicit_default_constructor_deploys_the_bare_binary() {
        let registry = ConverterRegistry::default();
        let contract =
            CompiledContract { binary: Bytes::from_static(&hex!("dead")), ..Default::default() };
        let data = deployment_data(&registry, &contract, &[]).unwrap();
        assert_eq!(data, contract.binary);
    }

    #[test]
    fn constructor_selection_matches_arity_and_types() {
        let registry = ConverterRegistry::default();
        let contract = CompiledContract {
            constructors: vec![
                AbiConstructor { inputs: vec![AbiParam::scalar("bool")] },
                AbiConstructor { inputs: vec![AbiParam::scalar("uint256")] },
            ],
            binary: Bytes::from_static(&hex!("dead")),
            ..Default::default()
        };

        let data = deployment_data(&registry, &contract, &[Value::from(5u64)]).unwrap();
        assert_eq!(&data[..2], hex!("dead"));
        assert_eq!(data.len(), 2 + 32);
        assert_eq!(data[2 + 31], 5);

        let err = deployment_data(
            &registry,
            &contract,
            &[Value::String("nope".into())],
        )
        .unwrap_err();
        assert!(matches!(err, Error::NoConstructorMatch(_)));
    }

    #[test]
    fn unknown_function_lookup_fails() {
        let contract = CompiledContract::default();
        assert!(matches!(contract.function("missing"), Err(Error::UnknownFunction(_))));
    }
}
