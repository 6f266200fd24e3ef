use crate::{
    scalar::{
        AddressCoder, BoolCoder, ByteDecoder, BytesEncoder, FixedBytesCoder, IntCoder, StringCoder,
        UintCoder,
    },
    AbiError, AbiParam, Decoder, Encoder, ListCoderFactory, ListDecoderFactory, ListEncoderFactory,
    SolidityType, SolidityTypeGroup,
};
use std::{
    any::TypeId,
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

/// Append-only registry of ABI converters.
///
/// Scalar converters are kept per [`SolidityTypeGroup`] in registration
/// order; collection shapes are instantiated on demand by the registered
/// factories. Callers probe a resolved list in order and keep the first
/// converter that accepts their value, so earlier registrations win.
pub struct ConverterRegistry {
    encoders: HashMap<SolidityTypeGroup, Vec<Arc<dyn Encoder>>>,
    decoders: HashMap<SolidityTypeGroup, Vec<Arc<dyn Decoder>>>,
    list_encoders: Vec<Arc<dyn ListEncoderFactory>>,
    list_decoders: Vec<Arc<dyn ListDecoderFactory>>,
    void_types: HashSet<TypeId>,
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("encoder_groups", &self.encoders.len())
            .field("decoder_groups", &self.decoders.len())
            .field("list_encoders", &self.list_encoders.len())
            .field("list_decoders", &self.list_decoders.len())
            .field("void_types", &self.void_types.len())
            .finish()
    }
}

impl Default for ConverterRegistry {
    /// A registry primed with the built-in converter set.
    fn default() -> Self {
        let mut registry = Self::empty();

        registry.add_encoder(SolidityTypeGroup::Uint, Arc::new(UintCoder));
        registry.add_encoder(SolidityTypeGroup::Int, Arc::new(IntCoder));
        registry.add_encoder(SolidityTypeGroup::Bool, Arc::new(BoolCoder));
        registry.add_encoder(SolidityTypeGroup::Address, Arc::new(AddressCoder));
        registry.add_encoder(SolidityTypeGroup::FixedBytes, Arc::new(FixedBytesCoder));
        registry.add_encoder(SolidityTypeGroup::Bytes, Arc::new(BytesEncoder));
        registry.add_encoder(SolidityTypeGroup::String, Arc::new(StringCoder));

        registry.add_decoder(SolidityTypeGroup::Uint, Arc::new(UintCoder));
        registry.add_decoder(SolidityTypeGroup::Int, Arc::new(IntCoder));
        registry.add_decoder(SolidityTypeGroup::Bool, Arc::new(BoolCoder));
        registry.add_decoder(SolidityTypeGroup::Address, Arc::new(AddressCoder));
        registry.add_decoder(SolidityTypeGroup::FixedBytes, Arc::new(FixedBytesCoder));
        registry.add_decoder(SolidityTypeGroup::Bytes, Arc::new(ByteDecoder));
        registry.add_decoder(SolidityTypeGroup::String, Arc::new(StringCoder));

        registry.add_list_encoder(Arc::new(ListCoderFactory));
        registry.add_list_decoder(Arc::new(ListCoderFactory));

        registry.add_void_type::<()>();
        registry
    }
}

impl ConverterRegistry {
    /// A registry with no converters at all.
    pub fn empty() -> Self {
        Self {
            encoders: HashMap::new(),
            decoders: HashMap::new(),
            list_encoders: Vec::new(),
            list_decoders: Vec::new(),
            void_types: HashSet::new(),
        }
    }

    /// Appends an encoder to the group's list.
    pub fn add_encoder(&mut self, group: SolidityTypeGroup, encoder: Arc<dyn Encoder>) {
        self.encoders.entry(group).or_default().push(encoder);
    }

    /// Appends a decoder to the group's list.
    pub fn add_decoder(&mut self, group: SolidityTypeGroup, decoder: Arc<dyn Decoder>) {
        self.decoders.entry(group).or_default().push(decoder);
    }

    /// Appends a collection-encoder factory.
    pub fn add_list_encoder(&mut self, factory: Arc<dyn ListEncoderFactory>) {
        self.list_encoders.push(factory);
    }

    /// Appends a collection-decoder factory.
    pub fn add_list_decoder(&mut self, factory: Arc<dyn ListDecoderFactory>) {
        self.list_decoders.push(factory);
    }

    /// Registers a host type as carrying no return value.
    pub fn add_void_type<T: ?Sized + 'static>(&mut self) {
        self.void_types.insert(TypeId::of::<T>());
    }

    /// Whether the host type was registered as void.
    pub fn is_void_type<T: ?Sized + 'static>(&self) -> bool {
        self.void_types.contains(&TypeId::of::<T>())
    }

    /// Resolves the ordered encoder list for a parameter.
    ///
    /// Array parameters yield one instance per registered collection-encoder
    /// factory, each parameterised over the scalar encoders of the element
    /// type.
    pub fn encoders(&self, param: &AbiParam) -> Result<Vec<Arc<dyn Encoder>>, AbiError> {
        let ty = self.resolve_type(param)?;
        let scalars = self
            .encoders
            .get(&ty.group())
            .filter(|list| !list.is_empty())
            .ok_or_else(|| AbiError::NoEncoderForType(param.type_name.clone()))?
            .clone();
        if !param.is_array {
            return Ok(scalars);
        }
        self.list_encoders
            .iter()
            .map(|factory| {
                if param.is_dynamic {
                    factory.dynamic(scalars.clone())
                } else {
                    factory.fixed(scalars.clone(), self.fixed_size(param)?)
                }
            })
            .collect()
    }

    /// Resolves the ordered decoder list for a parameter.
    ///
    /// Mirror of [`encoders`](Self::encoders), except that the `bytes` type
    /// is a length-prefixed sequence on the wire and is therefore wrapped in
    /// dynamic collection decoders even when the parameter is not an array.
    pub fn decoders(&self, param: &AbiParam) -> Result<Vec<Arc<dyn Decoder>>, AbiError> {
        let ty = self.resolve_type(param)?;
        let mut scalars = self
            .decoders
            .get(&ty.group())
            .filter(|list| !list.is_empty())
            .ok_or_else(|| AbiError::NoDecoderForType(param.type_name.clone()))?
            .clone();
        if ty == SolidityType::Bytes {
            scalars = self.wrap_dynamic(scalars)?;
        }
        if !param.is_array {
            return Ok(scalars);
        }
        self.list_decoders
            .iter()
            .map(|factory| {
                if param.is_dynamic {
                    factory.dynamic(scalars.clone())
                } else {
                    factory.fixed(scalars.clone(), self.fixed_size(param)?)
                }
            })
            .collect()
    }

    fn wrap_dynamic(
        &self,
        inner: Vec<Arc<dyn Decoder>>,
    ) -> Result<Vec<Arc<dyn Decoder>>, AbiError> {
        if self.list_decoders.is_empty() {
            return Err(AbiError::ConverterConstruction(
                "no collection-decoder factory registered".into(),
            ));
        }
        self.list_decoders.iter().map(|factory| factory.dynamic(inner.clone())).collect()
    }

    fn resolve_type(&self, param: &AbiParam) -> Result<SolidityType, AbiError> {
        SolidityType::parse(&param.type_name)
            .ok_or_else(|| AbiError::UnknownType(param.type_name.clone()))
    }

    fn fixed_size(&self, param: &AbiParam) -> Result<usize, AbiError> {
        param.array_size.ok_or_else(|| {
            AbiError::ConverterConstruction(format!(
                "fixed array `{}` has no declared size",
                param.type_name
            ))
        })
    }
}
