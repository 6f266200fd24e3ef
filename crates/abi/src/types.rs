//! Primitive ABI types and parameter descriptors.

/// A primitive ABI value type, parsed from its canonical name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SolidityType {
    /// `uintN` for `N` in 8..=256, multiples of 8.
    Uint(u16),
    /// `intN` for `N` in 8..=256, multiples of 8.
    Int(u16),
    /// `bool`.
    Bool,
    /// `address`.
    Address,
    /// `bytes`, a dynamically sized byte sequence.
    Bytes,
    /// `bytesN` for `N` in 1..=32.
    FixedBytes(u8),
    /// `string`.
    String,
}

impl SolidityType {
    /// Parses a canonical type name. Width-less `uint`/`int` normalize to 256
    /// bits. Returns `None` for unknown names and invalid widths.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bool" => return Some(Self::Bool),
            "address" => return Some(Self::Address),
            "bytes" => return Some(Self::Bytes),
            "string" => return Some(Self::String),
            "uint" => return Some(Self::Uint(256)),
            "int" => return Some(Self::Int(256)),
            _ => {}
        }
        if let Some(bits) = name.strip_prefix("uint") {
            return parse_bits(bits).map(Self::Uint);
        }
        if let Some(bits) = name.strip_prefix("int") {
            return parse_bits(bits).map(Self::Int);
        }
        if let Some(len) = name.strip_prefix("bytes") {
            return match len.parse::<u8>() {
                Ok(n) if (1..=32).contains(&n) => Some(Self::FixedBytes(n)),
                _ => None,
            };
        }
        None
    }

    /// The coarse group under which converters for this type are registered.
    pub const fn group(&self) -> SolidityTypeGroup {
        match self {
            Self::Uint(_) => SolidityTypeGroup::Uint,
            Self::Int(_) => SolidityTypeGroup::Int,
            Self::Bool => SolidityTypeGroup::Bool,
            Self::Address => SolidityTypeGroup::Address,
            Self::Bytes => SolidityTypeGroup::Bytes,
            Self::FixedBytes(_) => SolidityTypeGroup::FixedBytes,
            Self::String => SolidityTypeGroup::String,
        }
    }

    /// Canonical rendering, as used in function and event signatures.
    pub fn canonical_name(&self) -> String {
        match self {
            Self::Uint(bits) => format!("uint{bits}"),
            Self::Int(bits) => format!("int{bits}"),
            Self::Bool => "bool".into(),
            Self::Address => "address".into(),
            Self::Bytes => "bytes".into(),
            Self::FixedBytes(len) => format!("bytes{len}"),
            Self::String => "string".into(),
        }
    }
}

fn parse_bits(s: &str) -> Option<u16> {
    match s.parse::<u16>() {
        Ok(bits) if bits % 8 == 0 && (8..=256).contains(&bits) => Some(bits),
        _ => None,
    }
}

/// Converter registry key shared by all widths of a primitive type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SolidityTypeGroup {
    /// All unsigned integer widths.
    Uint,
    /// All signed integer widths.
    Int,
    /// Booleans.
    Bool,
    /// Account addresses.
    Address,
    /// Dynamic byte sequences.
    Bytes,
    /// All fixed byte-string widths.
    FixedBytes,
    /// UTF-8 strings.
    String,
}

/// Shape descriptor for a single ABI parameter.
///
/// `is_dynamic && is_array` describes a variable-length array;
/// `!is_dynamic && is_array` a fixed-length array of `array_size` elements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbiParam {
    /// Name of the element type, e.g. `"uint256"`.
    pub type_name: String,
    /// Whether the parameter is an array of the element type.
    pub is_array: bool,
    /// Whether the array length is dynamic.
    pub is_dynamic: bool,
    /// Element count of a fixed-length array.
    pub array_size: Option<usize>,
}

impl AbiParam {
    /// A plain scalar parameter.
    pub fn scalar(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), is_array: false, is_dynamic: false, array_size: None }
    }

    /// A variable-length array parameter (`T[]`).
    pub fn dynamic_array(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), is_array: true, is_dynamic: true, array_size: None }
    }

    /// A fixed-length array parameter (`T[size]`).
    pub fn fixed_array(type_name: impl Into<String>, size: usize) -> Self {
        Self {
            type_name: type_name.into(),
            is_array: true,
            is_dynamic: false,
            array_size: Some(size),
        }
    }

    /// Parses a suffixed declaration such as `"uint256"`, `"uint256[]"` or
    /// `"uint8[4]"`. The element type name is not validated here; resolution
    /// against the registry reports unknown types.
    pub fn parse(decl: &str) -> Option<Self> {
        let Some(open) = decl.find('[') else {
            return Some(Self::scalar(decl));
        };
        let (name, suffix) = decl.split_at(open);
        if name.is_empty() {
            return None;
        }
        match suffix {
            "[]" => Some(Self::dynamic_array(name)),
            _ => {
                let size = suffix.strip_prefix('[')?.strip_suffix(']')?.parse().ok()?;
                Some(Self::fixed_array(name, size))
            }
        }
    }

    /// Canonical rendering including the array suffix.
    pub fn canonical_name(&self) -> String {
        let base = SolidityType::parse(&self.type_name)
            .map_or_else(|| self.type_name.clone(), |ty| ty.canonical_name());
        match (self.is_array, self.array_size) {
            (false, _) => base,
            (true, None) => format!("{base}[]"),
            (true, Some(size)) => format!("{base}[{size}]"),
        }
    }
}
