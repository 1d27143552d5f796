//! Scalar vocabulary shared by the schema object model.
//!
//! This module contains the small enumerations used by field, message and
//! layer definitions: storage types, endianness, semantic types, override
//! policies and similar property values.

/// Byte order of serialised values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endian {
    /// Little-endian byte order.
    #[default]
    Little,
    /// Big-endian byte order.
    Big,
}

impl Endian {
    /// Parses endianness from a property value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "little" | "littleendian" | "little-endian" | "le" => Some(Self::Little),
            "big" | "bigendian" | "big-endian" | "be" => Some(Self::Big),
            _ => None,
        }
    }
}

/// Storage type of integral fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntType {
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    Uint8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    Uint16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    Uint32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    Uint64,
    /// Signed variable length (base-128) integer.
    Intvar,
    /// Unsigned variable length (base-128) integer.
    Uintvar,
}

impl IntType {
    /// Parses a type from its schema name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int8" => Some(Self::Int8),
            "uint8" => Some(Self::Uint8),
            "int16" => Some(Self::Int16),
            "uint16" => Some(Self::Uint16),
            "int32" => Some(Self::Int32),
            "uint32" => Some(Self::Uint32),
            "int64" => Some(Self::Int64),
            "uint64" => Some(Self::Uint64),
            "intvar" => Some(Self::Intvar),
            "uintvar" => Some(Self::Uintvar),
            _ => None,
        }
    }

    /// Returns the schema name of the type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Intvar => "intvar",
            Self::Uintvar => "uintvar",
        }
    }

    /// Returns the maximal serialisation length in bytes.
    #[must_use]
    pub const fn max_length(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 => 4,
            Self::Int64 | Self::Uint64 => 8,
            Self::Intvar | Self::Uintvar => 9,
        }
    }

    /// Returns true if the type is signed.
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 | Self::Intvar
        )
    }

    /// Returns true if the serialisation length varies with the value.
    #[must_use]
    pub const fn is_var_length(self) -> bool {
        matches!(self, Self::Intvar | Self::Uintvar)
    }

    /// Returns the minimal value representable in `length` bytes.
    #[must_use]
    pub fn min_value(self, length: usize) -> i128 {
        if !self.is_signed() {
            return 0;
        }
        let bits = Self::value_bits(self, length);
        -(1i128 << (bits - 1))
    }

    /// Returns the maximal value representable in `length` bytes.
    #[must_use]
    pub fn max_value(self, length: usize) -> i128 {
        let bits = Self::value_bits(self, length);
        if self.is_signed() {
            (1i128 << (bits - 1)) - 1
        } else {
            (1i128 << bits) - 1
        }
    }

    fn value_bits(self, length: usize) -> u32 {
        let bits = if self.is_var_length() {
            // Seven payload bits per byte.
            length.clamp(1, 9) * 7
        } else {
            length.clamp(1, 8) * 8
        };
        u32::try_from(bits.min(64)).unwrap_or(64)
    }
}

/// Storage type of floating point fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatType {
    /// 32-bit floating point.
    Float,
    /// 64-bit floating point.
    Double,
}

impl FloatType {
    /// Parses a type from its schema name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            _ => None,
        }
    }

    /// Returns the serialisation length in bytes.
    #[must_use]
    pub const fn length(self) -> usize {
        match self {
            Self::Float => 4,
            Self::Double => 8,
        }
    }
}

/// Semantic meaning attached to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SemanticType {
    /// No special meaning.
    #[default]
    None,
    /// Field carries the protocol version.
    Version,
    /// Field carries the numeric message id.
    MessageId,
    /// Field carries the remaining length.
    Length,
}

impl SemanticType {
    /// Parses a semantic type from a property value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "" | "none" => Some(Self::None),
            "version" => Some(Self::Version),
            "messageid" => Some(Self::MessageId),
            "length" => Some(Self::Length),
            _ => None,
        }
    }
}

/// Policy governing custom code supplied for a generated function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OverrideType {
    /// Custom code may replace or extend the default.
    #[default]
    Any,
    /// Custom code must replace the default.
    Replace,
    /// Custom code may only extend the default.
    Extend,
    /// Custom code is not allowed.
    None,
}

impl OverrideType {
    /// Parses a policy from a property value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "any" => Some(Self::Any),
            "replace" => Some(Self::Replace),
            "extend" => Some(Self::Extend),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    /// Returns true if custom code replacing the default is acceptable.
    #[must_use]
    pub const fn allows_replace(self) -> bool {
        matches!(self, Self::Any | Self::Replace)
    }

    /// Returns true if custom code extending the default is acceptable.
    #[must_use]
    pub const fn allows_extend(self) -> bool {
        matches!(self, Self::Any | Self::Extend)
    }
}

/// Override policies of a field or message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Overrides {
    /// Value access functions.
    pub value: OverrideType,
    /// Read function.
    pub read: OverrideType,
    /// Write function.
    pub write: OverrideType,
    /// Refresh function.
    pub refresh: OverrideType,
    /// Length calculation.
    pub length: OverrideType,
    /// Validity check.
    pub valid: OverrideType,
    /// Name retrieval.
    pub name: OverrideType,
}

/// Direction in which a message is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sender {
    /// Sent by both sides.
    #[default]
    Both,
    /// Sent only by the client.
    Client,
    /// Sent only by the server.
    Server,
}

impl Sender {
    /// Parses a sender from a property value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "both" => Some(Self::Both),
            "client" => Some(Self::Client),
            "server" => Some(Self::Server),
            _ => None,
        }
    }
}

/// Initial mode of an optional field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OptionalMode {
    /// Existence is decided while reading.
    #[default]
    Tentative,
    /// Field is missing.
    Missing,
    /// Field exists.
    Exists,
}

impl OptionalMode {
    /// Parses a mode from a property value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tentative" => Some(Self::Tentative),
            "missing" | "miss" => Some(Self::Missing),
            "exists" | "exist" => Some(Self::Exists),
            _ => None,
        }
    }
}

/// Checksum calculation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlg {
    /// Algorithm provided by the backend under a custom name.
    Custom,
    /// Arithmetic sum of bytes.
    Sum,
    /// CRC-16-CCITT.
    CrcCcitt,
    /// CRC-16.
    Crc16,
    /// CRC-32.
    Crc32,
    /// Exclusive or of bytes.
    Xor,
}

impl ChecksumAlg {
    /// Parses an algorithm from a property value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "custom" => Some(Self::Custom),
            "sum" => Some(Self::Sum),
            "crc-ccitt" | "crc_ccitt" => Some(Self::CrcCcitt),
            "crc-16" | "crc_16" => Some(Self::Crc16),
            "crc-32" | "crc_32" => Some(Self::Crc32),
            "xor" => Some(Self::Xor),
            _ => None,
        }
    }
}

/// Role a custom layer plays in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayerSemantic {
    /// No predefined role.
    #[default]
    None,
    /// Acts as message id layer.
    Id,
    /// Acts as size layer.
    Size,
    /// Acts as checksum layer.
    Checksum,
}

impl LayerSemantic {
    /// Parses a role from a property value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "" | "none" => Some(Self::None),
            "id" => Some(Self::Id),
            "size" => Some(Self::Size),
            "checksum" => Some(Self::Checksum),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_type_limits() {
        assert_eq!(IntType::Uint8.max_value(1), 255);
        assert_eq!(IntType::Int8.min_value(1), -128);
        assert_eq!(IntType::Int16.max_value(2), 32767);
        assert_eq!(IntType::Uint64.max_value(8), u64::MAX as i128);
        assert_eq!(IntType::Int32.max_value(3), (1 << 23) - 1);
        assert_eq!(IntType::Uintvar.max_value(2), (1 << 14) - 1);
        assert!(IntType::Intvar.is_var_length());
    }

    #[test]
    fn test_parsing() {
        assert_eq!(Endian::parse("big"), Some(Endian::Big));
        assert_eq!(SemanticType::parse("messageId"), Some(SemanticType::MessageId));
        assert_eq!(OverrideType::parse("Extend"), Some(OverrideType::Extend));
        assert_eq!(ChecksumAlg::parse("crc_ccitt"), Some(ChecksumAlg::CrcCcitt));
        assert_eq!(Sender::parse("server"), Some(Sender::Server));
        assert!(IntType::from_name("uint128").is_none());
    }
}
