//! Field definitions.
//!
//! Every field is stored as a [`FieldData`] in the protocol arena: attributes
//! common to all kinds plus a kind specific [`FieldPayload`]. Composite kinds
//! refer to their members by [`FieldId`]; a [`Field`] handle turns those ids
//! back into handles.

use crate::alias::{Alias, AliasData};
use crate::arena::{Arena, FieldId, InterfaceId, LayerId, MessageId, NamespaceId, SchemaId};
use crate::common::{NOT_YET_DEPRECATED, parse_float_literal, parse_int_literal};
use crate::opt_cond::{CondData, OptCond};
use crate::types::{Endian, FloatType, IntType, OptionalMode, Overrides, SemanticType};
use std::fmt;

/// Kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKind {
    /// Integral value.
    Int,
    /// Enumeration.
    Enum,
    /// Bit set.
    Set,
    /// Floating point value.
    Float,
    /// Members packed into bits.
    Bitfield,
    /// Sequence of members.
    Bundle,
    /// Text.
    String,
    /// Raw bytes.
    Data,
    /// Repeated element.
    List,
    /// Alias of another field.
    Ref,
    /// Field that may be absent.
    Optional,
    /// One of several members.
    Variant,
}

impl FieldKind {
    /// All kinds in declaration order.
    pub const ALL: [FieldKind; 12] = [
        Self::Int,
        Self::Enum,
        Self::Set,
        Self::Float,
        Self::Bitfield,
        Self::Bundle,
        Self::String,
        Self::Data,
        Self::List,
        Self::Ref,
        Self::Optional,
        Self::Variant,
    ];

    /// Returns the schema element name of the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Enum => "enum",
            Self::Set => "set",
            Self::Float => "float",
            Self::Bitfield => "bitfield",
            Self::Bundle => "bundle",
            Self::String => "string",
            Self::Data => "data",
            Self::List => "list",
            Self::Ref => "ref",
            Self::Optional => "optional",
            Self::Variant => "variant",
        }
    }

    /// Parses a kind from a schema element name.
    #[must_use]
    pub fn from_element(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Owner of a field definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldParent {
    /// Not attached yet.
    #[default]
    None,
    /// Declared in a namespace.
    Namespace(NamespaceId),
    /// Member of a composite field.
    Field(FieldId),
    /// Message member.
    Message(MessageId),
    /// Interface member.
    Interface(InterfaceId),
    /// Field of a frame layer.
    Layer(LayerId),
}

/// Connection of a composite field to a related field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldLink {
    /// Field defined inline and owned by the composite.
    Member(FieldId),
    /// Field defined elsewhere and referenced by external reference.
    External(FieldId),
    /// Prefix stored in a sibling field (`$name`).
    Detached(String),
}

impl FieldLink {
    /// Returns the linked field, `None` for detached prefixes.
    #[must_use]
    pub fn field_id(&self) -> Option<FieldId> {
        match self {
            Self::Member(id) | Self::External(id) => Some(*id),
            Self::Detached(_) => None,
        }
    }

    /// Returns true if the linked field is owned by the composite.
    #[must_use]
    pub fn is_member(&self) -> bool {
        matches!(self, Self::Member(_))
    }
}

/// Value range tagged with the versions it applies to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidRange<T> {
    /// Lower bound, inclusive.
    pub min: T,
    /// Upper bound, inclusive.
    pub max: T,
    /// Version the range was introduced in.
    pub since_version: u32,
    /// Version the range was deprecated in.
    pub deprecated_since: u32,
}

/// Named special value.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialValue<T> {
    /// Name of the value.
    pub name: String,
    /// The value.
    pub value: T,
    /// Version the value was introduced in.
    pub since_version: u32,
    /// Version the value was deprecated in.
    pub deprecated_since: u32,
    /// Description.
    pub description: String,
    /// Name shown to users.
    pub display_name: String,
}

/// Integral field.
#[derive(Debug, Clone, PartialEq)]
pub struct IntField {
    /// Storage type.
    pub int_type: IntType,
    /// Byte order.
    pub endian: Endian,
    /// Serialisation length in bytes.
    pub length: usize,
    /// Length in bits when packed into a bitfield, 0 if not set.
    pub bit_length: usize,
    /// Offset added before serialisation.
    pub ser_offset: i128,
    /// Scaling ratio as numerator and denominator.
    pub scaling: (i128, i128),
    /// Units of the value.
    pub units: String,
    /// Default value.
    pub default_value: i128,
    /// Valid ranges.
    pub valid_ranges: Vec<ValidRange<i128>>,
    /// Special values in document order.
    pub specials: Vec<SpecialValue<i128>>,
    /// Validity check takes the version into account.
    pub valid_check_version: bool,
    /// Number of decimal digits shown.
    pub display_decimals: usize,
    /// Offset applied when showing the value.
    pub display_offset: i128,
    /// Sign extension of shorter lengths.
    pub sign_ext: bool,
    /// Several specials may share a value.
    pub non_unique_specials_allowed: bool,
}

/// Single enumeration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    /// Value name.
    pub name: String,
    /// Numeric value.
    pub value: i128,
    /// Version the value was introduced in.
    pub since_version: u32,
    /// Version the value was deprecated in.
    pub deprecated_since: u32,
    /// Description.
    pub description: String,
    /// Name shown to users.
    pub display_name: String,
}

/// Enumeration field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumField {
    /// Storage type.
    pub int_type: IntType,
    /// Byte order.
    pub endian: Endian,
    /// Serialisation length in bytes.
    pub length: usize,
    /// Length in bits when packed into a bitfield, 0 if not set.
    pub bit_length: usize,
    /// Default value.
    pub default_value: i128,
    /// Values in document order.
    pub values: Vec<EnumValue>,
    /// Values are shown in hexadecimal.
    pub hex_assign: bool,
    /// Several names may share a value.
    pub non_unique_allowed: bool,
    /// Validity check takes the version into account.
    pub valid_check_version: bool,
}

/// Single bit of a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetBit {
    /// Bit name.
    pub name: String,
    /// Bit index.
    pub idx: usize,
    /// Default value.
    pub default_value: bool,
    /// Bit is reserved.
    pub reserved: bool,
    /// Required value of a reserved bit.
    pub reserved_value: bool,
    /// Version the bit was introduced in.
    pub since_version: u32,
    /// Version the bit was deprecated in.
    pub deprecated_since: u32,
    /// Description.
    pub description: String,
    /// Name shown to users.
    pub display_name: String,
}

/// Bit set field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetField {
    /// Storage type.
    pub int_type: IntType,
    /// Byte order.
    pub endian: Endian,
    /// Serialisation length in bytes.
    pub length: usize,
    /// Length in bits when packed into a bitfield, 0 if not set.
    pub bit_length: usize,
    /// Default value of bits.
    pub default_bit_value: bool,
    /// Required value of unused bits.
    pub reserved_bit_value: bool,
    /// Named bits in document order.
    pub bits: Vec<SetBit>,
    /// Several names may share a bit.
    pub non_unique_allowed: bool,
    /// Validity check takes the version into account.
    pub valid_check_version: bool,
}

/// Floating point field.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatField {
    /// Storage type.
    pub float_type: FloatType,
    /// Byte order.
    pub endian: Endian,
    /// Default value.
    pub default_value: f64,
    /// Valid ranges.
    pub valid_ranges: Vec<ValidRange<f64>>,
    /// Special values in document order.
    pub specials: Vec<SpecialValue<f64>>,
    /// Validity check takes the version into account.
    pub valid_check_version: bool,
    /// Units of the value.
    pub units: String,
    /// Number of decimal digits shown.
    pub display_decimals: usize,
    /// Several specials may share a value.
    pub non_unique_specials_allowed: bool,
}

/// Bitfield field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitfieldField {
    /// Byte order.
    pub endian: Endian,
    /// Members, least significant first.
    pub members: Vec<FieldId>,
}

/// Bundle field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BundleField {
    /// Members in order.
    pub members: Vec<FieldId>,
    /// Member aliases.
    pub aliases: Vec<AliasData>,
}

/// String field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringField {
    /// Text encoding name.
    pub encoding: String,
    /// Fixed length, 0 if not fixed.
    pub length: usize,
    /// Value is terminated by a zero byte.
    pub zero_term_suffix: bool,
    /// Default value.
    pub default_value: String,
    /// Field holding the length.
    pub length_prefix: Option<FieldLink>,
}

/// Raw data field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataField {
    /// Fixed length, 0 if not fixed.
    pub length: usize,
    /// Default value.
    pub default_value: Vec<u8>,
    /// Field holding the length.
    pub length_prefix: Option<FieldLink>,
}

/// List field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListField {
    /// Element field.
    pub element: FieldLink,
    /// Fixed element count, 0 if not fixed.
    pub count: usize,
    /// Field holding the element count.
    pub count_prefix: Option<FieldLink>,
    /// Field holding the serialised length.
    pub length_prefix: Option<FieldLink>,
    /// Field holding the length of each element.
    pub elem_length_prefix: Option<FieldLink>,
    /// Element length prefix is written once for all elements.
    pub elem_fixed_length: bool,
    /// Field terminating the list.
    pub term_suffix: Option<FieldLink>,
}

/// Reference to another field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefField {
    /// Referenced field.
    pub target: FieldId,
    /// Length in bits when packed into a bitfield, 0 if not set.
    pub bit_length: usize,
}

/// Optional field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalField {
    /// Wrapped field.
    pub field: FieldLink,
    /// Initial mode.
    pub default_mode: OptionalMode,
    /// Existence condition.
    pub cond: Option<CondData>,
    /// Field is missing if reading it fails.
    pub missing_on_read_fail: bool,
    /// Field is missing if its value is invalid.
    pub missing_on_invalid: bool,
}

/// Variant field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariantField {
    /// Alternative members.
    pub members: Vec<FieldId>,
    /// Index of the member selected by default.
    pub default_member: Option<usize>,
}

/// Kind specific part of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPayload {
    /// Integral value.
    Int(IntField),
    /// Enumeration.
    Enum(EnumField),
    /// Bit set.
    Set(SetField),
    /// Floating point value.
    Float(FloatField),
    /// Members packed into bits.
    Bitfield(BitfieldField),
    /// Sequence of members.
    Bundle(BundleField),
    /// Text.
    String(StringField),
    /// Raw bytes.
    Data(DataField),
    /// Repeated element.
    List(ListField),
    /// Alias of another field.
    Ref(RefField),
    /// Field that may be absent.
    Optional(OptionalField),
    /// One of several members.
    Variant(VariantField),
}

impl FieldPayload {
    /// Returns the kind of the payload.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Int(_) => FieldKind::Int,
            Self::Enum(_) => FieldKind::Enum,
            Self::Set(_) => FieldKind::Set,
            Self::Float(_) => FieldKind::Float,
            Self::Bitfield(_) => FieldKind::Bitfield,
            Self::Bundle(_) => FieldKind::Bundle,
            Self::String(_) => FieldKind::String,
            Self::Data(_) => FieldKind::Data,
            Self::List(_) => FieldKind::List,
            Self::Ref(_) => FieldKind::Ref,
            Self::Optional(_) => FieldKind::Optional,
            Self::Variant(_) => FieldKind::Variant,
        }
    }

    /// Members addressable by name (`$bundle.member`).
    #[must_use]
    pub fn members(&self) -> &[FieldId] {
        match self {
            Self::Bitfield(b) => &b.members,
            Self::Bundle(b) => &b.members,
            Self::Variant(v) => &v.members,
            _ => &[],
        }
    }

    fn links(&self) -> Vec<&FieldLink> {
        match self {
            Self::String(s) => s.length_prefix.iter().collect(),
            Self::Data(d) => d.length_prefix.iter().collect(),
            Self::List(l) => std::iter::once(&l.element)
                .chain(l.count_prefix.iter())
                .chain(l.length_prefix.iter())
                .chain(l.elem_length_prefix.iter())
                .chain(l.term_suffix.iter())
                .collect(),
            Self::Optional(o) => vec![&o.field],
            _ => Vec::new(),
        }
    }

    fn links_mut(&mut self) -> Vec<&mut FieldLink> {
        match self {
            Self::String(s) => s.length_prefix.iter_mut().collect(),
            Self::Data(d) => d.length_prefix.iter_mut().collect(),
            Self::List(l) => std::iter::once(&mut l.element)
                .chain(l.count_prefix.iter_mut())
                .chain(l.length_prefix.iter_mut())
                .chain(l.elem_length_prefix.iter_mut())
                .chain(l.term_suffix.iter_mut())
                .collect(),
            Self::Optional(o) => vec![&mut o.field],
            _ => Vec::new(),
        }
    }

    /// Fields owned by this payload: members and inline linked fields.
    #[must_use]
    pub fn owned_fields(&self) -> Vec<FieldId> {
        let mut result = self.members().to_vec();
        result.extend(self.links().into_iter().filter_map(|l| match l {
            FieldLink::Member(id) => Some(*id),
            _ => None,
        }));
        result
    }

    /// Every field this payload structurally uses, owned or not.
    #[must_use]
    pub fn used_fields(&self) -> Vec<FieldId> {
        let mut result = self.members().to_vec();
        result.extend(self.links().into_iter().filter_map(FieldLink::field_id));
        if let Self::Ref(r) = self {
            result.push(r.target);
        }
        result
    }

    /// Names of sibling fields holding detached prefixes.
    #[must_use]
    pub fn detached_prefixes(&self) -> Vec<&str> {
        self.links()
            .into_iter()
            .filter_map(|l| match l {
                FieldLink::Detached(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    fn owned_slots_mut(&mut self) -> Vec<&mut FieldId> {
        match self {
            Self::Bitfield(b) => b.members.iter_mut().collect(),
            Self::Bundle(b) => b.members.iter_mut().collect(),
            Self::Variant(v) => v.members.iter_mut().collect(),
            other => other
                .links_mut()
                .into_iter()
                .filter_map(|l| match l {
                    FieldLink::Member(id) => Some(id),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Restricts every versioned value of the payload to `[since, deprecated)`.
    ///
    /// Valid ranges and special values left without any version are dropped.
    fn restrict_values(&mut self, since: u32, deprecated: u32) {
        let fit = |from: &mut u32, until: &mut u32| {
            *from = (*from).max(since);
            *until = (*until).min(deprecated).max(*from);
            *from < *until
        };
        match self {
            Self::Int(f) => {
                f.valid_ranges
                    .retain_mut(|r| fit(&mut r.since_version, &mut r.deprecated_since));
                f.specials
                    .retain_mut(|s| fit(&mut s.since_version, &mut s.deprecated_since));
            }
            Self::Float(f) => {
                f.valid_ranges
                    .retain_mut(|r| fit(&mut r.since_version, &mut r.deprecated_since));
                f.specials
                    .retain_mut(|s| fit(&mut s.since_version, &mut s.deprecated_since));
            }
            Self::Enum(f) => {
                for v in &mut f.values {
                    fit(&mut v.since_version, &mut v.deprecated_since);
                }
            }
            Self::Set(f) => {
                for b in &mut f.bits {
                    fit(&mut b.since_version, &mut b.deprecated_since);
                }
            }
            _ => {}
        }
    }
}

/// Attributes shared by all field kinds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldCommon {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub semantic_type: SemanticType,
    pub since_version: u32,
    pub deprecated_since: u32,
    pub removed: bool,
    pub external_ref: String,
    pub overrides: Overrides,
    pub pseudo: bool,
    pub fixed_value: bool,
    pub display_read_only: bool,
    pub display_hidden: bool,
    pub customizable: bool,
    pub fail_on_invalid: bool,
    pub force_gen: bool,
    pub copy_code_from: String,
    pub schema: Option<SchemaId>,
    pub parent: FieldParent,
    pub location: String,
}

impl Default for FieldCommon {
    fn default() -> Self {
        Self {
            name: String::new(),
            display_name: String::new(),
            description: String::new(),
            semantic_type: SemanticType::None,
            since_version: 0,
            deprecated_since: NOT_YET_DEPRECATED,
            removed: false,
            external_ref: String::new(),
            overrides: Overrides::default(),
            pseudo: false,
            fixed_value: false,
            display_read_only: false,
            display_hidden: false,
            customizable: false,
            fail_on_invalid: false,
            force_gen: false,
            copy_code_from: String::new(),
            schema: None,
            parent: FieldParent::None,
            location: String::new(),
        }
    }
}

/// Stored field definition.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldData {
    pub common: FieldCommon,
    pub payload: FieldPayload,
}

impl FieldData {
    pub fn kind(&self) -> FieldKind {
        self.payload.kind()
    }
}

/// Kind of a resolved field reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldRefType {
    /// Not resolved.
    #[default]
    Invalid,
    /// The field itself.
    Field,
    /// Named value inside the field (special, enum value, set bit).
    InnerValue,
    /// Serialised size of the field.
    Size,
    /// Existence of the field.
    Exists,
}

/// Result of a reference resolution over arena ids.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct RefInfo {
    pub field: Option<FieldId>,
    pub value_name: String,
    pub ref_type: FieldRefType,
}

impl RefInfo {
    fn field(id: FieldId) -> Self {
        Self {
            field: Some(id),
            value_name: String::new(),
            ref_type: FieldRefType::Field,
        }
    }

    fn inner(id: FieldId, name: &str) -> Self {
        Self {
            field: Some(id),
            value_name: name.to_string(),
            ref_type: FieldRefType::InnerValue,
        }
    }
}

fn split_first_segment(reference: &str) -> (&str, &str) {
    match reference.split_once('.') {
        Some((head, rest)) => (head, rest),
        None => (reference, ""),
    }
}

impl Arena {
    /// Follows `Ref` fields to the field finally referenced.
    pub fn strip_ref(&self, mut id: FieldId) -> FieldId {
        // Chains are acyclic since targets are defined before use.
        while let FieldPayload::Ref(r) = &self.field(id).payload {
            id = r.target;
        }
        id
    }

    /// Resolves a reference relative to a list of sibling fields.
    ///
    /// A leading `#` asks for the size of the field, a leading `?` for its
    /// existence.
    pub fn process_sibling_ref(&self, siblings: &[FieldId], reference: &str) -> RefInfo {
        let mode = reference.chars().next().filter(|c| *c == '#' || *c == '?');
        if let Some(mode) = mode {
            let mut info = self.process_sibling_ref(siblings, &reference[1..]);
            let Some(field) = info.field.filter(|_| info.ref_type == FieldRefType::Field) else {
                return RefInfo::default();
            };
            info.ref_type = if mode == '#' {
                FieldRefType::Size
            } else {
                FieldRefType::Exists
            };
            if !self.is_valid_ref_type(field, info.ref_type) {
                return RefInfo::default();
            }
            return info;
        }

        let (name, rest) = split_first_segment(reference);
        if name.is_empty() {
            return RefInfo::default();
        }

        siblings
            .iter()
            .copied()
            .find(|id| self.field(*id).common.name == name)
            .map(|id| self.process_inner_ref(id, rest))
            .unwrap_or_default()
    }

    /// Resolves a dotted reference inside the field.
    pub fn process_inner_ref(&self, id: FieldId, reference: &str) -> RefInfo {
        if reference.is_empty() {
            return RefInfo::field(id);
        }

        let data = self.field(id);
        let members = data.payload.members();
        if !members.is_empty() {
            return self.process_sibling_ref(members, reference);
        }

        match &data.payload {
            FieldPayload::Int(f) if f.specials.iter().any(|s| s.name == reference) => {
                RefInfo::inner(id, reference)
            }
            FieldPayload::Float(f) if f.specials.iter().any(|s| s.name == reference) => {
                RefInfo::inner(id, reference)
            }
            FieldPayload::Enum(f) if f.values.iter().any(|v| v.name == reference) => {
                RefInfo::inner(id, reference)
            }
            FieldPayload::Set(f) if f.bits.iter().any(|b| b.name == reference) => {
                RefInfo::inner(id, reference)
            }
            FieldPayload::Ref(r) => self.process_inner_ref(r.target, reference),
            FieldPayload::Optional(o) => {
                let (name, rest) = split_first_segment(reference);
                match o.field.field_id() {
                    Some(inner) if self.field(inner).common.name == name => {
                        self.process_inner_ref(inner, rest)
                    }
                    _ => RefInfo::default(),
                }
            }
            _ => RefInfo::default(),
        }
    }

    fn is_valid_ref_type(&self, id: FieldId, ref_type: FieldRefType) -> bool {
        let data = self.field(id);
        match ref_type {
            FieldRefType::Invalid => false,
            FieldRefType::Field => true,
            FieldRefType::Exists
                if data.common.since_version > 0
                    || data.common.deprecated_since < NOT_YET_DEPRECATED =>
            {
                true
            }
            FieldRefType::Exists => data.kind() == FieldKind::Optional,
            FieldRefType::Size => matches!(
                self.field(self.strip_ref(id)).kind(),
                FieldKind::String | FieldKind::Data | FieldKind::List
            ),
            FieldRefType::InnerValue => matches!(
                data.kind(),
                FieldKind::Int | FieldKind::Float | FieldKind::Enum | FieldKind::Set
            ),
        }
    }

    /// Resolves an external `Ns.Field.Inner` reference to a named inner value.
    fn resolve_inner_value(&self, schema: Option<SchemaId>, value: &str) -> Option<RefInfo> {
        let (field, rest) = self.find_field_with_inner(schema, value)?;
        let info = self.process_inner_ref(field, rest);
        (info.ref_type == FieldRefType::InnerValue).then_some(info)
    }

    /// Returns true if the field value can be compared to the literal.
    pub fn is_comparable_to_value(&self, id: FieldId, value: &str) -> bool {
        let data = self.field(self.strip_ref(id));
        let schema = data.common.schema;
        let external_numeric = || {
            self.resolve_inner_value(schema, value).is_some_and(|info| {
                info.field.is_some_and(|f| {
                    matches!(
                        self.field(f).kind(),
                        FieldKind::Int | FieldKind::Enum | FieldKind::Float
                    )
                })
            })
        };

        match &data.payload {
            FieldPayload::Int(f) => {
                parse_int_literal(value).is_some()
                    || f.specials.iter().any(|s| s.name == value)
                    || external_numeric()
            }
            FieldPayload::Float(f) => {
                parse_float_literal(value).is_some()
                    || f.specials.iter().any(|s| s.name == value)
                    || external_numeric()
            }
            FieldPayload::Enum(f) => {
                parse_int_literal(value).is_some()
                    || f.values.iter().any(|v| v.name == value)
                    || external_numeric()
            }
            FieldPayload::String(_) => true,
            FieldPayload::Optional(o) => o
                .field
                .field_id()
                .is_some_and(|inner| self.is_comparable_to_value(inner, value)),
            _ => false,
        }
    }

    fn comparison_class(&self, id: FieldId) -> Option<FieldKind> {
        let mut id = self.strip_ref(id);
        while let FieldPayload::Optional(o) = &self.field(id).payload {
            id = self.strip_ref(o.field.field_id()?);
        }

        match self.field(id).kind() {
            FieldKind::Int | FieldKind::Enum | FieldKind::Float => Some(FieldKind::Int),
            FieldKind::String => Some(FieldKind::String),
            FieldKind::Data => Some(FieldKind::Data),
            _ => None,
        }
    }

    /// Returns true if the values of two fields can be compared.
    pub fn is_comparable_to_field(&self, a: FieldId, b: FieldId) -> bool {
        match (self.comparison_class(a), self.comparison_class(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    fn link_min_length(&self, link: Option<&FieldLink>) -> usize {
        link.and_then(FieldLink::field_id)
            .map_or(0, |id| self.min_length(id))
    }

    /// Minimal serialisation length in bytes.
    pub fn min_length(&self, id: FieldId) -> usize {
        let data = self.field(id);
        match &data.payload {
            FieldPayload::Int(f) if f.int_type.is_var_length() => 1,
            FieldPayload::Int(f) => f.length,
            FieldPayload::Enum(f) if f.int_type.is_var_length() => 1,
            FieldPayload::Enum(f) => f.length,
            FieldPayload::Set(f) => f.length,
            FieldPayload::Float(f) => f.float_type.length(),
            FieldPayload::Bitfield(_) => self.max_length(id),
            FieldPayload::Bundle(b) => b
                .members
                .iter()
                .fold(0usize, |acc, m| acc.saturating_add(self.min_length(*m))),
            FieldPayload::String(s) if s.length > 0 => s.length,
            FieldPayload::String(s) => self
                .link_min_length(s.length_prefix.as_ref())
                .saturating_add(usize::from(s.zero_term_suffix)),
            FieldPayload::Data(d) if d.length > 0 => d.length,
            FieldPayload::Data(d) => self.link_min_length(d.length_prefix.as_ref()),
            FieldPayload::List(l) if l.count > 0 => {
                let elem = self.link_min_length(Some(&l.element));
                elem.saturating_mul(l.count)
            }
            FieldPayload::List(l) => self
                .link_min_length(l.count_prefix.as_ref())
                .saturating_add(self.link_min_length(l.length_prefix.as_ref()))
                .saturating_add(self.link_min_length(l.term_suffix.as_ref())),
            FieldPayload::Ref(r) => self.min_length(r.target),
            FieldPayload::Optional(_) => 0,
            FieldPayload::Variant(v) => v
                .members
                .iter()
                .map(|m| self.min_length(*m))
                .min()
                .unwrap_or(0),
        }
    }

    /// Maximal serialisation length in bytes, `usize::MAX` when unbounded.
    pub fn max_length(&self, id: FieldId) -> usize {
        let data = self.field(id);
        match &data.payload {
            FieldPayload::Int(f) => f.length,
            FieldPayload::Enum(f) => f.length,
            FieldPayload::Set(f) => f.length,
            FieldPayload::Float(f) => f.float_type.length(),
            FieldPayload::Bitfield(b) => {
                let bits = b
                    .members
                    .iter()
                    .fold(0usize, |acc, m| acc.saturating_add(self.bit_length(*m)));
                bits.div_ceil(8)
            }
            FieldPayload::Bundle(b) => b
                .members
                .iter()
                .fold(0usize, |acc, m| acc.saturating_add(self.max_length(*m))),
            FieldPayload::String(s) if s.length > 0 => s.length,
            FieldPayload::Data(d) if d.length > 0 => d.length,
            FieldPayload::String(_) | FieldPayload::Data(_) => usize::MAX,
            FieldPayload::List(l) if l.count > 0 => {
                let elem = l
                    .element
                    .field_id()
                    .map_or(0, |e| self.max_length(e))
                    .saturating_add(
                        l.elem_length_prefix
                            .as_ref()
                            .and_then(FieldLink::field_id)
                            .map_or(0, |p| self.max_length(p)),
                    );
                elem.saturating_mul(l.count)
            }
            FieldPayload::List(_) => usize::MAX,
            FieldPayload::Ref(r) => self.max_length(r.target),
            FieldPayload::Optional(o) => o.field.field_id().map_or(0, |f| self.max_length(f)),
            FieldPayload::Variant(v) => v
                .members
                .iter()
                .map(|m| self.max_length(*m))
                .max()
                .unwrap_or(0),
        }
    }

    /// Length in bits, explicit `bitLength` taking precedence.
    pub fn bit_length(&self, id: FieldId) -> usize {
        let data = self.field(id);
        let explicit = match &data.payload {
            FieldPayload::Int(f) => f.bit_length,
            FieldPayload::Enum(f) => f.bit_length,
            FieldPayload::Set(f) => f.bit_length,
            FieldPayload::Ref(r) if r.bit_length > 0 => r.bit_length,
            FieldPayload::Ref(r) => return self.bit_length(r.target),
            _ => 0,
        };

        if explicit > 0 {
            explicit
        } else {
            self.max_length(id).saturating_mul(8)
        }
    }

    /// Deep copies a field; owned members are copied as well.
    pub fn clone_field(&mut self, id: FieldId, parent: FieldParent) -> FieldId {
        let mut data = self.field(id).clone();
        data.common.parent = parent;
        data.common.external_ref.clear();
        let new_id = self.add_field(data);

        let mut payload = self.field(new_id).payload.clone();
        for slot in payload.owned_slots_mut() {
            *slot = self.clone_field(*slot, FieldParent::Field(new_id));
        }
        self.field_mut(new_id).payload = payload;
        new_id
    }

    /// Restricts the versions of a field, its values and its owned members to
    /// `[since, deprecated)`. Applied to copies placed inside a younger owner.
    pub(crate) fn restrict_versions(&mut self, id: FieldId, since: u32, deprecated: u32) {
        let data = self.field_mut(id);
        let common = &mut data.common;
        common.since_version = common.since_version.max(since);
        common.deprecated_since = common
            .deprecated_since
            .min(deprecated)
            .max(common.since_version);

        let (since, deprecated) = (common.since_version, common.deprecated_since);
        data.payload.restrict_values(since, deprecated);
        for member in data.payload.owned_fields() {
            self.restrict_versions(member, since, deprecated);
        }
    }
}

/// Resolved reference to a field or a named value inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRefInfo<'a> {
    /// Referenced field, `None` if the reference could not be resolved.
    pub field: Option<Field<'a>>,
    /// Name of the referenced inner value.
    pub value_name: String,
    /// Kind of reference.
    pub ref_type: FieldRefType,
}

/// Borrowed view of a field definition.
#[derive(Clone, Copy)]
pub struct Field<'a> {
    arena: &'a Arena,
    id: FieldId,
}

impl<'a> Field<'a> {
    pub(crate) fn new(arena: &'a Arena, id: FieldId) -> Self {
        Self { arena, id }
    }

    fn data(&self) -> &'a FieldData {
        self.arena.field(self.id)
    }

    fn common(&self) -> &'a FieldCommon {
        &self.data().common
    }

    /// Arena identifier of the field.
    #[must_use]
    pub fn id(&self) -> FieldId {
        self.id
    }

    /// Returns a handle to another field of the same protocol.
    #[must_use]
    pub fn field(&self, id: FieldId) -> Field<'a> {
        Field::new(self.arena, id)
    }

    /// Kind of the field.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.data().kind()
    }

    /// Kind specific attributes.
    #[must_use]
    pub fn payload(&self) -> &'a FieldPayload {
        &self.data().payload
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.common().name
    }

    /// Name shown to users, empty if not set.
    #[must_use]
    pub fn display_name(&self) -> &'a str {
        &self.common().display_name
    }

    /// Free text description.
    #[must_use]
    pub fn description(&self) -> &'a str {
        &self.common().description
    }

    /// Semantic meaning of the value.
    #[must_use]
    pub fn semantic_type(&self) -> SemanticType {
        self.common().semantic_type
    }

    /// Version the field was introduced in.
    #[must_use]
    pub fn since_version(&self) -> u32 {
        self.common().since_version
    }

    /// Version the field was deprecated in.
    #[must_use]
    pub fn deprecated_since(&self) -> u32 {
        self.common().deprecated_since
    }

    /// Field is removed from serialisation once deprecated.
    #[must_use]
    pub fn is_deprecated_removed(&self) -> bool {
        self.common().removed
    }

    /// Globally unique dotted path, empty for member fields.
    #[must_use]
    pub fn external_ref(&self) -> &'a str {
        &self.common().external_ref
    }

    /// Override policies for custom code.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        self.common().overrides
    }

    /// Field is not serialised.
    #[must_use]
    pub fn is_pseudo(&self) -> bool {
        self.common().pseudo
    }

    /// Value never changes after construction.
    #[must_use]
    pub fn is_fixed_value(&self) -> bool {
        self.common().fixed_value
    }

    /// Value is shown but not editable.
    #[must_use]
    pub fn is_display_read_only(&self) -> bool {
        self.common().display_read_only
    }

    /// Field is hidden from display.
    #[must_use]
    pub fn is_display_hidden(&self) -> bool {
        self.common().display_hidden
    }

    /// Generated code may be customised.
    #[must_use]
    pub fn is_customizable(&self) -> bool {
        self.common().customizable
    }

    /// Reading fails on an invalid value.
    #[must_use]
    pub fn is_fail_on_invalid(&self) -> bool {
        self.common().fail_on_invalid
    }

    /// Field is generated even when unused.
    #[must_use]
    pub fn is_force_gen(&self) -> bool {
        self.common().force_gen
    }

    /// External reference of the field custom code is copied from.
    #[must_use]
    pub fn copy_code_from(&self) -> &'a str {
        &self.common().copy_code_from
    }

    /// Document position of the definition.
    #[must_use]
    pub fn location(&self) -> &'a str {
        &self.common().location
    }

    /// Owner of the definition.
    #[must_use]
    pub fn parent(&self) -> FieldParent {
        self.common().parent
    }

    /// Schema the field was defined in.
    #[must_use]
    pub fn schema_id(&self) -> Option<SchemaId> {
        self.common().schema
    }

    /// Members addressable by name.
    #[must_use]
    pub fn members(&self) -> Vec<Field<'a>> {
        self.payload()
            .members()
            .iter()
            .map(|id| self.field(*id))
            .collect()
    }

    /// Fields owned by this field.
    #[must_use]
    pub fn owned_fields(&self) -> Vec<Field<'a>> {
        self.payload()
            .owned_fields()
            .into_iter()
            .map(|id| self.field(id))
            .collect()
    }

    /// Aliases of bundle members.
    #[must_use]
    pub fn aliases(&self) -> Vec<Alias<'a>> {
        match self.payload() {
            FieldPayload::Bundle(b) => b.aliases.iter().map(Alias::new).collect(),
            _ => Vec::new(),
        }
    }

    /// Condition of an optional field.
    #[must_use]
    pub fn cond(&self) -> OptCond<'a> {
        match self.payload() {
            FieldPayload::Optional(o) => OptCond::new(o.cond.as_ref()),
            _ => OptCond::default(),
        }
    }

    /// Target of a reference field.
    #[must_use]
    pub fn ref_target(&self) -> Option<Field<'a>> {
        match self.payload() {
            FieldPayload::Ref(r) => Some(self.field(r.target)),
            _ => None,
        }
    }

    /// Minimal serialisation length in bytes.
    #[must_use]
    pub fn min_length(&self) -> usize {
        self.arena.min_length(self.id)
    }

    /// Maximal serialisation length in bytes, `usize::MAX` when unbounded.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.arena.max_length(self.id)
    }

    /// Length in bits, explicit `bitLength` taking precedence.
    #[must_use]
    pub fn bit_length(&self) -> usize {
        self.arena.bit_length(self.id)
    }

    /// Resolves a dotted suffix against members or named values.
    #[must_use]
    pub fn process_inner_ref(&self, reference: &str) -> FieldRefInfo<'a> {
        self.wrap(self.arena.process_inner_ref(self.id, reference))
    }

    /// Resolves a `$sibling` style reference against a list of fields.
    #[must_use]
    pub fn process_sibling_ref(siblings: &[Field<'a>], reference: &str) -> FieldRefInfo<'a> {
        let Some(first) = siblings.first() else {
            return FieldRefInfo {
                field: None,
                value_name: String::new(),
                ref_type: FieldRefType::Invalid,
            };
        };
        let ids: Vec<FieldId> = siblings.iter().map(|f| f.id).collect();
        first.wrap(first.arena.process_sibling_ref(&ids, reference))
    }

    fn wrap(&self, info: RefInfo) -> FieldRefInfo<'a> {
        FieldRefInfo {
            field: info.field.map(|id| self.field(id)),
            value_name: info.value_name,
            ref_type: info.ref_type,
        }
    }

    /// Returns true if the field can be compared with `value` in a condition.
    #[must_use]
    pub fn is_comparable_to_value(&self, value: &str) -> bool {
        self.arena.is_comparable_to_value(self.id, value)
    }

    /// Returns true if the field can be compared with `other` in a condition.
    #[must_use]
    pub fn is_comparable_to_field(&self, other: &Field<'_>) -> bool {
        std::ptr::eq(self.arena, other.arena) && self.arena.is_comparable_to_field(self.id, other.id)
    }
}

impl PartialEq for Field<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.arena, other.arena) && self.id == other.id
    }
}

impl Eq for Field<'_> {}

impl fmt::Debug for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}
