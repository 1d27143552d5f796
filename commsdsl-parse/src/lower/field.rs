//! Lowering of field elements.

use super::{Interval, Lowerer};
use crate::alias::AliasData;
use crate::arena::{FieldId, InterfaceId};
use crate::common::{
    SIBLING_REF_PREFIX, is_valid_name, parse_float_literal, parse_hex_bytes, parse_int_literal,
    parse_range_literal, parse_u32,
};
use crate::error::ParseError;
use crate::field::{
    BitfieldField, BundleField, DataField, EnumField, EnumValue, FieldCommon, FieldData, FieldKind,
    FieldLink, FieldParent, FieldPayload, FloatField, IntField, ListField, OptionalField,
    RefField, SetBit, SetField, SpecialValue, StringField, ValidRange, VariantField,
};
use crate::opt_cond::{CondContext, CondData, CondList, CondListType};
use crate::props::{PropValue, Props};
use crate::types::{
    Endian, FloatType, IntType, OptionalMode, OverrideType, Overrides, SemanticType,
};
use crate::vocab::{ALIAS_PROPS, BIT_PROPS, MEMBERS_CONTAINER, SPECIAL_PROPS, field_props};
use crate::xml::XmlElement;
use std::cmp::Ordering;

const MAX_BITFIELD_BITS: usize = 64;

/// Element being lowered together with its collected properties.
struct FieldCtx<'p, 'x> {
    elem: &'x XmlElement,
    props: &'p Props<'x>,
    id: FieldId,
    own: Interval,
    reused: bool,
}

impl FieldCtx<'_, '_> {
    fn invalid(&self, prop: &str, value: &str) -> ParseError {
        ParseError::invalid_attr(&self.elem.name, prop, value)
    }

    fn missing(&self, prop: &str) -> ParseError {
        ParseError::missing_attr(&self.elem.name, prop)
    }

    fn children_named<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s XmlElement> + 's {
        self.props.children().iter().copied().filter(move |c| c.name == name)
    }

    fn inline_fields(&self) -> Vec<&XmlElement> {
        self.props
            .children()
            .iter()
            .copied()
            .filter(|c| FieldKind::from_element(&c.name).is_some())
            .collect()
    }
}

fn default_payload(kind: FieldKind, endian: Endian, placeholder: FieldId) -> FieldPayload {
    let placeholder_link = FieldLink::Detached(String::new());
    match kind {
        FieldKind::Int => FieldPayload::Int(IntField {
            int_type: IntType::Uint8,
            endian,
            length: 1,
            bit_length: 0,
            ser_offset: 0,
            scaling: (1, 1),
            units: String::new(),
            default_value: 0,
            valid_ranges: Vec::new(),
            specials: Vec::new(),
            valid_check_version: false,
            display_decimals: 0,
            display_offset: 0,
            sign_ext: true,
            non_unique_specials_allowed: false,
        }),
        FieldKind::Enum => FieldPayload::Enum(EnumField {
            int_type: IntType::Uint8,
            endian,
            length: 1,
            bit_length: 0,
            default_value: 0,
            values: Vec::new(),
            hex_assign: false,
            non_unique_allowed: false,
            valid_check_version: false,
        }),
        FieldKind::Set => FieldPayload::Set(SetField {
            int_type: IntType::Uint8,
            endian,
            length: 0,
            bit_length: 0,
            default_bit_value: false,
            reserved_bit_value: false,
            bits: Vec::new(),
            non_unique_allowed: false,
            valid_check_version: false,
        }),
        FieldKind::Float => FieldPayload::Float(FloatField {
            float_type: FloatType::Float,
            endian,
            default_value: 0.0,
            valid_ranges: Vec::new(),
            specials: Vec::new(),
            valid_check_version: false,
            units: String::new(),
            display_decimals: 0,
            non_unique_specials_allowed: false,
        }),
        FieldKind::Bitfield => FieldPayload::Bitfield(BitfieldField {
            endian,
            members: Vec::new(),
        }),
        FieldKind::Bundle => FieldPayload::Bundle(BundleField::default()),
        FieldKind::String => FieldPayload::String(StringField::default()),
        FieldKind::Data => FieldPayload::Data(DataField::default()),
        FieldKind::List => FieldPayload::List(ListField {
            element: placeholder_link,
            count: 0,
            count_prefix: None,
            length_prefix: None,
            elem_length_prefix: None,
            elem_fixed_length: false,
            term_suffix: None,
        }),
        FieldKind::Ref => FieldPayload::Ref(RefField {
            target: placeholder,
            bit_length: 0,
        }),
        FieldKind::Optional => FieldPayload::Optional(OptionalField {
            field: placeholder_link,
            default_mode: OptionalMode::Tentative,
            cond: None,
            missing_on_read_fail: false,
            missing_on_invalid: false,
        }),
        FieldKind::Variant => FieldPayload::Variant(VariantField::default()),
    }
}

fn parse_scaling(value: &str) -> Option<(i128, i128)> {
    let (num, den) = value.split_once('/')?;
    let num = parse_int_literal(num)?;
    let den = parse_int_literal(den)?;
    (den != 0).then_some((num, den))
}

fn set_type_for_length(length: usize) -> Option<IntType> {
    match length {
        1 => Some(IntType::Uint8),
        2 => Some(IntType::Uint16),
        3 | 4 => Some(IntType::Uint32),
        5..=8 => Some(IntType::Uint64),
        _ => None,
    }
}

fn float_bounds(float_type: FloatType) -> (f64, f64) {
    match float_type {
        FloatType::Float => (f64::from(f32::MIN), f64::from(f32::MAX)),
        FloatType::Double => (f64::MIN, f64::MAX),
    }
}

fn same_float(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

pub(super) fn apply_overrides(props: &Props<'_>, overrides: &mut Overrides) -> Result<(), ParseError> {
    let slots: [(&str, &mut OverrideType); 7] = [
        ("valueOverride", &mut overrides.value),
        ("readOverride", &mut overrides.read),
        ("writeOverride", &mut overrides.write),
        ("refreshOverride", &mut overrides.refresh),
        ("lengthOverride", &mut overrides.length),
        ("validOverride", &mut overrides.valid),
        ("nameOverride", &mut overrides.name),
    ];
    for (prop, slot) in slots {
        if let Some(value) = props.parse(prop, OverrideType::parse)? {
            *slot = value;
        }
    }
    Ok(())
}

/// Named value read from a `<special>`, `<validValue>` or `<bit>` child.
struct NamedItem<'x> {
    props: Props<'x>,
    name: &'x str,
    interval: Interval,
}

impl NamedItem<'_> {
    fn description(&self) -> String {
        self.props.get("description").unwrap_or_default().to_string()
    }

    fn display_name(&self) -> String {
        self.props.get("displayName").unwrap_or_default().to_string()
    }
}

impl Lowerer<'_> {
    /// Lowers a field element and everything it defines inline.
    pub(super) fn lower_field(
        &mut self,
        elem: &XmlElement,
        parent: FieldParent,
        bounds: Interval,
    ) -> Result<FieldId, ParseError> {
        self.lower_field_at(elem, parent, bounds)
            .map_err(|e| e.at(self.location(elem)))
    }

    fn lower_field_at(
        &mut self,
        elem: &XmlElement,
        parent: FieldParent,
        bounds: Interval,
    ) -> Result<FieldId, ParseError> {
        let kind = FieldKind::from_element(&elem.name)
            .ok_or_else(|| ParseError::unknown_element(&elem.name, "fields"))?;
        let props = self.props(elem, &field_props(kind))?;
        let name = props.required("name")?;
        if !is_valid_name(name) {
            return Err(ParseError::invalid_attr(&elem.name, "name", name));
        }

        let (id, reused) = match props.get("reuse") {
            Some(reference) => (self.reuse_field(&props, kind, reference, parent)?, true),
            None => {
                let endian = self.arena.schema(self.schema).endian;
                let placeholder = FieldId(self.arena.fields.len());
                let id = self.arena.add_field(FieldData {
                    common: FieldCommon::default(),
                    payload: default_payload(kind, endian, placeholder),
                });
                (id, false)
            }
        };

        let own = Interval::read(&props, bounds)?;
        self.check_versions(elem, name, own, bounds)?;
        let common = self.lower_common(elem, &props, id, parent, own)?;
        self.arena.field_mut(id).common = common;
        if reused {
            self.arena.restrict_versions(id, own.since, own.deprecated);
        }

        let ctx = FieldCtx {
            elem,
            props: &props,
            id,
            own,
            reused,
        };
        let mut payload = self.arena.field(id).payload.clone();
        match &mut payload {
            FieldPayload::Int(f) => self.lower_int(&ctx, f)?,
            FieldPayload::Enum(f) => self.lower_enum(&ctx, f)?,
            FieldPayload::Set(f) => self.lower_set(&ctx, f)?,
            FieldPayload::Float(f) => self.lower_float(&ctx, f)?,
            FieldPayload::Bitfield(f) => self.lower_bitfield(&ctx, f)?,
            FieldPayload::Bundle(f) => self.lower_bundle(&ctx, f)?,
            FieldPayload::String(f) => self.lower_string(&ctx, f)?,
            FieldPayload::Data(f) => self.lower_data(&ctx, f)?,
            FieldPayload::List(f) => self.lower_list(&ctx, f)?,
            FieldPayload::Ref(f) => self.lower_ref(&ctx, f)?,
            FieldPayload::Optional(f) => self.lower_optional(&ctx, f)?,
            FieldPayload::Variant(f) => self.lower_variant(&ctx, f)?,
        }
        self.arena.field_mut(id).payload = payload;

        self.check_semantic_type(id)?;
        Ok(id)
    }

    fn reuse_field(
        &mut self,
        props: &Props<'_>,
        kind: FieldKind,
        reference: &str,
        parent: FieldParent,
    ) -> Result<FieldId, ParseError> {
        let source = self
            .arena
            .find_field(Some(self.schema), reference)
            .ok_or_else(|| ParseError::unresolved("field", reference))?;
        let source_kind = self.arena.field(source).kind();
        if source_kind != kind {
            return Err(ParseError::validation(format!(
                "cannot reuse {source_kind} field '{reference}' as {kind}"
            )));
        }

        let id = self.arena.clone_field(source, parent);
        if props.bool_or("reuseCode", false)? {
            let source_ref = self.arena.field(source).common.external_ref.clone();
            self.arena.field_mut(id).common.copy_code_from = source_ref;
        }
        Ok(id)
    }

    fn lower_common(
        &self,
        elem: &XmlElement,
        props: &Props<'_>,
        id: FieldId,
        parent: FieldParent,
        own: Interval,
    ) -> Result<FieldCommon, ParseError> {
        let name = props.name();
        let mut common = self.arena.field(id).common.clone();
        common.name = name.to_string();
        common.parent = parent;
        common.schema = Some(self.schema);
        common.location = self.location(elem);
        common.external_ref = match parent {
            FieldParent::Namespace(ns) => self.arena.external_ref_in(ns, name),
            _ => String::new(),
        };

        if let Some(value) = props.get("displayName") {
            common.display_name = value.to_string();
        }
        if let Some(value) = props.get("description") {
            common.description = value.to_string();
        }

        common.since_version = own.since;
        common.deprecated_since = own.deprecated;
        common.removed = props.bool_or("removed", common.removed)?;
        self.check_removed(elem, name, common.removed, own);

        if let Some(semantic) = props.parse("semanticType", SemanticType::parse)? {
            common.semantic_type = semantic;
        }

        common.pseudo = props.bool_or("pseudo", common.pseudo)?;
        common.fixed_value = props.bool_or("fixedValue", common.fixed_value)?;
        common.display_read_only = props.bool_or("displayReadOnly", common.display_read_only)?;
        common.display_hidden = props.bool_or("displayHidden", common.display_hidden)?;
        common.customizable = props.bool_or("customizable", common.customizable)?;
        common.fail_on_invalid = props.bool_or("failOnInvalid", common.fail_on_invalid)?;
        common.force_gen = props.bool_or("forceGen", common.force_gen)?;
        apply_overrides(props, &mut common.overrides)?;

        if let Some(reference) = props.get("copyCodeFrom") {
            let source = self
                .arena
                .find_field(Some(self.schema), reference)
                .ok_or_else(|| ParseError::unresolved("field", reference))?;
            common.copy_code_from = self.arena.field(source).common.external_ref.clone();
        }
        Ok(common)
    }

    fn check_semantic_type(&self, id: FieldId) -> Result<(), ParseError> {
        let common = &self.arena.field(id).common;
        let target = self.arena.field(self.arena.strip_ref(id)).kind();
        let expected = match common.semantic_type {
            SemanticType::None => return Ok(()),
            SemanticType::Version | SemanticType::Length => FieldKind::Int,
            SemanticType::MessageId => FieldKind::Enum,
        };

        if target == expected {
            Ok(())
        } else {
            Err(ParseError::validation(format!(
                "semantic type of '{}' requires {expected} field, found {target}",
                common.name
            )))
        }
    }

    fn read_named_item<'x>(
        &self,
        child: &'x XmlElement,
        known: &[&str],
        owner: Interval,
    ) -> Result<NamedItem<'x>, ParseError> {
        let result = (|| {
            let props = self.props(child, known)?;
            let name = props.required("name")?;
            if !is_valid_name(name) {
                return Err(ParseError::invalid_attr(&child.name, "name", name));
            }
            let interval = Interval::read(&props, owner)?;
            self.check_versions(child, name, interval, owner)?;
            Ok(NamedItem {
                props,
                name,
                interval,
            })
        })();
        result.map_err(|e| e.at(self.location(child)))
    }

    /// Interval of a repeatable property item, read from its own element.
    fn item_interval(
        &self,
        item: &PropValue<'_>,
        owner: Interval,
        name: &str,
    ) -> Result<Interval, ParseError> {
        let Some(elem) = item.elem else {
            return Ok(owner);
        };

        let read = |attr: &str, default: u32| -> Result<u32, ParseError> {
            match elem.attr(attr) {
                Some(value) => {
                    parse_u32(value).ok_or_else(|| ParseError::invalid_attr(&elem.name, attr, value))
                }
                None => Ok(default),
            }
        };

        let interval = Interval {
            since: read("sinceVersion", owner.since)?,
            deprecated: read("deprecated", owner.deprecated)?,
        };
        self.check_versions(elem, name, interval, owner)
            .map_err(|e| e.at(self.location(elem)))?;
        Ok(interval)
    }

    fn lower_int(&mut self, ctx: &FieldCtx<'_, '_>, f: &mut IntField) -> Result<(), ParseError> {
        let props = ctx.props;
        match props.parse("type", IntType::from_name)? {
            Some(int_type) => {
                f.int_type = int_type;
                f.length = int_type.max_length();
            }
            None if !ctx.reused => return Err(ctx.missing("type")),
            None => {}
        }

        if let Some(endian) = props.parse("endian", Endian::parse)? {
            f.endian = endian;
        }

        if let Some(length) = props.usize_opt("length")? {
            if length == 0 || length > f.int_type.max_length() {
                return Err(ctx.invalid("length", &length.to_string()));
            }
            f.length = length;
        }

        if let Some(bits) = props.usize_opt("bitLength")? {
            if bits == 0 || bits > f.length * 8 {
                return Err(ctx.invalid("bitLength", &bits.to_string()));
            }
            f.bit_length = bits;
        }

        if let Some(offset) = props.int_opt("serOffset")? {
            f.ser_offset = offset;
        }
        if let Some(scaling) = props.parse("scaling", parse_scaling)? {
            f.scaling = scaling;
        }
        if let Some(units) = props.get("units") {
            f.units = units.to_string();
        }
        if let Some(decimals) = props.usize_opt("displayDecimals")? {
            f.display_decimals = decimals;
        }
        if let Some(offset) = props.int_opt("displayOffset")? {
            f.display_offset = offset;
        }
        f.sign_ext = props.bool_or("signExt", f.sign_ext)?;
        f.valid_check_version = props.bool_or("validCheckVersion", f.valid_check_version)?;
        f.non_unique_specials_allowed =
            props.bool_or("nonUniqueSpecialsAllowed", f.non_unique_specials_allowed)?;

        let type_min = f.int_type.min_value(f.int_type.max_length());
        let type_max = f.int_type.max_value(f.int_type.max_length());
        let ser_min = f.int_type.min_value(f.length);
        let ser_max = f.int_type.max_value(f.length);

        for child in ctx.children_named("special") {
            let item = self.read_named_item(child, SPECIAL_PROPS, ctx.own)?;
            let raw = item.props.required("val").map_err(|e| e.at(self.location(child)))?;
            let value = parse_int_literal(raw).ok_or_else(|| {
                ParseError::invalid_attr("special", "val", raw).at(self.location(child))
            })?;

            if f.specials.iter().any(|s| s.name == item.name) {
                return Err(ParseError::duplicate("special", item.name).at(self.location(child)));
            }
            if !f.non_unique_specials_allowed {
                if let Some(other) = f.specials.iter().find(|s| s.value == value) {
                    return Err(ParseError::validation(format!(
                        "value of special '{}' ({raw}) is already defined as '{}'",
                        item.name, other.name
                    ))
                    .at(self.location(child)));
                }
            }
            if value < type_min || value > type_max {
                return Err(ParseError::validation(format!(
                    "special value '{}' is outside the range of the type",
                    item.name
                ))
                .at(self.location(child)));
            }
            let serialised = value.saturating_add(f.ser_offset);
            if serialised < ser_min || serialised > ser_max {
                self.warn(
                    child,
                    &format!(
                        "special value '{}' is outside the range of correctly serialisable values",
                        item.name
                    ),
                );
            }

            f.specials.push(SpecialValue {
                name: item.name.to_string(),
                value,
                since_version: item.interval.since,
                deprecated_since: item.interval.deprecated,
                description: item.description(),
                display_name: item.display_name(),
            });
        }

        let int_value = |f: &IntField, prop: &str, raw: &str| -> Result<i128, ParseError> {
            parse_int_literal(raw)
                .or_else(|| f.specials.iter().find(|s| s.name == raw).map(|s| s.value))
                .ok_or_else(|| ctx.invalid(prop, raw))
        };

        if let Some(raw) = props.get("defaultValue") {
            let value = int_value(f, "defaultValue", raw)?;
            if value < type_min || value > type_max {
                return Err(ParseError::validation(format!(
                    "default value of '{}' is not within type boundaries ({raw})",
                    props.name()
                )));
            }
            let serialised = value.saturating_add(f.ser_offset);
            if serialised < ser_min || serialised > ser_max {
                self.warn(
                    ctx.elem,
                    &format!("default value ({raw}) will not be serialised correctly"),
                );
            }
            f.default_value = value;
        }

        for prop in ["validRange", "validValue", "validMin", "validMax"] {
            for item in props.get_all(prop) {
                let interval = self.item_interval(&item, ctx.own, props.name())?;
                let (min, max) = match prop {
                    "validRange" => {
                        let (lo, hi) = parse_range_literal(item.value)
                            .ok_or_else(|| ctx.invalid(prop, item.value))?;
                        (int_value(f, prop, lo)?, int_value(f, prop, hi)?)
                    }
                    "validValue" => {
                        let v = int_value(f, prop, item.value)?;
                        (v, v)
                    }
                    "validMin" => (int_value(f, prop, item.value)?, type_max),
                    _ => (type_min, int_value(f, prop, item.value)?),
                };

                if min > max {
                    return Err(ctx.invalid(prop, item.value));
                }
                if min < type_min || max > type_max {
                    self.warn(
                        item.elem.unwrap_or(ctx.elem),
                        &format!("{prop} ({}) exceeds the boundaries of the type", item.value),
                    );
                }

                f.valid_ranges.push(ValidRange {
                    min,
                    max,
                    since_version: interval.since,
                    deprecated_since: interval.deprecated,
                });
            }
        }
        merge_valid_ranges(&mut f.valid_ranges, i128::cmp, |prev, next| {
            prev.max.saturating_add(1) >= next.min
        });
        Ok(())
    }

    fn lower_enum(&mut self, ctx: &FieldCtx<'_, '_>, f: &mut EnumField) -> Result<(), ParseError> {
        let props = ctx.props;
        match props.parse("type", IntType::from_name)? {
            Some(int_type) => {
                f.int_type = int_type;
                f.length = int_type.max_length();
            }
            None if !ctx.reused => return Err(ctx.missing("type")),
            None => {}
        }

        if let Some(endian) = props.parse("endian", Endian::parse)? {
            f.endian = endian;
        }
        if let Some(length) = props.usize_opt("length")? {
            if length == 0 || length > f.int_type.max_length() {
                return Err(ctx.invalid("length", &length.to_string()));
            }
            f.length = length;
        }
        if let Some(bits) = props.usize_opt("bitLength")? {
            if bits == 0 || bits > f.length * 8 {
                return Err(ctx.invalid("bitLength", &bits.to_string()));
            }
            f.bit_length = bits;
        }
        f.hex_assign = props.bool_or("hexAssign", f.hex_assign)?;
        f.non_unique_allowed = props.bool_or("nonUniqueAllowed", f.non_unique_allowed)?;
        f.valid_check_version = props.bool_or("validCheckVersion", f.valid_check_version)?;

        let min = f.int_type.min_value(f.length);
        let max = f.int_type.max_value(f.length);
        for child in ctx.children_named("validValue") {
            let item = self.read_named_item(child, SPECIAL_PROPS, ctx.own)?;
            let raw = item.props.required("val").map_err(|e| e.at(self.location(child)))?;
            let value = parse_int_literal(raw).ok_or_else(|| {
                ParseError::invalid_attr("validValue", "val", raw).at(self.location(child))
            })?;

            if f.values.iter().any(|v| v.name == item.name) {
                return Err(ParseError::duplicate("enum value", item.name).at(self.location(child)));
            }
            if !f.non_unique_allowed {
                if let Some(other) = f.values.iter().find(|v| v.value == value) {
                    return Err(ParseError::validation(format!(
                        "value of '{}' ({raw}) is already defined as '{}'",
                        item.name, other.name
                    ))
                    .at(self.location(child)));
                }
            }
            if value < min || value > max {
                return Err(ParseError::validation(format!(
                    "enum value '{}' ({raw}) does not fit the type",
                    item.name
                ))
                .at(self.location(child)));
            }

            f.values.push(EnumValue {
                name: item.name.to_string(),
                value,
                since_version: item.interval.since,
                deprecated_since: item.interval.deprecated,
                description: item.description(),
                display_name: item.display_name(),
            });
        }

        if f.values.is_empty() {
            return Err(ParseError::validation(format!(
                "enum '{}' must define at least one value",
                props.name()
            )));
        }

        if let Some(raw) = props.get("defaultValue") {
            f.default_value = parse_int_literal(raw)
                .or_else(|| f.values.iter().find(|v| v.name == raw).map(|v| v.value))
                .ok_or_else(|| ctx.invalid("defaultValue", raw))?;
        }
        Ok(())
    }

    fn lower_set(&mut self, ctx: &FieldCtx<'_, '_>, f: &mut SetField) -> Result<(), ParseError> {
        let props = ctx.props;
        let int_type = props.parse("type", IntType::from_name)?;
        if let Some(t) = int_type {
            if t.is_var_length() {
                return Err(ctx.invalid("type", t.name()));
            }
            f.int_type = t;
            f.length = t.max_length();
        }

        match props.usize_opt("length")? {
            Some(length) => {
                let derived = set_type_for_length(length)
                    .ok_or_else(|| ctx.invalid("length", &length.to_string()))?;
                if int_type.is_some_and(|t| length > t.max_length()) {
                    return Err(ctx.invalid("length", &length.to_string()));
                }
                if int_type.is_none() {
                    f.int_type = derived;
                }
                f.length = length;
            }
            None if int_type.is_none() && !ctx.reused => return Err(ctx.missing("length")),
            None => {}
        }

        if let Some(endian) = props.parse("endian", Endian::parse)? {
            f.endian = endian;
        }
        if let Some(bits) = props.usize_opt("bitLength")? {
            if bits == 0 || bits > f.length * 8 {
                return Err(ctx.invalid("bitLength", &bits.to_string()));
            }
            f.bit_length = bits;
        }
        f.default_bit_value = props.bool_or("defaultValue", f.default_bit_value)?;
        f.reserved_bit_value = props.bool_or("reservedValue", f.reserved_bit_value)?;
        f.non_unique_allowed = props.bool_or("nonUniqueAllowed", f.non_unique_allowed)?;
        f.valid_check_version = props.bool_or("validCheckVersion", f.valid_check_version)?;

        let capacity = if f.bit_length > 0 {
            f.bit_length
        } else {
            f.length * 8
        };
        for child in ctx.children_named("bit") {
            let item = self.read_named_item(child, BIT_PROPS, ctx.own)?;
            let at = |e: ParseError| e.at(self.location(child));
            let raw = item.props.required("idx").map_err(at)?;
            let idx = crate::common::parse_usize(raw)
                .filter(|idx| *idx < capacity)
                .ok_or_else(|| at(ParseError::invalid_attr("bit", "idx", raw)))?;

            if f.bits.iter().any(|b| b.name == item.name) {
                return Err(at(ParseError::duplicate("bit", item.name)));
            }
            if !f.non_unique_allowed && f.bits.iter().any(|b| b.idx == idx) {
                return Err(at(ParseError::validation(format!(
                    "bit index {idx} of '{}' is used more than once",
                    item.name
                ))));
            }

            f.bits.push(SetBit {
                name: item.name.to_string(),
                idx,
                default_value: item.props.bool_or("defaultValue", f.default_bit_value).map_err(at)?,
                reserved: item.props.bool_or("reserved", false).map_err(at)?,
                reserved_value: item
                    .props
                    .bool_or("reservedValue", f.reserved_bit_value)
                    .map_err(at)?,
                since_version: item.interval.since,
                deprecated_since: item.interval.deprecated,
                description: item.description(),
                display_name: item.display_name(),
            });
        }
        Ok(())
    }

    fn lower_float(&mut self, ctx: &FieldCtx<'_, '_>, f: &mut FloatField) -> Result<(), ParseError> {
        let props = ctx.props;
        match props.parse("type", FloatType::from_name)? {
            Some(float_type) => f.float_type = float_type,
            None if !ctx.reused => return Err(ctx.missing("type")),
            None => {}
        }
        if let Some(endian) = props.parse("endian", Endian::parse)? {
            f.endian = endian;
        }
        if let Some(units) = props.get("units") {
            f.units = units.to_string();
        }
        if let Some(decimals) = props.usize_opt("displayDecimals")? {
            f.display_decimals = decimals;
        }
        f.valid_check_version = props.bool_or("validCheckVersion", f.valid_check_version)?;
        f.non_unique_specials_allowed =
            props.bool_or("nonUniqueSpecialsAllowed", f.non_unique_specials_allowed)?;

        for child in ctx.children_named("special") {
            let item = self.read_named_item(child, SPECIAL_PROPS, ctx.own)?;
            let at = |e: ParseError| e.at(self.location(child));
            let raw = item.props.required("val").map_err(at)?;
            let value = parse_float_literal(raw)
                .ok_or_else(|| at(ParseError::invalid_attr("special", "val", raw)))?;

            if f.specials.iter().any(|s| s.name == item.name) {
                return Err(at(ParseError::duplicate("special", item.name)));
            }
            if !f.non_unique_specials_allowed {
                if let Some(other) = f.specials.iter().find(|s| same_float(s.value, value)) {
                    return Err(at(ParseError::validation(format!(
                        "value of special '{}' ({raw}) is already defined as '{}'",
                        item.name, other.name
                    ))));
                }
            }

            f.specials.push(SpecialValue {
                name: item.name.to_string(),
                value,
                since_version: item.interval.since,
                deprecated_since: item.interval.deprecated,
                description: item.description(),
                display_name: item.display_name(),
            });
        }

        let float_value = |f: &FloatField, prop: &str, raw: &str| -> Result<f64, ParseError> {
            parse_float_literal(raw)
                .or_else(|| f.specials.iter().find(|s| s.name == raw).map(|s| s.value))
                .ok_or_else(|| ctx.invalid(prop, raw))
        };

        if let Some(raw) = props.get("defaultValue") {
            f.default_value = float_value(f, "defaultValue", raw)?;
        }

        let (type_min, type_max) = float_bounds(f.float_type);
        if props.bool_or("validFullRange", false)? {
            f.valid_ranges.push(ValidRange {
                min: type_min,
                max: type_max,
                since_version: ctx.own.since,
                deprecated_since: ctx.own.deprecated,
            });
        }

        for prop in ["validRange", "validValue", "validMin", "validMax"] {
            for item in props.get_all(prop) {
                let interval = self.item_interval(&item, ctx.own, props.name())?;
                let (min, max) = match prop {
                    "validRange" => {
                        let (lo, hi) = parse_range_literal(item.value)
                            .ok_or_else(|| ctx.invalid(prop, item.value))?;
                        (float_value(f, prop, lo)?, float_value(f, prop, hi)?)
                    }
                    "validValue" => {
                        let v = float_value(f, prop, item.value)?;
                        (v, v)
                    }
                    "validMin" => (float_value(f, prop, item.value)?, type_max),
                    _ => (type_min, float_value(f, prop, item.value)?),
                };

                if min > max {
                    return Err(ctx.invalid(prop, item.value));
                }

                f.valid_ranges.push(ValidRange {
                    min,
                    max,
                    since_version: interval.since,
                    deprecated_since: interval.deprecated,
                });
            }
        }
        merge_valid_ranges(&mut f.valid_ranges, f64::total_cmp, |prev, next| {
            prev.max.is_finite() && next.min.is_finite() && prev.max >= next.min
        });
        Ok(())
    }

    /// Lowers member fields declared inline, in `<members>` or in `<replace>`.
    fn lower_members(
        &mut self,
        ctx: &FieldCtx<'_, '_>,
        members: &mut Vec<FieldId>,
    ) -> Result<(), ParseError> {
        let parent = FieldParent::Field(ctx.id);
        for child in ctx.props.children() {
            if FieldKind::from_element(&child.name).is_some() {
                members.push(self.lower_field(child, parent, ctx.own)?);
                continue;
            }

            match child.name.as_str() {
                MEMBERS_CONTAINER => {
                    for m in self.container_items(child) {
                        members.push(self.lower_field(m, parent, ctx.own)?);
                    }
                }
                "replace" => {
                    for m in self.container_items(child) {
                        let replacement = self.lower_field(m, parent, ctx.own)?;
                        let name = self.arena.field(replacement).common.name.clone();
                        let slot = members
                            .iter_mut()
                            .find(|id| self.arena.field(**id).common.name == name)
                            .ok_or_else(|| {
                                ParseError::unresolved("replaced member", name.as_str())
                                    .at(self.location(m))
                            })?;
                        *slot = replacement;
                    }
                }
                _ => {}
            }
        }

        for (idx, id) in members.iter().enumerate() {
            let name = &self.arena.field(*id).common.name;
            if members[..idx]
                .iter()
                .any(|other| self.arena.field(*other).common.name == *name)
            {
                return Err(ParseError::duplicate("member field", name.as_str()));
            }
        }
        Ok(())
    }

    /// Checks conditions and detached prefixes of a member list.
    pub(super) fn verify_members(
        &self,
        members: &[FieldId],
        interfaces: &[InterfaceId],
    ) -> Result<(), ParseError> {
        for (idx, id) in members.iter().enumerate() {
            let data = self.arena.field(*id);
            let at = |e: ParseError| e.at(data.common.location.clone());

            for prefix in data.payload.detached_prefixes() {
                let found = members[..idx]
                    .iter()
                    .any(|m| self.arena.field(*m).common.name == prefix);
                if !found {
                    return Err(at(ParseError::unresolved("sibling prefix field", prefix)));
                }
            }

            if let FieldPayload::Optional(o) = &data.payload {
                if let Some(cond) = &o.cond {
                    let ctx = CondContext {
                        arena: &*self.arena,
                        siblings: members,
                        interfaces,
                    };
                    cond.verify(&ctx).map_err(at)?;
                }
            }
        }
        Ok(())
    }

    fn lower_bitfield(
        &mut self,
        ctx: &FieldCtx<'_, '_>,
        f: &mut BitfieldField,
    ) -> Result<(), ParseError> {
        if let Some(endian) = ctx.props.parse("endian", Endian::parse)? {
            f.endian = endian;
        }
        self.lower_members(ctx, &mut f.members)?;
        if f.members.is_empty() {
            return Err(ParseError::validation(format!(
                "bitfield '{}' must have members",
                ctx.props.name()
            )));
        }

        let mut total = 0usize;
        for member in &f.members {
            let target = self.arena.field(self.arena.strip_ref(*member));
            if !matches!(target.kind(), FieldKind::Int | FieldKind::Enum | FieldKind::Set) {
                return Err(ParseError::validation(format!(
                    "bitfield member '{}' must be int, enum or set",
                    self.arena.field(*member).common.name
                )));
            }
            total = total.saturating_add(self.arena.bit_length(*member));
        }

        if total > MAX_BITFIELD_BITS || total % 8 != 0 {
            return Err(ParseError::validation(format!(
                "total length of bitfield '{}' members ({total} bits) must be a multiple of 8 not greater than {MAX_BITFIELD_BITS}",
                ctx.props.name()
            )));
        }
        Ok(())
    }

    fn lower_bundle(&mut self, ctx: &FieldCtx<'_, '_>, f: &mut BundleField) -> Result<(), ParseError> {
        if ctx.reused && !ctx.props.bool_or("reuseAliases", true)? {
            f.aliases.clear();
        }
        self.lower_members(ctx, &mut f.members)?;
        if f.members.is_empty() {
            return Err(ParseError::validation(format!(
                "bundle '{}' must have members",
                ctx.props.name()
            )));
        }
        self.lower_aliases(ctx.props.children(), &f.members, &mut f.aliases)?;
        let interfaces = self.arena.all_interfaces(self.schema);
        self.verify_members(&f.members, &interfaces)
    }

    /// Lowers `<alias>` children against the owner's member list.
    pub(super) fn lower_aliases(
        &self,
        children: &[&XmlElement],
        members: &[FieldId],
        aliases: &mut Vec<AliasData>,
    ) -> Result<(), ParseError> {
        for child in children.iter().filter(|c| c.name == "alias") {
            let result = (|| {
                let props = self.props(child, ALIAS_PROPS)?;
                let name = props.required("name")?;
                if !is_valid_name(name) {
                    return Err(ParseError::invalid_attr("alias", "name", name));
                }

                let target = props.required("field")?;
                let field_name = target.strip_prefix(SIBLING_REF_PREFIX).unwrap_or(target);
                if self.arena.process_sibling_ref(members, field_name).field.is_none() {
                    return Err(ParseError::unresolved("alias field", target));
                }

                let clash = aliases.iter().any(|a| a.name == name)
                    || members
                        .iter()
                        .any(|m| self.arena.field(*m).common.name == name);
                if clash {
                    return Err(ParseError::duplicate("alias", name));
                }

                Ok(AliasData {
                    name: name.to_string(),
                    description: props.get("description").unwrap_or_default().to_string(),
                    field_name: field_name.to_string(),
                })
            })();
            aliases.push(result.map_err(|e| e.at(self.location(child)))?);
        }
        Ok(())
    }

    /// Lowers a property holding a field: inline child, `$sibling` or external reference.
    fn lower_link(
        &mut self,
        ctx: &FieldCtx<'_, '_>,
        prop: &str,
        detached_allowed: bool,
    ) -> Result<Option<FieldLink>, ParseError> {
        if let Some(complex) = ctx.props.complex(prop) {
            let items = self.container_items(complex);
            let [single] = items.as_slice() else {
                return Err(ParseError::structure(format!(
                    "property '{prop}' must contain a single field definition"
                )));
            };
            let id = self.lower_field(single, FieldParent::Field(ctx.id), ctx.own)?;
            return Ok(Some(FieldLink::Member(id)));
        }

        let Some(value) = ctx.props.get(prop) else {
            return Ok(None);
        };

        if let Some(sibling) = value.strip_prefix(SIBLING_REF_PREFIX) {
            if !detached_allowed || !is_valid_name(sibling) {
                return Err(ctx.invalid(prop, value));
            }
            return Ok(Some(FieldLink::Detached(sibling.to_string())));
        }

        let target = self
            .arena
            .find_field(Some(self.schema), value)
            .ok_or_else(|| ParseError::unresolved("field", value))?;
        Ok(Some(FieldLink::External(target)))
    }

    /// Lowers the wrapped field given by property or by a single inline child.
    fn lower_wrapped(
        &mut self,
        ctx: &FieldCtx<'_, '_>,
        prop: &str,
    ) -> Result<Option<FieldLink>, ParseError> {
        let inline = ctx.inline_fields();
        let linked = self.lower_link(ctx, prop, false)?;
        match (linked, inline.as_slice()) {
            (Some(link), []) => Ok(Some(link)),
            (None, []) => Ok(None),
            (None, [single]) => {
                let id = self.lower_field(single, FieldParent::Field(ctx.id), ctx.own)?;
                Ok(Some(FieldLink::Member(id)))
            }
            _ => Err(ParseError::structure(format!(
                "'{}' defines more than one '{prop}'",
                ctx.props.name()
            ))),
        }
    }

    fn lower_string(&mut self, ctx: &FieldCtx<'_, '_>, f: &mut StringField) -> Result<(), ParseError> {
        let props = ctx.props;
        if let Some(encoding) = props.get("encoding") {
            f.encoding = encoding.to_string();
        }
        if let Some(length) = props.usize_opt("length")? {
            f.length = length;
        }
        f.zero_term_suffix = props.bool_or("zeroTermSuffix", f.zero_term_suffix)?;
        if let Some(value) = props.get("defaultValue") {
            f.default_value = value.to_string();
        }
        if let Some(prefix) = self.lower_link(ctx, "lengthPrefix", true)? {
            f.length_prefix = Some(prefix);
        }

        let modes = usize::from(f.length > 0)
            + usize::from(f.length_prefix.is_some())
            + usize::from(f.zero_term_suffix);
        if modes > 1 {
            return Err(ParseError::validation(format!(
                "string '{}' may use only one of length, lengthPrefix and zeroTermSuffix",
                props.name()
            )));
        }
        if f.length > 0 && f.default_value.len() > f.length {
            return Err(ctx.invalid("defaultValue", &f.default_value));
        }
        Ok(())
    }

    fn lower_data(&mut self, ctx: &FieldCtx<'_, '_>, f: &mut DataField) -> Result<(), ParseError> {
        let props = ctx.props;
        if let Some(length) = props.usize_opt("length")? {
            f.length = length;
        }
        if let Some(value) = props.parse("defaultValue", parse_hex_bytes)? {
            f.default_value = value;
        }
        if let Some(prefix) = self.lower_link(ctx, "lengthPrefix", true)? {
            f.length_prefix = Some(prefix);
        }

        if f.length > 0 && f.length_prefix.is_some() {
            return Err(ParseError::validation(format!(
                "data '{}' may not use both length and lengthPrefix",
                props.name()
            )));
        }
        if f.length > 0 && f.default_value.len() > f.length {
            return Err(ctx.invalid("defaultValue", props.get("defaultValue").unwrap_or_default()));
        }
        Ok(())
    }

    fn lower_list(&mut self, ctx: &FieldCtx<'_, '_>, f: &mut ListField) -> Result<(), ParseError> {
        let props = ctx.props;
        match self.lower_wrapped(ctx, "element")? {
            Some(element) => f.element = element,
            None if !ctx.reused => return Err(ctx.missing("element")),
            None => {}
        }

        if let Some(count) = props.usize_opt("count")? {
            f.count = count;
        }
        if let Some(prefix) = self.lower_link(ctx, "countPrefix", true)? {
            f.count_prefix = Some(prefix);
        }
        if let Some(prefix) = self.lower_link(ctx, "lengthPrefix", true)? {
            f.length_prefix = Some(prefix);
        }
        if let Some(suffix) = self.lower_link(ctx, "termSuffix", false)? {
            f.term_suffix = Some(suffix);
        }
        if let Some(prefix) = self.lower_link(ctx, "elemLengthPrefix", true)? {
            f.elem_length_prefix = Some(prefix);
        }
        f.elem_fixed_length = props.bool_or("elemFixedLength", f.elem_fixed_length)?;

        let modes = usize::from(f.count > 0)
            + usize::from(f.count_prefix.is_some())
            + usize::from(f.length_prefix.is_some())
            + usize::from(f.term_suffix.is_some());
        if modes > 1 {
            return Err(ParseError::validation(format!(
                "list '{}' may use only one of count, countPrefix, lengthPrefix and termSuffix",
                props.name()
            )));
        }
        if f.elem_fixed_length && f.elem_length_prefix.is_none() {
            return Err(ParseError::validation(format!(
                "list '{}' sets elemFixedLength without elemLengthPrefix",
                props.name()
            )));
        }
        Ok(())
    }

    fn lower_ref(&mut self, ctx: &FieldCtx<'_, '_>, f: &mut RefField) -> Result<(), ParseError> {
        match ctx.props.get("field") {
            Some(reference) => {
                f.target = self
                    .arena
                    .find_field(Some(self.schema), reference)
                    .ok_or_else(|| ParseError::unresolved("field", reference))?;
            }
            None if !ctx.reused => return Err(ctx.missing("field")),
            None => {}
        }
        if let Some(bits) = ctx.props.usize_opt("bitLength")? {
            f.bit_length = bits;
        }
        Ok(())
    }

    fn lower_optional(
        &mut self,
        ctx: &FieldCtx<'_, '_>,
        f: &mut OptionalField,
    ) -> Result<(), ParseError> {
        let props = ctx.props;
        match self.lower_wrapped(ctx, "field")? {
            Some(field) => f.field = field,
            None if !ctx.reused => return Err(ctx.missing("field")),
            None => {}
        }

        if let Some(mode) = props.parse("defaultMode", OptionalMode::parse)? {
            f.default_mode = mode;
        }
        f.missing_on_read_fail = props.bool_or("missingOnReadFail", f.missing_on_read_fail)?;
        f.missing_on_invalid = props.bool_or("missingOnInvalid", f.missing_on_invalid)?;

        let mut cond = CondData::from_property(props.get("cond"), props.complex("cond"), "cond")?;
        for child in props
            .children()
            .iter()
            .filter(|c| CondListType::from_element(&c.name).is_some())
        {
            if cond.is_some() {
                return Err(ParseError::RepeatedAttribute {
                    element: ctx.elem.name.clone(),
                    attribute: "cond".to_string(),
                });
            }
            cond = Some(CondData::List(CondList::parse(child)?));
        }
        if cond.is_some() {
            f.cond = cond;
        }
        Ok(())
    }

    fn lower_variant(&mut self, ctx: &FieldCtx<'_, '_>, f: &mut VariantField) -> Result<(), ParseError> {
        self.lower_members(ctx, &mut f.members)?;

        if let Some(raw) = ctx.props.get("defaultMember") {
            let by_index = crate::common::parse_usize(raw).filter(|idx| *idx < f.members.len());
            let by_name = || {
                f.members
                    .iter()
                    .position(|m| self.arena.field(*m).common.name == raw)
            };
            f.default_member = Some(
                by_index
                    .or_else(by_name)
                    .ok_or_else(|| ctx.invalid("defaultMember", raw))?,
            );
        }
        Ok(())
    }
}

/// Sorts valid ranges by version, merges overlapping or adjacent ranges that
/// share a version interval, then orders the result by value.
fn merge_valid_ranges<T: Copy>(
    ranges: &mut Vec<ValidRange<T>>,
    cmp: impl Fn(&T, &T) -> Ordering,
    joins: impl Fn(&ValidRange<T>, &ValidRange<T>) -> bool,
) {
    ranges.sort_by(|a, b| {
        a.since_version
            .cmp(&b.since_version)
            .then(a.deprecated_since.cmp(&b.deprecated_since))
            .then_with(|| cmp(&a.min, &b.min))
            .then_with(|| cmp(&a.max, &b.max))
    });

    let mut merged: Vec<ValidRange<T>> = Vec::with_capacity(ranges.len());
    for range in ranges.drain(..) {
        match merged.last_mut() {
            Some(last)
                if last.since_version == range.since_version
                    && last.deprecated_since == range.deprecated_since
                    && joins(&*last, &range) =>
            {
                if cmp(&range.max, &last.max) == Ordering::Greater {
                    last.max = range.max;
                }
            }
            _ => merged.push(range),
        }
    }

    merged.sort_by(|a, b| {
        cmp(&a.min, &b.min)
            .then_with(|| cmp(&a.max, &b.max))
            .then(a.since_version.cmp(&b.since_version))
            .then(a.deprecated_since.cmp(&b.deprecated_since))
    });
    *ranges = merged;
}

#[cfg(test)]
mod tests {
    use crate::arena::{Arena, SchemaId};
    use crate::config::ProtocolConfig;
    use crate::error::ParseError;
    use crate::field::{FieldKind, FieldLink, FieldParent, FieldPayload};
    use crate::logger::Logger;
    use crate::lower::lower_document;
    use crate::xml::parse_document;

    fn lower(xml: &str) -> Result<Arena, ParseError> {
        let mut arena = Arena::default();
        let root = parse_document(xml)?;
        lower_document(&mut arena, &ProtocolConfig::default(), &Logger::new(), "t.xml", &root)?;
        Ok(arena)
    }

    fn payload<'a>(arena: &'a Arena, reference: &str) -> &'a FieldPayload {
        let id = arena
            .find_field(Some(SchemaId(0)), reference)
            .expect("field exists");
        &arena.field(id).payload
    }

    #[test]
    fn test_int_properties() {
        let arena = lower(
            r#"<schema name="S" version="3" endian="big">
                <int name="F" type="uint16" defaultValue="S1" validCheckVersion="true">
                    <special name="S1" val="5"/>
                    <validRange value="[0, 10]"/>
                    <validValue value="20" sinceVersion="2"/>
                </int>
            </schema>"#,
        )
        .expect("lowered");
        let FieldPayload::Int(f) = payload(&arena, "F") else {
            panic!("int expected");
        };
        assert_eq!(f.length, 2);
        assert_eq!(f.default_value, 5);
        assert_eq!(f.endian, crate::types::Endian::Big);
        assert_eq!(f.valid_ranges.len(), 2);
        assert_eq!(f.valid_ranges[1].since_version, 2);
        assert_eq!(f.specials[0].name, "S1");
    }

    #[test]
    fn test_int_errors() {
        let err = lower(r#"<schema name="S"><int name="F" type="uint8"><special name="S" val="300"/></int></schema>"#)
            .expect_err("special out of range");
        assert!(matches!(err.root(), ParseError::Validation { .. }));

        let err = lower(
            r#"<schema name="S"><int name="F" type="uint8"><special name="A" val="1"/><special name="B" val="1"/></int></schema>"#,
        )
        .expect_err("duplicate special value");
        assert!(matches!(err.root(), ParseError::Validation { .. }));

        let err = lower(r#"<schema name="S"><int name="F"/></schema>"#).expect_err("missing type");
        assert!(matches!(err.root(), ParseError::MissingAttribute { .. }));
    }

    #[test]
    fn test_reuse_and_replace() {
        let arena = lower(
            r#"<schema name="S">
                <bundle name="B">
                    <int name="A" type="uint8"/>
                    <int name="C" type="uint8"/>
                </bundle>
                <bundle name="B2" reuse="B">
                    <replace><int name="C" type="uint16"/></replace>
                    <int name="D" type="uint8"/>
                </bundle>
            </schema>"#,
        )
        .expect("lowered");
        let FieldPayload::Bundle(b) = payload(&arena, "B2") else {
            panic!("bundle expected");
        };
        assert_eq!(b.members.len(), 3);
        assert_eq!(arena.min_length(b.members[1]), 2);
        assert!(arena.field(b.members[0]).common.external_ref.is_empty());

        let err = lower(
            r#"<schema name="S"><int name="I" type="uint8"/><enum name="E" reuse="I" type="uint8"><validValue name="V" val="0"/></enum></schema>"#,
        )
        .expect_err("kind mismatch");
        assert!(matches!(err.root(), ParseError::Validation { .. }));

        let err = lower(
            r#"<schema name="S"><bundle name="B"><int name="A" type="uint8"/></bundle><bundle name="B2" reuse="B"><replace><int name="X" type="uint8"/></replace></bundle></schema>"#,
        )
        .expect_err("unknown replaced member");
        assert!(matches!(err.root(), ParseError::UnresolvedReference { .. }));
    }

    #[test]
    fn test_reused_field_follows_owner_versions() {
        let arena = lower(
            r#"<schema name="S" version="4">
                <int name="Level" type="uint8" validCheckVersion="true">
                    <special name="Old" val="30" deprecated="1"/>
                    <special name="Top" val="40"/>
                    <validRange value="[0, 10]"/>
                </int>
                <bundle name="Pair">
                    <int name="A" type="uint8" validRange="[1, 2]"/>
                </bundle>
                <list name="Values" count="2"><int name="E" type="uint8"/></list>
                <message name="M" id="1" sinceVersion="2">
                    <int name="L" reuse="Level"/>
                    <bundle name="P" reuse="Pair"/>
                    <list name="V" reuse="Values"/>
                </message>
            </schema>"#,
        )
        .expect("lowered");
        let msg = arena.find_message(Some(SchemaId(0)), "M").expect("message");
        let fields = arena.message(msg).fields.clone();
        assert_eq!(fields.len(), 3);

        let level = arena.field(fields[0]);
        assert_eq!(level.common.since_version, 2);
        let FieldPayload::Int(level) = &level.payload else {
            panic!("int expected");
        };
        assert_eq!(level.valid_ranges.len(), 1);
        assert_eq!(level.valid_ranges[0].since_version, 2);
        assert_eq!(level.specials.len(), 1);
        assert_eq!(level.specials[0].name, "Top");
        assert_eq!(level.specials[0].since_version, 2);

        let FieldPayload::Bundle(pair) = &arena.field(fields[1]).payload else {
            panic!("bundle expected");
        };
        let member = arena.field(pair.members[0]);
        assert_eq!(member.common.since_version, 2);
        assert_eq!(member.common.parent, FieldParent::Field(fields[1]));
        let FieldPayload::Int(a) = &member.payload else {
            panic!("int expected");
        };
        assert_eq!(a.valid_ranges[0].since_version, 2);

        let FieldPayload::List(copy) = &arena.field(fields[2]).payload else {
            panic!("list expected");
        };
        let FieldPayload::List(source) = payload(&arena, "Values") else {
            panic!("list expected");
        };
        let (FieldLink::Member(copied), FieldLink::Member(original)) =
            (&copy.element, &source.element)
        else {
            panic!("inline elements expected");
        };
        assert_ne!(copied, original);
        assert_eq!(arena.field(*copied).common.since_version, 2);

        let FieldPayload::Int(source) = payload(&arena, "Level") else {
            panic!("int expected");
        };
        assert_eq!(source.valid_ranges[0].since_version, 0);
        assert_eq!(source.specials.len(), 2);
    }

    #[test]
    fn test_valid_ranges_merged() {
        let arena = lower(
            r#"<schema name="S" version="2">
                <int name="F" type="uint8" validValue="1">
                    <validValue value="2"/>
                    <validRange value="[3, 5]"/>
                    <validRange value="[8, 9]"/>
                    <validValue value="6" sinceVersion="1"/>
                </int>
                <float name="D" type="double">
                    <validRange value="[0.0, 1.0]"/>
                    <validRange value="[0.5, 2.0]"/>
                    <validValue value="3.0"/>
                </float>
            </schema>"#,
        )
        .expect("lowered");
        let FieldPayload::Int(f) = payload(&arena, "F") else {
            panic!("int expected");
        };
        let ranges: Vec<_> = f
            .valid_ranges
            .iter()
            .map(|r| (r.min, r.max, r.since_version))
            .collect();
        assert_eq!(ranges, vec![(1, 5, 0), (6, 6, 1), (8, 9, 0)]);

        let FieldPayload::Float(d) = payload(&arena, "D") else {
            panic!("float expected");
        };
        let ranges: Vec<_> = d.valid_ranges.iter().map(|r| (r.min, r.max)).collect();
        assert_eq!(ranges, vec![(0.0, 2.0), (3.0, 3.0)]);
    }

    #[test]
    fn test_bitfield_length() {
        lower(
            r#"<schema name="S"><bitfield name="B"><int name="A" type="uint8" bitLength="3"/><set name="F" length="1" bitLength="5"><bit name="X" idx="0"/></set></bitfield></schema>"#,
        )
        .expect("8 bits");

        let err = lower(
            r#"<schema name="S"><bitfield name="B"><int name="A" type="uint8" bitLength="3"/></bitfield></schema>"#,
        )
        .expect_err("3 bits");
        assert!(matches!(err.root(), ParseError::Validation { .. }));
    }

    #[test]
    fn test_list_links() {
        let arena = lower(
            r#"<schema name="S">
                <int name="Count" type="uint8"/>
                <list name="L1" element="Count" countPrefix="Count"/>
                <list name="L2" countPrefix="$Count"><int name="E" type="uint8"/></list>
                <list name="L3">
                    <element><int name="E" type="uint16"/></element>
                    <lengthPrefix><int name="Len" type="uint16"/></lengthPrefix>
                </list>
            </schema>"#,
        )
        .expect("lowered");
        let FieldPayload::List(l1) = payload(&arena, "L1") else {
            panic!("list expected");
        };
        assert!(matches!(l1.element, FieldLink::External(_)));
        let FieldPayload::List(l2) = payload(&arena, "L2") else {
            panic!("list expected");
        };
        assert_eq!(l2.count_prefix, Some(FieldLink::Detached("Count".to_string())));
        assert!(l2.element.is_member());
        let FieldPayload::List(l3) = payload(&arena, "L3") else {
            panic!("list expected");
        };
        assert!(l3.length_prefix.as_ref().is_some_and(FieldLink::is_member));

        let err = lower(
            r#"<schema name="S"><int name="C" type="uint8"/><list name="L" element="C" count="2" countPrefix="C"/></schema>"#,
        )
        .expect_err("count and countPrefix");
        assert!(matches!(err.root(), ParseError::Validation { .. }));
    }

    #[test]
    fn test_semantic_type_and_ref() {
        let arena = lower(
            r#"<schema name="S">
                <enum name="MsgId" type="uint8" semanticType="messageId"><validValue name="A" val="1"/></enum>
                <ref name="R" field="MsgId" semanticType="messageId"/>
            </schema>"#,
        )
        .expect("lowered");
        let r = arena.find_field(Some(SchemaId(0)), "R").expect("ref");
        assert_eq!(arena.field(arena.strip_ref(r)).kind(), FieldKind::Enum);

        let err = lower(r#"<schema name="S"><int name="V" type="uint8" semanticType="messageId"/></schema>"#)
            .expect_err("wrong kind");
        assert!(matches!(err.root(), ParseError::Validation { .. }));
    }

    #[test]
    fn test_optional_condition_in_bundle() {
        lower(
            r#"<schema name="S">
                <bundle name="B">
                    <int name="Flag" type="uint8"/>
                    <optional name="O" cond="$Flag != 0"><int name="V" type="uint8"/></optional>
                </bundle>
            </schema>"#,
        )
        .expect("valid condition");

        let err = lower(
            r#"<schema name="S">
                <bundle name="B">
                    <int name="Flag" type="uint8"/>
                    <optional name="O" cond="$Missing != 0"><int name="V" type="uint8"/></optional>
                </bundle>
            </schema>"#,
        )
        .expect_err("unknown sibling");
        assert!(matches!(err.root(), ParseError::InvalidCondition { .. }));
    }

    #[test]
    fn test_set_and_variant() {
        let arena = lower(
            r#"<schema name="S">
                <set name="Flags" length="2"><bit name="B0" idx="0"/><bit name="B9" idx="9"/></set>
                <variant name="V" defaultMember="Second">
                    <bundle name="First"><int name="A" type="uint8"/></bundle>
                    <bundle name="Second"><int name="B" type="uint8"/></bundle>
                </variant>
            </schema>"#,
        )
        .expect("lowered");
        let FieldPayload::Set(set) = payload(&arena, "Flags") else {
            panic!("set expected");
        };
        assert_eq!(set.int_type, crate::types::IntType::Uint16);
        assert_eq!(set.bits.len(), 2);
        let FieldPayload::Variant(v) = payload(&arena, "V") else {
            panic!("variant expected");
        };
        assert_eq!(v.default_member, Some(1));

        let err = lower(r#"<schema name="S"><set name="F" length="1"><bit name="B" idx="8"/></set></schema>"#)
            .expect_err("bit index out of range");
        assert!(matches!(err.root(), ParseError::InvalidAttribute { .. }));
    }
}
