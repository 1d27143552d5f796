//! Element and property vocabulary of schema documents.

use crate::field::FieldKind;
use crate::frame::LayerKind;

pub(crate) const SCHEMA_PROPS: &[&str] = &[
    "name",
    "id",
    "version",
    "dslVersion",
    "endian",
    "description",
    "nonUniqueMsgIdAllowed",
];

pub(crate) const NAMESPACE_PROPS: &[&str] = &["name", "description"];

pub(crate) const PLATFORM_PROPS: &[&str] = &["name", "description"];

pub(crate) const COMMON_FIELD_PROPS: &[&str] = &[
    "name",
    "displayName",
    "description",
    "sinceVersion",
    "deprecated",
    "removed",
    "reuse",
    "semanticType",
    "pseudo",
    "fixedValue",
    "displayReadOnly",
    "displayHidden",
    "customizable",
    "failOnInvalid",
    "forceGen",
    "valueOverride",
    "readOverride",
    "writeOverride",
    "refreshOverride",
    "lengthOverride",
    "validOverride",
    "nameOverride",
    "copyCodeFrom",
    "reuseCode",
];

const INT_PROPS: &[&str] = &[
    "type",
    "endian",
    "length",
    "bitLength",
    "serOffset",
    "scaling",
    "units",
    "defaultValue",
    "validRange",
    "validValue",
    "validMin",
    "validMax",
    "validCheckVersion",
    "displayDecimals",
    "displayOffset",
    "signExt",
    "nonUniqueSpecialsAllowed",
];

const ENUM_PROPS: &[&str] = &[
    "type",
    "endian",
    "length",
    "bitLength",
    "defaultValue",
    "hexAssign",
    "nonUniqueAllowed",
    "validCheckVersion",
];

const SET_PROPS: &[&str] = &[
    "type",
    "endian",
    "length",
    "bitLength",
    "defaultValue",
    "reservedValue",
    "nonUniqueAllowed",
    "validCheckVersion",
];

const FLOAT_PROPS: &[&str] = &[
    "type",
    "endian",
    "defaultValue",
    "validRange",
    "validValue",
    "validMin",
    "validMax",
    "validFullRange",
    "validCheckVersion",
    "units",
    "displayDecimals",
    "nonUniqueSpecialsAllowed",
];

const BITFIELD_PROPS: &[&str] = &["endian"];

const BUNDLE_PROPS: &[&str] = &["reuseAliases"];

const STRING_PROPS: &[&str] = &[
    "encoding",
    "length",
    "zeroTermSuffix",
    "defaultValue",
    "lengthPrefix",
];

const DATA_PROPS: &[&str] = &["length", "defaultValue", "lengthPrefix"];

const LIST_PROPS: &[&str] = &[
    "element",
    "count",
    "countPrefix",
    "lengthPrefix",
    "elemLengthPrefix",
    "elemFixedLength",
    "termSuffix",
];

const REF_PROPS: &[&str] = &["field", "bitLength"];

const OPTIONAL_PROPS: &[&str] = &[
    "field",
    "defaultMode",
    "cond",
    "missingOnReadFail",
    "missingOnInvalid",
];

const VARIANT_PROPS: &[&str] = &["defaultMember"];

/// Properties that may be given several times, each child carrying its own versions.
pub(crate) const REPEATABLE_PROPS: &[&str] = &["validRange", "validValue", "validMin", "validMax"];

pub(crate) const SPECIAL_PROPS: &[&str] = &[
    "name",
    "val",
    "sinceVersion",
    "deprecated",
    "description",
    "displayName",
];

pub(crate) const BIT_PROPS: &[&str] = &[
    "name",
    "idx",
    "defaultValue",
    "reserved",
    "reservedValue",
    "sinceVersion",
    "deprecated",
    "description",
    "displayName",
];

pub(crate) const RANGE_ITEM_PROPS: &[&str] = &["value", "sinceVersion", "deprecated"];

pub(crate) const ALIAS_PROPS: &[&str] = &["name", "description", "field"];

pub(crate) const MESSAGE_PROPS: &[&str] = &[
    "name",
    "id",
    "displayName",
    "description",
    "order",
    "sender",
    "sinceVersion",
    "deprecated",
    "removed",
    "platforms",
    "copyFieldsFrom",
    "copyCodeFrom",
    "construct",
    "readCond",
    "validCond",
    "validateMinLength",
    "customizable",
    "failOnInvalid",
    "valueOverride",
    "readOverride",
    "writeOverride",
    "refreshOverride",
    "lengthOverride",
    "validOverride",
    "nameOverride",
];

pub(crate) const INTERFACE_PROPS: &[&str] = &["name", "description", "copyFieldsFrom"];

pub(crate) const FRAME_PROPS: &[&str] = &["name", "description"];

const LAYER_COMMON_PROPS: &[&str] = &["name", "description", "field"];

const CHECKSUM_LAYER_PROPS: &[&str] = &["alg", "algName", "from", "until", "verifyBeforeRead"];

const VALUE_LAYER_PROPS: &[&str] = &["interfaces", "interfaceFieldName", "pseudo"];

const CUSTOM_LAYER_PROPS: &[&str] = &[
    "idReplacement",
    "semanticLayerType",
    "checksumFrom",
    "checksumUntil",
];

/// Child elements that group member fields.
pub(crate) const MEMBERS_CONTAINER: &str = "members";

/// Returns all properties recognised by a field element.
pub(crate) fn field_props(kind: FieldKind) -> Vec<&'static str> {
    let specific = match kind {
        FieldKind::Int => INT_PROPS,
        FieldKind::Enum => ENUM_PROPS,
        FieldKind::Set => SET_PROPS,
        FieldKind::Float => FLOAT_PROPS,
        FieldKind::Bitfield => BITFIELD_PROPS,
        FieldKind::Bundle => BUNDLE_PROPS,
        FieldKind::String => STRING_PROPS,
        FieldKind::Data => DATA_PROPS,
        FieldKind::List => LIST_PROPS,
        FieldKind::Ref => REF_PROPS,
        FieldKind::Optional => OPTIONAL_PROPS,
        FieldKind::Variant => VARIANT_PROPS,
    };
    COMMON_FIELD_PROPS.iter().chain(specific).copied().collect()
}

/// Returns all properties recognised by a layer element.
pub(crate) fn layer_props(kind: LayerKind) -> Vec<&'static str> {
    let specific: &[&str] = match kind {
        LayerKind::Checksum => CHECKSUM_LAYER_PROPS,
        LayerKind::Value => VALUE_LAYER_PROPS,
        LayerKind::Custom => {
            return LAYER_COMMON_PROPS
                .iter()
                .chain(CUSTOM_LAYER_PROPS)
                .chain(CHECKSUM_LAYER_PROPS)
                .copied()
                .collect();
        }
        _ => &[],
    };
    LAYER_COMMON_PROPS.iter().chain(specific).copied().collect()
}

/// Returns the names of non-property child elements a field kind accepts.
pub(crate) fn field_children(kind: FieldKind) -> &'static [&'static str] {
    match kind {
        FieldKind::Int | FieldKind::Float => &["special"],
        FieldKind::Enum => &["validValue"],
        FieldKind::Set => &["bit"],
        FieldKind::Bundle => &[MEMBERS_CONTAINER, "alias", "replace"],
        FieldKind::Bitfield | FieldKind::Variant => &[MEMBERS_CONTAINER, "replace"],
        FieldKind::Optional => &["and", "or"],
        _ => &[],
    }
}

/// Returns true if field elements may be declared directly inside the element.
pub(crate) const fn accepts_field_children(kind: FieldKind) -> bool {
    matches!(
        kind,
        FieldKind::Bitfield
            | FieldKind::Bundle
            | FieldKind::Variant
            | FieldKind::Optional
            | FieldKind::List
    )
}

/// Properties that may hold an inline field definition instead of a reference.
pub(crate) const FIELD_HOLDING_PROPS: &[&str] = &[
    "element",
    "field",
    "countPrefix",
    "lengthPrefix",
    "elemLengthPrefix",
    "termSuffix",
];

/// Properties that may hold a condition list instead of a single expression.
pub(crate) const COND_PROPS: &[&str] = &["cond", "construct", "readCond", "validCond"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_props_include_common() {
        for kind in FieldKind::ALL {
            let props = field_props(kind);
            assert!(props.contains(&"name"));
            assert!(props.contains(&"reuse"));
        }
        assert!(field_props(FieldKind::Int).contains(&"validRange"));
        assert!(!field_props(FieldKind::Bundle).contains(&"validRange"));
    }

    #[test]
    fn test_custom_layer_props() {
        let props = layer_props(LayerKind::Custom);
        assert!(props.contains(&"semanticLayerType"));
        assert!(props.contains(&"from"));
        assert!(!layer_props(LayerKind::Sync).contains(&"from"));
    }
}
