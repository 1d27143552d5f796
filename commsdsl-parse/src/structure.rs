//! Structural checks of a single schema document.
//!
//! These checks need no knowledge of other documents: element and property
//! names, required names, nesting rules and duplicate sibling names.
//! Reference resolution and semantic rules run later, once every document
//! has been parsed.

use crate::common::is_valid_name;
use crate::config::ProtocolConfig;
use crate::error::ParseError;
use crate::field::FieldKind;
use crate::frame::LayerKind;
use crate::opt_cond::{CondData, CondList};
use crate::props::Props;
use crate::vocab::{
    ALIAS_PROPS, BIT_PROPS, COND_PROPS, FIELD_HOLDING_PROPS, FRAME_PROPS, INTERFACE_PROPS,
    MEMBERS_CONTAINER, MESSAGE_PROPS, NAMESPACE_PROPS, PLATFORM_PROPS, SCHEMA_PROPS,
    SPECIAL_PROPS, accepts_field_children, field_children, field_props, layer_props,
};
use crate::xml::XmlElement;

/// Walks a document and reports the first structural error found.
pub(crate) struct StructureChecker<'c> {
    config: &'c ProtocolConfig,
    doc: &'c str,
}

/// Names already used by siblings of one kind.
#[derive(Default)]
struct NameSet<'x> {
    kind: &'static str,
    names: Vec<&'x str>,
}

impl<'x> NameSet<'x> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            names: Vec::new(),
        }
    }

    fn insert(&mut self, name: &'x str) -> Result<(), ParseError> {
        if self.names.contains(&name) {
            return Err(ParseError::duplicate(self.kind, name));
        }
        self.names.push(name);
        Ok(())
    }
}

impl<'c> StructureChecker<'c> {
    pub fn new(config: &'c ProtocolConfig, doc: &'c str) -> Self {
        Self { config, doc }
    }

    fn located<T>(&self, elem: &XmlElement, result: Result<T, ParseError>) -> Result<T, ParseError> {
        result.map_err(|e| e.at(elem.location(self.doc)))
    }

    fn props<'x>(&self, elem: &'x XmlElement, known: &[&str]) -> Result<Props<'x>, ParseError> {
        self.located(elem, Props::collect(elem, known, self.config))
    }

    fn named<'x>(&self, elem: &'x XmlElement, props: &Props<'x>) -> Result<&'x str, ParseError> {
        let name = self.located(elem, props.required("name"))?;
        if !is_valid_name(name) {
            return Err(ParseError::invalid_attr(&elem.name, "name", name).at(elem.location(self.doc)));
        }
        Ok(name)
    }

    fn unknown(&self, elem: &XmlElement, context: &XmlElement) -> ParseError {
        ParseError::unknown_element(&elem.name, &context.name).at(elem.location(self.doc))
    }

    /// Checks the `<schema>` root element.
    pub fn check_schema(&self, root: &XmlElement) -> Result<(), ParseError> {
        if root.name != "schema" {
            return Err(ParseError::structure(format!(
                "root element must be <schema>, found <{}>",
                root.name
            ))
            .at(root.location(self.doc)));
        }

        let props = self.props(root, SCHEMA_PROPS)?;
        self.named(root, &props)?;
        self.check_namespace_content(root, &props)
    }

    fn check_namespace_content(
        &self,
        elem: &XmlElement,
        props: &Props<'_>,
    ) -> Result<(), ParseError> {
        let mut fields = NameSet::new("field");
        let mut messages = NameSet::new("message");
        let mut interfaces = NameSet::new("interface");
        let mut frames = NameSet::new("frame");

        for child in props.children() {
            match child.name.as_str() {
                "fields" => {
                    for f in self.container_items(child)? {
                        fields.insert(self.check_field(f)?).map_err(|e| e.at(f.location(self.doc)))?;
                    }
                }
                "messages" => {
                    for m in self.container_items(child)? {
                        self.expect_name(m, child, "message")?;
                        messages.insert(self.check_message(m)?).map_err(|e| e.at(m.location(self.doc)))?;
                    }
                }
                "interfaces" => {
                    for i in self.container_items(child)? {
                        self.expect_name(i, child, "interface")?;
                        interfaces
                            .insert(self.check_interface(i)?)
                            .map_err(|e| e.at(i.location(self.doc)))?;
                    }
                }
                "frames" => {
                    for f in self.container_items(child)? {
                        self.expect_name(f, child, "frame")?;
                        frames.insert(self.check_frame(f)?).map_err(|e| e.at(f.location(self.doc)))?;
                    }
                }
                "message" => {
                    messages
                        .insert(self.check_message(child)?)
                        .map_err(|e| e.at(child.location(self.doc)))?;
                }
                "interface" => {
                    interfaces
                        .insert(self.check_interface(child)?)
                        .map_err(|e| e.at(child.location(self.doc)))?;
                }
                "frame" => {
                    frames
                        .insert(self.check_frame(child)?)
                        .map_err(|e| e.at(child.location(self.doc)))?;
                }
                "ns" => {
                    let ns_props = self.props(child, NAMESPACE_PROPS)?;
                    self.named(child, &ns_props)?;
                    self.check_namespace_content(child, &ns_props)?;
                }
                "platforms" => {
                    let mut platforms = NameSet::new("platform");
                    for p in self.container_items(child)? {
                        self.expect_name(p, child, "platform")?;
                        let p_props = self.props(p, PLATFORM_PROPS)?;
                        platforms
                            .insert(self.named(p, &p_props)?)
                            .map_err(|e| e.at(p.location(self.doc)))?;
                    }
                }
                name if FieldKind::from_element(name).is_some() => {
                    fields
                        .insert(self.check_field(child)?)
                        .map_err(|e| e.at(child.location(self.doc)))?;
                }
                _ => return Err(self.unknown(child, elem)),
            }
        }
        Ok(())
    }

    /// Children of a container element, skipping tolerated extra elements.
    fn container_items<'x>(&self, elem: &'x XmlElement) -> Result<Vec<&'x XmlElement>, ParseError> {
        if let Some((key, _)) = elem.attrs.iter().find(|(k, _)| !self.config.is_extra_name(k)) {
            return Err(ParseError::unknown_attr(&elem.name, key).at(elem.location(self.doc)));
        }
        Ok(elem
            .children
            .iter()
            .filter(|c| !self.config.is_extra_name(&c.name))
            .collect())
    }

    fn expect_name(
        &self,
        elem: &XmlElement,
        context: &XmlElement,
        expected: &str,
    ) -> Result<(), ParseError> {
        if elem.name == expected {
            Ok(())
        } else {
            Err(self.unknown(elem, context))
        }
    }

    /// Checks a field element and returns its name.
    pub fn check_field<'x>(&self, elem: &'x XmlElement) -> Result<&'x str, ParseError> {
        let kind = FieldKind::from_element(&elem.name)
            .ok_or_else(|| ParseError::unknown_element(&elem.name, "fields").at(elem.location(self.doc)))?;
        let props = self.props(elem, &field_props(kind))?;
        let name = self.named(elem, &props)?;

        for prop in FIELD_HOLDING_PROPS.iter().chain(COND_PROPS) {
            if let Some(complex) = props.complex(prop) {
                self.check_complex_prop(complex, prop)?;
            }
        }

        let mut members = NameSet::new("member field");
        for child in props.children() {
            let child_name = child.name.as_str();
            if FieldKind::from_element(child_name).is_some() && accepts_field_children(kind) {
                members
                    .insert(self.check_field(child)?)
                    .map_err(|e| e.at(child.location(self.doc)))?;
                continue;
            }

            if !field_children(kind).contains(&child_name) {
                return Err(self.unknown(child, elem));
            }

            match child_name {
                MEMBERS_CONTAINER => {
                    for m in self.container_items(child)? {
                        members.insert(self.check_field(m)?).map_err(|e| e.at(m.location(self.doc)))?;
                    }
                }
                "replace" => {
                    for m in self.container_items(child)? {
                        self.check_field(m)?;
                    }
                }
                "special" | "validValue" => {
                    let item = self.props(child, SPECIAL_PROPS)?;
                    self.named(child, &item)?;
                    self.located(child, item.required("val"))?;
                }
                "bit" => {
                    let item = self.props(child, BIT_PROPS)?;
                    self.named(child, &item)?;
                    self.located(child, item.required("idx"))?;
                }
                "alias" => {
                    let item = self.props(child, ALIAS_PROPS)?;
                    self.named(child, &item)?;
                    self.located(child, item.required("field"))?;
                }
                "and" | "or" => {
                    self.located(child, CondList::parse(child))?;
                }
                _ => return Err(self.unknown(child, elem)),
            }
        }

        if kind == FieldKind::List {
            let inline = props
                .children()
                .iter()
                .filter(|c| FieldKind::from_element(&c.name).is_some())
                .count();
            if inline > 1 {
                return Err(ParseError::structure("list may define only one element field")
                    .at(elem.location(self.doc)));
            }
        }

        Ok(name)
    }

    fn check_complex_prop(&self, elem: &XmlElement, prop: &str) -> Result<(), ParseError> {
        if COND_PROPS.contains(&prop) {
            return self
                .located(elem, CondData::from_property(None, Some(elem), prop))
                .map(|_| ());
        }

        let items = self.container_items(elem)?;
        match items.as_slice() {
            [single] => self.check_field(single).map(|_| ()),
            _ => Err(ParseError::structure(format!(
                "property '{prop}' must contain a single field definition"
            ))
            .at(elem.location(self.doc))),
        }
    }

    fn check_field_list<'x>(
        &self,
        owner: &'x XmlElement,
        props: &Props<'x>,
        extra: &[&str],
    ) -> Result<(), ParseError> {
        let mut fields = NameSet::new("field");
        for child in props.children() {
            if FieldKind::from_element(&child.name).is_some() {
                fields
                    .insert(self.check_field(child)?)
                    .map_err(|e| e.at(child.location(self.doc)))?;
                continue;
            }

            match child.name.as_str() {
                "fields" => {
                    for f in self.container_items(child)? {
                        fields.insert(self.check_field(f)?).map_err(|e| e.at(f.location(self.doc)))?;
                    }
                }
                "alias" => {
                    let item = self.props(child, ALIAS_PROPS)?;
                    self.named(child, &item)?;
                    self.located(child, item.required("field"))?;
                }
                name if extra.contains(&name) => {}
                _ => return Err(self.unknown(child, owner)),
            }
        }
        Ok(())
    }

    fn check_message<'x>(&self, elem: &'x XmlElement) -> Result<&'x str, ParseError> {
        let props = self.props(elem, MESSAGE_PROPS)?;
        let name = self.named(elem, &props)?;
        self.located(elem, props.required("id"))?;
        for prop in COND_PROPS {
            if let Some(complex) = props.complex(prop) {
                self.check_complex_prop(complex, prop)?;
            }
        }
        self.check_field_list(elem, &props, &[])?;
        Ok(name)
    }

    fn check_interface<'x>(&self, elem: &'x XmlElement) -> Result<&'x str, ParseError> {
        let props = self.props(elem, INTERFACE_PROPS)?;
        let name = self.named(elem, &props)?;
        self.check_field_list(elem, &props, &[])?;
        Ok(name)
    }

    fn check_frame<'x>(&self, elem: &'x XmlElement) -> Result<&'x str, ParseError> {
        let props = self.props(elem, FRAME_PROPS)?;
        let name = self.named(elem, &props)?;

        let mut layers = NameSet::new("layer");
        let mut items = Vec::new();
        for child in props.children() {
            if child.name == "layers" {
                items.extend(self.container_items(child)?);
            } else {
                items.push(child);
            }
        }

        let mut payloads = 0usize;
        for layer in items {
            let kind = LayerKind::from_element(&layer.name).ok_or_else(|| self.unknown(layer, elem))?;
            if kind == LayerKind::Payload {
                payloads += 1;
            }
            layers
                .insert(self.check_layer(layer, kind)?)
                .map_err(|e| e.at(layer.location(self.doc)))?;
        }

        if payloads != 1 {
            return Err(ParseError::structure(format!(
                "frame '{name}' must contain exactly one payload layer"
            ))
            .at(elem.location(self.doc)));
        }
        Ok(name)
    }

    fn check_layer<'x>(&self, elem: &'x XmlElement, kind: LayerKind) -> Result<&'x str, ParseError> {
        let props = self.props(elem, &layer_props(kind))?;
        let name = self.named(elem, &props)?;

        if let Some(complex) = props.complex("field") {
            self.check_complex_prop(complex, "field")?;
        }

        let mut inline = 0usize;
        for child in props.children() {
            if FieldKind::from_element(&child.name).is_none() {
                return Err(self.unknown(child, elem));
            }
            self.check_field(child)?;
            inline += 1;
        }

        let has_field = inline > 0 || props.has("field");
        if inline > 1 || (inline > 0 && props.has("field")) {
            return Err(ParseError::structure(format!("layer '{name}' defines more than one field"))
                .at(elem.location(self.doc)));
        }

        match kind {
            LayerKind::Payload if has_field => {
                return Err(ParseError::structure("payload layer cannot have a field")
                    .at(elem.location(self.doc)));
            }
            LayerKind::Payload => {}
            _ if !has_field => {
                return Err(ParseError::missing_attr(&elem.name, "field").at(elem.location(self.doc)));
            }
            _ => {}
        }

        let is_checksum = kind == LayerKind::Checksum
            || props
                .get("semanticLayerType")
                .is_some_and(|s| s.eq_ignore_ascii_case("checksum"));
        if is_checksum {
            let from = props.has("from") || props.has("checksumFrom");
            let until = props.has("until") || props.has("checksumUntil");
            if from == until {
                return Err(ParseError::structure(format!(
                    "checksum layer '{name}' must specify exactly one of 'from' and 'until'"
                ))
                .at(elem.location(self.doc)));
            }
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    fn check(xml: &str) -> Result<(), ParseError> {
        let root = parse_document(xml)?;
        let config = ProtocolConfig::default();
        StructureChecker::new(&config, "test.xml").check_schema(&root)
    }

    #[test]
    fn test_valid_document() {
        let xml = r#"<schema name="S" version="1">
            <fields>
                <int name="F1" type="uint8"/>
                <bundle name="B">
                    <int name="M1" type="uint8"/>
                    <members><int name="M2" type="uint8"/></members>
                </bundle>
            </fields>
            <ns name="sub">
                <message name="M" id="1">
                    <int name="F" type="uint8"/>
                    <optional name="O" cond="$F = 1"><int name="I" type="uint8"/></optional>
                </message>
            </ns>
            <frame name="Frame">
                <size name="Size"><int name="SizeField" type="uint16"/></size>
                <payload name="Data"/>
            </frame>
        </schema>"#;
        check(xml).expect("valid structure");
    }

    #[test]
    fn test_unknown_element() {
        let err = check(r#"<schema name="S"><bogus/></schema>"#).expect_err("unknown element");
        assert!(matches!(err.root(), ParseError::UnknownElement { .. }));
        assert!(err.to_string().starts_with("test.xml:1:"));
    }

    #[test]
    fn test_duplicate_names() {
        let err = check(
            r#"<schema name="S"><int name="A" type="uint8"/><fields><enum name="A" type="uint8"/></fields></schema>"#,
        )
        .expect_err("duplicate");
        assert!(matches!(err.root(), ParseError::DuplicateDefinition { .. }));

        let err = check(
            r#"<schema name="S"><bundle name="B"><int name="X" type="uint8"/><int name="X" type="uint8"/></bundle></schema>"#,
        )
        .expect_err("duplicate member");
        assert!(matches!(err.root(), ParseError::DuplicateDefinition { .. }));
    }

    #[test]
    fn test_frame_rules() {
        let err = check(r#"<schema name="S"><frame name="F"><sync name="S" field="X"/></frame></schema>"#)
            .expect_err("missing payload");
        assert!(matches!(err.root(), ParseError::InvalidStructure { .. }));

        let err = check(
            r#"<schema name="S"><frame name="F"><checksum name="C" alg="sum" field="X" from="A" until="B"/><payload name="P"/></frame></schema>"#,
        )
        .expect_err("from and until");
        assert!(matches!(err.root(), ParseError::InvalidStructure { .. }));
    }

    #[test]
    fn test_missing_name() {
        let err = check(r#"<schema name="S"><int type="uint8"/></schema>"#).expect_err("no name");
        assert!(matches!(err.root(), ParseError::MissingAttribute { .. }));
        assert!(check(r#"<schema name="1S"/>"#).is_err());
    }
}
