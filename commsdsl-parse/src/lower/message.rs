//! Lowering of messages and interfaces.

use super::field::apply_overrides;
use super::{Interval, Lowerer};
use crate::alias::AliasData;
use crate::arena::{FieldId, InterfaceId, MessageId, NamespaceId};
use crate::common::{is_valid_name, parse_int_literal, split_list};
use crate::error::ParseError;
use crate::field::{FieldKind, FieldParent, FieldPayload, FieldRefType};
use crate::interface::InterfaceData;
use crate::message::MessageData;
use crate::opt_cond::{CondContext, CondData};
use crate::props::Props;
use crate::types::Sender;
use crate::vocab::{INTERFACE_PROPS, MESSAGE_PROPS};
use crate::xml::XmlElement;

/// Fields and aliases taken over through `copyFieldsFrom`.
struct CopySource {
    fields: Vec<FieldId>,
    aliases: Vec<AliasData>,
}

impl Lowerer<'_> {
    pub(super) fn lower_message(
        &mut self,
        elem: &XmlElement,
        ns: NamespaceId,
    ) -> Result<MessageId, ParseError> {
        self.lower_message_at(elem, ns)
            .map_err(|e| e.at(self.location(elem)))
    }

    fn lower_message_at(&mut self, elem: &XmlElement, ns: NamespaceId) -> Result<MessageId, ParseError> {
        let props = self.props(elem, MESSAGE_PROPS)?;
        let name = props.required("name")?;
        if !is_valid_name(name) {
            return Err(ParseError::invalid_attr(&elem.name, "name", name));
        }
        if self
            .arena
            .namespace(ns)
            .messages
            .iter()
            .any(|m| self.arena.message(*m).name == name)
        {
            return Err(ParseError::duplicate("message", name));
        }

        let mut data = MessageData::new(name, self.schema, ns);
        data.id = self.message_id(&props)?;
        data.order = props.u32_opt("order")?.unwrap_or(0);
        data.display_name = props.get("displayName").unwrap_or_default().to_string();
        data.description = props.get("description").unwrap_or_default().to_string();
        data.sender = props.parse("sender", Sender::parse)?.unwrap_or_default();
        data.customizable = props.bool_or("customizable", false)?;
        data.fail_on_invalid = props.bool_or("failOnInvalid", false)?;
        apply_overrides(&props, &mut data.overrides)?;

        let own = Interval::read(&props, Interval::FULL)?;
        self.check_versions(elem, name, own, Interval::FULL)?;
        data.since_version = own.since;
        data.deprecated_since = own.deprecated;
        data.removed = props.bool_or("removed", false)?;
        self.check_removed(elem, name, data.removed, own);

        if let Some(list) = props.get("platforms") {
            let known = &self.arena.schema(self.schema).platforms;
            for platform in split_list(list) {
                if !known.iter().any(|p| p == platform) {
                    return Err(ParseError::unresolved("platform", platform));
                }
                data.platforms.push(platform.to_string());
            }
        }

        if let Some(reference) = props.get("copyCodeFrom") {
            let source = self
                .arena
                .find_message(Some(self.schema), reference)
                .ok_or_else(|| ParseError::unresolved("message", reference))?;
            data.copy_code_from = self.arena.message(source).external_ref.clone();
        }

        data.external_ref = self.arena.external_ref_in(ns, name);
        data.location = self.location(elem);
        let id = self.arena.add_message(data);

        let parent = FieldParent::Message(id);
        let mut fields = Vec::new();
        let mut aliases = Vec::new();
        if let Some(source) = self.copy_source(&props)? {
            for field in source.fields {
                let copy = self.arena.clone_field(field, parent);
                self.arena.restrict_versions(copy, own.since, own.deprecated);
                fields.push(copy);
            }
            aliases = source.aliases;
        }
        self.lower_own_fields(&props, parent, own, &mut fields)?;
        self.lower_aliases(props.children(), &fields, &mut aliases)?;

        let interfaces = self.arena.all_interfaces(self.schema);
        self.verify_members(&fields, &interfaces)?;

        let mut conds = [None, None, None];
        for (slot, prop) in conds.iter_mut().zip(["construct", "readCond", "validCond"]) {
            *slot = CondData::from_property(props.get(prop), props.complex(prop), prop)?;
            if let Some(cond) = slot {
                let ctx = CondContext {
                    arena: &*self.arena,
                    siblings: &fields,
                    interfaces: &interfaces,
                };
                cond.verify(&ctx)?;
            }
        }
        let [construct, read_cond, valid_cond] = conds;

        if let Some(expected) = props.usize_opt("validateMinLength")? {
            let actual: usize = fields.iter().map(|f| self.arena.min_length(*f)).sum();
            if actual != expected {
                return Err(ParseError::validation(format!(
                    "minimal length of message '{name}' is {actual}, not {expected}"
                )));
            }
        }

        let msg = self.arena.message_mut(id);
        msg.fields = fields;
        msg.aliases = aliases;
        msg.construct = construct;
        msg.read_cond = read_cond;
        msg.valid_cond = valid_cond;
        msg.validate_min_length = props.usize_opt("validateMinLength")?;
        self.arena.namespace_mut(ns).messages.push(id);
        Ok(id)
    }

    /// Resolves the numeric id: a literal or a reference to an enum value.
    fn message_id(&self, props: &Props<'_>) -> Result<u64, ParseError> {
        let raw = props.required("id")?;
        if let Some(value) = parse_int_literal(raw) {
            return u64::try_from(value).map_err(|_| ParseError::invalid_attr("message", "id", raw));
        }

        let (field, inner) = self
            .arena
            .find_field_with_inner(Some(self.schema), raw)
            .ok_or_else(|| ParseError::unresolved("message id", raw))?;
        let info = self.arena.process_inner_ref(field, inner);
        let target = info.field.filter(|_| info.ref_type == FieldRefType::InnerValue);
        let value = target.and_then(|f| match &self.arena.field(f).payload {
            FieldPayload::Enum(e) => e
                .values
                .iter()
                .find(|v| v.name == info.value_name)
                .map(|v| v.value),
            _ => None,
        });

        value
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| ParseError::invalid_attr("message", "id", raw))
    }

    fn copy_source(&self, props: &Props<'_>) -> Result<Option<CopySource>, ParseError> {
        let Some(reference) = props.get("copyFieldsFrom") else {
            return Ok(None);
        };

        let current = Some(self.schema);
        if let Some(msg) = self.arena.find_message(current, reference) {
            let data = self.arena.message(msg);
            return Ok(Some(CopySource {
                fields: data.fields.clone(),
                aliases: data.aliases.clone(),
            }));
        }
        if let Some(iface) = self.arena.find_interface(current, reference) {
            let data = self.arena.interface(iface);
            return Ok(Some(CopySource {
                fields: data.fields.clone(),
                aliases: data.aliases.clone(),
            }));
        }
        if let Some(field) = self.arena.find_field(current, reference) {
            if let FieldPayload::Bundle(b) = &self.arena.field(self.arena.strip_ref(field)).payload {
                return Ok(Some(CopySource {
                    fields: b.members.clone(),
                    aliases: b.aliases.clone(),
                }));
            }
        }
        Err(ParseError::unresolved("copyFieldsFrom", reference))
    }

    /// Lowers fields given directly or inside `<fields>`.
    fn lower_own_fields(
        &mut self,
        props: &Props<'_>,
        parent: FieldParent,
        bounds: Interval,
        fields: &mut Vec<FieldId>,
    ) -> Result<(), ParseError> {
        let mut items = Vec::new();
        for child in props.children() {
            if FieldKind::from_element(&child.name).is_some() {
                items.push(*child);
            } else if child.name == "fields" {
                items.extend(self.container_items(child));
            }
        }

        for item in items {
            let id = self.lower_field(item, parent, bounds)?;
            let name = &self.arena.field(id).common.name;
            if fields
                .iter()
                .any(|f| self.arena.field(*f).common.name == *name)
            {
                return Err(ParseError::duplicate("field", name.as_str()).at(self.location(item)));
            }
            fields.push(id);
        }
        Ok(())
    }

    pub(super) fn lower_interface(
        &mut self,
        elem: &XmlElement,
        ns: NamespaceId,
    ) -> Result<InterfaceId, ParseError> {
        self.lower_interface_at(elem, ns)
            .map_err(|e| e.at(self.location(elem)))
    }

    fn lower_interface_at(
        &mut self,
        elem: &XmlElement,
        ns: NamespaceId,
    ) -> Result<InterfaceId, ParseError> {
        let props = self.props(elem, INTERFACE_PROPS)?;
        let name = props.required("name")?;
        if !is_valid_name(name) {
            return Err(ParseError::invalid_attr(&elem.name, "name", name));
        }
        if self
            .arena
            .namespace(ns)
            .interfaces
            .iter()
            .any(|i| self.arena.interface(*i).name == name)
        {
            return Err(ParseError::duplicate("interface", name));
        }

        let id = self.arena.add_interface(InterfaceData {
            name: name.to_string(),
            description: props.get("description").unwrap_or_default().to_string(),
            fields: Vec::new(),
            aliases: Vec::new(),
            external_ref: self.arena.external_ref_in(ns, name),
            schema: self.schema,
            namespace: ns,
            location: self.location(elem),
        });

        let parent = FieldParent::Interface(id);
        let mut fields = Vec::new();
        let mut aliases = Vec::new();
        if let Some(source) = self.copy_source(&props)? {
            for field in source.fields {
                fields.push(self.arena.clone_field(field, parent));
            }
            aliases = source.aliases;
        }
        self.lower_own_fields(&props, parent, Interval::FULL, &mut fields)?;
        self.lower_aliases(props.children(), &fields, &mut aliases)?;
        self.verify_members(&fields, &[])?;

        let data = self.arena.interface_mut(id);
        data.fields = fields;
        data.aliases = aliases;
        self.arena.namespace_mut(ns).interfaces.push(id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use crate::arena::{Arena, SchemaId};
    use crate::config::ProtocolConfig;
    use crate::error::ParseError;
    use crate::logger::Logger;
    use crate::lower::lower_document;
    use crate::xml::parse_document;

    fn lower(xml: &str) -> Result<Arena, ParseError> {
        let mut arena = Arena::default();
        let root = parse_document(xml)?;
        lower_document(&mut arena, &ProtocolConfig::default(), &Logger::new(), "t.xml", &root)?;
        Ok(arena)
    }

    #[test]
    fn test_message_id_from_enum() {
        let arena = lower(
            r#"<schema name="S">
                <enum name="MsgId" type="uint8"><validValue name="M1" val="7"/></enum>
                <message name="Msg1" id="MsgId.M1" order="2" sender="client">
                    <int name="F1" type="uint16"/>
                </message>
            </schema>"#,
        )
        .expect("lowered");
        let msg = arena
            .find_message(Some(SchemaId(0)), "Msg1")
            .expect("message");
        let data = arena.message(msg);
        assert_eq!(data.id, 7);
        assert_eq!(data.order, 2);
        assert_eq!(data.sender, crate::types::Sender::Client);
        assert_eq!(data.fields.len(), 1);
        assert_eq!(data.external_ref, "Msg1");
    }

    #[test]
    fn test_copy_fields_and_aliases() {
        let arena = lower(
            r#"<schema name="S">
                <message name="A" id="1">
                    <int name="F1" type="uint8"/>
                    <alias name="Other" field="$F1"/>
                </message>
                <message name="B" id="2" copyFieldsFrom="A" validateMinLength="3">
                    <int name="F2" type="uint16"/>
                </message>
            </schema>"#,
        )
        .expect("lowered");
        let b = arena.find_message(Some(SchemaId(0)), "B").expect("message");
        let data = arena.message(b);
        assert_eq!(data.fields.len(), 2);
        assert_eq!(data.aliases.len(), 1);
        assert_eq!(data.validate_min_length, Some(3));

        let err = lower(
            r#"<schema name="S"><message name="A" id="1" validateMinLength="2"><int name="F" type="uint8"/></message></schema>"#,
        )
        .expect_err("length mismatch");
        assert!(matches!(err.root(), ParseError::Validation { .. }));
    }

    #[test]
    fn test_copied_fields_follow_message_versions() {
        let arena = lower(
            r#"<schema name="S" version="3">
                <message name="A" id="1">
                    <int name="F1" type="uint8" validCheckVersion="true" validRange="[0, 4]"/>
                </message>
                <message name="B" id="2" copyFieldsFrom="A" sinceVersion="2"/>
            </schema>"#,
        )
        .expect("lowered");
        let b = arena.find_message(Some(SchemaId(0)), "B").expect("message");
        let copy = arena.field(arena.message(b).fields[0]);
        assert_eq!(copy.common.since_version, 2);
        let crate::field::FieldPayload::Int(f) = &copy.payload else {
            panic!("int expected");
        };
        assert_eq!(f.valid_ranges[0].since_version, 2);

        let a = arena.find_message(Some(SchemaId(0)), "A").expect("message");
        assert_eq!(arena.field(arena.message(a).fields[0]).common.since_version, 0);
    }

    #[test]
    fn test_message_conditions() {
        lower(
            r#"<schema name="S">
                <interface name="I"><int name="Flags" type="uint8"/></interface>
                <message name="M" id="1" readCond="%Flags != 0">
                    <int name="F" type="uint8"/>
                </message>
            </schema>"#,
        )
        .expect("interface condition");

        let err = lower(
            r#"<schema name="S"><message name="M" id="1" validCond="$Missing = 0"><int name="F" type="uint8"/></message></schema>"#,
        )
        .expect_err("unknown field");
        assert!(matches!(err.root(), ParseError::InvalidCondition { .. }));
    }

    #[test]
    fn test_duplicate_fields() {
        let err = lower(
            r#"<schema name="S"><message name="M" id="1"><int name="F" type="uint8"/><int name="F" type="uint8"/></message></schema>"#,
        )
        .expect_err("duplicate field");
        assert!(matches!(err.root(), ParseError::DuplicateDefinition { .. }));

        let err = lower(
            r#"<schema name="S"><interface name="I"/><interface name="I"/></schema>"#,
        )
        .expect_err("duplicate interface");
        assert!(matches!(err.root(), ParseError::DuplicateDefinition { .. }));
    }
}
