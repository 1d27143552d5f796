//! Generation fields.

use crate::arena::{GenFieldId, GenInterfaceId, GenLayerId, GenMessageId, GenNamespaceId};
use crate::backend::{BackendSlot, GenBackend, GenNode};
use crate::error::GenError;
use crate::generator::Generator;
use crate::ordering::{ValidRangeGroups, group_valid_ranges, sort_enum_values, sort_specials};
use crate::state::{NodeStatus, Phase, Step};
use commsdsl_parse::{FieldId, FieldPayload, FieldRefType, NOT_YET_DEPRECATED};

/// Owner of a generation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenFieldParent {
    Namespace(GenNamespaceId),
    Field(GenFieldId),
    Message(GenMessageId),
    Interface(GenInterfaceId),
    Layer(GenLayerId),
}

/// Valid ranges of a numeric field after preparation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PreparedRanges {
    /// Field kind without valid ranges.
    #[default]
    None,
    /// Ranges of an integral field.
    Int(ValidRangeGroups<i128>),
    /// Ranges of a floating point field.
    Float(ValidRangeGroups<f64>),
}

impl PreparedRanges {
    /// Returns true if some range applies to some versions only.
    #[must_use]
    pub fn is_version_dependent(&self) -> bool {
        match self {
            Self::None => false,
            Self::Int(groups) => groups.is_version_dependent(),
            Self::Float(groups) => groups.is_version_dependent(),
        }
    }
}

/// Result of resolving a reference inside a generation field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenFieldRefInfo {
    /// Resolved field, `None` if the reference is invalid.
    pub field: Option<GenFieldId>,
    /// Name of the referenced special, enum value or bit.
    pub value_name: String,
    pub ref_type: FieldRefType,
}

/// Generation counterpart of a parse field.
#[derive(Debug)]
pub struct GenField {
    pub(crate) parse: FieldId,
    pub(crate) parent: GenFieldParent,
    pub(crate) status: NodeStatus,
    pub(crate) members: Vec<GenFieldId>,
    pub(crate) linked: Vec<GenFieldId>,
    pub(crate) special_order: Vec<usize>,
    pub(crate) ranges: PreparedRanges,
    pub(crate) version_dependent: bool,
    pub(crate) backend: BackendSlot,
}

impl GenField {
    fn new(parse: FieldId, parent: GenFieldParent, backend: Box<dyn GenBackend>) -> Self {
        Self {
            parse,
            parent,
            status: NodeStatus::default(),
            members: Vec::new(),
            linked: Vec::new(),
            special_order: Vec::new(),
            ranges: PreparedRanges::None,
            version_dependent: false,
            backend: BackendSlot::new(backend),
        }
    }

    /// Parse definition of the field.
    #[must_use]
    pub fn parse_id(&self) -> FieldId {
        self.parse
    }

    /// Owner of the field.
    #[must_use]
    pub fn parent(&self) -> GenFieldParent {
        self.parent
    }

    /// Lifecycle status of the field.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Returns true if the field is used by a generated element.
    #[must_use]
    pub fn is_referenced(&self) -> bool {
        self.status.is_referenced()
    }

    /// Fields owned by this one, in the order of the parse definition.
    #[must_use]
    pub fn members(&self) -> &[GenFieldId] {
        &self.members
    }

    /// Fields defined elsewhere and used by this one, like a ref target or an
    /// external list element.
    #[must_use]
    pub fn linked(&self) -> &[GenFieldId] {
        &self.linked
    }

    /// Indices into the specials (or enum values) of the parse field in
    /// canonical order. Empty until prepared.
    #[must_use]
    pub fn special_order(&self) -> &[usize] {
        &self.special_order
    }

    /// Valid ranges grouped by version guard. Empty until prepared.
    #[must_use]
    pub fn valid_ranges(&self) -> &PreparedRanges {
        &self.ranges
    }

    /// Field or one of its parts exists in some versions only.
    #[must_use]
    pub fn is_version_dependent(&self) -> bool {
        self.version_dependent
    }
}

fn split_first_segment(reference: &str) -> (&str, &str) {
    reference.split_once('.').unwrap_or((reference, ""))
}

impl Generator {
    /// Creates a field together with every field it owns.
    pub(crate) fn create_field(&mut self, parse: FieldId, parent: GenFieldParent) -> GenFieldId {
        let backend = self.factory.create_field(self.protocol.field(parse));
        let id = self.arena.add_field(GenField::new(parse, parent, backend));
        self.fields_by_parse.insert(parse, id);

        let owned = self.protocol.field(parse).payload().owned_fields();
        let members = owned
            .into_iter()
            .map(|member| self.create_field(member, GenFieldParent::Field(id)))
            .collect();
        self.arena.field_mut(id).members = members;
        id
    }

    /// Resolves the fields used but not owned by `id` and its members.
    pub(crate) fn link_field(&mut self, id: GenFieldId) -> Result<(), GenError> {
        let field = self.protocol.field(self.arena.field(id).parse);
        let owned = field.payload().owned_fields();
        let mut linked = Vec::new();
        for used in field.payload().used_fields() {
            if owned.contains(&used) {
                continue;
            }
            linked.push(self.resolve_external_field(used)?);
        }

        let members = self.arena.field(id).members.clone();
        self.arena.field_mut(id).linked = linked;
        for member in members {
            self.link_field(member)?;
        }
        Ok(())
    }

    /// Looks up the generation field of a namespace level parse field.
    pub(crate) fn resolve_external_field(&self, parse: FieldId) -> Result<GenFieldId, GenError> {
        let target = self.protocol.field(parse);
        let reference = match target.schema_id() {
            Some(schema) => self.protocol.schema(schema).qualified_ref(target.external_ref()),
            None => target.external_ref().to_string(),
        };
        self.find_field(&reference)
            .ok_or_else(|| GenError::internal(format!("field '{reference}' was not created")))
    }

    /// Marks a field and every field it structurally contains as referenced.
    pub fn set_field_referenced(&mut self, id: GenFieldId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let node = self.arena.field_mut(id);
            if !node.status.set_referenced() {
                continue;
            }
            pending.extend(node.members.iter().chain(node.linked.iter()).copied());
        }
    }

    /// Prepares a referenced field; repeated calls do nothing.
    pub(crate) fn prepare_field(&mut self, id: GenFieldId) -> Result<(), GenError> {
        if self.arena.field(id).status.step(Phase::Prepare)? == Step::Skip {
            return Ok(());
        }

        let node = self.arena.field(id);
        let parse = node.parse;
        let children: Vec<GenFieldId> = node.members.iter().chain(&node.linked).copied().collect();
        for child in &children {
            self.prepare_field(*child)?;
        }

        let field = self.protocol.field(parse);
        let mut special_order = Vec::new();
        let mut ranges = PreparedRanges::None;
        match field.payload() {
            FieldPayload::Int(f) => {
                special_order = sort_specials(&f.specials);
                ranges = PreparedRanges::Int(group_valid_ranges(
                    &f.valid_ranges,
                    field.since_version(),
                    field.deprecated_since(),
                    f.valid_check_version,
                ));
            }
            FieldPayload::Float(f) => {
                special_order = sort_specials(&f.specials);
                ranges = PreparedRanges::Float(group_valid_ranges(
                    &f.valid_ranges,
                    field.since_version(),
                    field.deprecated_since(),
                    f.valid_check_version,
                ));
            }
            FieldPayload::Enum(f) => special_order = sort_enum_values(&f.values),
            FieldPayload::Ref(r) => {
                let target = self.protocol.field(r.target);
                if target.is_pseudo() != field.is_pseudo() {
                    return Err(GenError::field(
                        field.name(),
                        "\"pseudo\" of a <ref> field differs from the referenced field",
                    ));
                }
                if target.is_fail_on_invalid() != field.is_fail_on_invalid() {
                    return Err(GenError::field(
                        field.name(),
                        "\"failOnInvalid\" of a <ref> field differs from the referenced field",
                    ));
                }
            }
            _ => {}
        }

        let version_dependent = ranges.is_version_dependent()
            || children.iter().any(|child| {
                let node = self.arena.field(*child);
                let child_field = self.protocol.field(node.parse);
                node.version_dependent
                    || child_field.since_version() > field.since_version()
                    || (child_field.deprecated_since() != NOT_YET_DEPRECATED
                        && child_field.deprecated_since() != field.deprecated_since())
            });

        let node = self.arena.field_mut(id);
        node.special_order = special_order;
        node.ranges = ranges;
        node.version_dependent = version_dependent;

        self.run_prepare_hook(GenNode::Field(id))?;
        self.arena.field_mut(id).status.complete(Phase::Prepare);
        Ok(())
    }

    /// Writes a referenced field followed by its members.
    pub(crate) fn write_field(&mut self, id: GenFieldId) -> Result<(), GenError> {
        if self.arena.field(id).status.step(Phase::Write)? == Step::Skip {
            return Ok(());
        }

        self.run_write_hook(GenNode::Field(id))?;
        self.arena.field_mut(id).status.complete(Phase::Write);
        for member in self.arena.field(id).members.clone() {
            self.write_field(member)?;
        }
        Ok(())
    }

    /// Resolves a dotted reference against the members or named values of a field.
    #[must_use]
    pub fn process_inner_ref(&self, id: GenFieldId, reference: &str) -> GenFieldRefInfo {
        if reference.is_empty() {
            return GenFieldRefInfo {
                field: Some(id),
                value_name: String::new(),
                ref_type: FieldRefType::Field,
            };
        }

        let node = self.arena.field(id);
        let field = self.protocol.field(node.parse);
        let inner = |exists: bool| {
            if !exists {
                return GenFieldRefInfo::default();
            }
            GenFieldRefInfo {
                field: Some(id),
                value_name: reference.to_string(),
                ref_type: FieldRefType::InnerValue,
            }
        };

        match field.payload() {
            FieldPayload::Bitfield(_) | FieldPayload::Bundle(_) | FieldPayload::Variant(_) => {
                self.process_member_ref(&node.members, reference)
            }
            FieldPayload::Int(f) => inner(f.specials.iter().any(|s| s.name == reference)),
            FieldPayload::Float(f) => inner(f.specials.iter().any(|s| s.name == reference)),
            FieldPayload::Enum(f) => inner(f.values.iter().any(|v| v.name == reference)),
            FieldPayload::Set(f) => inner(f.bits.iter().any(|b| b.name == reference)),
            FieldPayload::Ref(_) => node
                .linked
                .first()
                .map(|target| self.process_inner_ref(*target, reference))
                .unwrap_or_default(),
            FieldPayload::Optional(_) => {
                let wrapped = node.members.first().or(node.linked.first());
                self.process_member_ref(wrapped.map(std::slice::from_ref).unwrap_or(&[]), reference)
            }
            _ => GenFieldRefInfo::default(),
        }
    }

    fn process_member_ref(&self, members: &[GenFieldId], reference: &str) -> GenFieldRefInfo {
        let (name, rest) = split_first_segment(reference);
        members
            .iter()
            .find(|m| self.protocol.field(self.arena.field(**m).parse).name() == name)
            .map(|m| self.process_inner_ref(*m, rest))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::PreparedRanges;
    use crate::generator::tests::prepared;
    use commsdsl_parse::FieldRefType;

    const SCHEMA: &str = r#"<schema name="S" version="3">
        <fields>
            <enum name="Kind" type="uint8">
                <validValue name="B" val="2"/>
                <validValue name="A" val="1"/>
            </enum>
            <int name="Level" type="uint8" validCheckVersion="true">
                <validRange value="[0, 10]"/>
                <validRange value="[20, 30]" sinceVersion="2"/>
                <special name="Max" val="255"/>
                <special name="Min" val="0"/>
            </int>
            <bundle name="Pair">
                <ref name="K" field="Kind"/>
                <optional name="Extra" defaultMode="missing">
                    <int name="Value" type="uint16"/>
                </optional>
            </bundle>
            <list name="Levels" element="Level" countPrefix="Level"/>
            <int name="Pseudo" type="uint8" pseudo="true"/>
            <ref name="Wrong" field="Pseudo"/>
        </fields>
        <message name="Msg" id="1">
            <ref name="P" field="Pair"/>
        </message>
    </schema>"#;

    #[test]
    fn test_referenced_propagation() {
        let generator = prepared(SCHEMA, |g| {
            let msg = g.find_message("Msg").expect("message");
            g.set_message_referenced(msg);
            Ok(())
        })
        .expect("prepared");

        let pair = generator.find_field("Pair").expect("pair");
        let kind = generator.find_field("Kind").expect("kind");
        let levels = generator.find_field("Levels").expect("levels");
        assert!(generator.gen_field(pair).is_referenced());
        assert!(generator.gen_field(kind).is_referenced());
        assert!(
            generator
                .gen_field(pair)
                .members()
                .iter()
                .all(|m| generator.gen_field(*m).is_referenced())
        );
        assert!(!generator.gen_field(levels).is_referenced());
        assert!(!generator.gen_field(levels).status().is_prepared());
        assert!(generator.gen_field(kind).status().is_prepared());
    }

    #[test]
    fn test_list_references_element_and_prefix() {
        let generator = prepared(SCHEMA, |g| {
            let levels = g.find_field("Levels").expect("levels");
            g.set_field_referenced(levels);
            g.set_field_referenced(levels);
            Ok(())
        })
        .expect("prepared");

        let levels = generator.find_field("Levels").expect("levels");
        let level = generator.find_field("Level").expect("level");
        assert_eq!(generator.gen_field(levels).linked(), &[level, level]);
        assert!(generator.gen_field(level).is_referenced());
        assert!(generator.gen_field(level).is_version_dependent());
    }

    #[test]
    fn test_specials_and_values_sorted() {
        let generator = prepared(SCHEMA, |g| {
            for name in ["Kind", "Level"] {
                let id = g.find_field(name).expect("field");
                g.set_field_referenced(id);
            }
            Ok(())
        })
        .expect("prepared");

        let kind = generator.find_field("Kind").expect("kind");
        assert_eq!(generator.gen_field(kind).special_order(), &[1, 0]);
        let level = generator.find_field("Level").expect("level");
        assert_eq!(generator.gen_field(level).special_order(), &[1, 0]);
        assert!(generator.gen_field(level).valid_ranges().is_version_dependent());
    }

    #[test]
    fn test_reused_field_in_younger_message() {
        let generator = prepared(
            r#"<schema name="S" version="4">
                <int name="Limit" type="uint8" validCheckVersion="true" validRange="[0, 10]"/>
                <message name="M" id="1" sinceVersion="2">
                    <int name="L" reuse="Limit"/>
                </message>
            </schema>"#,
            |g| {
                let msg = g.find_message("M").expect("message");
                g.set_message_referenced(msg);
                Ok(())
            },
        )
        .expect("prepared");

        let msg = generator.find_message("M").expect("message");
        let field = generator.gen_message(msg).fields()[0];
        let PreparedRanges::Int(groups) = generator.gen_field(field).valid_ranges() else {
            panic!("int ranges expected");
        };
        assert_eq!(groups.independent.len(), 1);
        assert_eq!(groups.independent[0].since_version, 2);
        assert!(groups.gated.is_empty());
        assert!(!generator.gen_field(field).is_version_dependent());
    }

    #[test]
    fn test_ref_pseudo_mismatch_fails() {
        let err = prepared(SCHEMA, |g| {
            let wrong = g.find_field("Wrong").expect("ref");
            g.set_field_referenced(wrong);
            Ok(())
        })
        .expect_err("pseudo mismatch");
        assert!(err.to_string().contains("pseudo"));
    }

    #[test]
    fn test_inner_ref() {
        let generator = prepared(SCHEMA, |_| Ok(())).expect("prepared");
        let pair = generator.find_field("Pair").expect("pair");

        let info = generator.process_inner_ref(pair, "K.A");
        assert_eq!(info.ref_type, FieldRefType::InnerValue);
        assert_eq!(info.value_name, "A");
        assert_eq!(info.field, generator.find_field("Kind"));

        let info = generator.process_inner_ref(pair, "Extra.Value");
        assert_eq!(info.ref_type, FieldRefType::Field);
        let value = info.field.expect("value field");
        assert_eq!(generator.dsl_field(value).name(), "Value");

        let info = generator.process_inner_ref(pair, "K.Missing");
        assert_eq!(info.ref_type, FieldRefType::Invalid);
        assert!(info.field.is_none());
    }
}
