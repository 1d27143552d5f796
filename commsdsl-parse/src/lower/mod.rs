//! Lowering of schema documents into the arena.
//!
//! Documents are lowered in parse order. Every reference must name an
//! element that was lowered before it, which makes earlier schemas visible
//! to later ones and never the other way around.

mod field;
mod frame;
mod message;

use crate::arena::{Arena, MessageId, NamespaceId, SchemaId};
use crate::common::{NOT_YET_DEPRECATED, is_valid_name};
use crate::config::ProtocolConfig;
use crate::error::ParseError;
use crate::field::{FieldKind, FieldParent};
use crate::logger::Logger;
use crate::namespace::NamespaceData;
use crate::props::Props;
use crate::schema::SchemaData;
use crate::types::Endian;
use crate::vocab::{NAMESPACE_PROPS, PLATFORM_PROPS, SCHEMA_PROPS};
use crate::xml::XmlElement;
use std::collections::BTreeMap;

/// Version interval `[since, deprecated)` of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Interval {
    pub since: u32,
    pub deprecated: u32,
}

impl Interval {
    pub const FULL: Self = Self {
        since: 0,
        deprecated: NOT_YET_DEPRECATED,
    };

    /// Reads `sinceVersion` and `deprecated`, defaulting to the parent interval.
    fn read(props: &Props<'_>, parent: Self) -> Result<Self, ParseError> {
        Ok(Self {
            since: props.u32_opt("sinceVersion")?.unwrap_or(parent.since),
            deprecated: props.u32_opt("deprecated")?.unwrap_or(parent.deprecated),
        })
    }
}

/// Lowers one document into `arena`.
pub(crate) fn lower_document(
    arena: &mut Arena,
    config: &ProtocolConfig,
    logger: &Logger,
    doc: &str,
    root: &XmlElement,
) -> Result<SchemaId, ParseError> {
    let props = Props::collect(root, SCHEMA_PROPS, config).map_err(|e| e.at(root.location(doc)))?;
    let schema = open_schema(arena, &props).map_err(|e| e.at(root.location(doc)))?;

    let mut lowerer = Lowerer {
        arena,
        config,
        logger,
        doc,
        schema,
    };
    let root_ns = lowerer.arena.schema(schema).root;
    lowerer.lower_content(root, &props, root_ns)?;
    Ok(schema)
}

/// Finds the schema a document contributes to, creating it on first use.
fn open_schema(arena: &mut Arena, props: &Props<'_>) -> Result<SchemaId, ParseError> {
    let name = props.required("name")?;
    let version = props.u32_opt("version")?;
    let description = props.get("description");

    if let Some(existing) = arena.schema_by_name(name) {
        let data = arena.schema_mut(existing);
        if version.is_some_and(|v| v != data.version) {
            return Err(ParseError::validation(format!(
                "schema '{name}' is defined with conflicting versions"
            )));
        }
        if data.description.is_empty() {
            data.description = description.unwrap_or_default().to_string();
        }
        return Ok(existing);
    }

    let schema = SchemaId(arena.schemas.len());
    let root = arena.add_namespace(NamespaceData::new("", schema, None));
    let id = arena.add_schema(SchemaData {
        name: name.to_string(),
        description: description.unwrap_or_default().to_string(),
        id: props.u32_opt("id")?.unwrap_or(0),
        version: version.unwrap_or(0),
        dsl_version: props.u32_opt("dslVersion")?.unwrap_or(0),
        endian: props.parse("endian", Endian::parse)?.unwrap_or_default(),
        non_unique_msg_id_allowed: props.bool_or("nonUniqueMsgIdAllowed", false)?,
        platforms: Vec::new(),
        root,
    });
    debug_assert_eq!(id, schema);
    Ok(id)
}

/// Checks invariants spanning all documents of a schema.
pub(crate) fn finish_schema(arena: &Arena, schema: SchemaId) -> Result<(), ParseError> {
    let data = arena.schema(schema);
    let mut by_id: BTreeMap<u64, Vec<MessageId>> = BTreeMap::new();
    for msg in arena.all_messages(schema) {
        by_id.entry(arena.message(msg).id).or_default().push(msg);
    }

    for (id, messages) in by_id {
        if messages.len() < 2 {
            continue;
        }

        let first = arena.message(messages[0]);
        if !data.non_unique_msg_id_allowed {
            let other = arena.message(messages[1]);
            return Err(ParseError::duplicate(
                "message id",
                format!("{id} ({} and {})", first.external_ref, other.external_ref),
            )
            .at(other.location.clone()));
        }

        let mut orders: Vec<u32> = messages
            .iter()
            .map(|m| arena.message(*m).order)
            .collect();
        orders.sort_unstable();
        if orders.windows(2).any(|w| w[0] == w[1]) {
            return Err(ParseError::validation(format!(
                "messages with id {id} must have distinct 'order' values"
            ))
            .at(first.location.clone()));
        }
    }
    Ok(())
}

/// Lowering state of a single document.
pub(crate) struct Lowerer<'c> {
    arena: &'c mut Arena,
    config: &'c ProtocolConfig,
    logger: &'c Logger,
    doc: &'c str,
    schema: SchemaId,
}

impl Lowerer<'_> {
    fn location(&self, elem: &XmlElement) -> String {
        elem.location(self.doc)
    }

    fn props<'x>(&self, elem: &'x XmlElement, known: &[&str]) -> Result<Props<'x>, ParseError> {
        Props::collect(elem, known, self.config)
    }

    fn warn(&self, elem: &XmlElement, msg: &str) {
        self.logger.warning(&format!("{}: {msg}", self.location(elem)));
    }

    /// Children of a container element, without tolerated extra elements.
    fn container_items<'x>(&self, elem: &'x XmlElement) -> Vec<&'x XmlElement> {
        elem.children
            .iter()
            .filter(|c| !self.config.is_extra_name(&c.name))
            .collect()
    }

    fn schema_version(&self) -> u32 {
        self.arena.schema(self.schema).version
    }

    /// Checks the version interval of an element against its parent.
    fn check_versions(
        &self,
        elem: &XmlElement,
        name: &str,
        own: Interval,
        parent: Interval,
    ) -> Result<(), ParseError> {
        let version = self.schema_version();
        if own.since > version {
            return Err(ParseError::version(
                name,
                format!(
                    "sinceVersion ({}) cannot be greater than the schema version ({version})",
                    own.since
                ),
            ));
        }

        if own.since < parent.since {
            return Err(ParseError::version(
                name,
                format!(
                    "sinceVersion ({}) cannot be less than {}",
                    own.since, parent.since
                ),
            ));
        }

        if own.deprecated > parent.deprecated {
            return Err(ParseError::version(
                name,
                format!(
                    "deprecated ({}) cannot be greater than {}",
                    own.deprecated, parent.deprecated
                ),
            ));
        }

        if own.since > own.deprecated {
            return Err(ParseError::version(
                name,
                format!(
                    "deprecated ({}) must not be less than sinceVersion ({})",
                    own.deprecated, own.since
                ),
            ));
        }

        if own.deprecated != NOT_YET_DEPRECATED && own.deprecated > version {
            return Err(ParseError::version(
                name,
                format!(
                    "deprecated ({}) cannot be greater than the schema version ({version})",
                    own.deprecated
                ),
            ));
        }

        if own.since == own.deprecated {
            self.warn(
                elem,
                &format!(
                    "'{name}' is deprecated in version {} it was introduced in",
                    own.since
                ),
            );
        }
        Ok(())
    }

    /// Warns about `removed` given without a deprecation version.
    fn check_removed(&self, elem: &XmlElement, name: &str, removed: bool, own: Interval) {
        if removed && own.deprecated == NOT_YET_DEPRECATED {
            self.warn(
                elem,
                &format!("'{name}' is marked as removed without being deprecated"),
            );
        }
    }

    fn lower_content(
        &mut self,
        elem: &XmlElement,
        props: &Props<'_>,
        ns: NamespaceId,
    ) -> Result<(), ParseError> {
        for child in props.children() {
            match child.name.as_str() {
                "fields" => {
                    for f in self.container_items(child) {
                        self.lower_ns_field(f, ns)?;
                    }
                }
                "messages" => {
                    for m in self.container_items(child) {
                        self.lower_message(m, ns)?;
                    }
                }
                "interfaces" => {
                    for i in self.container_items(child) {
                        self.lower_interface(i, ns)?;
                    }
                }
                "frames" => {
                    for f in self.container_items(child) {
                        self.lower_frame(f, ns)?;
                    }
                }
                "message" => {
                    self.lower_message(child, ns)?;
                }
                "interface" => {
                    self.lower_interface(child, ns)?;
                }
                "frame" => {
                    self.lower_frame(child, ns)?;
                }
                "ns" => self.lower_namespace(child, ns)?,
                "platforms" => {
                    for p in self.container_items(child) {
                        self.lower_platform(p)?;
                    }
                }
                name if FieldKind::from_element(name).is_some() => self.lower_ns_field(child, ns)?,
                _ => {
                    return Err(ParseError::unknown_element(&child.name, &elem.name)
                        .at(self.location(child)));
                }
            }
        }
        Ok(())
    }

    fn lower_namespace(&mut self, elem: &XmlElement, parent: NamespaceId) -> Result<(), ParseError> {
        let props = self
            .props(elem, NAMESPACE_PROPS)
            .map_err(|e| e.at(self.location(elem)))?;
        let name = props.required("name").map_err(|e| e.at(self.location(elem)))?;

        let ns = match self.arena.child_namespace(parent, name) {
            Some(existing) => existing,
            None => {
                let id = self
                    .arena
                    .add_namespace(NamespaceData::new(name, self.schema, Some(parent)));
                self.arena.namespace_mut(parent).namespaces.push(id);
                id
            }
        };

        if let Some(description) = props.get("description") {
            let data = self.arena.namespace_mut(ns);
            if data.description.is_empty() {
                data.description = description.to_string();
            }
        }

        self.lower_content(elem, &props, ns)
    }

    fn lower_platform(&mut self, elem: &XmlElement) -> Result<(), ParseError> {
        let result = (|| {
            let props = self.props(elem, PLATFORM_PROPS)?;
            let name = props.required("name")?;
            if !is_valid_name(name) {
                return Err(ParseError::invalid_attr(&elem.name, "name", name));
            }

            let schema = self.arena.schema_mut(self.schema);
            if schema.platforms.iter().any(|p| p == name) {
                return Err(ParseError::duplicate("platform", name));
            }
            schema.platforms.push(name.to_string());
            Ok(())
        })();
        result.map_err(|e| e.at(self.location(elem)))
    }

    fn lower_ns_field(&mut self, elem: &XmlElement, ns: NamespaceId) -> Result<(), ParseError> {
        let id = self.lower_field(elem, FieldParent::Namespace(ns), Interval::FULL)?;
        let name = &self.arena.field(id).common.name;
        let exists = self
            .arena
            .namespace(ns)
            .fields
            .iter()
            .any(|f| self.arena.field(*f).common.name == *name);
        if exists {
            return Err(ParseError::duplicate("field", name.clone()).at(self.location(elem)));
        }
        self.arena.namespace_mut(ns).fields.push(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    fn lower(docs: &[&str]) -> Result<Arena, ParseError> {
        let mut arena = Arena::default();
        let config = ProtocolConfig::default();
        let logger = Logger::new();
        for (idx, xml) in docs.iter().enumerate() {
            let root = parse_document(xml)?;
            let schema = lower_document(&mut arena, &config, &logger, &format!("doc{idx}"), &root)?;
            finish_schema(&arena, schema)?;
        }
        Ok(arena)
    }

    #[test]
    fn test_namespaces_merge_by_name() {
        let arena = lower(&[
            r#"<schema name="S" version="2"><ns name="a"><int name="F1" type="uint8"/></ns></schema>"#,
            r#"<schema name="S"><ns name="a"><int name="F2" type="uint8"/></ns></schema>"#,
        ])
        .expect("lowered");
        assert_eq!(arena.schemas.len(), 1);
        let schema = SchemaId(0);
        let a = arena
            .child_namespace(arena.schema(schema).root, "a")
            .expect("namespace");
        assert_eq!(arena.namespace(a).fields.len(), 2);
        assert!(arena.find_field(Some(schema), "a.F2").is_some());
    }

    #[test]
    fn test_version_rules() {
        let err = lower(&[r#"<schema name="S" version="1"><int name="F" type="uint8" sinceVersion="2"/></schema>"#])
            .expect_err("since beyond schema version");
        assert!(matches!(err.root(), ParseError::Version { .. }));

        let err = lower(&[
            r#"<schema name="S" version="5"><message name="M" id="1" sinceVersion="2"><int name="F" type="uint8" sinceVersion="1"/></message></schema>"#,
        ])
        .expect_err("member before parent");
        assert!(matches!(err.root(), ParseError::Version { .. }));

        let err = lower(&[
            r#"<schema name="S" version="5"><int name="F" type="uint8" sinceVersion="3" deprecated="2"/></schema>"#,
        ])
        .expect_err("deprecated before since");
        assert!(matches!(err.root(), ParseError::Version { .. }));
    }

    #[test]
    fn test_equal_versions_warn() {
        let mut arena = Arena::default();
        let logger = Logger::new();
        let root = parse_document(
            r#"<schema name="S" version="3"><int name="F" type="uint8" sinceVersion="2" deprecated="2"/></schema>"#,
        )
        .expect("document");
        lower_document(&mut arena, &ProtocolConfig::default(), &logger, "doc", &root)
            .expect("lowered");
        assert_eq!(logger.warning_count(), 1);
    }

    #[test]
    fn test_duplicate_message_ids() {
        let err = lower(&[
            r#"<schema name="S"><message name="A" id="1"/><message name="B" id="1"/></schema>"#,
        ])
        .expect_err("duplicate id");
        assert!(matches!(err.root(), ParseError::DuplicateDefinition { .. }));

        lower(&[
            r#"<schema name="S" nonUniqueMsgIdAllowed="true"><message name="A" id="1"/><message name="B" id="1" order="1"/></schema>"#,
        ])
        .expect("distinct orders");

        let err = lower(&[
            r#"<schema name="S" nonUniqueMsgIdAllowed="true"><message name="A" id="1"/><message name="B" id="1"/></schema>"#,
        ])
        .expect_err("same order");
        assert!(matches!(err.root(), ParseError::Validation { .. }));
    }

    #[test]
    fn test_platforms() {
        let arena = lower(&[
            r#"<schema name="S"><platforms><platform name="p1"/><platform name="p2"/></platforms><message name="M" id="1" platforms="p2"/></schema>"#,
        ])
        .expect("lowered");
        assert_eq!(arena.schema(SchemaId(0)).platforms, vec!["p1", "p2"]);

        let err = lower(&[r#"<schema name="S"><message name="M" id="1" platforms="p3"/></schema>"#])
            .expect_err("unknown platform");
        assert!(matches!(err.root(), ParseError::UnresolvedReference { .. }));
    }
}
