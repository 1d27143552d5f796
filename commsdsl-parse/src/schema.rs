//! Schema definitions.

use crate::arena::{Arena, NamespaceId, SchemaId};
use crate::common::SCHEMA_REF_PREFIX;
use crate::message::Message;
use crate::interface::Interface;
use crate::namespace::Namespace;
use crate::types::Endian;
use std::fmt;

/// Stored schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SchemaData {
    pub name: String,
    pub description: String,
    pub id: u32,
    pub version: u32,
    pub dsl_version: u32,
    pub endian: Endian,
    pub non_unique_msg_id_allowed: bool,
    pub platforms: Vec<String>,
    pub root: NamespaceId,
}

impl Arena {
    /// Prefixes a schema local reference with `@Schema.`.
    pub fn schema_ref(&self, schema: SchemaId, local: &str) -> String {
        format!("{}{}.{}", SCHEMA_REF_PREFIX, self.schema(schema).name, local)
    }
}

/// Borrowed view of a schema.
#[derive(Clone, Copy)]
pub struct Schema<'a> {
    arena: &'a Arena,
    id: SchemaId,
}

impl<'a> Schema<'a> {
    pub(crate) fn new(arena: &'a Arena, id: SchemaId) -> Self {
        Self { arena, id }
    }

    fn data(&self) -> &'a SchemaData {
        self.arena.schema(self.id)
    }

    /// Arena identifier of the schema.
    #[must_use]
    pub fn id(&self) -> SchemaId {
        self.id
    }

    /// Schema name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    /// Free text description.
    #[must_use]
    pub fn description(&self) -> &'a str {
        &self.data().description
    }

    /// Numeric schema id.
    #[must_use]
    pub fn numeric_id(&self) -> u32 {
        self.data().id
    }

    /// Protocol version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.data().version
    }

    /// Version of the schema language.
    #[must_use]
    pub fn dsl_version(&self) -> u32 {
        self.data().dsl_version
    }

    /// Default byte order.
    #[must_use]
    pub fn endian(&self) -> Endian {
        self.data().endian
    }

    /// Several messages may share a numeric id.
    #[must_use]
    pub fn non_unique_msg_id_allowed(&self) -> bool {
        self.data().non_unique_msg_id_allowed
    }

    /// Names of declared platforms in document order.
    #[must_use]
    pub fn platforms(&self) -> &'a [String] {
        &self.data().platforms
    }

    /// Unnamed namespace holding top level elements.
    #[must_use]
    pub fn root_namespace(&self) -> Namespace<'a> {
        Namespace::new(self.arena, self.data().root)
    }

    /// Top level named namespaces.
    #[must_use]
    pub fn namespaces(&self) -> Vec<Namespace<'a>> {
        self.root_namespace().namespaces()
    }

    /// All messages of the schema, namespaces visited depth first.
    #[must_use]
    pub fn all_messages(&self) -> Vec<Message<'a>> {
        self.arena
            .all_messages(self.id)
            .into_iter()
            .map(|id| Message::new(self.arena, id))
            .collect()
    }

    /// All interfaces of the schema, namespaces visited depth first.
    #[must_use]
    pub fn all_interfaces(&self) -> Vec<Interface<'a>> {
        self.arena
            .all_interfaces(self.id)
            .into_iter()
            .map(|id| Interface::new(self.arena, id))
            .collect()
    }

    /// Prefixes a schema local reference with `@Name.`.
    #[must_use]
    pub fn qualified_ref(&self, local: &str) -> String {
        self.arena.schema_ref(self.id, local)
    }
}

impl PartialEq for Schema<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.arena, other.arena) && self.id == other.id
    }
}

impl Eq for Schema<'_> {}

impl fmt::Debug for Schema<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}
