//! Interface definitions.

use crate::alias::{Alias, AliasData};
use crate::arena::{Arena, FieldId, InterfaceId, NamespaceId, SchemaId};
use crate::field::Field;
use std::fmt;

/// Stored interface definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InterfaceData {
    pub name: String,
    pub description: String,
    pub fields: Vec<FieldId>,
    pub aliases: Vec<AliasData>,
    pub external_ref: String,
    pub schema: SchemaId,
    pub namespace: NamespaceId,
    pub location: String,
}

/// Borrowed view of an interface definition.
#[derive(Clone, Copy)]
pub struct Interface<'a> {
    arena: &'a Arena,
    id: InterfaceId,
}

impl<'a> Interface<'a> {
    pub(crate) fn new(arena: &'a Arena, id: InterfaceId) -> Self {
        Self { arena, id }
    }

    fn data(&self) -> &'a InterfaceData {
        self.arena.interface(self.id)
    }

    /// Arena identifier of the interface.
    #[must_use]
    pub fn id(&self) -> InterfaceId {
        self.id
    }

    /// Interface name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    /// Free text description.
    #[must_use]
    pub fn description(&self) -> &'a str {
        &self.data().description
    }

    /// Fields common to all messages using the interface.
    #[must_use]
    pub fn fields(&self) -> Vec<Field<'a>> {
        self.data()
            .fields
            .iter()
            .map(|id| Field::new(self.arena, *id))
            .collect()
    }

    /// Aliases of interface fields.
    #[must_use]
    pub fn aliases(&self) -> Vec<Alias<'a>> {
        self.data().aliases.iter().map(Alias::new).collect()
    }

    /// Globally unique dotted path.
    #[must_use]
    pub fn external_ref(&self) -> &'a str {
        &self.data().external_ref
    }

    /// Document location of the definition.
    #[must_use]
    pub fn location(&self) -> &'a str {
        &self.data().location
    }

    /// Schema defining the interface.
    #[must_use]
    pub fn schema_id(&self) -> SchemaId {
        self.data().schema
    }

    /// Namespace declaring the interface.
    #[must_use]
    pub fn namespace_id(&self) -> NamespaceId {
        self.data().namespace
    }
}

impl PartialEq for Interface<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.arena, other.arena) && self.id == other.id
    }
}

impl Eq for Interface<'_> {}

impl fmt::Debug for Interface<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}
