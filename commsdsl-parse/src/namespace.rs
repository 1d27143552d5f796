//! Namespaces grouping schema elements.

use crate::arena::{Arena, FieldId, FrameId, InterfaceId, MessageId, NamespaceId, SchemaId};
use crate::field::Field;
use crate::frame::Frame;
use crate::interface::Interface;
use crate::message::Message;
use std::fmt;

/// Stored namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NamespaceData {
    pub name: String,
    pub description: String,
    pub parent: Option<NamespaceId>,
    pub schema: SchemaId,
    pub namespaces: Vec<NamespaceId>,
    pub fields: Vec<FieldId>,
    pub messages: Vec<MessageId>,
    pub interfaces: Vec<InterfaceId>,
    pub frames: Vec<FrameId>,
}

impl NamespaceData {
    pub fn new(name: impl Into<String>, schema: SchemaId, parent: Option<NamespaceId>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parent,
            schema,
            namespaces: Vec::new(),
            fields: Vec::new(),
            messages: Vec::new(),
            interfaces: Vec::new(),
            frames: Vec::new(),
        }
    }
}

impl Arena {
    /// Dotted path of an element declared directly in `ns`.
    pub fn external_ref_in(&self, ns: NamespaceId, name: &str) -> String {
        let mut parts = vec![name.to_string()];
        let mut current = Some(ns);
        while let Some(id) = current {
            let data = self.namespace(id);
            if !data.name.is_empty() {
                parts.push(data.name.clone());
            }
            current = data.parent;
        }
        parts.reverse();
        parts.join(".")
    }
}

/// Borrowed view of a namespace.
#[derive(Clone, Copy)]
pub struct Namespace<'a> {
    arena: &'a Arena,
    id: NamespaceId,
}

impl<'a> Namespace<'a> {
    pub(crate) fn new(arena: &'a Arena, id: NamespaceId) -> Self {
        Self { arena, id }
    }

    fn data(&self) -> &'a NamespaceData {
        self.arena.namespace(self.id)
    }

    /// Arena identifier of the namespace.
    #[must_use]
    pub fn id(&self) -> NamespaceId {
        self.id
    }

    /// Name, empty for the root namespace of a schema.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    /// Free text description.
    #[must_use]
    pub fn description(&self) -> &'a str {
        &self.data().description
    }

    /// Dotted path of the namespace, empty for the root namespace.
    #[must_use]
    pub fn external_ref(&self) -> String {
        match self.data().parent {
            Some(parent) => self.arena.external_ref_in(parent, self.name()),
            None => String::new(),
        }
    }

    /// Enclosing namespace, `None` for the root one.
    #[must_use]
    pub fn parent(&self) -> Option<Namespace<'a>> {
        self.data().parent.map(|id| Namespace::new(self.arena, id))
    }

    /// Schema the namespace belongs to.
    #[must_use]
    pub fn schema_id(&self) -> SchemaId {
        self.data().schema
    }

    /// Child namespaces.
    #[must_use]
    pub fn namespaces(&self) -> Vec<Namespace<'a>> {
        self.data()
            .namespaces
            .iter()
            .map(|id| Namespace::new(self.arena, *id))
            .collect()
    }

    /// Fields declared directly in the namespace.
    #[must_use]
    pub fn fields(&self) -> Vec<Field<'a>> {
        self.data()
            .fields
            .iter()
            .map(|id| Field::new(self.arena, *id))
            .collect()
    }

    /// Messages declared directly in the namespace.
    #[must_use]
    pub fn messages(&self) -> Vec<Message<'a>> {
        self.data()
            .messages
            .iter()
            .map(|id| Message::new(self.arena, *id))
            .collect()
    }

    /// Interfaces declared directly in the namespace.
    #[must_use]
    pub fn interfaces(&self) -> Vec<Interface<'a>> {
        self.data()
            .interfaces
            .iter()
            .map(|id| Interface::new(self.arena, *id))
            .collect()
    }

    /// Frames declared directly in the namespace.
    #[must_use]
    pub fn frames(&self) -> Vec<Frame<'a>> {
        self.data()
            .frames
            .iter()
            .map(|id| Frame::new(self.arena, *id))
            .collect()
    }
}

impl PartialEq for Namespace<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.arena, other.arena) && self.id == other.id
    }
}

impl Eq for Namespace<'_> {}

impl fmt::Debug for Namespace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}
