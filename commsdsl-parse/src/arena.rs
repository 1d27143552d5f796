//! Storage of the parsed object graph.
//!
//! All definitions live in flat vectors owned by the [`Protocol`](crate::Protocol).
//! Cross references are plain indices wrapped in typed ids; public handles
//! borrow the arena, so they cannot outlive it.

use crate::common::split_schema_ref;
use crate::field::FieldData;
use crate::frame::{FrameData, LayerData};
use crate::interface::InterfaceData;
use crate::message::MessageData;
use crate::namespace::NamespaceData;
use crate::schema::SchemaData;

macro_rules! arena_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) usize);

        impl $name {
            /// Returns the position of the element inside its arena.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0
            }
        }
    };
}

arena_id!(
    /// Identifier of a field definition.
    FieldId
);
arena_id!(
    /// Identifier of a message definition.
    MessageId
);
arena_id!(
    /// Identifier of an interface definition.
    InterfaceId
);
arena_id!(
    /// Identifier of a frame definition.
    FrameId
);
arena_id!(
    /// Identifier of a frame layer.
    LayerId
);
arena_id!(
    /// Identifier of a namespace.
    NamespaceId
);
arena_id!(
    /// Identifier of a schema.
    SchemaId
);

/// Flat storage of every parsed definition.
#[derive(Debug, Clone, Default)]
pub(crate) struct Arena {
    pub fields: Vec<FieldData>,
    pub messages: Vec<MessageData>,
    pub interfaces: Vec<InterfaceData>,
    pub frames: Vec<FrameData>,
    pub layers: Vec<LayerData>,
    pub namespaces: Vec<NamespaceData>,
    pub schemas: Vec<SchemaData>,
}

impl Arena {
    pub fn field(&self, id: FieldId) -> &FieldData {
        &self.fields[id.0]
    }

    pub fn field_mut(&mut self, id: FieldId) -> &mut FieldData {
        &mut self.fields[id.0]
    }

    pub fn message(&self, id: MessageId) -> &MessageData {
        &self.messages[id.0]
    }

    pub fn message_mut(&mut self, id: MessageId) -> &mut MessageData {
        &mut self.messages[id.0]
    }

    pub fn interface(&self, id: InterfaceId) -> &InterfaceData {
        &self.interfaces[id.0]
    }

    pub fn interface_mut(&mut self, id: InterfaceId) -> &mut InterfaceData {
        &mut self.interfaces[id.0]
    }

    pub fn frame(&self, id: FrameId) -> &FrameData {
        &self.frames[id.0]
    }

    pub fn frame_mut(&mut self, id: FrameId) -> &mut FrameData {
        &mut self.frames[id.0]
    }

    pub fn layer(&self, id: LayerId) -> &LayerData {
        &self.layers[id.0]
    }

    pub fn layer_mut(&mut self, id: LayerId) -> &mut LayerData {
        &mut self.layers[id.0]
    }

    pub fn namespace(&self, id: NamespaceId) -> &NamespaceData {
        &self.namespaces[id.0]
    }

    pub fn namespace_mut(&mut self, id: NamespaceId) -> &mut NamespaceData {
        &mut self.namespaces[id.0]
    }

    pub fn schema(&self, id: SchemaId) -> &SchemaData {
        &self.schemas[id.0]
    }

    pub fn schema_mut(&mut self, id: SchemaId) -> &mut SchemaData {
        &mut self.schemas[id.0]
    }

    pub fn add_field(&mut self, data: FieldData) -> FieldId {
        self.fields.push(data);
        FieldId(self.fields.len() - 1)
    }

    pub fn add_message(&mut self, data: MessageData) -> MessageId {
        self.messages.push(data);
        MessageId(self.messages.len() - 1)
    }

    pub fn add_interface(&mut self, data: InterfaceData) -> InterfaceId {
        self.interfaces.push(data);
        InterfaceId(self.interfaces.len() - 1)
    }

    pub fn add_frame(&mut self, data: FrameData) -> FrameId {
        self.frames.push(data);
        FrameId(self.frames.len() - 1)
    }

    pub fn add_layer(&mut self, data: LayerData) -> LayerId {
        self.layers.push(data);
        LayerId(self.layers.len() - 1)
    }

    pub fn add_namespace(&mut self, data: NamespaceData) -> NamespaceId {
        self.namespaces.push(data);
        NamespaceId(self.namespaces.len() - 1)
    }

    pub fn add_schema(&mut self, data: SchemaData) -> SchemaId {
        self.schemas.push(data);
        SchemaId(self.schemas.len() - 1)
    }

    pub fn schema_ids(&self) -> impl Iterator<Item = SchemaId> + '_ {
        (0..self.schemas.len()).map(SchemaId)
    }

    pub fn schema_by_name(&self, name: &str) -> Option<SchemaId> {
        self.schemas
            .iter()
            .position(|s| s.name == name)
            .map(SchemaId)
    }

    /// Splits a reference into the namespace holding the element and the element name.
    ///
    /// Unprefixed references are resolved against `current`.
    pub fn resolve_path<'r>(
        &self,
        current: Option<SchemaId>,
        reference: &'r str,
    ) -> Option<(NamespaceId, &'r str)> {
        let (schema_name, path) = split_schema_ref(reference);
        let schema = match schema_name {
            Some(name) => self.schema_by_name(name)?,
            None => current?,
        };

        if path.is_empty() {
            return None;
        }

        let mut ns = self.schema(schema).root;
        let mut segments: Vec<&str> = path.split('.').collect();
        let name = segments.pop()?;
        for seg in segments {
            ns = self.child_namespace(ns, seg)?;
        }
        Some((ns, name))
    }

    pub fn child_namespace(&self, parent: NamespaceId, name: &str) -> Option<NamespaceId> {
        self.namespace(parent)
            .namespaces
            .iter()
            .copied()
            .find(|id| self.namespace(*id).name == name)
    }

    pub fn find_field(&self, current: Option<SchemaId>, reference: &str) -> Option<FieldId> {
        let (ns, name) = self.resolve_path(current, reference)?;
        self.namespace(ns)
            .fields
            .iter()
            .copied()
            .find(|id| self.field(*id).common.name == name)
    }

    pub fn find_message(&self, current: Option<SchemaId>, reference: &str) -> Option<MessageId> {
        let (ns, name) = self.resolve_path(current, reference)?;
        self.namespace(ns)
            .messages
            .iter()
            .copied()
            .find(|id| self.message(*id).name == name)
    }

    pub fn find_interface(
        &self,
        current: Option<SchemaId>,
        reference: &str,
    ) -> Option<InterfaceId> {
        let (ns, name) = self.resolve_path(current, reference)?;
        self.namespace(ns)
            .interfaces
            .iter()
            .copied()
            .find(|id| self.interface(*id).name == name)
    }

    pub fn find_frame(&self, current: Option<SchemaId>, reference: &str) -> Option<FrameId> {
        let (ns, name) = self.resolve_path(current, reference)?;
        self.namespace(ns)
            .frames
            .iter()
            .copied()
            .find(|id| self.frame(*id).name == name)
    }

    /// Resolves `Ns.Field.Inner` style references to a field and the inner remainder.
    ///
    /// The longest prefix naming a field wins.
    pub fn find_field_with_inner<'r>(
        &self,
        current: Option<SchemaId>,
        reference: &'r str,
    ) -> Option<(FieldId, &'r str)> {
        if let Some(id) = self.find_field(current, reference) {
            return Some((id, ""));
        }

        let mut split = reference.len();
        while let Some(pos) = reference[..split].rfind('.') {
            if let Some(id) = self.find_field(current, &reference[..pos]) {
                return Some((id, &reference[pos + 1..]));
            }
            split = pos;
        }
        None
    }

    /// Collects all namespaces of a schema, parents before children.
    pub fn all_namespaces(&self, schema: SchemaId) -> Vec<NamespaceId> {
        let mut result = Vec::new();
        let mut pending = vec![self.schema(schema).root];
        while let Some(ns) = pending.pop() {
            result.push(ns);
            pending.extend(self.namespace(ns).namespaces.iter().rev().copied());
        }
        result
    }

    pub fn all_messages(&self, schema: SchemaId) -> Vec<MessageId> {
        self.all_namespaces(schema)
            .into_iter()
            .flat_map(|ns| self.namespace(ns).messages.clone())
            .collect()
    }

    pub fn all_interfaces(&self, schema: SchemaId) -> Vec<InterfaceId> {
        self.all_namespaces(schema)
            .into_iter()
            .flat_map(|ns| self.namespace(ns).interfaces.clone())
            .collect()
    }
}
