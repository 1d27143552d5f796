//! Storage of the generation graph.
//!
//! Nodes live in flat vectors owned by the [`Generator`](crate::Generator)
//! and point at each other and at their parse definitions through ids.

use crate::field::GenField;
use crate::frame::{GenFrame, GenLayer};
use crate::interface::GenInterface;
use crate::message::GenMessage;
use crate::namespace::GenNamespace;
use crate::schema::GenSchema;

macro_rules! gen_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) usize);

        impl $name {
            /// Returns the position of the node inside its arena.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0
            }
        }
    };
}

gen_id!(
    /// Identifier of a generation field.
    GenFieldId
);
gen_id!(
    /// Identifier of a generation message.
    GenMessageId
);
gen_id!(
    /// Identifier of a generation interface.
    GenInterfaceId
);
gen_id!(
    /// Identifier of a generation frame.
    GenFrameId
);
gen_id!(
    /// Identifier of a generation layer.
    GenLayerId
);
gen_id!(
    /// Identifier of a generation namespace.
    GenNamespaceId
);
gen_id!(
    /// Identifier of a generation schema.
    GenSchemaId
);

#[derive(Debug, Default)]
pub(crate) struct GenArena {
    pub fields: Vec<GenField>,
    pub messages: Vec<GenMessage>,
    pub interfaces: Vec<GenInterface>,
    pub frames: Vec<GenFrame>,
    pub layers: Vec<GenLayer>,
    pub namespaces: Vec<GenNamespace>,
    pub schemas: Vec<GenSchema>,
}

impl GenArena {
    pub fn add_field(&mut self, node: GenField) -> GenFieldId {
        self.fields.push(node);
        GenFieldId(self.fields.len() - 1)
    }

    pub fn add_message(&mut self, node: GenMessage) -> GenMessageId {
        self.messages.push(node);
        GenMessageId(self.messages.len() - 1)
    }

    pub fn add_interface(&mut self, node: GenInterface) -> GenInterfaceId {
        self.interfaces.push(node);
        GenInterfaceId(self.interfaces.len() - 1)
    }

    pub fn add_frame(&mut self, node: GenFrame) -> GenFrameId {
        self.frames.push(node);
        GenFrameId(self.frames.len() - 1)
    }

    pub fn add_layer(&mut self, node: GenLayer) -> GenLayerId {
        self.layers.push(node);
        GenLayerId(self.layers.len() - 1)
    }

    pub fn add_namespace(&mut self, node: GenNamespace) -> GenNamespaceId {
        self.namespaces.push(node);
        GenNamespaceId(self.namespaces.len() - 1)
    }

    pub fn add_schema(&mut self, node: GenSchema) -> GenSchemaId {
        self.schemas.push(node);
        GenSchemaId(self.schemas.len() - 1)
    }

    pub fn field(&self, id: GenFieldId) -> &GenField {
        &self.fields[id.0]
    }

    pub fn field_mut(&mut self, id: GenFieldId) -> &mut GenField {
        &mut self.fields[id.0]
    }

    pub fn message(&self, id: GenMessageId) -> &GenMessage {
        &self.messages[id.0]
    }

    pub fn message_mut(&mut self, id: GenMessageId) -> &mut GenMessage {
        &mut self.messages[id.0]
    }

    pub fn interface(&self, id: GenInterfaceId) -> &GenInterface {
        &self.interfaces[id.0]
    }

    pub fn interface_mut(&mut self, id: GenInterfaceId) -> &mut GenInterface {
        &mut self.interfaces[id.0]
    }

    pub fn frame(&self, id: GenFrameId) -> &GenFrame {
        &self.frames[id.0]
    }

    pub fn frame_mut(&mut self, id: GenFrameId) -> &mut GenFrame {
        &mut self.frames[id.0]
    }

    pub fn layer(&self, id: GenLayerId) -> &GenLayer {
        &self.layers[id.0]
    }

    pub fn layer_mut(&mut self, id: GenLayerId) -> &mut GenLayer {
        &mut self.layers[id.0]
    }

    pub fn namespace(&self, id: GenNamespaceId) -> &GenNamespace {
        &self.namespaces[id.0]
    }

    pub fn namespace_mut(&mut self, id: GenNamespaceId) -> &mut GenNamespace {
        &mut self.namespaces[id.0]
    }

    pub fn schema(&self, id: GenSchemaId) -> &GenSchema {
        &self.schemas[id.0]
    }

    pub fn schema_mut(&mut self, id: GenSchemaId) -> &mut GenSchema {
        &mut self.schemas[id.0]
    }
}
