//! Generation namespaces.

use crate::arena::{
    GenFieldId, GenFrameId, GenInterfaceId, GenMessageId, GenNamespaceId, GenSchemaId,
};
use crate::backend::{BackendSlot, GenNode};
use crate::error::GenError;
use crate::field::GenFieldParent;
use crate::generator::Generator;
use crate::state::{NodeStatus, Phase, Step};
use commsdsl_parse::{FieldKind, NamespaceId, SemanticType};

/// Generation counterpart of a namespace, the root one included.
#[derive(Debug)]
pub struct GenNamespace {
    pub(crate) parse: NamespaceId,
    pub(crate) schema: GenSchemaId,
    pub(crate) parent: Option<GenNamespaceId>,
    pub(crate) status: NodeStatus,
    pub(crate) namespaces: Vec<GenNamespaceId>,
    pub(crate) fields: Vec<GenFieldId>,
    pub(crate) messages: Vec<GenMessageId>,
    pub(crate) interfaces: Vec<GenInterfaceId>,
    pub(crate) frames: Vec<GenFrameId>,
    pub(crate) backend: BackendSlot,
}

impl GenNamespace {
    /// Parse definition of the namespace.
    #[must_use]
    pub fn parse_id(&self) -> NamespaceId {
        self.parse
    }

    /// Schema the namespace belongs to.
    #[must_use]
    pub fn schema(&self) -> GenSchemaId {
        self.schema
    }

    /// Enclosing namespace, `None` for the root one.
    #[must_use]
    pub fn parent(&self) -> Option<GenNamespaceId> {
        self.parent
    }

    /// Lifecycle status of the namespace.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Child namespaces.
    #[must_use]
    pub fn namespaces(&self) -> &[GenNamespaceId] {
        &self.namespaces
    }

    /// Fields declared directly in the namespace.
    #[must_use]
    pub fn fields(&self) -> &[GenFieldId] {
        &self.fields
    }

    /// Messages declared directly in the namespace.
    #[must_use]
    pub fn messages(&self) -> &[GenMessageId] {
        &self.messages
    }

    /// Interfaces declared directly in the namespace.
    #[must_use]
    pub fn interfaces(&self) -> &[GenInterfaceId] {
        &self.interfaces
    }

    /// Frames declared directly in the namespace.
    #[must_use]
    pub fn frames(&self) -> &[GenFrameId] {
        &self.frames
    }
}

/// Kind of element looked up by a dotted path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup {
    Field,
    Message,
    Interface,
    Frame,
}

/// Element found by a dotted path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Found {
    Field(GenFieldId),
    Message(GenMessageId),
    Interface(GenInterfaceId),
    Frame(GenFrameId),
}

impl Generator {
    /// Creates a namespace with everything it declares, nested namespaces first.
    pub(crate) fn create_namespace(
        &mut self,
        parse: NamespaceId,
        schema: GenSchemaId,
        parent: Option<GenNamespaceId>,
    ) -> GenNamespaceId {
        let ns = self.protocol.namespace(parse);
        let backend = self.factory.create_namespace(ns);
        let nested: Vec<_> = ns.namespaces().iter().map(|n| n.id()).collect();
        let fields: Vec<_> = ns.fields().iter().map(|f| f.id()).collect();
        let interfaces: Vec<_> = ns.interfaces().iter().map(|i| i.id()).collect();
        let messages: Vec<_> = ns.messages().iter().map(|m| m.id()).collect();
        let frames: Vec<_> = ns.frames().iter().map(|f| f.id()).collect();

        let id = self.arena.add_namespace(GenNamespace {
            parse,
            schema,
            parent,
            status: NodeStatus::referenced(),
            namespaces: Vec::new(),
            fields: Vec::new(),
            messages: Vec::new(),
            interfaces: Vec::new(),
            frames: Vec::new(),
            backend: BackendSlot::new(backend),
        });

        let namespaces = nested
            .into_iter()
            .map(|n| self.create_namespace(n, schema, Some(id)))
            .collect();
        let fields = fields
            .into_iter()
            .map(|f| self.create_field(f, GenFieldParent::Namespace(id)))
            .collect();
        let interfaces = interfaces
            .into_iter()
            .map(|i| self.create_interface(i, id))
            .collect();
        let messages = messages
            .into_iter()
            .map(|m| self.create_message(m, id))
            .collect();
        let frames = frames.into_iter().map(|f| self.create_frame(f, id)).collect();

        let node = self.arena.namespace_mut(id);
        node.namespaces = namespaces;
        node.fields = fields;
        node.interfaces = interfaces;
        node.messages = messages;
        node.frames = frames;
        id
    }

    /// Resolves every cross reference of the namespace tree.
    pub(crate) fn link_namespace(&mut self, id: GenNamespaceId) -> Result<(), GenError> {
        let node = self.arena.namespace(id);
        let namespaces = node.namespaces.clone();
        let fields = node.fields.clone();
        let interfaces = node.interfaces.clone();
        let messages = node.messages.clone();
        let frames = node.frames.clone();

        for ns in namespaces {
            self.link_namespace(ns)?;
        }

        for field in &fields {
            self.link_field(*field)?;
        }

        for interface in interfaces {
            for field in self.arena.interface(interface).fields.clone() {
                self.link_field(field)?;
            }
        }

        for message in messages {
            for field in self.arena.message(message).fields.clone() {
                self.link_field(field)?;
            }
        }

        for frame in frames {
            self.link_frame(frame)?;
        }

        for field in fields {
            if self.dsl_field(field).is_force_gen() {
                self.set_field_referenced(field);
            }
        }
        Ok(())
    }

    /// Finds an element by a path relative to the namespace, like `sub.Name`.
    pub(crate) fn lookup_in_namespace(
        &self,
        id: GenNamespaceId,
        path: &str,
        kind: Lookup,
    ) -> Option<Found> {
        let node = self.arena.namespace(id);
        if let Some((first, rest)) = path.split_once('.') {
            return node
                .namespaces
                .iter()
                .find(|ns| self.protocol.namespace(self.arena.namespace(**ns).parse).name() == first)
                .and_then(|ns| self.lookup_in_namespace(*ns, rest, kind));
        }

        match kind {
            Lookup::Field => node
                .fields
                .iter()
                .find(|f| self.dsl_field(**f).name() == path)
                .map(|f| Found::Field(*f)),
            Lookup::Message => node
                .messages
                .iter()
                .find(|m| self.protocol.message(self.arena.message(**m).parse).name() == path)
                .map(|m| Found::Message(*m)),
            Lookup::Interface => node
                .interfaces
                .iter()
                .find(|i| self.protocol.interface(self.arena.interface(**i).parse).name() == path)
                .map(|i| Found::Interface(*i)),
            Lookup::Frame => node
                .frames
                .iter()
                .find(|f| self.protocol.frame(self.arena.frame(**f).parse).name() == path)
                .map(|f| Found::Frame(*f)),
        }
    }

    /// References every message existing in the schema version of the namespace.
    pub fn set_all_messages_referenced(&mut self, id: GenNamespaceId) {
        let node = self.arena.namespace(id);
        let schema = node.schema;
        let nested = node.namespaces.clone();
        let messages = node.messages.clone();

        for message in messages {
            let dsl = self.protocol.message(self.arena.message(message).parse);
            let exists = self.arena.schema(schema).does_element_exist(
                dsl.since_version(),
                dsl.deprecated_since(),
                dsl.is_deprecated_removed(),
            );
            if exists {
                self.set_message_referenced(message);
            }
        }

        for ns in nested {
            self.set_all_messages_referenced(ns);
        }
    }

    /// References every interface of the namespace and its children.
    pub fn set_all_interfaces_referenced(&mut self, id: GenNamespaceId) {
        let node = self.arena.namespace(id);
        let nested = node.namespaces.clone();
        for interface in node.interfaces.clone() {
            self.set_interface_referenced(interface);
        }
        for ns in nested {
            self.set_all_interfaces_referenced(ns);
        }
    }

    /// Namespace level fields carrying the numeric message id, nested namespaces included.
    #[must_use]
    pub fn find_message_id_fields(&self, id: GenNamespaceId) -> Vec<GenFieldId> {
        let node = self.arena.namespace(id);
        let mut found: Vec<GenFieldId> = node
            .fields
            .iter()
            .copied()
            .filter(|f| {
                let field = self.dsl_field(*f);
                matches!(field.kind(), FieldKind::Int | FieldKind::Enum)
                    && field.semantic_type() == SemanticType::MessageId
            })
            .collect();
        for ns in &node.namespaces {
            found.extend(self.find_message_id_fields(*ns));
        }
        found
    }

    /// Returns true if the namespace or one of its children has a referenced message.
    #[must_use]
    pub fn namespace_has_referenced_message(&self, id: GenNamespaceId) -> bool {
        let node = self.arena.namespace(id);
        node.messages
            .iter()
            .any(|m| self.arena.message(*m).is_referenced())
            || node
                .namespaces
                .iter()
                .any(|ns| self.namespace_has_referenced_message(*ns))
    }

    pub(crate) fn prepare_namespace(&mut self, id: GenNamespaceId) -> Result<(), GenError> {
        if self.arena.namespace(id).status.step(Phase::Prepare)? == Step::Skip {
            return Ok(());
        }

        let node = self.arena.namespace(id);
        let namespaces = node.namespaces.clone();
        let fields = node.fields.clone();
        let interfaces = node.interfaces.clone();
        let messages = node.messages.clone();
        let frames = node.frames.clone();

        for ns in namespaces {
            self.prepare_namespace(ns)?;
        }
        for field in fields {
            self.prepare_field(field)?;
        }
        for interface in interfaces {
            self.prepare_interface(interface)?;
        }
        for message in messages {
            self.prepare_message(message)?;
        }
        for frame in frames {
            self.prepare_frame(frame)?;
        }

        self.run_prepare_hook(GenNode::Namespace(id))?;
        self.arena.namespace_mut(id).status.complete(Phase::Prepare);
        Ok(())
    }

    pub(crate) fn write_namespace(&mut self, id: GenNamespaceId) -> Result<(), GenError> {
        if self.arena.namespace(id).status.step(Phase::Write)? == Step::Skip {
            return Ok(());
        }

        self.run_write_hook(GenNode::Namespace(id))?;
        self.arena.namespace_mut(id).status.complete(Phase::Write);

        let node = self.arena.namespace(id);
        let namespaces = node.namespaces.clone();
        let fields = node.fields.clone();
        let interfaces = node.interfaces.clone();
        let messages = node.messages.clone();
        let frames = node.frames.clone();

        for ns in namespaces {
            self.write_namespace(ns)?;
        }
        for field in fields {
            self.write_field(field)?;
        }
        for interface in interfaces {
            self.write_interface(interface)?;
        }
        for message in messages {
            self.write_message(message)?;
        }
        for frame in frames {
            self.write_frame(frame)?;
        }
        Ok(())
    }
}
