//! Generation messages.

use crate::arena::{GenFieldId, GenMessageId, GenNamespaceId};
use crate::backend::{BackendSlot, GenNode};
use crate::error::GenError;
use crate::field::GenFieldParent;
use crate::generator::Generator;
use crate::state::{NodeStatus, Phase, Step};
use commsdsl_parse::MessageId;

/// Generation counterpart of a parse message.
#[derive(Debug)]
pub struct GenMessage {
    pub(crate) parse: MessageId,
    pub(crate) namespace: GenNamespaceId,
    pub(crate) status: NodeStatus,
    pub(crate) fields: Vec<GenFieldId>,
    pub(crate) backend: BackendSlot,
}

impl GenMessage {
    /// Parse definition of the message.
    #[must_use]
    pub fn parse_id(&self) -> MessageId {
        self.parse
    }

    /// Namespace declaring the message.
    #[must_use]
    pub fn namespace(&self) -> GenNamespaceId {
        self.namespace
    }

    /// Lifecycle status of the message.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Returns true if the message is generated.
    #[must_use]
    pub fn is_referenced(&self) -> bool {
        self.status.is_referenced()
    }

    /// Message fields in wire order.
    #[must_use]
    pub fn fields(&self) -> &[GenFieldId] {
        &self.fields
    }
}

impl Generator {
    pub(crate) fn create_message(
        &mut self,
        parse: MessageId,
        namespace: GenNamespaceId,
    ) -> GenMessageId {
        let message = self.protocol.message(parse);
        let backend = self.factory.create_message(message);
        let field_ids: Vec<_> = message.fields().iter().map(|f| f.id()).collect();
        let id = self.arena.add_message(GenMessage {
            parse,
            namespace,
            status: NodeStatus::default(),
            fields: Vec::new(),
            backend: BackendSlot::new(backend),
        });

        let fields = field_ids
            .into_iter()
            .map(|f| self.create_field(f, GenFieldParent::Message(id)))
            .collect();
        self.arena.message_mut(id).fields = fields;
        id
    }

    /// Marks a message and all its fields as referenced.
    pub fn set_message_referenced(&mut self, id: GenMessageId) {
        if !self.arena.message_mut(id).status.set_referenced() {
            return;
        }
        for field in self.arena.message(id).fields.clone() {
            self.set_field_referenced(field);
        }
    }

    pub(crate) fn prepare_message(&mut self, id: GenMessageId) -> Result<(), GenError> {
        if self.arena.message(id).status.step(Phase::Prepare)? == Step::Skip {
            return Ok(());
        }

        for field in self.arena.message(id).fields.clone() {
            self.prepare_field(field)?;
        }
        self.run_prepare_hook(GenNode::Message(id))?;
        self.arena.message_mut(id).status.complete(Phase::Prepare);
        Ok(())
    }

    pub(crate) fn write_message(&mut self, id: GenMessageId) -> Result<(), GenError> {
        if self.arena.message(id).status.step(Phase::Write)? == Step::Skip {
            return Ok(());
        }

        self.run_write_hook(GenNode::Message(id))?;
        self.arena.message_mut(id).status.complete(Phase::Write);
        for field in self.arena.message(id).fields.clone() {
            self.write_field(field)?;
        }
        Ok(())
    }
}
