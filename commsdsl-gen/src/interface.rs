//! Generation interfaces.

use crate::arena::{GenFieldId, GenInterfaceId, GenNamespaceId};
use crate::backend::{BackendSlot, GenNode};
use crate::error::GenError;
use crate::field::GenFieldParent;
use crate::generator::Generator;
use crate::state::{NodeStatus, Phase, Step};
use commsdsl_parse::{InterfaceId, SemanticType};

/// Generation counterpart of a parse interface.
#[derive(Debug)]
pub struct GenInterface {
    pub(crate) parse: InterfaceId,
    pub(crate) namespace: GenNamespaceId,
    pub(crate) status: NodeStatus,
    pub(crate) fields: Vec<GenFieldId>,
    pub(crate) backend: BackendSlot,
}

impl GenInterface {
    /// Parse definition of the interface.
    #[must_use]
    pub fn parse_id(&self) -> InterfaceId {
        self.parse
    }

    /// Namespace declaring the interface.
    #[must_use]
    pub fn namespace(&self) -> GenNamespaceId {
        self.namespace
    }

    /// Lifecycle status of the interface.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Returns true if the interface is generated.
    #[must_use]
    pub fn is_referenced(&self) -> bool {
        self.status.is_referenced()
    }

    /// Fields common to all messages using the interface.
    #[must_use]
    pub fn fields(&self) -> &[GenFieldId] {
        &self.fields
    }
}

impl Generator {
    pub(crate) fn create_interface(
        &mut self,
        parse: InterfaceId,
        namespace: GenNamespaceId,
    ) -> GenInterfaceId {
        let interface = self.protocol.interface(parse);
        let backend = self.factory.create_interface(interface);
        let field_ids: Vec<_> = interface.fields().iter().map(|f| f.id()).collect();
        let id = self.arena.add_interface(GenInterface {
            parse,
            namespace,
            status: NodeStatus::default(),
            fields: Vec::new(),
            backend: BackendSlot::new(backend),
        });

        let fields = field_ids
            .into_iter()
            .map(|f| self.create_field(f, GenFieldParent::Interface(id)))
            .collect();
        self.arena.interface_mut(id).fields = fields;
        id
    }

    /// Marks an interface and all its fields as referenced.
    pub fn set_interface_referenced(&mut self, id: GenInterfaceId) {
        if !self.arena.interface_mut(id).status.set_referenced() {
            return;
        }
        for field in self.arena.interface(id).fields.clone() {
            self.set_field_referenced(field);
        }
    }

    /// Returns true if one of the interface fields carries the protocol version.
    #[must_use]
    pub fn interface_has_version(&self, id: GenInterfaceId) -> bool {
        self.arena
            .interface(id)
            .fields
            .iter()
            .any(|f| self.dsl_field(*f).semantic_type() == SemanticType::Version)
    }

    pub(crate) fn prepare_interface(&mut self, id: GenInterfaceId) -> Result<(), GenError> {
        if self.arena.interface(id).status.step(Phase::Prepare)? == Step::Skip {
            return Ok(());
        }

        for field in self.arena.interface(id).fields.clone() {
            self.prepare_field(field)?;
        }
        self.run_prepare_hook(GenNode::Interface(id))?;
        self.arena.interface_mut(id).status.complete(Phase::Prepare);
        Ok(())
    }

    pub(crate) fn write_interface(&mut self, id: GenInterfaceId) -> Result<(), GenError> {
        if self.arena.interface(id).status.step(Phase::Write)? == Step::Skip {
            return Ok(());
        }

        self.run_write_hook(GenNode::Interface(id))?;
        self.arena.interface_mut(id).status.complete(Phase::Write);
        for field in self.arena.interface(id).fields.clone() {
            self.write_field(field)?;
        }
        Ok(())
    }
}
