//! Backend extension points.
//!
//! A backend supplies one [`GenFactory`] to the [`Generator`]. The factory
//! is asked for a [`GenBackend`] per created node; the generator calls the
//! backend hooks after its own preparation of the node and when the node is
//! written.

use crate::arena::{
    GenFieldId, GenFrameId, GenInterfaceId, GenLayerId, GenMessageId, GenNamespaceId, GenSchemaId,
};
use crate::error::GenError;
use crate::generator::Generator;
use commsdsl_parse::{Field, Frame, Interface, Layer, Message, Namespace, Schema};
use std::fmt;

/// Identifier of any generation node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenNode {
    Schema(GenSchemaId),
    Namespace(GenNamespaceId),
    Field(GenFieldId),
    Message(GenMessageId),
    Interface(GenInterfaceId),
    Frame(GenFrameId),
    Layer(GenLayerId),
}

/// Backend specific behaviour of a single node.
pub trait GenBackend {
    /// Called once the generator prepared the node.
    ///
    /// # Errors
    /// A returned error fails the preparation of the node.
    fn prepare(&mut self, generator: &Generator, node: GenNode) -> Result<(), GenError> {
        let _ = (generator, node);
        Ok(())
    }

    /// Emits the output of a prepared and referenced node.
    ///
    /// # Errors
    /// A returned error fails the write phase.
    fn write(&self, generator: &Generator, node: GenNode) -> Result<(), GenError> {
        let _ = (generator, node);
        Ok(())
    }
}

/// Backend without behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl GenBackend for NullBackend {}

/// Creates the backend of every node kind.
pub trait GenFactory {
    fn create_schema(&self, schema: Schema<'_>) -> Box<dyn GenBackend> {
        let _ = schema;
        Box::new(NullBackend)
    }

    fn create_namespace(&self, namespace: Namespace<'_>) -> Box<dyn GenBackend> {
        let _ = namespace;
        Box::new(NullBackend)
    }

    /// Called for every field, members included; dispatch on [`Field::kind`].
    fn create_field(&self, field: Field<'_>) -> Box<dyn GenBackend> {
        let _ = field;
        Box::new(NullBackend)
    }

    fn create_message(&self, message: Message<'_>) -> Box<dyn GenBackend> {
        let _ = message;
        Box::new(NullBackend)
    }

    fn create_interface(&self, interface: Interface<'_>) -> Box<dyn GenBackend> {
        let _ = interface;
        Box::new(NullBackend)
    }

    fn create_frame(&self, frame: Frame<'_>) -> Box<dyn GenBackend> {
        let _ = frame;
        Box::new(NullBackend)
    }

    /// Called for every layer; dispatch on [`Layer::kind`].
    fn create_layer(&self, layer: Layer<'_>) -> Box<dyn GenBackend> {
        let _ = layer;
        Box::new(NullBackend)
    }
}

/// Factory creating [`NullBackend`]s only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFactory;

impl GenFactory for NullFactory {}

/// Backend owned by a node. Empty while one of its hooks runs.
pub(crate) struct BackendSlot(Option<Box<dyn GenBackend>>);

impl BackendSlot {
    pub(crate) fn new(backend: Box<dyn GenBackend>) -> Self {
        Self(Some(backend))
    }

    pub(crate) fn take(&mut self) -> Option<Box<dyn GenBackend>> {
        self.0.take()
    }

    pub(crate) fn restore(&mut self, backend: Box<dyn GenBackend>) {
        self.0 = Some(backend);
    }

    pub(crate) fn get(&self) -> Option<&dyn GenBackend> {
        self.0.as_deref()
    }
}

impl fmt::Debug for BackendSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() {
            "BackendSlot(set)"
        } else {
            "BackendSlot(busy)"
        })
    }
}
