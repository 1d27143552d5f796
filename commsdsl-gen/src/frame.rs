//! Generation frames and their layers.

use crate::arena::{GenFieldId, GenFrameId, GenLayerId, GenNamespaceId};
use crate::backend::{BackendSlot, GenNode};
use crate::error::GenError;
use crate::field::GenFieldParent;
use crate::generator::Generator;
use crate::layer_order::{LayerEntry, comms_order};
use crate::state::{NodeStatus, Phase, Step};
use commsdsl_parse::{FrameId, LayerId};

/// Generation counterpart of a frame layer.
#[derive(Debug)]
pub struct GenLayer {
    pub(crate) parse: LayerId,
    pub(crate) frame: GenFrameId,
    pub(crate) status: NodeStatus,
    pub(crate) field: Option<GenFieldId>,
    pub(crate) backend: BackendSlot,
}

impl GenLayer {
    /// Parse definition of the layer.
    #[must_use]
    pub fn parse_id(&self) -> LayerId {
        self.parse
    }

    /// Frame the layer belongs to.
    #[must_use]
    pub fn frame(&self) -> GenFrameId {
        self.frame
    }

    /// Lifecycle status of the layer.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Field the layer serialises, defined inline or referenced.
    #[must_use]
    pub fn field(&self) -> Option<GenFieldId> {
        self.field
    }
}

/// Generation counterpart of a frame.
#[derive(Debug)]
pub struct GenFrame {
    pub(crate) parse: FrameId,
    pub(crate) namespace: GenNamespaceId,
    pub(crate) status: NodeStatus,
    pub(crate) layers: Vec<GenLayerId>,
    pub(crate) comms_order: Vec<GenLayerId>,
    pub(crate) splices: usize,
    pub(crate) backend: BackendSlot,
}

impl GenFrame {
    /// Parse definition of the frame.
    #[must_use]
    pub fn parse_id(&self) -> FrameId {
        self.parse
    }

    /// Namespace declaring the frame.
    #[must_use]
    pub fn namespace(&self) -> GenNamespaceId {
        self.namespace
    }

    /// Lifecycle status of the frame. Frames are referenced from creation.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Layers in declaration order.
    #[must_use]
    pub fn layers(&self) -> &[GenLayerId] {
        &self.layers
    }

    /// Layers in wire order. Empty until prepared.
    #[must_use]
    pub fn comms_order(&self) -> &[GenLayerId] {
        &self.comms_order
    }

    /// Number of checksum moves performed to reach the wire order.
    #[must_use]
    pub fn splices(&self) -> usize {
        self.splices
    }
}

impl Generator {
    /// Creates a frame with its layers. Frames are always referenced.
    pub(crate) fn create_frame(&mut self, parse: FrameId, namespace: GenNamespaceId) -> GenFrameId {
        let frame = self.protocol.frame(parse);
        let backend = self.factory.create_frame(frame);
        let layer_ids: Vec<_> = frame.layers().iter().map(|l| l.id()).collect();
        let id = self.arena.add_frame(GenFrame {
            parse,
            namespace,
            status: NodeStatus::referenced(),
            layers: Vec::new(),
            comms_order: Vec::new(),
            splices: 0,
            backend: BackendSlot::new(backend),
        });

        let layers = layer_ids
            .into_iter()
            .map(|layer| self.create_layer(layer, id))
            .collect();
        self.arena.frame_mut(id).layers = layers;
        id
    }

    fn create_layer(&mut self, parse: LayerId, frame: GenFrameId) -> GenLayerId {
        let layer = self.protocol.layer(parse);
        let backend = self.factory.create_layer(layer);
        let member = layer
            .has_member_field()
            .then(|| layer.field().map(|f| f.id()))
            .flatten();
        let id = self.arena.add_layer(GenLayer {
            parse,
            frame,
            status: NodeStatus::referenced(),
            field: None,
            backend: BackendSlot::new(backend),
        });

        if let Some(field) = member {
            let field = self.create_field(field, GenFieldParent::Layer(id));
            self.arena.layer_mut(id).field = Some(field);
        }
        id
    }

    /// Resolves external layer fields and references every layer field.
    pub(crate) fn link_frame(&mut self, id: GenFrameId) -> Result<(), GenError> {
        for layer in self.arena.frame(id).layers.clone() {
            let field = match self.arena.layer(layer).field {
                Some(member) => {
                    self.link_field(member)?;
                    Some(member)
                }
                None => match self.protocol.layer(self.arena.layer(layer).parse).field() {
                    Some(external) => Some(self.resolve_external_field(external.id())?),
                    None => None,
                },
            };

            self.arena.layer_mut(layer).field = field;
            if let Some(field) = field {
                self.set_field_referenced(field);
            }
        }
        Ok(())
    }

    pub(crate) fn prepare_frame(&mut self, id: GenFrameId) -> Result<(), GenError> {
        if self.arena.frame(id).status.step(Phase::Prepare)? == Step::Skip {
            return Ok(());
        }

        let layers = self.arena.frame(id).layers.clone();
        for layer in &layers {
            self.prepare_layer(*layer)?;
        }

        let frame = self.protocol.frame(self.arena.frame(id).parse);
        let dsl_layers = frame.layers();
        let entries: Vec<LayerEntry<'_>> = dsl_layers
            .iter()
            .map(|l| LayerEntry {
                name: l.name(),
                kind: l.kind(),
                checksum: l.checksum_info(),
            })
            .collect();
        let order = comms_order(&entries).map_err(|source| GenError::Frame {
            frame: frame.name().to_string(),
            source,
        })?;

        let node = self.arena.frame_mut(id);
        node.comms_order = order.order.iter().map(|idx| layers[*idx]).collect();
        node.splices = order.splices;

        self.run_prepare_hook(GenNode::Frame(id))?;
        self.arena.frame_mut(id).status.complete(Phase::Prepare);
        Ok(())
    }

    fn prepare_layer(&mut self, id: GenLayerId) -> Result<(), GenError> {
        if self.arena.layer(id).status.step(Phase::Prepare)? == Step::Skip {
            return Ok(());
        }

        if let Some(field) = self.arena.layer(id).field {
            self.prepare_field(field)?;
        }
        self.run_prepare_hook(GenNode::Layer(id))?;
        self.arena.layer_mut(id).status.complete(Phase::Prepare);
        Ok(())
    }

    pub(crate) fn write_frame(&mut self, id: GenFrameId) -> Result<(), GenError> {
        if self.arena.frame(id).status.step(Phase::Write)? == Step::Skip {
            return Ok(());
        }

        self.run_write_hook(GenNode::Frame(id))?;
        self.arena.frame_mut(id).status.complete(Phase::Write);
        for layer in self.arena.frame(id).layers.clone() {
            if self.arena.layer(layer).status.step(Phase::Write)? == Step::Skip {
                continue;
            }
            self.run_write_hook(GenNode::Layer(layer))?;
            self.arena.layer_mut(layer).status.complete(Phase::Write);

            let member = self.arena.layer(layer).field.filter(|f| {
                self.arena.field(*f).parent == GenFieldParent::Layer(layer)
            });
            if let Some(field) = member {
                self.write_field(field)?;
            }
        }
        Ok(())
    }
}
