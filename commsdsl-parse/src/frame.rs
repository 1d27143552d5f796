//! Frame and layer definitions.

use crate::arena::{Arena, FrameId, InterfaceId, LayerId, NamespaceId, SchemaId};
use crate::field::{Field, FieldLink};
use crate::interface::Interface;
use crate::types::{ChecksumAlg, LayerSemantic};
use std::fmt;

/// Kind of a frame layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Layer implemented by the backend.
    Custom,
    /// Synchronisation prefix.
    Sync,
    /// Remaining length.
    Size,
    /// Message id.
    Id,
    /// Value stored in an interface field.
    Value,
    /// Message payload.
    Payload,
    /// Checksum.
    Checksum,
}

impl LayerKind {
    /// All kinds in declaration order.
    pub const ALL: [LayerKind; 7] = [
        Self::Custom,
        Self::Sync,
        Self::Size,
        Self::Id,
        Self::Value,
        Self::Payload,
        Self::Checksum,
    ];

    /// Returns the schema element name of the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Custom => "custom",
            Self::Sync => "sync",
            Self::Size => "size",
            Self::Id => "id",
            Self::Value => "value",
            Self::Payload => "payload",
            Self::Checksum => "checksum",
        }
    }

    /// Parses a kind from a schema element name.
    #[must_use]
    pub fn from_element(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Checksum placement and algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumInfo {
    /// Algorithm.
    pub alg: ChecksumAlg,
    /// Name of a custom algorithm.
    pub alg_name: String,
    /// Layer the checksum calculation starts from.
    pub from: Option<String>,
    /// Layer the checksum calculation reaches up to.
    pub until: Option<String>,
    /// Checksum is verified before the rest is read.
    pub verify_before_read: bool,
}

/// Custom layer attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CustomLayer {
    /// Role of the layer.
    pub semantic: LayerSemantic,
    /// Checksum attributes when acting as checksum.
    pub checksum: Option<ChecksumInfo>,
}

/// Value layer attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValueLayer {
    /// Interfaces holding the value.
    pub interfaces: Vec<InterfaceId>,
    /// Name of the interface field storing the value.
    pub interface_field_name: String,
    /// Value is not serialised.
    pub pseudo: bool,
}

/// Kind specific part of a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerPayload {
    /// Layer implemented by the backend.
    Custom(CustomLayer),
    /// Synchronisation prefix.
    Sync,
    /// Remaining length.
    Size,
    /// Message id.
    Id,
    /// Value stored in an interface field.
    Value(ValueLayer),
    /// Message payload.
    Payload,
    /// Checksum.
    Checksum(ChecksumInfo),
}

impl LayerPayload {
    /// Returns the kind of the payload.
    #[must_use]
    pub fn kind(&self) -> LayerKind {
        match self {
            Self::Custom(_) => LayerKind::Custom,
            Self::Sync => LayerKind::Sync,
            Self::Size => LayerKind::Size,
            Self::Id => LayerKind::Id,
            Self::Value(_) => LayerKind::Value,
            Self::Payload => LayerKind::Payload,
            Self::Checksum(_) => LayerKind::Checksum,
        }
    }

    /// Checksum attributes of checksum layers and custom layers acting as such.
    #[must_use]
    pub fn checksum_info(&self) -> Option<&ChecksumInfo> {
        match self {
            Self::Checksum(info) => Some(info),
            Self::Custom(c) => c.checksum.as_ref(),
            _ => None,
        }
    }
}

/// Stored layer definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LayerData {
    pub name: String,
    pub description: String,
    pub field: Option<FieldLink>,
    pub payload: LayerPayload,
    pub frame: FrameId,
    pub location: String,
}

/// Stored frame definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FrameData {
    pub name: String,
    pub description: String,
    pub layers: Vec<LayerId>,
    pub external_ref: String,
    pub schema: SchemaId,
    pub namespace: NamespaceId,
    pub location: String,
}

/// Borrowed view of a frame layer.
#[derive(Clone, Copy)]
pub struct Layer<'a> {
    arena: &'a Arena,
    id: LayerId,
}

impl<'a> Layer<'a> {
    pub(crate) fn new(arena: &'a Arena, id: LayerId) -> Self {
        Self { arena, id }
    }

    fn data(&self) -> &'a LayerData {
        self.arena.layer(self.id)
    }

    /// Arena identifier of the layer.
    #[must_use]
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Layer name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    /// Free text description.
    #[must_use]
    pub fn description(&self) -> &'a str {
        &self.data().description
    }

    /// Kind of the layer.
    #[must_use]
    pub fn kind(&self) -> LayerKind {
        self.data().payload.kind()
    }

    /// Kind specific properties.
    #[must_use]
    pub fn payload(&self) -> &'a LayerPayload {
        &self.data().payload
    }

    /// Field the layer serialises, absent for payload layers.
    #[must_use]
    pub fn field(&self) -> Option<Field<'a>> {
        self.data()
            .field
            .as_ref()
            .and_then(FieldLink::field_id)
            .map(|id| Field::new(self.arena, id))
    }

    /// Returns true if the layer field is defined inline.
    #[must_use]
    pub fn has_member_field(&self) -> bool {
        self.data().field.as_ref().is_some_and(FieldLink::is_member)
    }

    /// Checksum properties of a checksum layer.
    #[must_use]
    pub fn checksum_info(&self) -> Option<&'a ChecksumInfo> {
        self.data().payload.checksum_info()
    }

    /// Interfaces of a value layer.
    #[must_use]
    pub fn interfaces(&self) -> Vec<Interface<'a>> {
        match &self.data().payload {
            LayerPayload::Value(v) => v
                .interfaces
                .iter()
                .map(|id| Interface::new(self.arena, *id))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Frame the layer belongs to.
    #[must_use]
    pub fn frame_id(&self) -> FrameId {
        self.data().frame
    }

    /// Document location of the definition.
    #[must_use]
    pub fn location(&self) -> &'a str {
        &self.data().location
    }
}

impl PartialEq for Layer<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.arena, other.arena) && self.id == other.id
    }
}

impl Eq for Layer<'_> {}

impl fmt::Debug for Layer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

/// Borrowed view of a frame definition.
#[derive(Clone, Copy)]
pub struct Frame<'a> {
    arena: &'a Arena,
    id: FrameId,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(arena: &'a Arena, id: FrameId) -> Self {
        Self { arena, id }
    }

    fn data(&self) -> &'a FrameData {
        self.arena.frame(self.id)
    }

    /// Arena identifier of the frame.
    #[must_use]
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Frame name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    /// Free text description.
    #[must_use]
    pub fn description(&self) -> &'a str {
        &self.data().description
    }

    /// Layers in document order, outermost first.
    #[must_use]
    pub fn layers(&self) -> Vec<Layer<'a>> {
        self.data()
            .layers
            .iter()
            .map(|id| Layer::new(self.arena, *id))
            .collect()
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

    /// Schema defining the frame.
    #[must_use]
    pub fn schema_id(&self) -> SchemaId {
        self.data().schema
    }

    /// Namespace declaring the frame.
    #[must_use]
    pub fn namespace_id(&self) -> NamespaceId {
        self.data().namespace
    }
}

impl PartialEq for Frame<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.arena, other.arena) && self.id == other.id
    }
}

impl Eq for Frame<'_> {}

impl fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}
