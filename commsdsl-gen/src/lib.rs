//! # CommsDSL Gen
//!
//! Generator-facing object model built on top of `commsdsl-parse`.
//!
//! This crate provides:
//! - A generation graph mirroring the parse graph, owned by a [`Generator`]
//! - Reachability tracking so unused elements are never prepared or written
//! - A `Constructed -> Prepared -> Written` lifecycle driven per node
//! - Backend extension points through [`GenFactory`] and [`GenBackend`]
//! - Canonical ordering of special values, version gated valid range
//!   grouping and checksum aware frame layer ordering

mod arena;
pub mod backend;
pub mod config;
pub mod error;
mod field;
mod frame;
pub mod generator;
mod interface;
pub mod layer_order;
mod message;
mod namespace;
pub mod ordering;
mod schema;
pub mod state;

pub use arena::{
    GenFieldId, GenFrameId, GenInterfaceId, GenLayerId, GenMessageId, GenNamespaceId, GenSchemaId,
};
pub use backend::{GenBackend, GenFactory, GenNode, NullBackend, NullFactory};
pub use config::GeneratorConfig;
pub use error::{GenError, LayerOrderError};
pub use field::{GenField, GenFieldParent, GenFieldRefInfo, PreparedRanges};
pub use frame::{GenFrame, GenLayer};
pub use generator::Generator;
pub use interface::GenInterface;
pub use layer_order::{LayerEntry, LayerOrder, comms_order};
pub use message::GenMessage;
pub use namespace::GenNamespace;
pub use ordering::{RangeGroup, ValidRangeGroups, VersionGuard};
pub use schema::{GenSchema, MAX_DSL_VERSION, SchemaVersions};
pub use state::{NodeState, NodeStatus};
