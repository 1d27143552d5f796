//! # CommsDSL Parse
//!
//! CommsDSL schema parser, validator and semantic object model.
//!
//! This crate provides:
//! - XML schema ingestion with structural checks per document
//! - Cross-document lowering, reference resolution and semantic validation
//! - A read-only object model (schemas, namespaces, fields, messages,
//!   interfaces, frames) exposed through borrowed handles
//! - The optional-condition model used by optional fields and messages

mod alias;
mod arena;
pub mod common;
pub mod config;
pub mod error;
mod field;
mod frame;
mod interface;
pub mod logger;
mod lower;
mod message;
mod namespace;
mod opt_cond;
mod props;
mod protocol;
mod schema;
mod structure;
pub mod types;
mod vocab;
pub mod xml;

pub use alias::{Alias, AliasData};
pub use arena::{FieldId, FrameId, InterfaceId, LayerId, MessageId, NamespaceId, SchemaId};
pub use common::NOT_YET_DEPRECATED;
pub use config::ProtocolConfig;
pub use error::ParseError;
pub use field::{
    BitfieldField, BundleField, DataField, EnumField, EnumValue, Field, FieldKind, FieldLink,
    FieldParent, FieldPayload, FieldRefInfo, FieldRefType, FloatField, IntField, ListField,
    OptionalField, RefField, SetBit, SetField, SpecialValue, StringField, ValidRange,
    VariantField,
};
pub use frame::{ChecksumInfo, CustomLayer, Frame, Layer, LayerKind, LayerPayload, ValueLayer};
pub use interface::Interface;
pub use logger::{ErrorLevel, ErrorReportFn, Logger};
pub use message::Message;
pub use namespace::Namespace;
pub use opt_cond::{
    AccessMode, CondData, CondExpr, CondList, CondListType, OperandInfo, OperandType, OptCond,
    OptCondExpr, OptCondKind, OptCondList,
};
pub use protocol::{Protocol, ProtocolState};
pub use schema::Schema;
pub use types::{
    ChecksumAlg, Endian, FloatType, IntType, LayerSemantic, OptionalMode, OverrideType,
    Overrides, SemanticType, Sender,
};
