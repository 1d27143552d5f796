//! Prelude module for convenient imports.
//!
//! ```ignore
//! use commsdsl::prelude::*;
//! ```

// Parse layer
pub use commsdsl_parse::{
    ErrorLevel, Field, FieldKind, FieldPayload, Frame, Interface, Layer, LayerKind, Message,
    Namespace, ParseError, Protocol, ProtocolConfig, Schema, SemanticType,
};

// Gen layer
pub use commsdsl_gen::{
    GenBackend, GenError, GenFactory, GenNode, Generator, GeneratorConfig, NodeState,
};
