//! # CommsDSL
//!
//! Schema compiler core for CommsDSL binary protocol definitions.
//!
//! CommsDSL describes binary protocols (fields, messages, interfaces and
//! transport frames) in XML. This crate parses and validates such schemas
//! and builds the prepared object graph a code generator works from.
//!
//! ## Features
//!
//! - **Strict validation** - structural checks, reference resolution and
//!   version rules reported through an injectable diagnostics sink
//! - **Multiple schemas** - later schemas reference earlier ones with
//!   `@Schema.` prefixed references
//! - **Lazy reachability** - only elements used by referenced messages and
//!   interfaces are prepared and written
//! - **Backend hooks** - one factory per backend supplies per-node behaviour
//!
//! ## Quick Start
//!
//! ```ignore
//! use commsdsl::prelude::*;
//!
//! let mut generator = Generator::new(GeneratorConfig::new());
//! generator.prepare(&["protocol.xml"])?;
//! generator.write()?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`parse`] - Schema parsing, validation and the read-only object model
//! - [`generation`] - Generation graph, lifecycle and ordering algorithms

pub mod prelude;

/// Schema parsing and validation.
pub mod parse {
    pub use commsdsl_parse::*;
}

/// Generation graph built on top of parsed schemas.
pub mod generation {
    pub use commsdsl_gen::*;
}

pub use commsdsl_gen::{GenError, Generator, GeneratorConfig};
pub use commsdsl_parse::{ErrorLevel, ParseError, Protocol, ProtocolConfig};

/// Installs a `tracing` subscriber printing to stderr, filtered by `RUST_LOG`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_facade_pipeline() {
        init_tracing();
        init_tracing();

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(
            br#"<schema name="Facade" version="1">
                <message name="Ping" id="1">
                    <int name="Seq" type="uint32"/>
                </message>
            </schema>"#,
        )
        .expect("write schema");

        let mut generator = Generator::new(GeneratorConfig::new());
        generator.prepare(&[file.path()]).expect("prepared");
        generator.write().expect("written");

        let ping = generator.find_message("Ping").expect("message");
        assert!(generator.gen_message(ping).is_referenced());
        assert_eq!(generator.dsl_message(ping).numeric_id(), 1);
    }
}
