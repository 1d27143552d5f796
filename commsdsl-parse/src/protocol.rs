//! Schema ingestion and validation driver.
//!
//! [`Protocol`] owns every parsed definition. Documents are parsed and
//! structurally checked one at a time; [`Protocol::validate`] then lowers
//! all of them, in parse order, into a fresh object model. Handles returned
//! by the lookup methods borrow the protocol and cannot outlive it.

use crate::arena::{Arena, FieldId, FrameId, InterfaceId, LayerId, MessageId, NamespaceId, SchemaId};
use crate::config::ProtocolConfig;
use crate::error::ParseError;
use crate::field::Field;
use crate::frame::{Frame, Layer};
use crate::interface::Interface;
use crate::logger::{ErrorLevel, Logger};
use crate::lower::{finish_schema, lower_document};
use crate::message::Message;
use crate::namespace::Namespace;
use crate::schema::Schema;
use crate::structure::StructureChecker;
use crate::xml::{XmlElement, parse_document};
use std::path::Path;

const DEFAULT_DOC_NAME: &str = "<input>";

/// Progress of a [`Protocol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolState {
    /// Nothing parsed yet.
    #[default]
    Empty,
    /// Every document so far parsed successfully.
    Parsed,
    /// At least one document failed to parse.
    ParseFailed,
    /// All documents were lowered and validated.
    Validated,
    /// Validation failed; the object model is empty.
    ValidationFailed,
}

/// Parsed document waiting for validation.
#[derive(Debug)]
struct Document {
    name: String,
    schema_name: String,
    root: XmlElement,
}

/// Owner of all parsed schemas.
#[derive(Debug, Default)]
pub struct Protocol {
    config: ProtocolConfig,
    logger: Logger,
    documents: Vec<Document>,
    arena: Arena,
    last_schema: Option<SchemaId>,
    state: ProtocolState,
}

impl Protocol {
    /// Creates a protocol with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ProtocolConfig::default())
    }

    /// Creates a protocol with the given configuration.
    #[must_use]
    pub fn with_config(config: ProtocolConfig) -> Self {
        let mut logger = Logger::new();
        logger.set_min_level(config.min_level);
        Self {
            config,
            logger,
            ..Self::default()
        }
    }

    /// Replaces the diagnostics sink.
    pub fn set_error_report_callback<F>(&mut self, callback: F)
    where
        F: Fn(ErrorLevel, &str) + 'static,
    {
        self.logger.set_callback(callback);
    }

    /// Drops diagnostics below `level`.
    pub fn set_min_level(&mut self, level: ErrorLevel) {
        self.config.min_level = level;
        self.logger.set_min_level(level);
    }

    /// Allows documents to define more than one schema.
    pub fn set_multiple_schemas_enabled(&mut self, enabled: bool) {
        self.config.multiple_schemas_enabled = enabled;
    }

    /// Configuration the protocol was created with.
    #[must_use]
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Diagnostics sink.
    #[must_use]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Current processing state.
    #[must_use]
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Returns true after a successful [`Protocol::validate`].
    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.state == ProtocolState::Validated
    }

    /// Parses a schema document given as text.
    ///
    /// # Errors
    /// Returns the first structural error found; it is also reported at
    /// Error level.
    pub fn parse(&mut self, text: &str) -> Result<(), ParseError> {
        self.parse_named(DEFAULT_DOC_NAME, text)
    }

    /// Parses a schema document, naming it `name` in diagnostics.
    ///
    /// # Errors
    /// Returns the first structural error found.
    pub fn parse_named(&mut self, name: &str, text: &str) -> Result<(), ParseError> {
        let result = self.parse_document(name, text);
        self.state = match (&result, self.state) {
            (Err(_), _) | (Ok(()), ProtocolState::ParseFailed) => ProtocolState::ParseFailed,
            (Ok(()), _) => ProtocolState::Parsed,
        };
        self.report(result)
    }

    /// Reads and parses a schema file.
    ///
    /// # Errors
    /// Returns an IO error if the file cannot be read, otherwise as [`Protocol::parse`].
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<(), ParseError> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                self.state = ProtocolState::ParseFailed;
                let err = ParseError::Io(e).at(path.display().to_string());
                return self.report(Err(err));
            }
        };
        self.parse_named(&path.display().to_string(), &text)
    }

    fn parse_document(&mut self, name: &str, text: &str) -> Result<(), ParseError> {
        tracing::debug!(document = name, "parsing schema document");
        let root = parse_document(text).map_err(|e| e.at(name))?;
        StructureChecker::new(&self.config, name).check_schema(&root)?;

        let schema_name = root.attr("name").unwrap_or_default().to_string();
        if !self.config.multiple_schemas_enabled {
            if let Some(first) = self.documents.first() {
                if first.schema_name != schema_name {
                    return Err(ParseError::structure(format!(
                        "schema name '{schema_name}' differs from '{}'; multiple schemas are not enabled",
                        first.schema_name
                    ))
                    .at(root.location(name)));
                }
            }
        }

        self.documents.push(Document {
            name: name.to_string(),
            schema_name,
            root,
        });
        Ok(())
    }

    /// Lowers all parsed documents and runs the semantic checks.
    ///
    /// # Errors
    /// Returns `InvalidState` when nothing was parsed or parsing failed,
    /// otherwise the first semantic error.
    pub fn validate(&mut self) -> Result<(), ParseError> {
        let result = match self.state {
            ProtocolState::Empty => Err(ParseError::InvalidState {
                message: "no schema document was parsed".to_string(),
            }),
            ProtocolState::ParseFailed => Err(ParseError::InvalidState {
                message: "cannot validate after a failed parse".to_string(),
            }),
            _ => self.lower_all(),
        };

        match result {
            Ok((arena, last)) => {
                self.arena = arena;
                self.last_schema = Some(last);
                self.state = ProtocolState::Validated;
                tracing::debug!(schemas = self.arena.schemas.len(), "schemas validated");
                Ok(())
            }
            Err(err) => {
                if self.state != ProtocolState::ParseFailed && self.state != ProtocolState::Empty {
                    self.state = ProtocolState::ValidationFailed;
                }
                self.arena = Arena::default();
                self.last_schema = None;
                self.report(Err(err))
            }
        }
    }

    fn lower_all(&self) -> Result<(Arena, SchemaId), ParseError> {
        let mut arena = Arena::default();
        let mut lowered = Vec::new();
        for doc in &self.documents {
            let schema = lower_document(&mut arena, &self.config, &self.logger, &doc.name, &doc.root)?;
            if !lowered.contains(&schema) {
                lowered.push(schema);
            }
        }

        for schema in &lowered {
            finish_schema(&arena, *schema)?;
        }

        let last = self
            .documents
            .last()
            .and_then(|doc| arena.schema_by_name(&doc.schema_name))
            .ok_or_else(|| ParseError::InvalidState {
                message: "no schema was lowered".to_string(),
            })?;
        Ok((arena, last))
    }

    fn report(&self, result: Result<(), ParseError>) -> Result<(), ParseError> {
        if let Err(err) = &result {
            self.logger.error(&err.to_string());
        }
        result
    }

    /// All schemas in parse order.
    #[must_use]
    pub fn schemas(&self) -> Vec<Schema<'_>> {
        self.arena
            .schema_ids()
            .map(|id| Schema::new(&self.arena, id))
            .collect()
    }

    /// Schema of the last parsed document.
    #[must_use]
    pub fn last_parsed_schema(&self) -> Option<Schema<'_>> {
        self.last_schema.map(|id| Schema::new(&self.arena, id))
    }

    /// Finds a schema by name.
    #[must_use]
    pub fn schema_by_name(&self, name: &str) -> Option<Schema<'_>> {
        self.arena
            .schema_by_name(name)
            .map(|id| Schema::new(&self.arena, id))
    }

    /// Finds a field by external reference, `@Schema.` prefixes included.
    #[must_use]
    pub fn find_field(&self, reference: &str) -> Option<Field<'_>> {
        self.arena
            .find_field(self.last_schema, reference)
            .map(|id| Field::new(&self.arena, id))
    }

    /// Finds a message by external reference.
    #[must_use]
    pub fn find_message(&self, reference: &str) -> Option<Message<'_>> {
        self.arena
            .find_message(self.last_schema, reference)
            .map(|id| Message::new(&self.arena, id))
    }

    /// Finds an interface by external reference.
    #[must_use]
    pub fn find_interface(&self, reference: &str) -> Option<Interface<'_>> {
        self.arena
            .find_interface(self.last_schema, reference)
            .map(|id| Interface::new(&self.arena, id))
    }

    /// Finds a frame by external reference.
    #[must_use]
    pub fn find_frame(&self, reference: &str) -> Option<Frame<'_>> {
        self.arena
            .find_frame(self.last_schema, reference)
            .map(|id| Frame::new(&self.arena, id))
    }

    /// Handle of a field id obtained from another handle of this protocol.
    #[must_use]
    pub fn field(&self, id: FieldId) -> Field<'_> {
        Field::new(&self.arena, id)
    }

    /// Handle of a message.
    #[must_use]
    pub fn message(&self, id: MessageId) -> Message<'_> {
        Message::new(&self.arena, id)
    }

    /// Handle of an interface.
    #[must_use]
    pub fn interface(&self, id: InterfaceId) -> Interface<'_> {
        Interface::new(&self.arena, id)
    }

    /// Handle of a frame.
    #[must_use]
    pub fn frame(&self, id: FrameId) -> Frame<'_> {
        Frame::new(&self.arena, id)
    }

    /// Handle of a layer.
    #[must_use]
    pub fn layer(&self, id: LayerId) -> Layer<'_> {
        Layer::new(&self.arena, id)
    }

    /// Handle of a namespace.
    #[must_use]
    pub fn namespace(&self, id: NamespaceId) -> Namespace<'_> {
        Namespace::new(&self.arena, id)
    }

    /// Handle of a schema.
    #[must_use]
    pub fn schema(&self, id: SchemaId) -> Schema<'_> {
        Schema::new(&self.arena, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const BASE_SCHEMA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<schema name="Base" version="2" endian="big">
    <fields>
        <enum name="MsgId" type="uint8">
            <validValue name="Msg1" val="1"/>
            <validValue name="Msg2" val="2"/>
        </enum>
    </fields>
    <ns name="common">
        <int name="Counter" type="uint16"/>
    </ns>
    <message name="Msg1" id="MsgId.Msg1">
        <ref name="Count" field="common.Counter"/>
    </message>
</schema>"#;

    const EXTRA_SCHEMA: &str = r#"<schema name="Extra">
    <message name="Msg" id="@Base.MsgId.Msg2">
        <ref name="Count" field="@Base.common.Counter"/>
    </message>
</schema>"#;

    fn collect_errors(protocol: &mut Protocol) -> Rc<RefCell<Vec<String>>> {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&errors);
        protocol.set_error_report_callback(move |level, msg| {
            if level == ErrorLevel::Error {
                sink.borrow_mut().push(msg.to_string());
            }
        });
        errors
    }

    #[test]
    fn test_parse_and_lookup() {
        let mut protocol = Protocol::new();
        protocol.parse(BASE_SCHEMA).expect("parsed");
        protocol.validate().expect("validated");
        assert!(protocol.is_validated());

        let field = protocol.find_field("common.Counter").expect("field");
        assert_eq!(field.external_ref(), "common.Counter");
        assert_eq!(protocol.find_field(field.external_ref()), Some(field));

        let msg = protocol.find_message("Msg1").expect("message");
        assert_eq!(msg.numeric_id(), 1);
        assert_eq!(protocol.last_parsed_schema().map(|s| s.name()), Some("Base"));
        assert!(protocol.find_frame("Missing").is_none());
    }

    #[test]
    fn test_multiple_schemas() {
        let mut protocol = Protocol::new();
        protocol.parse(BASE_SCHEMA).expect("parsed");
        let err = protocol.parse(EXTRA_SCHEMA).expect_err("multiple schemas disabled");
        assert!(matches!(err.root(), ParseError::InvalidStructure { .. }));

        let mut protocol = Protocol::with_config(ProtocolConfig::new().with_multiple_schemas(true));
        protocol.parse_named("base.xml", BASE_SCHEMA).expect("parsed");
        protocol.parse_named("extra.xml", EXTRA_SCHEMA).expect("parsed");
        protocol.validate().expect("validated");
        assert_eq!(protocol.schemas().len(), 2);
        assert_eq!(protocol.last_parsed_schema().map(|s| s.name()), Some("Extra"));
        let msg = protocol.find_message("Msg").expect("message");
        assert_eq!(msg.numeric_id(), 2);
        assert!(protocol.find_field("@Base.common.Counter").is_some());
    }

    #[test]
    fn test_later_schema_not_visible() {
        let mut protocol = Protocol::with_config(ProtocolConfig::new().with_multiple_schemas(true));
        let errors = collect_errors(&mut protocol);
        protocol.parse(EXTRA_SCHEMA).expect("parsed");
        protocol.parse(BASE_SCHEMA).expect("parsed");
        let err = protocol.validate().expect_err("reference to later schema");
        assert!(matches!(err.root(), ParseError::UnresolvedReference { .. }));
        assert_eq!(protocol.state(), ProtocolState::ValidationFailed);
        assert_eq!(errors.borrow().len(), 1);
        assert!(protocol.schemas().is_empty());
    }

    #[test]
    fn test_unresolved_reference_reported() {
        let mut protocol = Protocol::new();
        let errors = collect_errors(&mut protocol);
        protocol
            .parse_named(
                "schema.xml",
                r#"<schema name="S"><message name="M" id="1"><ref name="R" field="Missing"/></message></schema>"#,
            )
            .expect("parsed");
        assert!(protocol.validate().is_err());
        let errors = errors.borrow();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Missing"));
        assert!(errors[0].starts_with("schema.xml:1:"));
    }

    #[test]
    fn test_invalid_states() {
        let mut protocol = Protocol::new();
        let err = protocol.validate().expect_err("nothing parsed");
        assert!(matches!(err, ParseError::InvalidState { .. }));

        assert!(protocol.parse("<schema name=\"S\"><unknown/></schema>").is_err());
        assert_eq!(protocol.state(), ProtocolState::ParseFailed);
        let err = protocol.validate().expect_err("parse failed");
        assert!(matches!(err, ParseError::InvalidState { .. }));
        assert_eq!(protocol.logger().error_count(), 3);
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("schema.xml");
        std::fs::write(&path, BASE_SCHEMA).expect("written");

        let mut protocol = Protocol::new();
        protocol.parse_file(&path).expect("parsed");
        protocol.validate().expect("validated");
        assert!(protocol.find_message("Msg1").is_some());

        let err = protocol
            .parse_file(dir.path().join("missing.xml"))
            .expect_err("missing file");
        assert!(matches!(err.root(), ParseError::Io(_)));
    }
}
