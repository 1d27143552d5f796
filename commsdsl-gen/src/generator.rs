//! Generation driver.
//!
//! The [`Generator`] owns the [`Protocol`] and the generation graph built on
//! top of it. [`Generator::prepare`] parses and validates the schema files,
//! creates a generation node for every parse element, resolves the
//! references between them, computes reachability and prepares every
//! referenced node. [`Generator::write`] then hands every prepared node to
//! its backend.

use crate::arena::{
    GenArena, GenFieldId, GenFrameId, GenInterfaceId, GenLayerId, GenMessageId, GenNamespaceId,
    GenSchemaId,
};
use crate::backend::{BackendSlot, GenFactory, GenNode, NullFactory};
use crate::config::GeneratorConfig;
use crate::error::GenError;
use crate::field::GenField;
use crate::frame::{GenFrame, GenLayer};
use crate::interface::GenInterface;
use crate::message::GenMessage;
use crate::namespace::{Found, GenNamespace, Lookup};
use crate::schema::GenSchema;
use commsdsl_parse::common::split_schema_ref;
use commsdsl_parse::{
    ErrorLevel, Field, FieldId, Frame, Interface, Layer, Logger, Message, Namespace, Protocol,
    Schema,
};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Schema input handed to the protocol.
enum Source<'a> {
    File(&'a Path),
    Text { name: &'a str, text: &'a str },
}

/// Orchestrates preparation and writing of all schemas.
pub struct Generator {
    pub(crate) config: GeneratorConfig,
    pub(crate) protocol: Protocol,
    pub(crate) factory: Box<dyn GenFactory>,
    pub(crate) arena: GenArena,
    pub(crate) fields_by_parse: HashMap<FieldId, GenFieldId>,
    current_schema: Option<GenSchemaId>,
    prepared: bool,
}

impl Generator {
    /// Creates a generator whose nodes have no backend behaviour.
    #[must_use]
    pub fn new(config: GeneratorConfig) -> Self {
        Self::with_factory(config, Box::new(NullFactory))
    }

    /// Creates a generator asking `factory` for the backend of every node.
    #[must_use]
    pub fn with_factory(config: GeneratorConfig, factory: Box<dyn GenFactory>) -> Self {
        let protocol = Protocol::with_config(config.protocol.clone());
        Self {
            config,
            protocol,
            factory,
            arena: GenArena::default(),
            fields_by_parse: HashMap::new(),
            current_schema: None,
            prepared: false,
        }
    }

    /// Replaces the diagnostics sink of the generator and its protocol.
    pub fn set_error_report_callback<F>(&mut self, callback: F)
    where
        F: Fn(ErrorLevel, &str) + 'static,
    {
        self.protocol.set_error_report_callback(callback);
    }

    /// Configuration the generator was created with.
    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Parsed protocol.
    #[must_use]
    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// Diagnostics sink shared with the protocol.
    #[must_use]
    pub fn logger(&self) -> &Logger {
        self.protocol.logger()
    }

    /// Returns true after a successful prepare.
    #[must_use]
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Parses, validates and prepares the given schema files.
    ///
    /// # Errors
    /// Fails on the first parse, validation or preparation error. The error
    /// is reported to the diagnostics sink as well.
    pub fn prepare<P: AsRef<Path>>(&mut self, files: &[P]) -> Result<(), GenError> {
        self.prepare_with(files, |_| Ok(()))
    }

    /// Like [`Generator::prepare`], calling `on_created` once the graph is
    /// built and before any node is prepared. This is where a backend
    /// references the elements it generates code for.
    ///
    /// # Errors
    /// As [`Generator::prepare`], or the error returned by `on_created`.
    pub fn prepare_with<P, F>(&mut self, files: &[P], on_created: F) -> Result<(), GenError>
    where
        P: AsRef<Path>,
        F: FnOnce(&mut Self) -> Result<(), GenError>,
    {
        let sources = files.iter().map(|f| Source::File(f.as_ref())).collect();
        let result = self.prepare_impl(sources, on_created);
        self.report(result)
    }

    /// Prepares schemas given as `(name, text)` pairs instead of files. The
    /// name stands in for the file name in diagnostics.
    ///
    /// # Errors
    /// As [`Generator::prepare`].
    pub fn prepare_sources<N, T>(&mut self, sources: &[(N, T)]) -> Result<(), GenError>
    where
        N: AsRef<str>,
        T: AsRef<str>,
    {
        self.prepare_sources_with(sources, |_| Ok(()))
    }

    /// Text counterpart of [`Generator::prepare_with`].
    ///
    /// # Errors
    /// As [`Generator::prepare_with`].
    pub fn prepare_sources_with<N, T, F>(
        &mut self,
        sources: &[(N, T)],
        on_created: F,
    ) -> Result<(), GenError>
    where
        N: AsRef<str>,
        T: AsRef<str>,
        F: FnOnce(&mut Self) -> Result<(), GenError>,
    {
        let sources = sources
            .iter()
            .map(|(name, text)| Source::Text {
                name: name.as_ref(),
                text: text.as_ref(),
            })
            .collect();
        let result = self.prepare_impl(sources, on_created);
        self.report(result)
    }

    fn prepare_impl<F>(&mut self, sources: Vec<Source<'_>>, on_created: F) -> Result<(), GenError>
    where
        F: FnOnce(&mut Self) -> Result<(), GenError>,
    {
        if self.prepared || !self.arena.schemas.is_empty() {
            return Err(GenError::invalid_state("generator is already prepared"));
        }
        if sources.is_empty() {
            return Err(GenError::invalid_state("no schemas to process"));
        }

        for source in sources {
            match source {
                Source::File(path) => {
                    tracing::info!(file = %path.display(), "parsing schema file");
                    self.protocol.parse_file(path)?;
                }
                Source::Text { name, text } => {
                    tracing::info!(source = name, "parsing schema text");
                    self.protocol.parse_named(name, text)?;
                }
            }
            self.check_warnings()?;
        }
        self.protocol.validate()?;
        self.check_warnings()?;

        self.create_graph()?;
        on_created(self)?;

        for schema in self.schema_ids() {
            self.prepare_schema(schema)?;
        }
        self.check_warnings()?;

        self.prepared = true;
        tracing::info!(
            schemas = self.arena.schemas.len(),
            fields = self.arena.fields.len(),
            messages = self.arena.messages.len(),
            "schemas prepared"
        );
        Ok(())
    }

    fn create_graph(&mut self) -> Result<(), GenError> {
        let parse_ids: Vec<_> = self.protocol.schemas().iter().map(|s| s.id()).collect();
        let count = parse_ids.len();
        for (idx, parse) in parse_ids.into_iter().enumerate() {
            let id = self.create_schema(parse);
            let is_protocol = idx + 1 == count;
            let name = self.protocol.schema(parse).name();
            let overridden = self
                .config
                .namespace_overrides
                .get(name)
                .or_else(|| {
                    is_protocol
                        .then(|| self.config.namespace_overrides.get(""))
                        .flatten()
                })
                .cloned();

            let node = self.arena.schema_mut(id);
            if let Some(ns) = overridden {
                node.main_namespace = ns;
            }
            if is_protocol {
                node.versions.forced = self.config.forced_schema_version;
                node.versions.min_remote = self.config.min_remote_version;
            }
        }

        for schema in self.schema_ids() {
            self.link_schema(schema)?;
        }
        self.choose_protocol_schema();

        if self.config.all_interfaces_referenced_by_default {
            self.reference_all_interfaces();
        }
        if self.config.all_messages_referenced_by_default {
            self.reference_all_messages();
        }
        Ok(())
    }

    /// Writes every prepared node through its backend.
    ///
    /// # Errors
    /// Fails if the generator is not prepared or a backend fails.
    pub fn write(&mut self) -> Result<(), GenError> {
        let result = self.write_impl();
        self.report(result)
    }

    fn write_impl(&mut self) -> Result<(), GenError> {
        if !self.prepared {
            return Err(GenError::invalid_state(
                "write requested before a successful prepare",
            ));
        }

        for schema in self.schema_ids() {
            self.write_schema(schema)?;
        }
        self.check_warnings()
    }

    fn check_warnings(&self) -> Result<(), GenError> {
        let logger = self.protocol.logger();
        if self.config.warn_as_error && logger.had_warning() {
            return Err(GenError::WarningAsError {
                count: logger.warning_count(),
            });
        }
        Ok(())
    }

    fn report(&self, result: Result<(), GenError>) -> Result<(), GenError> {
        match &result {
            // Already reported by the protocol.
            Err(GenError::Parse(_)) | Ok(()) => {}
            Err(err) => self.protocol.logger().error(&err.to_string()),
        }
        result
    }

    /// References every message of every schema existing in its version.
    pub fn reference_all_messages(&mut self) {
        for schema in self.schema_ids() {
            if let Some(root) = self.arena.schema(schema).root {
                self.set_all_messages_referenced(root);
            }
        }
    }

    /// References every interface of every schema.
    pub fn reference_all_interfaces(&mut self) {
        for schema in self.schema_ids() {
            if let Some(root) = self.arena.schema(schema).root {
                self.set_all_interfaces_referenced(root);
            }
        }
    }

    /// Returns true if a message of any schema is referenced.
    #[must_use]
    pub fn has_any_referenced_message(&self) -> bool {
        self.schema_ids().any(|schema| {
            self.arena
                .schema(schema)
                .root
                .is_some_and(|root| self.namespace_has_referenced_message(root))
        })
    }

    /// Generation schemas in parse order.
    pub fn schema_ids(&self) -> impl Iterator<Item = GenSchemaId> + use<> {
        (0..self.arena.schemas.len()).map(GenSchemaId)
    }

    /// Makes `schema` the one unprefixed references resolve against.
    pub fn choose_current_schema(&mut self, schema: GenSchemaId) {
        self.current_schema = Some(schema);
    }

    /// Makes the protocol (last parsed) schema the current one.
    pub fn choose_protocol_schema(&mut self) {
        self.current_schema = self.arena.schemas.len().checked_sub(1).map(GenSchemaId);
    }

    /// Schema unqualified lookups resolve in.
    #[must_use]
    pub fn current_schema(&self) -> Option<GenSchemaId> {
        self.current_schema
    }

    /// Last parsed schema, the one code is generated for.
    #[must_use]
    pub fn protocol_schema(&self) -> Option<GenSchemaId> {
        self.arena.schemas.len().checked_sub(1).map(GenSchemaId)
    }

    /// Finds a schema by name.
    #[must_use]
    pub fn find_schema(&self, name: &str) -> Option<GenSchemaId> {
        self.schema_ids()
            .find(|id| self.dsl_schema(*id).name() == name)
    }

    fn find(&self, reference: &str, kind: Lookup) -> Option<Found> {
        let (schema, path) = split_schema_ref(reference);
        let schema = match schema {
            Some(name) => self.find_schema(name)?,
            None => self.current_schema?,
        };
        let root = self.arena.schema(schema).root?;
        self.lookup_in_namespace(root, path, kind)
    }

    /// Finds a namespace level field by external reference, `@Schema.`
    /// prefixed references included.
    #[must_use]
    pub fn find_field(&self, reference: &str) -> Option<GenFieldId> {
        match self.find(reference, Lookup::Field)? {
            Found::Field(id) => Some(id),
            _ => None,
        }
    }

    /// Finds a message by external reference. See [`Generator::find_field`].
    #[must_use]
    pub fn find_message(&self, reference: &str) -> Option<GenMessageId> {
        match self.find(reference, Lookup::Message)? {
            Found::Message(id) => Some(id),
            _ => None,
        }
    }

    /// Finds an interface by external reference.
    #[must_use]
    pub fn find_interface(&self, reference: &str) -> Option<GenInterfaceId> {
        match self.find(reference, Lookup::Interface)? {
            Found::Interface(id) => Some(id),
            _ => None,
        }
    }

    /// Finds a frame by external reference.
    #[must_use]
    pub fn find_frame(&self, reference: &str) -> Option<GenFrameId> {
        match self.find(reference, Lookup::Frame)? {
            Found::Frame(id) => Some(id),
            _ => None,
        }
    }

    /// Generation field created for a parse field.
    #[must_use]
    pub fn field_of(&self, parse: FieldId) -> Option<GenFieldId> {
        self.fields_by_parse.get(&parse).copied()
    }

    /// Generation node of a field.
    #[must_use]
    pub fn gen_field(&self, id: GenFieldId) -> &GenField {
        self.arena.field(id)
    }

    /// Generation node of a message.
    #[must_use]
    pub fn gen_message(&self, id: GenMessageId) -> &GenMessage {
        self.arena.message(id)
    }

    /// Generation node of an interface.
    #[must_use]
    pub fn gen_interface(&self, id: GenInterfaceId) -> &GenInterface {
        self.arena.interface(id)
    }

    /// Generation node of a frame.
    #[must_use]
    pub fn gen_frame(&self, id: GenFrameId) -> &GenFrame {
        self.arena.frame(id)
    }

    /// Generation node of a layer.
    #[must_use]
    pub fn gen_layer(&self, id: GenLayerId) -> &GenLayer {
        self.arena.layer(id)
    }

    /// Generation node of a namespace.
    #[must_use]
    pub fn gen_namespace(&self, id: GenNamespaceId) -> &GenNamespace {
        self.arena.namespace(id)
    }

    /// Generation node of a schema.
    #[must_use]
    pub fn gen_schema(&self, id: GenSchemaId) -> &GenSchema {
        self.arena.schema(id)
    }

    /// Parse definition of a generation field.
    #[must_use]
    pub fn dsl_field(&self, id: GenFieldId) -> Field<'_> {
        self.protocol.field(self.arena.field(id).parse)
    }

    /// Parse definition of a message node.
    #[must_use]
    pub fn dsl_message(&self, id: GenMessageId) -> Message<'_> {
        self.protocol.message(self.arena.message(id).parse)
    }

    /// Parse definition of an interface node.
    #[must_use]
    pub fn dsl_interface(&self, id: GenInterfaceId) -> Interface<'_> {
        self.protocol.interface(self.arena.interface(id).parse)
    }

    /// Parse definition of a frame node.
    #[must_use]
    pub fn dsl_frame(&self, id: GenFrameId) -> Frame<'_> {
        self.protocol.frame(self.arena.frame(id).parse)
    }

    /// Parse definition of a layer node.
    #[must_use]
    pub fn dsl_layer(&self, id: GenLayerId) -> Layer<'_> {
        self.protocol.layer(self.arena.layer(id).parse)
    }

    /// Parse definition of a namespace node.
    #[must_use]
    pub fn dsl_namespace(&self, id: GenNamespaceId) -> Namespace<'_> {
        self.protocol.namespace(self.arena.namespace(id).parse)
    }

    /// Parse definition of a schema node.
    #[must_use]
    pub fn dsl_schema(&self, id: GenSchemaId) -> Schema<'_> {
        self.protocol.schema(self.arena.schema(id).parse)
    }

    fn slot_mut(&mut self, node: GenNode) -> &mut BackendSlot {
        match node {
            GenNode::Schema(id) => &mut self.arena.schema_mut(id).backend,
            GenNode::Namespace(id) => &mut self.arena.namespace_mut(id).backend,
            GenNode::Field(id) => &mut self.arena.field_mut(id).backend,
            GenNode::Message(id) => &mut self.arena.message_mut(id).backend,
            GenNode::Interface(id) => &mut self.arena.interface_mut(id).backend,
            GenNode::Frame(id) => &mut self.arena.frame_mut(id).backend,
            GenNode::Layer(id) => &mut self.arena.layer_mut(id).backend,
        }
    }

    fn slot(&self, node: GenNode) -> &BackendSlot {
        match node {
            GenNode::Schema(id) => &self.arena.schema(id).backend,
            GenNode::Namespace(id) => &self.arena.namespace(id).backend,
            GenNode::Field(id) => &self.arena.field(id).backend,
            GenNode::Message(id) => &self.arena.message(id).backend,
            GenNode::Interface(id) => &self.arena.interface(id).backend,
            GenNode::Frame(id) => &self.arena.frame(id).backend,
            GenNode::Layer(id) => &self.arena.layer(id).backend,
        }
    }

    /// Runs the prepare hook of the node backend. The backend sees the whole
    /// generator while its own slot is empty.
    pub(crate) fn run_prepare_hook(&mut self, node: GenNode) -> Result<(), GenError> {
        let Some(mut backend) = self.slot_mut(node).take() else {
            return Err(GenError::internal(format!("backend of {node:?} is busy")));
        };
        let result = backend.prepare(self, node);
        self.slot_mut(node).restore(backend);
        result
    }

    pub(crate) fn run_write_hook(&self, node: GenNode) -> Result<(), GenError> {
        match self.slot(node).get() {
            Some(backend) => backend.write(self, node),
            None => Err(GenError::internal(format!("backend of {node:?} is busy"))),
        }
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("config", &self.config)
            .field("schemas", &self.arena.schemas.len())
            .field("fields", &self.arena.fields.len())
            .field("current_schema", &self.current_schema)
            .field("prepared", &self.prepared)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;
    use tempfile::NamedTempFile;

    pub(crate) fn schema_file(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(text.as_bytes()).expect("write schema");
        file
    }

    /// Prepares `text` with nothing referenced by default; `seed` references
    /// what the test needs.
    pub(crate) fn prepared<F>(text: &str, seed: F) -> Result<Generator, GenError>
    where
        F: FnOnce(&mut Generator) -> Result<(), GenError>,
    {
        let config = GeneratorConfig::new()
            .with_all_messages_referenced(false)
            .with_all_interfaces_referenced(false);
        let mut generator = Generator::new(config);
        generator.prepare_sources_with(&[("test.xml", text)], seed)?;
        Ok(generator)
    }

    const SCHEMA: &str = r#"<schema name="Proto" version="4">
        <fields>
            <int name="Version" type="uint8" semanticType="version"/>
            <enum name="MsgId" type="uint8" semanticType="messageId">
                <validValue name="First" val="1"/>
                <validValue name="Second" val="2"/>
            </enum>
        </fields>
        <interface name="Iface">
            <int name="V" type="uint8" semanticType="version"/>
        </interface>
        <ns name="sub">
            <fields>
                <int name="Value" type="uint16"/>
            </fields>
            <message name="First" id="MsgId.First">
                <ref name="F" field="sub.Value"/>
            </message>
        </ns>
        <message name="Second" id="MsgId.Second" sinceVersion="3">
            <int name="F" type="uint8"/>
        </message>
    </schema>"#;

    #[test]
    fn test_prepare_and_write() {
        let file = schema_file(SCHEMA);
        let mut generator = Generator::new(GeneratorConfig::new());
        assert!(generator.write().is_err());

        generator.prepare(&[file.path()]).expect("prepared");
        assert!(generator.is_prepared());
        assert!(generator.has_any_referenced_message());

        let schema = generator.protocol_schema().expect("schema");
        assert!(generator.gen_schema(schema).version_dependent_code());
        assert_eq!(generator.gen_schema(schema).main_namespace(), "Proto");

        let value = generator.find_field("sub.Value").expect("value");
        assert!(generator.gen_field(value).is_referenced());
        assert!(generator.gen_field(value).status().is_prepared());

        generator.write().expect("written");
        generator.write().expect("written twice");
        assert!(generator.prepare(&[file.path()]).is_err());
    }

    #[test]
    fn test_prepare_sources() {
        let mut generator = Generator::new(GeneratorConfig::new());
        generator
            .prepare_sources(&[("proto.xml", SCHEMA)])
            .expect("prepared");
        assert!(generator.is_prepared());
        assert!(generator.find_message("sub.First").is_some());

        let none: [(&str, &str); 0] = [];
        let mut generator = Generator::new(GeneratorConfig::new());
        assert!(matches!(
            generator.prepare_sources(&none),
            Err(GenError::InvalidState { .. })
        ));

        let mut generator = Generator::new(GeneratorConfig::new());
        let err = generator
            .prepare_sources(&[("broken.xml", "<schema name=\"S\">")])
            .expect_err("malformed");
        assert!(matches!(err, GenError::Parse(_)));
        assert!(generator.logger().error_count() > 0);
    }

    #[test]
    fn test_find_with_schema_prefix() {
        let generator = prepared(SCHEMA, |_| Ok(())).expect("prepared");
        assert!(generator.find_message("sub.First").is_some());
        assert!(generator.find_message("@Proto.Second").is_some());
        assert!(generator.find_interface("Iface").is_some());
        assert!(generator.find_field("@Other.Version").is_none());
        assert!(generator.find_field("sub").is_none());
        assert_eq!(
            generator.find_field("@Proto.Version"),
            generator.find_field("Version")
        );

        let root = generator
            .gen_schema(generator.protocol_schema().expect("schema"))
            .root_namespace()
            .expect("root");
        let ids = generator.find_message_id_fields(root);
        assert_eq!(ids, vec![generator.find_field("MsgId").expect("id")]);
        assert!(!generator.has_any_referenced_message());
    }

    #[test]
    fn test_forced_version_skips_newer_messages() {
        let file = schema_file(SCHEMA);
        let config = GeneratorConfig::new()
            .with_forced_schema_version(2)
            .with_version_independent_code(true)
            .with_namespace_override("", "renamed");
        let mut generator = Generator::new(config);
        generator.prepare(&[file.path()]).expect("prepared");

        let schema = generator.protocol_schema().expect("schema");
        assert_eq!(generator.gen_schema(schema).schema_version(), 2);
        assert!(!generator.gen_schema(schema).version_dependent_code());
        assert_eq!(generator.gen_schema(schema).main_namespace(), "renamed");

        let first = generator.find_message("sub.First").expect("first");
        let second = generator.find_message("Second").expect("second");
        assert!(generator.gen_message(first).is_referenced());
        assert!(!generator.gen_message(second).is_referenced());
        assert!(!generator.gen_message(second).status().is_prepared());
    }

    #[test]
    fn test_forced_version_newer_than_schema_fails() {
        let file = schema_file(SCHEMA);
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&errors);
        let mut generator =
            Generator::new(GeneratorConfig::new().with_forced_schema_version(9));
        generator.set_error_report_callback(move |level, msg| {
            if level == ErrorLevel::Error {
                sink.borrow_mut().push(msg.to_string());
            }
        });

        let err = generator.prepare(&[file.path()]).expect_err("too new");
        assert!(matches!(err, GenError::InvalidState { .. }));
        assert_eq!(errors.borrow().len(), 1);
        assert!(!generator.is_prepared());
    }

    #[test]
    fn test_warning_as_error() {
        let text = r#"<schema name="W" version="2">
            <int name="Gone" type="uint8" sinceVersion="1" deprecated="1"/>
        </schema>"#;
        let file = schema_file(text);
        let mut generator = Generator::new(GeneratorConfig::new().with_warn_as_error(true));
        let err = generator.prepare(&[file.path()]).expect_err("warning");
        assert!(matches!(err, GenError::WarningAsError { .. }));

        let mut generator = Generator::new(GeneratorConfig::new());
        generator.prepare(&[file.path()]).expect("warning tolerated");
    }

    #[test]
    fn test_missing_file_fails() {
        let mut generator = Generator::new(GeneratorConfig::new());
        let err = generator
            .prepare(&["/nonexistent/schema.xml"])
            .expect_err("missing file");
        assert!(matches!(err, GenError::Parse(_)));
        assert!(generator.logger().error_count() >= 1);

        let none: [&str; 0] = [];
        assert!(generator.prepare(&none).is_err());
    }
}
