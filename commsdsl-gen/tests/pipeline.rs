//! Schema file to prepared generation graph, end to end.

use commsdsl_gen::{
    GenBackend, GenError, GenFactory, GenNode, Generator, GeneratorConfig, LayerOrderError,
    NodeState, PreparedRanges, VersionGuard,
};
use commsdsl_parse::{ErrorLevel, Field, Frame, Layer, Message, ProtocolConfig};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use tempfile::NamedTempFile;

type Events = Rc<RefCell<Vec<String>>>;

fn schema_file(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(text.as_bytes()).expect("write schema");
    file
}

fn collect_errors(generator: &mut Generator) -> Events {
    let errors = Events::default();
    let sink = Rc::clone(&errors);
    generator.set_error_report_callback(move |level, msg| {
        if level == ErrorLevel::Error {
            sink.borrow_mut().push(msg.to_string());
        }
    });
    errors
}

struct Recorder {
    name: String,
    fail_prepare: bool,
    events: Events,
}

impl GenBackend for Recorder {
    fn prepare(&mut self, _generator: &Generator, _node: GenNode) -> Result<(), GenError> {
        if self.fail_prepare {
            return Err(GenError::backend(format!("cannot prepare {}", self.name)));
        }
        self.events.borrow_mut().push(format!("prepare:{}", self.name));
        Ok(())
    }

    fn write(&self, _generator: &Generator, _node: GenNode) -> Result<(), GenError> {
        self.events.borrow_mut().push(format!("write:{}", self.name));
        Ok(())
    }
}

/// Records messages, fields, frames and layers by name.
struct RecordingFactory {
    events: Events,
    failing: Option<&'static str>,
}

impl RecordingFactory {
    fn recorder(&self, name: &str) -> Box<dyn GenBackend> {
        Box::new(Recorder {
            name: name.to_string(),
            fail_prepare: self.failing == Some(name),
            events: Rc::clone(&self.events),
        })
    }
}

impl GenFactory for RecordingFactory {
    fn create_field(&self, field: Field<'_>) -> Box<dyn GenBackend> {
        self.recorder(field.name())
    }

    fn create_message(&self, message: Message<'_>) -> Box<dyn GenBackend> {
        self.recorder(message.name())
    }

    fn create_frame(&self, frame: Frame<'_>) -> Box<dyn GenBackend> {
        self.recorder(frame.name())
    }

    fn create_layer(&self, layer: Layer<'_>) -> Box<dyn GenBackend> {
        self.recorder(layer.name())
    }
}

fn recording(failing: Option<&'static str>) -> (Generator, Events) {
    let events = Events::default();
    let factory = RecordingFactory {
        events: Rc::clone(&events),
        failing,
    };
    let config = GeneratorConfig::new().with_all_messages_referenced(false);
    (Generator::with_factory(config, Box::new(factory)), events)
}

const FRAMES: &str = r#"<schema name="Frames" version="1">
    <fields>
        <enum name="MsgId" type="uint8" semanticType="messageId">
            <validValue name="Ping" val="1"/>
        </enum>
    </fields>
    <message name="Ping" id="MsgId.Ping">
        <int name="Seq" type="uint16"/>
    </message>
    <frame name="InPlace">
        <sync name="Sync"><int name="SyncField" type="uint16" defaultValue="0xabcd"/></sync>
        <size name="Size"><int name="SizeField" type="uint16"/></size>
        <id name="Id" field="MsgId"/>
        <checksum name="Checksum" alg="crc-16" from="Id"><int name="CsField" type="uint16"/></checksum>
        <payload name="Payload"/>
    </frame>
    <frame name="Moved">
        <sync name="Sync"><int name="MovedSync" type="uint16" defaultValue="0xabcd"/></sync>
        <checksum name="Checksum" alg="crc-16" from="Id"><int name="MovedCs" type="uint16"/></checksum>
        <size name="Size"><int name="MovedSize" type="uint16"/></size>
        <id name="Id" field="MsgId"/>
        <payload name="Payload"/>
    </frame>
</schema>"#;

fn layer_names(generator: &Generator, frame: &str) -> (Vec<String>, usize) {
    let frame = generator.find_frame(frame).expect("frame");
    let node = generator.gen_frame(frame);
    let names = node
        .comms_order()
        .iter()
        .map(|layer| generator.dsl_layer(*layer).name().to_string())
        .collect();
    (names, node.splices())
}

#[test]
fn test_checksum_layer_order() {
    let file = schema_file(FRAMES);
    let mut generator = Generator::new(GeneratorConfig::new());
    generator.prepare(&[file.path()]).expect("prepared");

    let expected = vec!["Sync", "Size", "Id", "Checksum", "Payload"];
    let (order, splices) = layer_names(&generator, "InPlace");
    assert_eq!(order, expected);
    assert_eq!(splices, 0);

    let (order, splices) = layer_names(&generator, "Moved");
    assert_eq!(order, expected);
    assert_eq!(splices, 1);

    let moved = generator.find_frame("Moved").expect("frame");
    let declared: Vec<_> = generator
        .gen_frame(moved)
        .layers()
        .iter()
        .map(|layer| generator.dsl_layer(*layer).name())
        .collect();
    assert_eq!(declared, vec!["Sync", "Checksum", "Size", "Id", "Payload"]);
}

#[test]
fn test_layer_fields_are_referenced() {
    let file = schema_file(FRAMES);
    let mut generator = Generator::new(GeneratorConfig::new().with_all_messages_referenced(false));
    generator.prepare(&[file.path()]).expect("prepared");

    let msg_id = generator.find_field("MsgId").expect("id field");
    assert!(generator.gen_field(msg_id).is_referenced());
    assert!(generator.gen_field(msg_id).status().is_prepared());

    let frame = generator.find_frame("Moved").expect("frame");
    for layer in generator.gen_frame(frame).layers() {
        let layer = generator.gen_layer(*layer);
        assert!(layer.status().is_prepared());
        if let Some(field) = layer.field() {
            assert!(generator.gen_field(field).is_referenced());
        }
    }

    let ping = generator.find_message("Ping").expect("message");
    assert!(!generator.gen_message(ping).is_referenced());
    assert!(!generator.has_any_referenced_message());
}

#[test]
fn test_until_layer_must_be_payload() {
    let file = schema_file(
        r#"<schema name="Bad" version="1">
            <frame name="F">
                <sync name="Sync"><int name="SyncField" type="uint16"/></sync>
                <checksum name="Checksum" alg="sum" until="Size"><int name="CsField" type="uint8"/></checksum>
                <size name="Size"><int name="SizeField" type="uint16"/></size>
                <payload name="Payload"/>
            </frame>
        </schema>"#,
    );
    let mut generator = Generator::new(GeneratorConfig::new());
    let errors = collect_errors(&mut generator);

    let err = generator.prepare(&[file.path()]).expect_err("until size");
    match err {
        GenError::Frame { frame, source } => {
            assert_eq!(frame, "F");
            assert!(matches!(source, LayerOrderError::UntilNotPayload { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(errors.borrow().len(), 1);
    assert!(errors.borrow()[0].contains("Size"));
    assert!(generator.write().is_err());
}

#[test]
fn test_version_gated_valid_ranges() {
    let file = schema_file(
        r#"<schema name="Ranges" version="3">
            <int name="Level" type="uint8" validCheckVersion="true">
                <validRange value="[0, 10]"/>
                <validRange value="[20, 30]" sinceVersion="2"/>
            </int>
        </schema>"#,
    );
    let mut generator = Generator::new(GeneratorConfig::new());
    generator
        .prepare_with(&[file.path()], |g| {
            let level = g.find_field("Level").expect("field");
            g.set_field_referenced(level);
            Ok(())
        })
        .expect("prepared");

    let level = generator.find_field("Level").expect("field");
    let PreparedRanges::Int(groups) = generator.gen_field(level).valid_ranges() else {
        panic!("int ranges expected");
    };
    assert_eq!(groups.independent.len(), 1);
    assert_eq!((groups.independent[0].min, groups.independent[0].max), (0, 10));
    assert_eq!(groups.gated.len(), 1);
    assert_eq!(groups.gated[0].guard, VersionGuard::From(2));
    assert_eq!(groups.gated[0].ranges.len(), 1);
    assert_eq!((groups.gated[0].ranges[0].min, groups.gated[0].ranges[0].max), (20, 30));
    assert!(generator.gen_field(level).is_version_dependent());
}

#[test]
fn test_unresolved_reference_fails() {
    let file = schema_file(
        r#"<schema name="Broken" version="1">
            <message name="Msg" id="1">
                <ref name="R" field="Missing"/>
            </message>
        </schema>"#,
    );
    let mut generator = Generator::new(GeneratorConfig::new());
    let errors = collect_errors(&mut generator);

    let err = generator.prepare(&[file.path()]).expect_err("unresolved");
    assert!(matches!(err, GenError::Parse(_)));
    assert!(!errors.borrow().is_empty());
    assert!(errors.borrow().iter().any(|e| e.contains("Missing")));
    assert!(!generator.is_prepared());
}

const MESSAGES: &str = r#"<schema name="Msgs" version="2">
    <fields>
        <int name="Shared" type="uint16"/>
        <int name="Unused" type="uint16"/>
    </fields>
    <message name="Used" id="1">
        <ref name="S" field="Shared"/>
    </message>
    <message name="Idle" id="2">
        <int name="Local" type="uint8"/>
    </message>
</schema>"#;

#[test]
fn test_only_referenced_nodes_reach_backend() {
    let file = schema_file(MESSAGES);
    let (mut generator, events) = recording(None);
    generator
        .prepare_with(&[file.path()], |g| {
            let used = g.find_message("Used").expect("message");
            g.set_message_referenced(used);
            Ok(())
        })
        .expect("prepared");

    let prepared = events.borrow().clone();
    assert!(prepared.contains(&"prepare:Used".to_string()));
    assert!(prepared.contains(&"prepare:Shared".to_string()));
    assert!(prepared.contains(&"prepare:S".to_string()));
    assert!(!prepared.iter().any(|e| e.ends_with(":Idle")));
    assert!(!prepared.iter().any(|e| e.ends_with(":Local")));
    assert!(!prepared.iter().any(|e| e.ends_with(":Unused")));
    assert!(prepared.iter().all(|e| e.starts_with("prepare:")));

    generator.write().expect("written");
    let all = events.borrow().clone();
    let written: Vec<_> = all[prepared.len()..].to_vec();
    assert!(written.contains(&"write:Used".to_string()));
    assert!(written.contains(&"write:Shared".to_string()));
    assert!(!written.iter().any(|e| e.ends_with(":Idle")));
    assert!(written.iter().all(|e| e.starts_with("write:")));

    let idle = generator.find_message("Idle").expect("message");
    assert_eq!(
        generator.gen_message(idle).status().state(),
        NodeState::Constructed
    );
    let used = generator.find_message("Used").expect("message");
    assert_eq!(generator.gen_message(used).status().state(), NodeState::Written);
}

#[test]
fn test_backend_failure_fails_prepare() {
    let file = schema_file(MESSAGES);
    let (mut generator, _events) = recording(Some("Used"));
    let errors = collect_errors(&mut generator);

    let err = generator
        .prepare_with(&[file.path()], |g| {
            let used = g.find_message("Used").expect("message");
            g.set_message_referenced(used);
            Ok(())
        })
        .expect_err("backend failure");
    assert!(matches!(err, GenError::Backend { .. }));
    assert_eq!(errors.borrow().len(), 1);
    assert!(!generator.is_prepared());
}

#[test]
fn test_multiple_schemas() {
    let base = schema_file(
        r#"<schema name="Base" version="1">
            <int name="Common" type="uint32"/>
            <int name="Other" type="uint32"/>
        </schema>"#,
    );
    let proto = schema_file(
        r#"<schema name="Proto" version="5">
            <message name="Msg" id="1">
                <ref name="C" field="@Base.Common"/>
            </message>
        </schema>"#,
    );
    let config = GeneratorConfig::new()
        .with_protocol(ProtocolConfig::new().with_multiple_schemas(true))
        .with_namespace_override("Base", "base_ns")
        .with_min_remote_version(3);
    let mut generator = Generator::new(config);
    generator
        .prepare(&[base.path(), proto.path()])
        .expect("prepared");

    let schemas: Vec<_> = generator.schema_ids().collect();
    assert_eq!(schemas.len(), 2);
    assert_eq!(generator.protocol_schema(), Some(schemas[1]));
    assert_eq!(generator.current_schema(), Some(schemas[1]));
    assert_eq!(generator.gen_schema(schemas[0]).main_namespace(), "base_ns");
    assert_eq!(generator.gen_schema(schemas[1]).main_namespace(), "Proto");
    assert_eq!(generator.gen_schema(schemas[1]).versions().min_remote, 3);
    assert_eq!(generator.gen_schema(schemas[0]).versions().min_remote, 0);

    let common = generator.find_field("@Base.Common").expect("common");
    let other = generator.find_field("@Base.Other").expect("other");
    assert!(generator.find_field("Common").is_none());
    assert!(generator.gen_field(common).is_referenced());
    assert!(!generator.gen_field(other).is_referenced());

    let msg = generator.find_message("Msg").expect("message");
    let reference = generator.gen_message(msg).fields()[0];
    assert_eq!(generator.gen_field(reference).linked(), &[common]);

    generator.choose_current_schema(schemas[0]);
    assert_eq!(generator.find_field("Common"), Some(common));
    generator.choose_protocol_schema();
    assert!(generator.find_field("Common").is_none());
}
