//! Lowering of frames and their layers.

use super::{Interval, Lowerer};
use crate::arena::{FrameId, LayerId, NamespaceId};
use crate::common::{is_valid_name, split_list};
use crate::error::ParseError;
use crate::field::{FieldKind, FieldLink, FieldParent};
use crate::frame::{
    ChecksumInfo, CustomLayer, FrameData, LayerData, LayerKind, LayerPayload, ValueLayer,
};
use crate::props::Props;
use crate::types::{ChecksumAlg, LayerSemantic};
use crate::vocab::{FRAME_PROPS, layer_props};
use crate::xml::XmlElement;

/// Reads checksum attributes; `from_names` lists accepted spellings of the range start.
fn checksum_info(
    props: &Props<'_>,
    alg_required: bool,
    from_names: &[&str],
    until_names: &[&str],
) -> Result<ChecksumInfo, ParseError> {
    let alg = match props.parse("alg", ChecksumAlg::parse)? {
        Some(alg) => alg,
        None if alg_required => return Err(ParseError::missing_attr(&props.elem().name, "alg")),
        None => ChecksumAlg::Custom,
    };

    let alg_name = props.get("algName").unwrap_or_default().to_string();
    if alg == ChecksumAlg::Custom && alg_required && alg_name.is_empty() {
        return Err(ParseError::missing_attr(&props.elem().name, "algName"));
    }

    let first = |names: &[&str]| names.iter().find_map(|n| props.get(n)).map(str::to_string);
    Ok(ChecksumInfo {
        alg,
        alg_name,
        from: first(from_names),
        until: first(until_names),
        verify_before_read: props.bool_or("verifyBeforeRead", false)?,
    })
}

impl Lowerer<'_> {
    pub(super) fn lower_frame(&mut self, elem: &XmlElement, ns: NamespaceId) -> Result<FrameId, ParseError> {
        self.lower_frame_at(elem, ns)
            .map_err(|e| e.at(self.location(elem)))
    }

    fn lower_frame_at(&mut self, elem: &XmlElement, ns: NamespaceId) -> Result<FrameId, ParseError> {
        let props = self.props(elem, FRAME_PROPS)?;
        let name = props.required("name")?;
        if !is_valid_name(name) {
            return Err(ParseError::invalid_attr(&elem.name, "name", name));
        }
        if self
            .arena
            .namespace(ns)
            .frames
            .iter()
            .any(|f| self.arena.frame(*f).name == name)
        {
            return Err(ParseError::duplicate("frame", name));
        }

        let id = self.arena.add_frame(FrameData {
            name: name.to_string(),
            description: props.get("description").unwrap_or_default().to_string(),
            layers: Vec::new(),
            external_ref: self.arena.external_ref_in(ns, name),
            schema: self.schema,
            namespace: ns,
            location: self.location(elem),
        });

        let mut items = Vec::new();
        for child in props.children() {
            if child.name == "layers" {
                items.extend(self.container_items(child));
            } else {
                items.push(*child);
            }
        }

        let mut layers = Vec::new();
        for item in items {
            let layer = self
                .lower_layer(item, id)
                .map_err(|e| e.at(self.location(item)))?;
            let layer_name = &self.arena.layer(layer).name;
            if layers
                .iter()
                .any(|l| self.arena.layer(*l).name == *layer_name)
            {
                return Err(ParseError::duplicate("layer", layer_name.as_str()).at(self.location(item)));
            }
            layers.push(layer);
        }

        self.check_checksum_refs(&layers)?;
        self.arena.frame_mut(id).layers = layers;
        self.arena.namespace_mut(ns).frames.push(id);
        Ok(id)
    }

    fn lower_layer(&mut self, elem: &XmlElement, frame: FrameId) -> Result<LayerId, ParseError> {
        let kind = LayerKind::from_element(&elem.name)
            .ok_or_else(|| ParseError::unknown_element(&elem.name, "frame"))?;
        let props = self.props(elem, &layer_props(kind))?;
        let name = props.required("name")?;
        if !is_valid_name(name) {
            return Err(ParseError::invalid_attr(&elem.name, "name", name));
        }

        let payload = match kind {
            LayerKind::Custom => {
                let semantic = if props.bool_or("idReplacement", false)? {
                    LayerSemantic::Id
                } else {
                    props
                        .parse("semanticLayerType", LayerSemantic::parse)?
                        .unwrap_or_default()
                };
                let checksum = match semantic {
                    LayerSemantic::Checksum => Some(checksum_info(
                        &props,
                        false,
                        &["from", "checksumFrom"],
                        &["until", "checksumUntil"],
                    )?),
                    _ => None,
                };
                LayerPayload::Custom(CustomLayer { semantic, checksum })
            }
            LayerKind::Sync => LayerPayload::Sync,
            LayerKind::Size => LayerPayload::Size,
            LayerKind::Id => LayerPayload::Id,
            LayerKind::Value => LayerPayload::Value(self.value_layer(&props)?),
            LayerKind::Payload => LayerPayload::Payload,
            LayerKind::Checksum => {
                LayerPayload::Checksum(checksum_info(&props, true, &["from"], &["until"])?)
            }
        };

        let id = self.arena.add_layer(LayerData {
            name: name.to_string(),
            description: props.get("description").unwrap_or_default().to_string(),
            field: None,
            payload,
            frame,
            location: self.location(elem),
        });

        let field = self.layer_field(&props, id)?;
        if let Some(link) = &field {
            let target = link
                .field_id()
                .map(|f| self.arena.field(self.arena.strip_ref(f)).kind());
            let allowed = match kind {
                LayerKind::Id => matches!(target, Some(FieldKind::Int | FieldKind::Enum)),
                LayerKind::Size => target == Some(FieldKind::Int),
                _ => true,
            };
            if !allowed {
                return Err(ParseError::validation(format!(
                    "field of {kind} layer '{name}' has unsupported kind"
                )));
            }
        }
        self.arena.layer_mut(id).field = field;
        Ok(id)
    }

    fn value_layer(&self, props: &Props<'_>) -> Result<ValueLayer, ParseError> {
        let interfaces = match props.get("interfaces") {
            Some(list) => split_list(list)
                .into_iter()
                .map(|r| {
                    self.arena
                        .find_interface(Some(self.schema), r)
                        .ok_or_else(|| ParseError::unresolved("interface", r))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => self.arena.all_interfaces(self.schema),
        };
        if interfaces.is_empty() {
            return Err(ParseError::validation(
                "value layer requires at least one interface",
            ));
        }

        let field_name = props.required("interfaceFieldName")?;
        for iface in &interfaces {
            let data = self.arena.interface(*iface);
            if !data
                .fields
                .iter()
                .any(|f| self.arena.field(*f).common.name == field_name)
            {
                return Err(ParseError::unresolved(
                    "interface field",
                    format!("{}.{field_name}", data.external_ref),
                ));
            }
        }

        Ok(ValueLayer {
            interfaces,
            interface_field_name: field_name.to_string(),
            pseudo: props.bool_or("pseudo", false)?,
        })
    }

    /// Lowers the layer field given inline, in `<field>` or by reference.
    fn layer_field(&mut self, props: &Props<'_>, layer: LayerId) -> Result<Option<FieldLink>, ParseError> {
        let parent = FieldParent::Layer(layer);
        if let Some(complex) = props.complex("field") {
            let items = self.container_items(complex);
            let [single] = items.as_slice() else {
                return Err(ParseError::structure(
                    "property 'field' must contain a single field definition",
                ));
            };
            return Ok(Some(FieldLink::Member(self.lower_field(single, parent, Interval::FULL)?)));
        }

        if let Some(reference) = props.get("field") {
            let target = self
                .arena
                .find_field(Some(self.schema), reference)
                .ok_or_else(|| ParseError::unresolved("field", reference))?;
            return Ok(Some(FieldLink::External(target)));
        }

        let inline: Vec<&XmlElement> = props
            .children()
            .iter()
            .copied()
            .filter(|c| FieldKind::from_element(&c.name).is_some())
            .collect();
        match inline.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(FieldLink::Member(self.lower_field(single, parent, Interval::FULL)?))),
            _ => Err(ParseError::structure("layer defines more than one field")),
        }
    }

    /// Checks that checksum ranges name layers on the correct side.
    fn check_checksum_refs(&self, layers: &[LayerId]) -> Result<(), ParseError> {
        let position = |name: &str| layers.iter().position(|l| self.arena.layer(*l).name == name);
        for (idx, layer) in layers.iter().enumerate() {
            let data = self.arena.layer(*layer);
            let Some(info) = data.payload.checksum_info() else {
                continue;
            };

            let at = |e: ParseError| e.at(data.location.clone());
            if let Some(from) = &info.from {
                match position(from) {
                    Some(pos) if pos != idx => {}
                    Some(_) => {
                        return Err(at(ParseError::validation(format!(
                            "checksum layer '{}' cannot start from itself",
                            data.name
                        ))));
                    }
                    None => return Err(at(ParseError::unresolved("layer", from.as_str()))),
                }
            }
            if let Some(until) = &info.until {
                match position(until) {
                    Some(pos) if pos > idx => {}
                    Some(_) => {
                        return Err(at(ParseError::validation(format!(
                            "checksum layer '{}' must precede layer '{until}'",
                            data.name
                        ))));
                    }
                    None => return Err(at(ParseError::unresolved("layer", until.as_str()))),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::arena::{Arena, SchemaId};
    use crate::config::ProtocolConfig;
    use crate::error::ParseError;
    use crate::frame::LayerPayload;
    use crate::logger::Logger;
    use crate::lower::lower_document;
    use crate::types::{ChecksumAlg, LayerSemantic};
    use crate::xml::parse_document;

    fn lower(xml: &str) -> Result<Arena, ParseError> {
        let mut arena = Arena::default();
        let root = parse_document(xml)?;
        lower_document(&mut arena, &ProtocolConfig::default(), &Logger::new(), "t.xml", &root)?;
        Ok(arena)
    }

    #[test]
    fn test_frame_layers() {
        let arena = lower(
            r#"<schema name="S">
                <enum name="MsgId" type="uint8"><validValue name="A" val="1"/></enum>
                <frame name="F">
                    <sync name="Sync"><int name="SyncField" type="uint16" defaultValue="0xabcd"/></sync>
                    <size name="Size"><int name="SizeField" type="uint16"/></size>
                    <id name="Id" field="MsgId"/>
                    <payload name="Data"/>
                    <checksum name="Cs" alg="crc-16" from="Sync"><int name="CsField" type="uint16"/></checksum>
                </frame>
            </schema>"#,
        )
        .expect("lowered");
        let frame = arena.find_frame(Some(SchemaId(0)), "F").expect("frame");
        let layers = &arena.frame(frame).layers;
        assert_eq!(layers.len(), 5);
        let LayerPayload::Checksum(info) = &arena.layer(layers[4]).payload else {
            panic!("checksum expected");
        };
        assert_eq!(info.alg, ChecksumAlg::Crc16);
        assert_eq!(info.from.as_deref(), Some("Sync"));
        assert!(arena.layer(layers[3]).field.is_none());
    }

    #[test]
    fn test_custom_checksum_layer() {
        let arena = lower(
            r#"<schema name="S">
                <frame name="F">
                    <payload name="Data"/>
                    <custom name="Cs" semanticLayerType="checksum" checksumFrom="Data"><int name="V" type="uint8"/></custom>
                </frame>
            </schema>"#,
        )
        .expect("lowered");
        let frame = arena.find_frame(Some(SchemaId(0)), "F").expect("frame");
        let LayerPayload::Custom(custom) = &arena.layer(arena.frame(frame).layers[1]).payload else {
            panic!("custom expected");
        };
        assert_eq!(custom.semantic, LayerSemantic::Checksum);
        assert_eq!(
            custom.checksum.as_ref().and_then(|c| c.from.as_deref()),
            Some("Data")
        );
    }

    #[test]
    fn test_checksum_errors() {
        let err = lower(
            r#"<schema name="S"><frame name="F"><payload name="Data"/><checksum name="Cs" alg="sum" until="Data"><int name="V" type="uint8"/></checksum></frame></schema>"#,
        )
        .expect_err("until before checksum");
        assert!(matches!(err.root(), ParseError::Validation { .. }));

        let err = lower(
            r#"<schema name="S"><frame name="F"><checksum name="Cs" alg="sum" from="Cs"><int name="V" type="uint8"/></checksum><payload name="Data"/></frame></schema>"#,
        )
        .expect_err("from itself");
        assert!(matches!(err.root(), ParseError::Validation { .. }));

        let err = lower(
            r#"<schema name="S"><frame name="F"><payload name="Data"/><checksum name="Cs" alg="custom" from="Data"><int name="V" type="uint8"/></checksum></frame></schema>"#,
        )
        .expect_err("custom without algName");
        assert!(matches!(err.root(), ParseError::MissingAttribute { .. }));
    }

    #[test]
    fn test_value_layer() {
        lower(
            r#"<schema name="S">
                <interface name="I"><int name="Version" type="uint8"/></interface>
                <frame name="F">
                    <value name="V" interfaces="I" interfaceFieldName="Version"><int name="VF" type="uint8"/></value>
                    <payload name="Data"/>
                </frame>
            </schema>"#,
        )
        .expect("lowered");

        let err = lower(
            r#"<schema name="S">
                <interface name="I"><int name="Version" type="uint8"/></interface>
                <frame name="F">
                    <value name="V" interfaceFieldName="Other"><int name="VF" type="uint8"/></value>
                    <payload name="Data"/>
                </frame>
            </schema>"#,
        )
        .expect_err("missing interface field");
        assert!(matches!(err.root(), ParseError::UnresolvedReference { .. }));
    }
}
