//! Property collection for schema elements.
//!
//! A property can be written as an attribute or as a child element holding a
//! `value` attribute or text. Child elements with nested elements (an inline
//! field inside `<field>`, a condition list inside `<cond>`) are kept apart as
//! complex properties.

use crate::common::{parse_bool, parse_int_literal, parse_u32, parse_usize};
use crate::config::ProtocolConfig;
use crate::error::ParseError;
use crate::vocab::{RANGE_ITEM_PROPS, REPEATABLE_PROPS};
use crate::xml::XmlElement;

/// Single property value with the child element it came from, if any.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PropValue<'x> {
    pub value: &'x str,
    pub elem: Option<&'x XmlElement>,
}

/// Properties and remaining children of one element.
#[derive(Debug, Clone)]
pub(crate) struct Props<'x> {
    elem: &'x XmlElement,
    values: Vec<(&'x str, PropValue<'x>)>,
    complex: Vec<&'x XmlElement>,
    children: Vec<&'x XmlElement>,
}

fn is_meta_attr(name: &str) -> bool {
    name.starts_with("xmlns") || name.contains(':')
}

impl<'x> Props<'x> {
    /// Splits the element into recognised properties and other children.
    pub fn collect(
        elem: &'x XmlElement,
        known: &[&str],
        config: &ProtocolConfig,
    ) -> Result<Self, ParseError> {
        let mut props = Self {
            elem,
            values: Vec::new(),
            complex: Vec::new(),
            children: Vec::new(),
        };

        for (key, value) in &elem.attrs {
            if known.contains(&key.as_str()) {
                props.values.push((
                    key.as_str(),
                    PropValue {
                        value: value.as_str(),
                        elem: None,
                    },
                ));
            } else if !config.is_extra_name(key) && !is_meta_attr(key) {
                return Err(ParseError::unknown_attr(&elem.name, key));
            }
        }

        for child in &elem.children {
            if config.is_extra_name(&child.name) {
                continue;
            }

            if !known.contains(&child.name.as_str()) {
                props.children.push(child);
                continue;
            }

            if !child.children.is_empty() {
                props.complex.push(child);
                continue;
            }

            let allowed: &[&str] = if REPEATABLE_PROPS.contains(&child.name.as_str()) {
                RANGE_ITEM_PROPS
            } else {
                &["value"]
            };
            if let Some((key, _)) = child
                .attrs
                .iter()
                .find(|(k, _)| !allowed.contains(&k.as_str()) && !config.is_extra_name(k))
            {
                return Err(ParseError::unknown_attr(&child.name, key));
            }

            let value = child.attr("value").unwrap_or(child.text.as_str());
            props.values.push((
                child.name.as_str(),
                PropValue {
                    value,
                    elem: Some(child),
                },
            ));
        }

        props.check_repeated()?;
        Ok(props)
    }

    fn check_repeated(&self) -> Result<(), ParseError> {
        for (idx, (name, _)) in self.values.iter().enumerate() {
            if REPEATABLE_PROPS.contains(name) {
                continue;
            }
            let repeated = self.values[..idx].iter().any(|(n, _)| n == name)
                || self.complex.iter().any(|c| c.name == *name);
            if repeated {
                return Err(ParseError::RepeatedAttribute {
                    element: self.elem.name.clone(),
                    attribute: (*name).to_string(),
                });
            }
        }

        for (idx, c) in self.complex.iter().enumerate() {
            if self.complex[..idx].iter().any(|p| p.name == c.name) {
                return Err(ParseError::RepeatedAttribute {
                    element: self.elem.name.clone(),
                    attribute: c.name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn elem(&self) -> &'x XmlElement {
        self.elem
    }

    pub fn get(&self, name: &str) -> Option<&'x str> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.value)
    }

    pub fn get_all(&self, name: &str) -> Vec<PropValue<'x>> {
        self.values
            .iter()
            .filter(|(n, _)| *n == name)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn complex(&self, name: &str) -> Option<&'x XmlElement> {
        self.complex.iter().copied().find(|c| c.name == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some() || self.complex(name).is_some()
    }

    pub fn children(&self) -> &[&'x XmlElement] {
        &self.children
    }

    pub fn name(&self) -> &'x str {
        self.get("name").unwrap_or_default()
    }

    fn invalid(&self, name: &str, value: &str) -> ParseError {
        ParseError::invalid_attr(&self.elem.name, name, value)
    }

    /// Parses a property with the given conversion.
    pub fn parse<T>(
        &self,
        name: &str,
        convert: impl FnOnce(&str) -> Option<T>,
    ) -> Result<Option<T>, ParseError> {
        match self.get(name) {
            Some(value) => convert(value)
                .map(Some)
                .ok_or_else(|| self.invalid(name, value)),
            None => Ok(None),
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, ParseError> {
        Ok(self.parse(name, parse_bool)?.unwrap_or(default))
    }

    pub fn u32_opt(&self, name: &str) -> Result<Option<u32>, ParseError> {
        self.parse(name, parse_u32)
    }

    pub fn usize_opt(&self, name: &str) -> Result<Option<usize>, ParseError> {
        self.parse(name, parse_usize)
    }

    pub fn int_opt(&self, name: &str) -> Result<Option<i128>, ParseError> {
        self.parse(name, parse_int_literal)
    }

    /// Returns a required property.
    pub fn required(&self, name: &str) -> Result<&'x str, ParseError> {
        self.get(name)
            .ok_or_else(|| ParseError::missing_attr(&self.elem.name, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    fn collect(xml: &str, known: &[&str]) -> Result<usize, ParseError> {
        let root = parse_document(xml)?;
        let props = Props::collect(&root, known, &ProtocolConfig::default())?;
        Ok(props.values.len())
    }

    #[test]
    fn test_attribute_and_child_properties() {
        let root = parse_document(
            r#"<int name="F"><description value="d"/><validRange value="[0,5]" sinceVersion="2"/><validRange>[7, 9]</validRange><special name="S" val="1"/></int>"#,
        )
        .expect("valid document");
        let known = ["name", "description", "validRange"];
        let props = Props::collect(&root, &known, &ProtocolConfig::default()).expect("props");
        assert_eq!(props.name(), "F");
        assert_eq!(props.get("description"), Some("d"));
        let ranges = props.get_all("validRange");
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].value, "[7, 9]");
        assert_eq!(props.children().len(), 1);
    }

    #[test]
    fn test_unknown_and_repeated() {
        assert!(matches!(
            collect(r#"<int name="F" bogus="1"/>"#, &["name"]),
            Err(ParseError::UnknownAttribute { .. })
        ));
        assert!(matches!(
            collect(r#"<int name="F"><name value="G"/></int>"#, &["name"]),
            Err(ParseError::RepeatedAttribute { .. })
        ));
        assert_eq!(collect(r#"<int name="F" xmlns:x="y"/>"#, &["name"]).ok(), Some(1));
    }

    #[test]
    fn test_extra_prefix_is_ignored() {
        let root = parse_document(r#"<int name="F" x-note="n"><x-doc/></int>"#).expect("doc");
        let config = ProtocolConfig::new().with_extra_prefix("x-");
        let props = Props::collect(&root, &["name"], &config).expect("props");
        assert!(props.children().is_empty());
    }
}
