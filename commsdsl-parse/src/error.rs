//! Error types for schema parsing and validation.

use thiserror::Error;

/// Error type for schema parsing and validation operations.
#[derive(Debug, Error)]
pub enum ParseError {
    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// XML escape sequence error.
    #[error("XML escape error: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),

    /// UTF-8 decoding error.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error tied to a position inside a schema document.
    #[error("{location}: {source}")]
    At {
        /// Document name and line.
        location: String,
        /// Underlying error.
        #[source]
        source: Box<ParseError>,
    },

    /// Missing required property.
    #[error("missing required property '{attribute}' on element '{element}'")]
    MissingAttribute {
        /// Element name.
        element: String,
        /// Property name.
        attribute: String,
    },

    /// Invalid property value.
    #[error("invalid value '{value}' for property '{attribute}' on element '{element}'")]
    InvalidAttribute {
        /// Element name.
        element: String,
        /// Property name.
        attribute: String,
        /// Invalid value.
        value: String,
    },

    /// Unknown property encountered.
    #[error("unknown property '{attribute}' on element '{element}'")]
    UnknownAttribute {
        /// Element name.
        element: String,
        /// Property name.
        attribute: String,
    },

    /// Unknown element encountered.
    #[error("unknown element '{element}' in context '{context}'")]
    UnknownElement {
        /// Element name.
        element: String,
        /// Parent context.
        context: String,
    },

    /// Property specified more than once.
    #[error("property '{attribute}' of element '{element}' is specified more than once")]
    RepeatedAttribute {
        /// Element name.
        element: String,
        /// Property name.
        attribute: String,
    },

    /// Duplicate definition.
    #[error("duplicate {kind} definition: '{name}'")]
    DuplicateDefinition {
        /// Kind of definition (field, message, etc.).
        kind: String,
        /// Name of the duplicate.
        name: String,
    },

    /// Reference that cannot be resolved.
    #[error("cannot resolve {kind} reference '{reference}'")]
    UnresolvedReference {
        /// Kind of referenced object.
        kind: String,
        /// Reference string as written in the schema.
        reference: String,
    },

    /// Inconsistent version information.
    #[error("invalid version information of '{element}': {message}")]
    Version {
        /// Element name.
        element: String,
        /// Error message.
        message: String,
    },

    /// Invalid condition expression.
    #[error("invalid condition '{expression}': {message}")]
    InvalidCondition {
        /// Condition text.
        expression: String,
        /// Error message.
        message: String,
    },

    /// Invalid schema structure.
    #[error("invalid schema structure: {message}")]
    InvalidStructure {
        /// Error message.
        message: String,
    },

    /// Semantic validation error.
    #[error("validation error: {message}")]
    Validation {
        /// Error message.
        message: String,
    },

    /// Operation requested in a state that does not allow it.
    #[error("invalid protocol state: {message}")]
    InvalidState {
        /// Error message.
        message: String,
    },
}

impl ParseError {
    /// Creates a missing property error.
    pub fn missing_attr(element: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            element: element.into(),
            attribute: attribute.into(),
        }
    }

    /// Creates an invalid property value error.
    pub fn invalid_attr(
        element: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidAttribute {
            element: element.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Creates an unknown property error.
    pub fn unknown_attr(element: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            element: element.into(),
            attribute: attribute.into(),
        }
    }

    /// Creates an unknown element error.
    pub fn unknown_element(element: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnknownElement {
            element: element.into(),
            context: context.into(),
        }
    }

    /// Creates a duplicate definition error.
    pub fn duplicate(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DuplicateDefinition {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Creates an unresolved reference error.
    pub fn unresolved(kind: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            kind: kind.into(),
            reference: reference.into(),
        }
    }

    /// Creates a version consistency error.
    pub fn version(element: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Version {
            element: element.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid condition error.
    pub fn condition(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCondition {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Creates a structural error.
    pub fn structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Creates a semantic validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Attaches a document location to the error.
    ///
    /// Errors that already carry a location are returned unchanged so the
    /// innermost position wins.
    #[must_use]
    pub fn at(self, location: impl Into<String>) -> Self {
        match self {
            Self::At { .. } => self,
            other => Self::At {
                location: location.into(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the error without any location wrapper.
    #[must_use]
    pub fn root(&self) -> &ParseError {
        match self {
            Self::At { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_keeps_innermost() {
        let err = ParseError::unresolved("field", "ns.F")
            .at("a.xml:3")
            .at("a.xml:1");
        assert_eq!(err.to_string(), "a.xml:3: cannot resolve field reference 'ns.F'");
        assert!(matches!(
            err.root(),
            ParseError::UnresolvedReference { reference, .. } if reference == "ns.F"
        ));
    }
}
