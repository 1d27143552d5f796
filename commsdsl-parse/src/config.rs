//! Protocol configuration.

use crate::logger::ErrorLevel;
use serde::Deserialize;

/// Settings controlling how schema documents are ingested.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Allows several schemas with different names, later ones referencing earlier ones.
    pub multiple_schemas_enabled: bool,
    /// Element and property name prefixes that are tolerated and ignored.
    pub extra_element_prefixes: Vec<String>,
    /// Minimal level of reported diagnostics.
    pub min_level: ErrorLevel,
}

impl ProtocolConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables multiple schemas mode.
    #[must_use]
    pub fn with_multiple_schemas(mut self, enabled: bool) -> Self {
        self.multiple_schemas_enabled = enabled;
        self
    }

    /// Adds a tolerated name prefix.
    #[must_use]
    pub fn with_extra_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.extra_element_prefixes.push(prefix.into());
        self
    }

    /// Sets the minimal reported level.
    #[must_use]
    pub fn with_min_level(mut self, level: ErrorLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Returns true if the name starts with one of the tolerated prefixes.
    #[must_use]
    pub fn is_extra_name(&self, name: &str) -> bool {
        self.extra_element_prefixes
            .iter()
            .any(|p| !p.is_empty() && name.starts_with(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial() {
        let config: ProtocolConfig =
            serde_json::from_str(r#"{"multiple_schemas_enabled": true, "min_level": "warning"}"#)
                .expect("valid config");
        assert!(config.multiple_schemas_enabled);
        assert!(config.extra_element_prefixes.is_empty());
        assert_eq!(config.min_level, ErrorLevel::Warning);
    }

    #[test]
    fn test_extra_prefix() {
        let config = ProtocolConfig::new().with_extra_prefix("x-");
        assert!(config.is_extra_name("x-doc"));
        assert!(!config.is_extra_name("doc"));
    }
}
