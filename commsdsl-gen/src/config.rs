//! Generator configuration.

use commsdsl_parse::ProtocolConfig;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Settings controlling schema preparation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Settings of the underlying protocol.
    pub protocol: ProtocolConfig,
    /// Every message is referenced once the graph is created.
    pub all_messages_referenced_by_default: bool,
    /// Every interface is referenced once the graph is created.
    pub all_interfaces_referenced_by_default: bool,
    /// Reported warnings fail the phase they were reported in.
    pub warn_as_error: bool,
    /// Overrides the version of the protocol schema.
    pub forced_schema_version: Option<u32>,
    /// Main namespace per schema name. The empty key applies to the protocol schema.
    pub namespace_overrides: BTreeMap<String, String>,
    /// Generated code ignores version information.
    pub version_independent_code_forced: bool,
    /// Minimal version of the remote end the protocol schema supports.
    pub min_remote_version: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolConfig::default(),
            all_messages_referenced_by_default: true,
            all_interfaces_referenced_by_default: true,
            warn_as_error: false,
            forced_schema_version: None,
            namespace_overrides: BTreeMap::new(),
            version_independent_code_forced: false,
            min_remote_version: 0,
        }
    }
}

impl GeneratorConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the parse configuration.
    #[must_use]
    pub fn with_protocol(mut self, protocol: ProtocolConfig) -> Self {
        self.protocol = protocol;
        self
    }

    /// References every existing message before preparation.
    #[must_use]
    pub fn with_all_messages_referenced(mut self, enabled: bool) -> Self {
        self.all_messages_referenced_by_default = enabled;
        self
    }

    /// References every interface before preparation.
    #[must_use]
    pub fn with_all_interfaces_referenced(mut self, enabled: bool) -> Self {
        self.all_interfaces_referenced_by_default = enabled;
        self
    }

    /// Fails preparation once any warning was reported.
    #[must_use]
    pub fn with_warn_as_error(mut self, enabled: bool) -> Self {
        self.warn_as_error = enabled;
        self
    }

    /// Generates the protocol schema for an older version.
    #[must_use]
    pub fn with_forced_schema_version(mut self, version: u32) -> Self {
        self.forced_schema_version = Some(version);
        self
    }

    /// Renames the main namespace of a schema, `""` meaning the protocol schema.
    #[must_use]
    pub fn with_namespace_override(
        mut self,
        schema: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        self.namespace_overrides
            .insert(schema.into(), namespace.into());
        self
    }

    /// Generates code without version checks.
    #[must_use]
    pub fn with_version_independent_code(mut self, forced: bool) -> Self {
        self.version_independent_code_forced = forced;
        self
    }

    /// Sets the oldest version a remote end may speak.
    #[must_use]
    pub fn with_min_remote_version(mut self, version: u32) -> Self {
        self.min_remote_version = version;
        self
    }

    /// Parses a `Schema:Namespace` comma separated list of overrides.
    ///
    /// An entry without `:` applies to the protocol schema.
    #[must_use]
    pub fn with_namespace_override_list(mut self, list: &str) -> Self {
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (schema, ns) = entry.split_once(':').unwrap_or(("", entry));
            self.namespace_overrides
                .insert(schema.to_string(), ns.to_string());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::default();
        assert!(config.all_messages_referenced_by_default);
        assert!(config.all_interfaces_referenced_by_default);
        assert!(!config.warn_as_error);
        assert_eq!(config.forced_schema_version, None);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: GeneratorConfig = serde_json::from_str(
            r#"{
                "warn_as_error": true,
                "forced_schema_version": 3,
                "namespace_overrides": {"": "proto"},
                "protocol": {"multiple_schemas_enabled": true}
            }"#,
        )
        .expect("valid config");
        assert!(config.warn_as_error);
        assert_eq!(config.forced_schema_version, Some(3));
        assert_eq!(config.namespace_overrides.get(""), Some(&"proto".to_string()));
        assert!(config.protocol.multiple_schemas_enabled);
        assert!(config.all_messages_referenced_by_default);
    }

    #[test]
    fn test_override_list() {
        let config = GeneratorConfig::new().with_namespace_override_list("main, Other:other_ns");
        assert_eq!(config.namespace_overrides.get(""), Some(&"main".to_string()));
        assert_eq!(
            config.namespace_overrides.get("Other"),
            Some(&"other_ns".to_string())
        );
    }
}
