//! Generation schemas and version queries.

use crate::arena::{GenInterfaceId, GenNamespaceId, GenSchemaId};
use crate::backend::{BackendSlot, GenNode};
use crate::error::GenError;
use crate::generator::Generator;
use crate::state::{NodeStatus, Phase, Step};
use commsdsl_parse::{NOT_YET_DEPRECATED, SchemaId};

/// Newest DSL version understood by the generator.
pub const MAX_DSL_VERSION: u32 = 7;

/// Versions a schema is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchemaVersions {
    /// Version declared by the schema.
    pub parsed: u32,
    /// Older version to generate instead, if any.
    pub forced: Option<u32>,
    /// Oldest version a remote end may speak.
    pub min_remote: u32,
}

impl SchemaVersions {
    /// Version code is generated for: the forced one if any, otherwise the parsed one.
    #[must_use]
    pub fn schema_version(&self) -> u32 {
        self.forced.unwrap_or(self.parsed)
    }

    /// Returns true if an element introduced in `since` and deprecated in
    /// `deprecated` is present in the generated schema version.
    #[must_use]
    pub fn does_element_exist(&self, since: u32, deprecated: u32, removed: bool) -> bool {
        if self.schema_version() < since {
            return false;
        }
        !(removed && deprecated <= self.min_remote)
    }

    /// Returns true if some supported remote version lacks the element.
    #[must_use]
    pub fn is_element_optional(&self, since: u32, deprecated: u32, removed: bool) -> bool {
        if self.min_remote < since {
            return true;
        }
        removed && deprecated < NOT_YET_DEPRECATED
    }

    /// Returns true if an element deprecated in `deprecated` is deprecated in the generated version.
    #[must_use]
    pub fn is_element_deprecated(&self, deprecated: u32) -> bool {
        deprecated < self.schema_version()
    }

    fn check(&self, name: &str) -> Result<(), GenError> {
        if let Some(forced) = self.forced {
            if self.parsed < forced {
                return Err(GenError::invalid_state(format!(
                    "forced version {forced} of schema '{name}' is newer than its version {}",
                    self.parsed
                )));
            }
        }
        if self.schema_version() < self.min_remote {
            return Err(GenError::invalid_state(format!(
                "minimal remote version {} of schema '{name}' is newer than the generated version {}",
                self.min_remote,
                self.schema_version()
            )));
        }
        Ok(())
    }
}

/// Generation counterpart of a schema.
#[derive(Debug)]
pub struct GenSchema {
    pub(crate) parse: SchemaId,
    pub(crate) root: Option<GenNamespaceId>,
    pub(crate) status: NodeStatus,
    pub(crate) versions: SchemaVersions,
    pub(crate) main_namespace: String,
    pub(crate) version_dependent_code: bool,
    pub(crate) backend: BackendSlot,
}

impl GenSchema {
    /// Parse definition of the schema.
    #[must_use]
    pub fn parse_id(&self) -> SchemaId {
        self.parse
    }

    /// Root namespace holding the unnamespaced definitions.
    #[must_use]
    pub fn root_namespace(&self) -> Option<GenNamespaceId> {
        self.root
    }

    /// Lifecycle status of the schema.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Parsed, forced and minimal remote versions.
    #[must_use]
    pub fn versions(&self) -> &SchemaVersions {
        &self.versions
    }

    /// Version code is generated for.
    #[must_use]
    pub fn schema_version(&self) -> u32 {
        self.versions.schema_version()
    }

    /// Name of the outermost namespace of generated code.
    #[must_use]
    pub fn main_namespace(&self) -> &str {
        &self.main_namespace
    }

    /// Generated code has to handle several protocol versions. Set on prepare.
    #[must_use]
    pub fn version_dependent_code(&self) -> bool {
        self.version_dependent_code
    }

    /// See [`SchemaVersions::does_element_exist`].
    #[must_use]
    pub fn does_element_exist(&self, since: u32, deprecated: u32, removed: bool) -> bool {
        self.versions.does_element_exist(since, deprecated, removed)
    }

    /// See [`SchemaVersions::is_element_optional`].
    #[must_use]
    pub fn is_element_optional(&self, since: u32, deprecated: u32, removed: bool) -> bool {
        self.versions.is_element_optional(since, deprecated, removed)
    }

    /// See [`SchemaVersions::is_element_deprecated`].
    #[must_use]
    pub fn is_element_deprecated(&self, deprecated: u32) -> bool {
        self.versions.is_element_deprecated(deprecated)
    }
}

impl Generator {
    pub(crate) fn create_schema(&mut self, parse: SchemaId) -> GenSchemaId {
        let schema = self.protocol.schema(parse);
        let backend = self.factory.create_schema(schema);
        let root = schema.root_namespace().id();
        let id = self.arena.add_schema(GenSchema {
            parse,
            root: None,
            status: NodeStatus::referenced(),
            versions: SchemaVersions {
                parsed: schema.version(),
                ..SchemaVersions::default()
            },
            main_namespace: schema.name().to_string(),
            version_dependent_code: false,
            backend: BackendSlot::new(backend),
        });

        let root = self.create_namespace(root, id, None);
        self.arena.schema_mut(id).root = Some(root);
        id
    }

    pub(crate) fn link_schema(&mut self, id: GenSchemaId) -> Result<(), GenError> {
        match self.arena.schema(id).root {
            Some(root) => self.link_namespace(root),
            None => Err(GenError::internal("schema without root namespace")),
        }
    }

    pub(crate) fn prepare_schema(&mut self, id: GenSchemaId) -> Result<(), GenError> {
        if self.arena.schema(id).status.step(Phase::Prepare)? == Step::Skip {
            return Ok(());
        }

        let dsl = self.protocol.schema(self.arena.schema(id).parse);
        let name = dsl.name();
        if dsl.dsl_version() > MAX_DSL_VERSION {
            return Err(GenError::invalid_state(format!(
                "schema '{name}' requires DSL version {}, newest supported is {MAX_DSL_VERSION}",
                dsl.dsl_version()
            )));
        }

        let node = self.arena.schema(id);
        node.versions.check(name)?;

        let root = node
            .root
            .ok_or_else(|| GenError::internal("schema without root namespace"))?;
        let version_dependent = !self.config.version_independent_code_forced
            && self
                .arena
                .interfaces
                .iter()
                .enumerate()
                .filter(|(_, i)| self.arena.namespace(i.namespace).schema == id)
                .any(|(idx, _)| self.interface_has_version(GenInterfaceId(idx)));

        tracing::debug!(
            schema = name,
            version = node.schema_version(),
            version_dependent,
            "preparing schema"
        );
        self.arena.schema_mut(id).version_dependent_code = version_dependent;

        self.prepare_namespace(root)?;
        self.run_prepare_hook(GenNode::Schema(id))?;
        self.arena.schema_mut(id).status.complete(Phase::Prepare);
        Ok(())
    }

    pub(crate) fn write_schema(&mut self, id: GenSchemaId) -> Result<(), GenError> {
        if self.arena.schema(id).status.step(Phase::Write)? == Step::Skip {
            return Ok(());
        }

        self.run_write_hook(GenNode::Schema(id))?;
        self.arena.schema_mut(id).status.complete(Phase::Write);
        if let Some(root) = self.arena.schema(id).root {
            self.write_namespace(root)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(parsed: u32, forced: Option<u32>, min_remote: u32) -> SchemaVersions {
        SchemaVersions {
            parsed,
            forced,
            min_remote,
        }
    }

    #[test]
    fn test_element_exists() {
        let v = versions(5, Some(3), 2);
        assert_eq!(v.schema_version(), 3);
        assert!(v.does_element_exist(0, NOT_YET_DEPRECATED, false));
        assert!(v.does_element_exist(3, NOT_YET_DEPRECATED, false));
        assert!(!v.does_element_exist(4, NOT_YET_DEPRECATED, false));
        assert!(!v.does_element_exist(0, 2, true));
        assert!(v.does_element_exist(0, 3, true));
        assert!(v.does_element_exist(0, 2, false));
    }

    #[test]
    fn test_element_optional_and_deprecated() {
        let v = versions(5, None, 2);
        assert!(v.is_element_optional(3, NOT_YET_DEPRECATED, false));
        assert!(!v.is_element_optional(2, NOT_YET_DEPRECATED, false));
        assert!(v.is_element_optional(0, 4, true));
        assert!(!v.is_element_optional(0, 4, false));

        assert!(v.is_element_deprecated(4));
        assert!(!v.is_element_deprecated(5));
        assert!(!v.is_element_deprecated(NOT_YET_DEPRECATED));
    }

    #[test]
    fn test_version_checks() {
        assert!(versions(5, Some(3), 2).check("S").is_ok());
        assert!(versions(2, Some(3), 0).check("S").is_err());
        assert!(versions(5, Some(3), 4).check("S").is_err());
        assert!(versions(5, None, 5).check("S").is_ok());
    }
}
