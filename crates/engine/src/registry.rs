//! Named base definitions and call-site references to them.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use lister_types::{Definition, DefinitionPatch, DefinitionsFile};
use tracing::{debug, warn};

use crate::{error::ListerError, resolve::merge_definition};

/// How a call site names the definition it wants to open.
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionRef {
    /// A registered base definition, used as-is.
    Named(String),
    /// A standalone inline definition (must carry an endpoint).
    Inline(DefinitionPatch),
    /// A registered base definition overlaid with an inline patch.
    Patched { id: String, patch: DefinitionPatch },
}

impl DefinitionRef {
    pub fn named(id: impl Into<String>) -> Self {
        Self::Named(id.into())
    }
}

impl From<DefinitionPatch> for DefinitionRef {
    fn from(patch: DefinitionPatch) -> Self {
        Self::Inline(patch)
    }
}

/// Registry of base definitions keyed by id, in registration order.
#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    definitions: IndexMap<String, Definition>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a base definition, replacing any previous one with the same id.
    ///
    /// Base definitions must name `option_value`; inference only applies to
    /// standalone inline definitions.
    pub fn register(&mut self, definition: Definition) -> Result<(), ListerError> {
        if definition.mapping.option_value.is_none() {
            return Err(ListerError::InvalidDefinition {
                id: definition.id,
                reason: "base definitions must map optionValue".to_string(),
            });
        }
        if definition.source.endpoint.trim().is_empty() {
            return Err(ListerError::InvalidDefinition {
                id: definition.id,
                reason: "endpoint is empty".to_string(),
            });
        }
        debug!(definition_id = %definition.id, endpoint = %definition.source.endpoint, "definition registered");
        self.definitions.insert(definition.id.clone(), definition);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Definition> {
        self.definitions.get(id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Resolve a reference into the effective definition.
    ///
    /// Unknown ids and inline patches without an endpoint resolve to `None`.
    pub fn resolve(&self, reference: &DefinitionRef) -> Option<Definition> {
        let resolved = match reference {
            DefinitionRef::Named(id) => self.get(id).cloned(),
            DefinitionRef::Inline(patch) => merge_definition(None, Some(patch)),
            DefinitionRef::Patched { id, patch } => self.get(id).and_then(|base| merge_definition(Some(base), Some(patch))),
        };
        if resolved.is_none() {
            debug!(reference = ?reference, "definition reference did not resolve");
        }
        resolved
    }

    /// Parse a definitions document (YAML or JSON) into a registry.
    ///
    /// Entries without an endpoint or value mapping are skipped with a warning.
    pub fn from_document(content: &str) -> Result<Self> {
        let file: DefinitionsFile = serde_yaml::from_str(content).context("Failed to parse definitions document")?;
        let mut registry = Self::new();
        for (key, document) in file.definitions {
            let Some(definition) = document.into_definition(Some(&key)) else {
                warn!(definition_id = %key, "skipping definition without endpoint");
                continue;
            };
            if let Err(error) = registry.register(definition) {
                warn!(definition_id = %key, error = %error, "skipping invalid definition");
            }
        }
        Ok(registry)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read definitions file: {}", path.display()))?;
        Self::from_document(&content).with_context(|| format!("Invalid definitions file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lister_types::{FieldSpec, Mapping};

    const DOCUMENT: &str = r#"
definitions:
  users:
    endpoint: /users
    mapping:
      optionValue: id
      optionLabel: name
  teams:
    endpoint: /teams
  broken:
    mapping:
      optionValue: id
"#;

    #[test]
    fn document_entries_without_value_or_endpoint_are_skipped() {
        let registry = DefinitionRegistry::from_document(DOCUMENT).expect("parse");
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["users"]);
    }

    #[test]
    fn register_rejects_base_without_option_value() {
        let mut registry = DefinitionRegistry::new();
        let mut definition = Definition::new("/teams", "id");
        definition.mapping = Mapping::default();
        let error = registry.register(definition).expect_err("missing option value");
        assert!(matches!(error, ListerError::InvalidDefinition { .. }));
    }

    #[test]
    fn resolves_each_reference_kind() {
        let registry = DefinitionRegistry::from_document(DOCUMENT).expect("parse");

        let named = registry.resolve(&DefinitionRef::named("users")).expect("named");
        assert_eq!(named.source.endpoint, "/users");

        let patched = registry
            .resolve(&DefinitionRef::Patched {
                id: "users".into(),
                patch: DefinitionPatch::default().with_mapping(Mapping::default().with_label(FieldSpec::key("email"))),
            })
            .expect("patched");
        assert_eq!(patched.mapping.option_label, Some(FieldSpec::key("email")));
        assert_eq!(patched.mapping.option_value, Some(FieldSpec::key("id")));

        let inline = registry.resolve(&DefinitionPatch::endpoint("/projects").into()).expect("inline");
        assert_eq!(inline.id, "/projects");
    }

    #[test]
    fn unknown_references_resolve_to_none() {
        let registry = DefinitionRegistry::new();
        assert!(registry.resolve(&DefinitionRef::named("missing")).is_none());
        assert!(
            registry
                .resolve(&DefinitionRef::Patched {
                    id: "missing".into(),
                    patch: DefinitionPatch::endpoint("/x"),
                })
                .is_none()
        );
        assert!(registry.resolve(&DefinitionRef::Inline(DefinitionPatch::default())).is_none());
    }

    #[test]
    fn from_file_reports_missing_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(DefinitionRegistry::from_file(&temp_dir.path().join("nope.yaml")).is_err());

        let path = temp_dir.path().join("definitions.json");
        fs::write(&path, r#"{"definitions": {"tags": {"endpoint": "/tags", "mapping": {"optionValue": "slug"}}}}"#).unwrap();
        let registry = DefinitionRegistry::from_file(&path).expect("json definitions");
        assert_eq!(registry.get("tags").map(|definition| definition.source.endpoint.as_str()), Some("/tags"));
    }
}
