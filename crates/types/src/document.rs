//! Serializable forms of definitions, as found in YAML or JSON definition files.
//!
//! Documents only carry the declarative parts of a definition (keys, paths,
//! parameters); function mappings and request builders are attached in code.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::definition::{Definition, DefinitionPatch, FieldSpec, Mapping, SearchSpec, Selector, Source};

/// Mapping of option fields to raw-row keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_disabled: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_meta: Option<String>,
}

impl From<MappingDocument> for Mapping {
    fn from(document: MappingDocument) -> Self {
        Mapping {
            option_value: document.option_value.map(FieldSpec::Key),
            option_label: document.option_label.map(FieldSpec::Key),
            option_icon: document.option_icon.map(FieldSpec::Key),
            option_description: document.option_description.map(FieldSpec::Key),
            option_disabled: document.option_disabled.map(FieldSpec::Key),
            option_group: document.option_group.map(FieldSpec::Key),
            option_meta: document.option_meta.map(FieldSpec::Key),
        }
    }
}

/// A definition (or inline patch) as written in a definitions file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    /// Dotted path to the row array inside the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default)]
    pub mapping: MappingDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchSpec>,
}

impl DefinitionDocument {
    /// Convert into a full definition. Returns `None` without an endpoint.
    ///
    /// `fallback_id` names the definition when the document has no `id` of its
    /// own (typically the key it was listed under).
    pub fn into_definition(self, fallback_id: Option<&str>) -> Option<Definition> {
        let endpoint = self.endpoint?;
        let id = self
            .id
            .or_else(|| fallback_id.map(str::to_string))
            .unwrap_or_else(|| endpoint.clone());
        Some(Definition {
            id,
            source: Source {
                endpoint,
                method: self.method,
                build_request: None,
                params: self.params.unwrap_or_default(),
            },
            selector: self.selector.map(Selector::Path),
            mapping: self.mapping.into(),
            search: self.search,
        })
    }

    /// Convert into an inline patch; every absent field stays `None`.
    pub fn into_patch(self) -> DefinitionPatch {
        DefinitionPatch {
            id: self.id,
            endpoint: self.endpoint,
            method: self.method,
            build_request: None,
            params: self.params,
            selector: self.selector.map(Selector::Path),
            mapping: self.mapping.into(),
            search: self.search,
        }
    }
}

/// Top-level layout of a definitions file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionsFile {
    #[serde(default)]
    pub definitions: IndexMap<String, DefinitionDocument>,
}
