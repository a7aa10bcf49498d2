//! # Definition Resolution
//!
//! Call sites describe the list they want either by naming a registered base
//! definition, by passing an inline patch, or both. This module combines the
//! two into the effective [`Definition`] a session fetches with.
//!
//! ## Merge rules
//!
//! - A field the patch leaves undefined never overwrites the base.
//! - `params` merge structurally with [`merge_defined_maps`]: objects recurse,
//!   arrays replace wholesale, `null` keeps the base value.
//! - `mapping` and `search` merge field by field.
//! - Without a base, a patch carrying an endpoint becomes a standalone
//!   definition whose id defaults to the endpoint.
//!
//! Merging is a pure function of its inputs, so resolving the same pair twice
//! yields equal definitions.

use lister_types::{Definition, DefinitionPatch, Mapping, SearchSpec, Source};
use lister_util::merge_defined_maps;

/// Merge an optional base definition with an optional inline patch.
///
/// Returns `None` when there is nothing usable: no base and no patch, or a
/// patch without an endpoint and no base to inherit one from.
pub fn merge_definition(base: Option<&Definition>, patch: Option<&DefinitionPatch>) -> Option<Definition> {
    match (base, patch) {
        (None, None) => None,
        (Some(base), None) => Some(base.clone()),
        (None, Some(patch)) => standalone_definition(patch),
        (Some(base), Some(patch)) => Some(overlay_definition(base, patch)),
    }
}

fn standalone_definition(patch: &DefinitionPatch) -> Option<Definition> {
    let endpoint = patch.endpoint.clone()?;
    Some(Definition {
        id: patch.id.clone().unwrap_or_else(|| endpoint.clone()),
        source: Source {
            endpoint,
            method: patch.method.clone(),
            build_request: patch.build_request.clone(),
            params: patch.params.clone().unwrap_or_default(),
        },
        selector: patch.selector.clone(),
        mapping: patch.mapping.clone(),
        search: patch.search.clone(),
    })
}

fn overlay_definition(base: &Definition, patch: &DefinitionPatch) -> Definition {
    let params = match &patch.params {
        Some(params) => merge_defined_maps(&base.source.params, params),
        None => base.source.params.clone(),
    };
    Definition {
        id: patch.id.clone().unwrap_or_else(|| base.id.clone()),
        source: Source {
            endpoint: patch.endpoint.clone().unwrap_or_else(|| base.source.endpoint.clone()),
            method: patch.method.clone().or_else(|| base.source.method.clone()),
            build_request: patch.build_request.clone().or_else(|| base.source.build_request.clone()),
            params,
        },
        selector: patch.selector.clone().or_else(|| base.selector.clone()),
        mapping: merge_mapping(&base.mapping, &patch.mapping),
        search: merge_search(base.search.as_ref(), patch.search.as_ref()),
    }
}

/// Overlay `patch` on `base`, field by field.
pub fn merge_mapping(base: &Mapping, patch: &Mapping) -> Mapping {
    Mapping {
        option_value: patch.option_value.clone().or_else(|| base.option_value.clone()),
        option_label: patch.option_label.clone().or_else(|| base.option_label.clone()),
        option_icon: patch.option_icon.clone().or_else(|| base.option_icon.clone()),
        option_description: patch.option_description.clone().or_else(|| base.option_description.clone()),
        option_disabled: patch.option_disabled.clone().or_else(|| base.option_disabled.clone()),
        option_group: patch.option_group.clone().or_else(|| base.option_group.clone()),
        option_meta: patch.option_meta.clone().or_else(|| base.option_meta.clone()),
    }
}

fn merge_search(base: Option<&SearchSpec>, patch: Option<&SearchSpec>) -> Option<SearchSpec> {
    match (base, patch) {
        (None, None) => None,
        (Some(base), None) => Some(base.clone()),
        (None, Some(patch)) => Some(patch.clone()),
        (Some(base), Some(patch)) => Some(SearchSpec {
            columns: patch.columns.clone().or_else(|| base.columns.clone()),
            default: patch.default.clone().or_else(|| base.default.clone()),
            param: patch.param.clone().or_else(|| base.param.clone()),
            target_param: patch.target_param.clone().or_else(|| base.target_param.clone()),
        }),
    }
}
