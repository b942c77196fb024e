//! Arguments and results of plugin hooks.

use serde::{Deserialize, Serialize};

/// Arguments of `resolve_id` and of `PluginContext::resolve`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResolveIdArgs {
    pub specifier: String,
    pub importer: Option<String>,
    pub is_entry: bool,
    /// Plugin specific resolve options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_json::Value>,
}

impl HookResolveIdArgs {
    pub fn new(specifier: impl Into<String>, importer: Option<&str>) -> Self {
        Self {
            specifier: specifier.into(),
            importer: importer.map(str::to_string),
            ..Default::default()
        }
    }
}

/// A resolved module id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedId {
    pub id: String,
    #[serde(default)]
    pub external: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_side_effects: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl ResolvedId {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn external(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookResolveDynamicImportArgs {
    /// The import argument; `None` when it isn't a string literal.
    pub specifier: Option<String>,
    pub importer: String,
}

/// Result of `resolve_dynamic_import`.
#[derive(Debug, Clone, PartialEq)]
pub enum DynamicImportResolution {
    Resolved(ResolvedId),
    /// Keep the import as written and treat it as external.
    External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookLoadArgs {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookLoadOutput {
    pub code: String,
    pub map: Option<String>,
    pub meta: Option<serde_json::Value>,
}

impl From<String> for HookLoadOutput {
    fn from(code: String) -> Self {
        Self {
            code,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookTransformArgs {
    pub id: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookTransformOutput {
    pub code: String,
    pub map: Option<String>,
}

impl From<String> for HookTransformOutput {
    fn from(code: String) -> Self {
        Self { code, map: None }
    }
}

/// Result of running every `transform` hook over a module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformedModule {
    pub code: String,
    /// Source maps in the order the transforms produced them.
    pub maps: Vec<String>,
    /// Files added with `add_watch_file` while transforming.
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookShouldTransformCachedModuleArgs {
    pub id: String,
    pub code: String,
}

/// Information about a module in the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub is_entry: bool,
    pub is_external: bool,
    #[serde(default)]
    pub importers: Vec<String>,
    #[serde(default)]
    pub imported_ids: Vec<String>,
    #[serde(default)]
    pub dynamically_imported_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchChangeEvent {
    Create,
    Update,
    Delete,
}

/// A chunk as seen by output hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedChunk {
    pub name: String,
    pub file_name: String,
    pub is_entry: bool,
    pub is_dynamic_entry: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facade_module_id: Option<String>,
    #[serde(default)]
    pub module_ids: Vec<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub exports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRenderChunkArgs {
    pub code: String,
    pub chunk: RenderedChunk,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookRenderChunkOutput {
    pub code: String,
    pub map: Option<String>,
}

impl From<String> for HookRenderChunkOutput {
    fn from(code: String) -> Self {
        Self { code, map: None }
    }
}

/// Result of running every `render_chunk` hook over a chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedChunkCode {
    pub code: String,
    pub maps: Vec<String>,
}

/// Text added around a rendered chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Addons {
    pub banner: String,
    pub footer: String,
    pub intro: String,
    pub outro: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookResolveFileUrlArgs {
    pub reference_id: String,
    pub file_name: String,
    pub chunk_id: String,
    pub module_id: String,
    pub relative_path: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookResolveImportMetaArgs {
    /// The accessed property, `None` for `import.meta` itself.
    pub property: Option<String>,
    pub chunk_id: String,
    pub module_id: String,
    pub format: String,
}

/// Options for `PluginContext::parse`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub allow_return_outside_function: bool,
    pub jsx: bool,
}
