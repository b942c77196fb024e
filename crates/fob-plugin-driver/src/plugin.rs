//! The plugin trait.
//!
//! A plugin declares the hooks it takes part in through [`Plugin::hook`] and
//! implements the matching methods. Methods of undeclared hooks are never
//! called, so their default bodies only matter for declared hooks that a
//! plugin chooses not to override.
//!
//! ```
//! use std::borrow::Cow;
//! use fob_plugin_driver::{HookDeclaration, HookName, HookResolveIdArgs, Plugin, PluginContext, ResolvedId};
//!
//! struct Virtual;
//!
//! #[async_trait::async_trait]
//! impl Plugin for Virtual {
//!     fn name(&self) -> Cow<'static, str> {
//!         Cow::Borrowed("virtual")
//!     }
//!
//!     fn hook(&self, hook: HookName) -> Option<HookDeclaration> {
//!         matches!(hook, HookName::ResolveId).then_some(HookDeclaration::Handler)
//!     }
//!
//!     async fn resolve_id(
//!         &self,
//!         _ctx: &PluginContext,
//!         args: &HookResolveIdArgs,
//!     ) -> anyhow::Result<Option<ResolvedId>> {
//!         Ok((args.specifier == "virtual:config").then(|| ResolvedId::new("\0virtual:config")))
//!     }
//! }
//! ```

use crate::config::OutputConfig;
use crate::context::PluginContext;
use crate::hooks::{HookDeclaration, HookName};
use crate::types::{
    DynamicImportResolution, HookLoadArgs, HookLoadOutput, HookRenderChunkArgs,
    HookRenderChunkOutput, HookResolveDynamicImportArgs, HookResolveFileUrlArgs,
    HookResolveIdArgs, HookResolveImportMetaArgs, HookShouldTransformCachedModuleArgs,
    HookTransformArgs, HookTransformOutput, ModuleInfo, RenderedChunk, ResolvedId,
    WatchChangeEvent,
};
use std::borrow::Cow;
use std::sync::Arc;

pub type HookNoopReturn = anyhow::Result<()>;

#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> Cow<'static, str>;

    /// Cache namespace. Defaults to the plugin name.
    fn cache_key(&self) -> Option<Cow<'static, str>> {
        None
    }

    /// How this plugin takes part in `hook`, or `None` if it doesn't.
    fn hook(&self, hook: HookName) -> Option<HookDeclaration>;

    // Build hooks

    async fn build_start(&self, _ctx: &PluginContext) -> HookNoopReturn {
        Ok(())
    }

    async fn resolve_id(
        &self,
        _ctx: &PluginContext,
        _args: &HookResolveIdArgs,
    ) -> anyhow::Result<Option<ResolvedId>> {
        Ok(None)
    }

    async fn resolve_dynamic_import(
        &self,
        _ctx: &PluginContext,
        _args: &HookResolveDynamicImportArgs,
    ) -> anyhow::Result<Option<DynamicImportResolution>> {
        Ok(None)
    }

    async fn load(
        &self,
        _ctx: &PluginContext,
        _args: &HookLoadArgs,
    ) -> anyhow::Result<Option<HookLoadOutput>> {
        Ok(None)
    }

    async fn transform(
        &self,
        _ctx: &PluginContext,
        _args: &HookTransformArgs,
    ) -> anyhow::Result<Option<HookTransformOutput>> {
        Ok(None)
    }

    async fn should_transform_cached_module(
        &self,
        _ctx: &PluginContext,
        _args: &HookShouldTransformCachedModuleArgs,
    ) -> anyhow::Result<Option<bool>> {
        Ok(None)
    }

    async fn module_parsed(&self, _ctx: &PluginContext, _info: &ModuleInfo) -> HookNoopReturn {
        Ok(())
    }

    async fn build_end(&self, _ctx: &PluginContext, _error: Option<&str>) -> HookNoopReturn {
        Ok(())
    }

    async fn watch_change(
        &self,
        _ctx: &PluginContext,
        _id: &str,
        _event: WatchChangeEvent,
    ) -> HookNoopReturn {
        Ok(())
    }

    async fn close_watcher(&self, _ctx: &PluginContext) -> HookNoopReturn {
        Ok(())
    }

    // Output generation hooks

    /// Adjust output options before generation starts.
    fn output_options(
        &self,
        _ctx: &PluginContext,
        _options: &OutputConfig,
    ) -> anyhow::Result<Option<OutputConfig>> {
        Ok(None)
    }

    async fn render_start(&self, _ctx: &PluginContext, _options: &OutputConfig) -> HookNoopReturn {
        Ok(())
    }

    async fn banner(
        &self,
        _ctx: &PluginContext,
        _chunk: &RenderedChunk,
    ) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    async fn footer(
        &self,
        _ctx: &PluginContext,
        _chunk: &RenderedChunk,
    ) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    async fn intro(
        &self,
        _ctx: &PluginContext,
        _chunk: &RenderedChunk,
    ) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    async fn outro(
        &self,
        _ctx: &PluginContext,
        _chunk: &RenderedChunk,
    ) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    async fn render_chunk(
        &self,
        _ctx: &PluginContext,
        _args: &HookRenderChunkArgs,
    ) -> anyhow::Result<Option<HookRenderChunkOutput>> {
        Ok(None)
    }

    /// Extra input for a chunk's content hash.
    fn augment_chunk_hash(
        &self,
        _ctx: &PluginContext,
        _chunk: &RenderedChunk,
    ) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    fn resolve_file_url(
        &self,
        _ctx: &PluginContext,
        _args: &HookResolveFileUrlArgs,
    ) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    fn resolve_import_meta(
        &self,
        _ctx: &PluginContext,
        _args: &HookResolveImportMetaArgs,
    ) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    /// Inspect or edit the bundle through `PluginContext::with_output_bundle`.
    async fn generate_bundle(&self, _ctx: &PluginContext, _is_write: bool) -> HookNoopReturn {
        Ok(())
    }

    async fn write_bundle(&self, _ctx: &PluginContext) -> HookNoopReturn {
        Ok(())
    }

    async fn render_error(&self, _ctx: &PluginContext, _error: &str) -> HookNoopReturn {
        Ok(())
    }

    async fn close_bundle(&self, _ctx: &PluginContext) -> HookNoopReturn {
        Ok(())
    }
}

pub type SharedPlugin = Arc<dyn Plugin>;

/// A plugin together with the name it is known by in one driver.
///
/// Plugins with an empty name are called `at position N`, or
/// `at output position N` when added to an output driver.
#[derive(Clone)]
pub struct RegisteredPlugin {
    pub name: String,
    pub plugin: SharedPlugin,
    output: bool,
}

impl RegisteredPlugin {
    pub(crate) fn new(plugin: SharedPlugin, position: usize, output: bool) -> Self {
        let name = plugin.name();
        let name = if name.is_empty() {
            if output {
                format!("{}{}", ANONYMOUS_OUTPUT_PLUGIN_PREFIX, position + 1)
            } else {
                format!("{}{}", ANONYMOUS_PLUGIN_PREFIX, position + 1)
            }
        } else {
            name.into_owned()
        };
        Self {
            name,
            plugin,
            output,
        }
    }

    /// Whether the plugin was added for one output only. Such plugins never
    /// run input hooks.
    pub fn is_output(&self) -> bool {
        self.output
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.starts_with(ANONYMOUS_PLUGIN_PREFIX)
            || self.name.starts_with(ANONYMOUS_OUTPUT_PLUGIN_PREFIX)
    }
}

impl std::fmt::Debug for RegisteredPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredPlugin")
            .field("name", &self.name)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

pub const ANONYMOUS_PLUGIN_PREFIX: &str = "at position ";
pub const ANONYMOUS_OUTPUT_PLUGIN_PREFIX: &str = "at output position ";
