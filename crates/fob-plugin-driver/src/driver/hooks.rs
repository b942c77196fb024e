//! One method per hook, each using the scheduling the hook is defined with.

use super::PluginDriver;
use crate::config::OutputConfig;
use crate::context::TransformScope;
use crate::error::Result;
use crate::hooks::HookName;
use crate::plugin::RegisteredPlugin;
use crate::types::{
    Addons, DynamicImportResolution, HookLoadArgs, HookLoadOutput, HookRenderChunkArgs,
    HookResolveDynamicImportArgs, HookResolveFileUrlArgs, HookResolveIdArgs,
    HookResolveImportMetaArgs, HookShouldTransformCachedModuleArgs, HookTransformArgs, ModuleInfo,
    RenderedChunk, RenderedChunkCode, ResolvedId, TransformedModule, WatchChangeEvent,
};

impl PluginDriver {
    // Build hooks

    pub async fn build_start(&self) -> Result<()> {
        self.hook_parallel(HookName::BuildStart, &(), |plugin, ctx| async move {
            plugin.build_start(&ctx).await
        })
        .await
    }

    pub async fn resolve_id(&self, args: &HookResolveIdArgs) -> Result<Option<ResolvedId>> {
        let resolved = self
            .hook_first(HookName::ResolveId, args, None, |plugin, ctx| async move {
                plugin.resolve_id(&ctx, args).await
            })
            .await?;
        Ok(resolved.map(|(resolved, _)| resolved))
    }

    pub async fn resolve_dynamic_import(
        &self,
        args: &HookResolveDynamicImportArgs,
    ) -> Result<Option<DynamicImportResolution>> {
        let resolved = self
            .hook_first(HookName::ResolveDynamicImport, args, None, |plugin, ctx| async move {
                plugin.resolve_dynamic_import(&ctx, args).await
            })
            .await?;
        Ok(resolved.map(|(resolved, _)| resolved))
    }

    pub async fn load(&self, id: &str) -> Result<Option<HookLoadOutput>> {
        let args = HookLoadArgs { id: id.to_string() };
        let args = &args;
        let loaded = self
            .hook_first(HookName::Load, args, None, |plugin, ctx| async move {
                plugin.load(&ctx, args).await
            })
            .await?;
        Ok(loaded.map(|(loaded, _)| loaded))
    }

    /// Run every `transform` hook over a module's code.
    ///
    /// Each handler sees the code produced by the previous one. Watch files
    /// added while transforming are returned as the module's dependencies.
    pub async fn transform(&self, id: &str, code: String) -> Result<TransformedModule> {
        let scope = TransformScope::new(id);
        let scope_ref = &scope;
        let mut maps = Vec::new();
        let code = self
            .hook_reduce_arg0(
                HookName::Transform,
                &id,
                code,
                move |plugin, ctx, code| async move {
                    let ctx = ctx.in_transform(scope_ref);
                    let args = HookTransformArgs {
                        id: id.to_string(),
                        code,
                    };
                    plugin.transform(&ctx, &args).await
                },
                |_, code, output, _| match output {
                    Some(output) => {
                        maps.extend(output.map);
                        output.code
                    }
                    None => code,
                },
            )
            .await?;
        Ok(TransformedModule {
            code,
            maps,
            dependencies: scope.dependencies(),
        })
    }

    pub async fn should_transform_cached_module(
        &self,
        args: &HookShouldTransformCachedModuleArgs,
    ) -> Result<bool> {
        let decision = self
            .hook_first(
                HookName::ShouldTransformCachedModule,
                &args.id,
                None,
                |plugin, ctx| async move { plugin.should_transform_cached_module(&ctx, args).await },
            )
            .await?;
        Ok(decision.is_some_and(|(decision, _)| decision))
    }

    pub async fn module_parsed(&self, info: &ModuleInfo) -> Result<()> {
        self.hook_parallel(HookName::ModuleParsed, &info.id, |plugin, ctx| async move {
            plugin.module_parsed(&ctx, info).await
        })
        .await
    }

    pub async fn build_end(&self, error: Option<&str>) -> Result<()> {
        self.hook_parallel(HookName::BuildEnd, &error, |plugin, ctx| async move {
            plugin.build_end(&ctx, error).await
        })
        .await
    }

    pub async fn watch_change(&self, id: &str, event: WatchChangeEvent) -> Result<()> {
        self.hook_parallel(HookName::WatchChange, &(id, event), |plugin, ctx| async move {
            plugin.watch_change(&ctx, id, event).await
        })
        .await
    }

    pub async fn close_watcher(&self) -> Result<()> {
        self.hook_parallel(HookName::CloseWatcher, &(), |plugin, ctx| async move {
            plugin.close_watcher(&ctx).await
        })
        .await
    }

    // Output generation hooks

    /// Let plugins replace the output options. The last replacement wins.
    pub fn output_options(&self, options: OutputConfig) -> Result<OutputConfig> {
        self.hook_reduce_arg0_sync(
            HookName::OutputOptions,
            options,
            |plugin, ctx, options| plugin.output_options(ctx, options),
            |_, options, replaced, _| replaced.unwrap_or(options),
        )
    }

    pub async fn render_start(&self, options: &OutputConfig) -> Result<()> {
        self.hook_parallel(HookName::RenderStart, options, |plugin, ctx| async move {
            plugin.render_start(&ctx, options).await
        })
        .await
    }

    /// Collect banner, footer, intro and outro text for a chunk.
    ///
    /// Contributions are appended to `initial` in plugin order. Banners and
    /// footers are joined with a newline, intros and outros with a blank line.
    pub async fn addons(&self, chunk: &RenderedChunk, initial: Addons) -> Result<Addons> {
        let args = &chunk.file_name;
        let (banner, footer, intro, outro) = futures::try_join!(
            self.hook_reduce_value(
                HookName::Banner,
                args,
                initial.banner,
                |plugin, ctx| async move { plugin.banner(&ctx, chunk).await },
                join_addon("\n"),
            ),
            self.hook_reduce_value(
                HookName::Footer,
                args,
                initial.footer,
                |plugin, ctx| async move { plugin.footer(&ctx, chunk).await },
                join_addon("\n"),
            ),
            self.hook_reduce_value(
                HookName::Intro,
                args,
                initial.intro,
                |plugin, ctx| async move { plugin.intro(&ctx, chunk).await },
                join_addon("\n\n"),
            ),
            self.hook_reduce_value(
                HookName::Outro,
                args,
                initial.outro,
                |plugin, ctx| async move { plugin.outro(&ctx, chunk).await },
                join_addon("\n\n"),
            ),
        )?;
        Ok(Addons {
            banner,
            footer,
            intro,
            outro,
        })
    }

    pub async fn render_chunk(&self, code: String, chunk: &RenderedChunk) -> Result<RenderedChunkCode> {
        let mut maps = Vec::new();
        let code = self
            .hook_reduce_arg0(
                HookName::RenderChunk,
                &chunk.file_name,
                code,
                |plugin, ctx, code| async move {
                    let args = HookRenderChunkArgs {
                        code,
                        chunk: chunk.clone(),
                    };
                    plugin.render_chunk(&ctx, &args).await
                },
                |_, code, output, _| match output {
                    Some(output) => {
                        maps.extend(output.map);
                        output.code
                    }
                    None => code,
                },
            )
            .await?;
        Ok(RenderedChunkCode { code, maps })
    }

    /// Concatenated hash input from every `augment_chunk_hash` handler.
    pub fn augment_chunk_hash(&self, chunk: &RenderedChunk) -> Result<String> {
        self.hook_reduce_value_sync(
            HookName::AugmentChunkHash,
            String::new(),
            |plugin, ctx| plugin.augment_chunk_hash(ctx, chunk),
            |hash, augmentation, _| hash + &augmentation,
        )
    }

    pub fn resolve_file_url(&self, args: &HookResolveFileUrlArgs) -> Result<Option<String>> {
        let url = self.hook_first_sync(HookName::ResolveFileUrl, |plugin, ctx| {
            plugin.resolve_file_url(ctx, args)
        })?;
        Ok(url.map(|(url, _)| url))
    }

    pub fn resolve_import_meta(&self, args: &HookResolveImportMetaArgs) -> Result<Option<String>> {
        let replacement = self.hook_first_sync(HookName::ResolveImportMeta, |plugin, ctx| {
            plugin.resolve_import_meta(ctx, args)
        })?;
        Ok(replacement.map(|(replacement, _)| replacement))
    }

    /// Handlers run one at a time so each sees the previous one's edits to
    /// the bundle.
    pub async fn generate_bundle(&self, is_write: bool) -> Result<()> {
        self.hook_seq(HookName::GenerateBundle, &is_write, |plugin, ctx| async move {
            plugin.generate_bundle(&ctx, is_write).await
        })
        .await
    }

    pub async fn write_bundle(&self) -> Result<()> {
        self.hook_parallel(HookName::WriteBundle, &(), |plugin, ctx| async move {
            plugin.write_bundle(&ctx).await
        })
        .await
    }

    pub async fn render_error(&self, error: &str) -> Result<()> {
        self.hook_parallel(HookName::RenderError, &error, |plugin, ctx| async move {
            plugin.render_error(&ctx, error).await
        })
        .await
    }

    pub async fn close_bundle(&self) -> Result<()> {
        self.hook_parallel(HookName::CloseBundle, &(), |plugin, ctx| async move {
            plugin.close_bundle(&ctx).await
        })
        .await
    }
}

fn join_addon(separator: &'static str) -> impl FnMut(String, String, &RegisteredPlugin) -> String {
    move |joined: String, addon: String, _plugin: &RegisteredPlugin| {
        if addon.is_empty() {
            joined
        } else if joined.is_empty() {
            addon
        } else {
            joined + separator + &addon
        }
    }
}
