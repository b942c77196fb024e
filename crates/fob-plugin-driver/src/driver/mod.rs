//! The plugin driver.
//!
//! A [`PluginDriver`] owns the registered plugins, one context per plugin and
//! the file emitter they share. The input-stage driver is built with
//! [`PluginDriverBuilder`]; every build output gets its own driver from
//! [`PluginDriver::create_output_driver`], which adds output plugins on top of
//! the input plugins and shares the reference-id space with its parent.

mod disciplines;
mod hooks;
mod run;

pub use run::HookAction;

use crate::cache::{PluginCache, SharedPluginCache};
use crate::config::{DriverOptions, OutputConfig};
use crate::context::{ContextFactory, PluginContext};
use crate::error::Result;
use crate::hooks::HookName;
use crate::loader::{LoaderChunks, SharedModuleLoader, SharedParser};
use crate::plugin::{RegisteredPlugin, SharedPlugin};
use crate::sorter::{HookSorter, SortedHook};
use crate::types::{HookResolveIdArgs, ResolvedId};
use fob_emitter::log::{INPUT_HOOK_IN_OUTPUT_PLUGIN, default_log_handler};
use fob_emitter::{
    BuildPhase, ChunkLoader, FileEmitter, Log, LogLevel, OutputBundle,
    SharedLogHandler,
};
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Weak};

/// State shared by an input driver and all of its output drivers.
pub(crate) struct BuildState {
    pub(crate) options: DriverOptions,
    pub(crate) log_handler: SharedLogHandler,
    pub(crate) loader: Option<SharedModuleLoader>,
    pub(crate) parser: Option<SharedParser>,
    /// `None` when caching is disabled.
    pub(crate) cache: Option<SharedPluginCache>,
    pub(crate) watch_files: Mutex<IndexSet<String>>,
}

impl BuildState {
    fn warn(&self, log: Log) {
        if self.options.log_level.allows(LogLevel::Warn) {
            self.log_handler.on_log(LogLevel::Warn, log);
        }
    }
}

type ResolveKey = (Option<String>, String);

pub struct PluginDriver {
    plugins: Vec<RegisteredPlugin>,
    contexts: Vec<PluginContext>,
    sorter: HookSorter,
    emitter: Arc<FileEmitter>,
    build: Arc<BuildState>,
    /// Plugins that asked not to resolve `(importer, specifier)` themselves.
    skipped_resolves: Mutex<FxHashMap<ResolveKey, FxHashSet<usize>>>,
    actions: Mutex<IndexMap<u64, HookAction>>,
    next_action: AtomicU64,
}

impl std::fmt::Debug for PluginDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDriver")
            .field("plugins", &self.plugins)
            .field("emitter", &self.emitter)
            .finish_non_exhaustive()
    }
}

impl PluginDriver {
    pub fn builder() -> PluginDriverBuilder {
        PluginDriverBuilder::new()
    }

    fn assemble(
        weak: &Weak<PluginDriver>,
        plugins: Vec<RegisteredPlugin>,
        emitter: Arc<FileEmitter>,
        build: Arc<BuildState>,
    ) -> Self {
        let mut factory = ContextFactory::new(weak.clone(), Arc::clone(&emitter), Arc::clone(&build));
        let contexts = plugins
            .iter()
            .enumerate()
            .map(|(index, plugin)| factory.create(index, plugin))
            .collect();
        Self {
            plugins,
            contexts,
            sorter: HookSorter::new(),
            emitter,
            build,
            skipped_resolves: Mutex::new(FxHashMap::default()),
            actions: Mutex::new(IndexMap::new()),
            next_action: AtomicU64::new(0),
        }
    }

    /// Create the driver of one build output.
    ///
    /// The output driver runs this driver's plugins followed by
    /// `output_plugins`, each with a fresh context. Its file emitter shares
    /// reference ids with this driver's emitter.
    pub fn create_output_driver(
        self: &Arc<Self>,
        output_plugins: impl IntoIterator<Item = SharedPlugin>,
    ) -> Arc<PluginDriver> {
        let mut plugins = self.plugins.clone();
        for (position, plugin) in output_plugins.into_iter().enumerate() {
            let plugin = RegisteredPlugin::new(plugin, position, true);
            for hook in HookName::ALL.iter().filter(|hook| hook.is_input_hook()) {
                if plugin.plugin.hook(*hook).is_some() {
                    self.build.warn(
                        Log::new(format!(
                            "The \"{}\" hook used by the output plugin {} is a build time hook and will not be run for that plugin. Either this plugin cannot be used as an output plugin, or it should have an option to configure it as an output plugin.",
                            hook, plugin.name
                        ))
                        .with_code(INPUT_HOOK_IN_OUTPUT_PLUGIN)
                        .with_plugin(plugin.name.clone()),
                    );
                }
            }
            plugins.push(plugin);
        }

        let emitter = self.emitter.create_output_emitter();
        let build = Arc::clone(&self.build);
        tracing::debug!(plugins = plugins.len(), "Created output plugin driver");
        Arc::new_cyclic(|weak| PluginDriver::assemble(weak, plugins, emitter, build))
    }

    pub fn plugins(&self) -> &[RegisteredPlugin] {
        &self.plugins
    }

    pub fn context(&self, plugin_index: usize) -> Option<&PluginContext> {
        self.contexts.get(plugin_index)
    }

    pub fn options(&self) -> &DriverOptions {
        &self.build.options
    }

    pub fn emitter(&self) -> &Arc<FileEmitter> {
        &self.emitter
    }

    pub fn set_phase(&self, phase: BuildPhase) {
        self.emitter.set_phase(phase);
    }

    /// Bind the bundle this driver's output is written into.
    pub fn set_output_bundle(&self, bundle: OutputBundle, output: &OutputConfig) -> Result<()> {
        Ok(self.emitter.set_output_bundle(bundle, output.asset_options())?)
    }

    pub fn watch_files(&self) -> Vec<String> {
        self.build.watch_files.lock().iter().cloned().collect()
    }

    /// Hook invocations that started and have not settled yet.
    pub fn unfulfilled_actions(&self) -> Vec<HookAction> {
        self.actions.lock().values().cloned().collect()
    }

    /// The cache to hand to the next build, without entries that went unused
    /// for `cache_expiry` builds. `None` when caching is disabled.
    pub fn cache_snapshot(&self) -> Option<PluginCache> {
        let store = self.build.cache.as_ref()?;
        let mut cache = store.lock();
        cache.evict(self.build.options.cache_expiry);
        Some(cache.clone())
    }

    pub(crate) fn sorted(&self, hook: HookName) -> Result<Arc<[SortedHook]>> {
        self.sorter.sorted(hook, &self.plugins)
    }

    /// Run `resolve_id` for a plugin context, optionally recording that the
    /// calling plugin skips this `(importer, specifier)` pair from now on.
    pub(crate) async fn resolve_id_skipping(
        &self,
        args: &HookResolveIdArgs,
        skip: Option<usize>,
    ) -> Result<Option<ResolvedId>> {
        let key = (args.importer.clone(), args.specifier.clone());
        let skipped = {
            let mut skipped_resolves = self.skipped_resolves.lock();
            if let Some(plugin) = skip {
                skipped_resolves.entry(key.clone()).or_default().insert(plugin);
            }
            skipped_resolves.get(&key).cloned().unwrap_or_default()
        };
        let resolved = self
            .hook_first(HookName::ResolveId, args, Some(&skipped), |plugin, ctx| async move {
                plugin.resolve_id(&ctx, args).await
            })
            .await?;
        Ok(resolved.map(|(resolved, _)| resolved))
    }
}

/// Builds the input-stage [`PluginDriver`].
#[derive(Default)]
pub struct PluginDriverBuilder {
    plugins: Vec<SharedPlugin>,
    options: DriverOptions,
    loader: Option<SharedModuleLoader>,
    parser: Option<SharedParser>,
    log_handler: Option<SharedLogHandler>,
    cache: Option<SharedPluginCache>,
}

impl PluginDriverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plugin(mut self, plugin: SharedPlugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn plugins(mut self, plugins: impl IntoIterator<Item = SharedPlugin>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    pub fn options(mut self, options: DriverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn module_loader(mut self, loader: SharedModuleLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn parser(mut self, parser: SharedParser) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Where plugin and emitter logs go. Defaults to `tracing`.
    pub fn log_handler(mut self, handler: SharedLogHandler) -> Self {
        self.log_handler = Some(handler);
        self
    }

    /// Reuse the cache of a previous build.
    pub fn cache(mut self, cache: SharedPluginCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Arc<PluginDriver> {
        let log_handler = self.log_handler.unwrap_or_else(default_log_handler);
        let chunk_loader = self
            .loader
            .clone()
            .map(|loader| Arc::new(LoaderChunks(loader)) as Arc<dyn ChunkLoader>);
        let emitter = Arc::new(
            FileEmitter::new(Arc::clone(&log_handler), chunk_loader)
                .with_log_level(self.options.log_level),
        );

        let cache = self.options.cache.then(|| {
            let store = self.cache.unwrap_or_else(|| PluginCache::new().shared());
            store.lock().age_entries();
            store
        });

        let plugins: Vec<RegisteredPlugin> = self
            .plugins
            .into_iter()
            .enumerate()
            .map(|(position, plugin)| RegisteredPlugin::new(plugin, position, false))
            .collect();
        tracing::debug!(plugins = plugins.len(), "Created plugin driver");

        let build = Arc::new(BuildState {
            options: self.options,
            log_handler,
            loader: self.loader,
            parser: self.parser,
            cache,
            watch_files: Mutex::new(IndexSet::new()),
        });
        Arc::new_cyclic(|weak| PluginDriver::assemble(weak, plugins, emitter, build))
    }
}
