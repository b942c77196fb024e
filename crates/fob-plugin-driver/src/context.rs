//! The capability surface handed to plugin hooks.
//!
//! Every plugin gets one [`PluginContext`] per driver. Contexts are cheap to
//! clone and stay valid for as long as the driver lives; calls that need the
//! driver after it has been dropped fail with [`DriverError::DriverDropped`].

use crate::cache::PluginCacheHandle;
use crate::driver::{BuildState, PluginDriver};
use crate::error::{DriverError, Result};
use crate::plugin::RegisteredPlugin;
use crate::types::{HookResolveIdArgs, ModuleInfo, ParseOptions, ResolvedId};
use fob_emitter::log::{
    DEPRECATED_FEATURE, INVALID_LOG_POSITION, PLUGIN_LOG, PLUGIN_WARNING,
};
use fob_emitter::{
    AssetSource, BuildPhase, EmittedFile, FileEmitter, Log, LogLevel, LogPosition, OutputBundle,
    ReferenceId,
};
use indexmap::IndexSet;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::{Arc, Weak};

/// Options of [`PluginContext::resolve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveOptions {
    /// Don't ask the calling plugin's own `resolve_id` for this import.
    pub skip_self: bool,
    pub is_entry: bool,
    pub custom: Option<serde_json::Value>,
}

impl ResolveOptions {
    pub fn skip_self() -> Self {
        Self {
            skip_self: true,
            ..Default::default()
        }
    }
}

/// Build information exposed to plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMeta {
    pub version: &'static str,
    pub watch_mode: bool,
}

/// State of one module's pass through the `transform` hooks.
#[derive(Debug)]
pub(crate) struct TransformScope {
    id: String,
    dependencies: Mutex<IndexSet<String>>,
}

impl TransformScope {
    pub(crate) fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            dependencies: Mutex::new(IndexSet::new()),
        })
    }

    pub(crate) fn dependencies(&self) -> Vec<String> {
        self.dependencies.lock().iter().cloned().collect()
    }
}

struct ContextInner {
    plugin_index: usize,
    plugin_name: String,
    cache: PluginCacheHandle,
    driver: Weak<PluginDriver>,
    emitter: Arc<FileEmitter>,
    build: Arc<BuildState>,
}

#[derive(Clone)]
pub struct PluginContext {
    inner: Arc<ContextInner>,
    transform: Option<Arc<TransformScope>>,
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin", &self.inner.plugin_name)
            .field("transform", &self.transform.as_ref().map(|scope| &scope.id))
            .finish_non_exhaustive()
    }
}

impl PluginContext {
    /// Name of the plugin this context belongs to.
    pub fn name(&self) -> &str {
        &self.inner.plugin_name
    }

    pub(crate) fn plugin_index(&self) -> usize {
        self.inner.plugin_index
    }

    /// A copy of this context that records watch files as dependencies of
    /// the module being transformed and tags logs with its id.
    pub(crate) fn in_transform(&self, scope: &Arc<TransformScope>) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            transform: Some(Arc::clone(scope)),
        }
    }

    fn driver(&self) -> Result<Arc<PluginDriver>> {
        self.inner
            .driver
            .upgrade()
            .ok_or_else(|| DriverError::DriverDropped(self.inner.plugin_name.clone()))
    }

    // Files

    pub fn emit_file(&self, file: impl Into<EmittedFile>) -> Result<ReferenceId> {
        Ok(self.inner.emitter.emit_file(file)?)
    }

    pub fn get_file_name(&self, reference_id: &ReferenceId) -> Result<String> {
        Ok(self.inner.emitter.get_file_name(reference_id)?)
    }

    pub fn set_asset_source(
        &self,
        reference_id: &ReferenceId,
        source: impl Into<AssetSource>,
    ) -> Result<()> {
        Ok(self.inner.emitter.set_asset_source(reference_id, source)?)
    }

    /// Run `f` on the bundle of the current output, if one is bound.
    pub fn with_output_bundle<R>(&self, f: impl FnOnce(&mut OutputBundle) -> R) -> Option<R> {
        self.inner.emitter.with_output_bundle(f)
    }

    // Modules

    /// Resolve an import through the `resolve_id` hooks, then the module
    /// loader.
    pub async fn resolve(
        &self,
        specifier: &str,
        importer: Option<&str>,
        options: ResolveOptions,
    ) -> Result<Option<ResolvedId>> {
        let driver = self.driver()?;
        let args = HookResolveIdArgs {
            specifier: specifier.to_string(),
            importer: importer.map(str::to_string),
            is_entry: options.is_entry,
            custom: options.custom,
        };
        let skip = options.skip_self.then_some(self.inner.plugin_index);
        if let Some(resolved) = driver.resolve_id_skipping(&args, skip).await? {
            return Ok(Some(resolved));
        }
        match &self.inner.build.loader {
            Some(loader) => loader
                .resolve_fallback(&args)
                .await
                .map_err(|source| DriverError::Loader {
                    operation: "resolve",
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Load a module and return its information.
    pub async fn load(&self, resolved: &ResolvedId) -> Result<ModuleInfo> {
        let loader = self
            .inner
            .build
            .loader
            .as_ref()
            .ok_or(DriverError::NoModuleLoader("load modules"))?;
        loader
            .preload_module(resolved)
            .await
            .map_err(|source| DriverError::Loader {
                operation: "load",
                source,
            })
    }

    pub fn parse(&self, code: &str, options: &ParseOptions) -> Result<serde_json::Value> {
        let parser = self.inner.build.parser.as_ref().ok_or(DriverError::NoParser)?;
        parser.parse(code, options).map_err(DriverError::Parse)
    }

    pub fn get_module_info(&self, id: &str) -> Option<ModuleInfo> {
        self.inner
            .build
            .loader
            .as_ref()
            .and_then(|loader| loader.module_info(id))
    }

    pub fn get_module_ids(&self) -> Vec<String> {
        self.inner
            .build
            .loader
            .as_ref()
            .map(|loader| loader.module_ids())
            .unwrap_or_default()
    }

    #[deprecated(note = "use `get_module_ids` instead")]
    pub fn module_ids(&self) -> Vec<String> {
        self.emit(
            LogLevel::Warn,
            Log::new(
                "Accessing \"module_ids\" on the plugin context is deprecated. The \"get_module_ids\" plugin context function should be used instead.",
            )
            .with_code(DEPRECATED_FEATURE)
            .with_plugin(self.inner.plugin_name.clone()),
        );
        self.get_module_ids()
    }

    // Watch files

    pub fn add_watch_file(&self, id: &str) -> Result<()> {
        if self.inner.emitter.phase() >= BuildPhase::Generate {
            return Err(DriverError::InvalidPhaseForWatchFile);
        }
        if let Some(scope) = &self.transform {
            scope.dependencies.lock().insert(id.to_string());
        }
        self.inner.build.watch_files.lock().insert(id.to_string());
        Ok(())
    }

    pub fn get_watch_files(&self) -> Vec<String> {
        self.inner.build.watch_files.lock().iter().cloned().collect()
    }

    // Cache and build info

    pub fn cache(&self) -> &PluginCacheHandle {
        &self.inner.cache
    }

    pub fn meta(&self) -> ContextMeta {
        ContextMeta {
            version: env!("CARGO_PKG_VERSION"),
            watch_mode: self.inner.build.options.watch_mode,
        }
    }

    // Logging

    pub fn debug(&self, log: impl Into<Log>) {
        self.log(LogLevel::Debug, PLUGIN_LOG, log.into(), None);
    }

    pub fn info(&self, log: impl Into<Log>) {
        self.log(LogLevel::Info, PLUGIN_LOG, log.into(), None);
    }

    pub fn warn(&self, log: impl Into<Log>) {
        self.log(LogLevel::Warn, PLUGIN_WARNING, log.into(), None);
    }

    /// Like [`debug`](Self::debug), pointing at a position in the module
    /// being transformed.
    pub fn debug_at(&self, log: impl Into<Log>, pos: LogPosition) {
        self.log(LogLevel::Debug, PLUGIN_LOG, log.into(), Some(pos));
    }

    pub fn info_at(&self, log: impl Into<Log>, pos: LogPosition) {
        self.log(LogLevel::Info, PLUGIN_LOG, log.into(), Some(pos));
    }

    pub fn warn_at(&self, log: impl Into<Log>, pos: LogPosition) {
        self.log(LogLevel::Warn, PLUGIN_WARNING, log.into(), Some(pos));
    }

    /// Build an error to return from a hook.
    ///
    /// Inside `transform` the message is prefixed with the module id.
    pub fn error(&self, log: impl Into<Log>) -> anyhow::Error {
        let mut log = log.into();
        if let Some(scope) = &self.transform {
            log.id.get_or_insert_with(|| scope.id.clone());
        }
        anyhow::Error::msg(log.to_string())
    }

    fn log(&self, level: LogLevel, code: &'static str, mut log: Log, pos: Option<LogPosition>) {
        if !self.inner.build.options.log_level.allows(level) {
            return;
        }
        match &self.transform {
            Some(scope) => {
                log.id = Some(scope.id.clone());
                log.hook = Some("transform".to_string());
                if pos.is_some() {
                    log.pos = pos;
                }
            }
            None if pos.is_some() => self.emit(
                LogLevel::Warn,
                Log::new(format!(
                    "Plugin \"{}\" tried to add a file position to a log or warning. This is only supported in the \"transform\" hook at the moment and will be ignored.",
                    self.inner.plugin_name
                ))
                .with_code(INVALID_LOG_POSITION),
            ),
            None => {}
        }
        let own_code = log.code.replace(code.to_string());
        if log.plugin_code.is_none() {
            log.plugin_code = own_code;
        }
        log.plugin = Some(self.inner.plugin_name.clone());
        self.emit(level, log);
    }

    fn emit(&self, level: LogLevel, log: Log) {
        if self.inner.build.options.log_level.allows(level) {
            self.inner.build.log_handler.on_log(level, log);
        }
    }
}

/// Creates the contexts of one driver.
///
/// The factory remembers which plugin names it has handed a cache to; a second
/// plugin with the same name and no cache key cannot use the cache.
pub(crate) struct ContextFactory {
    seen_names: FxHashSet<String>,
    driver: Weak<PluginDriver>,
    emitter: Arc<FileEmitter>,
    build: Arc<BuildState>,
}

impl ContextFactory {
    pub(crate) fn new(
        driver: Weak<PluginDriver>,
        emitter: Arc<FileEmitter>,
        build: Arc<BuildState>,
    ) -> Self {
        Self {
            seen_names: FxHashSet::default(),
            driver,
            emitter,
            build,
        }
    }

    pub(crate) fn create(&mut self, plugin_index: usize, plugin: &RegisteredPlugin) -> PluginContext {
        let cache_key = plugin.plugin.cache_key().map(Cow::into_owned);
        let cacheable = cache_key.is_some()
            || (!plugin.is_anonymous() && self.seen_names.insert(plugin.name.clone()));

        let cache = match &self.build.cache {
            None => PluginCacheHandle::disabled(),
            Some(store) if cacheable => PluginCacheHandle::namespaced(
                Arc::clone(store),
                cache_key.unwrap_or_else(|| plugin.name.clone()),
            ),
            Some(_) => PluginCacheHandle::uncacheable(plugin.name.clone()),
        };

        PluginContext {
            inner: Arc::new(ContextInner {
                plugin_index,
                plugin_name: plugin.name.clone(),
                cache,
                driver: self.driver.clone(),
                emitter: Arc::clone(&self.emitter),
                build: Arc::clone(&self.build),
            }),
            transform: None,
        }
    }
}
