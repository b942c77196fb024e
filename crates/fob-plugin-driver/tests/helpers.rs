//! Shared test utilities for fob-plugin-driver tests

#![allow(dead_code)]

use fob_emitter::{ChunkModule, EmittedChunk, Log, LogHandler, LogLevel};
use fob_plugin_driver::{
    HookDeclaration, HookName, HookResolveIdArgs, HookTransformArgs, HookTransformOutput,
    ModuleInfo, ModuleLoader, ParseOptions, Parser, Plugin, PluginContext, RenderedChunk,
    ResolvedId,
};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::sync::Arc;

pub type Events = Arc<Mutex<Vec<String>>>;

pub fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn position(events: &[String], event: &str) -> usize {
    events
        .iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("missing event {event:?} in {events:?}"))
}

/// Log handler that keeps every record for later assertions.
#[derive(Default)]
pub struct CollectingLogHandler {
    logs: Mutex<Vec<(LogLevel, Log)>>,
}

impl CollectingLogHandler {
    pub fn logs(&self) -> Vec<(LogLevel, Log)> {
        self.logs.lock().clone()
    }

    pub fn codes(&self) -> Vec<String> {
        self.logs
            .lock()
            .iter()
            .filter_map(|(_, log)| log.code.clone())
            .collect()
    }
}

impl LogHandler for CollectingLogHandler {
    fn on_log(&self, level: LogLevel, log: Log) {
        self.logs.lock().push((level, log));
    }
}

/// A plugin that records when its hooks run.
///
/// `build_start` records `"<name>:start"`, yields `yields` times and records
/// `"<name>:end"`. Other hooks record `"<name>:<hook>"`.
pub struct Recorder {
    pub name: String,
    pub events: Events,
    pub hooks: Vec<(HookName, HookDeclaration)>,
    pub yields: usize,
    pub suffix: Option<String>,
    pub resolves: Option<(String, String)>,
    pub addon: Option<String>,
    pub fails_in: Option<HookName>,
}

impl Recorder {
    pub fn new(name: &str, events: &Events) -> Self {
        Self {
            name: name.to_string(),
            events: Arc::clone(events),
            hooks: Vec::new(),
            yields: 0,
            suffix: None,
            resolves: None,
            addon: None,
            fails_in: None,
        }
    }

    pub fn on(mut self, hook: HookName, declaration: HookDeclaration) -> Self {
        self.hooks.push((hook, declaration));
        self
    }

    pub fn yields(mut self, count: usize) -> Self {
        self.yields = count;
        self
    }

    /// `transform` and `render_chunk` append `suffix` to the code.
    pub fn suffix(mut self, suffix: &str) -> Self {
        self.suffix = Some(suffix.to_string());
        self
    }

    /// `resolve_id` maps `specifier` to `id`.
    pub fn resolves(mut self, specifier: &str, id: &str) -> Self {
        self.resolves = Some((specifier.to_string(), id.to_string()));
        self
    }

    /// Addon hooks and `augment_chunk_hash` return `text`.
    pub fn addon(mut self, text: &str) -> Self {
        self.addon = Some(text.to_string());
        self
    }

    pub fn fails_in(mut self, hook: HookName) -> Self {
        self.fails_in = Some(hook);
        self
    }

    pub fn shared(self) -> Arc<dyn Plugin> {
        Arc::new(self)
    }

    fn record(&self, event: &str) {
        self.events.lock().push(format!("{}:{}", self.name, event));
    }

    fn check(&self, hook: HookName) -> anyhow::Result<()> {
        if self.fails_in == Some(hook) {
            anyhow::bail!("{} failed", self.name);
        }
        Ok(())
    }

    async fn pause(&self) {
        for _ in 0..self.yields {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait::async_trait]
impl Plugin for Recorder {
    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(self.name.clone())
    }

    fn hook(&self, hook: HookName) -> Option<HookDeclaration> {
        self.hooks
            .iter()
            .find(|(name, _)| *name == hook)
            .map(|(_, declaration)| declaration.clone())
    }

    async fn build_start(&self, _ctx: &PluginContext) -> anyhow::Result<()> {
        self.record("start");
        self.pause().await;
        self.record("end");
        self.check(HookName::BuildStart)
    }

    async fn resolve_id(
        &self,
        _ctx: &PluginContext,
        args: &HookResolveIdArgs,
    ) -> anyhow::Result<Option<ResolvedId>> {
        self.record("resolve_id");
        self.check(HookName::ResolveId)?;
        Ok(self
            .resolves
            .as_ref()
            .filter(|(specifier, _)| *specifier == args.specifier)
            .map(|(_, id)| ResolvedId::new(id.clone())))
    }

    async fn load(
        &self,
        _ctx: &PluginContext,
        _args: &fob_plugin_driver::HookLoadArgs,
    ) -> anyhow::Result<Option<fob_plugin_driver::HookLoadOutput>> {
        self.record("load");
        self.pause().await;
        self.check(HookName::Load)?;
        Ok(None)
    }

    async fn transform(
        &self,
        _ctx: &PluginContext,
        args: &HookTransformArgs,
    ) -> anyhow::Result<Option<HookTransformOutput>> {
        self.record("transform");
        self.check(HookName::Transform)?;
        Ok(self
            .suffix
            .as_ref()
            .map(|suffix| format!("{}{}", args.code, suffix).into()))
    }

    async fn banner(
        &self,
        _ctx: &PluginContext,
        _chunk: &RenderedChunk,
    ) -> anyhow::Result<Option<String>> {
        self.record("banner");
        self.pause().await;
        Ok(self.addon.clone())
    }

    async fn intro(
        &self,
        _ctx: &PluginContext,
        _chunk: &RenderedChunk,
    ) -> anyhow::Result<Option<String>> {
        self.record("intro");
        Ok(self.addon.clone())
    }

    fn augment_chunk_hash(
        &self,
        _ctx: &PluginContext,
        _chunk: &RenderedChunk,
    ) -> anyhow::Result<Option<String>> {
        Ok(self.addon.clone())
    }

    async fn generate_bundle(&self, _ctx: &PluginContext, _is_write: bool) -> anyhow::Result<()> {
        self.record("generate_bundle");
        self.check(HookName::GenerateBundle)
    }

    async fn write_bundle(&self, _ctx: &PluginContext) -> anyhow::Result<()> {
        self.record("write_bundle");
        self.pause().await;
        self.record("write_bundle_done");
        self.check(HookName::WriteBundle)
    }
}

/// Module loader backed by fixed data.
#[derive(Default)]
pub struct StaticLoader {
    pub fallback: Option<String>,
    pub modules: Vec<ModuleInfo>,
    pub chunks: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl ModuleLoader for StaticLoader {
    async fn resolve_fallback(
        &self,
        args: &HookResolveIdArgs,
    ) -> anyhow::Result<Option<ResolvedId>> {
        Ok(self
            .fallback
            .as_ref()
            .map(|dir| ResolvedId::new(format!("{}/{}", dir, args.specifier))))
    }

    async fn preload_module(&self, resolved: &ResolvedId) -> anyhow::Result<ModuleInfo> {
        self.module_info(&resolved.id)
            .ok_or_else(|| anyhow::anyhow!("Could not load {}", resolved.id))
    }

    fn emit_chunk(&self, chunk: &EmittedChunk, module: ChunkModule) {
        self.chunks.lock().push(chunk.id.clone());
        module.resolve(chunk.id.clone());
    }

    fn module_info(&self, id: &str) -> Option<ModuleInfo> {
        self.modules.iter().find(|module| module.id == id).cloned()
    }

    fn module_ids(&self) -> Vec<String> {
        self.modules.iter().map(|module| module.id.clone()).collect()
    }
}

pub fn module(id: &str) -> ModuleInfo {
    ModuleInfo {
        id: id.to_string(),
        code: Some(String::new()),
        ..Default::default()
    }
}

/// Parser that returns an empty program for any input.
pub struct EmptyProgramParser;

impl Parser for EmptyProgramParser {
    fn parse(&self, code: &str, _options: &ParseOptions) -> anyhow::Result<serde_json::Value> {
        if code.contains("syntax error") {
            anyhow::bail!("Unexpected token");
        }
        Ok(serde_json::json!({ "type": "Program", "body": [], "end": code.len() }))
    }
}

pub fn chunk(file_name: &str) -> RenderedChunk {
    RenderedChunk {
        name: file_name.trim_end_matches(".js").to_string(),
        file_name: file_name.to_string(),
        is_entry: true,
        ..Default::default()
    }
}
