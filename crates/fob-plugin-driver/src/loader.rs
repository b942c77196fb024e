//! Collaborators the driver consumes but does not implement.

use crate::types::{HookResolveIdArgs, ModuleInfo, ParseOptions, ResolvedId};
use fob_emitter::{ChunkLoader, ChunkModule, EmittedChunk};
use std::sync::Arc;

/// The host's module graph.
///
/// `resolve_fallback` runs after every plugin declined to resolve an import.
/// `None` means the loader has no opinion either.
#[async_trait::async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn resolve_fallback(&self, args: &HookResolveIdArgs)
    -> anyhow::Result<Option<ResolvedId>>;

    /// Load a module and everything it needs to produce [`ModuleInfo`].
    async fn preload_module(&self, resolved: &ResolvedId) -> anyhow::Result<ModuleInfo>;

    /// Start loading the entry module of an emitted chunk and fill `module`
    /// once it is known.
    fn emit_chunk(&self, chunk: &EmittedChunk, module: ChunkModule);

    fn module_info(&self, id: &str) -> Option<ModuleInfo>;

    fn module_ids(&self) -> Vec<String>;
}

pub type SharedModuleLoader = Arc<dyn ModuleLoader>;

/// Turns source text into an ESTree-shaped AST.
pub trait Parser: Send + Sync {
    fn parse(&self, code: &str, options: &ParseOptions) -> anyhow::Result<serde_json::Value>;
}

pub type SharedParser = Arc<dyn Parser>;

/// Lets the file emitter hand chunk requests to the module loader.
pub(crate) struct LoaderChunks(pub(crate) SharedModuleLoader);

impl ChunkLoader for LoaderChunks {
    fn emit_chunk(&self, chunk: &EmittedChunk, module: ChunkModule) {
        tracing::debug!(id = %chunk.id, "Loading emitted chunk");
        self.0.emit_chunk(chunk, module);
    }
}
