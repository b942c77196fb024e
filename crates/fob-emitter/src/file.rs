//! Descriptors for files emitted by plugins.

use arcstr::ArcStr;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Contents of an emitted asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    String(String),
    Bytes(Vec<u8>),
}

impl AssetSource {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AssetSource::String(s) => s.as_bytes(),
            AssetSource::Bytes(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<String> for AssetSource {
    fn from(value: String) -> Self {
        AssetSource::String(value)
    }
}

impl From<&str> for AssetSource {
    fn from(value: &str) -> Self {
        AssetSource::String(value.to_string())
    }
}

impl From<Vec<u8>> for AssetSource {
    fn from(value: Vec<u8>) -> Self {
        AssetSource::Bytes(value)
    }
}

impl From<&[u8]> for AssetSource {
    fn from(value: &[u8]) -> Self {
        AssetSource::Bytes(value.to_vec())
    }
}

/// Handle returned by `emit_file`, stable for the whole build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceId(ArcStr);

impl ReferenceId {
    pub fn new(id: impl Into<ArcStr>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReferenceId {
    fn from(value: &str) -> Self {
        Self(ArcStr::from(value))
    }
}

/// An asset to be written to the output.
#[derive(Debug, Clone, Default)]
pub struct EmittedAsset {
    /// Base name used for `[name]` and `[ext]` in the file name pattern.
    pub name: Option<String>,
    /// Fixed output file name. Skips pattern rendering and deduplication.
    pub file_name: Option<String>,
    pub original_file_name: Option<String>,
    /// May be left empty and provided later with `set_asset_source`.
    pub source: Option<AssetSource>,
    pub needs_code_reference: bool,
}

impl EmittedAsset {
    pub fn named(name: impl Into<String>, source: impl Into<AssetSource>) -> Self {
        Self {
            name: Some(name.into()),
            source: Some(source.into()),
            ..Default::default()
        }
    }

    pub fn with_file_name(file_name: impl Into<String>, source: impl Into<AssetSource>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            source: Some(source.into()),
            ..Default::default()
        }
    }
}

/// An additional entry chunk to be produced from a module id.
#[derive(Debug, Clone, Default)]
pub struct EmittedChunk {
    pub id: String,
    pub name: Option<String>,
    pub file_name: Option<String>,
    pub importer: Option<String>,
    pub preserve_signature: Option<String>,
}

impl EmittedChunk {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Already generated code inserted into the bundle verbatim.
#[derive(Debug, Clone, Default)]
pub struct EmittedPrebuiltChunk {
    pub file_name: String,
    pub code: String,
    pub exports: Vec<String>,
    pub map: Option<String>,
    pub sourcemap_file_name: Option<String>,
}

#[derive(Debug, Clone)]
pub enum EmittedFile {
    Asset(EmittedAsset),
    Chunk(EmittedChunk),
    PrebuiltChunk(EmittedPrebuiltChunk),
}

impl EmittedFile {
    pub fn kind(&self) -> FileKind {
        match self {
            EmittedFile::Asset(_) => FileKind::Asset,
            EmittedFile::Chunk(_) => FileKind::Chunk,
            EmittedFile::PrebuiltChunk(_) => FileKind::PrebuiltChunk,
        }
    }
}

impl From<EmittedAsset> for EmittedFile {
    fn from(value: EmittedAsset) -> Self {
        EmittedFile::Asset(value)
    }
}

impl From<EmittedChunk> for EmittedFile {
    fn from(value: EmittedChunk) -> Self {
        EmittedFile::Chunk(value)
    }
}

impl From<EmittedPrebuiltChunk> for EmittedFile {
    fn from(value: EmittedPrebuiltChunk) -> Self {
        EmittedFile::PrebuiltChunk(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Asset,
    Chunk,
    PrebuiltChunk,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileKind::Asset => "asset",
            FileKind::Chunk => "chunk",
            FileKind::PrebuiltChunk => "prebuilt-chunk",
        })
    }
}

/// Slot for the module backing an emitted chunk.
///
/// The module loader fills it once the chunk's entry module is loaded. Clones
/// share the same slot.
#[derive(Debug, Clone, Default)]
pub struct ChunkModule(Arc<OnceLock<String>>);

impl ChunkModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the loaded module id. Returns `false` if it was already set.
    pub fn resolve(&self, module_id: impl Into<String>) -> bool {
        self.0.set(module_id.into()).is_ok()
    }

    pub fn get(&self) -> Option<&str> {
        self.0.get().map(String::as_str)
    }
}

/// Loads modules for emitted chunks.
///
/// The request is fire-and-forget: failures surface when module loading
/// finishes, not from `emit_file`.
pub trait ChunkLoader: Send + Sync {
    fn emit_chunk(&self, chunk: &EmittedChunk, module: ChunkModule);
}
