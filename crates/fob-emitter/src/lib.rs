//! # fob-emitter
//!
//! Registry for files emitted by fob plugins.
//!
//! Plugins call [`FileEmitter::emit_file`] with an asset, a chunk or a
//! prebuilt chunk and get back a short [`ReferenceId`]. Once the host binds an
//! [`OutputBundle`], assets are named from the `asset_file_names` pattern,
//! deduplicated by content hash and written into the bundle.
//!
//! ```
//! use fob_emitter::{AssetOutputOptions, EmittedAsset, FileEmitter, OutputBundle};
//!
//! # fn main() -> fob_emitter::Result<()> {
//! let emitter = FileEmitter::default();
//! let id = emitter.emit_file(EmittedAsset::named("logo.svg", "<svg/>"))?;
//!
//! emitter.set_output_bundle(OutputBundle::new(), AssetOutputOptions::new("[name][extname]"))?;
//! assert_eq!(emitter.get_file_name(&id)?, "logo.svg");
//! # Ok(()) }
//! ```

pub mod bundle;
pub mod emitter;
pub mod error;
pub mod file;
pub mod log;
pub mod options;
pub mod pattern;

pub use bundle::{BundleEntry, OutputAsset, OutputBundle, OutputChunk};
pub use emitter::{BuildPhase, FileEmitter, REFERENCE_ID_LENGTH, source_hash};
pub use error::{EmitterError, Result};
pub use file::{
    AssetSource, ChunkLoader, ChunkModule, EmittedAsset, EmittedChunk, EmittedFile,
    EmittedPrebuiltChunk, FileKind, ReferenceId,
};
pub use log::{Log, LogHandler, LogLevel, LogPosition, SharedLogHandler, TracingLogHandler};
pub use options::{
    AssetOutputOptions, DEFAULT_ASSET_FILE_NAMES, FileNamePattern, PreRenderedAsset,
    SanitizeFileName,
};
