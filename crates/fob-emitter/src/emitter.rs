//! Registry of files emitted by plugins.
//!
//! A [`FileEmitter`] belongs to one driver. The input-stage emitter can spawn
//! output-stage emitters with [`FileEmitter::create_output_emitter`]; they
//! start from a copy of the parent's table, share its reference-id space and
//! receive every file the parent emits afterwards.
//!
//! Locking: each emitter guards its table and output with one mutex. The
//! family's id set and phase have their own locks. No method holds two
//! emitter state locks at once and log handlers are only called after the
//! state lock is released.

use crate::bundle::{BundleEntry, OutputAsset, OutputBundle, OutputChunk};
use crate::error::{EmitterError, Result};
use crate::file::{
    AssetSource, ChunkLoader, ChunkModule, EmittedAsset, EmittedChunk, EmittedFile,
    EmittedPrebuiltChunk, FileKind, ReferenceId,
};
use crate::log::{FILE_NAME_CONFLICT, Log, LogLevel, SharedLogHandler, default_log_handler};
use crate::options::AssetOutputOptions;
use crate::pattern::is_path_fragment;
use indexmap::IndexMap;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Length of a reference id in hex characters.
pub const REFERENCE_ID_LENGTH: usize = 8;

/// Where the build currently is. Shared by all emitters of a family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildPhase {
    #[default]
    LoadAndParse,
    Analyse,
    Generate,
}

/// Hex SHA-256 of an asset source.
pub fn source_hash(source: &AssetSource) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
struct ConsumedAsset {
    reference_id: ReferenceId,
    name: Option<String>,
    file_name: Option<String>,
    original_file_name: Option<String>,
    source: Option<AssetSource>,
    needs_code_reference: bool,
}

impl ConsumedAsset {
    fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.file_name.clone())
            .unwrap_or_else(|| self.reference_id.to_string())
    }

    fn to_output(&self, file_name: String, source: AssetSource) -> OutputAsset {
        OutputAsset {
            file_name,
            name: self.name.clone(),
            original_file_name: self.original_file_name.clone(),
            source,
            needs_code_reference: self.needs_code_reference,
        }
    }
}

#[derive(Debug, Clone)]
struct ConsumedChunk {
    name: String,
    file_name: Option<String>,
    module: ChunkModule,
}

#[derive(Debug, Clone)]
enum ConsumedFile {
    Asset(ConsumedAsset),
    Chunk(ConsumedChunk),
    PrebuiltChunk(EmittedPrebuiltChunk),
}

impl ConsumedFile {
    fn kind(&self) -> FileKind {
        match self {
            ConsumedFile::Asset(_) => FileKind::Asset,
            ConsumedFile::Chunk(_) => FileKind::Chunk,
            ConsumedFile::PrebuiltChunk(_) => FileKind::PrebuiltChunk,
        }
    }
}

#[derive(Debug)]
struct OutputTarget {
    bundle: OutputBundle,
    file_names_by_source: FxHashMap<String, String>,
    options: AssetOutputOptions,
}

#[derive(Debug, Default)]
struct EmitterState {
    files: IndexMap<ReferenceId, ConsumedFile>,
    next_id_base: u64,
    output: Option<OutputTarget>,
    facade_chunk_by_module: Option<FxHashMap<String, String>>,
}

#[derive(Debug, Default)]
struct EmitterFamily {
    reference_ids: Mutex<FxHashSet<ReferenceId>>,
    phase: Mutex<BuildPhase>,
}

pub struct FileEmitter {
    state: Mutex<EmitterState>,
    family: Arc<EmitterFamily>,
    children: Mutex<Vec<Arc<FileEmitter>>>,
    log_handler: SharedLogHandler,
    log_level: LogLevel,
    chunk_loader: Option<Arc<dyn ChunkLoader>>,
}

impl std::fmt::Debug for FileEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEmitter")
            .field("files", &self.state.lock().files.len())
            .field("outputs", &self.children.lock().len())
            .finish()
    }
}

impl Default for FileEmitter {
    fn default() -> Self {
        Self::new(default_log_handler(), None)
    }
}

impl FileEmitter {
    /// Create an input-stage emitter.
    pub fn new(log_handler: SharedLogHandler, chunk_loader: Option<Arc<dyn ChunkLoader>>) -> Self {
        Self {
            state: Mutex::new(EmitterState {
                next_id_base: 1,
                ..Default::default()
            }),
            family: Arc::new(EmitterFamily::default()),
            children: Mutex::new(Vec::new()),
            log_handler,
            log_level: LogLevel::default(),
            chunk_loader,
        }
    }

    /// Only pass warnings to the log handler if `level` allows them.
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Create an output-stage emitter linked to this one.
    pub fn create_output_emitter(self: &Arc<Self>) -> Arc<FileEmitter> {
        let files = self.state.lock().files.clone();
        let child = Arc::new(FileEmitter {
            state: Mutex::new(EmitterState {
                files,
                next_id_base: 1,
                ..Default::default()
            }),
            family: Arc::clone(&self.family),
            children: Mutex::new(Vec::new()),
            log_handler: Arc::clone(&self.log_handler),
            log_level: self.log_level,
            chunk_loader: self.chunk_loader.clone(),
        });
        self.children.lock().push(Arc::clone(&child));
        child
    }

    pub fn phase(&self) -> BuildPhase {
        *self.family.phase.lock()
    }

    pub fn set_phase(&self, phase: BuildPhase) {
        *self.family.phase.lock() = phase;
    }

    pub fn log_handler(&self) -> &SharedLogHandler {
        &self.log_handler
    }

    /// Register a file and return its reference id.
    pub fn emit_file(&self, file: impl Into<EmittedFile>) -> Result<ReferenceId> {
        match file.into() {
            EmittedFile::PrebuiltChunk(chunk) => self.emit_prebuilt_chunk(chunk),
            EmittedFile::Chunk(chunk) => {
                validate_name(chunk.file_name.as_deref().or(chunk.name.as_deref()))?;
                self.emit_chunk(chunk)
            }
            EmittedFile::Asset(asset) => {
                validate_name(asset.file_name.as_deref().or(asset.name.as_deref()))?;
                self.emit_asset(asset)
            }
        }
    }

    /// Kinds of all files known to this emitter, in emission order.
    pub fn emitted_files(&self) -> Vec<(ReferenceId, FileKind)> {
        self.state
            .lock()
            .files
            .iter()
            .map(|(id, file)| (id.clone(), file.kind()))
            .collect()
    }

    /// Output file name of an emitted file.
    pub fn get_file_name(&self, reference_id: &ReferenceId) -> Result<String> {
        let state = self.state.lock();
        let file = state
            .files
            .get(reference_id)
            .ok_or_else(|| EmitterError::UnknownReference(reference_id.to_string()))?;
        match file {
            ConsumedFile::Asset(asset) => asset
                .file_name
                .clone()
                .ok_or_else(|| EmitterError::AssetNotFinalised(asset.display_name())),
            ConsumedFile::PrebuiltChunk(chunk) => Ok(chunk.file_name.clone()),
            ConsumedFile::Chunk(chunk) => {
                if let Some(file_name) = &chunk.file_name {
                    return Ok(file_name.clone());
                }
                state
                    .facade_chunk_by_module
                    .as_ref()
                    .and_then(|facades| chunk.module.get().and_then(|m| facades.get(m)))
                    .cloned()
                    .ok_or_else(|| EmitterError::ChunkNotGenerated(chunk.name.clone()))
            }
        }
    }

    /// Provide the source of an asset emitted without one.
    pub fn set_asset_source(
        &self,
        reference_id: &ReferenceId,
        source: impl Into<AssetSource>,
    ) -> Result<()> {
        let source = source.into();
        let mut logs = Vec::new();
        let pending = {
            let mut state = self.state.lock();
            let asset = match state.files.get(reference_id) {
                None => {
                    return Err(EmitterError::UnknownAssetReference(reference_id.to_string()));
                }
                Some(ConsumedFile::Asset(asset)) => asset.clone(),
                Some(_) => return Err(EmitterError::NotAnAsset(reference_id.to_string())),
            };
            if asset.source.is_some() {
                return Err(EmitterError::AssetSourceAlreadySet(asset.display_name()));
            }

            if state.output.is_some() {
                finalize_additional_asset(&mut state, &asset, source.clone(), &mut logs)?;
                None
            } else {
                if let Some(ConsumedFile::Asset(entry)) = state.files.get_mut(reference_id) {
                    entry.source = Some(source.clone());
                }
                Some(asset)
            }
        };
        self.emit_logs(logs);

        if let Some(asset) = pending {
            for child in self.children() {
                child.receive_late_source(&asset, &source)?;
            }
        }
        Ok(())
    }

    /// Record which output file each entry module ended up in.
    pub fn set_chunk_information(&self, facade_chunk_by_module: FxHashMap<String, String>) {
        self.state.lock().facade_chunk_by_module = Some(facade_chunk_by_module);
    }

    /// Bind this emitter to an output bundle and finalize pending files into it.
    ///
    /// Assets with the same content and no fixed file name are written once,
    /// under the shortest candidate name (ties broken lexicographically).
    pub fn set_output_bundle(&self, bundle: OutputBundle, options: AssetOutputOptions) -> Result<()> {
        let mut logs = Vec::new();
        let result = {
            let mut state = self.state.lock();
            state.output = Some(OutputTarget {
                bundle,
                file_names_by_source: FxHashMap::default(),
                options,
            });
            finalize_pending_files(&mut state, &mut logs)
        };
        self.emit_logs(logs);
        result
    }

    pub fn has_output(&self) -> bool {
        self.state.lock().output.is_some()
    }

    /// Run `f` against the bound output bundle.
    ///
    /// `f` must not call back into this emitter.
    pub fn with_output_bundle<R>(&self, f: impl FnOnce(&mut OutputBundle) -> R) -> Option<R> {
        let mut state = self.state.lock();
        state.output.as_mut().map(|output| f(&mut output.bundle))
    }

    /// A snapshot of the bound output bundle.
    pub fn output_bundle(&self) -> Option<OutputBundle> {
        self.with_output_bundle(|bundle| bundle.clone())
    }

    /// Fail if any emitted asset never received a source or a file name.
    ///
    /// Assets emitted with a fixed file name but no source are reported too;
    /// their name stays reserved in the bundle until a source arrives.
    pub fn finalise_assets(&self) -> Result<()> {
        let state = self.state.lock();
        let missing: Vec<String> = state
            .files
            .values()
            .filter_map(|file| match file {
                ConsumedFile::Asset(asset)
                    if asset.source.is_none() || asset.file_name.is_none() =>
                {
                    Some(asset.display_name())
                }
                _ => None,
            })
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EmitterError::NoAssetSourceSet(missing.join("\", \"")))
        }
    }

    fn children(&self) -> Vec<Arc<FileEmitter>> {
        self.children.lock().clone()
    }

    fn emit_logs(&self, logs: Vec<Log>) {
        if !self.log_level.allows(LogLevel::Warn) {
            return;
        }
        for log in logs {
            self.log_handler.on_log(LogLevel::Warn, log);
        }
    }

    fn next_seed(&self) -> String {
        let mut state = self.state.lock();
        let seed = state.next_id_base;
        state.next_id_base += 1;
        seed.to_string()
    }

    /// Hash `seed` until the result is unused in the family, then claim it.
    fn reserve_reference_id(&self, seed: &str) -> ReferenceId {
        let mut ids = self.family.reference_ids.lock();
        let mut candidate = seed.to_string();
        loop {
            let mut hasher = Sha256::new();
            hasher.update(candidate.as_bytes());
            let digest = format!("{:x}", hasher.finalize());
            candidate = digest[..REFERENCE_ID_LENGTH].to_string();
            let id = ReferenceId::new(candidate.as_str());
            if !ids.contains(&id) {
                ids.insert(id.clone());
                return id;
            }
        }
    }

    /// Claim an id for `file` and register it here and in every output emitter.
    fn assign_reference_id(
        &self,
        seed: &str,
        build: impl FnOnce(ReferenceId) -> ConsumedFile,
    ) -> (ReferenceId, ConsumedFile) {
        let reference_id = self.reserve_reference_id(seed);
        let file = build(reference_id.clone());
        self.state
            .lock()
            .files
            .insert(reference_id.clone(), file.clone());
        for child in self.children() {
            child
                .state
                .lock()
                .files
                .insert(reference_id.clone(), file.clone());
        }
        tracing::debug!(reference_id = %reference_id, kind = %file.kind(), "emitted file");
        (reference_id, file)
    }

    fn emit_asset(&self, emitted: EmittedAsset) -> Result<ReferenceId> {
        let seed = match emitted.file_name.as_ref().or(emitted.name.as_ref()) {
            Some(seed) => seed.clone(),
            None => self.next_seed(),
        };
        let asset = ConsumedAsset {
            reference_id: ReferenceId::new(""),
            name: emitted.name,
            file_name: emitted.file_name,
            original_file_name: emitted.original_file_name,
            source: emitted.source,
            needs_code_reference: emitted.needs_code_reference,
        };
        let (reference_id, _) = self.assign_reference_id(&seed, |reference_id| {
            ConsumedFile::Asset(ConsumedAsset {
                reference_id,
                ..asset.clone()
            })
        });
        let asset = ConsumedAsset {
            reference_id: reference_id.clone(),
            ..asset
        };

        if self.has_output() {
            self.place_asset(&asset)?;
        } else {
            for child in self.children() {
                if child.has_output() {
                    child.place_asset(&asset)?;
                }
            }
        }
        Ok(reference_id)
    }

    /// Reserve a fixed name and finalize the asset if its source is known.
    fn place_asset(&self, asset: &ConsumedAsset) -> Result<()> {
        let mut logs = Vec::new();
        let result = {
            let mut state = self.state.lock();
            match state.output.as_mut() {
                None => Ok(()),
                Some(output) => {
                    if let Some(file_name) = &asset.file_name {
                        reserve_file_name(&mut output.bundle, file_name, &mut logs);
                    }
                    match asset.source.clone() {
                        Some(source) => {
                            finalize_additional_asset(&mut state, asset, source, &mut logs)
                        }
                        None => Ok(()),
                    }
                }
            }
        };
        self.emit_logs(logs);
        result
    }

    /// Apply a source that was set on the parent emitter.
    fn receive_late_source(&self, asset: &ConsumedAsset, source: &AssetSource) -> Result<()> {
        let mut logs = Vec::new();
        let result = {
            let mut state = self.state.lock();
            let already_set = matches!(
                state.files.get(&asset.reference_id),
                Some(ConsumedFile::Asset(existing)) if existing.source.is_some()
            );
            if already_set {
                Ok(())
            } else if state.output.is_some() {
                finalize_additional_asset(&mut state, asset, source.clone(), &mut logs)
            } else {
                if let Some(ConsumedFile::Asset(entry)) = state.files.get_mut(&asset.reference_id) {
                    entry.source = Some(source.clone());
                }
                Ok(())
            }
        };
        self.emit_logs(logs);
        result
    }

    fn emit_chunk(&self, emitted: EmittedChunk) -> Result<ReferenceId> {
        if self.phase() > BuildPhase::LoadAndParse {
            return Err(EmitterError::InvalidPhaseForChunkEmission);
        }
        if emitted.id.is_empty() {
            return Err(EmitterError::validation(
                "Emitted chunks need to have a valid string id, received \"\"",
            ));
        }
        let module = ChunkModule::new();
        if let Some(loader) = &self.chunk_loader {
            loader.emit_chunk(&emitted, module.clone());
        }
        let (reference_id, _) = self.assign_reference_id(&emitted.id, |_| {
            ConsumedFile::Chunk(ConsumedChunk {
                name: emitted.name.clone().unwrap_or_else(|| emitted.id.clone()),
                file_name: emitted.file_name.clone(),
                module,
            })
        });
        Ok(reference_id)
    }

    fn emit_prebuilt_chunk(&self, chunk: EmittedPrebuiltChunk) -> Result<ReferenceId> {
        if chunk.file_name.is_empty() || is_path_fragment(&chunk.file_name) {
            return Err(EmitterError::validation(format!(
                "The \"fileName\" property of emitted prebuilt chunks must be strings that are neither absolute nor relative paths, received \"{}\".",
                chunk.file_name
            )));
        }
        let seed = chunk.file_name.clone();
        let (reference_id, _) =
            self.assign_reference_id(&seed, |_| ConsumedFile::PrebuiltChunk(chunk.clone()));

        if self.has_output() {
            self.place_prebuilt_chunk(&chunk);
        } else {
            for child in self.children() {
                child.place_prebuilt_chunk(&chunk);
            }
        }
        Ok(reference_id)
    }

    fn place_prebuilt_chunk(&self, chunk: &EmittedPrebuiltChunk) {
        let mut logs = Vec::new();
        {
            let mut state = self.state.lock();
            if let Some(output) = state.output.as_mut() {
                insert_entry(
                    &mut output.bundle,
                    chunk.file_name.clone(),
                    BundleEntry::Chunk(prebuilt_output_chunk(chunk)),
                    &mut logs,
                );
            }
        }
        self.emit_logs(logs);
    }
}

fn validate_name(name: Option<&str>) -> Result<()> {
    match name {
        Some(name) if name.is_empty() || is_path_fragment(name) => Err(EmitterError::validation(format!(
            "The \"fileName\" or \"name\" properties of emitted chunks and assets must be strings that are neither absolute nor relative paths, received \"{}\".",
            name
        ))),
        _ => Ok(()),
    }
}

fn prebuilt_output_chunk(chunk: &EmittedPrebuiltChunk) -> OutputChunk {
    OutputChunk {
        file_name: chunk.file_name.clone(),
        name: chunk.file_name.clone(),
        code: chunk.code.clone(),
        exports: chunk.exports.clone(),
        map: chunk.map.clone(),
        sourcemap_file_name: chunk.sourcemap_file_name.clone(),
        ..Default::default()
    }
}

fn conflict_log(file_name: &str, message: String) -> Log {
    Log::new(message)
        .with_code(FILE_NAME_CONFLICT)
        .with_meta(serde_json::json!({ "fileName": file_name }))
}

fn case_conflict_log(file_name: &str) -> Log {
    conflict_log(
        file_name,
        format!(
            "The emitted file \"{}\" differs from a previously emitted file only by letter case. This may lead to conflicts on case-insensitive file systems.",
            file_name
        ),
    )
}

/// Insert an entry, reporting case-only collisions.
fn insert_entry(bundle: &mut OutputBundle, file_name: String, entry: BundleEntry, logs: &mut Vec<Log>) {
    let log = case_conflict_log(&file_name);
    if bundle.insert(file_name, entry) {
        logs.push(log);
    }
}

/// Claim a fixed file name before the asset is finalized.
fn reserve_file_name(bundle: &mut OutputBundle, file_name: &str, logs: &mut Vec<Log>) {
    if bundle.contains(file_name) {
        logs.push(conflict_log(
            file_name,
            format!(
                "The emitted file \"{}\" overwrites a previously emitted file of the same name.",
                file_name
            ),
        ));
        return;
    }
    insert_entry(bundle, file_name.to_string(), BundleEntry::Reserved, logs);
}

/// Write one asset into the output, reusing the name of identical content.
fn finalize_additional_asset(
    state: &mut EmitterState,
    asset: &ConsumedAsset,
    source: AssetSource,
    logs: &mut Vec<Log>,
) -> Result<()> {
    let EmitterState { files, output, .. } = state;
    let Some(output) = output.as_mut() else {
        return Ok(());
    };

    let file_name = match &asset.file_name {
        Some(file_name) => file_name.clone(),
        None => {
            let hash = source_hash(&source);
            match output.file_names_by_source.get(&hash) {
                Some(existing) => existing.clone(),
                None => {
                    let generated = output.options.asset_file_name(
                        asset.name.as_deref(),
                        &source,
                        &hash,
                        &output.bundle,
                    )?;
                    output.file_names_by_source.insert(hash, generated.clone());
                    generated
                }
            }
        }
    };

    files.insert(
        asset.reference_id.clone(),
        ConsumedFile::Asset(ConsumedAsset {
            file_name: Some(file_name.clone()),
            source: Some(source.clone()),
            ..asset.clone()
        }),
    );

    match output.bundle.get_mut(&file_name) {
        Some(BundleEntry::Asset(existing)) => {
            existing.needs_code_reference &= asset.needs_code_reference;
        }
        _ => {
            let entry = BundleEntry::Asset(asset.to_output(file_name.clone(), source));
            insert_entry(&mut output.bundle, file_name, entry, logs);
        }
    }
    Ok(())
}

/// Finalize everything that was emitted before the output existed.
fn finalize_pending_files(state: &mut EmitterState, logs: &mut Vec<Log>) -> Result<()> {
    let pending: Vec<ConsumedFile> = state.files.values().cloned().collect();

    if let Some(output) = state.output.as_mut() {
        for file in &pending {
            match file {
                ConsumedFile::Asset(ConsumedAsset {
                    file_name: Some(file_name),
                    ..
                }) => reserve_file_name(&mut output.bundle, file_name, logs),
                ConsumedFile::PrebuiltChunk(chunk) => {
                    reserve_file_name(&mut output.bundle, &chunk.file_name, logs)
                }
                _ => {}
            }
        }
    }

    let mut by_hash: IndexMap<String, Vec<ConsumedAsset>> = IndexMap::new();
    for file in pending {
        match file {
            ConsumedFile::Asset(asset) => {
                let Some(source) = asset.source.clone() else {
                    continue;
                };
                if asset.file_name.is_some() {
                    finalize_additional_asset(state, &asset, source, logs)?;
                } else {
                    by_hash.entry(source_hash(&source)).or_default().push(asset);
                }
            }
            ConsumedFile::PrebuiltChunk(chunk) => {
                if let Some(output) = state.output.as_mut() {
                    output
                        .bundle
                        .insert(chunk.file_name.clone(), BundleEntry::Chunk(prebuilt_output_chunk(&chunk)));
                }
            }
            ConsumedFile::Chunk(_) => {}
        }
    }

    for (hash, group) in by_hash {
        finalize_assets_with_same_source(state, &group, hash, logs)?;
    }
    Ok(())
}

/// Pick one file name for assets with identical content and write a single entry.
fn finalize_assets_with_same_source(
    state: &mut EmitterState,
    group: &[ConsumedAsset],
    hash: String,
    logs: &mut Vec<Log>,
) -> Result<()> {
    let EmitterState { files, output, .. } = state;
    let Some(output) = output.as_mut() else {
        return Ok(());
    };

    let mut winner: Option<(String, &ConsumedAsset, &AssetSource)> = None;
    let mut needs_code_reference = true;
    for asset in group {
        let Some(source) = asset.source.as_ref() else {
            continue;
        };
        needs_code_reference &= asset.needs_code_reference;
        let candidate =
            output
                .options
                .asset_file_name(asset.name.as_deref(), source, &hash, &output.bundle)?;
        let better = match &winner {
            None => true,
            Some((current, _, _)) => {
                candidate.len() < current.len()
                    || (candidate.len() == current.len() && candidate < *current)
            }
        };
        if better {
            winner = Some((candidate, asset, source));
        }
    }
    let Some((file_name, used, source)) = winner else {
        return Ok(());
    };

    output
        .file_names_by_source
        .insert(hash, file_name.clone());
    for asset in group {
        files.insert(
            asset.reference_id.clone(),
            ConsumedFile::Asset(ConsumedAsset {
                file_name: Some(file_name.clone()),
                ..asset.clone()
            }),
        );
    }

    let entry = BundleEntry::Asset(OutputAsset {
        needs_code_reference,
        ..used.to_output(file_name.clone(), source.clone())
    });
    insert_entry(&mut output.bundle, file_name, entry, logs);
    Ok(())
}
