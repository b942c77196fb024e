//! Shared test utilities for fob-emitter tests

#![allow(dead_code)]

use fob_emitter::{
    ChunkLoader, ChunkModule, EmittedChunk, FileEmitter, Log, LogHandler, LogLevel,
    SharedLogHandler,
};
use parking_lot::Mutex;
use std::sync::Arc;

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

/// Chunk loader that resolves every chunk to its own id immediately.
#[derive(Default)]
pub struct ImmediateChunkLoader {
    pub requested: Mutex<Vec<String>>,
}

impl ChunkLoader for ImmediateChunkLoader {
    fn emit_chunk(&self, chunk: &EmittedChunk, module: ChunkModule) {
        self.requested.lock().push(chunk.id.clone());
        module.resolve(chunk.id.clone());
    }
}

/// An input-stage emitter that records its logs.
pub fn recording_emitter() -> (Arc<FileEmitter>, Arc<CollectingLogHandler>) {
    recording_emitter_at(LogLevel::default())
}

/// Like [`recording_emitter`], passing on only warnings `level` allows.
pub fn recording_emitter_at(level: LogLevel) -> (Arc<FileEmitter>, Arc<CollectingLogHandler>) {
    let logs = Arc::new(CollectingLogHandler::default());
    let handler: SharedLogHandler = logs.clone();
    let emitter = FileEmitter::new(handler, None).with_log_level(level);
    (Arc::new(emitter), logs)
}

/// An input-stage emitter with a chunk loader.
pub fn emitter_with_loader() -> (Arc<FileEmitter>, Arc<ImmediateChunkLoader>) {
    let loader = Arc::new(ImmediateChunkLoader::default());
    let chunk_loader: Arc<dyn ChunkLoader> = loader.clone();
    let emitter = FileEmitter::new(fob_emitter::log::default_log_handler(), Some(chunk_loader));
    (Arc::new(emitter), loader)
}
