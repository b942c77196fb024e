/// Error types for file emission.
#[derive(Debug, thiserror::Error)]
pub enum EmitterError {
    /// An emitted file descriptor or option failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No emitted file is registered under the reference id.
    #[error("Unable to get file name for unknown file \"{0}\".")]
    UnknownReference(String),

    /// `set_asset_source` targeted a reference id that doesn't exist.
    #[error("Unable to set the source for unknown referenced asset \"{0}\".")]
    UnknownAssetReference(String),

    /// `set_asset_source` targeted a chunk.
    #[error("Asset sources can only be set for emitted assets but \"{0}\" is an emitted chunk.")]
    NotAnAsset(String),

    /// The asset already has a source.
    #[error("Unable to set the source for asset \"{0}\", source already set.")]
    AssetSourceAlreadySet(String),

    /// The asset has no file name yet.
    #[error(
        "Unable to get file name for asset \"{0}\". Ensure that the source is set and that generate is called first."
    )]
    AssetNotFinalised(String),

    /// The chunk's file name depends on chunk generation, which hasn't happened.
    #[error(
        "Unable to get file name for emitted chunk \"{0}\". You can only get file names once chunks have been generated."
    )]
    ChunkNotGenerated(String),

    /// An emitted asset never received a source before the bundle was written.
    #[error("Plugin error creating asset \"{0}\" - no asset source set.")]
    NoAssetSourceSet(String),

    /// Chunks can only be emitted while modules are still being loaded.
    #[error("Cannot emit chunks after module loading has finished.")]
    InvalidPhaseForChunkEmission,
}

/// Result type alias for emitter operations.
pub type Result<T> = std::result::Result<T, EmitterError>;

impl EmitterError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        EmitterError::Validation(message.into())
    }

    /// Whether the error is a validation failure rather than a state failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, EmitterError::Validation(_))
    }
}

impl miette::Diagnostic for EmitterError {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            EmitterError::Validation(_) => "VALIDATION_ERROR",
            EmitterError::UnknownReference(_) => "FILE_NOT_FOUND",
            EmitterError::UnknownAssetReference(_) => "ASSET_NOT_FOUND",
            EmitterError::NotAnAsset(_) => "VALIDATION_ERROR",
            EmitterError::AssetSourceAlreadySet(_) => "ASSET_SOURCE_ALREADY_SET",
            EmitterError::AssetNotFinalised(_) => "ASSET_NOT_FINALISED",
            EmitterError::ChunkNotGenerated(_) => "CHUNK_NOT_GENERATED",
            EmitterError::NoAssetSourceSet(_) => "ASSET_SOURCE_MISSING",
            EmitterError::InvalidPhaseForChunkEmission => "INVALID_PHASE",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            EmitterError::AssetNotFinalised(_) | EmitterError::NoAssetSourceSet(_) => Some(
                Box::new("Pass a source when emitting the asset or call set_asset_source before the bundle is generated."),
            ),
            EmitterError::ChunkNotGenerated(_) => Some(Box::new(
                "Request chunk file names from output hooks such as generate_bundle.",
            )),
            EmitterError::InvalidPhaseForChunkEmission => Some(Box::new(
                "Emit chunks from build_start, resolve_id, load or transform.",
            )),
            _ => None,
        }
    }
}
