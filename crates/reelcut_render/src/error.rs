use reelcut_core::error::CoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to execute ffprobe: {0}")]
    FfprobeExec(String),

    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    #[error("failed to load media engine: {0}")]
    EngineLoad(String),

    #[error("processing failed: {0}")]
    Processing(String),

    #[error("engine produced no output: {0}")]
    OutputMissing(String),

    #[error("invalid logical file name: {0}")]
    InvalidLogicalName(String),

    #[error("media engine is not loaded")]
    EngineNotLoaded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
