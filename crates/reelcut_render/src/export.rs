use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelcut_core::error::CoreError;
use reelcut_core::filters;
use reelcut_core::types::ParameterSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::compile::{compile, CompiledCommand};
use crate::engine::MediaEngine;
use crate::error::RenderError;
use crate::progress::{ExportProgress, ExportStage, ProgressChannel};
use crate::session::EngineSession;

/// Prefix of every exported file name.
pub const ARTIFACT_PREFIX: &str = "instagram-video";

const DEFAULT_INPUT_EXTENSION: &str = "mp4";

/// The video being exported, fully loaded in memory.
#[derive(Debug, Clone)]
pub struct SourceVideo {
    /// Original file name; only its extension is used.
    pub name: String,
    pub bytes: Vec<u8>,
    /// Known duration, used to bound the trim range.
    pub duration_secs: Option<f64>,
}

impl SourceVideo {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            duration_secs: None,
        }
    }

    pub fn with_duration(mut self, duration_secs: f64) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }

    pub async fn from_path(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RenderError::FileNotFound(path.to_path_buf())
            } else {
                RenderError::Io(e)
            }
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(Self::new(name, bytes))
    }

    /// Logical engine name for this source: `input.<ext>`, `input.mp4` when
    /// the extension is missing or unusable.
    pub fn logical_name(&self) -> String {
        let ext = Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_INPUT_EXTENSION.to_string());
        format!("input.{ext}")
    }
}

/// A finished export.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub file_name: String,
}

impl Artifact {
    /// Write the artifact into `dir` under its own file name.
    pub async fn write_to(&self, dir: impl AsRef<Path>) -> crate::error::Result<PathBuf> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidTrimRange,
    InvalidFilterId,
    InvalidParameters,
    EngineLoad,
    Processing,
}

impl FailureKind {
    fn classify(err: &RenderError) -> Self {
        match err {
            RenderError::Core(CoreError::InvalidTrimRange { .. }) => FailureKind::InvalidTrimRange,
            RenderError::Core(CoreError::InvalidFilterId(_)) => FailureKind::InvalidFilterId,
            RenderError::Core(_) => FailureKind::InvalidParameters,
            RenderError::EngineLoad(_) | RenderError::EngineNotLoaded => FailureKind::EngineLoad,
            _ => FailureKind::Processing,
        }
    }
}

/// The single error surfaced by [`ExportOrchestrator::process`].
#[derive(Debug, Error)]
#[error("export failed during {stage:?} ({kind:?}): {message}")]
pub struct ExportError {
    /// Last stage reached before the failure.
    pub stage: ExportStage,
    pub kind: FailureKind,
    pub message: String,
    #[source]
    pub source: RenderError,
}

impl ExportError {
    fn new(stage: ExportStage, source: RenderError) -> Self {
        Self {
            stage,
            kind: FailureKind::classify(&source),
            message: source.to_string(),
            source,
        }
    }

    /// Text suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        "Export failed. Please try again."
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs export jobs against a shared engine session and broadcasts progress.
pub struct ExportOrchestrator<E: MediaEngine> {
    session: Arc<EngineSession<E>>,
    progress: ProgressChannel,
}

impl<E: MediaEngine> ExportOrchestrator<E> {
    pub fn new(session: Arc<EngineSession<E>>) -> Self {
        Self {
            session,
            progress: ProgressChannel::new(),
        }
    }

    pub fn session(&self) -> &Arc<EngineSession<E>> {
        &self.session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExportProgress> {
        self.progress.subscribe()
    }

    /// Validate and compile `params` without touching the engine.
    pub fn plan(
        &self,
        source: &SourceVideo,
        params: &ParameterSet,
    ) -> Result<CompiledCommand, ExportError> {
        prepare(source, params).map_err(|e| ExportError::new(ExportStage::Idle, e))
    }

    /// Export `source` with `params`.
    ///
    /// All validation happens before the engine is loaded or touched. On
    /// failure a `Failed` event is broadcast at the last reported percent.
    pub async fn process(
        &self,
        source: &SourceVideo,
        params: &ParameterSet,
    ) -> Result<Artifact, ExportError> {
        let job_id = Uuid::new_v4();
        tracing::info!(
            job_id = %job_id,
            source = %source.name,
            bytes = source.bytes.len(),
            filter = %params.filter,
            aspect = %params.aspect,
            quality = params.quality.label(),
            format = params.format.extension(),
            "starting export"
        );

        let command = match prepare(source, params) {
            Ok(command) => command,
            Err(e) => return Err(self.fail(job_id, ExportStage::Idle, 0, e)),
        };

        self.progress.emit(0, ExportStage::LoadingEngine);
        if let Err(e) = self.session.ensure_ready().await {
            return Err(self.fail(job_id, ExportStage::LoadingEngine, 0, e));
        }

        self.progress.emit(0, ExportStage::Staging);
        let mut last_percent = 0u8;
        let mut executing = false;
        let result = {
            let progress = &self.progress;
            let last_percent = &mut last_percent;
            let executing = &mut executing;
            self.session
                .run_job(
                    &command.input,
                    &source.bytes,
                    &command.output,
                    &command,
                    |percent| {
                        *executing = true;
                        *last_percent = percent;
                        progress.emit(percent, ExportStage::Executing);
                    },
                )
                .await
        };

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                let stage = if executing {
                    ExportStage::Executing
                } else {
                    ExportStage::Staging
                };
                return Err(self.fail(job_id, stage, last_percent, e));
            }
        };

        let artifact = Artifact {
            file_name: artifact_file_name(params, chrono::Utc::now().timestamp_millis()),
            mime_type: params.format.mime_type(),
            bytes,
        };

        self.progress.emit(100, ExportStage::Complete);
        tracing::info!(
            job_id = %job_id,
            file = %artifact.file_name,
            bytes = artifact.bytes.len(),
            "export complete"
        );
        Ok(artifact)
    }

    fn fail(&self, job_id: Uuid, stage: ExportStage, percent: u8, err: RenderError) -> ExportError {
        let err = ExportError::new(stage, err);
        tracing::error!(
            job_id = %job_id,
            stage = ?err.stage,
            kind = ?err.kind,
            error = %err.message,
            "export failed"
        );
        self.progress.emit(percent, ExportStage::Failed);
        err
    }
}

fn prepare(source: &SourceVideo, params: &ParameterSet) -> crate::error::Result<CompiledCommand> {
    params.validate()?;
    if let Some(duration) = source.duration_secs {
        params.trim.validate_within(duration)?;
    }
    let chain = filters::build(&params.filter, &params.adjustment)?;
    let output = format!("output.{}", params.format.extension());
    compile(&source.logical_name(), &output, params, &chain)
}

/// `instagram-video-<unix millis>.<ext>`
pub fn artifact_file_name(params: &ParameterSet, unix_millis: i64) -> String {
    format!(
        "{ARTIFACT_PREFIX}-{unix_millis}.{}",
        params.format.extension()
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
