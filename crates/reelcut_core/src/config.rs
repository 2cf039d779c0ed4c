use crate::error::{CoreError, Result};
use crate::registry::{default_aspect, IDENTITY_LOOK};
use crate::types::{AspectRatio, FrameFit, FrameRate, OutputFormat, Quality};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for the export host: engine binaries, scratch space, logging and
/// the defaults used when a caller leaves a parameter unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    pub engine: EngineSettings,
    pub defaults: ExportDefaults,
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    /// Parent directory for the engine's virtual filesystem. System temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportDefaults {
    pub quality: Quality,
    pub format: OutputFormat,
    pub fps: FrameRate,
    pub aspect: AspectRatio,
    pub fit: FrameFit,
    pub filter: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            defaults: ExportDefaults::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            scratch_dir: None,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            quality: Quality::Fhd1080p,
            format: OutputFormat::Mp4,
            fps: FrameRate::Fps30,
            aspect: default_aspect(),
            fit: FrameFit::Cover,
            filter: IDENTITY_LOOK.to_string(),
        }
    }
}

impl ExportConfig {
    /// Save config to a file as pretty-printed JSON.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load config from a JSON file. Missing keys take their defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref()).map_err(CoreError::Io)?;
        let config: ExportConfig = serde_json::from_str(&data)?;
        config.defaults.aspect.validate()?;
        crate::registry::find_look(&config.defaults.filter)?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }
}
