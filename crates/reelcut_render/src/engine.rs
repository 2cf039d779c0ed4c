use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;

use async_trait::async_trait;
use reelcut_core::config::EngineSettings;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::error::{RenderError, Result};

/// Number of trailing stderr lines kept for failure messages.
const STDERR_TAIL: usize = 12;

/// An embedded transcoding engine with its own virtual filesystem.
///
/// Files are addressed by logical names (`input.mp4`), never host paths.
/// Implementations are not expected to support concurrent `exec` calls;
/// [`crate::session::EngineSession`] serializes jobs.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Fetch and initialize the engine runtime.
    async fn load(&self) -> Result<()>;

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<()>;

    /// `Ok(None)` if the file does not exist.
    async fn read_file(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Removing a missing file is not an error.
    async fn delete_file(&self, name: &str) -> Result<()>;

    async fn list_files(&self) -> Result<Vec<String>>;

    /// Run one command. Progress fractions in [0, 1] are sent on `progress`
    /// while the command runs; the sender is dropped when it returns.
    async fn exec(&self, args: &[String], progress: mpsc::UnboundedSender<f64>) -> Result<()>;

    fn name(&self) -> &str;
}

/// Logical names are flat: no separators, no leading dot.
pub fn validate_logical_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if ok {
        Ok(())
    } else {
        Err(RenderError::InvalidLogicalName(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// FfmpegEngine
// ---------------------------------------------------------------------------

/// Engine backed by the `ffmpeg` binary. The virtual filesystem is a private
/// scratch directory created on load and removed when the engine is dropped.
pub struct FfmpegEngine {
    ffmpeg_bin: String,
    scratch_parent: Option<PathBuf>,
    workdir: OnceLock<tempfile::TempDir>,
}

impl FfmpegEngine {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            ffmpeg_bin: settings.ffmpeg_bin.clone(),
            scratch_parent: settings.scratch_dir.clone(),
            workdir: OnceLock::new(),
        }
    }

    fn workdir(&self) -> Result<&Path> {
        self.workdir
            .get()
            .map(|dir| dir.path())
            .ok_or(RenderError::EngineNotLoaded)
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        validate_logical_name(name)?;
        Ok(self.workdir()?.join(name))
    }

    fn create_workdir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("reelcut-vfs-");
        match &self.scratch_parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn load(&self) -> Result<()> {
        let status = Command::new(&self.ffmpeg_bin)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RenderError::EngineLoad(format!("{} not found", self.ffmpeg_bin))
                } else {
                    RenderError::EngineLoad(e.to_string())
                }
            })?;

        if !status.success() {
            return Err(RenderError::EngineLoad(format!(
                "{} -version exited with {status}",
                self.ffmpeg_bin
            )));
        }

        if self.workdir.get().is_none() {
            let dir = self
                .create_workdir()
                .map_err(|e| RenderError::EngineLoad(format!("scratch directory: {e}")))?;
            tracing::debug!(path = %dir.path().display(), "created engine scratch directory");
            let _ = self.workdir.set(dir);
        }

        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(name)?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(name)?;
        match tokio::fs::read(path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RenderError::Io(e)),
        }
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RenderError::Io(e)),
        }
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(self.workdir()?).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn exec(&self, args: &[String], progress: mpsc::UnboundedSender<f64>) -> Result<()> {
        let workdir = self.workdir()?;

        let mut child = Command::new(&self.ffmpeg_bin)
            .args(["-y", "-hide_banner", "-nostdin"])
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RenderError::Processing(format!("failed to spawn ffmpeg: {e}")))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RenderError::Processing("ffmpeg stderr unavailable".into()))?;

        // ffmpeg rewrites its stats line with '\r', other output ends in '\n'.
        let mut segments = BufReader::new(stderr).split(b'\r');
        let mut total_secs = planned_duration(args);
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL);

        while let Some(segment) = segments.next_segment().await? {
            let text = String::from_utf8_lossy(&segment);
            for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                if total_secs.is_none() {
                    total_secs = parse_duration_line(line);
                }
                match parse_progress(line, total_secs.unwrap_or(0.0)) {
                    Some(fraction) => {
                        let _ = progress.send(fraction);
                    }
                    None => {
                        tracing::debug!(target: "reelcut::ffmpeg", "{line}");
                        if tail.len() == STDERR_TAIL {
                            tail.pop_front();
                        }
                        tail.push_back(line.to_string());
                    }
                }
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let detail = tail.into_iter().collect::<Vec<_>>().join("\n");
            return Err(RenderError::Processing(format!(
                "ffmpeg exited with {status}: {detail}"
            )));
        }

        let _ = progress.send(1.0);
        Ok(())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

// ---------------------------------------------------------------------------
// stderr parsing
// ---------------------------------------------------------------------------

/// Output duration requested by `-t`, if present.
fn planned_duration(args: &[String]) -> Option<f64> {
    args.iter()
        .position(|a| a == "-t")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|d| *d > 0.0)
}

/// Parse the input banner line `Duration: 00:00:20.00, start: ...`.
fn parse_duration_line(line: &str) -> Option<f64> {
    if !line.starts_with("Duration:") {
        return None;
    }
    let value = extract_value(line, "Duration:")?;
    parse_time_str(value.trim_end_matches(',')).filter(|d| *d > 0.0)
}

/// Parse an ffmpeg stats line into a completion fraction.
///
/// Example line: `frame=  123 fps= 60 ... time=00:01:02.05 speed=1.50x`
pub fn parse_progress(line: &str, total_secs: f64) -> Option<f64> {
    if !line.contains("time=") {
        return None;
    }

    let time_secs = extract_value(line, "time=").and_then(|v| parse_time_str(&v))?;

    if total_secs > 0.0 {
        Some((time_secs / total_secs).min(1.0))
    } else {
        Some(0.0)
    }
}

/// Extract a value from an ffmpeg key=value progress line.
fn extract_value(line: &str, key: &str) -> Option<String> {
    let start = line.find(key)? + key.len();
    let rest = &line[start..];
    let trimmed = rest.trim_start();
    let end = trimmed
        .find(|c: char| c.is_whitespace())
        .unwrap_or(trimmed.len());
    let val = trimmed[..end].to_string();
    if val.is_empty() {
        None
    } else {
        Some(val)
    }
}

/// Parse an ffmpeg time string like "00:01:02.05" into seconds.
fn parse_time_str(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let mins: f64 = parts[1].parse().ok()?;
    let secs: f64 = parts[2].parse().ok()?;
    Some(hours * 3600.0 + mins * 60.0 + secs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
