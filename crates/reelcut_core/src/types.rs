use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Trim
// ---------------------------------------------------------------------------

/// Source range to keep, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Trim {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl Trim {
    pub fn new(start_secs: f64, end_secs: f64) -> Result<Self> {
        let trim = Self {
            start_secs,
            end_secs,
        };
        trim.validate()?;
        Ok(trim)
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Checks `0 <= start < end` with finite bounds.
    pub fn validate(&self) -> Result<()> {
        let ok = self.start_secs.is_finite()
            && self.end_secs.is_finite()
            && self.start_secs >= 0.0
            && self.end_secs > self.start_secs;
        if ok {
            Ok(())
        } else {
            Err(self.invalid())
        }
    }

    /// Like [`Trim::validate`], additionally bounding `end` by the source duration.
    pub fn validate_within(&self, source_duration_secs: f64) -> Result<()> {
        self.validate()?;
        if self.end_secs > source_duration_secs {
            return Err(self.invalid());
        }
        Ok(())
    }

    fn invalid(&self) -> CoreError {
        CoreError::InvalidTrimRange {
            start: self.start_secs,
            end: self.end_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// AspectRatio
// ---------------------------------------------------------------------------

/// Target frame shape as a ratio of units, not pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub const fn new_unchecked(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn new(width: u32, height: u32) -> Result<Self> {
        let ratio = Self { width, height };
        ratio.validate()?;
        Ok(ratio)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CoreError::InvalidAspectRatio {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    pub fn as_f64(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CoreError::InvalidAspectRatio {
            width: 0,
            height: 0,
        };
        let (w, h) = s.split_once(':').ok_or_else(invalid)?;
        let width = w.trim().parse().map_err(|_| invalid())?;
        let height = h.trim().parse().map_err(|_| invalid())?;
        Self::new(width, height)
    }
}

/// How the source is fitted into the target frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrameFit {
    /// Fill the frame and center-crop the overflow.
    #[default]
    Cover,
    /// Fit the whole source inside the frame and pad the rest with black bars.
    Letterbox,
}

impl fmt::Display for FrameFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameFit::Cover => write!(f, "cover"),
            FrameFit::Letterbox => write!(f, "letterbox"),
        }
    }
}

// ---------------------------------------------------------------------------
// Adjustment
// ---------------------------------------------------------------------------

pub const ADJUSTMENT_MIN: i32 = -100;
pub const ADJUSTMENT_MAX: i32 = 100;

/// User-tunable deltas layered on top of a named look, each in [-100, 100].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Adjustment {
    pub brightness: i32,
    pub contrast: i32,
    pub saturation: i32,
    pub vibrance: i32,
}

impl Adjustment {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
            ("vibrance", self.vibrance),
        ];
        for (field, value) in fields {
            if !(ADJUSTMENT_MIN..=ADJUSTMENT_MAX).contains(&value) {
                return Err(CoreError::InvalidAdjustment { field, value });
            }
        }
        Ok(())
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// Quality
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Quality {
    #[serde(rename = "4K")]
    Uhd4k,
    #[serde(rename = "1080p")]
    Fhd1080p,
    #[serde(rename = "720p")]
    Hd720p,
    #[serde(rename = "480p")]
    Sd480p,
}

impl Quality {
    pub const ALL: [Quality; 4] = [
        Quality::Uhd4k,
        Quality::Fhd1080p,
        Quality::Hd720p,
        Quality::Sd480p,
    ];

    /// Absolute encode resolution `(width, height)`.
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            Quality::Uhd4k => (3840, 2160),
            Quality::Fhd1080p => (1920, 1080),
            Quality::Hd720p => (1280, 720),
            Quality::Sd480p => (854, 480),
        }
    }

    /// Target video bitrate as passed to the encoder.
    pub fn bitrate_arg(&self) -> &'static str {
        match self {
            Quality::Uhd4k => "40M",
            Quality::Fhd1080p => "12M",
            Quality::Hd720p => "5M",
            Quality::Sd480p => "2.5M",
        }
    }

    pub fn bitrate_mbps(&self) -> f64 {
        match self {
            Quality::Uhd4k => 40.0,
            Quality::Fhd1080p => 12.0,
            Quality::Hd720p => 5.0,
            Quality::Sd480p => 2.5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Quality::Uhd4k => "4K",
            Quality::Fhd1080p => "1080p",
            Quality::Hd720p => "720p",
            Quality::Sd480p => "480p",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Quality {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Quality::ALL
            .into_iter()
            .find(|q| q.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::UnknownQuality(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Mp4,
    Mov,
    Webm,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mov => "mov",
            OutputFormat::Webm => "webm",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "video/mp4",
            OutputFormat::Mov => "video/quicktime",
            OutputFormat::Webm => "video/webm",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mp4" => Ok(OutputFormat::Mp4),
            "mov" => Ok(OutputFormat::Mov),
            "webm" => Ok(OutputFormat::Webm),
            _ => Err(CoreError::UnknownFormat(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// FrameRate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "u32", into = "u32")]
pub enum FrameRate {
    Fps30,
    Fps60,
}

impl FrameRate {
    pub fn as_u32(&self) -> u32 {
        match self {
            FrameRate::Fps30 => 30,
            FrameRate::Fps60 => 60,
        }
    }
}

impl TryFrom<u32> for FrameRate {
    type Error = CoreError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            30 => Ok(FrameRate::Fps30),
            60 => Ok(FrameRate::Fps60),
            other => Err(CoreError::UnknownFrameRate(other)),
        }
    }
}

impl From<FrameRate> for u32 {
    fn from(rate: FrameRate) -> u32 {
        rate.as_u32()
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

// ---------------------------------------------------------------------------
// TextOverlay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    Top,
    Center,
    #[default]
    Bottom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TextEffects {
    pub shadow: bool,
    pub outline: bool,
    pub background: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextAnimation {
    #[default]
    None,
    FadeIn,
}

/// Text burned into every frame of the exported clip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextOverlay {
    pub text: String,
    /// `#RRGGBB`.
    pub color: String,
    #[serde(default)]
    pub position: TextPosition,
    pub font_size: u32,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub effects: TextEffects,
    #[serde(default)]
    pub animation: TextAnimation,
}

impl TextOverlay {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: "#FFFFFF".to_string(),
            position: TextPosition::Bottom,
            font_size: 50,
            font: None,
            effects: TextEffects {
                shadow: true,
                ..TextEffects::default()
            },
            animation: TextAnimation::None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(CoreError::InvalidOverlay("text is empty".into()));
        }
        if self.font_size == 0 {
            return Err(CoreError::InvalidOverlay("font size must be positive".into()));
        }
        let hex = self.color.strip_prefix('#').unwrap_or("");
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidOverlay(format!(
                "color must be #RRGGBB, got {}",
                self.color
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ParameterSet
// ---------------------------------------------------------------------------

/// Frozen description of one export job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterSet {
    pub trim: Trim,
    pub aspect: AspectRatio,
    #[serde(default)]
    pub fit: FrameFit,
    pub filter: String,
    #[serde(default)]
    pub adjustment: Adjustment,
    pub quality: Quality,
    pub format: OutputFormat,
    pub fps: FrameRate,
    #[serde(default)]
    pub overlays: Vec<TextOverlay>,
}

impl ParameterSet {
    /// Validates every field that can be checked without the source file.
    /// Filter ids are resolved against the look registry.
    pub fn validate(&self) -> Result<()> {
        self.trim.validate()?;
        self.aspect.validate()?;
        self.adjustment.validate()?;
        crate::registry::find_look(&self.filter)?;
        for overlay in &self.overlays {
            overlay.validate()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
