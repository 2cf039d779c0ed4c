use crate::types::{AspectRatio, Quality};
use serde::{Deserialize, Serialize};

/// Estimated output size for `duration_secs` at the preset's target bitrate,
/// formatted as `"90 MB"` or `"35.16 GB"` (GB once above 1024 MB).
pub fn estimate_file_size(duration_secs: f64, quality: Quality) -> String {
    let size_mb = duration_secs * quality.bitrate_mbps() / 8.0;

    if size_mb > 1024.0 {
        let gb = (size_mb / 1024.0 * 100.0).round() / 100.0;
        format!("{gb:.2} GB")
    } else {
        format!("{:.0} MB", size_mb.round())
    }
}

/// Format seconds as `MM:SS`, truncating fractional seconds.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Pixel rectangle inside a source frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Largest centered rectangle of `target` shape that fits in the source frame.
pub fn calculate_crop_dimensions(
    source_width: u32,
    source_height: u32,
    target: AspectRatio,
) -> CropRect {
    let src_w = source_width as f64;
    let src_h = source_height as f64;
    let source_aspect = src_w / src_h;
    let target_aspect = target.as_f64();

    let (crop_w, crop_h) = if source_aspect > target_aspect {
        // Source is wider: keep full height.
        (src_h * target_aspect, src_h)
    } else {
        (src_w, src_w / target_aspect)
    };

    CropRect {
        width: crop_w.round() as u32,
        height: crop_h.round() as u32,
        x: ((src_w - crop_w) / 2.0).round() as u32,
        y: ((src_h - crop_h) / 2.0).round() as u32,
    }
}

/// Reduce a pixel size to its simplest ratio, e.g. `1920x1080 -> "16:9"`.
pub fn reduce_aspect(width: u32, height: u32) -> String {
    let divisor = gcd(width, height);
    if divisor == 0 {
        return "0:0".to_string();
    }
    format!("{}:{}", width / divisor, height / divisor)
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

const VALID_VIDEO_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/quicktime",
    "video/webm",
    "video/x-msvideo",
];

/// Whether an input file's MIME type is accepted by the importer.
pub fn is_valid_video_mime(mime: &str) -> bool {
    VALID_VIDEO_MIME_TYPES.contains(&mime)
}
