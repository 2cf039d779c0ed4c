use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid trim range: start={start} end={end}")]
    InvalidTrimRange { start: f64, end: f64 },

    #[error("Unknown filter: {0}")]
    InvalidFilterId(String),

    #[error("Adjustment {field} out of range: {value}")]
    InvalidAdjustment { field: &'static str, value: i32 },

    #[error("Invalid aspect ratio: {width}:{height}")]
    InvalidAspectRatio { width: u32, height: u32 },

    #[error("Invalid text overlay: {0}")]
    InvalidOverlay(String),

    #[error("Unknown quality: {0}")]
    UnknownQuality(String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Unsupported frame rate: {0}")]
    UnknownFrameRate(u32),
}

pub type Result<T> = std::result::Result<T, CoreError>;
