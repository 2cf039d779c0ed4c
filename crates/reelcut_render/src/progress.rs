use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Buffered events per subscriber before it starts lagging.
pub const PROGRESS_CAPACITY: usize = 256;

/// Job state as seen by progress subscribers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Idle,
    LoadingEngine,
    Staging,
    Executing,
    Complete,
    Failed,
}

impl ExportStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportStage::Complete | ExportStage::Failed)
    }
}

/// Progress update during export.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportProgress {
    /// Integer percent in [0, 100].
    pub percent: u8,
    pub stage: ExportStage,
}

impl ExportProgress {
    pub fn phase(&self) -> ProgressPhase {
        ProgressPhase::from_percent(self.percent)
    }
}

/// Cosmetic label a UI may show next to the bar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Trimming,
    Converting,
    Encoding,
}

impl ProgressPhase {
    pub fn from_percent(percent: u8) -> Self {
        match percent {
            0..=29 => ProgressPhase::Trimming,
            30..=69 => ProgressPhase::Converting,
            _ => ProgressPhase::Encoding,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProgressPhase::Trimming => "Trimming video...",
            ProgressPhase::Converting => "Converting aspect ratio...",
            ProgressPhase::Encoding => "Encoding...",
        }
    }
}

/// Convert an engine fraction in [0, 1] to a rounded, clamped percent.
pub fn fraction_to_percent(fraction: f64) -> u8 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Multi-subscriber progress stream for export jobs.
///
/// Every subscriber sees events in emission order. Values are passed through
/// as reported; subscribers drawing a bar should not assume monotonicity.
#[derive(Debug, Clone)]
pub struct ProgressChannel {
    tx: broadcast::Sender<ExportProgress>,
}

impl ProgressChannel {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(PROGRESS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExportProgress> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn emit(&self, percent: u8, stage: ExportStage) {
        // No subscribers is fine.
        let _ = self.tx.send(ExportProgress { percent, stage });
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new()
    }
}
