use crate::error::Result;
use crate::registry::find_look;
use crate::types::Adjustment;
use serde::Serialize;
use std::fmt;

/// One color operation in engine terms.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterStep {
    /// Combined contrast/brightness/saturation. Identity is `(1, 0, 1)`.
    Eq {
        contrast: f64,
        brightness: f64,
        saturation: f64,
    },
    /// Tone curve applied to all channels, as `x/y` control points.
    Curves { points: &'static str },
    ColorTemperature { kelvin: u32 },
    Hue { degrees: f64 },
    /// Saturation boost weighted toward muted colors.
    Vibrance { intensity: f64 },
}

impl fmt::Display for FilterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterStep::Eq {
                contrast,
                brightness,
                saturation,
            } => write!(
                f,
                "eq=contrast={contrast}:brightness={brightness}:saturation={saturation}"
            ),
            FilterStep::Curves { points } => write!(f, "curves=all='{points}'"),
            FilterStep::ColorTemperature { kelvin } => {
                write!(f, "colortemperature=temperature={kelvin}")
            }
            FilterStep::Hue { degrees } => write!(f, "hue=h={degrees}"),
            FilterStep::Vibrance { intensity } => write!(f, "vibrance=intensity={intensity}"),
        }
    }
}

/// Ordered color operations; empty means no color transform.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FilterChain {
    pub steps: Vec<FilterStep>,
}

impl FilterChain {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Engine filter strings, in chain order.
    pub fn filter_strings(&self) -> Vec<String> {
        self.steps.iter().map(ToString::to_string).collect()
    }

    /// Comma-composed chain, e.g. `eq=...,vibrance=...`.
    pub fn to_filter_string(&self) -> String {
        self.filter_strings().join(",")
    }
}

/// Build the color chain for a named look plus user adjustments.
///
/// Look steps come first in the look's own order, followed by a combined
/// eq step (only when brightness/contrast/saturation differ from identity)
/// and a vibrance step (only when vibrance is non-zero).
pub fn build(filter_id: &str, adjustment: &Adjustment) -> Result<FilterChain> {
    let look = find_look(filter_id)?;
    adjustment.validate()?;

    let mut steps: Vec<FilterStep> = look.steps.to_vec();
    steps.extend(adjustment_steps(adjustment));

    Ok(FilterChain { steps })
}

fn adjustment_steps(adjustment: &Adjustment) -> Vec<FilterStep> {
    let mut steps = Vec::new();

    let brightness = adjustment.brightness as f64 / 100.0;
    let contrast = 1.0 + adjustment.contrast as f64 / 100.0;
    let saturation = 1.0 + adjustment.saturation as f64 / 100.0;

    if brightness != 0.0 || contrast != 1.0 || saturation != 1.0 {
        steps.push(FilterStep::Eq {
            contrast,
            brightness,
            saturation,
        });
    }

    if adjustment.vibrance != 0 {
        steps.push(FilterStep::Vibrance {
            intensity: 1.0 + adjustment.vibrance as f64 / 100.0,
        });
    }

    steps
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
