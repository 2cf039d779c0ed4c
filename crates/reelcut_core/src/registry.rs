use crate::error::{CoreError, Result};
use crate::filters::FilterStep;
use crate::types::AspectRatio;

/// A predefined bundle of color operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Look {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub steps: &'static [FilterStep],
}

const fn eq(contrast: f64, brightness: f64, saturation: f64) -> FilterStep {
    FilterStep::Eq {
        contrast,
        brightness,
        saturation,
    }
}

pub const IDENTITY_LOOK: &str = "none";

pub static LOOKS: &[Look] = &[
    Look {
        id: IDENTITY_LOOK,
        name: "None",
        description: "Original video",
        steps: &[],
    },
    Look {
        id: "valencia",
        name: "Valencia",
        description: "Warm, faded vintage look",
        steps: &[
            eq(1.08, 0.08, 1.3),
            FilterStep::Curves {
                points: "0/0 0.5/0.58 1/1",
            },
        ],
    },
    Look {
        id: "clarendon",
        name: "Clarendon",
        description: "High contrast, vibrant",
        steps: &[eq(1.22, 0.05, 1.35)],
    },
    Look {
        id: "juno",
        name: "Juno",
        description: "Cool tones, brightened",
        steps: &[
            eq(1.15, 0.12, 0.9),
            FilterStep::ColorTemperature { kelvin: 6500 },
        ],
    },
    Look {
        id: "lark",
        name: "Lark",
        description: "Bright and desaturated",
        steps: &[eq(0.9, 0.15, 0.85)],
    },
    Look {
        id: "ludwig",
        name: "Ludwig",
        description: "Muted tones",
        steps: &[eq(1.05, 0.05, 0.88)],
    },
    Look {
        id: "aden",
        name: "Aden",
        description: "Cool, desaturated",
        steps: &[eq(0.9, 0.1, 0.85), FilterStep::Hue { degrees: -10.0 }],
    },
    Look {
        id: "perpetua",
        name: "Perpetua",
        description: "Soft, pastel",
        steps: &[eq(1.1, 0.08, 1.1)],
    },
    Look {
        id: "amaro",
        name: "Amaro",
        description: "Warm highlights",
        steps: &[eq(1.1, 0.1, 1.25)],
    },
    Look {
        id: "mayfair",
        name: "Mayfair",
        description: "Warm center, cool edge",
        steps: &[
            eq(1.08, 0.08, 1.1),
            FilterStep::ColorTemperature { kelvin: 5500 },
        ],
    },
    Look {
        id: "rise",
        name: "Rise",
        description: "Warm, soft glow",
        steps: &[
            eq(1.05, 0.15, 1.2),
            FilterStep::ColorTemperature { kelvin: 5000 },
        ],
    },
];

/// Resolve a look by id.
pub fn find_look(id: &str) -> Result<&'static Look> {
    LOOKS
        .iter()
        .find(|look| look.id == id)
        .ok_or_else(|| CoreError::InvalidFilterId(id.to_string()))
}

/// A named frame shape offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectPreset {
    pub ratio: AspectRatio,
    pub label: &'static str,
    pub platform: &'static str,
}

pub static ASPECT_PRESETS: &[AspectPreset] = &[
    AspectPreset {
        ratio: AspectRatio::new_unchecked(9, 16),
        label: "Story/Reels",
        platform: "Instagram",
    },
    AspectPreset {
        ratio: AspectRatio::new_unchecked(1, 1),
        label: "Feed Post",
        platform: "Instagram",
    },
    AspectPreset {
        ratio: AspectRatio::new_unchecked(4, 5),
        label: "Portrait",
        platform: "Instagram",
    },
    AspectPreset {
        ratio: AspectRatio::new_unchecked(16, 9),
        label: "YouTube",
        platform: "YouTube",
    },
    AspectPreset {
        ratio: AspectRatio::new_unchecked(4, 3),
        label: "Standard",
        platform: "Classic",
    },
    AspectPreset {
        ratio: AspectRatio::new_unchecked(21, 9),
        label: "Cinematic",
        platform: "Cinema",
    },
];

/// Default export shape (vertical stories).
pub fn default_aspect() -> AspectRatio {
    ASPECT_PRESETS[0].ratio
}

pub fn find_aspect_preset(ratio: AspectRatio) -> Option<&'static AspectPreset> {
    ASPECT_PRESETS.iter().find(|preset| preset.ratio == ratio)
}
