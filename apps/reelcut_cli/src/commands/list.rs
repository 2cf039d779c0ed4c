//! Informational listings: looks, aspect presets, size estimates.

use reelcut_core::estimate::{estimate_file_size, format_time};
use reelcut_core::registry::{ASPECT_PRESETS, LOOKS};
use reelcut_core::types::Quality;

pub fn looks() -> anyhow::Result<()> {
    for look in LOOKS {
        println!("{:<10} {:<10} {}", look.id, look.name, look.description);
    }
    Ok(())
}

pub fn aspects() -> anyhow::Result<()> {
    for preset in ASPECT_PRESETS {
        println!(
            "{:<6} {:<12} {}",
            preset.ratio.to_string(),
            preset.label,
            preset.platform
        );
    }
    Ok(())
}

pub fn estimate(duration: f64) -> anyhow::Result<()> {
    if !duration.is_finite() || duration < 0.0 {
        anyhow::bail!("Duration must be a non-negative number of seconds");
    }
    println!("Estimated size for {}:", format_time(duration));
    for quality in Quality::ALL {
        println!(
            "  {:<6} {}",
            quality.label(),
            estimate_file_size(duration, quality)
        );
    }
    Ok(())
}
