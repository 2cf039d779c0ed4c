//! Show source metadata.

use std::path::PathBuf;

use reelcut_core::config::ExportConfig;
use reelcut_core::estimate::format_time;
use reelcut_render::probe::probe_source;

pub async fn run(input: PathBuf, config: &ExportConfig) -> anyhow::Result<()> {
    let meta = probe_source(&input, &config.engine.ffprobe_bin)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to probe {}: {e}", input.display()))?;

    println!("Source: {}", input.display());
    println!(
        "  Duration:   {} ({:.2}s)",
        format_time(meta.duration_secs),
        meta.duration_secs
    );
    println!(
        "  Resolution: {}x{} ({})",
        meta.width, meta.height, meta.aspect
    );
    println!("  FPS:        {:.2}", meta.fps);
    println!("  Codec:      {}", meta.codec);
    println!("  Audio:      {}", if meta.has_audio { "yes" } else { "no" });
    Ok(())
}
