//! Write the default configuration file.

use std::path::PathBuf;

use reelcut_core::config::ExportConfig;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("Refusing to overwrite existing file: {}", path.display());
    }
    ExportConfig::default()
        .save_to_file(&path)
        .map_err(|e| anyhow::anyhow!("Failed to write config: {e}"))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
