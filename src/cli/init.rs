use std::path::Path;

use crate::config::RelayConfig;
use crate::dirs;
use crate::error::Result;

/// Execute the `init` command: write the default configuration file.
pub fn execute(force: bool) -> Result<()> {
    let path = dirs::config_path();
    if write_default(&path, force)? {
        println!("Wrote default configuration to {}", path.display());
    } else {
        println!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}

/// Returns `false` when `path` exists and `force` is not set.
fn write_default(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    RelayConfig::default().save_to(path)?;
    tracing::debug!(path = %path.display(), "Wrote default configuration");
    Ok(true)
}
