use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Ensure `parent` is an existing directory.
pub fn validate_parent(parent: &Path) -> Result<()> {
    let meta = fs::metadata(parent)
        .with_context(|| format!("Parent folder {} does not exist", parent.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("Parent folder {} is not a directory", parent.display());
    }
    Ok(())
}

/// Create the artifact folder if missing.
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        info!("Output folder {} already exists", dir.display());
        return Ok(());
    }
    fs::create_dir_all(dir).with_context(|| format!("Failed to create output folder {}", dir.display()))?;
    info!("Created output folder {}", dir.display());
    Ok(())
}

/// Remove every entry of `dir` except `keep`. Failures are logged per entry;
/// returns how many entries were removed.
pub fn clean_output_dir(dir: &Path, keep: &Path) -> Result<usize> {
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to read output folder {}", dir.display()))?;
    let mut removed = 0;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        if path == keep {
            continue;
        }

        let result = match entry.file_type() {
            Ok(ft) if ft.is_dir() => fs::remove_dir_all(&path),
            _ => fs::remove_file(&path),
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }

    Ok(removed)
}
