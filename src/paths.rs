/// Small UTF-8 path helpers shared by the IO modules.
use std::fs;
use std::path::Path;

use crate::Result;

/// Normalized lowercase extension without the leading dot.
pub(crate) fn extension(path: &Path) -> String {
    path.extension()
        .map(|extension| extension.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Create a directory and all missing parent directories if needed.
pub(crate) fn make_directory(dirname: &Path) -> Result<()> {
    if dirname.as_os_str().is_empty() || dirname.exists() {
        return Ok(());
    }
    fs::create_dir_all(dirname)
        .map_err(|_| format!("{}: cannot create directory", dirname.display()))?;
    Ok(())
}
