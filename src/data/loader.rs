use std::path::Path;

use anyhow::{bail, Result};

use super::uff::{read_uff, UffContents};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a measurement file.  Dispatch by extension.
///
/// Supported formats:
/// * `.uff` / `.unv` – ASCII Universal File Format (datasets 151, 164, 2411, 58)
pub fn load_file(path: &Path) -> Result<UffContents> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let contents = match ext.as_str() {
        "uff" | "unv" => read_uff(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };
    log::info!(
        "loaded {}: {} function record(s)",
        path.display(),
        contents.records.len()
    );
    Ok(contents)
}

/// Whether `path` has an extension [`load_file`] understands.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "uff" | "unv"))
        .unwrap_or(false)
}
