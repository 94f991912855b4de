use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;

/// Source extracts under `dir` matching `pattern`, sorted by path.
///
/// Entries the glob cannot read are logged and skipped.
pub fn discover_sources(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = dir.join(pattern);
    let mut sources = Vec::new();
    for entry in glob::glob(&full.to_string_lossy())? {
        match entry {
            Ok(path) if path.is_file() => sources.push(path),
            Ok(path) => warn!("Skipping non-file source match: {}", path.display()),
            Err(e) => warn!("Skipping unreadable source entry: {}", e),
        }
    }
    sources.sort();
    info!("📂 Found {} source files matching {}", sources.len(), full.display());
    Ok(sources)
}

/// Short tag naming the period of a source file: its file name with the
/// pattern's fixed suffix removed, or the file stem when that leaves nothing.
pub fn source_tag(path: &Path, pattern: &str) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = pattern.rsplit('*').next().unwrap_or("");

    if !suffix.is_empty() {
        if let Some(tag) = file_name.strip_suffix(suffix) {
            let tag = tag.trim_matches('_');
            if !tag.is_empty() {
                return tag.to_string();
            }
        }
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(file_name)
}
