//! Locating log files on disk

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::IngestError;
use crate::config::InputConfig;

/// A log file and the folder it was found under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSource {
    pub file: PathBuf,
    pub root: PathBuf,
}

/// Expand `path` into the log files to read.
///
/// A file is taken as given. A directory is walked in file-name order and
/// only files with the configured extension are kept.
pub fn discover(path: &Path, config: &InputConfig) -> Result<Vec<LogSource>, IngestError> {
    if path.is_file() {
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        return Ok(vec![LogSource {
            file: path.to_path_buf(),
            root,
        }]);
    }

    let max_depth = if config.recursive { usize::MAX } else { 1 };
    let mut sources = Vec::new();

    for entry in WalkDir::new(path).max_depth(max_depth).sort_by_file_name() {
        let entry = entry.map_err(|source| IngestError::Walk {
            path: path.to_path_buf(),
            source,
        })?;

        if entry.file_type().is_file() && has_extension(entry.path(), &config.extension) {
            sources.push(LogSource {
                file: entry.into_path(),
                root: path.to_path_buf(),
            });
        }
    }

    Ok(sources)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
