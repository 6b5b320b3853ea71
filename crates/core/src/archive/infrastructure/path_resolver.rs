use std::io;
use std::path::{Path, PathBuf};

use crate::shared::error::{ArchiveError, Result};

/// Locates a file referenced from inside an index file.
///
/// Candidates are tried in order and the first that exists wins:
/// 1. the reference itself when absolute
/// 2. relative to the process working directory
/// 3. relative to the index file's directory
/// 4. relative to the index file's canonical (symlink-resolved) directory
pub fn resolve_referenced_path(reference: &str, index_path: &Path) -> Result<PathBuf> {
    let reference_path = Path::new(reference);
    let mut candidates = Vec::with_capacity(4);

    if reference_path.is_absolute() {
        candidates.push(reference_path.to_path_buf());
    } else {
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(reference_path));
        }
        if let Some(dir) = index_path.parent() {
            candidates.push(dir.join(reference_path));
        }
        if let Some(dir) = index_path
            .canonicalize()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            candidates.push(dir.join(reference_path));
        }
    }

    for candidate in candidates {
        log::debug!("Trying {} for '{reference}'", candidate.display());
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(ArchiveError::io(
        reference_path,
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("not found relative to {}", index_path.display()),
        ),
    ))
}
