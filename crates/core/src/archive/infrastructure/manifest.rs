use std::fs;
use std::path::Path;

use crate::archive::domain::clip_uri::looks_like_uri;
use crate::shared::constants::MAX_MANIFEST_VERSION;
use crate::shared::error::{ArchiveError, Result};

const MANIFEST_MAGIC: &str = "archive";

/// A text file listing other sources (clips or manifests), one per line.
#[derive(Clone, Debug, PartialEq)]
pub struct Manifest {
    pub version: u32,
    /// URIs verbatim; relative paths joined to the manifest's directory.
    pub sources: Vec<String>,
}

impl Manifest {
    /// Reads `path` as a manifest; `Ok(None)` when it is some other file.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let text = fs::read(path).map_err(|e| ArchiveError::io(path, e))?;
        let text = String::from_utf8_lossy(&text);
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&text, base).map_err(|e| ArchiveError::Format(format!("{}: {e}", path.display())))
    }

    pub fn parse(text: &str, base: &Path) -> Result<Option<Self>> {
        let mut lines = text.lines().map(str::trim);
        let Some(version) = lines.next().and_then(manifest_version) else {
            return Ok(None);
        };
        let version = version?;

        let sources = lines
            .filter(|line| !line.is_empty())
            .map(|line| {
                if looks_like_uri(line) || Path::new(line).is_absolute() {
                    line.to_string()
                } else {
                    base.join(line).to_string_lossy().into_owned()
                }
            })
            .collect();
        Ok(Some(Self { version, sources }))
    }
}

/// `None` unless `line` opens a manifest; otherwise the version its
/// trailing digits give, 0 when there are none.
fn manifest_version(line: &str) -> Option<Result<u32>> {
    let head = line.get(..MANIFEST_MAGIC.len())?;
    if !head.eq_ignore_ascii_case(MANIFEST_MAGIC) {
        return None;
    }
    let digits = line[MANIFEST_MAGIC.len()..].trim();
    let version = if digits.is_empty() {
        Ok(0)
    } else {
        digits
            .parse::<u32>()
            .map_err(|_| ArchiveError::Format(format!("bad manifest version '{digits}'")))
            .and_then(|v| {
                if v > MAX_MANIFEST_VERSION {
                    Err(ArchiveError::Format(format!("unsupported manifest version {v}")))
                } else {
                    Ok(v)
                }
            })
    };
    Some(version)
}
