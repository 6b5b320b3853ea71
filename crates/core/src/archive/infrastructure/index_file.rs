use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::shared::constants::{MAX_INDEX_VERSION, MIN_INDEX_VERSION};
use crate::shared::error::{ArchiveError, Result};

/// One frame's time and byte offset in the data file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub time: i64,
    pub offset: u64,
}

/// Parsed clip index.
///
/// Layout by version: line 1 is the version; then the data file path,
/// the metadata file path (v3+), the mission id (v2+) and the stream id
/// (v4+); every remaining non-blank line is a `time offset` pair.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexFile {
    pub version: u32,
    pub data_path: String,
    pub metadata_path: Option<String>,
    pub mission_id: String,
    pub stream_id: String,
    pub entries: Vec<IndexEntry>,
}

impl IndexFile {
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ArchiveError::io(path, e))?;
        Self::parse(&text)
            .map_err(|e| ArchiveError::Format(format!("{}: {e}", path.display())))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(|line| line.trim_end_matches('\r'));
        let mut header = |what: &str| {
            lines
                .next()
                .map(|line| line.trim().to_string())
                .ok_or_else(|| ArchiveError::Format(format!("missing {what} line")))
        };

        let version_line = header("version")?;
        let version: u32 = version_line
            .parse()
            .map_err(|_| ArchiveError::Format(format!("bad version line '{version_line}'")))?;
        if !(MIN_INDEX_VERSION..=MAX_INDEX_VERSION).contains(&version) {
            return Err(ArchiveError::Format(format!("unsupported index version {version}")));
        }

        let data_path = header("data file")?;
        let metadata_path = if version >= 3 {
            Some(header("metadata file")?).filter(|p| !p.is_empty())
        } else {
            None
        };
        let mission_id = if version >= 2 { header("mission id")? } else { String::new() };
        let stream_id = if version >= 4 { header("stream id")? } else { String::new() };

        let entries = lines
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| parse_entry(line).ok_or_else(|| {
                ArchiveError::Format(format!("malformed index entry '{}' after header line {n}", line.trim()))
            }))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            version,
            data_path,
            metadata_path,
            mission_id,
            stream_id,
            entries,
        })
    }

    /// Renders the index in its own version's layout.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.version);
        let _ = writeln!(out, "{}", self.data_path);
        if self.version >= 3 {
            let _ = writeln!(out, "{}", self.metadata_path.as_deref().unwrap_or_default());
        }
        if self.version >= 2 {
            let _ = writeln!(out, "{}", self.mission_id);
        }
        if self.version >= 4 {
            let _ = writeln!(out, "{}", self.stream_id);
        }
        for entry in &self.entries {
            let _ = writeln!(out, "{} {}", entry.time, entry.offset);
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render()).map_err(|e| ArchiveError::io(path, e))
    }
}

fn parse_entry(line: &str) -> Option<IndexEntry> {
    let mut fields = line.split_whitespace();
    let time = fields.next()?.parse().ok()?;
    let offset = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(IndexEntry { time, offset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn v4_text() -> &'static str {
        "4\nclip.data\nclip.meta\nmission-7\neo-wide\n100 4\n200 1024\n\n300 2048\n"
    }

    #[test]
    fn test_parse_v4() {
        let index = IndexFile::parse(v4_text()).unwrap();
        assert_eq!(index.version, 4);
        assert_eq!(index.data_path, "clip.data");
        assert_eq!(index.metadata_path.as_deref(), Some("clip.meta"));
        assert_eq!(index.mission_id, "mission-7");
        assert_eq!(index.stream_id, "eo-wide");
        assert_eq!(
            index.entries,
            vec![
                IndexEntry { time: 100, offset: 4 },
                IndexEntry { time: 200, offset: 1024 },
                IndexEntry { time: 300, offset: 2048 },
            ]
        );
    }

    #[rstest]
    #[case::v1("1\nclip.data\n5 4\n", None, "", "")]
    #[case::v2("2\nclip.data\nm\n5 4\n", None, "m", "")]
    #[case::v3("3\nclip.data\nclip.meta\nm\n5 4\n", Some("clip.meta"), "m", "")]
    #[case::v3_without_metadata("3\nclip.data\n\nm\n5 4\n", None, "m", "")]
    fn test_header_fields_by_version(
        #[case] text: &str,
        #[case] metadata: Option<&str>,
        #[case] mission: &str,
        #[case] stream: &str,
    ) {
        let index = IndexFile::parse(text).unwrap();
        assert_eq!(index.data_path, "clip.data");
        assert_eq!(index.metadata_path.as_deref(), metadata);
        assert_eq!(index.mission_id, mission);
        assert_eq!(index.stream_id, stream);
        assert_eq!(index.entries, vec![IndexEntry { time: 5, offset: 4 }]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let index = IndexFile::parse("2\r\nclip.data\r\nm\r\n1 4\r\n").unwrap();
        assert_eq!(index.data_path, "clip.data");
        assert_eq!(index.mission_id, "m");
    }

    #[rstest]
    #[case::unsupported_version("5\nclip.data\n")]
    #[case::zero_version("0\nclip.data\n")]
    #[case::not_a_number("abc\nclip.data\n")]
    #[case::truncated_header("4\nclip.data\nclip.meta\n")]
    #[case::bad_entry("1\nclip.data\n10 x\n")]
    #[case::extra_field("1\nclip.data\n10 4 9\n")]
    #[case::empty("")]
    fn test_format_errors(#[case] text: &str) {
        assert!(matches!(IndexFile::parse(text), Err(ArchiveError::Format(_))));
    }

    #[test]
    fn test_render_round_trips() {
        let index = IndexFile::parse(v4_text()).unwrap();
        assert_eq!(IndexFile::parse(&index.render()).unwrap(), index);
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let result = IndexFile::read(Path::new("/nonexistent/clip.idx"));
        assert!(matches!(result, Err(ArchiveError::Io { .. })));
    }
}
