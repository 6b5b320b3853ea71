use std::collections::HashMap;
use std::path::PathBuf;

use crate::archive::domain::clip_request::ClipRequest;
use crate::archive::domain::clip_uri::ClipUri;
use crate::archive::infrastructure::archive_clip::ArchiveClip;
use crate::archive::infrastructure::manifest::Manifest;
use crate::shared::constants::MAX_MANIFEST_DEPTH;
use crate::shared::error::{ArchiveError, Result};
use crate::video::domain::video_sequence::VideoSequence;

/// Outcome of [`ArchiveCatalog::get_clip`].
#[derive(Debug)]
pub enum ResolvedClip {
    /// Self-contained URI selecting the resolved range; safe to hand to
    /// another thread and open there.
    Uri(String),
    /// Sub-clip sharing the catalog clip's data file.
    Clip(ArchiveClip),
}

struct CatalogEntry {
    clip: ArchiveClip,
    uri: ClipUri,
}

/// Clips grouped by mission, resolving temporal requests to the best match.
#[derive(Default)]
pub struct ArchiveCatalog {
    entries: Vec<CatalogEntry>,
    by_mission: HashMap<String, Vec<usize>>,
}

impl ArchiveCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a clip index or a manifest of further sources.
    ///
    /// Returns the number of clips added. Sources listed inside a manifest
    /// that fail to load are logged and skipped; only a failure of `uri`
    /// itself is returned.
    pub fn add_source(&mut self, uri: &str) -> Result<usize> {
        let mut chain = Vec::new();
        self.add_nested(uri, &mut chain)
    }

    fn add_nested(&mut self, uri: &str, chain: &mut Vec<PathBuf>) -> Result<usize> {
        let parsed = ClipUri::parse(uri);
        let path = parsed.local_path().ok_or_else(|| {
            ArchiveError::Format(format!("unsupported source location '{}'", parsed.location()))
        })?;

        let Some(manifest) = Manifest::read(&path)? else {
            let clip = ArchiveClip::open_uri(uri)?;
            self.insert(clip, parsed);
            return Ok(1);
        };

        let canonical = path.canonicalize().map_err(|e| ArchiveError::io(&path, e))?;
        if chain.contains(&canonical) {
            return Err(ArchiveError::Format(format!(
                "manifest {} includes itself",
                canonical.display()
            )));
        }
        if chain.len() >= MAX_MANIFEST_DEPTH {
            return Err(ArchiveError::Format(format!(
                "manifests nested deeper than {MAX_MANIFEST_DEPTH} at {}",
                canonical.display()
            )));
        }

        log::debug!(
            "Reading manifest v{} {} ({} sources)",
            manifest.version,
            canonical.display(),
            manifest.sources.len()
        );
        chain.push(canonical);
        let mut added = 0;
        for source in &manifest.sources {
            match self.add_nested(source, chain) {
                Ok(count) => added += count,
                Err(e) => log::warn!("Skipping source {source}: {e}"),
            }
        }
        chain.pop();
        Ok(added)
    }

    /// Adds an already opened clip under `uri`.
    pub fn insert(&mut self, clip: ArchiveClip, uri: ClipUri) {
        log::info!(
            "Cataloged {} (mission '{}', stream '{}', {} frames)",
            uri,
            clip.mission_id(),
            clip.stream_id(),
            clip.frame_count()
        );
        self.by_mission
            .entry(clip.mission_id().to_string())
            .or_default()
            .push(self.entries.len());
        self.entries.push(CatalogEntry { clip, uri });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clips(&self) -> impl Iterator<Item = &ArchiveClip> {
        self.entries.iter().map(|entry| &entry.clip)
    }

    /// Known mission ids, sorted.
    pub fn missions(&self) -> Vec<&str> {
        let mut missions: Vec<&str> = self.by_mission.keys().map(String::as_str).collect();
        missions.sort_unstable();
        missions
    }

    pub fn clips_for_mission<'a>(&'a self, mission_id: &str) -> impl Iterator<Item = &'a ArchiveClip> + 'a {
        self.by_mission
            .get(mission_id)
            .into_iter()
            .flatten()
            .map(move |&i| &self.entries[i].clip)
    }

    /// Source URI a cataloged clip was loaded from.
    pub fn uri_of(&self, clip: &ArchiveClip) -> Option<&ClipUri> {
        self.entries
            .iter()
            .find(|entry| std::ptr::eq(&entry.clip, clip))
            .map(|entry| &entry.uri)
    }

    /// Best clip for `request`.
    ///
    /// A candidate whose range contains the whole request wins at once.
    /// Otherwise the candidate with the largest overlap wins, the earliest
    /// loaded one on ties. NaN or infinite bounds match nothing.
    pub fn find_clip(&self, request: &ClipRequest) -> Option<&ArchiveClip> {
        self.find_entry(request).map(|entry| &entry.clip)
    }

    fn find_entry(&self, request: &ClipRequest) -> Option<&CatalogEntry> {
        if !request.start_time.is_finite() || !request.end_time.is_finite() {
            return None;
        }
        let (start, end) = request.bounds();
        if end < start {
            return None;
        }
        let candidates = self.by_mission.get(&request.mission_id)?;

        let mut best: Option<(&CatalogEntry, f64)> = None;
        for entry in candidates.iter().map(|&i| &self.entries[i]) {
            let stream = entry.clip.stream_id();
            if let Some(wanted) = request.stream_filter() {
                if !stream.is_empty() && stream != wanted {
                    continue;
                }
            }
            let Some((clip_start, clip_end)) = time_bounds(&entry.clip) else {
                continue;
            };
            if clip_start > end || clip_end < start {
                continue;
            }
            if clip_start <= start && clip_end >= end {
                return Some(entry);
            }
            let overlap = clip_end.min(end) - clip_start.max(start);
            if best.map_or(true, |(_, longest)| overlap > longest) {
                best = Some((entry, overlap));
            }
        }
        best.map(|(entry, _)| entry)
    }

    /// Resolves `request` including padding.
    ///
    /// With `want_uri` the result is the clip's source URI restricted to the
    /// resolved range; otherwise a sub-clip of the cataloged clip.
    pub fn get_clip(&self, request: &ClipRequest, want_uri: bool) -> Result<ResolvedClip> {
        let (entry, start, end) = self.resolve(request)?;
        if want_uri {
            Ok(ResolvedClip::Uri(entry.uri.with_range(start, end).to_string()))
        } else {
            Ok(ResolvedClip::Clip(entry.clip.sub_clip(start, end, 0.0)?))
        }
    }

    pub fn get_uri(&self, request: &ClipRequest) -> Result<String> {
        let (entry, start, end) = self.resolve(request)?;
        Ok(entry.uri.with_range(start, end).to_string())
    }

    fn resolve(&self, request: &ClipRequest) -> Result<(&CatalogEntry, f64, f64)> {
        let entry = self.find_entry(request).ok_or_else(|| {
            ArchiveError::Range(format!(
                "no clip of mission '{}' covers [{}, {}]",
                request.mission_id, request.start_time, request.end_time
            ))
        })?;
        let (start, end) =
            entry
                .clip
                .resolve_padding(request.start_time, request.end_time, request.padding)?;
        Ok((entry, start, end))
    }
}

fn time_bounds(clip: &ArchiveClip) -> Option<(f64, f64)> {
    let (first, last) = clip.time_range()?;
    Some((first.time()?, last.time()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use std::path::Path;

    use crate::archive::infrastructure::archive_writer::{ArchiveWriter, WriterOptions};
    use crate::shared::frame_image::{FrameImage, ImageLayout};
    use crate::shared::frame_metadata::FrameMetadata;
    use crate::shared::time_stamp::TimeStamp;

    fn write_clip(dir: &Path, name: &str, mission: &str, stream: &str, times: std::ops::RangeInclusive<i64>) -> String {
        let options = WriterOptions {
            mission_id: mission.to_string(),
            stream_id: stream.to_string(),
            ..WriterOptions::default()
        };
        let mut writer = ArchiveWriter::create(dir, name, options).unwrap();
        for t in times {
            let image = FrameImage::from_vec(vec![t as u8], ImageLayout::interleaved(1, 1, 1)).unwrap();
            let meta = FrameMetadata {
                homography_reference_frame: Some(1),
                ..FrameMetadata::new(t)
            };
            writer.write_frame(t, &image, Some(&meta)).unwrap();
        }
        writer.finish().unwrap().to_string_lossy().into_owned()
    }

    fn write_manifest(path: &Path, sources: &[&str]) -> String {
        let mut text = String::from("archive 1\n");
        for source in sources {
            text.push_str(source);
            text.push('\n');
        }
        fs::write(path, text).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn ts(t: f64) -> TimeStamp {
        TimeStamp::from_time(t)
    }

    /// Mission m1 with clip `a` over [0, 9] and clip `b` over [5, 30].
    fn two_clip_catalog(dir: &Path) -> ArchiveCatalog {
        let a = write_clip(dir, "a", "m1", "eo", 0..=9);
        let b = write_clip(dir, "b", "m1", "eo", 5..=30);
        let manifest = write_manifest(&dir.join("m1.manifest"), &[&a, &b]);
        let mut catalog = ArchiveCatalog::new();
        assert_eq!(catalog.add_source(&manifest).unwrap(), 2);
        catalog
    }

    fn found_range(catalog: &ArchiveCatalog, request: &ClipRequest) -> Option<(TimeStamp, TimeStamp)> {
        catalog.find_clip(request).and_then(|clip| clip.time_range())
    }

    // ---- loading ----

    #[test]
    fn test_single_index_source() {
        let dir = tempfile::tempdir().unwrap();
        let index = write_clip(dir.path(), "a", "m1", "eo", 0..=3);
        let mut catalog = ArchiveCatalog::new();
        assert_eq!(catalog.add_source(&index).unwrap(), 1);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.missions(), vec!["m1"]);
        let clip = catalog.clips().next().unwrap();
        assert_eq!(catalog.uri_of(clip).map(ToString::to_string), Some(index));
    }

    #[test]
    fn test_manifest_skips_bad_sources() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_clip(dir.path(), "a", "m1", "eo", 0..=3);
        let b = write_clip(dir.path(), "b", "m2", "ir", 0..=3);
        fs::write(dir.path().join("broken.idx"), "9\nnothing\n").unwrap();
        let manifest = write_manifest(
            &dir.path().join("all.manifest"),
            &[&a, "missing.idx", "broken.idx", "ftp://remote/clip.idx", &b],
        );

        let mut catalog = ArchiveCatalog::new();
        assert_eq!(catalog.add_source(&manifest).unwrap(), 2);
        assert_eq!(catalog.missions(), vec!["m1", "m2"]);
        assert_eq!(catalog.clips_for_mission("m2").count(), 1);
        assert_eq!(catalog.clips_for_mission("m3").count(), 0);
    }

    #[test]
    fn test_nested_manifests_with_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("day1");
        fs::create_dir(&sub).unwrap();
        write_clip(&sub, "a", "m1", "eo", 0..=3);
        write_manifest(&sub.join("day.manifest"), &["a.idx"]);
        let top = write_manifest(&dir.path().join("top.manifest"), &["day1/day.manifest"]);

        let mut catalog = ArchiveCatalog::new();
        assert_eq!(catalog.add_source(&top).unwrap(), 1);
    }

    #[test]
    fn test_manifest_cycle_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let clip = write_clip(dir.path(), "a", "m1", "eo", 0..=3);
        write_manifest(&dir.path().join("first.manifest"), &["second.manifest", &clip]);
        write_manifest(&dir.path().join("second.manifest"), &["first.manifest"]);

        let mut catalog = ArchiveCatalog::new();
        let first = dir.path().join("first.manifest");
        assert_eq!(catalog.add_source(&first.to_string_lossy()).unwrap(), 1);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_manifest_depth_is_limited() {
        let dir = tempfile::tempdir().unwrap();
        let clip = write_clip(dir.path(), "a", "m1", "eo", 0..=3);
        let depth = MAX_MANIFEST_DEPTH + 5;
        write_manifest(&dir.path().join(format!("{depth}.manifest")), &[&clip]);
        for n in (0..depth).rev() {
            let next = format!("{}.manifest", n + 1);
            write_manifest(&dir.path().join(format!("{n}.manifest")), &[&next]);
        }

        let mut catalog = ArchiveCatalog::new();
        let root = dir.path().join("0.manifest");
        assert_eq!(catalog.add_source(&root.to_string_lossy()).unwrap(), 0);
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_top_level_failures_are_returned() {
        let mut catalog = ArchiveCatalog::new();
        assert!(matches!(
            catalog.add_source("/nonexistent/clip.idx"),
            Err(ArchiveError::Io { .. })
        ));
        assert!(matches!(
            catalog.add_source("https://example.org/clip.idx"),
            Err(ArchiveError::Format(_))
        ));
    }

    // ---- find_clip ----

    #[test]
    fn test_containing_clip_wins() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = two_clip_catalog(dir.path());
        assert_eq!(found_range(&catalog, &ClipRequest::new("m1", 6.0, 8.0)), Some((ts(0.0), ts(9.0))));
        assert_eq!(found_range(&catalog, &ClipRequest::new("m1", 20.0, 25.0)), Some((ts(5.0), ts(30.0))));
        // Containment beats the earlier partial overlap.
        assert_eq!(found_range(&catalog, &ClipRequest::new("m1", 8.0, 12.0)), Some((ts(5.0), ts(30.0))));
    }

    #[test]
    fn test_largest_overlap_wins() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_clip(dir.path(), "a", "m1", "", 0..=9);
        let c = write_clip(dir.path(), "c", "m1", "", 10..=19);
        let mut catalog = ArchiveCatalog::new();
        catalog.add_source(&a).unwrap();
        catalog.add_source(&c).unwrap();

        assert_eq!(found_range(&catalog, &ClipRequest::new("m1", 8.0, 15.0)), Some((ts(10.0), ts(19.0))));
        assert_eq!(found_range(&catalog, &ClipRequest::new("m1", -5.0, 11.0)), Some((ts(0.0), ts(9.0))));
    }

    #[test]
    fn test_equal_overlap_goes_to_earliest_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_clip(dir.path(), "a", "m1", "", 0..=9);
        let c = write_clip(dir.path(), "c", "m1", "", 20..=29);
        let request = ClipRequest::new("m1", 5.0, 24.0);

        let mut catalog = ArchiveCatalog::new();
        catalog.add_source(&a).unwrap();
        catalog.add_source(&c).unwrap();
        assert_eq!(found_range(&catalog, &request), Some((ts(0.0), ts(9.0))));

        let mut reversed = ArchiveCatalog::new();
        reversed.add_source(&c).unwrap();
        reversed.add_source(&a).unwrap();
        assert_eq!(found_range(&reversed, &request), Some((ts(20.0), ts(29.0))));
    }

    #[test]
    fn test_stream_filter() {
        let dir = tempfile::tempdir().unwrap();
        let eo = write_clip(dir.path(), "eo", "m1", "eo", 0..=9);
        let ir = write_clip(dir.path(), "ir", "m1", "ir", 0..=9);
        let mut catalog = ArchiveCatalog::new();
        catalog.add_source(&eo).unwrap();
        catalog.add_source(&ir).unwrap();

        let request = ClipRequest::new("m1", 1.0, 2.0).with_stream("ir");
        assert_eq!(catalog.find_clip(&request).map(ArchiveClip::stream_id), Some("ir"));
        let any = ClipRequest::new("m1", 1.0, 2.0).with_stream("");
        assert_eq!(catalog.find_clip(&any).map(ArchiveClip::stream_id), Some("eo"));
        let other = ClipRequest::new("m1", 1.0, 2.0).with_stream("sar");
        assert!(catalog.find_clip(&other).is_none());
    }

    #[test]
    fn test_find_clip_failures() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = two_clip_catalog(dir.path());
        assert!(catalog.find_clip(&ClipRequest::new("m9", 1.0, 2.0)).is_none());
        assert!(catalog.find_clip(&ClipRequest::new("m1", 8.0, 2.0)).is_none());
        assert!(catalog.find_clip(&ClipRequest::new("m1", 40.0, 50.0)).is_none());
    }

    #[rstest]
    #[case::nan_start(f64::NAN, 8.0)]
    #[case::nan_end(2.0, f64::NAN)]
    #[case::infinite_end(2.0, f64::INFINITY)]
    #[case::infinite_start(f64::NEG_INFINITY, 8.0)]
    fn test_non_finite_request_finds_nothing(#[case] start: f64, #[case] end: f64) {
        let dir = tempfile::tempdir().unwrap();
        let catalog = two_clip_catalog(dir.path());
        let request = ClipRequest::new("m1", start, end);
        assert!(catalog.find_clip(&request).is_none());
        assert!(matches!(catalog.get_uri(&request), Err(ArchiveError::Range(_))));
    }

    #[test]
    fn test_unbounded_request() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = two_clip_catalog(dir.path());
        // Neither clip contains an open range; b overlaps it the most.
        let request = ClipRequest::new("m1", -1.0, -1.0);
        assert_eq!(found_range(&catalog, &request), Some((ts(5.0), ts(30.0))));
    }

    // ---- get_clip ----

    #[test]
    fn test_get_clip_returns_shared_sub_clip() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = two_clip_catalog(dir.path());
        let request = ClipRequest::new("m1", 2.0, 4.0).with_padding(1.0);

        let ResolvedClip::Clip(sub) = catalog.get_clip(&request, false).unwrap() else {
            panic!("expected a clip");
        };
        assert_eq!(sub.time_range(), Some((ts(1.0), ts(5.0))));
        let parent = catalog.find_clip(&request).unwrap();
        assert!(sub.shares_storage_with(parent));
    }

    #[test]
    fn test_get_uri_opens_independent_clip() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = two_clip_catalog(dir.path());
        let request = ClipRequest::new("m1", 2.4, 3.6);

        let uri = catalog.get_uri(&request).unwrap();
        assert!(uri.ends_with("a.idx?StartTime=2&EndTime=4"), "{uri}");

        let clip = ArchiveClip::open_uri(&uri).unwrap();
        assert_eq!(clip.time_range(), Some((ts(2.0), ts(4.0))));
        assert!(!clip.shares_storage_with(catalog.find_clip(&request).unwrap()));
    }

    #[test]
    fn test_get_clip_without_match_is_range_error() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = two_clip_catalog(dir.path());
        let result = catalog.get_clip(&ClipRequest::new("m1", 100.0, 200.0), true);
        assert!(matches!(result, Err(ArchiveError::Range(_))));
    }
}
