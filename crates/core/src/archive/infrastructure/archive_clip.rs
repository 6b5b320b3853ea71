use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::archive::domain::clip_uri::ClipUri;
use crate::archive::domain::padding::{resolve_padding, TimelinePoint};
use crate::archive::infrastructure::archive_frame_source::{ArchiveFrameSource, DataStream};
use crate::archive::infrastructure::index_file::IndexFile;
use crate::archive::infrastructure::metadata_file::read_metadata_file;
use crate::archive::infrastructure::path_resolver::resolve_referenced_path;
use crate::shared::constants::UNBOUNDED_TIME;
use crate::shared::error::{ArchiveError, Result};
use crate::shared::frame_metadata::FrameMetadata;
use crate::shared::time_indexed_map::TimeIndexedMap;
use crate::shared::time_stamp::TimeStamp;
use crate::video::domain::frame_ptr::FramePtr;
use crate::video::domain::video_sequence::{FrameSequence, VideoSequence};

/// A recorded clip opened from its index file.
///
/// Frames are decoded lazily from the data file, whose handle is shared by
/// every frame and every sub-clip. Reads through that handle must not
/// overlap; open the clip again (for example via [`ArchiveClip::open_uri`])
/// to get an independent copy.
pub struct ArchiveClip {
    sequence: FrameSequence,
    mission_id: String,
    stream_id: String,
    metadata: TimeIndexedMap<FrameMetadata>,
    offsets: TimeIndexedMap<u64>,
    data: DataStream,
    index_path: PathBuf,
}

impl ArchiveClip {
    pub fn open(index_path: &Path) -> Result<Self> {
        let index = IndexFile::read(index_path)?;
        let data_path = resolve_referenced_path(&index.data_path, index_path)?;
        let data = DataStream::open(&data_path)?;

        let records = match &index.metadata_path {
            Some(reference) => read_metadata_file(&resolve_referenced_path(reference, index_path)?)?,
            None => Vec::new(),
        };
        if records.len() > index.entries.len() {
            return Err(ArchiveError::Format(format!(
                "{}: {} metadata records for {} frames",
                index_path.display(),
                records.len(),
                index.entries.len()
            )));
        }

        let mut frames = TimeIndexedMap::new();
        let mut offsets = TimeIndexedMap::new();
        let mut metadata = TimeIndexedMap::new();
        let mut records = records.into_iter();
        for (n, entry) in index.entries.iter().enumerate() {
            let record = records.next();
            if let Some(record) = &record {
                if record.time != entry.time {
                    return Err(ArchiveError::Format(format!(
                        "{}: metadata time {} does not match index time {}",
                        index_path.display(),
                        record.time,
                        entry.time
                    )));
                }
            }

            let timestamp = TimeStamp::new(Some(entry.time as f64), u32::try_from(n).ok());
            let source = Rc::new(ArchiveFrameSource::new(data.clone(), entry.offset));
            if !frames.insert(timestamp, FramePtr::new(timestamp, source)) {
                log::warn!(
                    "{}: skipping duplicate index entry at time {}",
                    index_path.display(),
                    entry.time
                );
                continue;
            }
            offsets.insert(timestamp, entry.offset);
            if let Some(record) = record {
                metadata.insert(timestamp, record);
            }
        }

        log::debug!(
            "Opened {} ({} frames, data v{})",
            index_path.display(),
            frames.len(),
            data.version()
        );
        Ok(Self {
            sequence: FrameSequence::new(frames),
            mission_id: index.mission_id,
            stream_id: index.stream_id,
            metadata,
            offsets,
            data,
            index_path: index_path.to_path_buf(),
        })
    }

    /// Opens the clip a URI points at. `StartTime`/`EndTime` parameters
    /// restrict the result to that range.
    pub fn open_uri(uri: &str) -> Result<Self> {
        let uri = ClipUri::parse(uri);
        let path = uri
            .local_path()
            .ok_or_else(|| ArchiveError::Format(format!("unsupported clip location '{}'", uri.location())))?;
        let clip = Self::open(&path)?;
        match (uri.start_time(), uri.end_time()) {
            (None, None) => Ok(clip),
            (start, end) => clip.sub_clip(
                start.unwrap_or(UNBOUNDED_TIME),
                end.unwrap_or(UNBOUNDED_TIME),
                0.0,
            ),
        }
    }

    pub fn mission_id(&self) -> &str {
        &self.mission_id
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn data_path(&self) -> &Path {
        self.data.path()
    }

    pub fn data_version(&self) -> u32 {
        self.data.version()
    }

    pub fn metadata(&self) -> &TimeIndexedMap<FrameMetadata> {
        &self.metadata
    }

    /// Whether both clips read from the same open data file.
    pub fn shares_storage_with(&self, other: &ArchiveClip) -> bool {
        self.data.is_same_stream(&other.data)
    }

    /// Metadata for the frame at `timestamp`.
    ///
    /// Falls back to metadata embedded in the data file when the clip has
    /// no metadata file entry for that frame.
    pub fn metadata_at(&self, timestamp: &TimeStamp) -> Option<FrameMetadata> {
        if let Some(found) = self.metadata.get(timestamp) {
            return Some(found.clone());
        }
        let offset = *self.offsets.get(timestamp)?;
        match self.data.read_metadata(offset) {
            Ok(found) => found,
            Err(e) => {
                log::warn!("No embedded metadata at {timestamp}: {e}");
                None
            }
        }
    }

    fn timeline(&self) -> Vec<TimelinePoint> {
        self.frames()
            .keys()
            .filter_map(|key| {
                Some(TimelinePoint {
                    time: key.time()?,
                    shot: self.metadata.get(key).and_then(FrameMetadata::shot_id),
                })
            })
            .collect()
    }

    /// Grows `[start, end]` by `padding` within this clip's shots.
    pub fn resolve_padding(&self, start: f64, end: f64, padding: f64) -> Result<(f64, f64)> {
        resolve_padding(&self.timeline(), !self.metadata.is_empty(), start, end, padding)
    }

    /// A clip over the resolved range, sharing this clip's data file.
    pub fn sub_clip(&self, start: f64, end: f64, padding: f64) -> Result<ArchiveClip> {
        let (start, end) = self.resolve_padding(start, end, padding)?;
        let (from, to) = (TimeStamp::from_time(start), TimeStamp::from_time(end));
        Ok(ArchiveClip {
            sequence: FrameSequence::new(self.frames().subset(from, to)),
            mission_id: self.mission_id.clone(),
            stream_id: self.stream_id.clone(),
            metadata: self.metadata.subset(from, to),
            offsets: self.offsets.subset(from, to),
            data: self.data.clone(),
            index_path: self.index_path.clone(),
        })
    }
}

impl VideoSequence for ArchiveClip {
    fn sequence(&self) -> &FrameSequence {
        &self.sequence
    }

    fn sequence_mut(&mut self) -> &mut FrameSequence {
        &mut self.sequence
    }
}

impl std::fmt::Debug for ArchiveClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveClip")
            .field("index_path", &self.index_path)
            .field("mission_id", &self.mission_id)
            .field("stream_id", &self.stream_id)
            .field("frames", &self.frame_count())
            .finish()
    }
}
