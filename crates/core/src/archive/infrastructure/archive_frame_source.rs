use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;

use crate::archive::infrastructure::data_file::{
    check_data_version, read_data_version, read_embedded_metadata, read_frame_record, FrameRecord,
};
use crate::shared::error::{ArchiveError, Result};
use crate::shared::frame_image::FrameImage;
use crate::shared::frame_metadata::FrameMetadata;
use crate::shared::shared_stream::SharedStream;
use crate::shared::time_stamp::TimeStamp;
use crate::video::domain::frame_ptr::FrameSource;

/// An opened data file shared by a clip, its sub-clips and their frames.
#[derive(Clone, Debug)]
pub struct DataStream {
    stream: SharedStream<File>,
    version: u32,
}

impl DataStream {
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
        let version = read_data_version(&mut file).map_err(|e| ArchiveError::io(path, e))?;
        let version = check_data_version(version)
            .map_err(|e| ArchiveError::Format(format!("{}: {e}", path.display())))?;
        Ok(Self {
            stream: SharedStream::new(file, path),
            version,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn path(&self) -> &Path {
        self.stream.label()
    }

    pub fn handle_count(&self) -> usize {
        self.stream.handle_count()
    }

    pub fn is_same_stream(&self, other: &DataStream) -> bool {
        self.stream.is_same_stream(&other.stream)
    }

    pub fn read_frame(&self, offset: u64) -> Result<FrameRecord> {
        self.stream.with_exclusive(|file| {
            let found = read_data_version(file)?;
            file.seek(SeekFrom::Start(offset))?;
            Ok(self.expect_version(found).and_then(|v| read_frame_record(file, v)))
        })?
    }

    /// Metadata embedded in the record at `offset`, if the file carries any.
    pub fn read_metadata(&self, offset: u64) -> Result<Option<FrameMetadata>> {
        self.stream.with_exclusive(|file| {
            let found = read_data_version(file)?;
            file.seek(SeekFrom::Start(offset))?;
            Ok(self.expect_version(found).and_then(|v| read_embedded_metadata(file, v)))
        })?
    }

    fn expect_version(&self, found: u32) -> Result<u32> {
        if found == self.version {
            Ok(found)
        } else {
            Err(ArchiveError::Format(format!(
                "{}: data version changed from {} to {found}",
                self.path().display(),
                self.version
            )))
        }
    }
}

/// Lazily decodes one frame of an archived clip.
pub struct ArchiveFrameSource {
    data: DataStream,
    offset: u64,
}

impl ArchiveFrameSource {
    pub fn new(data: DataStream, offset: u64) -> Self {
        Self { data, offset }
    }
}

impl FrameSource for ArchiveFrameSource {
    fn load(&self, timestamp: &TimeStamp) -> Result<FrameImage> {
        let record = self.data.read_frame(self.offset)?;
        if let Some(expected) = timestamp.time() {
            if record.time as f64 != expected {
                log::warn!(
                    "{}: record at offset {} has time {} but the index says {expected}",
                    self.data.path().display(),
                    self.offset,
                    record.time
                );
            }
        }
        Ok(record.image)
    }
}
