use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::shared::binary::{ReadLe, WriteLe};
use crate::shared::constants::RAW_FORMAT_TAG;
use crate::shared::error::{ArchiveError, Result};
use crate::shared::frame_image::FrameImage;
use crate::shared::shared_stream::SharedStream;
use crate::shared::time_stamp::TimeStamp;
use crate::video::domain::frame_codec::FrameCodec;
use crate::video::domain::frame_ptr::{FramePtr, FrameSource};
use crate::video::domain::video_sequence::{FrameSequence, VideoSequence};
use crate::video::infrastructure::image_codec::codec_for_tag;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferStorage {
    /// Anonymous temporary file, removed when the buffer is dropped.
    #[default]
    TempFile,
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub storage: BufferStorage,
    /// Codec tag applied to stored frames; `None` stores raw images.
    pub compression: Option<String>,
}

enum BackingStore {
    Memory(Cursor<Vec<u8>>),
    TempFile(File),
}

impl BackingStore {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        match self {
            BackingStore::Memory(cursor) => {
                cursor.get_mut().truncate(len as usize);
                Ok(())
            }
            BackingStore::TempFile(file) => file.set_len(len),
        }
    }
}

impl Read for BackingStore {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BackingStore::Memory(cursor) => cursor.read(buf),
            BackingStore::TempFile(file) => file.read(buf),
        }
    }
}

impl Write for BackingStore {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            BackingStore::Memory(cursor) => cursor.write(buf),
            BackingStore::TempFile(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            BackingStore::Memory(cursor) => cursor.flush(),
            BackingStore::TempFile(file) => file.flush(),
        }
    }
}

impl Seek for BackingStore {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            BackingStore::Memory(cursor) => cursor.seek(pos),
            BackingStore::TempFile(file) => file.seek(pos),
        }
    }
}

/// Reads one record back out of a [`VideoBuffer`]'s store.
struct BufferFrameSource {
    store: SharedStream<BackingStore>,
    offset: u64,
    codec: Option<Arc<dyn FrameCodec>>,
}

impl FrameSource for BufferFrameSource {
    fn load(&self, _timestamp: &TimeStamp) -> Result<FrameImage> {
        match &self.codec {
            Some(codec) => {
                let encoded = self.store.with_exclusive(|store| {
                    store.seek(SeekFrom::Start(self.offset))?;
                    let len = store.read_u64_le()?;
                    let mut bytes = Vec::new();
                    Read::by_ref(store).take(len).read_to_end(&mut bytes)?;
                    Ok(bytes)
                })?;
                codec.decode(&encoded)
            }
            None => self.store.with_exclusive(|store| {
                store.seek(SeekFrom::Start(self.offset))?;
                Ok(FrameImage::read_from(store))
            })?,
        }
    }
}

/// Frame cache filled at runtime.
///
/// Each inserted frame is appended to a single backing store (temporary
/// file by default, or memory) and indexed by its timestamp. When a
/// compression tag is configured every stored frame is encoded with it.
pub struct VideoBuffer {
    sequence: FrameSequence,
    store: SharedStream<BackingStore>,
    codec: Option<Arc<dyn FrameCodec>>,
}

impl VideoBuffer {
    pub fn new(config: &BufferConfig) -> Result<Self> {
        let codec = match config.compression.as_deref() {
            None => None,
            Some(tag) if tag.eq_ignore_ascii_case(RAW_FORMAT_TAG) => None,
            Some(tag) => Some(
                codec_for_tag(tag)
                    .ok_or_else(|| ArchiveError::Format(format!("unknown compression tag '{tag}'")))?,
            ),
        };
        let store = match config.storage {
            BufferStorage::Memory => {
                SharedStream::new(BackingStore::Memory(Cursor::new(Vec::new())), "<memory>")
            }
            BufferStorage::TempFile => {
                let file = tempfile::tempfile().map_err(|e| ArchiveError::io("<tempfile>", e))?;
                SharedStream::new(BackingStore::TempFile(file), "<tempfile>")
            }
        };
        Ok(Self {
            sequence: FrameSequence::default(),
            store,
            codec,
        })
    }

    /// Uncompressed, memory-backed buffer.
    pub fn in_memory() -> Self {
        Self {
            sequence: FrameSequence::default(),
            store: SharedStream::new(BackingStore::Memory(Cursor::new(Vec::new())), "<memory>"),
            codec: None,
        }
    }

    pub fn compression(&self) -> Option<&str> {
        self.codec.as_ref().map(|codec| codec.tag())
    }

    /// Total bytes written to the backing store.
    pub fn stored_bytes(&self) -> Result<u64> {
        self.store.with_exclusive(|store| store.seek(SeekFrom::End(0)))
    }

    /// Stores `image` at `timestamp`, encoding it with the configured codec.
    pub fn insert_image(&mut self, timestamp: TimeStamp, image: &FrameImage) -> Result<()> {
        self.check_insertable(&timestamp)?;
        let record = self.encode_record(image)?;
        self.append(timestamp, &record)
    }

    /// Stores an already-encoded frame.
    ///
    /// Frames in the configured format are kept verbatim; anything else is
    /// decoded and stored as [`VideoBuffer::insert_image`] would.
    pub fn insert_encoded(&mut self, timestamp: TimeStamp, bytes: &[u8], tag: &str) -> Result<()> {
        self.check_insertable(&timestamp)?;

        if tag.eq_ignore_ascii_case(RAW_FORMAT_TAG) {
            let image = FrameImage::read_from(&mut Cursor::new(bytes))?;
            let record = self.encode_record(&image)?;
            return self.append(timestamp, &record);
        }

        let source = codec_for_tag(tag)
            .ok_or_else(|| ArchiveError::Decode(format!("no decoder for format '{tag}'")))?;
        if self.compression() == Some(source.tag()) {
            let mut record = Vec::with_capacity(bytes.len() + 8);
            record.write_u64_le(bytes.len() as u64).map_err(record_error)?;
            record.extend_from_slice(bytes);
            return self.append(timestamp, &record);
        }

        let image = source.decode(bytes)?;
        let record = self.encode_record(&image)?;
        self.append(timestamp, &record)
    }

    fn check_insertable(&self, timestamp: &TimeStamp) -> Result<()> {
        if !timestamp.is_valid() {
            return Err(ArchiveError::Format("cannot insert at an invalid timestamp".to_string()));
        }
        if self.sequence.frames().contains_key(timestamp) {
            return Err(ArchiveError::DuplicateInsertion(*timestamp));
        }
        if !self.sequence.frames().matches_key_kind(timestamp) {
            return Err(ArchiveError::Format(format!(
                "{timestamp} mixes timed and frame-only keys"
            )));
        }
        Ok(())
    }

    fn encode_record(&self, image: &FrameImage) -> Result<Vec<u8>> {
        let mut record = Vec::new();
        match &self.codec {
            Some(codec) => {
                let encoded = codec.encode(image)?;
                record.write_u64_le(encoded.len() as u64).map_err(record_error)?;
                record.extend_from_slice(&encoded);
            }
            None => image.write_to(&mut record).map_err(record_error)?,
        }
        Ok(record)
    }

    fn append(&mut self, timestamp: TimeStamp, record: &[u8]) -> Result<()> {
        let offset = self.store.with_exclusive(|store| {
            let offset = store.seek(SeekFrom::End(0))?;
            if let Err(e) = store.write_all(record) {
                let _ = store.truncate(offset);
                return Err(e);
            }
            Ok(offset)
        })?;

        let source = BufferFrameSource {
            store: self.store.clone(),
            offset,
            codec: self.codec.clone(),
        };
        self.sequence
            .insert(FramePtr::new(timestamp, Rc::new(source)));
        Ok(())
    }
}

fn record_error(e: io::Error) -> ArchiveError {
    ArchiveError::Decode(format!("failed to build frame record: {e}"))
}

impl VideoSequence for VideoBuffer {
    fn sequence(&self) -> &FrameSequence {
        &self.sequence
    }

    fn sequence_mut(&mut self) -> &mut FrameSequence {
        &mut self.sequence
    }
}
