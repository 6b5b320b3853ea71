use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::infrastructure::data_file::{encode_frame_record, write_data_header};
use crate::archive::infrastructure::index_file::{IndexEntry, IndexFile};
use crate::archive::infrastructure::metadata_file::{write_metadata_header, write_metadata_record};
use crate::shared::constants::{MAX_INDEX_VERSION, RAW_FORMAT_TAG};
use crate::shared::error::{ArchiveError, Result};
use crate::shared::frame_image::FrameImage;
use crate::shared::frame_metadata::FrameMetadata;
use crate::video::domain::frame_codec::FrameCodec;
use crate::video::infrastructure::image_codec::codec_for_tag;

pub const INDEX_EXTENSION: &str = "idx";
pub const DATA_EXTENSION: &str = "data";
pub const METADATA_EXTENSION: &str = "meta";

#[derive(Clone, Debug)]
pub struct WriterOptions {
    pub mission_id: String,
    pub stream_id: String,
    /// Codec tag for stored frames; `raw` stores serialized images.
    pub codec: String,
    /// Copy each frame's metadata into its data record.
    pub embed_metadata: bool,
    /// Write a separate metadata file. Every frame must then carry metadata.
    pub write_metadata_file: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            mission_id: String::new(),
            stream_id: String::new(),
            codec: RAW_FORMAT_TAG.to_string(),
            embed_metadata: false,
            write_metadata_file: true,
        }
    }
}

/// Writes a clip as an index, a data file and optionally a metadata file.
///
/// Frames must arrive in strictly increasing time order. Nothing is usable
/// until [`ArchiveWriter::finish`] writes the index.
pub struct ArchiveWriter {
    index_path: PathBuf,
    data_name: String,
    metadata_name: Option<String>,
    options: WriterOptions,
    codec: Option<Arc<dyn FrameCodec>>,
    data: Box<dyn Write>,
    data_len: u64,
    metadata: Option<Box<dyn Write>>,
    entries: Vec<IndexEntry>,
    /// Set once a write fails; the data file no longer matches `data_len`.
    poisoned: bool,
}

impl ArchiveWriter {
    pub fn create(dir: &Path, base_name: &str, options: WriterOptions) -> Result<Self> {
        let codec = if options.codec.eq_ignore_ascii_case(RAW_FORMAT_TAG) {
            None
        } else {
            Some(codec_for_tag(&options.codec).ok_or_else(|| {
                ArchiveError::Format(format!("unknown codec '{}'", options.codec))
            })?)
        };

        let data_name = format!("{base_name}.{DATA_EXTENSION}");
        let data_path = dir.join(&data_name);
        let mut data = BufWriter::new(File::create(&data_path).map_err(|e| ArchiveError::io(&data_path, e))?);
        write_data_header(&mut data).map_err(|e| ArchiveError::io(&data_path, e))?;

        let (metadata_name, metadata) = if options.write_metadata_file {
            let name = format!("{base_name}.{METADATA_EXTENSION}");
            let path = dir.join(&name);
            let mut writer = BufWriter::new(File::create(&path).map_err(|e| ArchiveError::io(&path, e))?);
            write_metadata_header(&mut writer).map_err(|e| ArchiveError::io(&path, e))?;
            (Some(name), Some(Box::new(writer) as Box<dyn Write>))
        } else {
            (None, None)
        };

        log::debug!("Writing clip '{base_name}' to {}", dir.display());
        Ok(Self {
            index_path: dir.join(format!("{base_name}.{INDEX_EXTENSION}")),
            data_name,
            metadata_name,
            options,
            codec,
            data: Box::new(data),
            data_len: 4,
            metadata,
            entries: Vec::new(),
            poisoned: false,
        })
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn frame_count(&self) -> usize {
        self.entries.len()
    }

    /// Appends one frame. A rejected frame leaves the writer unchanged; a
    /// failed write makes every later call fail.
    pub fn write_frame(&mut self, time: i64, image: &FrameImage, metadata: Option<&FrameMetadata>) -> Result<()> {
        self.check_usable()?;
        if let Some(last) = self.entries.last() {
            if time <= last.time {
                return Err(ArchiveError::Format(format!(
                    "frame time {time} does not follow {}",
                    last.time
                )));
            }
        }
        if let Some(meta) = metadata {
            if meta.time != time {
                return Err(ArchiveError::Format(format!(
                    "metadata time {} does not match frame time {time}",
                    meta.time
                )));
            }
        }
        let metadata_record = match (&self.metadata, metadata) {
            (None, _) => None,
            (Some(_), Some(meta)) => {
                let mut record = Vec::new();
                write_metadata_record(&mut record, meta).map_err(|e| ArchiveError::Format(e.to_string()))?;
                Some(record)
            }
            (Some(_), None) => {
                return Err(ArchiveError::Format(format!("frame {time} has no metadata")));
            }
        };

        let embedded = metadata.filter(|_| self.options.embed_metadata);
        let record = encode_frame_record(time, image, embedded, self.codec.as_deref())?;

        let data_path = self.index_path.with_extension(DATA_EXTENSION);
        if let Err(e) = self.data.write_all(&record) {
            self.poisoned = true;
            return Err(ArchiveError::io(&data_path, e));
        }
        if let (Some(writer), Some(bytes)) = (self.metadata.as_mut(), metadata_record) {
            if let Err(e) = writer.write_all(&bytes) {
                self.poisoned = true;
                return Err(ArchiveError::io(self.index_path.with_extension(METADATA_EXTENSION), e));
            }
        }

        self.entries.push(IndexEntry {
            time,
            offset: self.data_len,
        });
        self.data_len += record.len() as u64;
        Ok(())
    }

    /// Flushes the data files and writes the index; returns its path.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.check_usable()?;
        let data_path = self.index_path.with_extension(DATA_EXTENSION);
        self.data.flush().map_err(|e| ArchiveError::io(&data_path, e))?;
        if let Some(writer) = self.metadata.as_mut() {
            writer
                .flush()
                .map_err(|e| ArchiveError::io(self.index_path.with_extension(METADATA_EXTENSION), e))?;
        }

        let index = IndexFile {
            version: MAX_INDEX_VERSION,
            data_path: self.data_name,
            metadata_path: self.metadata_name,
            mission_id: self.options.mission_id,
            stream_id: self.options.stream_id,
            entries: self.entries,
        };
        index.write(&self.index_path)?;
        log::info!(
            "Wrote {} frames to {}",
            index.entries.len(),
            self.index_path.display()
        );
        Ok(self.index_path)
    }

    fn check_usable(&self) -> Result<()> {
        if self.poisoned {
            return Err(ArchiveError::Format(format!(
                "{} is incomplete after a failed write",
                self.index_path.display()
            )));
        }
        Ok(())
    }
}
