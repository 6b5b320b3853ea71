use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::archive::infrastructure::metadata_file::{
    read_metadata_record, write_metadata_record, METADATA_VERSION,
};
use crate::shared::binary::{ReadLe, WriteLe};
use crate::shared::constants::{MAX_DATA_VERSION, MIN_DATA_VERSION, RAW_FORMAT_TAG};
use crate::shared::error::{ArchiveError, Result};
use crate::shared::frame_image::FrameImage;
use crate::shared::frame_metadata::FrameMetadata;
use crate::video::domain::frame_codec::FrameCodec;
use crate::video::infrastructure::image_codec::codec_for_tag;

/// Version written by [`write_data_header`].
pub const DATA_VERSION: u32 = MAX_DATA_VERSION;

/// One decoded record of a data file.
#[derive(Debug)]
pub struct FrameRecord {
    pub time: i64,
    pub metadata: Option<FrameMetadata>,
    pub image: FrameImage,
}

pub fn write_data_header<W: Write + ?Sized>(writer: &mut W) -> io::Result<()> {
    writer.write_u32_le(DATA_VERSION)
}

/// Reads the version word at the start of the stream; leaves the stream
/// positioned after it.
pub fn read_data_version<R: Read + Seek + ?Sized>(reader: &mut R) -> io::Result<u32> {
    reader.seek(SeekFrom::Start(0))?;
    reader.read_u32_le()
}

pub fn check_data_version(version: u32) -> Result<u32> {
    if (MIN_DATA_VERSION..=MAX_DATA_VERSION).contains(&version) {
        Ok(version)
    } else {
        Err(ArchiveError::Format(format!("unsupported data file version {version}")))
    }
}

/// Decodes the record at the reader's position.
pub fn read_frame_record<R: Read>(reader: &mut R, version: u32) -> Result<FrameRecord> {
    let (time, metadata) = read_record_prefix(reader, version)?;

    let image = if version >= 3 {
        let tag = reader.read_string_le().map_err(truncated)?;
        let len = reader.read_u64_le().map_err(truncated)?;
        let mut payload = reader.by_ref().take(len);
        if tag.eq_ignore_ascii_case(RAW_FORMAT_TAG) {
            FrameImage::read_from(&mut payload)?
        } else {
            let codec = codec_for_tag(&tag)
                .ok_or_else(|| ArchiveError::Decode(format!("no decoder for format '{tag}'")))?;
            let mut bytes = Vec::new();
            payload.read_to_end(&mut bytes).map_err(truncated)?;
            if bytes.len() as u64 != len {
                return Err(ArchiveError::Format("truncated frame payload".to_string()));
            }
            codec.decode(&bytes)?
        }
    } else {
        FrameImage::read_from(reader)?
    };

    Ok(FrameRecord { time, metadata, image })
}

/// Reads only the time and embedded metadata of the record at the reader's
/// position. Versions before 2 never embed metadata.
pub fn read_embedded_metadata<R: Read>(reader: &mut R, version: u32) -> Result<Option<FrameMetadata>> {
    read_record_prefix(reader, version).map(|(_, metadata)| metadata)
}

fn read_record_prefix<R: Read>(reader: &mut R, version: u32) -> Result<(i64, Option<FrameMetadata>)> {
    let time = reader.read_i64_le().map_err(truncated)?;
    if version < 2 {
        return Ok((time, None));
    }
    let metadata = match reader.read_u8_le().map_err(truncated)? {
        0 => None,
        1 => Some(read_metadata_record(reader, METADATA_VERSION).map_err(truncated)?),
        flag => return Err(ArchiveError::Format(format!("bad metadata flag {flag}"))),
    };
    Ok((time, metadata))
}

/// Builds a record in the current layout. Without a codec the image is
/// stored as a serialized [`FrameImage`].
pub fn encode_frame_record(
    time: i64,
    image: &FrameImage,
    metadata: Option<&FrameMetadata>,
    codec: Option<&dyn FrameCodec>,
) -> Result<Vec<u8>> {
    let (tag, payload) = match codec {
        Some(codec) => (codec.tag().to_string(), codec.encode(image)?),
        None => {
            let mut payload = Vec::new();
            image.write_to(&mut payload).map_err(unwritable)?;
            (RAW_FORMAT_TAG.to_string(), payload)
        }
    };

    let mut record = Vec::with_capacity(payload.len() + 256);
    record.write_i64_le(time).map_err(unwritable)?;
    match metadata {
        Some(metadata) => {
            record.write_u8_le(1).map_err(unwritable)?;
            write_metadata_record(&mut record, metadata).map_err(unwritable)?;
        }
        None => record.write_u8_le(0).map_err(unwritable)?,
    }
    record.write_string_le(&tag).map_err(unwritable)?;
    record.write_u64_le(payload.len() as u64).map_err(unwritable)?;
    record.extend_from_slice(&payload);
    Ok(record)
}

fn truncated(e: io::Error) -> ArchiveError {
    ArchiveError::Format(format!("truncated frame record: {e}"))
}

fn unwritable(e: io::Error) -> ArchiveError {
    ArchiveError::Format(format!("failed to build frame record: {e}"))
}
