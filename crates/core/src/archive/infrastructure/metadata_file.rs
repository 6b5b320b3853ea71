use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;

use crate::shared::binary::{ReadLe, WriteLe};
use crate::shared::constants::{MAX_METADATA_VERSION, MIN_METADATA_VERSION};
use crate::shared::error::{ArchiveError, Result};
use crate::shared::frame_metadata::{FrameMetadata, GeoPoint};

/// Version written by [`write_metadata_header`].
pub const METADATA_VERSION: u32 = MAX_METADATA_VERSION;

/// Missing integer fields are stored as this value.
const MISSING_INT: i64 = -1;

pub fn check_metadata_version(version: u32) -> Result<u32> {
    if (MIN_METADATA_VERSION..=MAX_METADATA_VERSION).contains(&version) {
        Ok(version)
    } else {
        Err(ArchiveError::Format(format!("unsupported metadata version {version}")))
    }
}

pub fn write_metadata_header<W: Write + ?Sized>(writer: &mut W) -> io::Result<()> {
    writer.write_u32_le(METADATA_VERSION)
}

/// Reads one record in the layout of metadata `version`.
pub fn read_metadata_record<R: Read + ?Sized>(reader: &mut R, version: u32) -> io::Result<FrameMetadata> {
    let time = reader.read_i64_le()?;
    let mut homography = [0.0; 9];
    for value in &mut homography {
        *value = reader.read_f64_le()?;
    }
    let mut corners = [GeoPoint::default(); 4];
    for corner in &mut corners {
        corner.latitude = reader.read_f64_le()?;
        corner.longitude = reader.read_f64_le()?;
    }

    let mut metadata = FrameMetadata {
        homography,
        corners,
        ..FrameMetadata::new(time)
    };
    if version > 1 {
        metadata.gsd = Some(reader.read_f64_le()?).filter(|v| !v.is_nan());
        metadata.frame_number = optional_int(reader.read_i64_le()?);
        metadata.homography_reference_frame = optional_int(reader.read_i64_le()?);
        metadata.image_width = optional_int(reader.read_i64_le()?);
        metadata.image_height = optional_int(reader.read_i64_le()?);
    }
    Ok(metadata)
}

/// Writes one record in the current layout.
pub fn write_metadata_record<W: Write + ?Sized>(writer: &mut W, metadata: &FrameMetadata) -> io::Result<()> {
    writer.write_i64_le(metadata.time)?;
    for value in metadata.homography {
        writer.write_f64_le(value)?;
    }
    for corner in metadata.corners {
        writer.write_f64_le(corner.latitude)?;
        writer.write_f64_le(corner.longitude)?;
    }
    writer.write_f64_le(metadata.gsd.unwrap_or(f64::NAN))?;
    writer.write_i64_le(metadata.frame_number.unwrap_or(MISSING_INT))?;
    writer.write_i64_le(metadata.homography_reference_frame.unwrap_or(MISSING_INT))?;
    writer.write_i64_le(metadata.image_width.unwrap_or(MISSING_INT))?;
    writer.write_i64_le(metadata.image_height.unwrap_or(MISSING_INT))
}

fn optional_int(value: i64) -> Option<i64> {
    (value != MISSING_INT).then_some(value)
}

/// Loads every record of a metadata file, in file order.
pub fn read_metadata_file(path: &Path) -> Result<Vec<FrameMetadata>> {
    let bytes = fs::read(path).map_err(|e| ArchiveError::io(path, e))?;
    parse_metadata(&bytes).map_err(|e| ArchiveError::Format(format!("{}: {e}", path.display())))
}

fn parse_metadata(bytes: &[u8]) -> Result<Vec<FrameMetadata>> {
    let mut cursor = Cursor::new(bytes);
    let version = cursor.read_u32_le().map_err(truncated)?;
    let version = check_metadata_version(version)?;

    let mut records = Vec::new();
    while (cursor.position() as usize) < bytes.len() {
        records.push(read_metadata_record(&mut cursor, version).map_err(truncated)?);
    }
    Ok(records)
}

fn truncated(e: io::Error) -> ArchiveError {
    ArchiveError::Format(format!("truncated metadata record: {e}"))
}
