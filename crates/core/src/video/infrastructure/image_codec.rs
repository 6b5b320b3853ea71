use std::io::Cursor;
use std::sync::Arc;

use image::ImageFormat;

use crate::shared::error::{ArchiveError, Result};
use crate::shared::frame_image::FrameImage;
use crate::video::domain::frame_codec::FrameCodec;

/// Encodes frames with the `image` crate.
///
/// Frames are converted to packed RGB before encoding, so decoding always
/// yields an interleaved RGB image regardless of the source layout.
pub struct ImageCodec {
    tag: &'static str,
    format: ImageFormat,
}

impl ImageCodec {
    pub fn new(tag: &'static str, format: ImageFormat) -> Self {
        Self { tag, format }
    }

    /// Resolves a tag such as `png` or `JPG`; `None` for unknown formats.
    pub fn for_tag(tag: &str) -> Option<Self> {
        let codec = match tag.to_ascii_lowercase().as_str() {
            "png" => Self::new("png", ImageFormat::Png),
            "jpg" | "jpeg" => Self::new("jpeg", ImageFormat::Jpeg),
            "bmp" => Self::new("bmp", ImageFormat::Bmp),
            "tif" | "tiff" => Self::new("tiff", ImageFormat::Tiff),
            _ => return None,
        };
        Some(codec)
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

impl FrameCodec for ImageCodec {
    fn tag(&self) -> &str {
        self.tag
    }

    fn encode(&self, image: &FrameImage) -> Result<Vec<u8>> {
        let bitmap = image.to_bitmap()?;
        let mut out = Cursor::new(Vec::new());
        bitmap
            .write_to(&mut out, self.format)
            .map_err(|e| ArchiveError::Decode(format!("{} encode failed: {e}", self.tag)))?;
        Ok(out.into_inner())
    }

    fn decode(&self, bytes: &[u8]) -> Result<FrameImage> {
        let decoded = image::load_from_memory_with_format(bytes, self.format)
            .map_err(|e| ArchiveError::Decode(format!("{} decode failed: {e}", self.tag)))?;
        Ok(FrameImage::from_bitmap(&decoded.to_rgb8()))
    }
}

/// Shared codec for `tag`, or `None` when no codec handles it.
pub fn codec_for_tag(tag: &str) -> Option<Arc<dyn FrameCodec>> {
    ImageCodec::for_tag(tag).map(|codec| Arc::new(codec) as Arc<dyn FrameCodec>)
}
