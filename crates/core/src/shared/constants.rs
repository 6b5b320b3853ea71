/// Largest chunk written when serializing pixel data, keeping every chunk
/// length representable as a signed 32-bit integer.
pub const SERIALIZATION_CHUNK_BYTES: usize = 1 << 30;

/// Codec tag for images stored as a serialized [`FrameImage`](crate::shared::frame_image::FrameImage).
pub const RAW_FORMAT_TAG: &str = "raw";

pub const MIN_INDEX_VERSION: u32 = 1;
pub const MAX_INDEX_VERSION: u32 = 4;

pub const MIN_DATA_VERSION: u32 = 1;
pub const MAX_DATA_VERSION: u32 = 3;

pub const MIN_METADATA_VERSION: u32 = 1;
pub const MAX_METADATA_VERSION: u32 = 3;

pub const MAX_MANIFEST_VERSION: u32 = 1;

/// Deepest chain of manifests that may include one another.
pub const MAX_MANIFEST_DEPTH: usize = 32;

/// Query parameters carrying a sub-range on clip URIs.
pub const START_TIME_PARAM: &str = "StartTime";
pub const END_TIME_PARAM: &str = "EndTime";

/// Sentinel for an unbounded request or padding boundary.
pub const UNBOUNDED_TIME: f64 = -1.0;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif"];
