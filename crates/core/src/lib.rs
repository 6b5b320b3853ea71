//! Temporal indexing of video frames: in-memory frame buffers, on-disk clip
//! archives and catalogs that resolve time-range requests to clips.

pub mod archive;
pub mod shared;
pub mod video;

pub use archive::domain::clip_request::ClipRequest;
pub use archive::infrastructure::archive_catalog::{ArchiveCatalog, ResolvedClip};
pub use archive::infrastructure::archive_clip::ArchiveClip;
pub use shared::error::{ArchiveError, Result};
pub use shared::frame_image::FrameImage;
pub use shared::time_stamp::{SeekMode, TimeStamp};
pub use video::domain::video_sequence::VideoSequence;
pub use video::infrastructure::video_buffer::{BufferConfig, VideoBuffer};
