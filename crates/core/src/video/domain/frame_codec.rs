use crate::shared::error::Result;
use crate::shared::frame_image::FrameImage;

/// Domain interface for an image compression format.
///
/// Implementations are identified by a short tag (`png`, `jpeg`, ...) that is
/// persisted next to every encoded frame so readers can pick the matching
/// decoder.
pub trait FrameCodec: Send + Sync {
    fn tag(&self) -> &str;

    fn encode(&self, image: &FrameImage) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<FrameImage>;
}
