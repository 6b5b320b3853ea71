use std::fmt;
use std::rc::Rc;

use crate::shared::error::Result;
use crate::shared::frame_image::FrameImage;
use crate::shared::time_stamp::TimeStamp;

/// Materializes the pixels of one frame from wherever they are stored.
///
/// Loading repositions a shared stream, so callers must not load two frames
/// backed by the same stream concurrently.
pub trait FrameSource {
    fn load(&self, timestamp: &TimeStamp) -> Result<FrameImage>;
}

/// Lazy handle to a frame: a timestamp plus the source able to produce it.
///
/// Nothing is cached; every call to [`FramePtr::image`] reads the backing
/// store again.
#[derive(Clone)]
pub struct FramePtr {
    timestamp: TimeStamp,
    source: Rc<dyn FrameSource>,
}

impl FramePtr {
    pub fn new(timestamp: TimeStamp, source: Rc<dyn FrameSource>) -> Self {
        Self { timestamp, source }
    }

    pub fn timestamp(&self) -> TimeStamp {
        self.timestamp
    }

    pub fn image(&self) -> Result<FrameImage> {
        self.source.load(&self.timestamp)
    }
}

impl fmt::Debug for FramePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePtr")
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}
