use crate::shared::frame_image::FrameImage;
use crate::shared::time_indexed_map::TimeIndexedMap;
use crate::shared::time_stamp::{SeekMode, TimeStamp};
use crate::video::domain::frame_ptr::FramePtr;

/// Frames of a sequence plus its playback cursor.
///
/// The cursor is either a key present in `frames` or `None`, the end
/// position.
#[derive(Clone, Debug, Default)]
pub struct FrameSequence {
    frames: TimeIndexedMap<FramePtr>,
    cursor: Option<TimeStamp>,
}

impl FrameSequence {
    /// Builds a sequence with the cursor on its first frame.
    pub fn new(frames: TimeIndexedMap<FramePtr>) -> Self {
        let cursor = frames.first().map(|(k, _)| *k);
        Self { frames, cursor }
    }

    pub fn frames(&self) -> &TimeIndexedMap<FramePtr> {
        &self.frames
    }

    pub fn cursor(&self) -> Option<TimeStamp> {
        self.cursor
    }

    /// Adds a frame; the cursor is unaffected.
    pub fn insert(&mut self, frame: FramePtr) -> bool {
        self.frames.insert(frame.timestamp(), frame)
    }

    fn set_cursor(&mut self, cursor: Option<TimeStamp>) -> Option<TimeStamp> {
        self.cursor = cursor.filter(|key| self.frames.contains_key(key));
        self.cursor
    }
}

/// Cursor and random-access API shared by every frame sequence.
///
/// Implementors only expose their [`FrameSequence`]; all navigation is
/// provided here. Cursor moves return the new position, or `None` when the
/// move failed or ran off the end.
pub trait VideoSequence {
    fn sequence(&self) -> &FrameSequence;

    fn sequence_mut(&mut self) -> &mut FrameSequence;

    fn frames(&self) -> &TimeIndexedMap<FramePtr> {
        self.sequence().frames()
    }

    fn frame_count(&self) -> usize {
        self.frames().len()
    }

    fn first_time(&self) -> Option<TimeStamp> {
        self.frames().first().map(|(k, _)| *k)
    }

    fn last_time(&self) -> Option<TimeStamp> {
        self.frames().last().map(|(k, _)| *k)
    }

    fn time_range(&self) -> Option<(TimeStamp, TimeStamp)> {
        Some((self.first_time()?, self.last_time()?))
    }

    fn current_time_stamp(&self) -> Option<TimeStamp> {
        self.sequence().cursor()
    }

    fn current_frame(&self) -> Option<FramePtr> {
        let key = self.sequence().cursor()?;
        self.frames().get(&key).cloned()
    }

    /// Pixels at the cursor; the invalid image at the end position or when
    /// loading fails.
    fn current_image(&self) -> FrameImage {
        load_or_invalid(self.current_frame())
    }

    fn advance(&mut self) -> Option<TimeStamp> {
        let current = self.sequence().cursor()?;
        let next = self.frames().next_after(&current).map(|(k, _)| *k);
        self.sequence_mut().set_cursor(next)
    }

    /// Steps back one frame. From the end position this lands on the last
    /// frame; on the first frame it does nothing and returns `None`.
    fn recede(&mut self) -> Option<TimeStamp> {
        let previous = match self.sequence().cursor() {
            Some(current) => self.frames().prev_before(&current).map(|(k, _)| *k)?,
            None => self.last_time()?,
        };
        self.sequence_mut().set_cursor(Some(previous))
    }

    fn rewind(&mut self) -> Option<TimeStamp> {
        let first = self.first_time();
        self.sequence_mut().set_cursor(first)
    }

    /// Moves the cursor to the frame `mode` selects; a failed seek leaves
    /// the cursor at the end position.
    fn seek(&mut self, position: &TimeStamp, mode: SeekMode) -> Option<TimeStamp> {
        let target = self.frames().seek(position, mode).map(|(k, _)| *k);
        self.sequence_mut().set_cursor(target)
    }

    fn frame_at(&self, position: &TimeStamp, mode: SeekMode) -> Option<FramePtr> {
        self.frames().seek(position, mode).map(|(_, f)| f.clone())
    }

    fn image_at(&self, position: &TimeStamp, mode: SeekMode) -> FrameImage {
        load_or_invalid(self.frame_at(position, mode))
    }
}

fn load_or_invalid(frame: Option<FramePtr>) -> FrameImage {
    let Some(frame) = frame else {
        return FrameImage::invalid();
    };
    match frame.image() {
        Ok(image) => image,
        Err(e) => {
            log::warn!("Failed to load frame at {}: {e}", frame.timestamp());
            FrameImage::invalid()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::shared::error::{ArchiveError, Result};
    use crate::shared::frame_image::ImageLayout;
    use crate::video::domain::frame_ptr::FrameSource;

    /// Produces a 1x1 grey frame whose value is the frame time.
    struct TimeValueSource;

    impl FrameSource for TimeValueSource {
        fn load(&self, timestamp: &TimeStamp) -> Result<FrameImage> {
            let value = timestamp.time().unwrap_or_default() as u8;
            FrameImage::from_vec(vec![value], ImageLayout::interleaved(1, 1, 1))
        }
    }

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn load(&self, _timestamp: &TimeStamp) -> Result<FrameImage> {
            Err(ArchiveError::Decode("corrupt".to_string()))
        }
    }

    struct Clip {
        sequence: FrameSequence,
    }

    impl VideoSequence for Clip {
        fn sequence(&self) -> &FrameSequence {
            &self.sequence
        }

        fn sequence_mut(&mut self) -> &mut FrameSequence {
            &mut self.sequence
        }
    }

    fn clip(times: &[f64]) -> Clip {
        let source: Rc<dyn FrameSource> = Rc::new(TimeValueSource);
        let frames = times
            .iter()
            .map(|t| {
                let ts = TimeStamp::from_time(*t);
                (ts, FramePtr::new(ts, Rc::clone(&source)))
            })
            .collect();
        Clip {
            sequence: FrameSequence::new(frames),
        }
    }

    fn ts(t: f64) -> TimeStamp {
        TimeStamp::from_time(t)
    }

    #[test]
    fn test_new_sequence_starts_at_first_frame() {
        let c = clip(&[10.0, 20.0, 30.0]);
        assert_eq!(c.current_time_stamp(), Some(ts(10.0)));
        assert_eq!(c.current_image().pixel(0, 0, 0), Some(10));
        assert_eq!(c.frame_count(), 3);
    }

    #[test]
    fn test_summary_accessors() {
        let c = clip(&[30.0, 10.0, 20.0]);
        assert_eq!(c.first_time(), Some(ts(10.0)));
        assert_eq!(c.last_time(), Some(ts(30.0)));
        assert_eq!(c.time_range(), Some((ts(10.0), ts(30.0))));
    }

    #[test]
    fn test_empty_sequence() {
        let mut c = clip(&[]);
        assert_eq!(c.current_time_stamp(), None);
        assert!(!c.current_image().is_valid());
        assert_eq!(c.time_range(), None);
        assert_eq!(c.first_time(), None);
        assert_eq!(c.advance(), None);
        assert_eq!(c.recede(), None);
        assert_eq!(c.rewind(), None);
    }

    #[test]
    fn test_advance_walks_to_end_and_stays_there() {
        let mut c = clip(&[1.0, 2.0, 3.0]);
        assert_eq!(c.advance(), Some(ts(2.0)));
        assert_eq!(c.advance(), Some(ts(3.0)));
        assert_eq!(c.advance(), None);
        assert_eq!(c.current_time_stamp(), None);
        assert!(c.current_frame().is_none());
        assert_eq!(c.advance(), None);
        assert_eq!(c.current_time_stamp(), None);
    }

    #[test]
    fn test_rewind_after_end_returns_to_first() {
        let mut c = clip(&[1.0, 2.0]);
        while c.advance().is_some() {}
        assert_eq!(c.rewind(), Some(ts(1.0)));
        assert_eq!(c.current_time_stamp(), Some(ts(1.0)));
    }

    #[test]
    fn test_recede_at_first_frame_is_noop() {
        let mut c = clip(&[1.0, 2.0]);
        assert_eq!(c.recede(), None);
        assert_eq!(c.current_time_stamp(), Some(ts(1.0)));
    }

    #[test]
    fn test_recede_from_end_lands_on_last_frame() {
        let mut c = clip(&[1.0, 2.0, 3.0]);
        while c.advance().is_some() {}
        assert_eq!(c.recede(), Some(ts(3.0)));
        assert_eq!(c.recede(), Some(ts(2.0)));
    }

    #[test]
    fn test_seek_moves_cursor() {
        let mut c = clip(&[1.0, 2.0, 3.0]);
        assert_eq!(c.seek(&ts(2.4), SeekMode::Nearest), Some(ts(2.0)));
        assert_eq!(c.current_time_stamp(), Some(ts(2.0)));
        assert_eq!(c.advance(), Some(ts(3.0)));
    }

    #[test]
    fn test_failed_seek_moves_cursor_to_end() {
        let mut c = clip(&[1.0, 2.0, 3.0]);
        assert_eq!(c.seek(&ts(2.4), SeekMode::Exact), None);
        assert_eq!(c.current_time_stamp(), None);
    }

    #[test]
    fn test_random_access_does_not_move_cursor() {
        let c = clip(&[1.0, 2.0, 3.0]);
        let frame = c.frame_at(&ts(2.9), SeekMode::UpperBound).unwrap();
        assert_eq!(frame.timestamp(), ts(2.0));
        assert_eq!(c.image_at(&ts(2.9), SeekMode::LowerBound).pixel(0, 0, 0), Some(3));
        assert!(!c.image_at(&ts(9.0), SeekMode::LowerBound).is_valid());
        assert_eq!(c.current_time_stamp(), Some(ts(1.0)));
    }

    #[test]
    fn test_load_failure_yields_invalid_image() {
        let source: Rc<dyn FrameSource> = Rc::new(FailingSource);
        let frames = [(ts(1.0), FramePtr::new(ts(1.0), source))].into_iter().collect();
        let c = Clip {
            sequence: FrameSequence::new(frames),
        };
        assert!(c.current_frame().is_some());
        assert!(!c.current_image().is_valid());
    }

    #[test]
    fn test_insert_keeps_cursor() {
        let mut c = clip(&[5.0]);
        let source: Rc<dyn FrameSource> = Rc::new(TimeValueSource);
        assert!(c.sequence_mut().insert(FramePtr::new(ts(1.0), Rc::clone(&source))));
        assert!(!c.sequence_mut().insert(FramePtr::new(ts(1.0), source)));
        assert_eq!(c.current_time_stamp(), Some(ts(5.0)));
        assert_eq!(c.first_time(), Some(ts(1.0)));
    }
}
