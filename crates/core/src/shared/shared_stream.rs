use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::shared::error::{ArchiveError, Result};

/// A seekable stream aliased by every frame handle and sub-clip derived from
/// one source.
///
/// Reads reposition the underlying stream, so each access takes the stream
/// exclusively for its whole seek-and-read sequence. The handle is
/// deliberately `!Send`: callers that need an independent copy for another
/// thread must reopen the source instead of sharing this handle.
pub struct SharedStream<S> {
    inner: Rc<RefCell<S>>,
    label: PathBuf,
}

impl<S> SharedStream<S> {
    /// `label` names the stream in error messages (normally its file path).
    pub fn new(stream: S, label: impl Into<PathBuf>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(stream)),
            label: label.into(),
        }
    }

    pub fn label(&self) -> &Path {
        &self.label
    }

    /// Runs `op` with exclusive access to the stream.
    ///
    /// Fails instead of blocking when the stream is already held, which can
    /// only happen through re-entrant use from inside another `op`.
    pub fn with_exclusive<R>(&self, op: impl FnOnce(&mut S) -> io::Result<R>) -> Result<R> {
        let mut stream = self.inner.try_borrow_mut().map_err(|_| {
            ArchiveError::io(
                &self.label,
                io::Error::new(io::ErrorKind::WouldBlock, "stream is already in use"),
            )
        })?;
        op(&mut stream).map_err(|e| ArchiveError::io(&self.label, e))
    }

    /// Number of live handles on this stream.
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    pub fn is_same_stream(&self, other: &SharedStream<S>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<S> Clone for SharedStream<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            label: self.label.clone(),
        }
    }
}

impl<S> std::fmt::Debug for SharedStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStream")
            .field("label", &self.label)
            .field("handles", &self.handle_count())
            .finish()
    }
}
