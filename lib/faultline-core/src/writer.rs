//! The response handle given to handlers.

use std::fmt;
use std::io;
use std::ops::Deref;
use std::sync::Arc;

use crate::sink::ResponseSink;
use crate::Error;
use crate::tracker::StatusTracker;

/// Shared handle to the tracked response of one request.
///
/// Cloning is cheap and every clone points at the same [`StatusTracker`]; all
/// tracker operations are available through `Deref`. The writer also
/// implements [`io::Write`], so `write!` and serializers can target it
/// directly.
///
/// # Example
///
/// ```
/// use std::io::Write;
///
/// use faultline_core::{BufferedSink, ResponseWriter, StatusCode};
///
/// let mut writer = ResponseWriter::new(BufferedSink::new());
/// writer.set_status(StatusCode::CREATED);
/// write!(writer, "id={}", 42).unwrap();
///
/// assert_eq!(writer.code(), Some(StatusCode::CREATED));
/// ```
#[derive(Clone)]
pub struct ResponseWriter {
    tracker: Arc<StatusTracker<dyn ResponseSink>>,
}

impl ResponseWriter {
    /// Wrap a sink in a fresh tracker.
    pub fn new<S: ResponseSink + 'static>(sink: S) -> Self {
        Self::from_tracker(Arc::new(StatusTracker::new(sink)))
    }

    /// Share an existing tracker.
    ///
    /// Keep a typed clone of the `Arc` to reach the concrete sink once the
    /// request is done.
    pub fn from_tracker<S: ResponseSink + 'static>(tracker: Arc<StatusTracker<S>>) -> Self {
        Self { tracker }
    }
}

impl Deref for ResponseWriter {
    type Target = StatusTracker<dyn ResponseSink>;

    fn deref(&self) -> &Self::Target {
        &self.tracker
    }
}

impl fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("code", &self.tracker.code())
            .finish_non_exhaustive()
    }
}

impl io::Write for &ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tracker.write(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        flush_tracker(&self.tracker)
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tracker.write(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        flush_tracker(&self.tracker)
    }
}

/// Sinks without a flush capability have nothing to flush.
fn flush_tracker(tracker: &StatusTracker<dyn ResponseSink>) -> io::Result<()> {
    match tracker.flush() {
        Ok(()) | Err(Error::CapabilityUnavailable(_)) => Ok(()),
        Err(Error::Io(err)) => Err(err),
        Err(err) => Err(io::Error::other(err)),
    }
}
