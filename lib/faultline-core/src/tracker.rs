//! Write-once response status tracking.
//!
//! [`StatusTracker`] owns a [`ResponseSink`] for the lifetime of one request
//! and records, exactly once, the status code committed to it. The committed
//! code lives in an atomic so it can be read at any time without touching the
//! sink; the compare-and-swap that commits it runs while the sink is held, so
//! the winning status always reaches the sink before any body byte.

use std::io;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::sink::{Capability, RawConnection, ResponseSink};
use crate::{Error, Result};

/// Sentinel for "no status committed yet". Valid status codes are never 0.
const UNSET: u16 = 0;

/// Records the status code committed to a sink, exactly once.
///
/// All methods take `&self`: a tracker can be shared between the handler, a
/// streaming task and the error path of the same request.
///
/// # Example
///
/// ```
/// use faultline_core::{BufferedSink, StatusCode, StatusTracker};
///
/// let tracker = StatusTracker::new(BufferedSink::new());
/// assert_eq!(tracker.code(), None);
///
/// tracker.write(b"hello").unwrap();
/// assert_eq!(tracker.code(), Some(StatusCode::OK));
///
/// // Too late: the status is already on its way.
/// assert!(!tracker.set_status(StatusCode::NOT_FOUND));
/// assert_eq!(tracker.code(), Some(StatusCode::OK));
/// ```
#[derive(Debug)]
pub struct StatusTracker<S: ?Sized> {
    code: AtomicU16,
    sink: Mutex<S>,
}

impl<S: ResponseSink> StatusTracker<S> {
    /// Wrap a sink. The tracker starts uncommitted.
    pub fn new(sink: S) -> Self {
        Self {
            code: AtomicU16::new(UNSET),
            sink: Mutex::new(sink),
        }
    }

    /// Consume the tracker, returning the sink.
    pub fn into_inner(self) -> S {
        self.sink.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: ResponseSink + ?Sized> StatusTracker<S> {
    /// The committed status code, or `None` if nothing was committed yet.
    pub fn code(&self) -> Option<StatusCode> {
        match self.code.load(Ordering::Acquire) {
            UNSET => None,
            code => StatusCode::from_u16(code).ok(),
        }
    }

    /// Returns `true` once a status code has been committed.
    pub fn is_committed(&self) -> bool {
        self.code.load(Ordering::Acquire) != UNSET
    }

    /// Commit `status` if nothing was committed yet.
    ///
    /// Only the first call wins and forwards the status to the sink; later
    /// calls leave the committed code untouched. Returns whether this call
    /// committed.
    pub fn set_status(&self, status: StatusCode) -> bool {
        let mut sink = self.lock();
        let won = self.commit(status);
        if won {
            sink.send_status(status);
        }
        won
    }

    /// Forward body bytes to the sink.
    ///
    /// Writing a body implies success: if no status was committed yet, `200 OK`
    /// is committed first. Bytes are forwarded regardless of who committed.
    pub fn write(&self, data: &[u8]) -> io::Result<()> {
        let mut sink = self.lock();
        self.commit_ok(&mut *sink);
        sink.send_data(data)
    }

    /// Read or modify the headers sent with the status.
    ///
    /// Changes made after the commit do not reach the client.
    pub fn with_headers<R>(&self, f: impl FnOnce(&mut HeaderMap) -> R) -> R {
        f(self.lock().headers_mut())
    }

    /// Set a header, replacing previous values.
    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.with_headers(|headers| {
            headers.insert(name, value);
        });
    }

    /// Whether the underlying sink offers `capability`.
    pub fn supports(&self, capability: Capability) -> bool {
        self.lock().supports(capability)
    }

    /// Flush buffered data to the client.
    ///
    /// Flushing sends the head, so `200 OK` is committed if nothing was.
    pub fn flush(&self) -> Result<()> {
        let mut sink = self.lock();
        if sink.as_flush().is_none() {
            return Err(Error::CapabilityUnavailable(Capability::Flush));
        }
        self.commit_ok(&mut *sink);
        match sink.as_flush() {
            Some(flusher) => Ok(flusher.flush()?),
            None => Err(Error::CapabilityUnavailable(Capability::Flush)),
        }
    }

    /// Take over the raw connection.
    ///
    /// The status code is left as is: whatever the caller writes on the
    /// connection is outside the tracker's view.
    pub fn hijack(&self) -> Result<Box<dyn RawConnection>> {
        let mut sink = self.lock();
        let hijacker = sink
            .as_hijack()
            .ok_or(Error::CapabilityUnavailable(Capability::Hijack))?;
        Ok(hijacker.hijack()?)
    }

    /// Copy `src` into the body until EOF.
    ///
    /// Like [`write`](Self::write), commits `200 OK` if nothing was committed.
    pub fn read_from(&self, src: &mut dyn io::Read) -> Result<u64> {
        let mut sink = self.lock();
        if sink.as_read_from().is_none() {
            return Err(Error::CapabilityUnavailable(Capability::ReadFrom));
        }
        self.commit_ok(&mut *sink);
        match sink.as_read_from() {
            Some(reader) => Ok(reader.read_from(src)?),
            None => Err(Error::CapabilityUnavailable(Capability::ReadFrom)),
        }
    }

    /// Run `f` with exclusive access to the sink.
    ///
    /// Status commits made directly on the sink bypass the tracker; use this
    /// to inspect or drain the sink once the request is done.
    pub fn with_sink<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut *self.lock())
    }

    fn commit(&self, status: StatusCode) -> bool {
        self.code
            .compare_exchange(UNSET, status.as_u16(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn commit_ok(&self, sink: &mut S) {
        if self.commit(StatusCode::OK) {
            sink.send_status(StatusCode::OK);
        }
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
