//! Response sinks and their optional capabilities.
//!
//! A [`ResponseSink`] is the raw, network-facing side of a response: it
//! receives a status line, headers and body bytes. Sinks are wrapped by a
//! [`StatusTracker`](crate::StatusTracker) and never written to directly once
//! a tracker owns them.
//!
//! Advanced operations are negotiated per capability: the sink returns a
//! handle from [`ResponseSink::as_flush`], [`ResponseSink::as_hijack`] or
//! [`ResponseSink::as_read_from`] when it supports them, and `None` otherwise.

use std::fmt;
use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderMap, StatusCode};

// ============================================================================
// Capabilities
// ============================================================================

/// Optional capability a sink may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Push buffered data to the client.
    Flush,
    /// Take over the raw connection.
    Hijack,
    /// Copy a whole reader into the body.
    ReadFrom,
}

impl Capability {
    /// Short name of the capability.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Flush => "flush",
            Self::Hijack => "hijack",
            Self::ReadFrom => "read-from",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink able to push buffered data to the client.
pub trait Flush {
    /// Flush buffered data.
    fn flush(&mut self) -> io::Result<()>;
}

/// A raw, bidirectional connection taken over from a sink.
pub trait RawConnection: io::Read + io::Write + Send {}

impl<T: io::Read + io::Write + Send> RawConnection for T {}

/// Sink whose connection can be taken over by the handler.
pub trait Hijack {
    /// Detach the raw connection. The sink must not be written to afterwards.
    fn hijack(&mut self) -> io::Result<Box<dyn RawConnection>>;
}

/// Sink able to copy a reader into the body in bulk.
pub trait ReadFrom {
    /// Copy `src` until EOF, returning the number of bytes copied.
    fn read_from(&mut self, src: &mut dyn io::Read) -> io::Result<u64>;
}

// ============================================================================
// Response Sink
// ============================================================================

/// The underlying response sink wrapped by a [`StatusTracker`](crate::StatusTracker).
///
/// Implementations do not need to guard against double status commits: the
/// tracker calls [`send_status`](Self::send_status) at most once and always
/// before the first [`send_data`](Self::send_data).
pub trait ResponseSink: Send {
    /// Headers to send along with the status.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commit the status line (and the current headers).
    fn send_status(&mut self, status: StatusCode);

    /// Send body bytes.
    fn send_data(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush capability, if supported.
    fn as_flush(&mut self) -> Option<&mut dyn Flush> {
        None
    }

    /// Hijack capability, if supported.
    fn as_hijack(&mut self) -> Option<&mut dyn Hijack> {
        None
    }

    /// Bulk-copy capability, if supported.
    fn as_read_from(&mut self) -> Option<&mut dyn ReadFrom> {
        None
    }

    /// Whether the sink offers `capability`.
    fn supports(&mut self, capability: Capability) -> bool {
        match capability {
            Capability::Flush => self.as_flush().is_some(),
            Capability::Hijack => self.as_hijack().is_some(),
            Capability::ReadFrom => self.as_read_from().is_some(),
        }
    }
}

// ============================================================================
// Buffered Sink
// ============================================================================

/// In-memory sink that records the response.
///
/// Headers are snapshotted when the status is committed: later header changes
/// do not reach the recorded response, as on a real connection.
///
/// Supports [`Flush`] (counted) and [`ReadFrom`]; does not support [`Hijack`].
#[derive(Debug, Default)]
pub struct BufferedSink {
    headers: HeaderMap,
    head: Option<(StatusCode, HeaderMap)>,
    body: BytesMut,
    flushes: usize,
}

impl BufferedSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed status, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.head.as_ref().map(|(status, _)| *status)
    }

    /// Headers as they will be sent: the committed snapshot, or the pending
    /// headers when nothing was committed yet.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.head
            .as_ref()
            .map_or(&self.headers, |(_, headers)| headers)
    }

    /// Body bytes recorded so far.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Number of flushes requested.
    #[must_use]
    pub const fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Take the recorded response, leaving the sink empty.
    ///
    /// A response that never committed a status is `200 OK`.
    pub fn take_response(&mut self) -> http::Response<Bytes> {
        let pending = std::mem::take(&mut self.headers);
        let (status, headers) = self.head.take().unwrap_or((StatusCode::OK, pending));
        let body = std::mem::take(&mut self.body).freeze();

        let mut response = http::Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl ResponseSink for BufferedSink {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn send_status(&mut self, status: StatusCode) {
        self.head = Some((status, self.headers.clone()));
    }

    fn send_data(&mut self, data: &[u8]) -> io::Result<()> {
        self.body.extend_from_slice(data);
        Ok(())
    }

    fn as_flush(&mut self) -> Option<&mut dyn Flush> {
        Some(self)
    }

    fn as_read_from(&mut self) -> Option<&mut dyn ReadFrom> {
        Some(self)
    }
}

impl Flush for BufferedSink {
    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

impl ReadFrom for BufferedSink {
    fn read_from(&mut self, src: &mut dyn io::Read) -> io::Result<u64> {
        io::copy(src, &mut (&mut self.body).writer())
    }
}
