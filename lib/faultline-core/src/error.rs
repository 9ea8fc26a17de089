//! Error types for faultline.

use derive_more::{Display, Error, From};

use crate::Capability;

/// Boxed error returned by handlers.
///
/// Any error type converts into it with `?` or `.into()`. Return an
/// [`HttpError`](crate::HttpError) to pick the status code sent to the client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ============================================================================
// Error Type
// ============================================================================

/// Main error type for faultline operations.
///
/// These errors are reported to the caller of a specific writer operation.
/// None of them is fatal to the request in flight.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// The underlying sink does not offer an optional capability.
    #[display("capability unavailable: {_0}")]
    #[from(skip)]
    CapabilityUnavailable(#[error(not(source))] Capability),

    /// I/O error raised by the underlying sink.
    #[display("I/O error: {_0}")]
    #[from]
    Io(std::io::Error),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    Json(serde_json::Error),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the missing capability if this is a capability error.
    #[must_use]
    pub const fn capability(&self) -> Option<Capability> {
        match self {
            Self::CapabilityUnavailable(capability) => Some(*capability),
            _ => None,
        }
    }

    /// Returns `true` if the sink does not support the requested capability.
    #[must_use]
    pub const fn is_capability_unavailable(&self) -> bool {
        matches!(self, Self::CapabilityUnavailable(_))
    }
}
