//! Errors carrying the HTTP status code sent to the client.

use std::fmt;

use http::StatusCode;

use crate::BoxError;

/// An error that carries its HTTP status code.
///
/// Handlers return it (boxed, through `?` or `.into()`) when a failure should
/// reach the client with a specific status instead of `500`. The message sent
/// is the wrapped error's `Display`.
///
/// # Example
///
/// ```
/// use faultline_core::{BoxError, HttpError, StatusCode};
///
/// fn find_user(id: u64) -> Result<(), BoxError> {
///     Err(HttpError::msg(StatusCode::NOT_FOUND, format!("user {id} not found")).into())
/// }
///
/// let err = find_user(7).unwrap_err();
/// assert_eq!(err.to_string(), "user 7 not found");
/// ```
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    source: BoxError,
}

impl HttpError {
    /// Wrap an existing error with a status code.
    pub fn new(status: StatusCode, error: impl Into<BoxError>) -> Self {
        Self {
            status,
            source: error.into(),
        }
    }

    /// Create an error from a status code and a message.
    pub fn msg(status: StatusCode, message: impl fmt::Display) -> Self {
        Self::new(status, message.to_string())
    }

    /// Status code sent to the client.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// The wrapped error.
    #[must_use]
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }

    /// Consume into the wrapped error.
    #[must_use]
    pub fn into_inner(self) -> BoxError {
        self.source
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.source()
    }
}

/// Shorthand for `HttpError::msg(status, format!(...))`.
///
/// ```
/// use faultline_core::{StatusCode, http_error};
///
/// let err = http_error!(StatusCode::IM_A_TEAPOT, "short and {}", "stout");
/// assert_eq!(err.status(), StatusCode::IM_A_TEAPOT);
/// assert_eq!(err.to_string(), "short and stout");
/// ```
#[macro_export]
macro_rules! http_error {
    ($status:expr, $($arg:tt)+) => {
        $crate::HttpError::msg($status, ::std::format!($($arg)+))
    };
}
