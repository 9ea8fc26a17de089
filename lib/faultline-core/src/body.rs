//! Error body format.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Content type of [`JsonError`] bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Default error body: `{"errors": ["<message>"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonError {
    /// Error messages, one per failure.
    pub errors: Vec<String>,
}

impl JsonError {
    /// Body holding a single message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
        }
    }

    /// Serialize to JSON bytes followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    ///
    /// # Example
    ///
    /// ```
    /// use faultline_core::JsonError;
    ///
    /// let bytes = JsonError::new("fail").to_bytes().expect("serialize");
    /// assert_eq!(bytes.as_ref(), b"{\"errors\":[\"fail\"]}\n");
    /// ```
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new().writer();
        serde_json::to_writer(&mut buf, self)?;
        let mut buf = buf.into_inner();
        buf.put_u8(b'\n');
        Ok(buf.freeze())
    }

    /// Parse a body produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid error body.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(Into::into)
    }
}
