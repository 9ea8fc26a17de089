//! Prelude module for convenient imports.
//!
//! ```
//! use faultline_core::prelude::*;
//! ```

pub use crate::{
    BoxError, BufferedSink, Capability, HttpError, JsonError, NormalizedFailure, Outcome, Panic,
    ResponseSink, ResponseWriter, StatusCode, StatusTracker, classify, header, http_error, invoke,
};
