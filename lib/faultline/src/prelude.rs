//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types, functions, and macros
//! for easy glob importing:
//!
//! ```
//! use faultline::prelude::*;
//! ```

pub use crate::{
    BoxError, DispatchConfig, Dispatcher, ErrorSink, HttpError, ResponseWriter, StatusCode,
    handler_fn, header, http_error,
};
pub use tower::{Layer, Service, ServiceExt};
