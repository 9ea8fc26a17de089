//! Core types for faultline response-handling middleware.
//!
//! This crate provides the building blocks used by `faultline`:
//! - [`StatusTracker`] - write-once status commit in front of a [`ResponseSink`]
//! - [`ResponseWriter`] - shared, type-erased handle given to handlers
//! - [`BufferedSink`] - in-memory sink recording the response
//! - [`HttpError`] - error carrying the status code to send
//! - [`classify`] and [`NormalizedFailure`] - failure to status/message mapping
//! - [`capture`] - panic capture with call-site resolution
//! - [`JsonError`] - default error body
//! - [`Error`] and [`Result`] - errors of writer operations
//! - [`StatusCode`] and [`header`] - re-exported from the `http` crate

mod body;
pub mod capture;
mod classify;
mod error;
mod http_error;
pub mod prelude;
mod sink;
mod tracker;
mod writer;

pub use body::{JSON_CONTENT_TYPE, JsonError};
pub use capture::{CallSite, CaptureFuture, Outcome, Panic, PanicPayload, invoke};
pub use classify::{NormalizedFailure, classify};
pub use error::{BoxError, Error, Result};
pub use http_error::HttpError;
pub use sink::{
    BufferedSink, Capability, Flush, Hijack, RawConnection, ReadFrom, ResponseSink,
};
pub use tracker::StatusTracker;
pub use writer::ResponseWriter;

// Re-export http crate types for status codes and headers
pub use http::{StatusCode, header};
