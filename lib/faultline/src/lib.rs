//! Error and panic handling middleware for HTTP handlers.
//!
//! Handlers write their response through a [`ResponseWriter`] and return
//! `Err` when something goes wrong. The [`Dispatcher`] makes sure every
//! failure ends up as exactly one response: it classifies the failure, sets
//! the content type, commits the status code and writes the error body, unless
//! the handler already committed a status, in which case the failure is only
//! reported.
//!
//! # Example
//!
//! ```
//! use faultline::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let dispatcher = Dispatcher::new(DispatchConfig::builder().recover_panic(true).build());
//!
//! let service = dispatcher.layer().layer(handler_fn(
//!     |_writer: ResponseWriter, _request: http::Request<()>| async {
//!         Err::<(), _>(http_error!(StatusCode::IM_A_TEAPOT, "short and stout"))
//!     },
//! ));
//!
//! let response = service.oneshot(http::Request::new(())).await.unwrap();
//! assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
//! # }
//! ```
//!
//! See the [tutorial][_tutorial] for a complete guide.

pub mod _tutorial;
mod config;
mod diagnostics;
mod dispatcher;
mod error_sink;
mod handler;
pub mod middleware;
pub mod prelude;

pub use config::{DispatchConfig, DispatchConfigBuilder};
pub use diagnostics::{Diagnostic, DiagnosticSink, TracingDiagnostics};
pub use dispatcher::Dispatcher;
pub use error_sink::{ErrorSink, JsonErrorSink, PlainTextErrorSink};
pub use handler::{HandlerFn, handler_fn};

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use faultline_core::{
    BoxError, BufferedSink, Capability, Error, HttpError, JsonError, NormalizedFailure, Panic,
    ResponseSink, ResponseWriter, Result, StatusTracker, capture, classify, http_error,
};

// Re-export http types for status codes and headers
pub use faultline_core::{StatusCode, header};
