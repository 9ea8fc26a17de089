//! # Chapter 2: Customizing
//!
//! ## Error Bodies
//!
//! The [`ErrorSink`][crate::ErrorSink] writes the body once the status is
//! committed. [`JsonErrorSink`][crate::JsonErrorSink] is the default;
//! [`PlainTextErrorSink`][crate::PlainTextErrorSink] writes the bare message.
//! Pair a sink with its content type:
//!
//! ```
//! use faultline::header::HeaderValue;
//! use faultline::{DispatchConfig, Dispatcher, PlainTextErrorSink};
//!
//! let dispatcher = Dispatcher::new(
//!     DispatchConfig::builder()
//!         .content_type(HeaderValue::from_static("text/plain; charset=utf-8"))
//!         .error_sink(PlainTextErrorSink)
//!         .build(),
//! );
//! # let _ = dispatcher;
//! ```
//!
//! Call `without_content_type()` to leave the headers to the sink.
//!
//! ## Diagnostics
//!
//! Failures that cannot be served go to the
//! [`DiagnosticSink`][crate::DiagnosticSink]. The default,
//! [`TracingDiagnostics`][crate::TracingDiagnostics], emits `tracing` events;
//! any closure taking a `&Diagnostic` works too:
//!
//! ```
//! use faultline::{Diagnostic, DispatchConfig};
//!
//! let config = DispatchConfig::builder()
//!     .diagnostics(|diagnostic: &Diagnostic| {
//!         tracing::warn!(%diagnostic, "response could not be served");
//!     })
//!     .build();
//! # let _ = config;
//! ```
//!
//! ## Logging
//!
//! [`LoggingLayer`][crate::middleware::LoggingLayer] logs each request and its
//! final status inside an `http_request` span. Add it outside the error layer
//! so it sees the status the dispatcher committed.
