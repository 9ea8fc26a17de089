//! # Chapter 0: Getting Started
//!
//! ## What You'll Learn
//!
//! - Write a handler against a [`ResponseWriter`][crate::ResponseWriter]
//! - Wrap it with the error handling layer
//! - Serve it with hyper
//!
//! ## Prerequisites
//!
//! Add to `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! faultline = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ## Your First Handler
//!
//! A handler receives the writer and the request. It writes the response
//! through the writer and returns `Err` when it cannot:
//!
//! ```ignore
//! use std::io::Write;
//!
//! use faultline::prelude::*;
//!
//! async fn hello(writer: ResponseWriter, request: http::Request<()>) -> Result<(), BoxError> {
//!     let name = request.uri().query().unwrap_or("world");
//!     writeln!(&writer, "hello {name}")?;
//!     Ok(())
//! }
//!
//! let service = Dispatcher::default().layer().layer(handler_fn(hello));
//! let response = service.oneshot(http::Request::new(())).await?;
//! assert_eq!(response.status(), StatusCode::OK);
//! ```
//!
//! Writing a body without choosing a status commits `200 OK`. Call
//! [`set_status`][crate::StatusTracker::set_status] first to pick another one.
//! The first status committed wins; later calls are ignored.
//!
//! ## Serving It
//!
//! The layered service is a plain `tower::Service<http::Request<B>>`, so it
//! plugs into hyper through `hyper_util::service::TowerToHyperService`. The
//! `teapot-server` demo in the repository shows the full wiring.
//!
//! ## Next Steps
//!
//! - [Chapter 1: Failures & Panics][super::chapter_1]
