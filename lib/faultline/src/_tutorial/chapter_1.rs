//! # Chapter 1: Failures & Panics
//!
//! ## Choosing the Status Code
//!
//! Any error returned by a handler is served as `500 Internal Server Error`
//! with its `Display` as message. Return an [`HttpError`][crate::HttpError]
//! to choose the status:
//!
//! ```ignore
//! use faultline::prelude::*;
//!
//! async fn get_user(writer: ResponseWriter, request: http::Request<()>) -> Result<(), BoxError> {
//!     let id = request.uri().path().trim_start_matches("/users/");
//!     let id: u64 = id
//!         .parse()
//!         .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err))?;
//!     Err(http_error!(StatusCode::NOT_FOUND, "user {id} not found").into())
//! }
//! ```
//!
//! The client receives:
//!
//! ```text
//! HTTP/1.1 404 Not Found
//! content-type: application/json; charset=utf-8
//!
//! {"errors":["user 7 not found"]}
//! ```
//!
//! ## Already Committed Responses
//!
//! If the handler committed a status before failing, that status stays. The
//! failure is reported as a [`Diagnostic::AlreadyCommitted`][crate::Diagnostic]
//! and nothing more is written.
//!
//! ## Recovering Panics
//!
//! With `recover_panic` set, a panicking handler is served like a failing one.
//! The message is prefixed with where the panic happened:
//!
//! ```ignore
//! let dispatcher = Dispatcher::new(DispatchConfig::builder().recover_panic(true).build());
//! ```
//!
//! | Panic payload | Status | Message |
//! |---------------|--------|---------|
//! | `HttpError(418, "fail")` | `418` | `[handlers::brew brew.rs:12] fail` |
//! | `"fail"` | `500` | `[handlers::brew brew.rs:12] (&str) fail` |
//! | `418_i32` | `500` | `[handlers::brew brew.rs:12] (i32) 418` |
//!
//! Without it, panics unwind through the dispatcher untouched.
//!
//! If a handler returns an error and then panics while being dropped, the
//! returned error is served and the panic is reported as
//! [`Diagnostic::PanicSuppressed`][crate::Diagnostic].
//!
//! ## Next Steps
//!
//! - [Chapter 2: Customizing][super::chapter_2]
