//! Tower middleware layers for faultline.
//!
//! # Available Layers
//!
//! - [`ErrorHandlingLayer`] - Runs a writer-style handler service through a
//!   [`Dispatcher`](crate::Dispatcher) and produces an `http::Response`
//! - [`LoggingLayer`] - Logs requests/responses using `tracing`
//!
//! Layers are applied in reverse order: the last layer added is the first to
//! see the request.
//!
//! # Example
//!
//! ```
//! use faultline::middleware::LoggingLayer;
//! use faultline::{BoxError, DispatchConfig, Dispatcher, ResponseWriter, handler_fn};
//! use tower::ServiceBuilder;
//!
//! let dispatcher = Dispatcher::new(DispatchConfig::builder().recover_panic(true).build());
//!
//! let _service = ServiceBuilder::new()
//!     .layer(LoggingLayer::new())
//!     .layer(dispatcher.layer())
//!     .service(handler_fn(|_writer: ResponseWriter, _request: http::Request<()>| async {
//!         Ok::<_, BoxError>(())
//!     }));
//! ```

mod error_handling;
mod logging;

pub use error_handling::{ErrorHandling, ErrorHandlingLayer};
pub use logging::{LogLevel, Logging, LoggingLayer};

// Re-export tower's ServiceBuilder for composition
pub use tower::ServiceBuilder;
