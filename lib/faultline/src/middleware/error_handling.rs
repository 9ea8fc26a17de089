//! Error handling middleware.
//!
//! Wraps a writer-style handler service, one taking
//! `(ResponseWriter, http::Request<B>)`, into a plain `http` service. Each
//! request gets its own tracked [`BufferedSink`]; the dispatcher runs the
//! handler once and the recorded response is returned.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use faultline_core::{BoxError, BufferedSink, ResponseWriter, StatusTracker};
use http::{Request, Response};
use http_body_util::Full;
use tower::{Layer, Service, ServiceExt};

use crate::Dispatcher;

/// Layer serving handler failures through a [`Dispatcher`].
///
/// # Example
///
/// ```
/// use faultline::middleware::ErrorHandlingLayer;
/// use faultline::{BoxError, Dispatcher, ResponseWriter, handler_fn};
/// use tower::Layer;
///
/// let layer = ErrorHandlingLayer::new(Dispatcher::default());
/// let _service = layer.layer(handler_fn(
///     |_writer: ResponseWriter, _request: http::Request<()>| async { Ok::<_, BoxError>(()) },
/// ));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ErrorHandlingLayer {
    dispatcher: Dispatcher,
}

impl ErrorHandlingLayer {
    /// Create a layer using the given dispatcher.
    #[must_use]
    pub const fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

impl<S> Layer<S> for ErrorHandlingLayer {
    type Service = ErrorHandling<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorHandling {
            inner,
            dispatcher: self.dispatcher.clone(),
        }
    }
}

/// Service running a handler through a [`Dispatcher`].
///
/// Never fails: handler errors and recovered panics become error responses.
#[derive(Debug, Clone)]
pub struct ErrorHandling<S> {
    inner: S,
    dispatcher: Dispatcher,
}

impl<S> ErrorHandling<S> {
    /// Create a new service with a default dispatcher.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            dispatcher: Dispatcher::default(),
        }
    }

    /// The wrapped handler service.
    pub const fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S, B> Service<Request<B>> for ErrorHandling<S>
where
    S: Service<(ResponseWriter, Request<B>), Response = ()> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
    B: Send + 'static,
{
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        // Readiness failures of the handler are served like call failures.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let tracker = Arc::new(StatusTracker::new(BufferedSink::new()));
        let writer = ResponseWriter::from_tracker(Arc::clone(&tracker));
        let dispatcher = self.dispatcher.clone();
        let inner = self.inner.clone();

        Box::pin(async move {
            let handler = inner.oneshot((writer.clone(), request));
            dispatcher.dispatch(&writer, handler).await;
            drop(writer);

            let response = tracker.with_sink(BufferedSink::take_response);
            Ok(response.map(Full::new))
        })
    }
}
