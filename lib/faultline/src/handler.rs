//! Adapter from async functions to writer-style handler services.

use std::fmt;
use std::future::Future;
use std::task::{Context, Poll};

use faultline_core::ResponseWriter;
use http::Request;
use tower_service::Service;

/// Build a handler service from an async function.
///
/// The function receives the [`ResponseWriter`] and the request, writes the
/// response through the writer and returns `Err` to let the dispatcher serve
/// the failure.
///
/// # Example
///
/// ```
/// use std::io::Write;
///
/// use faultline::{BoxError, ResponseWriter, handler_fn};
///
/// let handler = handler_fn(|writer: ResponseWriter, _request: http::Request<()>| async move {
///     writeln!(&writer, "hello")?;
///     Ok::<_, BoxError>(())
/// });
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn { f }
}

/// Handler service returned by [`handler_fn`].
#[derive(Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn")
            .field("f", &std::any::type_name::<F>())
            .finish()
    }
}

impl<F, Fut, E, B> Service<(ResponseWriter, Request<B>)> for HandlerFn<F>
where
    F: FnMut(ResponseWriter, Request<B>) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    type Response = ();
    type Error = E;
    type Future = Fut;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, (writer, request): (ResponseWriter, Request<B>)) -> Self::Future {
        (self.f)(writer, request)
    }
}
