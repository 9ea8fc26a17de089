//! Runs a handler and turns its failure into exactly one response.

use std::future::Future;
use std::sync::Arc;

use faultline_core::capture::{CaptureFuture, Outcome, invoke};
use faultline_core::{BoxError, Panic, ResponseWriter, StatusCode, classify};
use http::header::CONTENT_TYPE;
use tracing::debug;

use crate::config::DispatchConfig;
use crate::diagnostics::Diagnostic;
use crate::middleware::ErrorHandlingLayer;

/// Runs handlers and serves their failures.
///
/// Per request the dispatcher invokes the handler (through the panic capture
/// when `recover_panic` is set), classifies the failure if there is one, and
/// commits it unless the response already carries a status. Cloning is cheap:
/// the configuration is shared.
///
/// # Example
///
/// ```
/// use faultline::{BoxError, BufferedSink, Dispatcher, HttpError, ResponseWriter, StatusCode};
///
/// let dispatcher = Dispatcher::default();
/// let writer = ResponseWriter::new(BufferedSink::new());
///
/// dispatcher.dispatch_blocking(&writer, || -> Result<(), BoxError> {
///     Err(HttpError::msg(StatusCode::IM_A_TEAPOT, "fail").into())
/// });
///
/// assert_eq!(writer.code(), Some(StatusCode::IM_A_TEAPOT));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    config: Arc<DispatchConfig>,
}

impl Dispatcher {
    /// Create a dispatcher from its configuration.
    #[must_use]
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Tower layer serving requests through this dispatcher.
    #[must_use]
    pub fn layer(&self) -> ErrorHandlingLayer {
        ErrorHandlingLayer::new(self.clone())
    }

    /// Await `handler` and serve its failure, if any.
    ///
    /// # Panics
    ///
    /// When `recover_panic` is not set, a panicking handler unwinds through
    /// this call.
    pub async fn dispatch<F, E>(&self, writer: &ResponseWriter, handler: F)
    where
        F: Future<Output = Result<(), E>>,
        E: Into<BoxError>,
    {
        let failure = if self.config.recover_panic {
            self.settle_outcome(CaptureFuture::new(handler).await)
        } else {
            handler.await.err().map(Into::<BoxError>::into)
        };

        if let Some(failure) = failure {
            self.handle_error(writer, failure);
        }
    }

    /// Run a synchronous `handler` and serve its failure, if any.
    ///
    /// # Panics
    ///
    /// When `recover_panic` is not set, a panicking handler unwinds through
    /// this call.
    pub fn dispatch_blocking<E>(&self, writer: &ResponseWriter, handler: impl FnOnce() -> Result<(), E>)
    where
        E: Into<BoxError>,
    {
        let failure = if self.config.recover_panic {
            self.settle_outcome(invoke(handler))
        } else {
            handler().err().map(Into::<BoxError>::into)
        };

        if let Some(failure) = failure {
            self.handle_error(writer, failure);
        }
    }

    /// Merge the handler's result with a panic captured after it.
    ///
    /// A returned error wins over a later panic, which is reported as
    /// [`Diagnostic::PanicSuppressed`]. A panic after a successful return is
    /// the failure.
    pub fn settle(&self, result: Result<(), BoxError>, panic: Option<Panic>) -> Option<BoxError> {
        match (result, panic) {
            (Ok(()), None) => None,
            (Ok(()), Some(panic)) => Some(panic.into()),
            (Err(err), None) => Some(err),
            (Err(err), Some(panic)) => {
                let message = classify(&panic).into_message();
                self.config
                    .diagnostics
                    .report(&Diagnostic::PanicSuppressed { message });
                Some(err)
            }
        }
    }

    /// Serve `failure` on `writer`.
    ///
    /// If a status is already committed, the failure is reported as
    /// [`Diagnostic::AlreadyCommitted`] and the response is left untouched.
    /// Otherwise the configured content type is set, the classified status is
    /// committed and the error sink writes the body.
    pub fn handle_error(&self, writer: &ResponseWriter, failure: BoxError) {
        let failure = classify(failure.as_ref());

        if let Some(status) = writer.code() {
            self.already_committed(status, failure.into_message());
            return;
        }

        if let Some(content_type) = &self.config.content_type {
            writer.insert_header(CONTENT_TYPE, content_type.clone());
        }

        let status = failure.status();
        if !writer.set_status(status) {
            let committed = writer.code().unwrap_or(status);
            self.already_committed(committed, failure.into_message());
            return;
        }

        debug!(status = status.as_u16(), error = %failure.message(), "serving handler failure");

        if let Err(err) = self.config.error_sink.send(writer, &failure) {
            self.config.diagnostics.report(&Diagnostic::ErrorSinkFailed {
                status,
                error: err.to_string(),
            });
        }
    }

    fn settle_outcome<E: Into<BoxError>>(&self, outcome: Outcome<Result<(), E>>) -> Option<BoxError> {
        match outcome {
            Outcome::Completed(result) => self.settle(result.map_err(Into::into), None),
            Outcome::Panicked(panic) => Some(panic.into()),
            Outcome::CompletedThenPanicked(result, panic) => {
                self.settle(result.map_err(Into::into), Some(panic))
            }
            Outcome::PanickedTwice(first, second) => self.settle(Err(first.into()), Some(second)),
        }
    }

    fn already_committed(&self, status: StatusCode, message: String) {
        self.config
            .diagnostics
            .report(&Diagnostic::AlreadyCommitted { status, message });
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::panic::panic_any;
    use std::pin::{Pin, pin};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll, Waker};

    use faultline_core::{BufferedSink, HttpError, StatusTracker};

    use super::*;

    type Collected = Arc<Mutex<Vec<Diagnostic>>>;

    fn dispatcher(recover_panic: bool) -> (Dispatcher, Collected) {
        let collected = Collected::default();
        let sink = Arc::clone(&collected);
        let config = DispatchConfig::builder()
            .recover_panic(recover_panic)
            .diagnostics(move |diagnostic: &Diagnostic| {
                sink.lock().expect("lock").push(diagnostic.clone());
            })
            .build();
        (Dispatcher::new(config), collected)
    }

    fn tracked() -> (Arc<StatusTracker<BufferedSink>>, ResponseWriter) {
        let tracker = Arc::new(StatusTracker::new(BufferedSink::new()));
        let writer = ResponseWriter::from_tracker(Arc::clone(&tracker));
        (tracker, writer)
    }

    #[test]
    fn success_is_a_no_op() {
        let (dispatcher, collected) = dispatcher(true);
        let (tracker, writer) = tracked();

        dispatcher.dispatch_blocking(&writer, || Ok::<(), BoxError>(()));

        assert_eq!(tracker.code(), None);
        assert!(tracker.with_sink(|sink| sink.body().is_empty()));
        assert!(collected.lock().expect("lock").is_empty());
    }

    #[test]
    fn classified_error_is_served() {
        let (dispatcher, _) = dispatcher(false);
        let (tracker, writer) = tracked();

        dispatcher.dispatch_blocking(&writer, || {
            Err::<(), _>(HttpError::msg(StatusCode::IM_A_TEAPOT, "fail"))
        });

        let response = tracker.with_sink(BufferedSink::take_response);
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.body().as_ref(), b"{\"errors\":[\"fail\"]}\n");
        assert_eq!(
            response.headers().get(CONTENT_TYPE).map(|value| value.as_bytes()),
            Some(&b"application/json; charset=utf-8"[..])
        );
    }

    #[test]
    fn blocking_panic_is_recovered() {
        let (dispatcher, _) = dispatcher(true);
        let (tracker, writer) = tracked();

        dispatcher.dispatch_blocking(&writer, || -> Result<(), BoxError> { panic_any(418_i32) });

        let response = tracker.with_sink(BufferedSink::take_response);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = String::from_utf8(response.body().to_vec()).expect("utf-8");
        assert!(body.contains("(i32) 418"), "{body}");
    }

    #[test]
    fn committed_response_is_left_alone() {
        let (dispatcher, collected) = dispatcher(false);
        let (tracker, writer) = tracked();
        writer.set_status(StatusCode::BAD_GATEWAY);

        dispatcher.handle_error(&writer, "fail".into());

        assert_eq!(tracker.code(), Some(StatusCode::BAD_GATEWAY));
        assert!(tracker.with_sink(|sink| sink.body().is_empty()));
        assert_eq!(
            *collected.lock().expect("lock"),
            vec![Diagnostic::AlreadyCommitted {
                status: StatusCode::BAD_GATEWAY,
                message: "fail".to_string(),
            }]
        );
    }

    #[test]
    fn settle_prefers_returned_error() {
        let (dispatcher, collected) = dispatcher(true);
        let panic = Panic::new(
            faultline_core::PanicPayload::Value {
                type_name: "&str",
                text: "late".to_string(),
            },
            None,
        );

        let failure = dispatcher.settle(Err("first".into()), Some(panic));

        assert_eq!(failure.map(|err| err.to_string()), Some("first".to_string()));
        assert_eq!(
            *collected.lock().expect("lock"),
            vec![Diagnostic::PanicSuppressed {
                message: "(&str) late".to_string(),
            }]
        );
    }

    #[test]
    fn settle_turns_late_panic_into_failure() {
        let (dispatcher, _) = dispatcher(true);
        let panic = Panic::new(faultline_core::PanicPayload::Opaque, None);

        let failure = dispatcher.settle(Ok(()), Some(panic)).expect("failure");

        assert!(failure.downcast_ref::<Panic>().is_some());
        assert_eq!(dispatcher.settle(Ok(()), None).map(|err| err.to_string()), None);
    }

    /// Panics when polled, and again when dropped.
    struct PanicsTwice;

    impl Future for PanicsTwice {
        type Output = Result<(), BoxError>;

        fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
            panic_any(HttpError::msg(StatusCode::SERVICE_UNAVAILABLE, "overloaded"))
        }
    }

    impl Drop for PanicsTwice {
        fn drop(&mut self) {
            panic_any("dropped");
        }
    }

    #[test]
    fn second_panic_goes_to_diagnostics() {
        let (dispatcher, collected) = dispatcher(true);
        let (tracker, writer) = tracked();
        let mut dispatch = pin!(dispatcher.dispatch(&writer, PanicsTwice));

        let ready = dispatch.as_mut().poll(&mut Context::from_waker(Waker::noop()));

        assert!(ready.is_ready());
        assert_eq!(tracker.code(), Some(StatusCode::SERVICE_UNAVAILABLE));
        let collected = collected.lock().expect("lock");
        assert!(matches!(
            collected.as_slice(),
            [Diagnostic::PanicSuppressed { message }] if message.ends_with("(&str) dropped")
        ));
    }

    #[test]
    fn sink_failure_is_reported() {
        let collected = Collected::default();
        let sink = Arc::clone(&collected);
        let dispatcher = Dispatcher::new(
            DispatchConfig::builder()
                .error_sink(
                    |_: &ResponseWriter,
                     _: &faultline_core::NormalizedFailure|
                     -> faultline_core::Result<()> {
                        Err(io::Error::other("broken pipe").into())
                    },
                )
                .diagnostics(move |diagnostic: &Diagnostic| {
                    sink.lock().expect("lock").push(diagnostic.clone());
                })
                .build(),
        );
        let (tracker, writer) = tracked();

        dispatcher.handle_error(&writer, HttpError::msg(StatusCode::CONFLICT, "taken").into());

        assert_eq!(tracker.code(), Some(StatusCode::CONFLICT));
        let collected = collected.lock().expect("lock");
        assert!(matches!(
            collected.as_slice(),
            [Diagnostic::ErrorSinkFailed { status, error }]
                if *status == StatusCode::CONFLICT && error.contains("broken pipe")
        ));
    }
}
