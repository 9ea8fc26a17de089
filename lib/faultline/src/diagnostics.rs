//! Out-of-band reports about failures that could not be served normally.
//!
//! Nothing here reaches the client: a [`Diagnostic`] is emitted when the
//! response is already committed, when a second failure is dropped in favour
//! of the first one, or when the error sink itself fails.

use derive_more::Display;
use http::StatusCode;
use tracing::{error, warn};

/// A failure that was recovered locally instead of being served.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Diagnostic {
    /// A failure occurred after the status line was committed.
    ///
    /// The committed status is kept and nothing is written.
    #[display("HTTP error (header already sent): {message} ({status})")]
    AlreadyCommitted {
        /// Status already on the wire.
        status: StatusCode,
        /// Message of the failure that could not be served.
        message: String,
    },

    /// The handler returned an error, then panicked while being released.
    ///
    /// The returned error is served; the panic is only reported.
    #[display("handler panicked after returning an error: {message}")]
    PanicSuppressed {
        /// Message of the panic, with its call site when known.
        message: String,
    },

    /// The error sink failed to write the error body.
    #[display("error sink failed while serving {status}: {error}")]
    ErrorSinkFailed {
        /// Status committed for the failure.
        status: StatusCode,
        /// Error raised by the sink.
        error: String,
    },
}

impl Diagnostic {
    /// Status involved, when there is one.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::AlreadyCommitted { status, .. } | Self::ErrorSinkFailed { status, .. } => {
                Some(*status)
            }
            Self::PanicSuppressed { .. } => None,
        }
    }
}

/// Receives diagnostics emitted by a [`Dispatcher`](crate::Dispatcher).
///
/// Closures taking a `&Diagnostic` implement this trait.
pub trait DiagnosticSink: Send + Sync {
    /// Report one diagnostic.
    fn report(&self, diagnostic: &Diagnostic);
}

impl<F> DiagnosticSink for F
where
    F: Fn(&Diagnostic) + Send + Sync,
{
    fn report(&self, diagnostic: &Diagnostic) {
        self(diagnostic);
    }
}

/// Default diagnostic sink: emits `tracing` events.
///
/// Already-committed failures and suppressed panics are warnings; error sink
/// failures are errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn report(&self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::AlreadyCommitted { status, message } => {
                warn!(status = status.as_u16(), error = %message, "{diagnostic}");
            }
            Diagnostic::PanicSuppressed { message } => {
                warn!(error = %message, "{diagnostic}");
            }
            Diagnostic::ErrorSinkFailed { status, error } => {
                error!(status = status.as_u16(), error = %error, "{diagnostic}");
            }
        }
    }
}
