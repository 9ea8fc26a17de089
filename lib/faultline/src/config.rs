//! Dispatcher configuration types.

use std::fmt;
use std::sync::Arc;

use faultline_core::JSON_CONTENT_TYPE;
use http::HeaderValue;

use crate::diagnostics::{DiagnosticSink, TracingDiagnostics};
use crate::error_sink::{ErrorSink, JsonErrorSink};

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
///
/// Built once per server instance and shared by every request it serves.
#[derive(Clone)]
pub struct DispatchConfig {
    /// Content type set before the error status is committed; `None` leaves
    /// the headers untouched.
    pub content_type: Option<HeaderValue>,
    /// Whether handler panics are caught and served as failures.
    pub recover_panic: bool,
    /// Writes the body of failed responses.
    pub error_sink: Arc<dyn ErrorSink>,
    /// Receives failures that could not be served.
    pub diagnostics: Arc<dyn DiagnosticSink>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            content_type: Some(HeaderValue::from_static(JSON_CONTENT_TYPE)),
            recover_panic: false,
            error_sink: Arc::new(JsonErrorSink),
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }
}

impl DispatchConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> DispatchConfigBuilder {
        DispatchConfigBuilder::default()
    }
}

impl fmt::Debug for DispatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchConfig")
            .field("content_type", &self.content_type)
            .field("recover_panic", &self.recover_panic)
            .finish_non_exhaustive()
    }
}

/// Builder for [`DispatchConfig`].
///
/// # Example
///
/// ```
/// use faultline::header::HeaderValue;
/// use faultline::{DispatchConfig, PlainTextErrorSink};
///
/// let config = DispatchConfig::builder()
///     .recover_panic(true)
///     .content_type(HeaderValue::from_static("text/plain; charset=utf-8"))
///     .error_sink(PlainTextErrorSink)
///     .build();
///
/// assert!(config.recover_panic);
/// ```
#[derive(Default)]
pub struct DispatchConfigBuilder {
    content_type: Option<Option<HeaderValue>>,
    recover_panic: Option<bool>,
    error_sink: Option<Arc<dyn ErrorSink>>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
}

impl DispatchConfigBuilder {
    /// Set the content type of error responses.
    #[must_use]
    pub fn content_type(mut self, content_type: HeaderValue) -> Self {
        self.content_type = Some(Some(content_type));
        self
    }

    /// Leave the content type to the error sink.
    #[must_use]
    pub fn without_content_type(mut self) -> Self {
        self.content_type = Some(None);
        self
    }

    /// Set whether handler panics are recovered.
    #[must_use]
    pub const fn recover_panic(mut self, recover: bool) -> Self {
        self.recover_panic = Some(recover);
        self
    }

    /// Set the error sink.
    #[must_use]
    pub fn error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.error_sink = Some(Arc::new(sink));
        self
    }

    /// Set the diagnostic sink.
    #[must_use]
    pub fn diagnostics(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.diagnostics = Some(Arc::new(sink));
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> DispatchConfig {
        let defaults = DispatchConfig::default();
        DispatchConfig {
            content_type: self.content_type.unwrap_or(defaults.content_type),
            recover_panic: self.recover_panic.unwrap_or(defaults.recover_panic),
            error_sink: self.error_sink.unwrap_or(defaults.error_sink),
            diagnostics: self.diagnostics.unwrap_or(defaults.diagnostics),
        }
    }
}

impl fmt::Debug for DispatchConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchConfigBuilder")
            .field("content_type", &self.content_type)
            .field("recover_panic", &self.recover_panic)
            .field("error_sink", &self.error_sink.is_some())
            .field("diagnostics", &self.diagnostics.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = DispatchConfig::default();
        assert_eq!(
            config.content_type,
            Some(HeaderValue::from_static("application/json; charset=utf-8"))
        );
        assert!(!config.recover_panic);
    }

    #[test]
    fn builder_overrides() {
        let config = DispatchConfig::builder()
            .recover_panic(true)
            .without_content_type()
            .build();

        assert!(config.recover_panic);
        assert_eq!(config.content_type, None);
    }

    #[test]
    fn builder_keeps_last_content_type() {
        let config = DispatchConfig::builder()
            .without_content_type()
            .content_type(HeaderValue::from_static("text/plain"))
            .build();

        assert_eq!(config.content_type, Some(HeaderValue::from_static("text/plain")));
    }

    #[test]
    fn debug_hides_sinks() {
        let config = DispatchConfig::default();
        let debug = format!("{config:?}");
        assert!(debug.contains("recover_panic: false"), "{debug}");
    }
}
