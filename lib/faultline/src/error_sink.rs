//! Error sinks: write the body of a failed response.

use faultline_core::{JsonError, NormalizedFailure, ResponseWriter, Result};

/// Writes the body describing a failure.
///
/// Called by the [`Dispatcher`](crate::Dispatcher) after the status code and
/// content type have been committed, so implementations only write bytes.
/// Closures with the same signature implement this trait.
///
/// # Example
///
/// ```
/// use faultline::{DispatchConfig, NormalizedFailure, ResponseWriter, Result};
///
/// let _config = DispatchConfig::builder()
///     .error_sink(|writer: &ResponseWriter, failure: &NormalizedFailure| -> Result<()> {
///         writer.write(format!("oops: {}", failure.message()).as_bytes())?;
///         Ok(())
///     })
///     .build();
/// ```
pub trait ErrorSink: Send + Sync {
    /// Write the body for `failure`.
    fn send(&self, writer: &ResponseWriter, failure: &NormalizedFailure) -> Result<()>;
}

impl<F> ErrorSink for F
where
    F: Fn(&ResponseWriter, &NormalizedFailure) -> Result<()> + Send + Sync,
{
    fn send(&self, writer: &ResponseWriter, failure: &NormalizedFailure) -> Result<()> {
        self(writer, failure)
    }
}

/// Default sink: `{"errors":["<message>"]}` followed by a newline.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonErrorSink;

impl ErrorSink for JsonErrorSink {
    fn send(&self, writer: &ResponseWriter, failure: &NormalizedFailure) -> Result<()> {
        let body = JsonError::new(failure.message()).to_bytes()?;
        writer.write(&body)?;
        Ok(())
    }
}

/// Writes the bare message followed by a newline.
///
/// Pair it with a `text/plain` content type.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextErrorSink;

impl ErrorSink for PlainTextErrorSink {
    fn send(&self, writer: &ResponseWriter, failure: &NormalizedFailure) -> Result<()> {
        writer.write(failure.message().as_bytes())?;
        writer.write(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use faultline_core::{BufferedSink, StatusCode, StatusTracker};

    use super::*;

    fn failure() -> NormalizedFailure {
        NormalizedFailure::Classified {
            status: StatusCode::IM_A_TEAPOT,
            message: "fail".to_string(),
        }
    }

    fn body_of(sink: &dyn ErrorSink) -> String {
        let tracker = Arc::new(StatusTracker::new(BufferedSink::new()));
        let writer = ResponseWriter::from_tracker(Arc::clone(&tracker));

        sink.send(&writer, &failure()).expect("send");

        let body = tracker.with_sink(|sink| sink.body().to_vec());
        String::from_utf8(body).expect("utf-8")
    }

    #[test]
    fn json_sink_writes_errors_array() {
        let body = body_of(&JsonErrorSink);

        assert_eq!(body, "{\"errors\":[\"fail\"]}\n");
        let parsed: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(parsed["errors"], serde_json::json!(["fail"]));
    }

    #[test]
    fn plain_text_sink_writes_message_line() {
        assert_eq!(body_of(&PlainTextErrorSink), "fail\n");
    }

    #[test]
    fn closure_sink() {
        let sink = |writer: &ResponseWriter, failure: &NormalizedFailure| -> Result<()> {
            writer.write(failure.status().as_str().as_bytes())?;
            Ok(())
        };
        assert_eq!(body_of(&sink), "418");
    }
}
