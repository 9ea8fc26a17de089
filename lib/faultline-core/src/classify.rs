//! Failure classification.
//!
//! [`classify`] maps any failure a handler can produce to the status code and
//! message sent to the client. It is total: every error yields exactly one
//! [`NormalizedFailure`].
//!
//! | Failure | Status | Message |
//! |---------|--------|---------|
//! | [`HttpError`] | its status | its message |
//! | any other error | `500` | its `Display` |
//! | [`Panic`] carrying an error | as above | `[call site] ` + as above |
//! | [`Panic`] carrying a value | `500` | `[call site] (type) value` |

use std::fmt;

use http::StatusCode;

use crate::HttpError;
use crate::capture::{Panic, PanicPayload};

/// Status code and message decided for a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedFailure {
    /// The failure carried its status code.
    Classified {
        /// Status code chosen by the handler.
        status: StatusCode,
        /// Message sent to the client.
        message: String,
    },
    /// The failure did not carry a status code: `500 Internal Server Error`.
    Unclassified {
        /// Message sent to the client.
        message: String,
    },
}

impl NormalizedFailure {
    /// Status code to commit.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Classified { status, .. } => *status,
            Self::Unclassified { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message to send.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Classified { message, .. } | Self::Unclassified { message } => message,
        }
    }

    /// Consume into the message.
    #[must_use]
    pub fn into_message(self) -> String {
        match self {
            Self::Classified { message, .. } | Self::Unclassified { message } => message,
        }
    }

    /// Returns `true` if the status code came from the failure itself.
    #[must_use]
    pub const fn is_classified(&self) -> bool {
        matches!(self, Self::Classified { .. })
    }

    fn with_prefix(self, prefix: &impl fmt::Display) -> Self {
        match self {
            Self::Classified { status, message } => Self::Classified {
                status,
                message: format!("{prefix} {message}"),
            },
            Self::Unclassified { message } => Self::Unclassified {
                message: format!("{prefix} {message}"),
            },
        }
    }
}

impl fmt::Display for NormalizedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.status())
    }
}

/// Classify a failure.
///
/// # Example
///
/// ```
/// use faultline_core::{BoxError, HttpError, StatusCode, classify};
///
/// let err: BoxError = HttpError::msg(StatusCode::IM_A_TEAPOT, "fail").into();
/// let failure = classify(err.as_ref());
/// assert_eq!(failure.status(), StatusCode::IM_A_TEAPOT);
/// assert_eq!(failure.message(), "fail");
///
/// let err: BoxError = "fail".into();
/// assert_eq!(classify(err.as_ref()).status(), StatusCode::INTERNAL_SERVER_ERROR);
/// ```
#[must_use]
pub fn classify(failure: &(dyn std::error::Error + Send + Sync + 'static)) -> NormalizedFailure {
    if let Some(panic) = failure.downcast_ref::<Panic>() {
        return classify_panic(panic);
    }
    if let Some(error) = failure.downcast_ref::<HttpError>() {
        return NormalizedFailure::Classified {
            status: error.status(),
            message: error.to_string(),
        };
    }
    NormalizedFailure::Unclassified {
        message: failure.to_string(),
    }
}

fn classify_panic(panic: &Panic) -> NormalizedFailure {
    let failure = match panic.payload() {
        PanicPayload::Error(error) => classify(error.as_ref()),
        payload @ (PanicPayload::Value { .. } | PanicPayload::Opaque) => {
            NormalizedFailure::Unclassified {
                message: payload.to_string(),
            }
        }
    };
    match panic.call_site() {
        Some(site) => failure.with_prefix(site),
        None => failure,
    }
}

#[cfg(test)]
mod tests {
    use std::panic::panic_any;

    use super::*;
    use crate::BoxError;
    use crate::capture::{CallSite, Outcome, invoke};

    fn panicked(f: impl FnOnce()) -> BoxError {
        match invoke(f) {
            Outcome::Panicked(panic) => panic.into(),
            _ => panic!("expected a panic"),
        }
    }

    #[test]
    fn classified_error_keeps_status_and_message() {
        let err: BoxError = HttpError::msg(StatusCode::IM_A_TEAPOT, "fail").into();
        let failure = classify(err.as_ref());

        assert!(failure.is_classified());
        assert_eq!(failure.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(failure.message(), "fail");
    }

    #[test]
    fn plain_error_is_internal() {
        let err: BoxError = std::io::Error::other("fail").into();
        let failure = classify(err.as_ref());

        assert!(!failure.is_classified());
        assert_eq!(failure.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failure.message(), "fail");
    }

    #[test]
    fn integer_panic_is_internal_with_type_tag() {
        let err = panicked(|| panic_any(418_i32));
        let failure = classify(err.as_ref());

        assert_eq!(failure.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(failure.message().contains("(i32) 418"), "{failure}");
    }

    #[test]
    fn http_error_panic_keeps_status_with_call_site() {
        let err = panicked(|| panic_any(HttpError::msg(StatusCode::IM_A_TEAPOT, "fail")));
        let failure = classify(err.as_ref());

        assert_eq!(failure.status(), StatusCode::IM_A_TEAPOT);
        assert!(failure.message().starts_with('['), "{failure}");
        assert!(failure.message().contains("classify.rs:"), "{failure}");
        assert!(failure.message().contains(" fail"), "{failure}");
        assert!(failure.message().ends_with("fail"), "{failure}");
    }

    #[test]
    fn panic_without_call_site_has_no_prefix() {
        let panic = Panic::new(
            PanicPayload::Value {
                type_name: "&str",
                text: "fail".to_string(),
            },
            None,
        );
        let failure = classify(&panic);

        assert_eq!(failure.message(), "(&str) fail");
    }

    #[test]
    fn panic_prefix_uses_function_when_known() {
        let panic = Panic::new(
            PanicPayload::Error(HttpError::msg(StatusCode::NOT_FOUND, "missing").into()),
            Some(CallSite::new(Some("api::find".to_string()), "api.rs", 9)),
        );
        let failure = classify(&panic);

        assert_eq!(
            failure,
            NormalizedFailure::Classified {
                status: StatusCode::NOT_FOUND,
                message: "[api::find api.rs:9] missing".to_string(),
            }
        );
    }

    #[test]
    fn normalized_failure_display() {
        let failure = NormalizedFailure::Unclassified {
            message: "fail".to_string(),
        };
        assert_eq!(failure.to_string(), "fail (500 Internal Server Error)");
    }
}
