use thiserror::Error;

/// Errors that abort `LinkStream::validate` outright rather than being
/// reported as a link result. These never appear in the result stream.
#[derive(Debug, Error)]
pub enum ValidationFatalError {
    #[error("invalid CSS selector {selector:?}: {source}")]
    SelectorParse {
        selector: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("retry sleep was interrupted")]
    Interrupted,

    #[error("end_group() called on a builder with no parent stream")]
    DanglingGroupBuilder,
}

/// Distinguishes a transport-level failure (DNS, TLS, connect, timeout)
/// from an ordinary non-2xx HTTP response, so callers can retry only the
/// former.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("network error requesting {uri}: {message}")]
    Network { uri: String, message: String },
}

/// Raised by `ValidationErrorStream::assert_valid` when any invalid result
/// is present; aggregates one rendered line per result.
#[derive(Debug, Error)]
#[error("{} invalid link(s) found:\n{}", .lines.len(), .lines.join("\n"))]
pub struct LinkCheckAssertionError {
    lines: Vec<String>,
}

impl LinkCheckAssertionError {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}
