use std::time::Duration;

/// Why a classification call produced no usable result.
#[derive(Clone, Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("classifier returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

impl EnrichError {
    /// Short classification string for logs.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network_error",
            Self::Timeout(_) => "timeout",
            Self::Status { .. } => "http_status",
            Self::Malformed(_) => "malformed_response",
        }
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
