use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration backend is not available: {0}")]
    BackendUnavailable(String),

    #[error("authentication with {vendor} failed: {details}")]
    Auth { vendor: String, details: String },

    #[error("fetch from {vendor} failed: {details}")]
    Vendor { vendor: String, details: String },

    #[error("rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimit { retry_after_secs: u64 },

    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("forwarding failed: {0}")]
    Forward(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn vendor(vendor: impl Into<String>, details: impl Into<String>) -> Self {
        Error::Vendor {
            vendor: vendor.into(),
            details: details.into(),
        }
    }

    pub fn auth(vendor: impl Into<String>, details: impl Into<String>) -> Self {
        Error::Auth {
            vendor: vendor.into(),
            details: details.into(),
        }
    }

    /// The configuration service answered with something that is not a
    /// structured payload, which is what a restarting backend looks like.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Error::BackendUnavailable(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::RateLimit { .. }
                | Error::Timeout(_)
                | Error::BackendUnavailable(_)
        )
    }
}
