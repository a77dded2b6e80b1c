use std::fmt;

/// Why a single feed could not be fetched or parsed.
#[derive(Debug)]
pub enum FetchError {
    Http(reqwest::Error),
    Status(u16),
    InvalidUrl(String),
    Proxy(String),
    Json(serde_json::Error),
    Format(String),
    Aborted,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Http(e) if e.is_timeout() => write!(f, "Request timed out"),
            FetchError::Http(e) => write!(f, "HTTP error: {e}"),
            FetchError::Status(code) => write!(f, "Unexpected HTTP status {code}"),
            FetchError::InvalidUrl(e) => write!(f, "Invalid URL: {e}"),
            FetchError::Proxy(e) => write!(f, "Proxy error: {e}"),
            FetchError::Json(e) => write!(f, "Invalid JSON: {e}"),
            FetchError::Format(e) => write!(f, "Unexpected feed layout: {e}"),
            FetchError::Aborted => write!(f, "Fetch task aborted"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Http(e)
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Json(e)
    }
}
