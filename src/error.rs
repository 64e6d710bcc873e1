use reqwest::StatusCode;
use thiserror::Error;

/// Failures of the backend HTTP layer
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: StatusCode },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("session expired, please sign in again")]
    Unauthorized,

    #[error("{0} cannot take path segments")]
    NotABase(String),

    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}
