use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API token rejected by {url} (HTTP {status})")]
    Authentication { url: String, status: u16 },
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: ureq::Error,
    },
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },
}

impl ApiError {
    pub(crate) fn malformed(url: impl Into<String>, reason: impl ToString) -> Self {
        ApiError::MalformedResponse {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}
