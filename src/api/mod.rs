//! Client for the preprint server's public REST API.
//!
//! Every request is a blocking `GET`; a non-2xx status is surfaced as [`ApiError::Http`] and
//! never retried.

mod error;
mod pages;

pub use error::ApiError;
pub use pages::Pages;

use serde_json::Value;
use url::Url;

use crate::config::ApiConfig;

pub const DEFAULT_BASE_URL: &str = "https://chemrxiv.org/engage/chemrxiv/public-api/v1";
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub(crate) const USER_AGENT: &str = concat!("preprint-stats/", env!("CARGO_PKG_VERSION"));

pub struct Client {
    agent: ureq::Agent,
    base: Url,
    token: Option<String>,
}

impl Client {
    /// Build a client. When a token is configured it is validated against the check endpoint
    /// first, so a rejected token fails here rather than halfway through a download.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client {
            agent: ureq::Agent::new_with_defaults(),
            base: config.base_url.clone(),
            token: config.token.clone(),
        };
        if client.token.is_some() {
            client.verify_token(&config.check_path)?;
        }
        Ok(client)
    }

    fn verify_token(&self, path: &str) -> Result<(), ApiError> {
        match self.get(path, &[("limit", "1".to_string())]) {
            Ok(_) => Ok(()),
            Err(ApiError::Http { url, status }) if status == 401 || status == 403 => {
                Err(ApiError::Authentication { url, status })
            }
            Err(e) => Err(e),
        }
    }

    /// Absolute URL of an endpoint below the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        self.base
            .join(path.trim_start_matches('/'))
            .map(String::from)
            .unwrap_or_else(|_| format!("{}{}", self.base, path))
    }

    /// Perform a direct query.
    pub fn query(&self, path: &str) -> Result<Value, ApiError> {
        self.get(path, &[])
    }

    pub(crate) fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = self.endpoint(path);
        let mut req = self
            .agent
            .get(&url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);
        for (key, value) in params {
            req = req.query(key, value);
        }
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        log::debug!("GET {url} {params:?}");
        let mut res = match req.call() {
            Ok(res) => res,
            Err(ureq::Error::StatusCode(status)) => return Err(ApiError::Http { url, status }),
            Err(source) => return Err(ApiError::Transport { url, source }),
        };
        let body = match res.body_mut().read_to_string() {
            Ok(body) => body,
            Err(source) => return Err(ApiError::Transport { url, source }),
        };
        serde_json::from_str(&body).map_err(|e| ApiError::malformed(url, e))
    }

    /// Lazily walk every hit of a paginated listing, `page_size` hits per request.
    pub fn pages(&self, path: &str, page_size: usize) -> Pages<'_> {
        Pages::new(self, path, page_size)
    }

    /// Number of preprints the server reports for its item listing.
    pub fn total_count(&self) -> Result<u64, ApiError> {
        let body = self.get("items", &[("limit", "1".to_string())])?;
        body.get("totalCount")
            .and_then(Value::as_u64)
            .ok_or_else(|| ApiError::malformed(self.endpoint("items"), "missing totalCount"))
    }

    /// Metadata of a single preprint.
    pub fn preprint(&self, id: &str) -> Result<Value, ApiError> {
        let id = percent_encoding::utf8_percent_encode(id, percent_encoding::NON_ALPHANUMERIC);
        self.query(&format!("items/{id}"))
    }
}
