//! HTTP client for the upstream profile service.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;

use super::error::UpstreamApiError;

/// Header carrying the service-to-service API key.
const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// Prefix of every sync endpoint.
const SYNC_PREFIX: &str = "/api/sync";

/// A profile service client.
#[derive(Clone)]
pub struct ProfileClient {
    http: reqwest::Client,
    base_url: String,
}

impl ProfileClient {
    /// Creates a client authenticating with the given API key.
    pub fn new(
        base_url: impl Into<String>,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, UpstreamApiError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key).map_err(|e| UpstreamApiError::Decode {
            path: String::new(),
            message: format!("invalid API key: {}", e),
        })?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(ProfileClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Returns the full path of a sync endpoint, e.g. `/api/sync/referrals`.
    pub(super) fn sync_path(endpoint: &str) -> String {
        format!("{}/{}", SYNC_PREFIX, endpoint.trim_matches('/'))
    }

    pub(super) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    /// Sends a request and decodes a JSON body. Non-2xx is an error.
    pub(super) async fn send_json<T: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> Result<T, UpstreamApiError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamApiError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        response.json::<T>().await.map_err(|e| UpstreamApiError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Sends a request whose body is irrelevant. Non-2xx is an error.
    pub(super) async fn send_empty(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> Result<(), UpstreamApiError> {
        let status = request.send().await?.status();
        if !status.is_success() {
            return Err(UpstreamApiError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for ProfileClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
