//! HTTP client scoped to one guild.
//!
//! Speaks the Discord-compatible v10 REST API. All operations performed through
//! this client target the same guild, matching the design where `PlatformEffect`
//! variants don't include the guild.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::types::GuildId;

use super::error::PlatformApiError;

/// Header carrying the audit-log reason of a mutation.
pub(super) const AUDIT_LOG_REASON_HEADER: &str = "x-audit-log-reason";

/// A platform API client scoped to a specific guild.
#[derive(Clone)]
pub struct GuildClient {
    http: reqwest::Client,
    api_base: String,
    guild: GuildId,
}

impl GuildClient {
    /// Creates a client authenticating with a bot token.
    ///
    /// `timeout` bounds every request; a stalled call fails that call only.
    pub fn new(
        api_base: impl Into<String>,
        guild: GuildId,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, PlatformApiError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bot {}", token))
            .map_err(|e| PlatformApiError::Decode(format!("invalid token: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .user_agent(concat!("role-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(GuildClient {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            guild,
        })
    }

    /// Builds a request against `{api_base}{path}`.
    pub(super) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.api_base, path))
    }

    /// Builds a request against a path under `/guilds/{guild}`.
    pub(super) fn guild_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request(method, &format!("/guilds/{}{}", self.guild, path))
    }

    /// Sends a request and decodes a JSON body.
    pub(super) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, PlatformApiError> {
        let response = check_status(request.send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PlatformApiError::Decode(e.to_string()))
    }

    /// Sends a request whose body is irrelevant.
    pub(super) async fn send_empty(&self, request: RequestBuilder) -> Result<(), PlatformApiError> {
        check_status(request.send().await?).await?;
        Ok(())
    }
}

impl std::fmt::Debug for GuildClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildClient")
            .field("api_base", &self.api_base)
            .field("guild", &self.guild)
            .finish_non_exhaustive()
    }
}

/// Converts a non-success response into an error carrying the body text.
async fn check_status(response: Response) -> Result<Response, PlatformApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(PlatformApiError::Status {
        status: status.as_u16(),
        message,
    })
}
