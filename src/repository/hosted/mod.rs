//! Hosted Backend
//!
//! Client for the hosted platform: PostgREST-style record API, object
//! storage, password sign-in and the websocket realtime channel. All
//! requests carry the project's anon key; authenticated calls add the
//! session's bearer token.

mod auth;
mod realtime;
mod rest;
mod storage;

use reqwest::{RequestBuilder, Response};
use serde::Deserialize;

use super::error::{BackendError, BackendResult};

pub use auth::sign_in_with_password;
pub use realtime::{parse_postgres_change, RealtimeClient};
pub use rest::{query_pairs, RestClient};
pub use storage::StorageClient;

/// Project URL and anon key shared by every hosted client
#[derive(Debug, Clone)]
pub struct Endpoint {
    base_url: String,
    anon_key: String,
    http: reqwest::Client,
}

impl Endpoint {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Attach the key headers; without a user token the anon key is the bearer
    pub(crate) fn authorize(&self, request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(token.unwrap_or(&self.anon_key))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Turn a non-success response into a `BackendError`
pub(crate) async fn check_status(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_from_body(status.as_u16(), &body))
}

pub(crate) fn error_from_body(status: u16, body: &str) -> BackendError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| {
            b.message
                .clone()
                .or_else(|| b.msg.clone())
                .or_else(|| b.error_description.clone())
        })
        .unwrap_or_else(|| body.trim().to_string());
    let code = parsed.and_then(|b| b.code).map(|code| match code {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    });

    // 42501: insufficient_privilege, raised by row-level security
    if code.as_deref() == Some("42501") {
        return BackendError::Policy(message);
    }
    if status == 401 {
        return BackendError::Unauthenticated;
    }
    BackendError::Status { status, message }
}
