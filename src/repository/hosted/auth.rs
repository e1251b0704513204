//! Password sign-in against the hosted identity service

use serde::{Deserialize, Serialize};

use super::{check_status, Endpoint};
use crate::repository::error::BackendResult;
use crate::session::Session;

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        Session {
            user_id: token.user.id,
            email: token.user.email,
            access_token: Some(token.access_token),
        }
    }
}

/// Exchange email and password for a session
pub async fn sign_in_with_password(
    endpoint: &Endpoint,
    email: &str,
    password: &str,
) -> BackendResult<Session> {
    let request = endpoint
        .http()
        .post(endpoint.url("/auth/v1/token"))
        .query(&[("grant_type", "password")])
        .json(&PasswordGrant { email, password });
    let response = endpoint.authorize(request, None).send().await?;
    let token: TokenResponse = check_status(response).await?.json().await?;

    tracing::info!("signed in as {}", token.user.id);
    Ok(token.into())
}
