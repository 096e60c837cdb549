// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer tokens for the session handshake.
//!
//! A token is minted before every connection attempt and sent as the `jwt`
//! cookie on both the session and tunnel connections.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Error type for token issuance.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token service could not be reached.
    #[error("token request failed: {0}")]
    RequestFailed(String),

    /// The token service answered with a non-success status.
    #[error("token service returned status {0}")]
    Status(u16),

    /// The token service answered without a usable token.
    #[error("token service returned no token")]
    MissingToken,

    /// No way of obtaining a token is configured.
    #[error("no token or auth_url configured")]
    NotConfigured,
}

/// Result type for token issuance.
pub type AuthResult<T> = Result<T, AuthError>;

/// Source of bearer tokens.
pub trait TokenProvider: Send + Sync {
    /// Mints a token for the next connection attempt.
    fn token(&self) -> Pin<Box<dyn Future<Output = AuthResult<String>> + Send + '_>>;
}

/// A fixed token taken from configuration.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        StaticToken(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Pin<Box<dyn Future<Output = AuthResult<String>> + Send + '_>> {
        Box::pin(async move { Ok(self.0.clone()) })
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    identity: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// Tokens fetched from an authentication service.
#[derive(Debug, Clone)]
pub struct HttpTokenProvider {
    client: reqwest::Client,
    url: String,
    identity: String,
}

impl HttpTokenProvider {
    pub fn new(url: impl Into<String>, identity: impl Into<String>) -> Self {
        HttpTokenProvider {
            client: reqwest::Client::new(),
            url: url.into(),
            identity: identity.into(),
        }
    }
}

impl TokenProvider for HttpTokenProvider {
    fn token(&self) -> Pin<Box<dyn Future<Output = AuthResult<String>> + Send + '_>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.url)
                .json(&TokenRequest {
                    identity: &self.identity,
                })
                .send()
                .await
                .map_err(|e| AuthError::RequestFailed(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(AuthError::Status(status.as_u16()));
            }

            let body: TokenResponse = response
                .json()
                .await
                .map_err(|e| AuthError::RequestFailed(e.to_string()))?;
            body.token
                .filter(|t| !t.is_empty())
                .ok_or(AuthError::MissingToken)
        })
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
