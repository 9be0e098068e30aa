// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth 2.0 endpoints: code exchange, refresh and revocation.

use crate::error::SyncError;
use crate::models::{AuthorizationGrant, RefreshedToken, Scope};
use crate::services::tokens::OAuthProvider;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

/// Consent-screen URL. `access_type=offline` and `prompt=consent` make
/// Google issue a refresh token on every authorization.
pub fn authorize_url(client_id: &str, redirect_uri: &str, state: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}\
         &access_type=offline&prompt=consent&include_granted_scopes=true&state={}",
        AUTHORIZE_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&Scope::REQUESTED.join(" ")),
        urlencoding::encode(state),
    )
}

/// Google OAuth client.
#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    revoke_url: String,
}

impl GoogleOAuthClient {
    pub fn new(http: reqwest::Client, client_id: String, client_secret: String) -> Self {
        Self {
            http,
            client_id,
            client_secret,
            token_url: TOKEN_URL.to_string(),
            revoke_url: REVOKE_URL.to_string(),
        }
    }

    /// Override the token and revocation endpoints (tests use a mock server).
    pub fn with_endpoints(mut self, token_url: String, revoke_url: String) -> Self {
        self.token_url = token_url;
        self.revoke_url = revoke_url;
        self
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse, SyncError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| SyncError::RemoteApi(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::RemoteApi(describe_token_error(status, &body)));
        }

        response
            .json()
            .await
            .map_err(|e| SyncError::RemoteApi(format!("Failed to parse token response: {}", e)))
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// OAuth error body, e.g. `{"error":"invalid_grant","error_description":"..."}`.
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

fn describe_token_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(OAuthErrorBody {
            error,
            error_description: Some(description),
        }) => format!("{}: {}", error, description),
        Ok(OAuthErrorBody { error, .. }) => error,
        Err(_) => format!("HTTP {}: {}", status, body),
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthClient {
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AuthorizationGrant, SyncError> {
        let token = self
            .post_token_form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .await?;

        let refresh_token = token.refresh_token.ok_or_else(|| {
            SyncError::RemoteApi("Google did not return a refresh token".to_string())
        })?;

        Ok(AuthorizationGrant {
            access_token: token.access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            scopes: token
                .scope
                .as_deref()
                .map(Scope::parse_list)
                .unwrap_or_default(),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, SyncError> {
        let token = self
            .post_token_form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        Ok(RefreshedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            refresh_token: token.refresh_token,
        })
    }

    async fn revoke(&self, token: &str) -> Result<(), SyncError> {
        let response = self
            .http
            .post(&self.revoke_url)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| SyncError::RemoteApi(format!("Revocation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::RemoteApi(describe_token_error(status, &body)));
        }

        tracing::info!("Google token revocation successful");
        Ok(())
    }
}
