// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth authorization-code routes.
//!
//! `/auth/google` runs inside an ERP session and sends the user to
//! Google's consent screen. The callback arrives without a session, so
//! the principal id travels in the signed `state` parameter.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Extension, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Url;
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::services::google_oauth::authorize_url;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// How long a consent round trip may take (10 minutes).
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

/// Public routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/google/callback", get(auth_callback))
}

/// Routes that need an ERP session.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/google", get(auth_start))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    /// Must be on FRONTEND_URL's origin and under its path; anything else
    /// falls back to FRONTEND_URL.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Verified contents of the `state` parameter.
#[derive(Debug, PartialEq, Eq)]
struct OAuthState {
    principal_id: String,
    frontend_url: String,
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Start OAuth flow - redirect to Google consent screen.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .filter(|uri| is_allowed_return_url(uri, &state.config.frontend_url))
        .unwrap_or_else(|| state.config.frontend_url.clone());

    let oauth_state = sign_state(
        &user.principal_id,
        &frontend_url,
        now_millis()?,
        &state.config.oauth_state_key,
    )?;

    let auth_url = authorize_url(
        &state.config.google_client_id,
        &state.config.google_redirect_uri(),
        &oauth_state,
    );

    tracing::info!(
        principal_id = %user.principal_id,
        frontend_url = %frontend_url,
        "Starting OAuth flow, redirecting to Google"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens and store the credential.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let Some(oauth_state) =
        verify_state(&params.state, &state.config.oauth_state_key, now_millis()?)
    else {
        tracing::warn!("Invalid, expired or tampered state parameter");
        return Ok(redirect_with_error(&state.config.frontend_url, "invalid_state"));
    };

    let OAuthState {
        principal_id,
        frontend_url,
    } = oauth_state;

    // Check for OAuth errors (e.g. user denied consent)
    if let Some(error) = params.error {
        tracing::warn!(principal_id = %principal_id, error = %error, "OAuth error from Google");
        return Ok(redirect_with_error(&frontend_url, &error));
    }

    let Some(code) = params.code else {
        return Ok(redirect_with_error(&frontend_url, "missing_code"));
    };

    tracing::info!(principal_id = %principal_id, "Exchanging authorization code for tokens");

    let grant = match state
        .tokens
        .provider()
        .exchange_code(&code, &state.config.google_redirect_uri())
        .await
    {
        Ok(grant) => grant,
        Err(e) => {
            tracing::warn!(principal_id = %principal_id, error = %e, "Code exchange failed");
            return Ok(redirect_with_error(&frontend_url, "exchange_failed"));
        }
    };

    state.tokens.store_authorization(&principal_id, grant).await?;

    Ok(Redirect::temporary(&format!(
        "{}?google=connected",
        frontend_url
    )))
}

/// True if `candidate` has the frontend's scheme, host and port, and a
/// path at or below the frontend's path.
fn is_allowed_return_url(candidate: &str, frontend_url: &str) -> bool {
    let (Ok(candidate), Ok(frontend)) = (Url::parse(candidate), Url::parse(frontend_url)) else {
        return false;
    };
    if candidate.origin() != frontend.origin() {
        return false;
    }

    let base = frontend.path().trim_end_matches('/');
    let path = candidate.path();
    base.is_empty() || path == base || path.starts_with(&format!("{}/", base))
}

fn redirect_with_error(frontend_url: &str, error: &str) -> Redirect {
    Redirect::temporary(&format!(
        "{}?error={}",
        frontend_url,
        urlencoding::encode(error)
    ))
}

/// Build the signed state: base64url("principal|frontend|ts_hex|sig_hex").
///
/// The principal id and URL are percent-encoded so neither can contain
/// the separator.
fn sign_state(
    principal_id: &str,
    frontend_url: &str,
    timestamp_ms: u128,
    secret: &[u8],
) -> Result<String> {
    let payload = format!(
        "{}|{}|{:x}",
        urlencoding::encode(principal_id),
        urlencoding::encode(frontend_url),
        timestamp_ms
    );

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify signature and age of the state parameter.
fn verify_state(state: &str, secret: &[u8], now_ms: u128) -> Option<OAuthState> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    let (payload, signature_hex) = state_str.rsplit_once('|')?;
    let signature = hex::decode(signature_hex).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let mut parts = payload.splitn(3, '|');
    let principal_id = urlencoding::decode(parts.next()?).ok()?.into_owned();
    let frontend_url = urlencoding::decode(parts.next()?).ok()?.into_owned();
    let timestamp_ms = u128::from_str_radix(parts.next()?, 16).ok()?;

    if now_ms.saturating_sub(timestamp_ms) > STATE_MAX_AGE_MS || principal_id.is_empty() {
        return None;
    }

    Some(OAuthState {
        principal_id,
        frontend_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"secret_key";
    const NOW: u128 = 1_760_000_000_000;

    #[test]
    fn test_state_roundtrip() {
        let signed = sign_state("user|42", "https://erp.example.com/settings", NOW, SECRET).unwrap();

        assert_eq!(
            verify_state(&signed, SECRET, NOW + 1000),
            Some(OAuthState {
                principal_id: "user|42".to_string(),
                frontend_url: "https://erp.example.com/settings".to_string(),
            })
        );
    }

    #[test]
    fn test_state_wrong_secret() {
        let signed = sign_state("u1", "https://erp.example.com", NOW, SECRET).unwrap();
        assert_eq!(verify_state(&signed, b"other_key", NOW), None);
    }

    #[test]
    fn test_state_expired() {
        let signed = sign_state("u1", "https://erp.example.com", NOW, SECRET).unwrap();
        assert_eq!(
            verify_state(&signed, SECRET, NOW + STATE_MAX_AGE_MS + 1),
            None
        );
    }

    #[test]
    fn test_state_tampered_principal() {
        let signed = sign_state("u1", "https://erp.example.com", NOW, SECRET).unwrap();
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&signed).unwrap()).unwrap();
        let forged = URL_SAFE_NO_PAD.encode(decoded.replacen("u1", "u2", 1));

        assert_eq!(verify_state(&forged, SECRET, NOW), None);
    }

    #[test]
    fn test_return_url_same_origin() {
        let frontend = "https://erp.example.com";
        assert!(is_allowed_return_url("https://erp.example.com", frontend));
        assert!(is_allowed_return_url(
            "https://erp.example.com/settings?tab=google",
            frontend
        ));
    }

    #[test]
    fn test_return_url_rejects_look_alikes() {
        let frontend = "https://erp.example.com";
        for bad in [
            "https://erp.example.com.evil.io/x",
            "https://erp.example.com@evil.io/",
            "http://erp.example.com/settings",
            "https://erp.example.com:8443/",
            "//evil.io",
            "settings",
        ] {
            assert!(!is_allowed_return_url(bad, frontend), "{} accepted", bad);
        }
    }

    #[test]
    fn test_return_url_respects_frontend_path() {
        let frontend = "https://example.com/erp/";
        assert!(is_allowed_return_url("https://example.com/erp", frontend));
        assert!(is_allowed_return_url("https://example.com/erp/settings", frontend));
        assert!(!is_allowed_return_url("https://example.com/erpx", frontend));
        assert!(!is_allowed_return_url("https://example.com/other", frontend));
    }

    #[test]
    fn test_state_garbage() {
        assert_eq!(verify_state("not base64!", SECRET, NOW), None);
        assert_eq!(
            verify_state(&URL_SAFE_NO_PAD.encode("a|b"), SECRET, NOW),
            None
        );
    }
}
