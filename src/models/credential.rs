// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth credential model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Authorization scope granted by Google.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Calendar,
    Directory,
    Profile,
    FileStorage,
}

impl Scope {
    /// Scopes requested during the authorization-code flow.
    pub const REQUESTED: [&'static str; 5] = [
        "openid",
        "https://www.googleapis.com/auth/userinfo.profile",
        "https://www.googleapis.com/auth/contacts",
        "https://www.googleapis.com/auth/calendar",
        "https://www.googleapis.com/auth/drive.file",
    ];

    /// Map a Google scope string; unknown scopes yield `None`.
    pub fn from_google(scope: &str) -> Option<Self> {
        match scope {
            "https://www.googleapis.com/auth/contacts" => Some(Scope::Directory),
            "https://www.googleapis.com/auth/calendar"
            | "https://www.googleapis.com/auth/calendar.events" => Some(Scope::Calendar),
            "https://www.googleapis.com/auth/drive.file" => Some(Scope::FileStorage),
            "profile" | "email" | "https://www.googleapis.com/auth/userinfo.profile"
            | "https://www.googleapis.com/auth/userinfo.email" => Some(Scope::Profile),
            _ => None,
        }
    }

    /// Parse the space-separated `scope` field of a token response.
    pub fn parse_list(scopes: &str) -> BTreeSet<Scope> {
        scopes.split_whitespace().filter_map(Scope::from_google).collect()
    }
}

/// Bearer token handed to the directory client.
///
/// `Debug` is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Token material produced by the authorization-code exchange.
#[derive(Clone)]
pub struct AuthorizationGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub scopes: BTreeSet<Scope>,
}

/// Result of exchanging a refresh token.
#[derive(Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    /// Present only when the provider rotated the refresh token.
    pub refresh_token: Option<String>,
}

impl fmt::Debug for AuthorizationGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGrant")
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("access_token", &"***")
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Stored OAuth credential for one principal (document id = principal id).
///
/// Token fields are sealed with KMS before they are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub principal_id: String,
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64)
    pub refresh_token_encrypted: String,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
    /// Granted OAuth scopes
    #[serde(default)]
    pub scopes: BTreeSet<Scope>,
    /// False once refresh fails or the principal disconnects. Terminal.
    pub active: bool,
    /// Last refresh/revocation failure, cleared on success
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Set by an explicit disconnect
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }
}
