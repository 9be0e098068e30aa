// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth credential lifecycle: issuance, refresh and revocation.
//!
//! A credential refresh failure is terminal: the row is marked inactive and
//! the principal has to go through the authorization-code flow again, which
//! writes a brand new credential.

use crate::db::CredentialStore;
use crate::error::SyncError;
use crate::models::{AccessToken, AuthorizationGrant, Credential, RefreshedToken};
use crate::services::kms::{encrypt_tokens, KmsService};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Provider token endpoints.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// One-shot authorization-code exchange.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AuthorizationGrant, SyncError>;

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, SyncError>;

    async fn revoke(&self, token: &str) -> Result<(), SyncError>;
}

/// Decrypted access token together with the credential it came from.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
    /// `created_at` of the issuing credential; a re-authorization elsewhere
    /// writes a new row and orphans this entry.
    issued_at: DateTime<Utc>,
}

/// Shared token cache, keyed by principal id.
pub type TokenCache = Arc<DashMap<String, CachedToken>>;

/// Shared per-principal refresh locks.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// True if a token expiring at `expires_at` can still be used at `now`.
fn is_fresh(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < expires_at
}

/// Produces valid access tokens for principals.
///
/// - The credential row is read on every call, so a revocation or
///   deactivation by any instance takes effect immediately
/// - Decrypted access tokens are cached in memory until they enter the
///   refresh margin, which only saves the KMS decrypt
/// - Refresh, re-authorization and revocation for one principal are
///   serialized by a per-principal mutex
#[derive(Clone)]
pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    provider: Arc<dyn OAuthProvider>,
    kms: KmsService,
    token_cache: TokenCache,
    refresh_locks: RefreshLocks,
}

impl TokenManager {
    /// The cache and lock maps are owned by the caller so every manager
    /// in the process shares them.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        provider: Arc<dyn OAuthProvider>,
        kms: KmsService,
        token_cache: TokenCache,
        refresh_locks: RefreshLocks,
    ) -> Self {
        Self {
            store,
            provider,
            kms,
            token_cache,
            refresh_locks,
        }
    }

    pub fn provider(&self) -> &Arc<dyn OAuthProvider> {
        &self.provider
    }

    fn principal_lock(&self, principal_id: &str) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(principal_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Cached token for an active credential, if it was issued under that
    /// same credential and is outside the refresh margin.
    fn cached(&self, credential: &Credential, now: DateTime<Utc>) -> Option<AccessToken> {
        self.token_cache
            .get(&credential.principal_id)
            .filter(|cached| {
                cached.issued_at == credential.created_at && is_fresh(cached.expires_at, now)
            })
            .map(|cached| AccessToken::new(cached.access_token.clone()))
    }

    fn cache(&self, credential: &Credential, access_token: &str) {
        self.token_cache.insert(
            credential.principal_id.clone(),
            CachedToken {
                access_token: access_token.to_string(),
                expires_at: credential.expires_at,
                issued_at: credential.created_at,
            },
        );
    }

    /// Load the principal's credential, failing fast when it is missing or
    /// inactive.
    async fn load_active(&self, principal_id: &str) -> Result<Credential, SyncError> {
        let credential = self
            .store
            .get_credential(principal_id)
            .await?
            .ok_or(SyncError::NoCredential)?;

        if !credential.active {
            self.token_cache.remove(principal_id);
            return Err(inactive_error(&credential));
        }
        Ok(credential)
    }

    // ─── Issuance ────────────────────────────────────────────────────────────

    /// Store the output of an authorization-code exchange as the principal's
    /// credential, replacing any previous row (active or not).
    pub async fn store_authorization(
        &self,
        principal_id: &str,
        grant: AuthorizationGrant,
    ) -> Result<Credential, SyncError> {
        let lock = self.principal_lock(principal_id);
        let _guard = lock.lock().await;

        let (enc_access, enc_refresh) = encrypt_tokens(
            &self.kms,
            &grant.access_token,
            &grant.refresh_token,
            principal_id,
        )
        .await?;

        let credential = Credential {
            principal_id: principal_id.to_string(),
            access_token_encrypted: enc_access,
            refresh_token_encrypted: enc_refresh,
            expires_at: grant.expires_at,
            scopes: grant.scopes,
            active: true,
            last_error: None,
            created_at: Utc::now(),
            refreshed_at: None,
            revoked_at: None,
        };

        self.store.put_credential(&credential).await?;
        self.cache(&credential, &grant.access_token);

        tracing::info!(
            principal_id,
            scopes = ?credential.scopes,
            "Google credential stored"
        );
        Ok(credential)
    }

    /// Raw credential row, for status reporting.
    pub async fn credential(&self, principal_id: &str) -> Result<Option<Credential>, SyncError> {
        Ok(self.store.get_credential(principal_id).await?)
    }

    // ─── Access Tokens ───────────────────────────────────────────────────────

    /// Get a valid (not about to expire) access token for the principal.
    ///
    /// 1. Load the credential; inactive or missing fails fast
    /// 2. Cache hit for that credential outside the refresh margin → return it
    /// 3. Take the principal's lock, reload and re-check the cache
    /// 4. Stored token still fresh → cache and return it
    /// 5. Otherwise refresh
    pub async fn get_valid_access_token(
        &self,
        principal_id: &str,
    ) -> Result<AccessToken, SyncError> {
        let credential = self.load_active(principal_id).await?;
        if let Some(token) = self.cached(&credential, Utc::now()) {
            return Ok(token);
        }

        let lock = self.principal_lock(principal_id);
        let _guard = lock.lock().await;

        // Another task may have refreshed or revoked while we were waiting.
        let credential = self.load_active(principal_id).await?;
        if let Some(token) = self.cached(&credential, Utc::now()) {
            return Ok(token);
        }

        if is_fresh(credential.expires_at, Utc::now()) {
            let access_token = self
                .kms
                .decrypt(&credential.access_token_encrypted, principal_id.as_bytes())
                .await?;
            self.cache(&credential, &access_token);
            return Ok(AccessToken::new(access_token));
        }

        self.refresh(credential).await
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Any failure deactivates the credential. Callers should hold the
    /// principal's lock; [`Self::get_valid_access_token`] does.
    pub async fn refresh(&self, credential: Credential) -> Result<AccessToken, SyncError> {
        let principal_id = credential.principal_id.clone();
        tracing::info!(principal_id = %principal_id, "Access token expiring, refreshing");

        let refresh_token = match self
            .kms
            .decrypt(&credential.refresh_token_encrypted, principal_id.as_bytes())
            .await
        {
            Ok(token) => token,
            Err(e) => {
                return Err(self
                    .deactivate(credential, format!("Stored refresh token unreadable: {}", e))
                    .await)
            }
        };

        match self.provider.refresh(&refresh_token).await {
            Ok(refreshed) => self.apply_refresh(credential, refreshed).await,
            Err(e) => {
                if is_invalid_grant(&e) {
                    if let Some(token) = self.refreshed_elsewhere(&credential).await {
                        return Ok(token);
                    }
                }
                Err(self.deactivate(credential, e.to_string()).await)
            }
        }
    }

    async fn apply_refresh(
        &self,
        mut credential: Credential,
        refreshed: RefreshedToken,
    ) -> Result<AccessToken, SyncError> {
        let principal_id = credential.principal_id.clone();
        let aad = principal_id.as_bytes();

        credential.access_token_encrypted = self.kms.encrypt(&refreshed.access_token, aad).await?;
        if let Some(rotated) = &refreshed.refresh_token {
            credential.refresh_token_encrypted = self.kms.encrypt(rotated, aad).await?;
        }
        credential.expires_at = refreshed.expires_at;
        credential.last_error = None;
        credential.refreshed_at = Some(Utc::now());

        self.store.put_credential(&credential).await?;
        self.cache(&credential, &refreshed.access_token);

        tracing::info!(principal_id = %principal_id, "Token refreshed and cached");
        Ok(AccessToken::new(refreshed.access_token))
    }

    /// After `invalid_grant`, check whether another instance already
    /// refreshed and stored a newer token.
    async fn refreshed_elsewhere(&self, stale: &Credential) -> Option<AccessToken> {
        let principal_id = stale.principal_id.as_str();
        let current = self.store.get_credential(principal_id).await.ok()??;

        if !current.active
            || current.expires_at <= stale.expires_at
            || !is_fresh(current.expires_at, Utc::now())
        {
            return None;
        }

        tracing::info!(
            principal_id,
            "Refresh token race detected - another instance won, using their token"
        );

        let access_token = self
            .kms
            .decrypt(&current.access_token_encrypted, principal_id.as_bytes())
            .await
            .ok()?;
        self.cache(&current, &access_token);
        Some(AccessToken::new(access_token))
    }

    /// Mark the credential inactive and return the error to hand back.
    async fn deactivate(&self, mut credential: Credential, message: String) -> SyncError {
        let principal_id = credential.principal_id.clone();
        self.token_cache.remove(&principal_id);

        tracing::warn!(
            principal_id = %principal_id,
            error = %message,
            "Token refresh failed, credential deactivated"
        );

        credential.active = false;
        credential.last_error = Some(message.clone());
        if let Err(e) = self.store.put_credential(&credential).await {
            tracing::error!(
                principal_id = %principal_id,
                error = %e,
                "Failed to persist deactivated credential"
            );
        }

        SyncError::RefreshFailed(message)
    }

    // ─── Revocation ──────────────────────────────────────────────────────────

    /// Disconnect the principal.
    ///
    /// Revocation at Google is best effort. The credential is marked
    /// inactive locally whatever the remote outcome; only a local store
    /// failure is returned.
    pub async fn revoke(&self, principal_id: &str) -> Result<(), SyncError> {
        let lock = self.principal_lock(principal_id);
        let _guard = lock.lock().await;

        self.token_cache.remove(principal_id);

        let Some(mut credential) = self.store.get_credential(principal_id).await? else {
            return Ok(());
        };

        if credential.revoked_at.is_some() {
            return Ok(());
        }

        match self
            .kms
            .decrypt(&credential.refresh_token_encrypted, principal_id.as_bytes())
            .await
        {
            Ok(refresh_token) => {
                if let Err(e) = self.provider.revoke(&refresh_token).await {
                    tracing::warn!(
                        principal_id,
                        error = %e,
                        "Google revocation failed, disconnecting locally anyway"
                    );
                    credential.last_error = Some(format!("Revocation failed: {}", e));
                }
            }
            Err(e) => {
                tracing::warn!(
                    principal_id,
                    error = %e,
                    "Failed to decrypt refresh token (skipping remote revocation)"
                );
            }
        }

        credential.active = false;
        credential.revoked_at = Some(Utc::now());
        self.store.put_credential(&credential).await?;

        tracing::info!(principal_id, "Google credential revoked");
        Ok(())
    }
}

fn inactive_error(credential: &Credential) -> SyncError {
    if credential.revoked_at.is_some() {
        SyncError::NoCredential
    } else {
        SyncError::RefreshFailed(
            credential
                .last_error
                .clone()
                .unwrap_or_else(|| "credential inactive".to_string()),
        )
    }
}

fn is_invalid_grant(err: &SyncError) -> bool {
    matches!(err, SyncError::RemoteApi(msg) if msg.starts_with("invalid_grant"))
}
