// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential lifecycle: refresh margin, terminal refresh failure,
//! revocation and re-authorization.

use chrono::{Duration, Utc};
use directory_sync::db::CredentialStore;
use directory_sync::error::SyncError;
use directory_sync::models::{AuthorizationGrant, Scope};
use directory_sync::services::KmsService;
use std::collections::BTreeSet;

mod common;
use common::create_test_app;

#[tokio::test]
async fn test_token_outside_margin_is_returned_unchanged() {
    let h = create_test_app();
    h.seed_credential("u1", Utc::now() + Duration::minutes(10))
        .await;

    let token = h.state.tokens.get_valid_access_token("u1").await.unwrap();

    assert_eq!(token.secret(), "stored-access");
    assert_eq!(h.oauth.refreshes(), 0, "No refresh 10 minutes before expiry");
}

#[tokio::test]
async fn test_token_inside_margin_is_refreshed() {
    let h = create_test_app();
    h.seed_credential("u1", Utc::now() + Duration::minutes(4))
        .await;

    let token = h.state.tokens.get_valid_access_token("u1").await.unwrap();

    assert_eq!(token.secret(), "fresh-token-1");
    assert_eq!(h.oauth.refreshes(), 1);

    let credential = h.credential("u1").await;
    assert!(credential.active);
    assert!(credential.expires_at > Utc::now() + Duration::minutes(30));
    assert!(credential.refreshed_at.is_some());
    assert_eq!(credential.last_error, None);

    // Served from the cache afterwards
    let again = h.state.tokens.get_valid_access_token("u1").await.unwrap();
    assert_eq!(again.secret(), "fresh-token-1");
    assert_eq!(h.oauth.refreshes(), 1);
}

#[tokio::test]
async fn test_expired_token_is_refreshed() {
    let h = create_test_app();
    h.seed_credential("u1", Utc::now() - Duration::hours(2))
        .await;

    let token = h.state.tokens.get_valid_access_token("u1").await.unwrap();
    assert_eq!(token.secret(), "fresh-token-1");
}

#[tokio::test]
async fn test_missing_credential() {
    let h = create_test_app();

    let result = h.state.tokens.get_valid_access_token("nobody").await;
    assert_eq!(result.unwrap_err(), SyncError::NoCredential);
}

#[tokio::test]
async fn test_refresh_failure_is_terminal() {
    let h = create_test_app();
    h.seed_credential("u1", Utc::now() + Duration::minutes(1))
        .await;
    h.oauth.fail_refresh(SyncError::RemoteApi(
        "invalid_grant: Token has been expired or revoked.".to_string(),
    ));

    let err = h
        .state
        .tokens
        .get_valid_access_token("u1")
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::RefreshFailed(_)), "got {:?}", err);

    let credential = h.credential("u1").await;
    assert!(!credential.active);
    assert_eq!(
        credential.last_error.as_deref(),
        Some("Google API error: invalid_grant: Token has been expired or revoked.")
    );

    // Later calls fail fast without touching the provider
    let err = h
        .state
        .tokens
        .get_valid_access_token("u1")
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::RefreshFailed(_)));
    assert_eq!(h.oauth.refreshes(), 1);
}

#[tokio::test]
async fn test_transient_refresh_failure_also_deactivates() {
    let h = create_test_app();
    h.seed_credential("u1", Utc::now() + Duration::minutes(1))
        .await;
    h.oauth
        .fail_refresh(SyncError::RemoteApi("HTTP 503: unavailable".to_string()));

    assert!(h.state.tokens.get_valid_access_token("u1").await.is_err());
    assert!(!h.credential("u1").await.active);
}

#[tokio::test]
async fn test_reauthorization_replaces_inactive_credential() {
    let h = create_test_app();
    h.seed_credential("u1", Utc::now() + Duration::minutes(1))
        .await;
    h.oauth
        .fail_refresh(SyncError::RemoteApi("invalid_grant".to_string()));
    assert!(h.state.tokens.get_valid_access_token("u1").await.is_err());

    let grant = AuthorizationGrant {
        access_token: "new-access".to_string(),
        refresh_token: "new-refresh".to_string(),
        expires_at: Utc::now() + Duration::hours(1),
        scopes: BTreeSet::from([Scope::Directory]),
    };
    let credential = h
        .state
        .tokens
        .store_authorization("u1", grant)
        .await
        .unwrap();
    assert!(credential.active);
    assert_eq!(credential.last_error, None);

    let token = h.state.tokens.get_valid_access_token("u1").await.unwrap();
    assert_eq!(token.secret(), "new-access");
}

#[tokio::test]
async fn test_concurrent_callers_refresh_once() {
    let h = create_test_app();
    h.seed_credential("u1", Utc::now() + Duration::minutes(1))
        .await;

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let tokens = h.state.tokens.clone();
            tokio::spawn(async move { tokens.get_valid_access_token("u1").await })
        })
        .collect();

    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        assert_eq!(token.secret(), "fresh-token-1");
    }
    assert_eq!(h.oauth.refreshes(), 1);
}

#[tokio::test]
async fn test_rotated_refresh_token_is_stored() {
    let h = create_test_app();
    h.seed_credential("u1", Utc::now() + Duration::minutes(1))
        .await;
    h.oauth.rotate_refresh_tokens();

    h.state.tokens.get_valid_access_token("u1").await.unwrap();

    let credential = h.credential("u1").await;
    let refresh = KmsService::new_mock()
        .decrypt(&credential.refresh_token_encrypted, b"u1")
        .await
        .unwrap();
    assert_eq!(refresh, "rotated-refresh-1");
}

#[tokio::test]
async fn test_revoke_deactivates_and_clears_cache() {
    let h = create_test_app();
    h.connect("u1").await;
    h.state.tokens.get_valid_access_token("u1").await.unwrap();
    assert!(h.token_cache.contains_key("u1"));

    h.state.tokens.revoke("u1").await.unwrap();

    assert_eq!(h.oauth.revocations(), 1);
    assert!(!h.token_cache.contains_key("u1"));

    let credential = h.credential("u1").await;
    assert!(!credential.active);
    assert!(credential.revoked_at.is_some());

    let err = h
        .state
        .tokens
        .get_valid_access_token("u1")
        .await
        .unwrap_err();
    assert_eq!(err, SyncError::NoCredential);
}

#[tokio::test]
async fn test_revoke_succeeds_locally_when_google_fails() {
    let h = create_test_app();
    h.connect("u1").await;
    h.oauth
        .fail_revoke(SyncError::RemoteApi("HTTP 500".to_string()));

    h.state.tokens.revoke("u1").await.unwrap();

    let credential = h.credential("u1").await;
    assert!(!credential.active);
    assert!(credential.revoked_at.is_some());
}

#[tokio::test]
async fn test_revoke_without_credential_is_ok() {
    let h = create_test_app();
    h.state.tokens.revoke("nobody").await.unwrap();
    assert_eq!(h.oauth.revocations(), 0);
}

#[tokio::test]
async fn test_credential_bound_to_principal() {
    let h = create_test_app();
    h.connect("u1").await;

    // Copy u1's sealed tokens onto u2's row
    let mut stolen = h.credential("u1").await;
    stolen.principal_id = "u2".to_string();
    h.store.put_credential(&stolen).await.unwrap();

    let err = h
        .state
        .tokens
        .get_valid_access_token("u2")
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Storage(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_revocation_is_seen_by_every_instance() {
    let h = create_test_app();
    h.connect("u1").await;
    let other = h.second_instance();
    assert_eq!(
        other.tokens.get_valid_access_token("u1").await.unwrap().secret(),
        "stored-access"
    );

    h.state.tokens.revoke("u1").await.unwrap();

    let err = other
        .tokens
        .get_valid_access_token("u1")
        .await
        .unwrap_err();
    assert_eq!(err, SyncError::NoCredential);
}

#[tokio::test]
async fn test_deactivation_is_seen_by_every_instance() {
    let h = create_test_app();
    h.connect("u1").await;
    let other = h.second_instance();
    other.tokens.get_valid_access_token("u1").await.unwrap();

    let mut credential = h.credential("u1").await;
    credential.active = false;
    credential.last_error = Some("invalid_grant".to_string());
    h.store.put_credential(&credential).await.unwrap();

    let err = other
        .tokens
        .get_valid_access_token("u1")
        .await
        .unwrap_err();
    assert_eq!(err, SyncError::RefreshFailed("invalid_grant".to_string()));
}

#[tokio::test]
async fn test_reauthorization_elsewhere_replaces_cached_token() {
    let h = create_test_app();
    h.connect("u1").await;
    let other = h.second_instance();
    other.tokens.get_valid_access_token("u1").await.unwrap();

    let grant = AuthorizationGrant {
        access_token: "new-access".to_string(),
        refresh_token: "new-refresh".to_string(),
        expires_at: Utc::now() + Duration::hours(1),
        scopes: BTreeSet::from([Scope::Directory]),
    };
    h.state
        .tokens
        .store_authorization("u1", grant)
        .await
        .unwrap();

    let token = other.tokens.get_valid_access_token("u1").await.unwrap();
    assert_eq!(token.secret(), "new-access");
}
