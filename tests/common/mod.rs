// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use directory_sync::config::Config;
use directory_sync::db::{CredentialStore, FirestoreDb, MemoryStore};
use directory_sync::error::SyncError;
use directory_sync::error::AppError;
use directory_sync::models::{
    AccessToken, AuditRecord, AuthorizationGrant, ContactRepresentation, Credential,
    RefreshedToken, Scope,
};
use directory_sync::routes::create_router;
use directory_sync::services::kms::encrypt_tokens;
use directory_sync::services::{
    AuditRecorder, KmsService, OAuthProvider, RemoteContact, RemoteDirectoryClient, TokenCache,
};
use directory_sync::{AppState, Backends};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Unique id for test isolation against a shared emulator.
#[allow(dead_code)]
pub fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

// ─── Fake OAuth Provider ─────────────────────────────────────

/// Token endpoint double. Refreshes hand out `fresh-token-N`.
#[derive(Default)]
pub struct FakeOAuth {
    pub refresh_calls: AtomicUsize,
    pub revoke_calls: AtomicUsize,
    pub exchange_calls: AtomicUsize,
    refresh_error: Mutex<Option<SyncError>>,
    revoke_error: Mutex<Option<SyncError>>,
    rotate_refresh_token: Mutex<bool>,
}

#[allow(dead_code)]
impl FakeOAuth {
    pub fn fail_refresh(&self, error: SyncError) {
        *self.refresh_error.lock().unwrap() = Some(error);
    }

    pub fn fail_revoke(&self, error: SyncError) {
        *self.revoke_error.lock().unwrap() = Some(error);
    }

    pub fn rotate_refresh_tokens(&self) {
        *self.rotate_refresh_token.lock().unwrap() = true;
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn revocations(&self) -> usize {
        self.revoke_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuthProvider for FakeOAuth {
    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<AuthorizationGrant, SyncError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        if code == "bad-code" {
            return Err(SyncError::RemoteApi("invalid_grant: Bad code".to_string()));
        }
        Ok(AuthorizationGrant {
            access_token: format!("access-for-{}", code),
            refresh_token: format!("refresh-for-{}", code),
            expires_at: Utc::now() + Duration::hours(1),
            scopes: BTreeSet::from([Scope::Directory, Scope::Calendar]),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedToken, SyncError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        // Widen the window for concurrent callers.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        if let Some(error) = self.refresh_error.lock().unwrap().clone() {
            return Err(error);
        }

        let rotate = *self.rotate_refresh_token.lock().unwrap();
        Ok(RefreshedToken {
            access_token: format!("fresh-token-{}", n),
            expires_at: Utc::now() + Duration::hours(1),
            refresh_token: rotate.then(|| format!("rotated-refresh-{}", n)),
        })
    }

    async fn revoke(&self, _token: &str) -> Result<(), SyncError> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        match self.revoke_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

// ─── Fake Directory ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Get,
    Create,
    Update,
    Delete,
}

/// In-memory remote directory with call counters and failure injection.
#[derive(Default)]
pub struct FakeDirectory {
    /// resource id → (etag version, display name)
    contacts: Mutex<HashMap<String, (u32, String)>>,
    calls: Mutex<HashMap<Call, usize>>,
    /// Display names whose create/update fail with `RemoteApi`
    failing_names: Mutex<HashSet<String>>,
    /// Resource ids handed out by the next creates, before falling back
    /// to `people/cN`
    next_ids: Mutex<VecDeque<String>>,
    stale_etags: Mutex<bool>,
    delete_error: Mutex<Option<SyncError>>,
    /// Access tokens seen, in call order
    pub tokens_seen: Mutex<Vec<String>>,
    /// Display names in create/update order
    pub written_names: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeDirectory {
    pub fn calls(&self, call: Call) -> usize {
        self.calls.lock().unwrap().get(&call).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn fail_for_name(&self, display_name: &str) {
        self.failing_names
            .lock()
            .unwrap()
            .insert(display_name.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_names.lock().unwrap().clear();
        *self.stale_etags.lock().unwrap() = false;
        *self.delete_error.lock().unwrap() = None;
    }

    pub fn assign_next_id(&self, resource_id: &str) {
        self.next_ids
            .lock()
            .unwrap()
            .push_back(resource_id.to_string());
    }

    pub fn stale_etags(&self) {
        *self.stale_etags.lock().unwrap() = true;
    }

    pub fn fail_delete(&self, error: SyncError) {
        *self.delete_error.lock().unwrap() = Some(error);
    }

    pub fn contains(&self, resource_id: &str) -> bool {
        self.contacts.lock().unwrap().contains_key(resource_id)
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.lock().unwrap().len()
    }

    fn record(&self, call: Call, token: &AccessToken) {
        *self.calls.lock().unwrap().entry(call).or_default() += 1;
        self.tokens_seen
            .lock()
            .unwrap()
            .push(token.secret().to_string());
    }

    fn check_name(&self, contact: &ContactRepresentation) -> Result<(), SyncError> {
        self.written_names
            .lock()
            .unwrap()
            .push(contact.display_name.clone());
        if self
            .failing_names
            .lock()
            .unwrap()
            .contains(&contact.display_name)
        {
            return Err(SyncError::RemoteApi("HTTP 503: backend unavailable".to_string()));
        }
        Ok(())
    }
}

fn etag(version: u32) -> String {
    format!("etag-{}", version)
}

#[async_trait]
impl RemoteDirectoryClient for FakeDirectory {
    async fn get(
        &self,
        token: &AccessToken,
        resource_id: &str,
    ) -> Result<RemoteContact, SyncError> {
        self.record(Call::Get, token);
        let contacts = self.contacts.lock().unwrap();
        let (version, _) = contacts
            .get(resource_id)
            .ok_or_else(|| SyncError::RemoteNotFound(resource_id.to_string()))?;
        Ok(RemoteContact {
            resource_id: resource_id.to_string(),
            etag: etag(*version),
        })
    }

    async fn create(
        &self,
        token: &AccessToken,
        contact: &ContactRepresentation,
    ) -> Result<RemoteContact, SyncError> {
        self.record(Call::Create, token);
        self.check_name(contact)?;

        let resource_id = self
            .next_ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("people/c{}", self.calls(Call::Create)));
        let mut contacts = self.contacts.lock().unwrap();
        contacts.insert(resource_id.clone(), (1, contact.display_name.clone()));
        Ok(RemoteContact {
            resource_id,
            etag: etag(1),
        })
    }

    async fn update(
        &self,
        token: &AccessToken,
        resource_id: &str,
        contact: &ContactRepresentation,
        precondition: &str,
    ) -> Result<RemoteContact, SyncError> {
        self.record(Call::Update, token);
        self.check_name(contact)?;

        let mut contacts = self.contacts.lock().unwrap();
        let entry = contacts
            .get_mut(resource_id)
            .ok_or_else(|| SyncError::RemoteNotFound(resource_id.to_string()))?;

        if *self.stale_etags.lock().unwrap() || precondition != etag(entry.0) {
            return Err(SyncError::RemotePreconditionFailed);
        }

        entry.0 += 1;
        entry.1 = contact.display_name.clone();
        Ok(RemoteContact {
            resource_id: resource_id.to_string(),
            etag: etag(entry.0),
        })
    }

    async fn delete(&self, token: &AccessToken, resource_id: &str) -> Result<(), SyncError> {
        self.record(Call::Delete, token);
        if let Some(error) = self.delete_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.contacts
            .lock()
            .unwrap()
            .remove(resource_id)
            .map(|_| ())
            .ok_or_else(|| SyncError::RemoteNotFound(resource_id.to_string()))
    }
}

// ─── Failing Audit Log ───────────────────────────────────────

/// Audit recorder whose every append fails.
#[derive(Default)]
pub struct FailingAudit {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl AuditRecorder for FailingAudit {
    async fn append(&self, _record: &AuditRecord) -> Result<(), AppError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Database("audit_log unavailable".to_string()))
    }
}

// ─── Test App ────────────────────────────────────────────────

/// Everything a test needs to drive and inspect the service.
#[allow(dead_code)]
pub struct TestHarness {
    pub state: Arc<AppState>,
    pub store: MemoryStore,
    pub oauth: Arc<FakeOAuth>,
    pub directory: Arc<FakeDirectory>,
    pub token_cache: TokenCache,
}

#[allow(dead_code)]
impl TestHarness {
    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }

    /// Another service instance over the same store and remotes, with its
    /// own token cache and refresh locks.
    pub fn second_instance(&self) -> Arc<AppState> {
        let backends = Backends::single_store(
            self.store.clone(),
            self.oauth.clone(),
            self.directory.clone(),
        );
        Arc::new(AppState::new(
            Config::test_default(),
            backends,
            KmsService::new_mock(),
            Arc::new(dashmap::DashMap::new()),
            Arc::new(dashmap::DashMap::new()),
        ))
    }

    /// Store an active credential directly, bypassing the token cache.
    pub async fn seed_credential(&self, principal_id: &str, expires_at: DateTime<Utc>) {
        let (access, refresh) = encrypt_tokens(
            &KmsService::new_mock(),
            "stored-access",
            "stored-refresh",
            principal_id,
        )
        .await
        .unwrap();

        let credential = Credential {
            principal_id: principal_id.to_string(),
            access_token_encrypted: access,
            refresh_token_encrypted: refresh,
            expires_at,
            scopes: BTreeSet::from([Scope::Directory]),
            active: true,
            last_error: None,
            created_at: Utc::now(),
            refreshed_at: None,
            revoked_at: None,
        };
        self.store.put_credential(&credential).await.unwrap();
    }

    /// Credential that stays valid for the whole test.
    pub async fn connect(&self, principal_id: &str) {
        self.seed_credential(principal_id, Utc::now() + Duration::hours(1))
            .await;
    }

    pub async fn credential(&self, principal_id: &str) -> Credential {
        self.store
            .get_credential(principal_id)
            .await
            .unwrap()
            .expect("credential should exist")
    }
}

/// Create a test app backed by the memory store, mock KMS and fakes.
#[allow(dead_code)]
pub fn create_test_app() -> TestHarness {
    build_harness(None)
}

/// Same as [`create_test_app`] but audit records go to `audit`.
#[allow(dead_code)]
pub fn create_test_app_with_audit(audit: Arc<dyn AuditRecorder>) -> TestHarness {
    build_harness(Some(audit))
}

fn build_harness(audit: Option<Arc<dyn AuditRecorder>>) -> TestHarness {
    let store = MemoryStore::new();
    let oauth = Arc::new(FakeOAuth::default());
    let directory = Arc::new(FakeDirectory::default());
    let token_cache: TokenCache = Arc::new(dashmap::DashMap::new());

    let mut backends = Backends::single_store(store.clone(), oauth.clone(), directory.clone());
    if let Some(audit) = audit {
        backends.audit = audit;
    }
    let state = Arc::new(AppState::new(
        Config::test_default(),
        backends,
        KmsService::new_mock(),
        token_cache.clone(),
        Arc::new(dashmap::DashMap::new()),
    ));

    TestHarness {
        state,
        store,
        oauth,
        directory,
        token_cache,
    }
}

/// Create a test JWT token.
#[allow(dead_code)]
pub fn create_test_jwt(principal_id: &str, signing_key: &[u8]) -> String {
    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
        iat: usize,
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;

    let claims = Claims {
        sub: principal_id.to_string(),
        exp: now + 3600,
        iat: now,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}
