// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Directory Sync API Server
//!
//! Mirrors ERP client and vendor contacts into each user's Google
//! Contacts and manages the Google OAuth credentials that requires.

use directory_sync::{
    config::Config,
    db::FirestoreDb,
    services::{http_client, GoogleOAuthClient, KmsService, PeopleClient},
    AppState, Backends,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Directory Sync API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Initialize KMS service
    let kms = KmsService::new(
        &config.gcp_project_id,
        &config.gcp_region,
        &config.kms_key_name,
    )
    .await
    .expect("Failed to initialize KMS service");
    tracing::info!("KMS service initialized");

    // One HTTP client for every Google call, bounded by the configured timeout
    let http = http_client(config.http_timeout_secs)?;

    let oauth = GoogleOAuthClient::new(
        http.clone(),
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    );
    let people = PeopleClient::new(http);

    // Initialize shared token cache and refresh locks
    // These are shared by every TokenManager clone within this instance
    let token_cache = Arc::new(dashmap::DashMap::new());
    let refresh_locks = Arc::new(dashmap::DashMap::new());
    tracing::info!("Token cache initialized");

    // Build shared state
    let backends = Backends::single_store(db, Arc::new(oauth), Arc::new(people));
    let state = Arc::new(AppState::new(
        config.clone(),
        backends,
        kms,
        token_cache,
        refresh_locks,
    ));

    // Build router
    let app = directory_sync::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("directory_sync=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
