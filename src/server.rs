//!
//! digicard HTTP server
//! --------------------
//! Builds the shared `AppState`, mounts the JSON API and page routes behind the
//! access gate and serves them with axum.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::{get, post};
use axum::{middleware, Router};
use tracing::info;

use crate::accounts::CredentialStore;
use crate::config::Settings;
use crate::documents::DocumentAccessor;
use crate::identity::{access_gate, CookiePolicy, CredentialsProvider, SessionManager, TokenService};
use crate::security::PasswordHasher;
use crate::storage::blob::DiskBlobStore;
use crate::storage::SharedStore;

mod auth_routes;
mod document_routes;
mod pages;
mod profile_routes;

/// Room for multipart framing and the text fields around the file itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub accounts: CredentialStore,
    pub documents: DocumentAccessor,
    pub sessions: SessionManager,
    pub provider: CredentialsProvider,
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(state: &AppState) -> Self { state.sessions.clone() }
}

impl AppState {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        Self::with_hasher(settings, PasswordHasher::default())
    }

    /// Opens the store and blob folder under `settings.data_dir`.
    pub fn with_hasher(settings: &Settings, hasher: PasswordHasher) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&settings.data_dir)
            .with_context(|| format!("Failed to create or access data dir: {}", settings.data_dir.display()))?;
        let store = SharedStore::new(&settings.data_dir)
            .with_context(|| format!("Failed to open store under {}", settings.data_dir.display()))?;
        let blobs = DiskBlobStore::new(settings.uploads_dir())
            .with_context(|| format!("Failed to open uploads dir {}", settings.uploads_dir().display()))?;
        let tokens = TokenService::new(&settings.session_secret, settings.session_ttl)?;
        let cookies = if settings.production { CookiePolicy::production() } else { CookiePolicy::default() };
        Ok(Self::from_parts(store, Arc::new(blobs), hasher, SessionManager::new(tokens, cookies), settings.max_upload_bytes))
    }

    pub fn from_parts(
        store: SharedStore,
        blobs: Arc<dyn crate::storage::blob::BlobStore>,
        hasher: PasswordHasher,
        sessions: SessionManager,
        max_upload_bytes: u64,
    ) -> Self {
        let accounts = CredentialStore::new(store.clone(), hasher);
        let documents = DocumentAccessor::new(store.clone(), blobs, max_upload_bytes);
        let provider = CredentialsProvider::new(accounts.clone(), sessions.clone());
        Self { store, accounts, documents, sessions, provider }
    }
}

pub fn router(state: AppState) -> Router {
    let upload_limit = (state.documents.max_upload_bytes() + MULTIPART_OVERHEAD) as usize;
    let api = Router::new()
        .route("/api/auth/register", post(auth_routes::register))
        .route("/api/auth/login", post(auth_routes::login))
        .route("/api/auth/logout", post(auth_routes::logout))
        .route("/api/auth/callback/credentials", post(auth_routes::provider_sign_in))
        .route("/api/auth/session", get(auth_routes::session))
        .route("/api/auth/signout", post(auth_routes::provider_sign_out))
        .route("/api/documents", get(document_routes::list).post(document_routes::create))
        .route(
            "/api/documents/upload",
            post(document_routes::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/documents/{id}", get(document_routes::get_one).delete(document_routes::delete))
        .route("/api/documents/{id}/file", get(document_routes::file))
        .route("/api/profile", get(profile_routes::get_profile).put(profile_routes::update_profile))
        .route("/api/profile/password", post(profile_routes::change_password));

    let pages = Router::new()
        .route("/", get(pages::home))
        .route("/login", get(pages::login))
        .route("/register", get(pages::register))
        .route("/dashboard", get(pages::dashboard))
        .route("/documents", get(pages::documents))
        .route("/profile", get(pages::profile))
        .route("/settings", get(pages::settings));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(api)
        .merge(pages)
        .layer(middleware::from_fn_with_state(state.sessions.clone(), access_gate))
        .with_state(state)
}

/// Serve on an already-bound listener until the process stops.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn log_startup(settings: &Settings) {
    let cwd = std::env::current_dir().ok();
    info!(
        target: "startup",
        "digicard starting: cwd={:?}, data_dir={:?}, bind={}, session_ttl={}s, production={}, max_upload_bytes={}",
        cwd,
        settings.data_dir,
        settings.bind_addr(),
        settings.session_ttl.as_secs(),
        settings.production,
        settings.max_upload_bytes
    );
}

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    log_startup(&settings);
    let state = AppState::new(&settings)?;
    info!(
        target: "startup",
        "store loaded: accounts={}, documents={}",
        state.store.account_count(),
        state.store.document_count()
    );
    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("Failed to bind {}", addr))?;
    info!("Starting server on {}", addr);
    serve(listener, state).await
}
