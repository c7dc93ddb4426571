//! `argile serve` -- HTTP JSON API for the parcours engine.
//!
//! Exposes journey sync, progression and the webhooks as an async HTTP
//! service using `axum` + `tokio`.
//!
//! - CORS headers on all responses (permissive for local dev)
//! - Request tracing via `tower-http`
//! - Optional API key authentication via ARGILE_API_KEY
//!
//! Endpoints:
//! - GET  /health                                 - Server status (exempt from auth)
//! - GET  /parcours/{applicant_id}                - Journey and case records
//! - POST /parcours/{applicant_id}/sync           - Sync every step
//! - POST /parcours/{applicant_id}/sync/{step}    - Sync one step
//! - POST /parcours/{applicant_id}/progress       - Advance a validated step
//! - POST /parcours/{applicant_id}/dossiers/{step} - Attach a DS dossier to a step
//! - POST /webhooks/ds                            - DS notification by dossier number
//! - POST /webhooks/email                         - Email provider events
//! - POST /envelope/decrypt                       - Decrypt a URL-fragment envelope
//!
//! Every route except /health answers `{success, data?, error?}`.

mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use argile_core::EnvelopeError;
use argile_parcours::{
    DossierSource, DsError, GraphqlDossierSource, ParcoursEngine, Settings, StaticDossierSource,
    SystemClock,
};
use argile_storage::MemoryStorage;

use self::handlers::{
    handle_decrypt_envelope, handle_ds_webhook, handle_email_webhook, handle_get_journey,
    handle_health, handle_not_found, handle_progress, handle_register_dossier, handle_sync_all,
    handle_sync_step,
};
use self::middleware::auth_middleware;
use self::state::AppState;

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Build the router over an already-wired state.
pub(crate) fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/parcours/{applicant_id}", get(handle_get_journey))
        .route("/parcours/{applicant_id}/sync", post(handle_sync_all))
        .route(
            "/parcours/{applicant_id}/sync/{step}",
            post(handle_sync_step),
        )
        .route("/parcours/{applicant_id}/progress", post(handle_progress))
        .route(
            "/parcours/{applicant_id}/dossiers/{step}",
            post(handle_register_dossier),
        )
        .route("/webhooks/ds", post(handle_ds_webhook))
        .route("/webhooks/email", post(handle_email_webhook))
        .route("/envelope/decrypt", post(handle_decrypt_envelope))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server on the given port.
///
/// Without a DS API token the server runs against an empty static dossier
/// source: every submitted dossier reads as "not found" and syncs are
/// no-ops.
pub async fn start_server(port: u16, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let source: Arc<dyn DossierSource> = match GraphqlDossierSource::new(&settings.ds) {
        Ok(source) => Arc::new(source),
        Err(DsError::Config(reason)) => {
            tracing::warn!(%reason, "DS API not configured, using an empty dossier source");
            Arc::new(StaticDossierSource::new())
        }
        Err(e) => return Err(e.into()),
    };

    let cipher = match settings.envelope_cipher() {
        Ok(cipher) => Some(cipher),
        Err(EnvelopeError::MissingKey(_)) => {
            tracing::warn!("ENCRYPTION_KEY not set, /envelope/decrypt is disabled");
            None
        }
        Err(e) => return Err(format!("invalid ENCRYPTION_KEY: {}", e).into()),
    };

    let api_key = settings.server.api_key.clone().filter(|k| !k.is_empty());
    if api_key.is_some() {
        eprintln!("API key authentication enabled");
    }

    let engine = ParcoursEngine::new(
        Arc::new(MemoryStorage::new()),
        source,
        Arc::new(SystemClock),
        &settings.ds,
    );
    let state = Arc::new(AppState {
        engine,
        cipher,
        api_key,
    });

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("Argile parcours API listening on http://0.0.0.0:{}", port);
    tracing::info!(port, "server started");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    eprintln!("\nServer shut down.");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    eprintln!("\nReceived shutdown signal...");
}
