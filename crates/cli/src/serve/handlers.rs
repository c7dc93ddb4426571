//! HTTP route handlers. Each one answers the `ActionResult` shape.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use argile_core::envelope::from_fragment;
use argile_core::{EnvelopeError, Step};
use argile_parcours::{ActionResult, DsError, EmailWebhookPayload, ParcoursError};
use argile_storage::StorageError;

use super::state::AppState;

/// Construct an `ActionResult` error response with the given status code.
pub(crate) fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(ActionResult::<()>::err(message)))
}

fn status_for(error: &ParcoursError) -> StatusCode {
    match error {
        ParcoursError::JourneyNotFound(_) | ParcoursError::CaseNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        ParcoursError::External(DsError::NotFound { .. }) => StatusCode::NOT_FOUND,
        ParcoursError::External(_) => StatusCode::BAD_GATEWAY,
        ParcoursError::Envelope(
            EnvelopeError::MissingKey(_)
            | EnvelopeError::InvalidKeyEncoding
            | EnvelopeError::InvalidKeyLength { .. },
        ) => StatusCode::SERVICE_UNAVAILABLE,
        ParcoursError::Envelope(_) => StatusCode::BAD_REQUEST,
        ParcoursError::DsNumberTaken { .. }
        | ParcoursError::Storage(StorageError::DsNumberTaken { .. }) => StatusCode::CONFLICT,
        ParcoursError::Storage(_) | ParcoursError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Turn a service result into a response, logging failures.
fn respond<T: Serialize>(result: Result<T, ParcoursError>) -> Response {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => status_for(e),
    };
    (status, Json(ActionResult::from(result))).into_response()
}

fn parse_step(raw: &str) -> Result<Step, Response> {
    raw.parse::<Step>()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "Étape inconnue").into_response())
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "Ressource introuvable")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// GET /parcours/{applicant_id}
pub(crate) async fn handle_get_journey(
    State(state): State<Arc<AppState>>,
    Path(applicant_id): Path<String>,
) -> Response {
    respond(state.engine.journey_overview(&applicant_id).await)
}

/// POST /parcours/{applicant_id}/sync
pub(crate) async fn handle_sync_all(
    State(state): State<Arc<AppState>>,
    Path(applicant_id): Path<String>,
) -> Response {
    respond(state.engine.sync().sync_all(&applicant_id).await)
}

/// POST /parcours/{applicant_id}/sync/{step}
pub(crate) async fn handle_sync_step(
    State(state): State<Arc<AppState>>,
    Path((applicant_id, step)): Path<(String, String)>,
) -> Response {
    let step = match parse_step(&step) {
        Ok(s) => s,
        Err(response) => return response,
    };
    respond(state.engine.sync().sync(&applicant_id, step).await)
}

/// POST /parcours/{applicant_id}/progress
pub(crate) async fn handle_progress(
    State(state): State<Arc<AppState>>,
    Path(applicant_id): Path<String>,
) -> Response {
    respond(state.engine.progression().progress(&applicant_id).await)
}

#[derive(Deserialize)]
pub(crate) struct RegisterDossierRequest {
    ds_number: i64,
    #[serde(default)]
    ds_url: Option<String>,
}

/// POST /parcours/{applicant_id}/dossiers/{step}
pub(crate) async fn handle_register_dossier(
    State(state): State<Arc<AppState>>,
    Path((applicant_id, step)): Path<(String, String)>,
    Json(body): Json<RegisterDossierRequest>,
) -> Response {
    let step = match parse_step(&step) {
        Ok(s) => s,
        Err(response) => return response,
    };
    respond(
        state
            .engine
            .register_dossier(&applicant_id, step, body.ds_number, body.ds_url)
            .await,
    )
}

#[derive(Deserialize)]
pub(crate) struct DsWebhookRequest {
    dossier_number: i64,
}

/// POST /webhooks/ds
pub(crate) async fn handle_ds_webhook(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DsWebhookRequest>,
) -> Response {
    let number = body.dossier_number;
    respond(state.engine.sync().sync_by_ds_number(number).await)
}

/// POST /webhooks/email
pub(crate) async fn handle_email_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EmailWebhookPayload>,
) -> Response {
    respond(state.engine.tracking().process(&payload).await)
}

#[derive(Deserialize)]
pub(crate) struct DecryptRequest {
    envelope: String,
}

/// POST /envelope/decrypt
///
/// Accepts a bare envelope, a `#d=` fragment or a URL carrying one. JSON
/// plaintext is returned as JSON, anything else as a string.
pub(crate) async fn handle_decrypt_envelope(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DecryptRequest>,
) -> Response {
    let result = match &state.cipher {
        None => Err(ParcoursError::Envelope(EnvelopeError::MissingKey(
            argile_core::envelope::KEY_ENV_VAR,
        ))),
        Some(cipher) => {
            let envelope = from_fragment(&body.envelope).unwrap_or(&body.envelope);
            cipher
                .decrypt(envelope)
                .map(|plaintext| {
                    serde_json::from_str::<serde_json::Value>(&plaintext)
                        .unwrap_or(serde_json::Value::String(plaintext))
                })
                .map_err(ParcoursError::from)
        }
    };
    respond(result)
}
