//! Read access to Démarches Simplifiées (DS) dossiers.
//!
//! [`DossierSource`] is the seam the sync service depends on.
//! [`GraphqlDossierSource`] talks to the real GraphQL API and
//! [`StaticDossierSource`] serves canned snapshots.

#[cfg(feature = "graphql")]
mod graphql;
mod static_source;

#[cfg(feature = "graphql")]
pub use graphql::GraphqlDossierSource;
pub use static_source::StaticDossierSource;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use argile_core::DsStatus;

/// Errors from a dossier source.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DsError {
    /// DS does not know the dossier. Usually a draft that was never submitted.
    #[error("dossier {number} not found")]
    NotFound { number: i64 },

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("not configured: {0}")]
    Config(String),
}

/// The fields of a DS dossier the engine cares about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DossierSnapshot {
    pub number: i64,
    pub state: DsStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_depot: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_traitement: Option<OffsetDateTime>,
}

impl DossierSnapshot {
    pub fn new(number: i64, state: DsStatus) -> Self {
        DossierSnapshot {
            number,
            state,
            date_depot: None,
            date_traitement: None,
        }
    }
}

/// Fetches dossier state from DS.
///
/// Implementations must be `Send + Sync` so a single source can be shared
/// by every request handler.
#[async_trait]
pub trait DossierSource: Send + Sync {
    async fn get_dossier(&self, number: i64) -> Result<DossierSnapshot, DsError>;
}

/// URL builders for the public DS site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsUrls {
    base_url: String,
}

impl DsUrls {
    pub fn new(base_url: &str) -> Self {
        DsUrls {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Canonical URL of a submitted dossier.
    pub fn dossier_url(&self, number: i64) -> String {
        format!("{}/dossiers/{}", self.base_url, number)
    }

    /// True for prefill links, which stop being valid once the dossier is submitted.
    pub fn is_prefill_url(url: &str) -> bool {
        url.contains("/commencer/") || url.contains("prefill_token=")
    }
}

/// Interpret a `getDossier` GraphQL response body.
pub fn parse_dossier_response(number: i64, body: &Value) -> Result<DossierSnapshot, DsError> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        let not_found = errors.iter().any(|e| {
            e.pointer("/extensions/code").and_then(Value::as_str) == Some("not_found")
        });
        if not_found {
            return Err(DsError::NotFound { number });
        }
        if !errors.is_empty() && body.pointer("/data/dossier").map_or(true, Value::is_null) {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect();
            return Err(DsError::InvalidResponse(messages.join("; ")));
        }
    }

    let dossier = match body.pointer("/data/dossier") {
        Some(Value::Null) | None => return Err(DsError::NotFound { number }),
        Some(d) => d,
    };

    let state = dossier
        .get("state")
        .and_then(Value::as_str)
        .ok_or_else(|| DsError::InvalidResponse("dossier has no state".to_string()))?;
    let state =
        DsStatus::from_ds_state(state).map_err(|e| DsError::InvalidResponse(e.to_string()))?;

    Ok(DossierSnapshot {
        number: dossier.get("number").and_then(Value::as_i64).unwrap_or(number),
        state,
        date_depot: parse_date(dossier, "dateDepot")?,
        date_traitement: parse_date(dossier, "dateTraitement")?,
    })
}

fn parse_date(dossier: &Value, field: &str) -> Result<Option<OffsetDateTime>, DsError> {
    match dossier.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => OffsetDateTime::parse(s, &Rfc3339)
            .map(Some)
            .map_err(|e| DsError::InvalidResponse(format!("{field}: {e}"))),
        Some(other) => Err(DsError::InvalidResponse(format!(
            "{field}: expected a string, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn parses_accepted_dossier() {
        let body = json!({
            "data": {
                "dossier": {
                    "id": "RG9zc2llci0xMjM0NQ==",
                    "number": 12345,
                    "state": "accepte",
                    "dateDepot": "2025-02-10T09:15:00+01:00",
                    "dateTraitement": "2025-03-01T14:00:00+01:00"
                }
            }
        });
        let snapshot = parse_dossier_response(12345, &body).unwrap();
        assert_eq!(snapshot.number, 12345);
        assert_eq!(snapshot.state, DsStatus::Approved);
        assert_eq!(snapshot.date_depot, Some(datetime!(2025-02-10 08:15 UTC)));
        assert_eq!(
            snapshot.date_traitement,
            Some(datetime!(2025-03-01 13:00 UTC))
        );
    }

    #[test]
    fn missing_dates_are_none() {
        let body = json!({"data": {"dossier": {"number": 7, "state": "en_construction"}}});
        let snapshot = parse_dossier_response(7, &body).unwrap();
        assert_eq!(snapshot.state, DsStatus::Draft);
        assert_eq!(snapshot.date_depot, None);
        assert_eq!(snapshot.date_traitement, None);
    }

    #[test]
    fn not_found_error_code() {
        let body = json!({
            "data": {"dossier": null},
            "errors": [{"message": "Dossier not found", "extensions": {"code": "not_found"}}]
        });
        assert_eq!(
            parse_dossier_response(99, &body),
            Err(DsError::NotFound { number: 99 })
        );
    }

    #[test]
    fn null_dossier_is_not_found() {
        let body = json!({"data": {"dossier": null}});
        assert_eq!(
            parse_dossier_response(5, &body),
            Err(DsError::NotFound { number: 5 })
        );
    }

    #[test]
    fn other_graphql_errors_are_invalid_response() {
        let body = json!({
            "data": null,
            "errors": [{"message": "Permission denied", "extensions": {"code": "unauthorized"}}]
        });
        match parse_dossier_response(5, &body) {
            Err(DsError::InvalidResponse(msg)) => assert!(msg.contains("Permission denied")),
            other => panic!("expected InvalidResponse, got {:?}", other),
        }
    }

    #[test]
    fn unknown_state_is_invalid_response() {
        let body = json!({"data": {"dossier": {"number": 5, "state": "archive"}}});
        assert!(matches!(
            parse_dossier_response(5, &body),
            Err(DsError::InvalidResponse(_))
        ));
    }

    #[test]
    fn bad_date_is_invalid_response() {
        let body = json!({
            "data": {"dossier": {"number": 5, "state": "accepte", "dateDepot": "hier"}}
        });
        match parse_dossier_response(5, &body) {
            Err(DsError::InvalidResponse(msg)) => assert!(msg.starts_with("dateDepot")),
            other => panic!("expected InvalidResponse, got {:?}", other),
        }
    }

    #[test]
    fn urls() {
        let urls = DsUrls::new("https://www.demarches-simplifiees.fr/");
        assert_eq!(
            urls.dossier_url(12345),
            "https://www.demarches-simplifiees.fr/dossiers/12345"
        );
        let prefill = "https://ds.example.fr/commencer/argile?prefill_token=abc";
        assert!(DsUrls::is_prefill_url(prefill));
        assert!(!DsUrls::is_prefill_url(&urls.dossier_url(1)));
    }
}
