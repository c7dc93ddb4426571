use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{parse_dossier_response, DossierSnapshot, DossierSource, DsError};
use crate::config::DsSettings;

const GET_DOSSIER_QUERY: &str = r#"query getDossier($dossierNumber: Int!) {
  dossier(number: $dossierNumber) {
    id
    number
    state
    dateDepot
    dateTraitement
  }
}"#;

/// [`DossierSource`] backed by the DS GraphQL API.
#[derive(Clone)]
pub struct GraphqlDossierSource {
    api_url: String,
    token: String,
    agent: ureq::Agent,
}

impl GraphqlDossierSource {
    /// Fails with [`DsError::Config`] when no API token is configured.
    pub fn new(settings: &DsSettings) -> Result<Self, DsError> {
        let token = settings
            .api_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| DsError::Config("DS_API_TOKEN is not set".to_string()))?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(settings.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(GraphqlDossierSource {
            api_url: settings.api_url.clone(),
            token,
            agent,
        })
    }

    fn fetch_blocking(&self, number: i64) -> Result<DossierSnapshot, DsError> {
        let body = json!({
            "query": GET_DOSSIER_QUERY,
            "operationName": "getDossier",
            "variables": { "dossierNumber": number },
        });

        let mut response = self
            .agent
            .post(&self.api_url)
            .header("Authorization", &format!("Bearer {}", self.token))
            .header("content-type", "application/json")
            .send_json(&body)
            .map_err(|e| DsError::Request(e.to_string()))?;

        // DS answers GraphQL-level failures with 200; anything else is transport.
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(DsError::Request(format!("HTTP {status}")));
        }
        let payload: Value = response
            .body_mut()
            .read_json()
            .map_err(|e| DsError::InvalidResponse(e.to_string()))?;
        parse_dossier_response(number, &payload)
    }
}

#[async_trait]
impl DossierSource for GraphqlDossierSource {
    async fn get_dossier(&self, number: i64) -> Result<DossierSnapshot, DsError> {
        // ureq is synchronous, so wrap in spawn_blocking
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.fetch_blocking(number))
            .await
            .map_err(|e| DsError::Request(format!("task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_token() {
        let settings = DsSettings::default();
        assert!(matches!(
            GraphqlDossierSource::new(&settings),
            Err(DsError::Config(_))
        ));
    }

    #[test]
    fn builds_with_token() {
        let settings = DsSettings {
            api_token: Some("secret".to_string()),
            ..DsSettings::default()
        };
        let source = GraphqlDossierSource::new(&settings).unwrap();
        assert_eq!(source.api_url, settings.api_url);
    }
}
