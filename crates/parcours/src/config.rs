//! Runtime settings: Démarches Simplifiées access, démarche ids per step,
//! envelope key and HTTP server options.
//!
//! Settings are read from an optional TOML file, then overridden by
//! environment variables (which is how deployments provide secrets):
//!
//! | Variable                      | Field                          |
//! |-------------------------------|--------------------------------|
//! | `DS_API_URL`                  | `ds.api_url`                   |
//! | `DS_API_TOKEN`                | `ds.api_token`                 |
//! | `DS_BASE_URL`                 | `ds.base_url`                  |
//! | `DS_TIMEOUT_SECS`             | `ds.timeout_secs`              |
//! | `DS_DEMARCHE_ID_ELIGIBILITE`  | `ds.demarches.eligibilite`     |
//! | `DS_DEMARCHE_ID_DIAGNOSTIC`   | `ds.demarches.diagnostic`      |
//! | `DS_DEMARCHE_ID_DEVIS`        | `ds.demarches.devis`           |
//! | `DS_DEMARCHE_ID_FACTURES`     | `ds.demarches.factures`        |
//! | `ENCRYPTION_KEY`              | `encryption_key`               |
//! | `ARGILE_PORT`                 | `server.port`                  |
//! | `ARGILE_API_KEY`              | `server.api_key`               |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use argile_core::{EnvelopeCipher, EnvelopeError, Step};

pub const DEFAULT_DS_API_URL: &str = "https://www.demarches-simplifiees.fr/api/v2/graphql";
pub const DEFAULT_DS_BASE_URL: &str = "https://www.demarches-simplifiees.fr";
pub const DEFAULT_DS_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ds: DsSettings,
    /// Hex-encoded 32-byte key for URL-fragment envelopes.
    pub encryption_key: Option<String>,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DsSettings {
    /// GraphQL endpoint.
    pub api_url: String,
    /// Bearer token for the GraphQL API.
    pub api_token: Option<String>,
    /// Public site root used to build dossier URLs.
    pub base_url: String,
    pub timeout_secs: u64,
    pub demarches: DemarcheIds,
}

impl Default for DsSettings {
    fn default() -> Self {
        DsSettings {
            api_url: DEFAULT_DS_API_URL.to_string(),
            api_token: None,
            base_url: DEFAULT_DS_BASE_URL.to_string(),
            timeout_secs: DEFAULT_DS_TIMEOUT_SECS,
            demarches: DemarcheIds::default(),
        }
    }
}

/// Démarche (procedure) id backing each step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemarcheIds {
    pub eligibilite: Option<String>,
    pub diagnostic: Option<String>,
    pub devis: Option<String>,
    pub factures: Option<String>,
}

impl DemarcheIds {
    pub fn for_step(&self, step: Step) -> Option<&str> {
        match step {
            Step::Eligibility => self.eligibilite.as_deref(),
            Step::Diagnostic => self.diagnostic.as_deref(),
            Step::Quote => self.devis.as_deref(),
            Step::Invoices => self.factures.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    /// When set, every endpoint except `/health` requires this bearer key.
    pub api_key: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            port: DEFAULT_PORT,
            api_key: None,
        }
    }
}

impl Settings {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let mut settings = match path {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Settings, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Settings::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Settings, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Envelope cipher for the configured key.
    ///
    /// Fails with `EnvelopeError::MissingKey` when no key is configured.
    pub fn envelope_cipher(&self) -> Result<EnvelopeCipher, EnvelopeError> {
        EnvelopeCipher::from_hex_key(self.encryption_key.as_deref().unwrap_or(""))
    }

    /// Override fields from `lookup` (normally the process environment).
    /// Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DS_API_URL") {
            self.ds.api_url = v;
        }
        if let Some(v) = get("DS_API_TOKEN") {
            self.ds.api_token = Some(v);
        }
        if let Some(v) = get("DS_BASE_URL") {
            self.ds.base_url = v;
        }
        if let Some(v) = get("DS_TIMEOUT_SECS") {
            self.ds.timeout_secs = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "DS_TIMEOUT_SECS",
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("DS_DEMARCHE_ID_ELIGIBILITE") {
            self.ds.demarches.eligibilite = Some(v);
        }
        if let Some(v) = get("DS_DEMARCHE_ID_DIAGNOSTIC") {
            self.ds.demarches.diagnostic = Some(v);
        }
        if let Some(v) = get("DS_DEMARCHE_ID_DEVIS") {
            self.ds.demarches.devis = Some(v);
        }
        if let Some(v) = get("DS_DEMARCHE_ID_FACTURES") {
            self.ds.demarches.factures = Some(v);
        }
        if let Some(v) = get("ENCRYPTION_KEY") {
            self.encryption_key = Some(v);
        }
        if let Some(v) = get("ARGILE_PORT") {
            self.server.port = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "ARGILE_PORT",
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("ARGILE_API_KEY") {
            self.server.api_key = Some(v);
        }
        Ok(())
    }
}
