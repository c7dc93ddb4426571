use argile_core::EnvelopeError;
use argile_storage::StorageError;

use crate::config::ConfigError;
use crate::ds::DsError;

/// Errors surfaced by the parcours services.
///
/// "Progression not allowed yet" is not an error: it is an
/// `advanced: false` outcome.
#[derive(Debug, thiserror::Error)]
pub enum ParcoursError {
    #[error("journey not found: {0}")]
    JourneyNotFound(String),

    #[error("no case record for DS dossier {ds_number}")]
    CaseNotFound { ds_number: i64 },

    /// The DS dossier already belongs to another applicant's case.
    #[error("DS dossier {ds_number} is already attached to another case")]
    DsNumberTaken { ds_number: i64 },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Démarches Simplifiées error: {0}")]
    External(#[from] DsError),

    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ParcoursError {
    /// Fixed French message shown to applicants. Never carries internal detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            ParcoursError::JourneyNotFound(_) => "Parcours non trouvé",
            ParcoursError::CaseNotFound { .. } => "Dossier non trouvé",
            ParcoursError::DsNumberTaken { .. }
            | ParcoursError::Storage(StorageError::DsNumberTaken { .. }) => {
                "Ce dossier est déjà rattaché à un autre parcours"
            }
            ParcoursError::Storage(
                StorageError::JourneyNotFound { .. }
                | StorageError::CaseNotFound { .. }
                | StorageError::NotificationNotFound { .. },
            ) => "Donnée introuvable",
            ParcoursError::Storage(_) => "Erreur lors de l'accès aux données",
            ParcoursError::External(DsError::NotFound { .. }) => {
                "Dossier introuvable sur Démarches Simplifiées"
            }
            ParcoursError::External(_) => "Erreur de communication avec Démarches Simplifiées",
            ParcoursError::Envelope(
                EnvelopeError::MissingKey(_)
                | EnvelopeError::InvalidKeyEncoding
                | EnvelopeError::InvalidKeyLength { .. },
            ) => "Clé de chiffrement absente ou invalide",
            ParcoursError::Envelope(EnvelopeError::AuthenticationFailed) => {
                "Données chiffrées altérées ou clé incorrecte"
            }
            ParcoursError::Envelope(
                EnvelopeError::EncryptionFailed(_) | EnvelopeError::DecryptionFailed(_),
            ) => "Erreur de chiffrement",
            ParcoursError::Envelope(_) => "Format de données chiffrées invalide",
            ParcoursError::Config(_) => "Configuration invalide",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_hide_internal_detail() {
        let err = ParcoursError::Storage(StorageError::Backend(
            "connection refused to 10.0.0.3:5432".to_string(),
        ));
        assert!(!err.user_message().contains("10.0.0.3"));
        assert_eq!(err.user_message(), "Erreur lors de l'accès aux données");
    }

    #[test]
    fn tampering_and_misconfiguration_are_distinct() {
        let tampered = ParcoursError::from(EnvelopeError::AuthenticationFailed);
        let no_key = ParcoursError::from(EnvelopeError::MissingKey("ENCRYPTION_KEY"));
        let malformed = ParcoursError::from(EnvelopeError::MalformedEnvelope("abc".into()));
        assert_ne!(tampered.user_message(), no_key.user_message());
        assert_ne!(tampered.user_message(), malformed.user_message());
        assert_ne!(no_key.user_message(), malformed.user_message());
    }

    #[test]
    fn not_found_messages() {
        assert_eq!(
            ParcoursError::JourneyNotFound("a-1".into()).user_message(),
            "Parcours non trouvé"
        );
        assert_eq!(
            ParcoursError::CaseNotFound { ds_number: 7 }.user_message(),
            "Dossier non trouvé"
        );
    }

    #[test]
    fn taken_dossier_message_does_not_name_the_owner() {
        let err = ParcoursError::from(StorageError::DsNumberTaken {
            ds_number: 555,
            case_id: "case-of-someone-else".into(),
        });
        assert_eq!(
            err.user_message(),
            ParcoursError::DsNumberTaken { ds_number: 555 }.user_message()
        );
        assert!(!err.user_message().contains("someone"));
    }
}
