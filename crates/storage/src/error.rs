use argile_core::Step;

/// All errors that can be returned by a store implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No journey with the given id.
    #[error("journey not found: {id}")]
    JourneyNotFound { id: String },

    /// No case record with the given id.
    #[error("case record not found: {id}")]
    CaseNotFound { id: String },

    /// A case record already exists for this (journey, step) pair.
    #[error("case record already exists for journey {journey_id} at step {step}")]
    CaseAlreadyExists { journey_id: String, step: Step },

    /// The DS dossier number is already attached to another case record.
    #[error("DS dossier {ds_number} is already attached to case {case_id}")]
    DsNumberTaken { ds_number: i64, case_id: String },

    /// No notification with the given message id.
    #[error("notification not found: {message_id}")]
    NotificationNotFound { message_id: String },

    /// A notification with this message id was already recorded.
    #[error("notification already recorded: {message_id}")]
    NotificationAlreadyExists { message_id: String },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
