//! argile-core: shared vocabulary for the Fonds Prévention Argile parcours.
//!
//! - [`vocabulary`] -- journey steps, local statuses, Démarches Simplifiées
//!   statuses and the mapping between them
//! - [`envelope`] -- AES-256-GCM envelope used to carry form data through a
//!   URL fragment

pub mod envelope;
pub mod error;
pub mod vocabulary;

pub use envelope::EnvelopeCipher;
pub use error::EnvelopeError;
pub use vocabulary::{DsStatus, JourneyStatus, Step, VocabularyError};
