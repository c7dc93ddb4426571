//! Application state shared across request handlers.

use argile_core::EnvelopeCipher;
use argile_parcours::ParcoursEngine;
use argile_storage::MemoryStorage;

pub(crate) struct AppState {
    pub(crate) engine: ParcoursEngine<MemoryStorage>,
    /// Cipher for `/envelope/decrypt`. None when no key is configured.
    pub(crate) cipher: Option<EnvelopeCipher>,
    /// Optional API key for authentication. None = no auth required.
    pub(crate) api_key: Option<String>,
}
