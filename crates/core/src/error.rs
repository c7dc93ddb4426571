/// Errors raised by the URL-fragment encryption envelope.
///
/// Each failure mode has its own variant so callers can tell tampering
/// (`AuthenticationFailed`) apart from misconfiguration (`MissingKey`,
/// `InvalidKey*`) and from garbage input (`MalformedEnvelope`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// Nothing to encrypt or decrypt.
    #[error("empty input")]
    EmptyInput,

    /// The envelope is not `iv:tag:ciphertext` with hex-encoded parts.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("invalid IV length: expected {expected} bytes, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },

    #[error("invalid authentication tag length: expected {expected} bytes, got {actual}")]
    InvalidTagLength { expected: usize, actual: usize },

    /// Tag verification failed: the envelope was altered or sealed with another key.
    #[error("authentication failed: envelope was tampered with or encrypted with a different key")]
    AuthenticationFailed,

    /// Any other failure while opening a structurally valid envelope.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// No key configured (`ENCRYPTION_KEY` unset or blank).
    #[error("encryption key is not configured ({0} is unset)")]
    MissingKey(&'static str),

    #[error("encryption key is not valid hex")]
    InvalidKeyEncoding,

    #[error("encryption key must be {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}
