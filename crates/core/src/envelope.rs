//! AES-256-GCM envelope for form data carried in a URL fragment.
//!
//! An envelope is the ASCII string `<iv>:<tag>:<ciphertext>`, each part
//! lowercase hex. The IV is 16 random bytes drawn per call and the tag is the
//! 16-byte GCM authentication tag. Envelopes travel as `#d=<envelope>` so the
//! payload never reaches server logs as a query string.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce, Tag};
use rand::RngCore;

use crate::error::EnvelopeError;

/// Environment variable holding the hex-encoded 32-byte key.
pub const KEY_ENV_VAR: &str = "ENCRYPTION_KEY";

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 16;

/// Prefix of the URL fragment carrying an envelope.
pub const FRAGMENT_PREFIX: &str = "#d=";

type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// A configured envelope cipher.
#[derive(Clone)]
pub struct EnvelopeCipher {
    cipher: Aes256Gcm16,
}

impl EnvelopeCipher {
    /// Build a cipher from a raw 32-byte key.
    pub fn from_key(key: &[u8]) -> Result<Self, EnvelopeError> {
        if key.len() != KEY_LEN {
            return Err(EnvelopeError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: key.len(),
            });
        }
        let cipher = Aes256Gcm16::new_from_slice(key).map_err(|_| {
            EnvelopeError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: key.len(),
            }
        })?;
        Ok(EnvelopeCipher { cipher })
    }

    /// Build a cipher from a hex-encoded key (64 hex characters).
    pub fn from_hex_key(key_hex: &str) -> Result<Self, EnvelopeError> {
        let key_hex = key_hex.trim();
        if key_hex.is_empty() {
            return Err(EnvelopeError::MissingKey(KEY_ENV_VAR));
        }
        let key = hex::decode(key_hex).map_err(|_| EnvelopeError::InvalidKeyEncoding)?;
        Self::from_key(&key)
    }

    /// Build a cipher from the `ENCRYPTION_KEY` environment variable.
    pub fn from_env() -> Result<Self, EnvelopeError> {
        let key_hex =
            std::env::var(KEY_ENV_VAR).map_err(|_| EnvelopeError::MissingKey(KEY_ENV_VAR))?;
        Self::from_hex_key(&key_hex)
    }

    /// Seal `plaintext` into an `iv:tag:ciphertext` envelope.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, EnvelopeError> {
        if plaintext.is_empty() {
            return Err(EnvelopeError::EmptyInput);
        }

        let mut iv = [0u8; IV_LEN];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::<U16>::from_slice(&iv), b"", &mut buffer)
            .map_err(|e| EnvelopeError::EncryptionFailed(e.to_string()))?;

        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(buffer)
        ))
    }

    /// Open an envelope produced by [`EnvelopeCipher::encrypt`].
    pub fn decrypt(&self, envelope: &str) -> Result<String, EnvelopeError> {
        let parts = EnvelopeParts::parse(envelope)?;

        let mut buffer = parts.ciphertext;
        self.cipher
            .decrypt_in_place_detached(
                Nonce::<U16>::from_slice(&parts.iv),
                b"",
                &mut buffer,
                Tag::<U16>::from_slice(&parts.tag),
            )
            .map_err(|_| EnvelopeError::AuthenticationFailed)?;

        String::from_utf8(buffer).map_err(|e| EnvelopeError::DecryptionFailed(e.to_string()))
    }
}

/// Decoded envelope components with validated lengths.
struct EnvelopeParts {
    iv: Vec<u8>,
    tag: Vec<u8>,
    ciphertext: Vec<u8>,
}

impl EnvelopeParts {
    fn parse(envelope: &str) -> Result<Self, EnvelopeError> {
        if envelope.is_empty() {
            return Err(EnvelopeError::EmptyInput);
        }

        let parts: Vec<&str> = envelope.split(':').collect();
        let [iv_hex, tag_hex, cipher_hex] = parts.as_slice() else {
            return Err(EnvelopeError::MalformedEnvelope(format!(
                "expected 3 colon-separated parts, got {}",
                parts.len()
            )));
        };

        let iv = decode_part("iv", iv_hex)?;
        let tag = decode_part("tag", tag_hex)?;
        let ciphertext = decode_part("ciphertext", cipher_hex)?;

        if iv.len() != IV_LEN {
            return Err(EnvelopeError::InvalidIvLength {
                expected: IV_LEN,
                actual: iv.len(),
            });
        }
        if tag.len() != TAG_LEN {
            return Err(EnvelopeError::InvalidTagLength {
                expected: TAG_LEN,
                actual: tag.len(),
            });
        }

        Ok(EnvelopeParts {
            iv,
            tag,
            ciphertext,
        })
    }
}

fn decode_part(name: &str, value: &str) -> Result<Vec<u8>, EnvelopeError> {
    hex::decode(value)
        .map_err(|e| EnvelopeError::MalformedEnvelope(format!("{} is not valid hex: {}", name, e)))
}

/// Encrypt with the key read from `ENCRYPTION_KEY` at call time.
pub fn encrypt(plaintext: &str) -> Result<String, EnvelopeError> {
    EnvelopeCipher::from_env()?.encrypt(plaintext)
}

/// Decrypt with the key read from `ENCRYPTION_KEY` at call time.
pub fn decrypt(envelope: &str) -> Result<String, EnvelopeError> {
    EnvelopeCipher::from_env()?.decrypt(envelope)
}

/// Generate a fresh random key, hex-encoded, suitable for `ENCRYPTION_KEY`.
pub fn generate_key_hex() -> String {
    let mut key = [0u8; KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut key);
    hex::encode(key)
}

/// Wrap an envelope as a URL fragment: `#d=<envelope>`.
pub fn to_fragment(envelope: &str) -> String {
    format!("{}{}", FRAGMENT_PREFIX, envelope)
}

/// Extract the envelope from a URL or bare fragment carrying `#d=<envelope>`.
///
/// Returns `None` when there is no `d` fragment or it is empty.
pub fn from_fragment(url_or_fragment: &str) -> Option<&str> {
    let start = url_or_fragment.find(FRAGMENT_PREFIX)? + FRAGMENT_PREFIX.len();
    let rest = &url_or_fragment[start..];
    let envelope = rest.split('&').next().unwrap_or(rest);
    if envelope.is_empty() {
        None
    } else {
        Some(envelope)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn cipher() -> EnvelopeCipher {
        EnvelopeCipher::from_hex_key(TEST_KEY).unwrap()
    }

    /// Replace the hex character at `index` with a different hex character.
    fn flip_hex_char(s: &str, index: usize) -> String {
        let mut chars: Vec<char> = s.chars().collect();
        chars[index] = if chars[index] == '0' { '1' } else { '0' };
        chars.into_iter().collect()
    }

    #[test]
    fn round_trip() {
        let c = cipher();
        for plaintext in [
            "a",
            "{\"adresse\":\"12 rue des Argiles\",\"revenus\":24000}",
            "éàü, unicode",
        ] {
            let envelope = c.encrypt(plaintext).unwrap();
            assert_eq!(c.decrypt(&envelope).unwrap(), plaintext);
        }
    }

    #[test]
    fn envelope_format() {
        let envelope = cipher().encrypt("hello").unwrap();
        let parts: Vec<&str> = envelope.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), IV_LEN * 2);
        assert_eq!(parts[1].len(), TAG_LEN * 2);
        assert_eq!(parts[2].len(), "hello".len() * 2);
        assert!(envelope
            .chars()
            .all(|c| c == ':' || (c.is_ascii_hexdigit() && !c.is_ascii_uppercase())));
    }

    #[test]
    fn fresh_iv_per_call() {
        let c = cipher();
        let a = c.encrypt("same input").unwrap();
        let b = c.encrypt("same input").unwrap();
        assert_ne!(a, b);
        assert_ne!(a.split(':').next(), b.split(':').next());
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let c = cipher();
        let envelope = c.encrypt("payload to protect").unwrap();
        let cipher_start = IV_LEN * 2 + 1 + TAG_LEN * 2 + 1;
        for i in cipher_start..envelope.len() {
            let tampered = flip_hex_char(&envelope, i);
            assert_eq!(
                c.decrypt(&tampered),
                Err(EnvelopeError::AuthenticationFailed),
                "flip at {} was not detected",
                i
            );
        }
    }

    #[test]
    fn tampered_tag_fails_authentication() {
        let c = cipher();
        let envelope = c.encrypt("payload to protect").unwrap();
        let tag_start = IV_LEN * 2 + 1;
        for i in tag_start..tag_start + TAG_LEN * 2 {
            let tampered = flip_hex_char(&envelope, i);
            assert_eq!(
                c.decrypt(&tampered),
                Err(EnvelopeError::AuthenticationFailed)
            );
        }
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let envelope = cipher().encrypt("secret").unwrap();
        let other = EnvelopeCipher::from_hex_key(&"ab".repeat(KEY_LEN)).unwrap();
        assert_eq!(
            other.decrypt(&envelope),
            Err(EnvelopeError::AuthenticationFailed)
        );
    }

    #[test]
    fn malformed_envelopes_rejected_before_decryption() {
        let c = cipher();
        for input in ["abc", "a:b", "a:b:c:d"] {
            assert!(
                matches!(c.decrypt(input), Err(EnvelopeError::MalformedEnvelope(_))),
                "{} should be malformed",
                input
            );
        }
    }

    #[test]
    fn non_hex_part_is_malformed() {
        let envelope = format!("{}:{}:zz", "00".repeat(IV_LEN), "00".repeat(TAG_LEN));
        assert!(matches!(
            cipher().decrypt(&envelope),
            Err(EnvelopeError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn wrong_iv_and_tag_lengths() {
        let c = cipher();
        let short_iv = format!("{}:{}:00", "00".repeat(12), "00".repeat(TAG_LEN));
        assert_eq!(
            c.decrypt(&short_iv),
            Err(EnvelopeError::InvalidIvLength {
                expected: IV_LEN,
                actual: 12
            })
        );

        let short_tag = format!("{}:{}:00", "00".repeat(IV_LEN), "00".repeat(8));
        assert_eq!(
            c.decrypt(&short_tag),
            Err(EnvelopeError::InvalidTagLength {
                expected: TAG_LEN,
                actual: 8
            })
        );
    }

    #[test]
    fn empty_input_rejected() {
        let c = cipher();
        assert_eq!(c.encrypt(""), Err(EnvelopeError::EmptyInput));
        assert_eq!(c.decrypt(""), Err(EnvelopeError::EmptyInput));
    }

    #[test]
    fn key_validation() {
        assert_eq!(
            EnvelopeCipher::from_hex_key("").err(),
            Some(EnvelopeError::MissingKey(KEY_ENV_VAR))
        );
        assert_eq!(
            EnvelopeCipher::from_hex_key("not-hex-at-all").err(),
            Some(EnvelopeError::InvalidKeyEncoding)
        );
        assert_eq!(
            EnvelopeCipher::from_hex_key("abcd").err(),
            Some(EnvelopeError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: 2
            })
        );
    }

    #[test]
    fn generated_key_is_usable() {
        let key = generate_key_hex();
        assert_eq!(key.len(), KEY_LEN * 2);
        let c = EnvelopeCipher::from_hex_key(&key).unwrap();
        let envelope = c.encrypt("x").unwrap();
        assert_eq!(c.decrypt(&envelope).unwrap(), "x");
    }

    #[test]
    fn fragment_helpers() {
        assert_eq!(to_fragment("aa:bb:cc"), "#d=aa:bb:cc");
        assert_eq!(
            from_fragment("https://example.gouv.fr/simulateur#d=aa:bb:cc"),
            Some("aa:bb:cc")
        );
        assert_eq!(from_fragment("#d=aa:bb:cc&x=1"), Some("aa:bb:cc"));
        assert_eq!(from_fragment("#d="), None);
        assert_eq!(from_fragment("https://example.gouv.fr/simulateur"), None);
    }
}
