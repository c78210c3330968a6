//! Credential crypto box.
//!
//! Stored credentials are AES-256-GCM ciphertexts laid out as
//! IV (16 bytes) ∥ auth tag (16 bytes) ∥ body, base64-encoded. The aes-gcm
//! crate expects the tag appended to the body, so decryption reorders the
//! segments before the call. Any tampering, wrong key, or malformed input
//! fails without partial output.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;

/// AES-256-GCM with the 16-byte IV the stored layout uses.
type CredentialCipher = AesGcm<Aes256, U16>;

/// Decryption failures. Deliberately coarse: callers only need to know the
/// ciphertext was unusable, never why.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid base64 input")]
    Base64,

    #[error("Ciphertext too short")]
    Truncated,

    #[error("Invalid key (must be 32 bytes after base64 decode)")]
    BadKey,

    #[error("Decryption failed")]
    Unauthenticated,

    #[error("Decrypted bytes are not valid UTF-8")]
    Utf8,
}

/// Decrypt a stored credential.
pub fn decrypt(ciphertext_b64: &str, key_b64: &str) -> Result<String, CryptoError> {
    let raw = BASE64
        .decode(ciphertext_b64.trim())
        .map_err(|_| CryptoError::Base64)?;
    if raw.len() < IV_LEN + TAG_LEN {
        return Err(CryptoError::Truncated);
    }

    let key_bytes = BASE64.decode(key_b64.trim()).map_err(|_| CryptoError::Base64)?;
    if key_bytes.len() != 32 {
        return Err(CryptoError::BadKey);
    }

    let (iv, rest) = raw.split_at(IV_LEN);
    let (tag, body) = rest.split_at(TAG_LEN);

    // aes-gcm wants body ∥ tag
    let mut sealed = Vec::with_capacity(body.len() + TAG_LEN);
    sealed.extend_from_slice(body);
    sealed.extend_from_slice(tag);

    let cipher = CredentialCipher::new(Key::<CredentialCipher>::from_slice(&key_bytes));
    let nonce = Nonce::<U16>::from_slice(iv);

    let plaintext = cipher
        .decrypt(nonce, sealed.as_ref())
        .map_err(|_| CryptoError::Unauthenticated)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
}

/// Encrypt a credential into the stored layout. The pipeline itself only
/// ever decrypts; this exists for provisioning and tests.
pub fn encrypt(plaintext: &str, key_b64: &str) -> Result<String, CryptoError> {
    use aes_gcm::aead::{AeadCore, OsRng};

    let key_bytes = BASE64.decode(key_b64.trim()).map_err(|_| CryptoError::Base64)?;
    if key_bytes.len() != 32 {
        return Err(CryptoError::BadKey);
    }

    let iv = CredentialCipher::generate_nonce(&mut OsRng);

    let cipher = CredentialCipher::new(Key::<CredentialCipher>::from_slice(&key_bytes));
    let sealed = cipher
        .encrypt(&iv, plaintext.as_bytes())
        .map_err(|_| CryptoError::Unauthenticated)?;

    // sealed = body ∥ tag; stored layout is IV ∥ tag ∥ body
    let (body, tag) = sealed.split_at(sealed.len() - TAG_LEN);
    let mut out = Vec::with_capacity(IV_LEN + TAG_LEN + body.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(tag);
    out.extend_from_slice(body);

    Ok(BASE64.encode(out))
}
