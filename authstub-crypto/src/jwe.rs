//! JWE decryption and its outbound mirror.

use crate::envelope::{CompactJwe, ContentEncryption, JweHeader, NONCE_LEN, TAG_LEN};
use crate::error::{CryptoError, Result};
use crate::key::{ContentKey, EncryptionKey, KeyUnwrapper};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;

/// Decrypt a compact JWE and return the plaintext bytes.
///
/// # Process
///
/// 1. Parse the five segments and the protected header
/// 2. Reject anything other than `RSA-OAEP-256` with `A128GCM`/`A256GCM`
/// 3. Unwrap the content-encryption key
/// 4. Open the AES-GCM ciphertext using the header segment as AAD
///
/// # Errors
///
/// - `InvalidFormat`: malformed envelope (`ERR_JWE_INVALID`)
/// - `UnsupportedAlgorithm`: algorithm not accepted (`ERR_JOSE_NOT_SUPPORTED`)
/// - `DecryptFailed`: wrong key or tampered content (`ERR_JWE_DECRYPTION_FAILED`)
pub async fn decrypt(envelope: &str, unwrapper: &dyn KeyUnwrapper) -> Result<Vec<u8>> {
    let jwe = CompactJwe::parse(envelope)?;
    let enc = jwe.header.algorithms()?;

    let cek = unwrapper.unwrap_key(&jwe.encrypted_key).await?;
    if cek.len() != enc.key_len() {
        return Err(CryptoError::decrypt_failed(
            "content key length does not match enc",
        ));
    }

    let plaintext = open(
        enc,
        &cek,
        &jwe.iv,
        jwe.protected.as_bytes(),
        &jwe.sealed(),
    )?;

    tracing::debug!(
        enc = enc.as_str(),
        unwrapper = unwrapper.describe(),
        plaintext_len = plaintext.len(),
        "JWE decrypted"
    );
    Ok(plaintext)
}

/// Decrypt a compact JWE whose plaintext must be UTF-8 (a nested token).
pub async fn decrypt_to_string(envelope: &str, unwrapper: &dyn KeyUnwrapper) -> Result<String> {
    let plaintext = decrypt(envelope, unwrapper).await?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::decrypt_failed("plaintext is not UTF-8"))
}

/// Encrypt `plaintext` to the holder of `key`'s private half.
///
/// Produces `{"alg":"RSA-OAEP-256","enc":<enc>,"cty":"JWT"}`-headed compact
/// JWE. Used by the request-building CLI and by tests.
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey, enc: ContentEncryption) -> Result<String> {
    let mut cek_bytes = vec![0u8; enc.key_len()];
    OsRng.fill_bytes(&mut cek_bytes);
    let cek = ContentKey::new(cek_bytes);

    let mut iv = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut iv);

    let header = JweHeader {
        cty: Some("JWT".to_string()),
        ..JweHeader::rsa_oaep_256(enc)
    };
    let header_json = serde_json::to_vec(&header)
        .map_err(|_| CryptoError::encrypt_failed("header serialization failed"))?;
    let protected = URL_SAFE_NO_PAD.encode(header_json);

    let encrypted_key = key.wrap(&cek)?;
    let mut sealed = seal(enc, &cek, &iv, protected.as_bytes(), plaintext)?;

    // AES-GCM appends the tag to the ciphertext
    let split = sealed.len() - TAG_LEN;
    let tag: [u8; TAG_LEN] = sealed[split..]
        .try_into()
        .map_err(|_| CryptoError::encrypt_failed("cipher output shorter than tag"))?;
    sealed.truncate(split);

    let jwe = CompactJwe {
        header,
        protected,
        encrypted_key,
        iv,
        ciphertext: sealed,
        tag,
    };
    Ok(jwe.to_compact())
}

fn open(
    enc: ContentEncryption,
    cek: &ContentKey,
    iv: &[u8; NONCE_LEN],
    aad: &[u8],
    sealed: &[u8],
) -> Result<Vec<u8>> {
    let payload = Payload { msg: sealed, aad };
    let result = match enc {
        ContentEncryption::A128Gcm => Aes128Gcm::new_from_slice(cek.expose_secret())
            .map_err(|_| CryptoError::decrypt_failed("invalid content key"))?
            .decrypt(Nonce::from_slice(iv), payload),
        ContentEncryption::A256Gcm => Aes256Gcm::new_from_slice(cek.expose_secret())
            .map_err(|_| CryptoError::decrypt_failed("invalid content key"))?
            .decrypt(Nonce::from_slice(iv), payload),
    };
    result.map_err(|_| CryptoError::decrypt_failed("authentication tag mismatch"))
}

fn seal(
    enc: ContentEncryption,
    cek: &ContentKey,
    iv: &[u8; NONCE_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let payload = Payload {
        msg: plaintext,
        aad,
    };
    let result = match enc {
        ContentEncryption::A128Gcm => Aes128Gcm::new_from_slice(cek.expose_secret())
            .map_err(|_| CryptoError::encrypt_failed("invalid content key"))?
            .encrypt(Nonce::from_slice(iv), payload),
        ContentEncryption::A256Gcm => Aes256Gcm::new_from_slice(cek.expose_secret())
            .map_err(|_| CryptoError::encrypt_failed("invalid content key"))?
            .encrypt(Nonce::from_slice(iv), payload),
    };
    result.map_err(|_| CryptoError::encrypt_failed("AES-GCM seal failed"))
}
