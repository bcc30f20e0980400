//! Encrypted key-share loading and decryption.
//!
//! Shares are stored as base64-encoded RSA PKCS#1 v1.5 ciphertexts, one file
//! per share, alongside a PEM private key provisioned out of band. Decrypted
//! material lives only for the span of one submission and is zeroized on drop.

use crate::error::{SealguardError, SealguardResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::warn;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use std::fs;
use std::path::Path;
use zeroize::Zeroizing;

/// Plaintext key material derived from exactly one [`KeyShareBlob`].
pub type DecryptedShare = Zeroizing<String>;

/// One encrypted key share as read from the share directory.
#[derive(Debug, Clone)]
pub struct KeyShareBlob {
    name: String,
    ciphertext: Vec<u8>,
}

impl KeyShareBlob {
    pub fn new(name: impl Into<String>, ciphertext: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            ciphertext,
        }
    }

    /// Source name of the share, safe to log.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decrypt this share with `private_key`.
    ///
    /// Malformed base64, padding failures, a mismatched key, and non-UTF-8
    /// plaintext all map to [`SealguardError::Decryption`]; callers treat the
    /// share as unusable and continue with the next one.
    pub fn decrypt(&self, private_key: &RsaPrivateKey) -> SealguardResult<DecryptedShare> {
        let encoded: Vec<u8> = self
            .ciphertext
            .iter()
            .copied()
            .filter(|byte| !byte.is_ascii_whitespace())
            .collect();
        let raw = BASE64
            .decode(&encoded)
            .map_err(|err| self.unusable(format!("base64 decode failed: {err}")))?;

        let plaintext = private_key
            .decrypt(Pkcs1v15Encrypt, &raw)
            .map_err(|err| self.unusable(format!("rsa decrypt failed: {err}")))?;

        String::from_utf8(plaintext)
            .map(Zeroizing::new)
            .map_err(|_| self.unusable("plaintext is not valid UTF-8".to_string()))
    }

    fn unusable(&self, reason: String) -> SealguardError {
        SealguardError::Decryption {
            name: self.name.clone(),
            reason,
        }
    }
}

/// Load a PEM RSA private key from `path`, accepting PKCS#1 or PKCS#8 framing.
pub fn load_private_key(path: &Path) -> SealguardResult<RsaPrivateKey> {
    let pem = fs::read_to_string(path)?;
    RsaPrivateKey::from_pkcs1_pem(&pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(&pem))
        .map_err(|err| SealguardError::InvalidPrivateKey {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
}

/// Enumerate the key shares under `dir`, sorted by file name.
///
/// Sorting pins the submission order; `readdir` order varies across
/// filesystems. Entries that are not regular files are ignored, and files
/// that cannot be read are skipped with a warning so one bad share cannot
/// block the rest of the attempt.
pub fn load_share_dir(dir: &Path) -> SealguardResult<Vec<KeyShareBlob>> {
    let mut shares = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        match fs::read(entry.path()) {
            Ok(bytes) => shares.push(KeyShareBlob::new(name, bytes)),
            Err(err) => warn!("skipping unreadable key share {name}: {err}"),
        }
    }

    shares.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(shares)
}
