//! Random storage keys.

use crate::{
    errors::{UploadError, UploadResult},
    services::media_type::AssetPolicy,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use std::fmt;

const KEY_ENTROPY_BYTES: usize = 32;

/// How the random bytes of a key are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEncoding {
    /// base64url without padding: `[A-Za-z0-9_-]`.
    Base64Url,
    /// Lowercase hex.
    Hex,
}

/// A random object name plus its file suffix, e.g. `3q2-7w….png`.
///
/// Uniqueness is probabilistic; collisions are not checked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey {
    token: String,
    suffix: &'static str,
}

impl StorageKey {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.token, self.suffix)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.token, self.suffix)
    }
}

/// Draw 32 bytes from the OS and encode them. Entropy failure is fatal.
pub fn generate(policy: &AssetPolicy, encoding: KeyEncoding) -> UploadResult<StorageKey> {
    let mut bytes = [0u8; KEY_ENTROPY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| UploadError::Internal(format!("failed to generate random key: {}", e)))?;

    let token = match encoding {
        KeyEncoding::Base64Url => URL_SAFE_NO_PAD.encode(bytes),
        KeyEncoding::Hex => hex::encode(bytes),
    };

    Ok(StorageKey {
        token,
        suffix: policy.suffix,
    })
}
