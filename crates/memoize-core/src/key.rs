//! Cache-key derivation.
//!
//! A derived key is the hex digest of the canonical JSON (RFC 8785) form of
//! `[function_name, [positional...], {keyword...}]`, where lazy arguments
//! have already been replaced by their names. Canonicalization makes the
//! byte stream independent of map ordering and number formatting, so equal
//! calls always hash to the same key.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::args::Args;
use crate::error::{MemoizeError, MemoizeResult};

/// Suffix used for in-flight disk writes; never valid for a stored key.
pub(crate) const TEMP_SUFFIX: &str = ".tmp";

/// Digest used to turn the canonical payload into a key string.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum KeyDigest {
    /// SHA-256, 64 hex characters.
    #[default]
    Sha256,
    /// MD5, 32 hex characters. Matches the key width of older `.memoize`
    /// folders; not for security.
    Md5,
}

impl KeyDigest {
    /// Hex digest of `bytes`.
    pub fn hex_digest(&self, bytes: &[u8]) -> String {
        match self {
            KeyDigest::Sha256 => hex::encode(Sha256::digest(bytes)),
            KeyDigest::Md5 => format!("{:x}", md5::compute(bytes)),
        }
    }

    /// Length of the keys this digest produces.
    pub fn hex_len(&self) -> usize {
        match self {
            KeyDigest::Sha256 => 64,
            KeyDigest::Md5 => 32,
        }
    }
}

/// Canonical bytes hashed for a call of `function` with `args`.
pub fn key_payload(function: &str, args: &Args) -> MemoizeResult<Vec<u8>> {
    let (positional, keyword) = args.normalized();
    let payload = json!([function, positional, Value::Object(keyword)]);
    serde_jcs::to_vec(&payload).map_err(MemoizeError::serialization)
}

/// Derive the cache key for a call of `function` with `args`.
pub fn derive_key(function: &str, args: &Args, digest: KeyDigest) -> MemoizeResult<String> {
    let payload = key_payload(function, args)?;
    Ok(digest.hex_digest(&payload))
}

/// Check that an explicit key can be used verbatim as a file name.
pub fn validate_key(key: &str) -> MemoizeResult<()> {
    let reason = if key.is_empty() {
        Some("key is empty")
    } else if key == "." || key == ".." {
        Some("key is a relative path component")
    } else if key.contains(['/', '\\']) {
        Some("key contains a path separator")
    } else if key.contains('\0') {
        Some("key contains a NUL byte")
    } else if key.ends_with(TEMP_SUFFIX) {
        Some("key uses the reserved temp-file suffix")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(MemoizeError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
