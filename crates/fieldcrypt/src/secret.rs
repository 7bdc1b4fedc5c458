//! Process-wide secret material: the AES-256 key and the fixed IV.
//!
//! Both values are supplied once at startup as hex strings. Anything missing,
//! non-hex, or wrongly sized is rejected here so that the service refuses to
//! start instead of failing per field later.

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of the AES-GCM-SIV nonce used as the IV (12 bytes = 96 bits).
pub const IV_LEN: usize = 12;

/// Errors raised while loading secret material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    /// The value was absent or blank.
    #[error("{0} is required and must not be empty")]
    Missing(&'static str),

    /// The value is not valid hex.
    #[error("{name} is not valid hex: {reason}")]
    InvalidHex { name: &'static str, reason: String },

    /// The decoded value has the wrong number of bytes.
    #[error("{name} must decode to {expected} bytes, got {got}")]
    InvalidLength {
        name: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Key and IV shared by every encryption in the process.
///
/// Zeroised on drop. `Debug` never prints the bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretMaterial {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl SecretMaterial {
    /// Build secret material from raw bytes.
    pub fn new(key: [u8; KEY_LEN], iv: [u8; IV_LEN]) -> Self {
        Self { key, iv }
    }

    /// Parse hex-encoded key and IV, as provided by the environment.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError`] if either value is blank, not hex, or the wrong length.
    pub fn from_hex(key_hex: &str, iv_hex: &str) -> Result<Self, SecretError> {
        let key = decode_fixed::<KEY_LEN>(key_hex, "ENCRYPTION_KEY")?;
        let iv = decode_fixed::<IV_LEN>(iv_hex, "ENCRYPTION_IV")?;
        Ok(Self { key, iv })
    }

    pub(crate) fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub(crate) fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }
}

impl std::fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretMaterial([REDACTED])")
    }
}

fn decode_fixed<const N: usize>(value: &str, name: &'static str) -> Result<[u8; N], SecretError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SecretError::Missing(name));
    }
    let mut bytes = hex::decode(value).map_err(|e| SecretError::InvalidHex {
        name,
        reason: e.to_string(),
    })?;
    if bytes.len() != N {
        let got = bytes.len();
        bytes.zeroize();
        return Err(SecretError::InvalidLength {
            name,
            expected: N,
            got,
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    bytes.zeroize();
    Ok(out)
}
