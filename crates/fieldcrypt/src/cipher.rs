//! AES-256-GCM-SIV encryption and decryption of individual string fields.
//!
//! **Algorithm choice:** AES-256-GCM-SIV (RFC 8452) is nonce-misuse-resistant.
//! The stored format predates per-value IVs, so by default every value is
//! sealed under the single process-wide IV from [`SecretMaterial`]. Under
//! GCM-SIV that only reveals which values are equal; under plain GCM it would
//! break confidentiality and authentication outright.
//!
//! **Do NOT substitute plain AES-256-GCM while [`IvMode::Fixed`] is in use.**
//!
//! # Token format
//!
//! ```text
//! IvMode::Fixed     <hex(ciphertext)>:<hex(tag)>
//! IvMode::PerValue  <hex(iv)>:<hex(ciphertext)>:<hex(tag)>
//! ```
//!
//! An engine in [`IvMode::PerValue`] still decrypts two-segment tokens with
//! the process IV, so switching modes never strands stored data.

use std::str::FromStr;

use aes_gcm_siv::{
    aead::{Aead, KeyInit, OsRng},
    Aes256GcmSiv, Nonce,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, trace, warn};

use crate::detect::{self, TokenShape, SEPARATOR};
use crate::secret::{SecretMaterial, IV_LEN};

/// Byte length of the AES-GCM-SIV authentication tag (16 bytes = 128 bits).
pub const TAG_LEN: usize = 16;

/// How the IV for each encryption is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IvMode {
    /// Every value uses the process-wide IV. Deterministic output.
    #[default]
    Fixed,
    /// Every value gets a fresh random IV, stored as a third token segment.
    PerValue,
}

impl IvMode {
    /// Configuration spelling of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            IvMode::Fixed => "fixed",
            IvMode::PerValue => "per-value",
        }
    }
}

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The key is the wrong length.
    #[error("invalid key length")]
    InvalidKeyLength,

    /// There is nothing to encrypt.
    #[error("empty plaintext")]
    EmptyPlaintext,

    /// AES-GCM-SIV encryption or authentication failed.
    #[error("aead operation failed")]
    AeadFailure,

    /// The value does not have the shape of a ciphertext token.
    #[error("value is not a ciphertext token")]
    NotAToken,

    /// The value is token-shaped but a segment has the wrong content or length.
    #[error("malformed token: {0}")]
    InvalidFormat(&'static str),

    /// Decryption succeeded but the plaintext is not UTF-8.
    #[error("decrypted plaintext is not valid UTF-8")]
    InvalidUtf8,
}

/// A parsed ciphertext token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Per-value IV, present only for three-segment tokens.
    pub iv: Option<[u8; IV_LEN]>,
    /// Raw ciphertext bytes, without the tag.
    pub ciphertext: Vec<u8>,
    /// Raw authentication tag bytes.
    pub tag: [u8; TAG_LEN],
}

impl Token {
    /// Encode this token to its stored string representation.
    pub fn to_string_repr(&self) -> String {
        let body = format!(
            "{}{SEPARATOR}{}",
            hex::encode(&self.ciphertext),
            hex::encode(self.tag)
        );
        match self.iv {
            Some(iv) => format!("{}{SEPARATOR}{body}", hex::encode(iv)),
            None => body,
        }
    }
}

impl FromStr for Token {
    type Err = CipherError;

    /// Parse a two- or three-segment token.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::NotAToken`] if the string is not token-shaped and
    /// [`CipherError::InvalidFormat`] if a segment fails to decode.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let shape = detect::classify(s).ok_or(CipherError::NotAToken)?;
        let segments: Vec<&str> = s.split(SEPARATOR).collect();
        let (iv, ciphertext, tag) = match shape {
            TokenShape::FixedIv => (None, segments[0], segments[1]),
            TokenShape::PerValueIv => (Some(segments[0]), segments[1], segments[2]),
        };

        let iv = match iv {
            Some(hex_iv) => Some(decode_array::<IV_LEN>(hex_iv, "iv")?),
            None => None,
        };
        let ciphertext =
            hex::decode(ciphertext).map_err(|_| CipherError::InvalidFormat("ciphertext"))?;
        let tag = decode_array::<TAG_LEN>(tag, "tag")?;

        Ok(Self {
            iv,
            ciphertext,
            tag,
        })
    }
}

fn decode_array<const N: usize>(
    segment: &str,
    what: &'static str,
) -> Result<[u8; N], CipherError> {
    let bytes = hex::decode(segment).map_err(|_| CipherError::InvalidFormat(what))?;
    bytes
        .try_into()
        .map_err(|_| CipherError::InvalidFormat(what))
}

/// Encryption seam used by the record hooks.
///
/// Implementations must be safe to share between concurrent requests.
#[cfg_attr(test, mockall::automock)]
pub trait FieldCipher: Send + Sync {
    /// Encrypt `plaintext` into a token.
    fn try_encrypt(&self, plaintext: &str) -> Result<String, CipherError>;

    /// Decrypt `token` back to plaintext.
    fn try_decrypt(&self, token: &str) -> Result<String, CipherError>;

    /// Whether `value` is a token this cipher would attempt to decrypt.
    fn is_token(&self, value: &str) -> bool;
}

/// AES-256-GCM-SIV engine configured once from [`SecretMaterial`].
///
/// Holds only immutable state; share it behind an `Arc`.
pub struct CipherEngine {
    cipher: Aes256GcmSiv,
    iv: [u8; IV_LEN],
    mode: IvMode,
}

impl CipherEngine {
    /// Build an engine from validated secret material.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] if the AEAD rejects the key.
    pub fn new(secret: &SecretMaterial, mode: IvMode) -> Result<Self, CipherError> {
        let cipher = Aes256GcmSiv::new_from_slice(secret.key())
            .map_err(|_| CipherError::InvalidKeyLength)?;
        Ok(Self {
            cipher,
            iv: *secret.iv(),
            mode,
        })
    }

    /// The configured IV mode.
    pub fn mode(&self) -> IvMode {
        self.mode
    }

    /// Encrypt `plaintext`, returning it unchanged if encryption fails.
    ///
    /// Failures are logged at `error`; the empty string is returned as-is.
    pub fn encrypt(&self, plaintext: &str) -> String {
        match self.try_encrypt(plaintext) {
            Ok(token) => token,
            Err(CipherError::EmptyPlaintext) => String::new(),
            Err(e) => {
                error!(error = %e, "encryption failed; value left as plaintext");
                plaintext.to_owned()
            }
        }
    }

    /// Decrypt `token`, returning it unchanged if it is not a token or fails
    /// to decrypt.
    pub fn decrypt(&self, token: &str) -> String {
        match self.try_decrypt(token) {
            Ok(plaintext) => plaintext,
            Err(CipherError::NotAToken) => {
                trace!("value is not a ciphertext token; passing through");
                token.to_owned()
            }
            Err(e) => {
                warn!(error = %e, "token-shaped value failed to decrypt; passing through");
                token.to_owned()
            }
        }
    }

    fn next_iv(&self) -> Option<[u8; IV_LEN]> {
        match self.mode {
            IvMode::Fixed => None,
            IvMode::PerValue => {
                use aes_gcm_siv::aead::rand_core::RngCore;
                let mut iv = [0u8; IV_LEN];
                OsRng.fill_bytes(&mut iv);
                Some(iv)
            }
        }
    }
}

impl FieldCipher for CipherEngine {
    fn try_encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        if plaintext.is_empty() {
            return Err(CipherError::EmptyPlaintext);
        }
        let explicit_iv = self.next_iv();
        let iv = explicit_iv.unwrap_or(self.iv);

        let mut sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|_| CipherError::AeadFailure)?;

        let split = sealed
            .len()
            .checked_sub(TAG_LEN)
            .ok_or(CipherError::AeadFailure)?;
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&sealed[split..]);
        sealed.truncate(split);

        Ok(Token {
            iv: explicit_iv,
            ciphertext: sealed,
            tag,
        }
        .to_string_repr())
    }

    fn try_decrypt(&self, token: &str) -> Result<String, CipherError> {
        if !self.is_token(token) {
            return Err(CipherError::NotAToken);
        }
        let parsed: Token = token.parse()?;
        let iv = parsed.iv.unwrap_or(self.iv);

        let mut sealed = parsed.ciphertext;
        sealed.extend_from_slice(&parsed.tag);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&iv), sealed.as_ref())
            .map_err(|_| CipherError::AeadFailure)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }

    fn is_token(&self, value: &str) -> bool {
        match self.mode {
            IvMode::Fixed => detect::looks_encrypted(value),
            IvMode::PerValue => detect::classify(value).is_some(),
        }
    }
}

impl std::fmt::Debug for CipherEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherEngine")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
