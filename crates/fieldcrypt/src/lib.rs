//! Transparent field-level encryption for record-shaped data.
//!
//! Sensitive fields (see [`registry::SENSITIVE_FIELDS`]) are encrypted by a
//! write-path hook before records are stored and decrypted by a read-path
//! interceptor before they leave the service. Callers keep working with
//! plain values throughout.
//!
//! # Stored format
//!
//! ```text
//! <hex(ciphertext)>:<hex(tag)>
//! ```
//!
//! # Module layout
//!
//! - [`secret`]: key and IV loading; the only fatal error path.
//! - [`cipher`]: AES-256-GCM-SIV engine and the [`cipher::FieldCipher`] seam.
//! - [`registry`]: the sensitive-field list.
//! - [`normalize`]: canonical string forms, including dates.
//! - [`detect`]: token shape detection.
//! - [`hooks`]: write-path hook.
//! - [`interceptor`]: read-path interceptor and path exclusions.
//!
//! Nothing in this crate logs plaintext, tokens, or key material.

pub mod cipher;
pub mod detect;
pub mod hooks;
pub mod interceptor;
pub mod normalize;
pub mod registry;
pub mod secret;
mod shield;

pub use cipher::{CipherEngine, CipherError, FieldCipher, IvMode};
pub use hooks::WriteReport;
pub use interceptor::{ExcludedPaths, ReadReport};
pub use registry::{FieldRegistry, SENSITIVE_FIELDS};
pub use secret::{SecretError, SecretMaterial};
pub use shield::FieldShield;
