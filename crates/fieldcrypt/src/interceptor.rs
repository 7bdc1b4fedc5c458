//! Read-path interceptor: decrypt sensitive fields in outgoing payloads.
//!
//! A payload is either one record-shaped object or an array of them. Every
//! sensitive string field is decrypted, turned back into its application form
//! (dates), and, if the text looks like a JSON object or array, parsed back
//! into structured JSON. Non-sensitive fields, array order, and array length
//! are never touched.
//!
//! Legacy plaintext is expected and passes through quietly. A value that looks
//! like a token but will not decrypt is returned unchanged and counted as
//! stuck in the [`ReadReport`].

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::cipher::FieldCipher;
use crate::normalize::{Normalizer, PlainValue};
use crate::registry::FieldRegistry;

/// Tally of one interceptor pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadReport {
    /// Record-shaped objects visited.
    pub records: usize,
    /// Sensitive fields decrypted from a token.
    pub decrypted: usize,
    /// Sensitive fields that were already plaintext.
    pub plaintext: usize,
    /// Token-shaped sensitive fields that failed to decrypt.
    pub stuck: usize,
}

impl ReadReport {
    fn merge(&mut self, other: ReadReport) {
        self.records += other.records;
        self.decrypted += other.decrypted;
        self.plaintext += other.plaintext;
        self.stuck += other.stuck;
    }
}

/// Decrypt sensitive fields in a single object or every object of an array.
///
/// Any other JSON value, and any non-object array element, is left as is.
pub fn decrypt_payload(
    cipher: &dyn FieldCipher,
    registry: &FieldRegistry,
    payload: &mut Value,
) -> ReadReport {
    let mut report = ReadReport::default();
    match payload {
        Value::Object(record) => report.merge(decrypt_record(cipher, registry, record)),
        Value::Array(items) => {
            for item in items.iter_mut() {
                if let Value::Object(record) = item {
                    report.merge(decrypt_record(cipher, registry, record));
                }
            }
        }
        _ => {}
    }
    report
}

/// Decrypt the sensitive fields of one record in place.
pub fn decrypt_record(
    cipher: &dyn FieldCipher,
    registry: &FieldRegistry,
    record: &mut Map<String, Value>,
) -> ReadReport {
    let normalizer = Normalizer::new(*registry);
    let mut report = ReadReport {
        records: 1,
        ..ReadReport::default()
    };

    for field in registry.fields() {
        let Some(value) = record.get_mut(field.name) else {
            continue;
        };
        let text = match value {
            Value::String(raw) if cipher.is_token(raw.as_str()) => {
                match cipher.try_decrypt(raw.as_str()) {
                    Ok(plaintext) => {
                        report.decrypted += 1;
                        plaintext
                    }
                    Err(e) => {
                        warn!(
                            field = field.name,
                            error = %e,
                            "stored token failed to decrypt; returning it unchanged"
                        );
                        report.stuck += 1;
                        continue;
                    }
                }
            }
            Value::String(raw) => {
                trace!(field = field.name, "sensitive field stored as plaintext");
                report.plaintext += 1;
                raw.clone()
            }
            Value::Null => continue,
            _ => {
                report.plaintext += 1;
                continue;
            }
        };

        *value = match normalizer.from_canonical(field.name, &text) {
            PlainValue::Text(text) => restore_structured(text),
            date => date.into_json(),
        };
    }
    report
}

/// Parse `text` as JSON if it starts like an object or array, else keep it
/// as a string.
pub fn restore_structured(text: String) -> Value {
    if text.starts_with('{') || text.starts_with('[') {
        match serde_json::from_str(&text) {
            Ok(parsed) => return parsed,
            Err(_) => trace!("JSON-like text did not parse; keeping it as a string"),
        }
    }
    Value::String(text)
}

/// Request paths the read interceptor must not touch.
#[derive(Clone)]
pub struct ExcludedPaths {
    predicate: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl ExcludedPaths {
    /// Exclude every path for which `predicate` returns `true`.
    pub fn new(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Exclude nothing.
    pub fn none() -> Self {
        Self::new(|_| false)
    }

    /// Exclude each prefix and everything beneath it, on segment boundaries:
    /// `/auth` covers `/auth` and `/auth/login` but not `/authors`.
    pub fn from_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes: Vec<String> = prefixes
            .into_iter()
            .map(Into::into)
            .map(|p| p.trim().trim_end_matches('/').to_owned())
            .filter(|p| !p.is_empty())
            .collect();
        Self::new(move |path| {
            prefixes.iter().any(|prefix| {
                path.strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
        })
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        (self.predicate)(path)
    }

    pub fn should_intercept(&self, path: &str) -> bool {
        !self.is_excluded(path)
    }
}

impl Default for ExcludedPaths {
    fn default() -> Self {
        Self::from_prefixes(["/auth"])
    }
}

impl std::fmt::Debug for ExcludedPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExcludedPaths(..)")
    }
}
