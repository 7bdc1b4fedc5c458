//! Write-path hook: encrypt sensitive fields before a record is stored.
//!
//! Runs on both create and in-place update. Fields that already hold a token
//! are left alone, so running the hook twice is a no-op the second time.
//!
//! A field that fails to encrypt keeps its pre-hook value and the write goes
//! ahead. That leaves plaintext at rest for that field; it is logged at
//! `error` and reported in [`WriteReport`] so operators and tests can see it.

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::cipher::{CipherError, FieldCipher};
use crate::normalize::Normalizer;
use crate::registry::FieldRegistry;

/// What the hook did to one sensitive field.
#[derive(Debug)]
pub enum FieldWrite {
    /// The field now holds a token.
    Encrypted,
    /// The field already held a token.
    AlreadyEncrypted,
    /// The canonical form was empty; nothing to encrypt.
    Skipped,
    /// Encryption failed; the field still holds its original value.
    Failed(CipherError),
}

/// Per-field outcome of one hook run, in registry order. Absent and null
/// fields are not listed.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub fields: Vec<(&'static str, FieldWrite)>,
}

impl WriteReport {
    pub fn outcome(&self, field: &str) -> Option<&FieldWrite> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, outcome)| outcome)
    }

    pub fn encrypted(&self) -> usize {
        self.count(|o| matches!(o, FieldWrite::Encrypted))
    }

    pub fn already_encrypted(&self) -> usize {
        self.count(|o| matches!(o, FieldWrite::AlreadyEncrypted))
    }

    /// Names of fields left as plaintext because encryption failed.
    pub fn failed(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|(_, o)| matches!(o, FieldWrite::Failed(_)))
            .map(|(name, _)| *name)
            .collect()
    }

    /// `true` when no field was left in plaintext by a failure.
    pub fn is_clean(&self) -> bool {
        self.failed().is_empty()
    }

    fn count(&self, pred: impl Fn(&FieldWrite) -> bool) -> usize {
        self.fields.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Encrypt every sensitive field of `record` in place.
pub fn encrypt_record(
    cipher: &dyn FieldCipher,
    registry: &FieldRegistry,
    record: &mut Map<String, Value>,
) -> WriteReport {
    let normalizer = Normalizer::new(*registry);
    let mut report = WriteReport::default();

    for field in registry.fields() {
        let Some(value) = record.get_mut(field.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        if value.as_str().is_some_and(|s| cipher.is_token(s)) {
            report.fields.push((field.name, FieldWrite::AlreadyEncrypted));
            continue;
        }

        let canonical = normalizer.to_canonical(field.name, value);
        if canonical.is_empty() {
            report.fields.push((field.name, FieldWrite::Skipped));
            continue;
        }

        let outcome = match cipher.try_encrypt(&canonical) {
            Ok(token) => {
                *value = Value::String(token);
                FieldWrite::Encrypted
            }
            Err(e) => {
                error!(
                    field = field.name,
                    error = %e,
                    "field encryption failed; storing original value"
                );
                FieldWrite::Failed(e)
            }
        };
        report.fields.push((field.name, outcome));
    }

    debug!(
        encrypted = report.encrypted(),
        already_encrypted = report.already_encrypted(),
        failed = report.failed().len(),
        "write hook complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::tests::test_engine;
    use crate::cipher::MockFieldCipher;
    use crate::detect::looks_encrypted;
    use serde_json::json;

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn encrypts_sensitive_fields_only() {
        let engine = test_engine();
        let mut record = object(json!({
            "id": "c-1",
            "email": "pat@example.com",
            "birthday": "1990-05-15",
            "status": "active"
        }));
        let report = encrypt_record(&engine, &FieldRegistry::standard(), &mut record);

        assert!(looks_encrypted(record["email"].as_str().unwrap()));
        assert!(looks_encrypted(record["birthday"].as_str().unwrap()));
        assert_eq!(record["id"], "c-1");
        assert_eq!(record["status"], "active");
        assert_eq!(report.encrypted(), 2);
        assert!(report.is_clean());
    }

    #[test]
    fn birthday_is_canonicalised_before_encryption() {
        let engine = test_engine();
        let mut us = object(json!({"birthday": "05/15/1990"}));
        let mut iso = object(json!({"birthday": "1990-05-15"}));
        encrypt_record(&engine, &FieldRegistry::standard(), &mut us);
        encrypt_record(&engine, &FieldRegistry::standard(), &mut iso);
        // Fixed IV: equal canonical forms give equal tokens.
        assert_eq!(us["birthday"], iso["birthday"]);
        assert_eq!(engine.decrypt(us["birthday"].as_str().unwrap()), "1990-05-15");
    }

    #[test]
    fn second_run_is_a_no_op() {
        let engine = test_engine();
        let registry = FieldRegistry::standard();
        let mut record = object(json!({"email": "pat@example.com", "notes": "intake"}));
        encrypt_record(&engine, &registry, &mut record);
        let once = record.clone();

        let report = encrypt_record(&engine, &registry, &mut record);
        assert_eq!(record, once);
        assert_eq!(report.encrypted(), 0);
        assert_eq!(report.already_encrypted(), 2);
    }

    #[test]
    fn null_absent_and_empty_fields_are_untouched() {
        let engine = test_engine();
        let mut record = object(json!({"email": null, "phone": ""}));
        let report = encrypt_record(&engine, &FieldRegistry::standard(), &mut record);
        assert_eq!(record["email"], Value::Null);
        assert_eq!(record["phone"], "");
        assert!(matches!(report.outcome("phone"), Some(FieldWrite::Skipped)));
        assert!(report.outcome("email").is_none());
        assert!(report.outcome("notes").is_none());
    }

    #[test]
    fn non_string_values_are_coerced_then_encrypted() {
        let engine = test_engine();
        let contact = json!({"name": "Sam", "phone": "555-0199"});
        let mut record = object(json!({"phone": 5550100, "emergency_contact": contact}));
        encrypt_record(&engine, &FieldRegistry::standard(), &mut record);
        assert_eq!(engine.decrypt(record["phone"].as_str().unwrap()), "5550100");
        let decrypted = engine.decrypt(record["emergency_contact"].as_str().unwrap());
        assert_eq!(serde_json::from_str::<Value>(&decrypted).unwrap(), contact);
    }

    #[test]
    fn encryption_failure_keeps_original_and_is_reported() {
        let mut cipher = MockFieldCipher::new();
        cipher.expect_is_token().return_const(false);
        cipher
            .expect_try_encrypt()
            .returning(|_| Err(CipherError::AeadFailure));

        let mut record = object(json!({"email": "pat@example.com", "status": "active"}));
        let report = encrypt_record(&cipher, &FieldRegistry::standard(), &mut record);

        // Leaked plaintext at rest: visible in the report.
        assert_eq!(record["email"], "pat@example.com");
        assert_eq!(report.failed(), ["email"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn one_failure_does_not_block_other_fields() {
        let mut cipher = MockFieldCipher::new();
        cipher.expect_is_token().return_const(false);
        cipher.expect_try_encrypt().returning(|plaintext| {
            if plaintext == "boom" {
                Err(CipherError::AeadFailure)
            } else {
                Ok(format!("ab:{}", plaintext.len()))
            }
        });

        let mut record = object(json!({"email": "boom", "phone": "555-0100"}));
        let report = encrypt_record(&cipher, &FieldRegistry::standard(), &mut record);
        assert_eq!(record["email"], "boom");
        assert_eq!(record["phone"], "ab:8");
        assert_eq!(report.encrypted(), 1);
        assert_eq!(report.failed(), ["email"]);
    }

    #[test]
    fn token_shaped_plaintext_is_skipped() {
        // Documented detector limitation.
        let engine = test_engine();
        let mut record = object(json!({"notes": "cafe:babe"}));
        let report = encrypt_record(&engine, &FieldRegistry::standard(), &mut record);
        assert_eq!(record["notes"], "cafe:babe");
        assert!(matches!(report.outcome("notes"), Some(FieldWrite::AlreadyEncrypted)));
    }
}
