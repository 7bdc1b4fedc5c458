//! [`FieldShield`]: one handle bundling the cipher and the registry, for
//! hosts that attach the write hook and the read interceptor.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::cipher::FieldCipher;
use crate::hooks::{self, WriteReport};
use crate::interceptor::{self, ReadReport};
use crate::registry::FieldRegistry;

/// Cheaply cloneable handle used by persistence hooks and response middleware.
#[derive(Clone)]
pub struct FieldShield {
    cipher: Arc<dyn FieldCipher>,
    registry: FieldRegistry,
}

impl FieldShield {
    pub fn new(cipher: Arc<dyn FieldCipher>, registry: FieldRegistry) -> Self {
        Self { cipher, registry }
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn cipher(&self) -> &dyn FieldCipher {
        self.cipher.as_ref()
    }

    /// Write-path hook: encrypt sensitive fields of `record` in place.
    pub fn protect(&self, record: &mut Map<String, Value>) -> WriteReport {
        hooks::encrypt_record(self.cipher.as_ref(), &self.registry, record)
    }

    /// Read-path interceptor: decrypt sensitive fields of `payload` in place.
    pub fn reveal(&self, payload: &mut Value) -> ReadReport {
        interceptor::decrypt_payload(self.cipher.as_ref(), &self.registry, payload)
    }
}

impl std::fmt::Debug for FieldShield {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldShield")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
