//! Shared application state injected into every Axum handler.

use fieldcrypt::{ExcludedPaths, FieldShield, IvMode};

use super::middleware::DEFAULT_MAX_RESPONSE_BYTES;
use crate::store::RecordStore;

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable (`Arc`-backed) so that Axum can clone the
/// state for each request without copying expensive data.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Record persistence, with the write hook attached.
    pub store: RecordStore,
    /// Cipher and registry used by the response interceptor.
    pub shield: FieldShield,
    /// Paths whose responses are sent as-is.
    pub excluded: ExcludedPaths,
    /// Reported by `/health`.
    pub iv_mode: IvMode,
    /// Largest JSON body the response interceptor buffers and decrypts.
    pub max_response_bytes: usize,
}

impl AppState {
    /// Create a new [`AppState`]. The store is built over the same shield so
    /// both directions use one cipher and one field list.
    pub fn new(shield: FieldShield, excluded: ExcludedPaths, iv_mode: IvMode) -> Self {
        Self {
            store: RecordStore::new(shield.clone()),
            shield,
            excluded,
            iv_mode,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Override the response interceptor's buffering limit.
    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }
}

#[cfg(test)]
impl Default for AppState {
    /// Empty store, fixed test key, `/auth` excluded.
    fn default() -> Self {
        Self::new(
            crate::store::tests::test_shield(),
            ExcludedPaths::default(),
            IvMode::Fixed,
        )
    }
}
