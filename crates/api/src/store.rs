//! In-memory record store with the encryption write hook attached.
//!
//! Records are JSON objects grouped by [`Model::COLLECTION`]. Both [`RecordStore::create`]
//! and [`RecordStore::update`] run [`FieldShield::protect`] on the full record
//! right before it is written, so every sensitive field is a token at rest
//! regardless of which path wrote it. Reads return records exactly as stored;
//! decryption happens at the response boundary.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use common::error::ServiceError;
use fieldcrypt::FieldShield;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info_span};
use uuid::Uuid;

use crate::models::Model;

/// A stored record.
pub type Record = Map<String, Value>;

/// Errors produced by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this id exists in the collection.
    #[error("{collection} record {id} not found")]
    NotFound {
        collection: &'static str,
        id: Uuid,
    },

    /// The input did not serialise to a JSON object.
    #[error("{0} input must serialise to a JSON object")]
    NotAnObject(&'static str),

    /// Serialising the input failed.
    #[error("failed to serialise input: {0}")]
    Serialise(#[from] serde_json::Error),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ServiceError::NotFound(err.to_string()),
            StoreError::NotAnObject(_) | StoreError::Serialise(_) => {
                ServiceError::BadRequest(err.to_string())
            }
        }
    }
}

/// Thread-safe in-memory store.
///
/// Wraps an `Arc<RwLock<_>>` so request handlers can share one store. An
/// update holds the write lock from reading the current record until the
/// merged record is stored, so overlapping updates of one record apply in
/// turn.
#[derive(Clone, Debug)]
pub struct RecordStore {
    inner: Arc<RwLock<HashMap<&'static str, Vec<Record>>>>,
    shield: FieldShield,
}

impl RecordStore {
    /// Create an empty store that encrypts through `shield`.
    pub fn new(shield: FieldShield) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            shield,
        }
    }

    /// Insert a new record built from `input`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotAnObject`] or [`StoreError::Serialise`] if the
    /// input cannot be turned into a record.
    pub async fn create<M: Model>(&self, input: M::Input) -> Result<Record, StoreError> {
        let mut record = to_record::<M, _>(&input)?;
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        record.insert("id".into(), Value::String(id.to_string()));
        record.insert("created_at".into(), Value::String(now.clone()));
        record.insert("updated_at".into(), Value::String(now));

        self.before_write::<M>(&mut record, "create");

        let mut lock = self.inner.write().await;
        lock.entry(M::COLLECTION).or_default().push(record.clone());
        Ok(record)
    }

    /// Merge `patch` into an existing record.
    ///
    /// Fields already encrypted at rest are left alone by the hook; fields in
    /// the patch are encrypted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no record has this id.
    pub async fn update<M: Model>(&self, id: Uuid, patch: M::Patch) -> Result<Record, StoreError> {
        let changes = to_record::<M, _>(&patch)?;

        let mut lock = self.inner.write().await;
        let slot = lock
            .get_mut(M::COLLECTION)
            .and_then(|records| records.iter_mut().find(|r| has_id(r, id)))
            .ok_or(StoreError::NotFound {
                collection: M::COLLECTION,
                id,
            })?;

        let mut merged = slot.clone();
        merged.extend(changes);
        merged.insert("updated_at".into(), Value::String(Utc::now().to_rfc3339()));
        self.before_write::<M>(&mut merged, "update");

        *slot = merged.clone();
        Ok(merged)
    }

    /// Fetch one record as stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no record has this id.
    pub async fn get<M: Model>(&self, id: Uuid) -> Result<Record, StoreError> {
        let lock = self.inner.read().await;
        lock.get(M::COLLECTION)
            .and_then(|records| records.iter().find(|r| has_id(r, id)))
            .cloned()
            .ok_or(StoreError::NotFound {
                collection: M::COLLECTION,
                id,
            })
    }

    /// All records of a model, as stored, in insertion order.
    pub async fn list<M: Model>(&self) -> Vec<Record> {
        let lock = self.inner.read().await;
        lock.get(M::COLLECTION).cloned().unwrap_or_default()
    }

    /// Total number of records across all collections.
    pub async fn len(&self) -> usize {
        self.inner.read().await.values().map(Vec::len).sum()
    }

    fn before_write<M: Model>(&self, record: &mut Record, operation: &'static str) {
        let _span = info_span!("write_hook", collection = M::COLLECTION, operation).entered();
        let report = self.shield.protect(record);
        if !report.is_clean() {
            error!(
                fields = ?report.failed(),
                "record stored with unencrypted sensitive fields"
            );
        }
    }
}

fn to_record<M: Model, T: Serialize>(value: &T) -> Result<Record, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotAnObject(M::COLLECTION)),
    }
}

fn has_id(record: &Record, id: Uuid) -> bool {
    record
        .get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        == Some(id)
}
