//! Data models persisted by the API.
//!
//! Each model names its collection and the request shapes for create and
//! update. Sensitive fields are ordinary fields here; the store's write hook
//! encrypts them, so nothing in this module knows about encryption.
//!
//! `Option` fields are omitted from the serialised record when absent, so an
//! update only touches the fields the caller actually sent.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A persisted model type.
pub trait Model: Send + Sync + 'static {
    /// Collection name, also used as the route segment.
    const COLLECTION: &'static str;
    /// Body accepted on create.
    type Input: Serialize + DeserializeOwned + Send + 'static;
    /// Body accepted on update; absent fields are left unchanged.
    type Patch: Serialize + DeserializeOwned + Send + 'static;
}

/// A client of the practice.
pub struct Client;

impl Model for Client {
    const COLLECTION: &'static str = "clients";
    type Input = ClientInput;
    type Patch = ClientPatch;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInput {
    pub practice_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    /// Any date spelling the normalizer recognises.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<Value>,
    /// Free-form contact details, stored as one encrypted JSON document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A therapy session with its clinical notes and transcript.
pub struct Session;

impl Model for Session {
    const COLLECTION: &'static str = "sessions";
    type Input = SessionInput;
    type Patch = SessionPatch;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInput {
    pub practice_id: Uuid,
    pub client_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}
