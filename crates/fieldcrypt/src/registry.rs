//! The set of record fields that are encrypted at rest.
//!
//! [`SENSITIVE_FIELDS`] is the single list consulted by the normalizer, the
//! write hook, and the read interceptor. A field must be sensitive on both
//! sides of storage: if it is encrypted on write but not decrypted on read,
//! callers see ciphertext; the reverse leaves plaintext at rest.

/// How a sensitive field's value is canonicalised before encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, or any scalar/structured value coerced to a string.
    Text,
    /// A calendar date, canonicalised as `YYYY-MM-DD`.
    Date,
}

/// A field name designated for at-rest encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensitiveField {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn text(name: &'static str) -> SensitiveField {
    SensitiveField {
        name,
        kind: FieldKind::Text,
    }
}

/// Every sensitive field, in processing order.
pub static SENSITIVE_FIELDS: &[SensitiveField] = &[
    text("first_name"),
    text("last_name"),
    text("email"),
    text("phone"),
    text("street_address"),
    SensitiveField {
        name: "birthday",
        kind: FieldKind::Date,
    },
    text("emergency_contact"),
    text("notes"),
    text("transcript"),
];

/// Read-only handle on a sensitive-field list, injected into every component
/// that needs one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRegistry {
    fields: &'static [SensitiveField],
}

impl FieldRegistry {
    /// The registry backed by [`SENSITIVE_FIELDS`].
    pub const fn standard() -> Self {
        Self {
            fields: SENSITIVE_FIELDS,
        }
    }

    /// A registry over a custom list. Intended for tests and tooling.
    pub const fn with_fields(fields: &'static [SensitiveField]) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &'static [SensitiveField] {
        self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|f| f.name)
    }

    pub fn get(&self, name: &str) -> Option<&'static SensitiveField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Kind of `name`; unknown fields are treated as text.
    pub fn kind_of(&self, name: &str) -> FieldKind {
        self.get(name).map_or(FieldKind::Text, |f| f.kind)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
