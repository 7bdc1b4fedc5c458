//! Canonical string forms for sensitive values.
//!
//! Values arrive in whatever shape the caller had: strings, numbers, nested
//! JSON, and for date fields a handful of date spellings. Before encryption
//! each value is reduced to one canonical string; after decryption date
//! fields are turned back into dates.
//!
//! Every function here is total. Inputs that cannot be canonicalised pass
//! through as their plain string form and the failure is logged.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::registry::{FieldKind, FieldRegistry};

/// `strftime` pattern of a canonical date.
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// Offset-less ISO-8601 date-times, taken as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// US month/day/year spelling.
const US_DATE_FORMAT: &str = "%m/%d/%Y";

/// Why a value could not be canonicalised. Never carries the value itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// A date string in none of the recognised spellings.
    #[error("unrecognised date format")]
    UnparseableDate,

    /// A date field holding a JSON value that is not a string.
    #[error("date field holds a JSON {0}, expected a string")]
    UnsupportedDateType(&'static str),
}

/// The recognised date inputs. Anything else is rejected.
#[derive(Debug, Clone, Copy)]
pub enum DateInput<'a> {
    /// An application-native calendar date.
    Native(NaiveDate),
    /// A point in time; its UTC calendar date is used.
    Timestamp(DateTime<FixedOffset>),
    /// Canonical `YYYY-MM-DD`, ISO-8601 date-time, or `MM/DD/YYYY`.
    Text(&'a str),
}

/// A decrypted value in application form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlainValue {
    Text(String),
    Date(NaiveDate),
}

impl PlainValue {
    /// The date, if this is a date value.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            PlainValue::Date(d) => Some(*d),
            PlainValue::Text(_) => None,
        }
    }

    /// JSON form. Dates render as `YYYY-MM-DD`.
    pub fn into_json(self) -> Value {
        match self {
            PlainValue::Text(s) => Value::String(s),
            PlainValue::Date(d) => Value::String(d.format(CANONICAL_DATE_FORMAT).to_string()),
        }
    }
}

/// Canonicalise a date input to `YYYY-MM-DD`.
///
/// # Errors
///
/// Returns [`NormalizeError::UnparseableDate`] for text in no recognised spelling.
pub fn canonical_date(input: DateInput<'_>) -> Result<String, NormalizeError> {
    let date = match input {
        DateInput::Native(date) => date,
        DateInput::Timestamp(ts) => ts.with_timezone(&Utc).date_naive(),
        DateInput::Text(text) => parse_date_text(text)?,
    };
    Ok(date.format(CANONICAL_DATE_FORMAT).to_string())
}

fn parse_date_text(text: &str) -> Result<NaiveDate, NormalizeError> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, CANONICAL_DATE_FORMAT) {
        return Ok(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc).date_naive());
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(dt.date());
        }
    }
    NaiveDate::parse_from_str(text, US_DATE_FORMAT).map_err(|_| NormalizeError::UnparseableDate)
}

/// Whether `s` is exactly a canonical, valid `YYYY-MM-DD` date.
pub fn is_canonical_date(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b
            .iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit())
        && NaiveDate::parse_from_str(s, CANONICAL_DATE_FORMAT).is_ok()
}

/// Converts values to and from their canonical string form, using the
/// registry to decide which fields are dates.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    registry: FieldRegistry,
}

impl Normalizer {
    pub fn new(registry: FieldRegistry) -> Self {
        Self { registry }
    }

    /// Canonical string for `value` in `field`.
    ///
    /// # Errors
    ///
    /// Only date fields can fail; see [`NormalizeError`].
    pub fn try_to_canonical(&self, field: &str, value: &Value) -> Result<String, NormalizeError> {
        match self.registry.kind_of(field) {
            FieldKind::Date => match value {
                Value::String(s) => canonical_date(DateInput::Text(s)),
                other => Err(NormalizeError::UnsupportedDateType(json_type(other))),
            },
            FieldKind::Text => Ok(plain_string(value)),
        }
    }

    /// Canonical string for `value` in `field`; on failure the value's plain
    /// string form, with the failure logged.
    pub fn to_canonical(&self, field: &str, value: &Value) -> String {
        self.try_to_canonical(field, value).unwrap_or_else(|e| {
            warn!(field, error = %e, "value not canonicalised; passing through unchanged");
            plain_string(value)
        })
    }

    /// Application form of a decrypted string.
    pub fn from_canonical(&self, field: &str, value: &str) -> PlainValue {
        match self.registry.kind_of(field) {
            FieldKind::Date if is_canonical_date(value) => {
                match NaiveDate::parse_from_str(value, CANONICAL_DATE_FORMAT) {
                    Ok(date) => PlainValue::Date(date),
                    Err(_) => PlainValue::Text(value.to_owned()),
                }
            }
            _ => PlainValue::Text(value.to_owned()),
        }
    }
}

/// Strings as-is, `null` as empty, everything else as compact JSON.
fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn may_15() -> NaiveDate {
        NaiveDate::from_ymd_opt(1990, 5, 15).unwrap()
    }

    fn normalizer() -> Normalizer {
        Normalizer::new(FieldRegistry::standard())
    }

    #[test]
    fn birthday_spellings_share_one_canonical_form() {
        let n = normalizer();
        for input in [
            "1990-05-15",
            "05/15/1990",
            "1990-05-15T00:00:00.000Z",
            "1990-05-15T09:30:00+02:00",
            "1990-05-15T12:00:00",
            " 1990-05-15 ",
        ] {
            assert_eq!(n.to_canonical("birthday", &json!(input)), "1990-05-15", "{input}");
        }
    }

    #[test]
    fn native_date_canonicalises() {
        assert_eq!(canonical_date(DateInput::Native(may_15())).unwrap(), "1990-05-15");
    }

    #[test]
    fn timestamp_uses_utc_calendar_date() {
        let late_evening = DateTime::parse_from_rfc3339("1990-05-14T22:00:00-05:00").unwrap();
        assert_eq!(canonical_date(DateInput::Timestamp(late_evening)).unwrap(), "1990-05-15");
    }

    #[test]
    fn unparseable_date_passes_through() {
        let n = normalizer();
        assert_eq!(
            n.try_to_canonical("birthday", &json!("sometime in May")),
            Err(NormalizeError::UnparseableDate)
        );
        assert_eq!(n.to_canonical("birthday", &json!("sometime in May")), "sometime in May");
        assert_eq!(n.to_canonical("birthday", &json!("1990-02-30")), "1990-02-30");
    }

    #[test]
    fn non_string_date_passes_through_as_text() {
        let n = normalizer();
        assert_eq!(
            n.try_to_canonical("birthday", &json!(19900515)),
            Err(NormalizeError::UnsupportedDateType("number"))
        );
        assert_eq!(n.to_canonical("birthday", &json!(19900515)), "19900515");
    }

    #[test]
    fn text_fields_coerce_scalars() {
        let n = normalizer();
        assert_eq!(n.to_canonical("email", &json!("pat@example.com")), "pat@example.com");
        assert_eq!(n.to_canonical("phone", &json!(5550100)), "5550100");
        assert_eq!(n.to_canonical("notes", &json!(true)), "true");
    }

    #[test]
    fn structured_text_fields_become_json() {
        let n = normalizer();
        let contact = json!({"name": "Sam", "phone": "555-0199"});
        let canonical = n.to_canonical("emergency_contact", &contact);
        assert_eq!(serde_json::from_str::<Value>(&canonical).unwrap(), contact);
    }

    #[test]
    fn canonicalisation_is_deterministic() {
        let n = normalizer();
        let a = n.to_canonical("birthday", &json!("05/15/1990"));
        let b = n.to_canonical("birthday", &json!("1990-05-15T00:00:00Z"));
        assert_eq!(a, b);
    }

    #[test]
    fn from_canonical_yields_date_for_birthday() {
        let n = normalizer();
        assert_eq!(n.from_canonical("birthday", "1990-05-15"), PlainValue::Date(may_15()));
        assert_eq!(n.from_canonical("birthday", "1990-05-15").as_date(), Some(may_15()));
    }

    #[test]
    fn from_canonical_keeps_other_text() {
        let n = normalizer();
        assert_eq!(
            n.from_canonical("birthday", "sometime in May"),
            PlainValue::Text("sometime in May".into())
        );
        assert_eq!(
            n.from_canonical("birthday", "1990-5-15"),
            PlainValue::Text("1990-5-15".into())
        );
        assert_eq!(
            n.from_canonical("email", "1990-05-15"),
            PlainValue::Text("1990-05-15".into())
        );
    }

    #[test]
    fn canonical_date_check() {
        assert!(is_canonical_date("2000-02-29"));
        assert!(!is_canonical_date("2001-02-29"));
        assert!(!is_canonical_date("20000-02-2"));
        assert!(!is_canonical_date("2000/02/29"));
    }

    #[test]
    fn date_renders_as_canonical_json() {
        assert_eq!(PlainValue::Date(may_15()).into_json(), json!("1990-05-15"));
    }
}
