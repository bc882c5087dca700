// crates/lmnh-core/src/validation.rs

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use thiserror::Error;

use crate::types::{
    json_type_name, InteractionValue, RawRecord, Rating, RequestKind, Site, ValidatedRecord,
};

const REQUIRED_KEYS: [&str; 3] = ["at", "site", "val"];

/// Value of `val` marking an assistance request.
pub const REQUEST_VALUE: i64 = -1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("payload is not valid JSON: {0}")]
    Malformed(String),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("No key called '{0}'")]
    MissingKey(&'static str),

    #[error("'{key}' value type is incorrect: {found}")]
    WrongType { key: &'static str, found: String },

    #[error("'at' value is not in accepted format: {0}")]
    BadTimestamp(String),

    #[error("'{key}' value is not in accepted list of values: {value}")]
    OutOfRange { key: &'static str, value: String },
}

/// Check a raw record against the interaction schema.
///
/// Keys are checked in the order `at`, `site`, `val`, then `type` for
/// requests; the first failure is reported.
pub fn validate(raw: &RawRecord) -> Result<ValidatedRecord, ValidationError> {
    for key in REQUIRED_KEYS {
        if raw.get(key).is_none() {
            return Err(ValidationError::MissingKey(key));
        }
    }

    let occurred_at = validate_at(raw.get("at"))?;
    let site = validate_site(raw.get("site"))?;
    let val = validate_val(raw.get("val"))?;

    let value = if val == REQUEST_VALUE {
        InteractionValue::Request(validate_type(raw.get("type"))?)
    } else {
        // validate_val already bounded the range
        let score = u8::try_from(val).ok().and_then(Rating::new).ok_or_else(|| {
            ValidationError::OutOfRange {
                key: "val",
                value: val.to_string(),
            }
        })?;
        InteractionValue::Rating(score)
    };

    Ok(ValidatedRecord {
        occurred_at,
        site,
        value,
    })
}

fn validate_at(value: Option<&Value>) -> Result<NaiveDateTime, ValidationError> {
    let at = match value {
        Some(Value::String(at)) => at,
        Some(other) => return Err(wrong_type("at", other)),
        None => return Err(ValidationError::MissingKey("at")),
    };
    parse_iso_timestamp(at).ok_or_else(|| ValidationError::BadTimestamp(at.clone()))
}

fn validate_site(value: Option<&Value>) -> Result<Site, ValidationError> {
    let site = match value {
        Some(Value::String(site)) => site,
        Some(other) => return Err(wrong_type("site", other)),
        None => return Err(ValidationError::MissingKey("site")),
    };

    if site.is_empty() || !site.chars().all(char::is_numeric) {
        return Err(ValidationError::WrongType {
            key: "site",
            found: "non-numeric string".to_string(),
        });
    }

    let out_of_range = || ValidationError::OutOfRange {
        key: "site",
        value: site.clone(),
    };

    // "05" is numeric but not one of the accepted codes
    if site.len() != 1 {
        return Err(out_of_range());
    }
    site.parse::<u8>()
        .ok()
        .and_then(Site::new)
        .ok_or_else(out_of_range)
}

fn validate_val(value: Option<&Value>) -> Result<i64, ValidationError> {
    let number = match value {
        Some(Value::Number(number)) if !number.is_f64() => number,
        Some(other) => return Err(wrong_type("val", other)),
        None => return Err(ValidationError::MissingKey("val")),
    };

    match number.as_i64() {
        Some(val) if (REQUEST_VALUE..=i64::from(Rating::MAX)).contains(&val) => Ok(val),
        _ => Err(ValidationError::OutOfRange {
            key: "val",
            value: number.to_string(),
        }),
    }
}

fn validate_type(value: Option<&Value>) -> Result<RequestKind, ValidationError> {
    let kind = value.ok_or(ValidationError::MissingKey("type"))?;
    match RequestKind::from_json(kind) {
        Some(kind) => Ok(kind),
        None if kind.is_number() => Err(ValidationError::OutOfRange {
            key: "type",
            value: kind.to_string(),
        }),
        None => Err(wrong_type("type", kind)),
    }
}

fn wrong_type(key: &'static str, value: &Value) -> ValidationError {
    ValidationError::WrongType {
        key,
        found: json_type_name(value).to_string(),
    }
}

/// Parse an ISO-8601 timestamp into its wall-clock time.
///
/// Offset-aware inputs keep the local time in their own offset; the offset
/// itself is dropped. Naive date-times and bare dates are accepted as-is.
pub fn parse_iso_timestamp(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.naive_local());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(parsed) = DateTime::parse_from_str(input, format) {
            return Some(parsed.naive_local());
        }
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(input, format) {
            return Some(parsed);
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
