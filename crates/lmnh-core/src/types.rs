use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::validation::ValidationError;

/// Storage-native timestamp layout for `event_at`.
pub const EVENT_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A decoded record exactly as a source delivered it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Decode a message payload. Anything other than a JSON object is rejected.
    pub fn from_json(payload: &[u8]) -> Result<Self, ValidationError> {
        match serde_json::from_slice::<Value>(payload) {
            Ok(Value::Object(fields)) => Ok(Self(fields)),
            Ok(_) => Err(ValidationError::NotAnObject),
            Err(err) => Err(ValidationError::Malformed(err.to_string())),
        }
    }

    /// Field lookup where an explicit `null` counts as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }
}

impl fmt::Display for RawRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

/// One of the six exhibition sites, `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Site(u8);

impl Site {
    pub const MAX: u8 = 5;

    pub fn new(code: u8) -> Option<Self> {
        (code <= Self::MAX).then_some(Self(code))
    }

    pub fn code(&self) -> u8 {
        self.0
    }

    /// Public identifier of the exhibition installed at this site.
    pub fn public_id(&self) -> String {
        format!("EXH_0{}", self.0)
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Visitor satisfaction score, `0..=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u8 = 4;

    pub fn new(score: u8) -> Option<Self> {
        (score <= Self::MAX).then_some(Self(score))
    }

    pub fn score(&self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Assistance,
    Emergency,
}

impl RequestKind {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(RequestKind::Assistance),
            1 => Some(RequestKind::Emergency),
            _ => None,
        }
    }

    /// Canonicalize a JSON `type` field. Integral floats (`0.0`, `1.0`) are
    /// the same subtype as their integer form.
    pub fn from_json(value: &Value) -> Option<Self> {
        let number = value.as_number()?;
        if let Some(code) = number.as_i64() {
            return Self::from_code(code);
        }
        match number.as_f64() {
            Some(code) if code == 0.0 => Some(RequestKind::Assistance),
            Some(code) if code == 1.0 => Some(RequestKind::Emergency),
            _ => None,
        }
    }

    pub fn code(&self) -> i16 {
        match self {
            RequestKind::Assistance => 0,
            RequestKind::Emergency => 1,
        }
    }
}

/// Which interaction table a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Rating,
    Request,
}

impl InteractionKind {
    /// Lookup table name.
    pub fn table(&self) -> &'static str {
        match self {
            InteractionKind::Rating => "rating",
            InteractionKind::Request => "request",
        }
    }

    pub fn interaction_table(&self) -> &'static str {
        match self {
            InteractionKind::Rating => "rating_interaction",
            InteractionKind::Request => "request_interaction",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// The `val`/`type` pair of a record. A request always carries its kind and a
/// rating never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionValue {
    Rating(Rating),
    Request(RequestKind),
}

impl InteractionValue {
    pub fn kind(&self) -> InteractionKind {
        match self {
            InteractionValue::Rating(_) => InteractionKind::Rating,
            InteractionValue::Request(_) => InteractionKind::Request,
        }
    }

    /// The wire `val`: the rating score, or `-1` for requests.
    pub fn raw_value(&self) -> i8 {
        match self {
            InteractionValue::Rating(rating) => rating.score() as i8,
            InteractionValue::Request(_) => -1,
        }
    }

    /// Key into the `rating_value` / `request_value` column.
    pub fn lookup_value(&self) -> i16 {
        match self {
            InteractionValue::Rating(rating) => i16::from(rating.score()),
            InteractionValue::Request(kind) => kind.code(),
        }
    }

    pub fn subtype(&self) -> Option<RequestKind> {
        match self {
            InteractionValue::Rating(_) => None,
            InteractionValue::Request(kind) => Some(*kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRecord {
    /// Wall-clock time of the event in the offset it was reported in.
    pub occurred_at: NaiveDateTime,
    pub site: Site,
    pub value: InteractionValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedRow {
    /// Second precision.
    pub event_at: NaiveDateTime,
    pub site: Site,
    pub value: InteractionValue,
}

impl NormalizedRow {
    pub fn kind(&self) -> InteractionKind {
        self.value.kind()
    }

    pub fn subtype(&self) -> Option<RequestKind> {
        self.value.subtype()
    }

    pub fn event_at_string(&self) -> String {
        self.event_at.format(EVENT_AT_FORMAT).to_string()
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Turn a CSV cell into the JSON value a stream message would have carried:
/// integers and floats become numbers, anything else stays a string.
pub(crate) fn coerce_cell(cell: &str) -> Value {
    let trimmed = cell.trim();
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Number(int.into());
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(cell.to_string()))
}
