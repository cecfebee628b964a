//! Domain records for the Todoable API.
//!
//! # Design
//! Server payloads are loosely typed, so records are built from
//! `serde_json::Value` through `FromPayload` rather than derived
//! deserializers. Each parser checks its required keys up front and fails
//! with `ApiError::MalformedResponse` carrying the whole payload, so a
//! partially built record is never returned.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Builds a record from a JSON payload returned by the server.
pub trait FromPayload: Sized {
    fn parse(payload: &Value) -> Result<Self, ApiError>;
}

/// A named collection of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    pub name: String,
    /// Assigned by the server; `None` before the list is created.
    pub id: Option<String>,
    pub src: Option<String>,
    /// `None` means "not loaded", which is different from an empty list.
    pub items: Option<Vec<ListItem>>,
}

impl List {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            src: None,
            items: None,
        }
    }
}

impl FromPayload for List {
    fn parse(payload: &Value) -> Result<Self, ApiError> {
        const ENTITY: &str = "List";
        let fields = object(payload, ENTITY)?;

        let name = required_str(fields, "name", payload, ENTITY)?;
        let id = required_str(fields, "id", payload, ENTITY)?;
        let src = optional_str(fields, "src", payload, ENTITY)?;

        let items = match fields.get("items") {
            None | Some(Value::Null) => None,
            Some(Value::Array(raw_items)) => Some(
                raw_items
                    .iter()
                    .map(ListItem::parse)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(_) => return Err(ApiError::malformed(ENTITY, payload)),
        };

        Ok(Self {
            name,
            id: Some(id),
            src,
            items,
        })
    }
}

/// A single entry in a list, finished once `finished_at` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub name: String,
    pub id: Option<String>,
    pub src: Option<String>,
    /// Wall-clock completion time with the server's offset dropped.
    pub finished_at: Option<NaiveDateTime>,
}

impl ListItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            src: None,
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

impl FromPayload for ListItem {
    fn parse(payload: &Value) -> Result<Self, ApiError> {
        const ENTITY: &str = "ListItem";
        let fields = object(payload, ENTITY)?;

        // `src` and `finished_at` must be present even when null.
        for key in ["src", "finished_at"] {
            if !fields.contains_key(key) {
                return Err(ApiError::malformed(ENTITY, payload));
            }
        }

        let name = required_str(fields, "name", payload, ENTITY)?;
        let id = required_str(fields, "id", payload, ENTITY)?;
        let src = optional_str(fields, "src", payload, ENTITY)?;

        let finished_at = match optional_str(fields, "finished_at", payload, ENTITY)? {
            Some(raw) if !raw.is_empty() => Some(
                parse_wall_clock(&raw).ok_or_else(|| ApiError::malformed(ENTITY, payload))?,
            ),
            _ => None,
        };

        Ok(Self {
            name,
            id: Some(id),
            src,
            finished_at,
        })
    }
}

fn object<'a>(payload: &'a Value, entity: &'static str) -> Result<&'a Map<String, Value>, ApiError> {
    payload
        .as_object()
        .ok_or_else(|| ApiError::malformed(entity, payload))
}

fn required_str(
    fields: &Map<String, Value>,
    key: &str,
    payload: &Value,
    entity: &'static str,
) -> Result<String, ApiError> {
    match fields.get(key) {
        Some(Value::String(value)) => Ok(value.clone()),
        _ => Err(ApiError::malformed(entity, payload)),
    }
}

fn optional_str(
    fields: &Map<String, Value>,
    key: &str,
    payload: &Value,
    entity: &'static str,
) -> Result<Option<String>, ApiError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(ApiError::malformed(entity, payload)),
    }
}

/// Layouts carrying an offset. `%#z` also takes `Z`, `+0000` and `+00:00`.
const ZONED_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y-%m-%d %H:%M%#z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

enum Timestamp {
    Zoned(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

/// Accepts RFC 3339 and the common ISO-8601 variants: compact offsets,
/// minute precision, a space separator, and bare dates (taken as midnight).
fn parse_iso8601(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(Timestamp::Zoned(parsed));
    }
    if let Some(parsed) = ZONED_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(raw, format).ok())
    {
        return Some(Timestamp::Zoned(parsed));
    }
    if let Some(parsed) = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    {
        return Some(Timestamp::Naive(parsed));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(Timestamp::Naive)
}

/// Parse an ISO-8601 timestamp and drop its offset, keeping the wall-clock
/// reading. Offset-less input is taken as-is.
pub(crate) fn parse_wall_clock(raw: &str) -> Option<NaiveDateTime> {
    match parse_iso8601(raw)? {
        Timestamp::Zoned(parsed) => Some(parsed.naive_local()),
        Timestamp::Naive(parsed) => Some(parsed),
    }
}

/// Parse an ISO-8601 timestamp into naive UTC. Used where the value is
/// compared against the current UTC time.
pub(crate) fn parse_utc(raw: &str) -> Option<NaiveDateTime> {
    match parse_iso8601(raw)? {
        Timestamp::Zoned(parsed) => Some(parsed.naive_utc()),
        Timestamp::Naive(parsed) => Some(parsed),
    }
}
