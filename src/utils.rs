//! Some utility functions

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::OsmError;
use crate::record::Record;

/// Render a JSON value the way OSM displays it: strings unquoted, null as empty
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// OSM is inconsistent about ids: sometimes strings, sometimes numbers
pub fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected an id, got {}", other))),
    }
}

/// Read an id (string or number) from a record
pub fn id_of(record: &Record, key: &str, kind: &'static str) -> Result<String, OsmError> {
    match record.get(key) {
        Some(Value::String(s)) if s.is_empty() == false => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(OsmError::invalid(kind, format!("no usable {:?}", key))),
    }
}

/// Read an optional text field from a record. Empty strings count as missing
pub fn text_of<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| s.is_empty() == false)
}

/// The list of records of a response: either the response itself, or its `items` (or `data`) member
pub fn items_of(value: &Value) -> Vec<Record> {
    let list = match value {
        Value::Array(_) => Some(value),
        Value::Object(map) => map.get("items").or_else(|| map.get("data")),
        _ => None,
    };

    match list {
        Some(Value::Array(items)) => items.iter()
            .filter_map(|item| item.as_object().cloned())
            .collect(),
        _ => Vec::new(),
    }
}

/// Parse an OSM date, either ISO (`2023-01-31`) or UK (`31/01/2023`)
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%d/%m/%Y"))
        .ok()
}

/// Parse an OSM time of day (`19:00:00` or `19:00`)
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

/// Give a local date and time its OSM timezone.
///
/// On the autumn DST change the earliest instant is picked; in the spring gap the time is moved an hour later.
pub fn localize(date: NaiveDate, time: NaiveTime) -> DateTime<Tz> {
    let naive = NaiveDateTime::new(date, time);
    let tz = crate::config::TIMEZONE;
    match tz.from_local_datetime(&naive).earliest() {
        Some(dt) => dt,
        None => {
            let shifted = naive + chrono::Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .unwrap_or_else(|| tz.from_utc_datetime(&naive))
        },
    }
}

/// Today, in the OSM timezone
pub fn today() -> NaiveDate {
    chrono::Utc::now().with_timezone(&crate::config::TIMEZONE).date_naive()
}
