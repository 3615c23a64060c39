//! Typed field values for schema-less records
//!
//! Records arrive as JSON objects with keys nobody declared up front. Every
//! value is parsed exactly once, here, into a [`FieldValue`]; the classifier,
//! formatter and aggregator only ever look at the typed form.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

lazy_static! {
    static ref DATE_LIKE: [Regex; 4] = [
        Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}").unwrap(),
        Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}").unwrap(),
        Regex::new(r"^\d{4}/\d{1,2}/\d{1,2}").unwrap(),
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}").unwrap(),
    ];
    static ref TIME_PART: Regex = Regex::new(r"\d{1,2}:\d{2}").unwrap();
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y, %I:%M:%S %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Whether a string looks like one of the date shapes CRM reports emit
pub fn is_date_like(raw: &str) -> bool {
    let trimmed = raw.trim();
    DATE_LIKE.iter().any(|re| re.is_match(trimmed))
}

/// Parse a string as a finite number, requiring the whole string to be numeric
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Rust accepts "inf"/"nan" spellings that no CRM column means as numbers
    if trimmed
        .chars()
        .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
    {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// A date-like string together with its parsed form
#[derive(Debug, Clone, PartialEq)]
pub struct DateText {
    pub raw: String,
    /// `None` when the string has a date shape but is not a real date
    pub parsed: Option<NaiveDateTime>,
    pub has_time: bool,
}

impl DateText {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        Self {
            raw: raw.to_string(),
            parsed: parse_datetime(trimmed),
            has_time: TIME_PART.is_match(trimmed),
        }
    }

    /// Milliseconds since the Unix epoch, treating naive times as UTC
    pub fn epoch_millis(&self) -> Option<i64> {
        self.parsed.map(|dt| dt.and_utc().timestamp_millis())
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// A single record value after ingestion
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    /// `raw` keeps the source text when the number arrived as a string
    Number { value: f64, raw: Option<String> },
    Date(DateText),
    Text(String),
}

impl FieldValue {
    pub fn number(value: f64) -> Self {
        Self::Number { value, raw: None }
    }

    /// Ingest a raw JSON value
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.is_finite() => Self::number(f),
                _ => Self::Null,
            },
            Value::String(s) => Self::from_text(s),
            Value::Bool(b) => Self::Text(b.to_string()),
            other => Self::Text(other.to_string()),
        }
    }

    /// Ingest a raw string the same way a JSON string is ingested
    pub fn from_text(s: &str) -> Self {
        if is_date_like(s) {
            Self::Date(DateText::parse(s))
        } else if let Some(value) = parse_number(s) {
            Self::Number {
                value,
                raw: Some(s.to_string()),
            }
        } else {
            Self::Text(s.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_date_like(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number { .. })
    }

    /// Numeric reading of the value; text, dates and nulls have none
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Text used as a grouping key and as the "raw value" shown in labels
    pub fn key(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Number { raw: Some(raw), .. } => raw.clone(),
            Self::Number { value, raw: None } => number_key(*value),
            Self::Date(d) => d.raw.clone(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

fn number_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One row of a widget dataset: field name to typed value
///
/// Field order follows the source object so that discovered columns come
/// out in the order the report emitted them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<String>,
    values: HashMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        let mut record = Self::new();
        for (key, value) in object {
            record.insert(key.clone(), FieldValue::from_json(value));
        }
        record
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        let field = field.into();
        if !self.values.contains_key(&field) {
            self.fields.push(field.clone());
        }
        self.values.insert(field, value);
    }

    /// Value for `field`; `None` when the record has no such key
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_date_like_shapes() {
        assert!(is_date_like("2024-01-01"));
        assert!(is_date_like("2024-01-01T10:30:00Z"));
        assert!(is_date_like("3/7/2024"));
        assert!(is_date_like("2024/3/7 08:00"));
        assert!(!is_date_like("2024"));
        assert!(!is_date_like("new"));
        assert!(!is_date_like("12.5"));
    }

    #[test]
    fn test_parse_number_is_strict() {
        assert_eq!(parse_number("10"), Some(10.0));
        assert_eq!(parse_number(" -2.5 "), Some(-2.5));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("12abc"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_ingest_json_values() {
        assert_eq!(FieldValue::from_json(&json!(null)), FieldValue::Null);
        assert_eq!(FieldValue::from_json(&json!(3)), FieldValue::number(3.0));
        assert_eq!(
            FieldValue::from_json(&json!("20")),
            FieldValue::Number {
                value: 20.0,
                raw: Some("20".to_string())
            }
        );
        assert_eq!(
            FieldValue::from_json(&json!("won")),
            FieldValue::Text("won".to_string())
        );
        assert_eq!(
            FieldValue::from_json(&json!(true)),
            FieldValue::Text("true".to_string())
        );
        assert!(FieldValue::from_json(&json!("2024-02-01")).is_date_like());
    }

    #[test]
    fn test_date_text_parsing() {
        let plain = DateText::parse("2024-02-01");
        assert!(!plain.has_time);
        assert_eq!(plain.epoch_millis(), Some(1_706_745_600_000));

        let zoned = DateText::parse("2024-02-01T12:00:00Z");
        assert!(zoned.has_time);
        assert_eq!(zoned.epoch_millis(), Some(1_706_788_800_000));

        let us = DateText::parse("2/1/2024");
        assert_eq!(us.epoch_millis(), plain.epoch_millis());

        let bogus = DateText::parse("2024-13-45");
        assert_eq!(bogus.parsed, None);
    }

    #[test]
    fn test_number_keys_match_js_rendering() {
        assert_eq!(FieldValue::number(10.0).key(), "10");
        assert_eq!(FieldValue::number(10.5).key(), "10.5");
        assert_eq!(FieldValue::number(-3.0).key(), "-3");
    }

    #[test]
    fn test_numeric_strings_keep_source_text() {
        let zip = FieldValue::from_text("02134");
        assert_eq!(zip.as_number(), Some(2134.0));
        assert_eq!(zip.key(), "02134");
        assert_eq!(FieldValue::from_text("1.50").key(), "1.50");
        assert_eq!(FieldValue::from_text("1e3").key(), "1e3");
        assert_ne!(zip.key(), FieldValue::from_text("2134").key());
    }

    #[test]
    fn test_record_preserves_field_order() {
        let obj = json!({"name": "Acme", "amount": "12", "created_at": "2024-01-01"});
        let record = Record::from_json_object(obj.as_object().unwrap());

        let names: Vec<&str> = record.field_names().collect();
        assert_eq!(names, vec!["name", "amount", "created_at"]);
        assert_eq!(record.get("amount").and_then(FieldValue::as_number), Some(12.0));
        assert_eq!(record.get("missing"), None);
    }
}
