//! Domain types for the visit log: records with their cost breakdown,
//! attachments, medication courses and adherence logs.

pub mod attachment;
pub mod enums;
pub mod medication;
pub mod record;

pub use attachment::*;
pub use enums::*;
pub use medication::*;
pub use record::*;

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer};

/// Current instant as an ISO-8601 UTC string with millisecond precision.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Calendar date of a record's `date` field.
///
/// Accepts `YYYY-MM-DD` optionally followed by a time part (`T10:30`,
/// ` 10:30:00`, an RFC 3339 offset, ...). Only the leading date is read.
pub fn parse_record_date(value: &str) -> Option<NaiveDate> {
    let head = value.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Amounts typed into forms arrive as numbers, numeric strings, empty
/// strings or null. Anything that does not parse counts as zero.
pub(crate) fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(amount_from_value(&value))
}

pub(crate) fn amount_from_value(value: &serde_json::Value) -> f64 {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

/// Serde adapter storing binary payloads as standard base64 text.
pub(crate) mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(text.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_date_accepts_date_and_datetime() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(parse_record_date("2024-03-09"), Some(expected));
        assert_eq!(parse_record_date("2024-03-09T08:15"), Some(expected));
        assert_eq!(parse_record_date("2024-03-09T08:15:00.000Z"), Some(expected));
        assert_eq!(parse_record_date("yesterday"), None);
        assert_eq!(parse_record_date(""), None);
    }

    #[test]
    fn amounts_parse_leniently() {
        assert_eq!(amount_from_value(&json!(12.5)), 12.5);
        assert_eq!(amount_from_value(&json!("30")), 30.0);
        assert_eq!(amount_from_value(&json!(" 7.25 ")), 7.25);
        assert_eq!(amount_from_value(&json!("")), 0.0);
        assert_eq!(amount_from_value(&json!("abc")), 0.0);
        assert_eq!(amount_from_value(&json!(null)), 0.0);
        assert_eq!(amount_from_value(&json!("NaN")), 0.0);
    }

    #[test]
    fn now_iso_is_utc_millis() {
        let now = now_iso();
        assert!(now.ends_with('Z'));
        assert_eq!(now.len(), "2024-01-01T00:00:00.000Z".len());
    }
}
