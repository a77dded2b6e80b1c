use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::{FeedFormat, FetchError};

/// One meeting as listed by a TSML feed. Every field is optional; feeds
/// disagree on which ones they fill in and on their JSON types.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawMeeting {
    #[serde(deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub slug: Option<String>,
    /// Number, numeric string, day name, or an array of those.
    pub day: Option<Value>,
    #[serde(deserialize_with = "lenient_string")]
    pub time: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub timezone: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub conference_url: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub conference_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub meeting_id: Option<String>,
}

/// Accept strings and numbers; anything else reads as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Parse a feed body into raw meetings.
///
/// Entries that are not objects are kept as empty records so they are
/// counted as fetched and then dropped for lacking an identifier.
pub fn parse_feed(body: &str, format: FeedFormat) -> Result<Vec<RawMeeting>, FetchError> {
    let root: Value = serde_json::from_str(body)?;
    let entries = match (format, root) {
        (FeedFormat::Tsml, Value::Array(entries)) => entries,
        (FeedFormat::TsmlEnvelope, Value::Object(mut map)) => match map.remove("meetings") {
            Some(Value::Array(entries)) => entries,
            _ => return Err(FetchError::Format("missing 'meetings' array".to_string())),
        },
        (FeedFormat::Tsml, _) => return Err(FetchError::Format("expected a JSON array".to_string())),
        (FeedFormat::TsmlEnvelope, _) => {
            return Err(FetchError::Format("expected a JSON object".to_string()));
        }
    };

    Ok(entries
        .into_iter()
        .map(|entry| serde_json::from_value(entry).unwrap_or_default())
        .collect())
}

/// First listed weekday, 0 = Sunday.
pub fn first_day(day: &Value) -> Option<i16> {
    match day {
        Value::Number(n) => n.as_i64().and_then(day_from_index),
        Value::String(s) => parse_day_str(s),
        Value::Array(days) => days.iter().find_map(first_day),
        _ => None,
    }
}

fn day_from_index(i: i64) -> Option<i16> {
    (0..=6).contains(&i).then_some(i as i16)
}

fn parse_day_str(s: &str) -> Option<i16> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return day_from_index(i);
    }
    let lower = s.to_ascii_lowercase();
    const NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];
    NAMES
        .iter()
        .position(|n| lower.starts_with(n))
        .map(|i| i as i16)
}

/// `HH:MM`, dropping seconds when the feed sends `HH:MM:SS`.
pub fn normalize_time(time: &str) -> String {
    let time = time.trim();
    let mut parts = time.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), Some(_)) if h.len() <= 2 && m.len() == 2 => format!("{h}:{m}"),
        _ => time.to_string(),
    }
}
