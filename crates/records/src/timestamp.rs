//! Temporal values as they appear in exported documents.
//!
//! The store has accumulated several encodings over time: native timestamps exported as
//! `{ "seconds", "nanoseconds" }` objects (or their `_seconds`/`_nanoseconds` spelling),
//! epoch milliseconds, ISO strings and `dd/mm/yyyy` strings typed in by hand. Translation to
//! chrono types is lenient: anything unusable becomes `None` rather than an error. Shapes
//! that match none of the encodings are kept verbatim so one odd field never fails the
//! document it sits in.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Any of the timestamp encodings accepted on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    /// Native timestamp object.
    Seconds { seconds: i64, nanoseconds: u32 },
    /// Milliseconds since the Unix epoch.
    Millis(i64),
    /// Free text: RFC 3339, `yyyy-mm-dd`, `dd/mm/yyyy` and a few variants.
    Text(String),
    /// Any other JSON value, held as compact JSON text and written back unchanged.
    #[serde(serialize_with = "raw_json")]
    Unrecognized(String),
}

impl<'de> Deserialize<'de> for WireTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self::from_value(Value::deserialize(deserializer)?))
    }
}

fn raw_json<S>(raw: &str, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => value.serialize(serializer),
        Err(_) => serializer.serialize_str(raw),
    }
}

fn seconds_object(map: &Map<String, Value>) -> Option<(i64, u32)> {
    let field = |name: &str| map.get(name).or_else(|| map.get(&format!("_{name}")));
    let seconds = field("seconds")?.as_i64()?;
    let nanoseconds = match field("nanoseconds") {
        None | Some(Value::Null) => 0,
        Some(value) => u32::try_from(value.as_u64()?).ok()?,
    };
    Some((seconds, nanoseconds))
}

const TEXT_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const TEXT_DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];

impl WireTimestamp {
    /// Classify an arbitrary wire value. Never fails.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => WireTimestamp::Text(text),
            Value::Number(number) => match number.as_i64() {
                Some(millis) => WireTimestamp::Millis(millis),
                None => WireTimestamp::Unrecognized(number.to_string()),
            },
            Value::Object(map) => match seconds_object(&map) {
                Some((seconds, nanoseconds)) => WireTimestamp::Seconds {
                    seconds,
                    nanoseconds,
                },
                None => WireTimestamp::Unrecognized(Value::Object(map).to_string()),
            },
            other => WireTimestamp::Unrecognized(other.to_string()),
        }
    }

    /// Wire form used when rendering a timestamp produced by this system.
    pub fn from_datetime(value: DateTime<Utc>) -> Self {
        WireTimestamp::Text(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    /// Wire form used when rendering a calendar date.
    pub fn from_date(value: NaiveDate) -> Self {
        WireTimestamp::Text(value.format("%Y-%m-%d").to_string())
    }

    /// Instant denoted by this value, if it can be recovered.
    ///
    /// Date-only text is read as midnight UTC.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            WireTimestamp::Seconds {
                seconds,
                nanoseconds,
            } => Utc.timestamp_opt(*seconds, *nanoseconds).single(),
            WireTimestamp::Millis(millis) => Utc.timestamp_millis_opt(*millis).single(),
            WireTimestamp::Text(text) => parse_text_datetime(text),
            WireTimestamp::Unrecognized(_) => None,
        }
    }

    /// Calendar date denoted by this value, if it can be recovered.
    ///
    /// Date-only text is read without any timezone shift.
    pub fn to_date(&self) -> Option<NaiveDate> {
        if let WireTimestamp::Text(text) = self {
            if let Some(date) = parse_text_date(text) {
                return Some(date);
            }
        }
        self.to_datetime().map(|instant| instant.date_naive())
    }
}

fn parse_text_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    TEXT_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

fn parse_text_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Some(naive) = TEXT_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    {
        return Some(Utc.from_utc_datetime(&naive));
    }

    parse_text_date(text)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .expect("valid datetime")
    }

    #[test]
    fn parses_native_timestamp_objects() {
        let ts: WireTimestamp =
            serde_json::from_str(r#"{"seconds": 1700000000, "nanoseconds": 0}"#).expect("parse");
        assert_eq!(
            ts.to_datetime(),
            Utc.timestamp_opt(1_700_000_000, 0).single()
        );

        let ts: WireTimestamp =
            serde_json::from_str(r#"{"_seconds": 1700000000, "_nanoseconds": 5}"#).expect("parse");
        assert!(matches!(
            ts,
            WireTimestamp::Seconds {
                seconds: 1_700_000_000,
                nanoseconds: 5
            }
        ));
    }

    #[test]
    fn parses_epoch_millis() {
        let ts: WireTimestamp = serde_json::from_str("1700000000000").expect("parse");
        assert_eq!(
            ts.to_datetime(),
            Utc.timestamp_opt(1_700_000_000, 0).single()
        );
    }

    #[test]
    fn parses_text_encodings() {
        let rfc = WireTimestamp::Text("2024-03-10T08:30:00-03:00".into());
        assert_eq!(rfc.to_datetime(), Some(utc(2024, 3, 10, 11, 30)));

        let naive = WireTimestamp::Text("2024-03-10T08:30:00".into());
        assert_eq!(naive.to_datetime(), Some(utc(2024, 3, 10, 8, 30)));

        let br = WireTimestamp::Text("10/03/2024".into());
        assert_eq!(br.to_datetime(), Some(utc(2024, 3, 10, 0, 0)));
        assert_eq!(br.to_date(), NaiveDate::from_ymd_opt(2024, 3, 10));

        let iso_date = WireTimestamp::Text("1980-12-31".into());
        assert_eq!(iso_date.to_date(), NaiveDate::from_ymd_opt(1980, 12, 31));
    }

    #[test]
    fn unusable_text_is_none() {
        assert_eq!(WireTimestamp::Text(String::new()).to_datetime(), None);
        assert_eq!(WireTimestamp::Text("ontem".into()).to_datetime(), None);
        assert_eq!(WireTimestamp::Text("31/02/2024".into()).to_date(), None);
    }

    #[test]
    fn unexpected_shapes_are_kept_but_unknown() {
        for raw in [
            r#"{"toDate": null}"#,
            r#"{"seconds": "1700000000"}"#,
            r#"{"seconds": 1700000000, "nanoseconds": -1}"#,
            "true",
            "1700000000000.5",
            "[2024, 5, 1]",
        ] {
            let ts: WireTimestamp = serde_json::from_str(raw).expect("parse");
            assert!(matches!(ts, WireTimestamp::Unrecognized(_)), "{raw}");
            assert_eq!(ts.to_datetime(), None, "{raw}");
            assert_eq!(ts.to_date(), None, "{raw}");
        }
    }

    #[test]
    fn unrecognized_values_render_unchanged() {
        let ts: WireTimestamp = serde_json::from_str(r#"{"toDate": null}"#).expect("parse");
        assert_eq!(
            serde_json::to_value(&ts).expect("render"),
            serde_json::json!({"toDate": null})
        );

        let native: WireTimestamp =
            serde_json::from_str(r#"{"seconds": 10, "nanoseconds": 0}"#).expect("parse");
        assert_eq!(
            serde_json::to_value(&native).expect("render"),
            serde_json::json!({"seconds": 10, "nanoseconds": 0})
        );
    }

    #[test]
    fn rendered_datetime_parses_back() {
        let instant = utc(2025, 1, 2, 3, 4);
        let wire = WireTimestamp::from_datetime(instant);
        assert_eq!(wire.to_datetime(), Some(instant));
    }
}
