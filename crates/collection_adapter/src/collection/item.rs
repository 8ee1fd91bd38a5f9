use crate::collection::store::{AUTO_ID_FIELD, CREATED_AT_FIELD, PAYLOAD_FIELD};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracing::warn;

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// A stored item normalized into typed fields.
///
/// This is the only place that looks at the raw shape of store responses;
/// codecs only ever see an `ItemRecord`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub id: Option<String>,
    pub name: String,
    /// `None` when the field is missing or not a string
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ItemRecord {
    pub fn ingest(raw: &Value) -> Self {
        let item = match raw.get(PAYLOAD_FIELD) {
            Some(payload) if payload.is_object() => payload,
            _ => raw,
        };

        let id = item
            .get(AUTO_ID_FIELD)
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let name = item
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let description = item
            .get("description")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let created_at = TimestampField::read(
            item.get(CREATED_AT_FIELD),
            id.as_deref(),
            CREATED_AT_FIELD,
        )
        .or_now();

        Self {
            id,
            name,
            description,
            created_at,
        }
    }

    /// Id for log and error context
    pub fn display_id(&self) -> &str {
        self.id.as_deref().unwrap_or("<unassigned>")
    }
}

/// A timestamp read from a store item or an envelope, before fallbacks apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampField {
    Absent,
    Present(DateTime<Utc>),
    /// Present but unusable; a warning has already been emitted
    Invalid,
}

impl TimestampField {
    pub fn read(raw: Option<&Value>, item_id: Option<&str>, field: &str) -> Self {
        let item_id = item_id.unwrap_or("<unassigned>");
        match raw {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::String(text)) => match parse_iso8601(text) {
                Some(ts) => Self::Present(ts),
                None => {
                    warn!(item_id = %item_id, field = %field, value = %text, "invalid timestamp format, using current time");
                    Self::Invalid
                }
            },
            Some(other) => {
                warn!(item_id = %item_id, field = %field, value = %other, "unexpected timestamp type, using current time");
                Self::Invalid
            }
        }
    }

    /// Absent and invalid values both become the current time
    pub fn or_now(self) -> DateTime<Utc> {
        match self {
            Self::Present(ts) => ts,
            Self::Absent | Self::Invalid => Utc::now(),
        }
    }

    /// Absent values become `when_absent`; invalid values become the current time
    pub fn or_when_absent(self, when_absent: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Present(ts) => ts,
            Self::Absent => when_absent,
            Self::Invalid => Utc::now(),
        }
    }
}

/// Parse an ISO-8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_iso8601(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Serialize a timestamp the way it is persisted, keeping sub-second precision
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
