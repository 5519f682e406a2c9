//! Timestamp used in Workshop status conditions.

use chrono::{DateTime as ChronoDateTime, SecondsFormat, Utc};
use schemars::{json_schema, JsonSchema};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;

/// RFC 3339 UTC timestamp with second precision, the way the API server writes
/// `lastTransitionTime`
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateTime(pub ChronoDateTime<Utc>);

impl Serialize for DateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        ChronoDateTime::parse_from_rfc3339(&raw)
            .map(|dt| DateTime(dt.with_timezone(&Utc)))
            .map_err(de::Error::custom)
    }
}

impl JsonSchema for DateTime {
    fn schema_name() -> Cow<'static, str> {
        "DateTime".into()
    }

    fn json_schema(_gen: &mut schemars::SchemaGenerator) -> schemars::Schema {
        json_schema!({
            "type": "string",
            "format": "date-time"
        })
    }
}

impl DateTime {
    pub fn now() -> Self {
        DateTime(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_whole_seconds_in_utc() {
        let parsed: DateTime = serde_json::from_str("\"2026-10-17T12:30:05.250+02:00\"").unwrap();
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            "\"2026-10-17T10:30:05Z\""
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_str::<DateTime>("\"yesterday\"").is_err());
    }
}
