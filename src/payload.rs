// Argument payload handed to every procedure
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{DatasetError, Result};

/// Dataset metadata passed to a procedure as a single compact JSON argument.
///
/// The wire form is one line of UTF-8 text; newlines inside values are
/// escaped by the JSON encoder so consumers may split on line boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub table: String,
    #[serde(with = "iso8601")]
    pub upload_date: DateTime<Utc>,
    pub columns: Vec<String>,
    pub user: String,
    pub user_email: String,
}

impl Payload {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        Self {
            table: dataset.table.clone(),
            upload_date: dataset.upload_date,
            columns: dataset.columns().to_vec(),
            user: dataset.owner.username.clone(),
            user_email: dataset.owner.email.clone(),
        }
    }

    pub fn to_wire(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            DatasetError::MalformedPayload {
                error: e.to_string(),
            }
            .into()
        })
    }

    pub fn from_wire(wire: &str) -> Result<Self> {
        serde_json::from_str(wire).map_err(|e| {
            DatasetError::MalformedPayload {
                error: e.to_string(),
            }
            .into()
        })
    }
}

mod iso8601 {
    use super::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|d| d.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Owner;
    use chrono::TimeZone;

    fn dataset() -> Dataset {
        Dataset::new("t1.csv", Owner::new("alice", "alice@example.com"))
            .with_table("t1")
            .with_columns(["a", "b", "c"])
            .with_upload_date(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_wire_roundtrip() {
        let payload = Payload::from_dataset(&dataset());
        let wire = payload.to_wire().unwrap();
        assert!(wire.contains(r#""upload_date":"2024-01-01T00:00:00Z""#));
        assert!(wire.contains(r#""columns":["a","b","c"]"#));
        assert_eq!(Payload::from_wire(&wire).unwrap(), payload);
    }

    #[test]
    fn test_wire_is_single_line() {
        let mut dataset = dataset();
        dataset.set_columns(["first\nsecond", "tab\there"]);
        dataset.table = "multi\r\nline".to_string();
        let wire = Payload::from_dataset(&dataset).to_wire().unwrap();
        assert!(!wire.contains('\n'));
        assert!(!wire.contains('\r'));
        assert!(!wire.contains(": "));
        assert_eq!(
            Payload::from_wire(&wire).unwrap().columns[0],
            "first\nsecond"
        );
    }

    #[test]
    fn test_rejects_bad_wire() {
        assert!(Payload::from_wire("{not json").is_err());
        assert!(Payload::from_wire(
            r#"{"table":"t","upload_date":"yesterday","columns":[],"user":"a","user_email":"b"}"#
        )
        .is_err());
    }
}
