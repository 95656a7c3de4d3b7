//! Data models for rooms, scrape results and run accounting.
//!
//! - [`RoomId`]: opaque identifier read from the rooms view
//! - [`ScrapeResult`]: whatever JSON object the scrape endpoint returned
//! - [`RoomRecord`]: the row shape written back to the rooms table
//! - [`ItemOutcome`] / [`RunSummary`]: per-room and per-run accounting

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of a single room. Read once from the data source and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The JSON object returned by the scrape endpoint.
///
/// No schema is assumed; the fields are merged into the stored row as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScrapeResult(pub Map<String, Value>);

impl ScrapeResult {
    /// Accepts only a JSON object; anything else is `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }
}

/// A row destined for the rooms table, keyed by `id`.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomRecord {
    Success { id: RoomId, fields: ScrapeResult },
    Failure { id: RoomId },
}

impl RoomRecord {
    pub fn id(&self) -> &RoomId {
        match self {
            RoomRecord::Success { id, .. } | RoomRecord::Failure { id } => id,
        }
    }

    pub fn failed(&self) -> bool {
        matches!(self, RoomRecord::Failure { .. })
    }

    /// Flatten into the JSON object handed to the store.
    ///
    /// Scraped fields go in first so that `id` and `failed` always carry the
    /// orchestrator's values, even if the endpoint returned keys of the same
    /// name.
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut payload = match self {
            RoomRecord::Success { fields, .. } => fields.0.clone(),
            RoomRecord::Failure { .. } => Map::new(),
        };
        payload.insert("id".into(), Value::String(self.id().to_string()));
        payload.insert("failed".into(), Value::Bool(self.failed()));
        payload
    }
}

/// How a single room ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Succeeded,
    /// The room failed; `marked` says whether the failure flag was persisted.
    Failed { marked: bool },
}

/// Aggregate numbers reported once at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub total_rooms: usize,
    pub processed_count: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failed rooms whose failure flag could not be written either.
    pub unflagged_failures: usize,
    pub batches: usize,
    pub elapsed_seconds: f64,
}

impl RunSummary {
    pub fn empty(started_at: DateTime<Utc>, elapsed_seconds: f64) -> Self {
        Self {
            started_at,
            total_rooms: 0,
            processed_count: 0,
            succeeded: 0,
            failed: 0,
            unflagged_failures: 0,
            batches: 0,
            elapsed_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_payload_merges_fields() {
        let fields = ScrapeResult::from_value(json!({"title": "Lobby", "capacity": 12})).unwrap();
        let record = RoomRecord::Success {
            id: RoomId::new("r1"),
            fields,
        };

        let payload = Value::Object(record.to_payload());
        assert_eq!(
            payload,
            json!({"id": "r1", "failed": false, "title": "Lobby", "capacity": 12})
        );
    }

    #[test]
    fn test_success_payload_id_and_failed_win_over_scraped_keys() {
        let fields =
            ScrapeResult::from_value(json!({"id": "spoofed", "failed": true, "x": 1})).unwrap();
        let record = RoomRecord::Success {
            id: RoomId::new("r1"),
            fields,
        };

        let payload = record.to_payload();
        assert_eq!(payload["id"], json!("r1"));
        assert_eq!(payload["failed"], json!(false));
        assert_eq!(payload["x"], json!(1));
    }

    #[test]
    fn test_failure_payload_has_only_id_and_flag() {
        let record = RoomRecord::Failure {
            id: RoomId::new("r2"),
        };
        assert_eq!(
            Value::Object(record.to_payload()),
            json!({"id": "r2", "failed": true})
        );
    }

    #[test]
    fn test_scrape_result_rejects_non_objects() {
        assert!(ScrapeResult::from_value(json!([1, 2])).is_none());
        assert!(ScrapeResult::from_value(json!("text")).is_none());
        assert!(ScrapeResult::from_value(Value::Null).is_none());
        assert!(ScrapeResult::from_value(json!({})).is_some());
    }

    #[test]
    fn test_room_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&RoomId::new("abc")).unwrap();
        assert_eq!(json, r#""abc""#);
    }

    #[test]
    fn test_run_summary_serialization() {
        let summary = RunSummary {
            started_at: Utc::now(),
            total_rooms: 5,
            processed_count: 5,
            succeeded: 4,
            failed: 1,
            unflagged_failures: 0,
            batches: 3,
            elapsed_seconds: 1.25,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["total_rooms"], 5);
        assert_eq!(json["failed"], 1);
    }
}
