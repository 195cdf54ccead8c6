//! JSON payloads carried inside event frames.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rejected table status value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid table status: {0:?}")]
pub struct InvalidStatus(pub String);

/// Occupancy status of a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    /// Free to seat.
    #[default]
    Available,
    /// Held for a booking.
    Reserved,
    /// Guests are seated.
    Occupied,
}

impl TableStatus {
    /// Every status, in declaration order.
    pub const ALL: [TableStatus; 3] = [
        TableStatus::Available,
        TableStatus::Reserved,
        TableStatus::Occupied,
    ];

    /// Get the wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Available => "available",
            TableStatus::Reserved => "reserved",
            TableStatus::Occupied => "occupied",
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InvalidStatus(s.to_string()))
    }
}

/// One row of a store snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Table number within the store.
    pub table_no: u32,
    /// Current status.
    pub status: TableStatus,
}

/// Encode a store snapshot as a JSON array.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_snapshot(tables: &[TableSnapshot]) -> Result<String, serde_json::Error> {
    serde_json::to_string(tables)
}

/// Envelope of an externally pushed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEnvelope {
    /// Caller-supplied message body.
    pub message: serde_json::Value,
}

impl PushEnvelope {
    /// Wrap a message body.
    #[must_use]
    pub fn new(message: serde_json::Value) -> Self {
        Self { message }
    }

    /// Encode the envelope as the event payload.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_parse() {
        assert_eq!("available".parse::<TableStatus>(), Ok(TableStatus::Available));
        assert_eq!("reserved".parse::<TableStatus>(), Ok(TableStatus::Reserved));
        assert_eq!("occupied".parse::<TableStatus>(), Ok(TableStatus::Occupied));
        assert_eq!(
            "broken".parse::<TableStatus>(),
            Err(InvalidStatus("broken".into()))
        );
        assert!("Available".parse::<TableStatus>().is_err());
    }

    #[test]
    fn test_snapshot_encoding() {
        let tables = [
            TableSnapshot {
                table_no: 1,
                status: TableStatus::Available,
            },
            TableSnapshot {
                table_no: 2,
                status: TableStatus::Occupied,
            },
        ];
        assert_eq!(
            encode_snapshot(&tables).unwrap(),
            r#"[{"table_no":1,"status":"available"},{"table_no":2,"status":"occupied"}]"#
        );
    }

    #[test]
    fn test_push_envelope() {
        let envelope = PushEnvelope::new(json!("Kitchen closes in 10 minutes"));
        assert_eq!(
            envelope.to_payload().unwrap(),
            r#"{"message":"Kitchen closes in 10 minutes"}"#
        );
    }
}
