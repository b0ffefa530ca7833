//! # Sync Protocol Messages
//!
//! JSON bodies exchanged with the sync server.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Sync Protocol Messages                             │
//! │                                                                         │
//! │  PUSH                                                                   │
//! │  ────                                                                   │
//! │  POST /api/sync/push                                                    │
//! │  client ───► PushRequest  { terminalId, fromToken, changes: [..] }      │
//! │  client ◄─── PushResponse { accepted, serverToken }                     │
//! │                                                                         │
//! │  PULL                                                                   │
//! │  ────                                                                   │
//! │  GET /api/sync/pull?terminalId=..&since=..&max=..                       │
//! │  client ◄─── PullResponse { changes: [..], serverToken }                │
//! │                                                                         │
//! │  HEALTH                                                                 │
//! │  ──────                                                                 │
//! │  GET /api/health          success status only                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Field names are lowerCamelCase and the operation is a small integer:
//! ```json
//! { "entity": "Sale", "publicId": "…", "op": 0,
//!   "payloadJson": "{\"receiptNumber\":\"R-1\",…}", "tsUtc": "2024-03-01T12:00:00Z" }
//! ```
//! The local outbox token never goes on the wire. `op` is kept as the raw
//! code until conversion, so an unknown code surfaces as
//! [`SyncError::UnknownOperation`] instead of a generic decode failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use harbor_core::{ChangeEnvelope, ChangeOperation, ChangeRecord};

// =============================================================================
// Change (wire form of one envelope)
// =============================================================================

/// One change as it appears in push and pull bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChange {
    /// Entity kind name, bare or namespace-qualified.
    pub entity: String,
    pub public_id: Uuid,
    /// Operation code, see [`ChangeOperation::code`].
    pub op: i64,
    /// The entity document, itself JSON-encoded as a string.
    pub payload_json: String,
    pub ts_utc: DateTime<Utc>,
}

impl From<&ChangeRecord> for WireChange {
    fn from(record: &ChangeRecord) -> Self {
        WireChange {
            entity: record.entity_kind.clone(),
            public_id: record.public_id,
            op: record.operation.code().into(),
            payload_json: record.payload.clone(),
            ts_utc: record.occurred_at,
        }
    }
}

impl WireChange {
    /// Decodes the operation code.
    pub fn operation(&self) -> SyncResult<ChangeOperation> {
        Ok(ChangeOperation::from_code(self.op)?)
    }
}

impl TryFrom<WireChange> for ChangeEnvelope {
    type Error = SyncError;

    fn try_from(change: WireChange) -> SyncResult<Self> {
        let operation = change.operation()?;
        Ok(ChangeEnvelope {
            entity_kind: change.entity,
            public_id: change.public_id,
            operation,
            payload: change.payload_json,
            occurred_at: change.ts_utc,
        })
    }
}

impl From<ChangeEnvelope> for WireChange {
    fn from(envelope: ChangeEnvelope) -> Self {
        WireChange {
            entity: envelope.entity_kind,
            public_id: envelope.public_id,
            op: envelope.operation.code().into(),
            payload_json: envelope.payload,
            ts_utc: envelope.occurred_at,
        }
    }
}

// =============================================================================
// Push
// =============================================================================

/// Body of `POST /api/sync/push`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub terminal_id: String,
    /// The cursor value when the batch was built.
    pub from_token: i64,
    /// Oldest first.
    pub changes: Vec<WireChange>,
}

impl PushRequest {
    pub fn new(terminal_id: impl Into<String>, from_token: i64, records: &[ChangeRecord]) -> Self {
        PushRequest {
            terminal_id: terminal_id.into(),
            from_token,
            changes: records.iter().map(WireChange::from).collect(),
        }
    }
}

/// Success body of `POST /api/sync/push`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    /// Length of the oldest-first prefix the server stored.
    ///
    /// Unsigned: a negative count does not parse.
    pub accepted: u32,
    pub server_token: i64,
}

// =============================================================================
// Pull
// =============================================================================

/// Query string of `GET /api/sync/pull`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullQuery<'a> {
    pub terminal_id: &'a str,
    pub since: i64,
    pub max: usize,
}

/// Success body of `GET /api/sync/pull`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    /// In server order; applied in this order.
    pub changes: Vec<WireChange>,
    pub server_token: i64,
}

impl PullResponse {
    /// Converts the changes into envelopes, preserving order.
    ///
    /// Fails with [`SyncError::UnknownOperation`] on the first change whose
    /// `op` is neither upsert nor delete.
    pub fn into_envelopes(self) -> SyncResult<(Vec<ChangeEnvelope>, i64)> {
        let envelopes = self
            .changes
            .into_iter()
            .map(ChangeEnvelope::try_from)
            .collect::<SyncResult<Vec<_>>>()?;
        Ok((envelopes, self.server_token))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(token: i64) -> ChangeRecord {
        ChangeRecord {
            token,
            entity_kind: "Sale".to_string(),
            public_id: Uuid::nil(),
            operation: ChangeOperation::Delete,
            payload: r#"{"receiptNumber":"R-1"}"#.to_string(),
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_push_request_wire_shape() {
        let request = PushRequest::new("register-01", 7, &[record(10)]);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["terminalId"], "register-01");
        assert_eq!(value["fromToken"], 7);

        let change = &value["changes"][0];
        assert_eq!(change["entity"], "Sale");
        assert_eq!(change["publicId"], Uuid::nil().to_string());
        assert_eq!(change["op"], 1);
        assert_eq!(change["payloadJson"], r#"{"receiptNumber":"R-1"}"#);
        assert!(change["tsUtc"].as_str().unwrap().starts_with("2024-03-01T12:00:00"));
        assert!(change.get("token").is_none());
    }

    #[test]
    fn test_push_response_rejects_negative_accepted() {
        let ok: PushResponse =
            serde_json::from_value(json!({ "accepted": 2, "serverToken": 12 })).unwrap();
        assert_eq!(ok.accepted, 2);
        assert_eq!(ok.server_token, 12);

        assert!(serde_json::from_value::<PushResponse>(
            json!({ "accepted": -1, "serverToken": 12 })
        )
        .is_err());
    }

    #[test]
    fn test_pull_response_preserves_order() {
        let body = json!({
            "changes": [
                { "entity": "Product", "publicId": "00000000-0000-0000-0000-000000000001",
                  "op": 0, "payloadJson": "{}", "tsUtc": "2024-03-01T12:00:00Z" },
                { "entity": "Documents.Sale", "publicId": "00000000-0000-0000-0000-000000000002",
                  "op": 1, "payloadJson": "{}", "tsUtc": "2024-03-01T12:00:01Z" }
            ],
            "serverToken": 103
        });

        let response: PullResponse = serde_json::from_value(body).unwrap();
        let (envelopes, server_token) = response.into_envelopes().unwrap();

        assert_eq!(server_token, 103);
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].entity_kind, "Product");
        assert_eq!(envelopes[1].entity_kind, "Documents.Sale");
        assert_eq!(envelopes[1].operation, ChangeOperation::Delete);
    }

    #[test]
    fn test_unknown_op_code_is_unknown_operation() {
        let body = json!({
            "changes": [
                { "entity": "Product", "publicId": "00000000-0000-0000-0000-000000000001",
                  "op": 7, "payloadJson": "{}", "tsUtc": "2024-03-01T12:00:00Z" }
            ],
            "serverToken": 4
        });

        // The body itself parses; the code is rejected on conversion
        let response: PullResponse = serde_json::from_value(body).unwrap();
        let err = response.into_envelopes().unwrap_err();

        assert!(matches!(err, SyncError::UnknownOperation(7)));
        assert!(err.is_protocol_error());
    }

    #[test]
    fn test_pull_query_serializes_camel_case() {
        let query = PullQuery {
            terminal_id: "register-01",
            since: 100,
            max: 500,
        };
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value, json!({ "terminalId": "register-01", "since": 100, "max": 500 }));
    }
}
