//! Typed views of upstream messages.
//!
//! The bridge forwards payloads opaque; these types exist for diagnostics
//! (logging subscription confirmations, signatures at debug level) and for
//! downstream consumers that link this crate to decode queue entries.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Replies longer than this are never treated as subscription replies.
const MAX_REPLY_LEN: usize = 512;

/// A `logsNotification` push message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogsNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: NotificationParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationParams {
    pub subscription: u64,
    pub result: NotificationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationResult {
    #[serde(default)]
    pub context: Option<SlotContext>,
    pub value: LogsValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotContext {
    pub slot: u64,
}

/// Per-transaction payload of a logs notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogsValue {
    pub signature: String,
    #[serde(default)]
    pub err: TxError,
    #[serde(default)]
    pub logs: Vec<String>,
}

/// Transaction error as reported by the node.
///
/// The node sends `null` on success and an implementation-defined JSON
/// structure on failure; the structure is carried through untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TxError {
    #[default]
    None,
    Failed(Value),
}

impl TxError {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl Serialize for TxError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_none(),
            Self::Failed(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TxError {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Self::None,
            Some(v) => Self::Failed(v),
        })
    }
}

impl LogsNotification {
    /// Decode a message; `None` if it is not a logs notification.
    pub fn parse(text: &str) -> Option<Self> {
        let n: Self = serde_json::from_str(text).ok()?;
        (n.method == "logsNotification").then_some(n)
    }

    pub fn signature(&self) -> &str {
        &self.params.result.value.signature
    }

    pub fn slot(&self) -> Option<u64> {
        self.params.result.context.map(|c| c.slot)
    }
}

/// Reply to a subscription request.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionReply {
    /// Node accepted request `id` and assigned it `subscription`.
    Confirmed { id: u64, subscription: u64 },
    /// Node rejected request `id`.
    Rejected { id: u64, code: i64, message: String },
}

#[derive(Deserialize)]
struct RawReply {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<RawRpcError>,
}

#[derive(Deserialize)]
struct RawRpcError {
    code: i64,
    message: String,
}

impl SubscriptionReply {
    /// Recognise a subscription reply without decoding notifications.
    ///
    /// Notifications carry a `"method"` key and are usually much larger than
    /// a reply, so both are checked before any JSON parsing happens.
    pub fn parse(text: &str) -> Option<Self> {
        if text.len() > MAX_REPLY_LEN || text.contains("\"method\"") {
            return None;
        }
        let raw: RawReply = serde_json::from_str(text).ok()?;
        let id = raw.id?;
        if let Some(err) = raw.error {
            return Some(Self::Rejected {
                id,
                code: err.code,
                message: err.message,
            });
        }
        let subscription = raw.result?.as_u64()?;
        Some(Self::Confirmed { id, subscription })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTIFICATION: &str = r#"{
        "jsonrpc":"2.0","method":"logsNotification",
        "params":{"result":{"context":{"slot":5208469},
            "value":{"signature":"5h6xBEauJ3PK6SWCZ1PGjBvj8vDdWG3KpwATGy1ARAXFSDwt8GFXM7W5Ncn16wmqokgpiKRLuS83KUxyZyv2sUYv",
                "err":null,"logs":["Program 11111111111111111111111111111111 invoke [1]"]}},
            "subscription":24040}
    }"#;

    #[test]
    fn parse_successful_notification() {
        let n = LogsNotification::parse(NOTIFICATION).unwrap();
        assert_eq!(n.params.subscription, 24040);
        assert_eq!(n.slot(), Some(5208469));
        assert!(n.signature().starts_with("5h6xBE"));
        assert_eq!(n.params.result.value.err, TxError::None);
        assert_eq!(n.params.result.value.logs.len(), 1);
    }

    #[test]
    fn structured_error_is_preserved() {
        let text = r#"{"jsonrpc":"2.0","method":"logsNotification","params":{"subscription":1,
            "result":{"value":{"signature":"sig","err":{"InstructionError":[0,{"Custom":6001}]},"logs":[]}}}}"#;
        let n = LogsNotification::parse(text).unwrap();
        let err = &n.params.result.value.err;
        assert!(err.is_failed());
        assert_eq!(
            serde_json::to_value(err).unwrap(),
            serde_json::json!({"InstructionError":[0,{"Custom":6001}]})
        );
    }

    #[test]
    fn missing_err_defaults_to_none() {
        let v: LogsValue = serde_json::from_str(r#"{"signature":"sig"}"#).unwrap();
        assert_eq!(v.err, TxError::None);
        assert_eq!(serde_json::to_value(&v.err).unwrap(), Value::Null);
    }

    #[test]
    fn other_methods_are_not_notifications() {
        let text = r#"{"jsonrpc":"2.0","method":"slotNotification","params":{"subscription":1,"result":{"value":{"signature":"x"}}}}"#;
        assert!(LogsNotification::parse(text).is_none());
    }

    #[test]
    fn subscription_confirmation() {
        let reply = SubscriptionReply::parse(r#"{"jsonrpc":"2.0","result":23784,"id":1}"#);
        assert_eq!(
            reply,
            Some(SubscriptionReply::Confirmed { id: 1, subscription: 23784 })
        );
    }

    #[test]
    fn subscription_rejection() {
        let reply = SubscriptionReply::parse(
            r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid Request: Only 1 address supported"},"id":3}"#,
        );
        match reply {
            Some(SubscriptionReply::Rejected { id, code, .. }) => {
                assert_eq!(id, 3);
                assert_eq!(code, -32602);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn notifications_are_not_replies() {
        assert!(SubscriptionReply::parse(NOTIFICATION).is_none());
        assert!(SubscriptionReply::parse("not json").is_none());
    }
}
