//! `logsSubscribe` JSON-RPC 2.0 wire types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::watch::WatchSet;

/// Subscription method sent for every request.
pub const LOGS_SUBSCRIBE: &str = "logsSubscribe";

/// Node commitment level attached to each subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

impl std::fmt::Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Self::Processed),
            "confirmed" => Ok(Self::Confirmed),
            "finalized" => Ok(Self::Finalized),
            other => Err(format!("unknown commitment '{other}'")),
        }
    }
}

/// First positional parameter of `logsSubscribe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogsFilter {
    /// Every transaction log (`"all"`).
    All,
    /// Transactions mentioning any of the given addresses.
    Mentions(Vec<String>),
}

impl LogsFilter {
    pub fn to_value(&self) -> Value {
        match self {
            Self::All => Value::String("all".into()),
            Self::Mentions(ids) => json!({ "mentions": ids }),
        }
    }
}

/// A JSON-RPC 2.0 subscription request.
///
/// Field order matches what the node documentation shows:
/// `{"jsonrpc","id","method","params"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

impl SubscriptionRequest {
    /// Create a `logsSubscribe` request.
    pub fn new(id: u64, filter: &LogsFilter, commitment: Commitment) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            method: LOGS_SUBSCRIBE.into(),
            params: vec![
                filter.to_value(),
                json!({ "commitment": commitment.as_str() }),
            ],
        }
    }

    /// Serialize to the text frame sent upstream.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// The full, ordered set of subscriptions opened on every connection.
///
/// A plan is built once from the watch set and replayed unchanged after every
/// reconnect; ids are assigned per connection by [`SubscriptionPlan::requests`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionPlan {
    filters: Vec<LogsFilter>,
    commitment: Commitment,
}

impl SubscriptionPlan {
    /// One `mentions` subscription per watched identifier, or a single
    /// catch-all subscription when the set is empty.
    pub fn for_watch_set(watch: &WatchSet, commitment: Commitment) -> Self {
        let filters = if watch.is_empty() {
            vec![LogsFilter::All]
        } else {
            watch
                .iter()
                .map(|id| LogsFilter::Mentions(vec![id.to_string()]))
                .collect()
        };
        Self { filters, commitment }
    }

    pub fn filters(&self) -> &[LogsFilter] {
        &self.filters
    }

    pub fn commitment(&self) -> Commitment {
        self.commitment
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Materialize the requests with ids `first_id, first_id + 1, ...`.
    pub fn requests(&self, first_id: u64) -> Vec<SubscriptionRequest> {
        self.filters
            .iter()
            .zip(first_id..)
            .map(|(filter, id)| SubscriptionRequest::new(id, filter, self.commitment))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catch_all_request_wire_format() {
        let req = SubscriptionRequest::new(1, &LogsFilter::All, Commitment::Confirmed);
        assert_eq!(
            req.to_json().unwrap(),
            r#"{"jsonrpc":"2.0","id":1,"method":"logsSubscribe","params":["all",{"commitment":"confirmed"}]}"#
        );
    }

    #[test]
    fn mentions_request_wire_format() {
        let filter = LogsFilter::Mentions(vec!["TokenA".into()]);
        let req = SubscriptionRequest::new(7, &filter, Commitment::Finalized);
        assert_eq!(
            req.to_json().unwrap(),
            r#"{"jsonrpc":"2.0","id":7,"method":"logsSubscribe","params":[{"mentions":["TokenA"]},{"commitment":"finalized"}]}"#
        );
    }

    #[test]
    fn empty_watch_set_yields_single_catch_all() {
        let plan = SubscriptionPlan::for_watch_set(&WatchSet::empty(), Commitment::Confirmed);
        assert_eq!(plan.filters(), &[LogsFilter::All]);
    }

    #[test]
    fn one_request_per_identifier_with_sequential_ids() {
        let watch = WatchSet::new(["TokenB", "TokenA"]);
        let plan = SubscriptionPlan::for_watch_set(&watch, Commitment::Confirmed);
        let reqs = plan.requests(1);
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].id, 1);
        assert_eq!(reqs[1].id, 2);
        assert_eq!(reqs[0].params[0], json!({ "mentions": ["TokenA"] }));
        assert_eq!(reqs[1].params[0], json!({ "mentions": ["TokenB"] }));
    }

    #[test]
    fn replay_is_identical_modulo_id() {
        let plan = SubscriptionPlan::for_watch_set(
            &WatchSet::new(["TokenA", "TokenB", "TokenC"]),
            Commitment::Confirmed,
        );
        let first = plan.requests(1);
        let replay = plan.requests(40);
        for (a, b) in first.iter().zip(&replay) {
            assert_eq!(a.method, b.method);
            assert_eq!(a.params, b.params);
            assert_eq!(a.jsonrpc, b.jsonrpc);
        }
        assert_eq!(plan.requests(1), first);
    }

    #[test]
    fn commitment_parses_case_insensitively() {
        assert_eq!("Finalized".parse::<Commitment>().unwrap(), Commitment::Finalized);
        assert!("recent".parse::<Commitment>().is_err());
    }
}
