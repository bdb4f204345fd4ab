//! Watched identifiers and the forward-or-drop predicate.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::message::CompleteMessage;

/// Immutable, deduplicated set of watched identifiers (token addresses).
///
/// Cloning is cheap; clones share the same storage. Membership is
/// case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet {
    ids: Arc<BTreeSet<String>>,
}

impl WatchSet {
    /// Build a set from identifiers. Surrounding whitespace is trimmed and
    /// blank entries are dropped.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = ids
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { ids: Arc::new(ids) }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list, e.g. `"TokenA, TokenB"`.
    pub fn parse_list(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Identifiers in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Returns `true` if any watched identifier occurs verbatim in `text`.
    pub fn matches(&self, text: &str) -> bool {
        self.ids.iter().any(|id| text.contains(id.as_str()))
    }

    /// Decide whether a message is forwarded.
    ///
    /// An empty set forwards everything. Otherwise this is a substring test
    /// over the raw payload; an identifier appearing outside the account
    /// fields still counts as a match.
    pub fn should_forward(&self, message: &CompleteMessage) -> bool {
        self.is_empty() || self.matches(message.as_str())
    }
}

impl std::fmt::Display for WatchSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", ids.join(", "))
    }
}
