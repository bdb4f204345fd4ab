//! Bridge configuration.
//!
//! Loaded once from YAML, then overridden by `CHAINFEED_*` environment
//! variables, then validated. Every section has defaults, so an empty file
//! plus `CHAINFEED_UPSTREAM_URL` is a complete configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use chainfeed_core::error::ConfigError;
use chainfeed_core::policy::{BackoffConfig, BackoffPolicy};
use chainfeed_core::request::Commitment;
use chainfeed_core::watch::WatchSet;
use chainfeed_observability::LogConfig;
use chainfeed_queue::{PushSide, RedisConfig};
use chainfeed_ws::{ConnectionLimits, WsConnector};

pub const ENV_UPSTREAM_URL: &str = "CHAINFEED_UPSTREAM_URL";
pub const ENV_COMMITMENT: &str = "CHAINFEED_COMMITMENT";
pub const ENV_QUEUE_URL: &str = "CHAINFEED_QUEUE_URL";
pub const ENV_QUEUE_NAME: &str = "CHAINFEED_QUEUE_NAME";
pub const ENV_WATCH: &str = "CHAINFEED_WATCH";
pub const ENV_ON_EMPTY: &str = "CHAINFEED_ON_EMPTY";
pub const ENV_LOG_LEVEL: &str = "CHAINFEED_LOG_LEVEL";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    /// File this configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// The node's push-subscription endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// `ws://` or `wss://` URL. Required.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub commitment: Commitment,
    /// Cap on a single reassembled message
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
}

fn default_max_message_bytes() -> usize { 16 * 1024 * 1024 }
fn default_connect_timeout_ms() -> u64 { 10_000 }
fn default_close_timeout_ms() -> u64 { 2_000 }

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            commitment: Commitment::default(),
            max_message_bytes: default_max_message_bytes(),
            connect_timeout_ms: default_connect_timeout_ms(),
            close_timeout_ms: default_close_timeout_ms(),
        }
    }
}

impl UpstreamConfig {
    pub fn limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            max_message_bytes: self.max_message_bytes,
            close_timeout: Duration::from_millis(self.close_timeout_ms),
        }
    }

    pub fn connector(&self) -> WsConnector {
        WsConnector::new(
            Duration::from_millis(self.connect_timeout_ms),
            self.max_message_bytes,
        )
    }
}

/// Delay between reconnect attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// 1.0 gives a fixed delay
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_initial_backoff_ms() -> u64 { 1_000 }
fn default_max_backoff_ms() -> u64 { 60_000 }
fn default_multiplier() -> f64 { 2.0 }

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(BackoffConfig {
            initial: Duration::from_millis(self.initial_backoff_ms),
            max: Duration::from_millis(self.max_backoff_ms),
            multiplier: self.multiplier,
        })
    }
}

/// What to do when no identifiers are configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnEmpty {
    /// Subscribe to everything and forward every message.
    #[default]
    PassThrough,
    /// Refuse to start.
    FailFast,
    /// Re-read the configuration until identifiers appear.
    Wait,
}

impl OnEmpty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PassThrough => "pass_through",
            Self::FailFast => "fail_fast",
            Self::Wait => "wait",
        }
    }
}

impl std::fmt::Display for OnEmpty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnEmpty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pass_through" | "passthrough" => Ok(Self::PassThrough),
            "fail_fast" | "failfast" => Ok(Self::FailFast),
            "wait" => Ok(Self::Wait),
            other => Err(format!(
                "unknown on_empty policy '{other}' (expected pass_through, fail_fast or wait)"
            )),
        }
    }
}

/// Watched identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// A YAML list or a comma-separated string
    #[serde(default, deserialize_with = "identifiers")]
    pub identifiers: Vec<String>,
    #[serde(default)]
    pub on_empty: OnEmpty,
    /// Re-read interval under `on_empty: wait`
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 { 5_000 }

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            identifiers: vec![],
            on_empty: OnEmpty::default(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WatchConfig {
    pub fn watch_set(&self) -> WatchSet {
        WatchSet::new(&self.identifiers)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn identifiers<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Identifiers {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Option::<Identifiers>::deserialize(deserializer)? {
        Some(Identifiers::List(ids)) => ids,
        Some(Identifiers::Csv(list)) => split_list(&list),
        None => vec![],
    })
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Destination queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// `redis://` or `rediss://` URL
    #[serde(default = "default_queue_url")]
    pub url: String,
    /// Name of the Redis list
    #[serde(default = "default_queue_name")]
    pub name: String,
    #[serde(default)]
    pub push: PushSide,
    #[serde(default = "default_queue_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_queue_url() -> String { "redis://127.0.0.1:6379".to_string() }
fn default_queue_name() -> String { "solana_analyze_queue".to_string() }
fn default_queue_timeout_ms() -> u64 { 5_000 }

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: default_queue_url(),
            name: default_queue_name(),
            push: PushSide::default(),
            timeout_ms: default_queue_timeout_ms(),
        }
    }
}

impl QueueConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn redis(&self) -> RedisConfig {
        RedisConfig {
            url: self.url.clone(),
            push: self.push,
            timeout: self.timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// How long `stop` waits for the bridge task before aborting it
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
}

fn default_grace_ms() -> u64 { 5_000 }

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_ms: default_grace_ms(),
        }
    }
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

impl BridgeConfig {
    /// Read an optional YAML file, apply the process environment, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&text)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse YAML. An empty document yields the defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Override fields from `CHAINFEED_*` variables. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var(ENV_UPSTREAM_URL) {
            self.upstream.url = url;
        }
        if let Some(commitment) = var(ENV_COMMITMENT) {
            self.upstream.commitment = commitment
                .parse::<Commitment>()
                .map_err(|e: String| ConfigError::invalid(ENV_COMMITMENT, e))?;
        }
        if let Some(url) = var(ENV_QUEUE_URL) {
            self.queue.url = url;
        }
        if let Some(name) = var(ENV_QUEUE_NAME) {
            self.queue.name = name;
        }
        if let Some(list) = var(ENV_WATCH) {
            self.watch.identifiers = split_list(&list);
        }
        if let Some(policy) = var(ENV_ON_EMPTY) {
            self.watch.on_empty = policy
                .parse::<OnEmpty>()
                .map_err(|e: String| ConfigError::invalid(ENV_ON_EMPTY, e))?;
        }
        if let Some(level) = var(ENV_LOG_LEVEL) {
            self.log.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "upstream.url".into(),
            });
        }
        check_scheme("upstream.url", &self.upstream.url, &["ws", "wss"])?;
        check_scheme("queue.url", &self.queue.url, &["redis", "rediss"])?;

        if self.queue.name.trim().is_empty() {
            return Err(ConfigError::invalid("queue.name", "must not be empty"));
        }

        positive("upstream.max_message_bytes", self.upstream.max_message_bytes as u64)?;
        positive("upstream.connect_timeout_ms", self.upstream.connect_timeout_ms)?;
        positive("upstream.close_timeout_ms", self.upstream.close_timeout_ms)?;
        positive("reconnect.initial_backoff_ms", self.reconnect.initial_backoff_ms)?;
        positive("watch.poll_interval_ms", self.watch.poll_interval_ms)?;
        positive("queue.timeout_ms", self.queue.timeout_ms)?;
        positive("shutdown.grace_ms", self.shutdown.grace_ms)?;

        if self.reconnect.max_backoff_ms < self.reconnect.initial_backoff_ms {
            return Err(ConfigError::invalid(
                "reconnect.max_backoff_ms",
                "must be at least reconnect.initial_backoff_ms",
            ));
        }
        if !self.reconnect.multiplier.is_finite() || self.reconnect.multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "reconnect.multiplier",
                format!("must be a finite number >= 1.0, got {}", self.reconnect.multiplier),
            ));
        }
        Ok(())
    }
}

fn check_scheme(field: &str, raw: &str, allowed: &[&str]) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| ConfigError::invalid(field, e.to_string()))?;
    if !allowed.contains(&parsed.scheme()) {
        return Err(ConfigError::invalid(
            field,
            format!(
                "scheme '{}' not supported (expected {})",
                parsed.scheme(),
                allowed.join(" or ")
            ),
        ));
    }
    Ok(())
}

fn positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(field, "must be greater than zero"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = BridgeConfig::from_yaml_str("").unwrap();
        assert_eq!(config.queue.name, "solana_analyze_queue");
        assert_eq!(config.queue.push, PushSide::Right);
        assert_eq!(config.upstream.commitment, Commitment::Confirmed);
        assert_eq!(config.upstream.max_message_bytes, 16 * 1024 * 1024);
        assert_eq!(config.reconnect.initial_backoff_ms, 1_000);
        assert_eq!(config.reconnect.max_backoff_ms, 60_000);
        assert_eq!(config.watch.on_empty, OnEmpty::PassThrough);
        assert!(config.watch.identifiers.is_empty());
    }

    #[test]
    fn parses_full_yaml() {
        let yaml = r#"
upstream:
  url: wss://node.example/ws
  commitment: finalized
  max_message_bytes: 1048576
reconnect:
  initial_backoff_ms: 500
  multiplier: 1.0
watch:
  identifiers:
    - TokenA
    - TokenB
  on_empty: fail_fast
queue:
  url: rediss://cache:6380
  name: analyze
  push: left
log:
  level: debug
  json: true
"#;
        let config = BridgeConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.upstream.url, "wss://node.example/ws");
        assert_eq!(config.upstream.commitment, Commitment::Finalized);
        assert_eq!(config.upstream.limits().max_message_bytes, 1_048_576);
        assert_eq!(config.reconnect.policy().delay(5), Duration::from_millis(500));
        assert_eq!(config.watch.identifiers, vec!["TokenA", "TokenB"]);
        assert_eq!(config.watch.on_empty, OnEmpty::FailFast);
        assert_eq!(config.queue.push, PushSide::Left);
        assert_eq!(config.queue.name, "analyze");
        assert!(config.log.json);
        config.validate().unwrap();
    }

    #[test]
    fn shipped_example_config_is_valid() {
        let config = BridgeConfig::from_yaml_str(include_str!("../../../config/chainfeed.yaml"))
            .unwrap();
        config.validate().unwrap();
        assert_eq!(config.watch.watch_set().len(), 1);
        assert_eq!(config.queue.push, PushSide::Right);
    }

    #[test]
    fn identifiers_accept_comma_string() {
        let yaml = "watch:\n  identifiers: \" TokenA, ,TokenB ,TokenA\"\n";
        let config = BridgeConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.watch.identifiers, vec!["TokenA", "TokenB", "TokenA"]);

        let watch = config.watch.watch_set();
        assert_eq!(watch.len(), 2);
        assert!(watch.contains("TokenB"));
    }

    #[test]
    fn null_identifiers_are_empty() {
        let config = BridgeConfig::from_yaml_str("watch:\n  identifiers:\n").unwrap();
        assert!(config.watch.watch_set().is_empty());
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = BridgeConfig::from_yaml_str("upstream: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = BridgeConfig::from_yaml_str("queue:\n  name: from_file\n").unwrap();
        config
            .apply_env(env(&[
                (ENV_UPSTREAM_URL, "ws://127.0.0.1:8900"),
                (ENV_COMMITMENT, "Processed"),
                (ENV_QUEUE_NAME, "from_env"),
                (ENV_WATCH, "TokenA,TokenB"),
                (ENV_ON_EMPTY, "wait"),
                (ENV_LOG_LEVEL, "trace"),
                (ENV_QUEUE_URL, "   "),
            ]))
            .unwrap();

        assert_eq!(config.upstream.url, "ws://127.0.0.1:8900");
        assert_eq!(config.upstream.commitment, Commitment::Processed);
        assert_eq!(config.queue.name, "from_env");
        assert_eq!(config.queue.url, "redis://127.0.0.1:6379");
        assert_eq!(config.watch.identifiers, vec!["TokenA", "TokenB"]);
        assert_eq!(config.watch.on_empty, OnEmpty::Wait);
        assert_eq!(config.log.level, "trace");
    }

    #[test]
    fn bad_env_value_is_rejected() {
        let mut config = BridgeConfig::default();
        let err = config
            .apply_env(env(&[(ENV_ON_EMPTY, "sometimes")]))
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref field, .. } if field == ENV_ON_EMPTY)
        );
    }

    #[test]
    fn validate_requires_upstream_url() {
        let err = BridgeConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field } if field == "upstream.url"));
    }

    #[test]
    fn validate_checks_schemes() {
        let mut config = BridgeConfig::default();
        config.upstream.url = "https://node.example".into();
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "upstream.url")
        );

        config.upstream.url = "wss://node.example".into();
        config.queue.url = "http://cache".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "queue.url"));
    }

    #[test]
    fn validate_checks_limits() {
        let mut config = BridgeConfig::default();
        config.upstream.url = "ws://node".into();
        config.validate().unwrap();

        config.queue.name = " ".into();
        assert!(config.validate().is_err());
        config.queue.name = "q".into();

        config.upstream.max_message_bytes = 0;
        assert!(config.validate().is_err());
        config.upstream.max_message_bytes = 1024;

        config.reconnect.max_backoff_ms = 10;
        assert!(config.validate().is_err());
        config.reconnect.max_backoff_ms = 60_000;

        config.reconnect.multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn on_empty_parses_variants() {
        assert_eq!("pass-through".parse::<OnEmpty>().unwrap(), OnEmpty::PassThrough);
        assert_eq!("FAIL_FAST".parse::<OnEmpty>().unwrap(), OnEmpty::FailFast);
        assert!("never".parse::<OnEmpty>().is_err());
    }
}
