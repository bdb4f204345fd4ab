//! Bridge orchestration: wire the supervisor to the forwarder and run it as
//! an owned, cancellable task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chainfeed_core::error::ConfigError;
use chainfeed_core::request::SubscriptionPlan;
use chainfeed_core::watch::WatchSet;
use chainfeed_observability::{BridgeMetrics, BridgeStats};
use chainfeed_queue::{QueuePublisher, RedisQueuePublisher};
use chainfeed_ws::{Connector, ReconnectSupervisor};

use crate::config::{BridgeConfig, OnEmpty, WatchConfig};
use crate::error::BridgeError;
use crate::forwarder::Forwarder;

/// Re-reads the watched identifiers under `on_empty: wait`.
pub type ReloadFn = dyn Fn() -> Result<WatchSet, ConfigError> + Send + Sync;

/// Settle the watch set according to `watch.on_empty`.
///
/// Returns `Ok(None)` if `cancel` fires while waiting for identifiers.
pub async fn resolve_watch_set(
    initial: WatchSet,
    watch: &WatchConfig,
    reload: &ReloadFn,
    cancel: &CancellationToken,
) -> Result<Option<WatchSet>, ConfigError> {
    if !initial.is_empty() {
        return Ok(Some(initial));
    }

    match watch.on_empty {
        OnEmpty::PassThrough => {
            info!("watch set is empty, forwarding all traffic");
            Ok(Some(initial))
        }
        OnEmpty::FailFast => Err(ConfigError::EmptyWatchSet),
        OnEmpty::Wait => {
            info!(
                poll_interval_ms = watch.poll_interval_ms,
                "watch set is empty, waiting for identifiers"
            );
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(None),
                    _ = tokio::time::sleep(watch.poll_interval()) => {}
                }
                match reload() {
                    Ok(set) if !set.is_empty() => {
                        info!(watch = %set, "identifiers loaded");
                        return Ok(Some(set));
                    }
                    Ok(_) => debug!("watch set still empty"),
                    Err(e) => warn!(error = %e, "reloading configuration failed"),
                }
            }
        }
    }
}

/// Re-reads the file the configuration came from, with the environment
/// applied on top.
fn reload_from(config: &BridgeConfig) -> Arc<ReloadFn> {
    let base = config.clone();
    Arc::new(move || {
        let mut fresh = match &base.source {
            Some(path) => BridgeConfig::from_file(path)?,
            None => base.clone(),
        };
        fresh.apply_env(|key| std::env::var(key).ok())?;
        Ok(fresh.watch.watch_set())
    })
}

/// A configured, not yet started bridge.
pub struct Bridge {
    config: BridgeConfig,
    watch: WatchSet,
    connector: Arc<dyn Connector>,
    publisher: Arc<dyn QueuePublisher>,
    reload: Arc<ReloadFn>,
    metrics: Arc<BridgeMetrics>,
    cancel: CancellationToken,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        connector: Arc<dyn Connector>,
        publisher: Arc<dyn QueuePublisher>,
    ) -> Self {
        let watch = config.watch.watch_set();
        let reload = reload_from(&config);
        Self {
            config,
            watch,
            connector,
            publisher,
            reload,
            metrics: Arc::new(BridgeMetrics::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Production wiring: WebSocket upstream, Redis list downstream.
    pub fn from_config(config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let connector = Arc::new(config.upstream.connector());
        let publisher = Arc::new(RedisQueuePublisher::new(config.queue.redis())?);
        Ok(Self::new(config, connector, publisher))
    }

    /// Replace the identifier source used under `on_empty: wait`.
    pub fn with_reload<F>(mut self, reload: F) -> Self
    where
        F: Fn() -> Result<WatchSet, ConfigError> + Send + Sync + 'static,
    {
        self.reload = Arc::new(reload);
        self
    }

    /// Run under an externally owned token, e.g. a child of the process token.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Spawn the bridge task.
    ///
    /// Fails immediately, before any network activity, if the watch set is
    /// empty under `on_empty: fail_fast`. Must be called within a Tokio runtime.
    pub fn start(self) -> Result<BridgeHandle, BridgeError> {
        if self.watch.is_empty() && self.config.watch.on_empty == OnEmpty::FailFast {
            return Err(ConfigError::EmptyWatchSet.into());
        }

        let cancel = self.cancel.clone();
        let metrics = Arc::clone(&self.metrics);
        let task = tokio::spawn(self.run());
        Ok(BridgeHandle {
            cancel,
            task,
            metrics,
        })
    }

    async fn run(self) {
        let Bridge {
            config,
            watch,
            connector,
            publisher,
            reload,
            metrics,
            cancel,
        } = self;

        let watch = match resolve_watch_set(watch, &config.watch, reload.as_ref(), &cancel).await {
            Ok(Some(watch)) => watch,
            Ok(None) => {
                info!("bridge cancelled before the watch set resolved");
                return;
            }
            Err(e) => {
                error!(error = %e, "cannot resolve watch set");
                return;
            }
        };

        let plan = SubscriptionPlan::for_watch_set(&watch, config.upstream.commitment);
        info!(
            upstream = %config.upstream.url,
            queue = %config.queue.name,
            backend = publisher.target(),
            watch = %watch,
            subscriptions = plan.len(),
            commitment = %config.upstream.commitment,
            "bridge starting"
        );

        let supervisor = ReconnectSupervisor::new(config.upstream.url.clone(), connector, plan)
            .with_backoff(config.reconnect.policy())
            .with_limits(config.upstream.limits())
            .with_metrics(Arc::clone(&metrics));
        let forwarder = Forwarder::new(
            watch,
            publisher,
            config.queue.name.clone(),
            config.queue.timeout(),
            Arc::clone(&metrics),
        );

        supervisor.run(&forwarder, cancel).await;

        let stats = metrics.snapshot();
        info!(
            received = stats.received,
            forwarded = stats.forwarded,
            filtered_out = stats.filtered_out,
            publish_errors = stats.publish_errors,
            reconnections = stats.reconnections,
            subscriptions_rejected = stats.subscriptions_rejected,
            "bridge stopped"
        );
    }
}

/// Handle to a running bridge task.
pub struct BridgeHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    metrics: Arc<BridgeMetrics>,
}

impl BridgeHandle {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> BridgeStats {
        self.metrics.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and wait up to `grace` for the task, aborting it on overrun.
    pub async fn stop(mut self, grace: Duration) -> Result<BridgeStats, BridgeError> {
        self.cancel.cancel();
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(joined) => joined.map_err(|e| BridgeError::Task(e.to_string()))?,
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "bridge did not stop within the grace period, aborting"
                );
                self.task.abort();
            }
        }
        Ok(self.metrics.snapshot())
    }

    /// Wait for the task to end on its own or through the cancel token.
    pub async fn join(self) -> Result<BridgeStats, BridgeError> {
        self.task
            .await
            .map_err(|e| BridgeError::Task(e.to_string()))?;
        Ok(self.metrics.snapshot())
    }
}
