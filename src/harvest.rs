// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Periodic hand-off of accumulated metrics to a collector.
//!
//! Each cycle swaps the agent's global store for an empty one, renders the
//! taken metrics (applying rename rules), and passes the payload to a
//! [`MetricSink`]. When the sink fails with a retryable error the taken
//! metrics are merged back so the next cycle reports them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::config::AgentConfig;
use crate::error::HarvestError;
use crate::metrics::{report, MetricData, MetricStore};

/// Everything reported for one harvest period.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestPayload {
    pub app_name: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub environment: Vec<(String, String)>,
    pub metrics: Vec<MetricData>,
}

impl HarvestPayload {
    fn build(agent: &Agent, store: &MetricStore, period_start: DateTime<Utc>, period_end: DateTime<Utc>) -> Self {
        Self {
            app_name: agent.app_name().to_string(),
            period_start,
            period_end,
            environment: agent.environment().entries(),
            metrics: report::render(store, &agent.rename_rules()),
        }
    }
}

/// Destination for harvested metrics.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn send(&self, payload: HarvestPayload) -> Result<(), HarvestError>;
}

/// Drives harvest cycles for one agent.
pub struct Harvester {
    agent: Agent,
    sink: Arc<dyn MetricSink>,
    interval: Duration,
    period_start: Mutex<DateTime<Utc>>,
}

impl Harvester {
    pub fn new(agent: Agent, sink: Arc<dyn MetricSink>, interval: Duration) -> Self {
        Self {
            agent,
            sink,
            interval,
            period_start: Mutex::new(Utc::now()),
        }
    }

    pub fn from_config(agent: Agent, sink: Arc<dyn MetricSink>, config: &AgentConfig) -> Self {
        Self::new(agent, sink, config.harvest_interval())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one harvest cycle. Returns the number of metrics sent.
    ///
    /// An empty store sends nothing.
    pub async fn harvest_once(&self) -> Result<usize, HarvestError> {
        let period_end = Utc::now();
        let period_start = std::mem::replace(&mut *self.period_start.lock(), period_end);

        let harvested = self.agent.harvest();
        if harvested.is_empty() {
            debug!("Nothing to harvest");
            return Ok(0);
        }

        let payload = HarvestPayload::build(&self.agent, &harvested, period_start, period_end);
        let count = payload.metrics.len();

        match self.sink.send(payload).await {
            Ok(()) => {
                debug!(metrics = count, "Harvest sent");
                Ok(count)
            }
            Err(err) if err.is_retryable() => {
                harvested.merge_into(self.agent.metrics());
                *self.period_start.lock() = period_start;
                warn!(metrics = count, error = %err, "Harvest failed, keeping metrics for next cycle");
                Err(err)
            }
            Err(err) => {
                warn!(metrics = count, error = %err, "Harvest rejected, discarding metrics");
                Err(err)
            }
        }
    }

    /// Harvest every interval on a background task until the handle is shut down.
    ///
    /// A final harvest runs on shutdown.
    pub fn spawn(self) -> HarvestHandle {
        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
        info!(interval_secs = self.interval.as_secs_f64(), "Harvester started");

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let _ = self.harvest_once().await;
                    }
                    _ = &mut shutdown_rx => {
                        let _ = self.harvest_once().await;
                        break;
                    }
                }
            }
            info!("Harvester stopped");
        });

        HarvestHandle { shutdown, task }
    }
}

impl std::fmt::Debug for Harvester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harvester")
            .field("agent", &self.agent)
            .field("interval", &self.interval)
            .finish()
    }
}

/// Handle to a running harvester task.
#[derive(Debug)]
pub struct HarvestHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl HarvestHandle {
    /// Stop the harvester after one final cycle.
    pub async fn shutdown(self) -> Result<(), tokio::task::JoinError> {
        let _ = self.shutdown.send(());
        self.task.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricKey, MetricSpec, RenameRule, RenameRules};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sink(mock: MockMetricSink) -> Arc<dyn MetricSink> {
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_empty_store_sends_nothing() {
        let mut mock = MockMetricSink::new();
        mock.expect_send().times(0);

        let harvester = Harvester::new(Agent::new(), sink(mock), Duration::from_secs(60));
        assert_eq!(harvester.harvest_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_harvest_sends_rendered_metrics() {
        let agent = Agent::new();
        agent.environment().set_dispatcher("http");
        agent.set_rename_rules(RenameRules::from_rules(&[RenameRule::new(
            MetricKey::unscoped("HttpDispatcher"),
            7,
        )]));
        agent.get_or_create_metric("HttpDispatcher", None).record(0.2, 0.2).unwrap();
        agent.get_or_create_metric("Redis/get", None).record(0.01, 0.01).unwrap();

        let mut mock = MockMetricSink::new();
        mock.expect_send()
            .withf(|payload| {
                payload.metrics.len() == 2
                    && payload.metrics[0].spec == MetricSpec::Id(7)
                    && payload.metrics[1].spec == MetricSpec::Literal(MetricKey::unscoped("Redis/get"))
                    && payload.environment == vec![("Dispatcher".to_string(), "http".to_string())]
                    && payload.period_start <= payload.period_end
            })
            .times(1)
            .returning(|_| Ok(()));

        let harvester = Harvester::new(agent.clone(), sink(mock), Duration::from_secs(60));
        assert_eq!(harvester.harvest_once().await.unwrap(), 2);
        assert!(agent.metrics().is_empty());
    }

    #[tokio::test]
    async fn test_retryable_failure_keeps_metrics() {
        let agent = Agent::new();
        agent.get_or_create_metric("HttpDispatcher", None).record(0.2, 0.2).unwrap();

        let mut mock = MockMetricSink::new();
        mock.expect_send()
            .times(1)
            .returning(|_| Err(HarvestError::SinkFailed("503".to_string())));

        let harvester = Harvester::new(agent.clone(), sink(mock), Duration::from_secs(60));
        assert!(harvester.harvest_once().await.is_err());

        // Recorded again after the failed hand-off; both samples are kept.
        agent.get_or_create_metric("HttpDispatcher", None).record(0.1, 0.1).unwrap();
        let stats = agent.metrics().get_existing("HttpDispatcher", None).unwrap().stats();
        assert_eq!(stats.call_count, 2);
    }

    #[tokio::test]
    async fn test_rejected_payload_is_discarded() {
        let agent = Agent::new();
        agent.get_or_create_metric("HttpDispatcher", None).record(0.2, 0.2).unwrap();

        let mut mock = MockMetricSink::new();
        mock.expect_send()
            .times(1)
            .returning(|_| Err(HarvestError::Rejected("400".to_string())));

        let harvester = Harvester::new(agent.clone(), sink(mock), Duration::from_secs(60));
        let err = harvester.harvest_once().await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(agent.metrics().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_runs_final_harvest_on_shutdown() {
        let agent = Agent::new();
        agent.get_or_create_metric("Redis/ping", None).record(0.01, 0.01).unwrap();

        let sent = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&sent);
        let mut mock = MockMetricSink::new();
        mock.expect_send().returning(move |payload| {
            counter.fetch_add(payload.metrics.len(), Ordering::SeqCst);
            Ok(())
        });

        let handle = Harvester::new(agent.clone(), sink(mock), Duration::from_secs(3600)).spawn();
        handle.shutdown().await.unwrap();

        assert_eq!(sent.load(Ordering::SeqCst), 1);
        assert!(agent.metrics().is_empty());
    }

    #[test]
    fn test_from_config_uses_interval() {
        let config = AgentConfig {
            harvest_interval_secs: 5,
            ..AgentConfig::default()
        };
        let harvester = Harvester::from_config(Agent::new(), sink(MockMetricSink::new()), &config);
        assert_eq!(harvester.interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_payload_serializes_camel_case() {
        let agent = Agent::new();
        let store = MetricStore::new();
        store.get_or_create("HttpDispatcher", None).record(1.0, 1.0).unwrap();
        let now = Utc::now();

        let payload = HarvestPayload::build(&agent, &store, now, now);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["appName"], "My Application");
        assert!(json["periodStart"].is_string());
        assert_eq!(json["metrics"][0][0]["name"], "HttpDispatcher");
        assert_eq!(json["metrics"][0][1][0], 1);
    }
}
