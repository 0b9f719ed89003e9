//! The monitored metrics and the periodic sampling cycle.

use crate::config;
use crate::settings::Settings;
use chrono::Duration;
use minder_alert::{AnomalyPolicy, Finding, Limits};
use minder_bot::Bot;
use minder_history::History;
use minder_probe::Probe;
use std::sync::{Arc, Mutex};

/// One monitored gauge: its probe, its history and the name of the
/// usage-limit setting that applies to it.
pub struct Metric {
    /// Short key used in command arguments (`cpu`, `mem`).
    pub key: &'static str,
    /// Display label used in messages and chart headers.
    pub label: &'static str,
    /// Settings key holding this metric's usage limit.
    pub usage_setting: &'static str,
    /// Limit applied when `usage_setting` is not registered.
    pub usage_default: f64,
    pub probe: Mutex<Box<dyn Probe>>,
    pub history: Mutex<History>,
}

impl Metric {
    pub fn new(
        key: &'static str,
        label: &'static str,
        usage_setting: &'static str,
        usage_default: f64,
        probe: Box<dyn Probe>,
        live_time: Duration,
    ) -> Self {
        Self {
            key,
            label,
            usage_setting,
            usage_default,
            probe: Mutex::new(probe),
            history: Mutex::new(History::new(live_time, label)),
        }
    }

    /// Reads the probe without recording the value (used by `/status`).
    pub fn peek(&self) -> anyhow::Result<f64> {
        self.probe.lock().unwrap().sample()
    }
}

/// State shared between the sampling loop and the command handlers.
pub struct AgentState {
    pub settings: Settings,
    pub metrics: Vec<Arc<Metric>>,
    pub query_window: Duration,
    pub policy: AnomalyPolicy,
}

impl AgentState {
    /// Looks a metric up by its command-argument key.
    pub fn metric(&self, key: &str) -> Option<&Arc<Metric>> {
        self.metrics.iter().find(|m| m.key == key)
    }

    /// Keys accepted by `/chart` and `/history`, for error replies.
    pub fn metric_keys(&self) -> String {
        self.metrics
            .iter()
            .map(|m| m.key)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One sampling tick: probe every metric, evaluate against the current
/// limits, record the reading, broadcast whatever was raised.
///
/// A failing probe skips its metric for this tick; the others still run.
pub async fn sample_cycle(state: &AgentState, bot: &Bot) {
    for metric in &state.metrics {
        let current = match metric.probe.lock().unwrap().sample() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(metric = metric.key, error = %e, "Probe failed, skipping tick");
                continue;
            }
        };

        let limits = Limits {
            usage: state
                .settings
                .get_f64(metric.usage_setting)
                .unwrap_or(metric.usage_default),
            increase: state
                .settings
                .get_f64("increase_threshold")
                .unwrap_or(config::DEFAULT_INCREASE_THRESHOLD),
        };

        let findings = {
            let mut history = metric.history.lock().unwrap();
            minder_alert::observe(
                &mut history,
                current,
                state.query_window,
                &limits,
                &state.policy,
            )
        };
        tracing::debug!(metric = metric.key, value = current, "Sampled");

        for finding in findings {
            let message = render_finding(metric, &finding);
            tracing::info!(metric = metric.key, alert = %message, "Raising alert");
            bot.broadcast(&message).await;
        }
    }
}

/// Chat wording for one finding.
pub fn render_finding(metric: &Metric, finding: &Finding) -> String {
    match finding {
        Finding::HighUsage { value } => {
            format!("High {} detected: {:.2}%", metric.label, value)
        }
        Finding::SuddenIncrease {
            value,
            average,
            score,
        } => format!(
            "Sudden increase in {} detected: current {:.2}%, average {:.2}% (score {:.2})",
            metric.label, value, average, score
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingValue;
    use crate::testutil::{BrokenProbe, RecordingTransport, StaticProbe};
    use minder_bot::{ChatId, RouterBuilder};

    const WATCHER: ChatId = ChatId(42);

    fn test_state(probe: Box<dyn Probe>) -> AgentState {
        let settings = Settings::new();
        settings.register("cpu_threshold", "CPU limit", SettingValue::Float(75.0));
        settings.register("mem_threshold", "Memory limit", SettingValue::Float(85.0));
        settings.register(
            "increase_threshold",
            "Increase sensitivity",
            SettingValue::Float(2.0),
        );
        AgentState {
            settings,
            metrics: vec![Arc::new(Metric::new(
                "cpu",
                "CPU usage",
                "cpu_threshold",
                75.0,
                probe,
                Duration::minutes(30),
            ))],
            query_window: Duration::minutes(10),
            policy: AnomalyPolicy::default(),
        }
    }

    #[tokio::test]
    async fn high_reading_is_recorded_and_broadcast() {
        let state = test_state(Box::new(StaticProbe(91.2)));
        let transport = Arc::new(RecordingTransport::new());
        let bot = Bot::new(transport.clone(), RouterBuilder::new().build());
        bot.registry().subscribe(WATCHER);

        sample_cycle(&state, &bot).await;

        assert_eq!(
            transport.texts_to(WATCHER),
            vec!["High CPU usage detected: 91.20%".to_string()]
        );
        assert_eq!(state.metrics[0].history.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quiet_reading_is_recorded_silently() {
        let state = test_state(Box::new(StaticProbe(12.0)));
        let transport = Arc::new(RecordingTransport::new());
        let bot = Bot::new(transport.clone(), RouterBuilder::new().build());
        bot.registry().subscribe(WATCHER);

        sample_cycle(&state, &bot).await;

        assert!(transport.take().is_empty());
        assert_eq!(state.metrics[0].history.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_probe_skips_the_tick() {
        let state = test_state(Box::new(BrokenProbe));
        let transport = Arc::new(RecordingTransport::new());
        let bot = Bot::new(transport.clone(), RouterBuilder::new().build());
        bot.registry().subscribe(WATCHER);

        sample_cycle(&state, &bot).await;

        assert!(transport.take().is_empty());
        assert!(state.metrics[0].history.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_usage_setting_falls_back_to_the_metric_default() {
        let settings = Settings::new();
        settings.register(
            "increase_threshold",
            "Increase sensitivity",
            SettingValue::Float(2.0),
        );
        let state = AgentState {
            settings,
            metrics: vec![Arc::new(Metric::new(
                "mem",
                "Memory usage",
                "mem_threshold",
                85.0,
                Box::new(StaticProbe(80.0)),
                Duration::minutes(30),
            ))],
            query_window: Duration::minutes(10),
            policy: AnomalyPolicy::default(),
        };
        let transport = Arc::new(RecordingTransport::new());
        let bot = Bot::new(transport.clone(), RouterBuilder::new().build());
        bot.registry().subscribe(WATCHER);

        sample_cycle(&state, &bot).await;

        // 80.0 is over the CPU limit but under this metric's own 85.0;
        // only the metric's default may fill the gap.
        assert!(transport.take().is_empty());
        assert_eq!(state.metrics[0].history.lock().unwrap().len(), 1);
    }

    #[test]
    fn finding_wording() {
        let metric = Metric::new(
            "cpu",
            "CPU usage",
            "cpu_threshold",
            75.0,
            Box::new(StaticProbe(0.0)),
            Duration::minutes(30),
        );
        assert_eq!(
            render_finding(&metric, &Finding::HighUsage { value: 91.2 }),
            "High CPU usage detected: 91.20%"
        );
        assert_eq!(
            render_finding(
                &metric,
                &Finding::SuddenIncrease {
                    value: 50.0,
                    average: 10.0,
                    score: 3.46,
                }
            ),
            "Sudden increase in CPU usage detected: current 50.00%, average 10.00% (score 3.46)"
        );
    }
}
