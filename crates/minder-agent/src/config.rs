use anyhow::Context;
use minder_alert::AnomalyPolicy;
use serde::Deserialize;

pub const DEFAULT_CPU_THRESHOLD: f64 = 75.0;
pub const DEFAULT_MEM_THRESHOLD: f64 = 85.0;
pub const DEFAULT_INCREASE_THRESHOLD: f64 = 2.0;
pub const DEFAULT_INTERVAL_MINS: i64 = 1;

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    /// Bot token; when absent here, the TG_BOT_TOKEN environment
    /// variable is consulted.
    pub token: Option<String>,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// How long samples are retained.
    #[serde(default = "default_live_time")]
    pub live_time_mins: i64,
    /// Window the averages, charts and anomaly checks look at.
    #[serde(default = "default_query_window")]
    pub query_window_mins: i64,
    /// Initial sampling interval; tunable at runtime via `/set interval`.
    #[serde(default = "default_interval")]
    pub interval_mins: i64,
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold: f64,
    #[serde(default = "default_mem_threshold")]
    pub mem_threshold: f64,
    #[serde(default = "default_increase_threshold")]
    pub increase_threshold: f64,
    /// Sudden-increase detection strategy.
    #[serde(default)]
    pub anomaly: AnomalyPolicy,
    /// Chats subscribed at startup, before anyone sends /subscribe.
    #[serde(default)]
    pub seed_subscribers: Vec<i64>,
}

fn default_poll_timeout() -> u64 {
    50
}

fn default_live_time() -> i64 {
    30
}

fn default_query_window() -> i64 {
    10
}

fn default_interval() -> i64 {
    DEFAULT_INTERVAL_MINS
}

fn default_cpu_threshold() -> f64 {
    DEFAULT_CPU_THRESHOLD
}

fn default_mem_threshold() -> f64 {
    DEFAULT_MEM_THRESHOLD
}

fn default_increase_threshold() -> f64 {
    DEFAULT_INCREASE_THRESHOLD
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            token: None,
            poll_timeout_secs: default_poll_timeout(),
            live_time_mins: default_live_time(),
            query_window_mins: default_query_window(),
            interval_mins: default_interval(),
            cpu_threshold: default_cpu_threshold(),
            mem_threshold: default_mem_threshold(),
            increase_threshold: default_increase_threshold(),
            anomaly: AnomalyPolicy::default(),
            seed_subscribers: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads `path`, falling back to defaults when the file is absent
    /// (the token can still come from the environment).
    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::load(path)
        } else {
            tracing::info!(path, "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Token from the config file or the TG_BOT_TOKEN environment
    /// variable.
    pub fn resolve_token(&self) -> anyhow::Result<String> {
        if let Some(token) = &self.token {
            if !token.is_empty() {
                return Ok(token.clone());
            }
        }
        std::env::var("TG_BOT_TOKEN")
            .context("no bot token: set `token` in the config or the TG_BOT_TOKEN environment variable")
    }
}
