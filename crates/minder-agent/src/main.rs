mod commands;
mod config;
mod metrics;
mod settings;
#[cfg(test)]
mod testutil;

use anyhow::Result;
use chrono::Duration;
use metrics::{AgentState, Metric};
use minder_bot::{Bot, ChatId};
use minder_probe::cpu::CpuProbe;
use minder_probe::memory::MemoryProbe;
use minder_telegram::{run_update_pump, TelegramClient};
use settings::{SettingValue, Settings};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("minder=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/minder.toml".to_string());
    let config = config::AgentConfig::load_or_default(&config_path)?;
    let token = config.resolve_token()?;

    tracing::info!(config = %config_path, "minder agent starting");

    let settings = Settings::new();
    settings.register(
        "cpu_threshold",
        "CPU usage alert limit (percent)",
        SettingValue::Float(config.cpu_threshold),
    );
    settings.register(
        "mem_threshold",
        "Memory usage alert limit (percent)",
        SettingValue::Float(config.mem_threshold),
    );
    settings.register(
        "increase_threshold",
        "Sudden increase sensitivity",
        SettingValue::Float(config.increase_threshold),
    );
    settings.register(
        "interval",
        "Sampling interval (minutes)",
        SettingValue::Int(config.interval_mins),
    );

    let live_time = Duration::minutes(config.live_time_mins);
    let state = Arc::new(AgentState {
        settings,
        metrics: vec![
            Arc::new(Metric::new(
                "cpu",
                "CPU usage",
                "cpu_threshold",
                config.cpu_threshold,
                Box::new(CpuProbe::new()),
                live_time,
            )),
            Arc::new(Metric::new(
                "mem",
                "Memory usage",
                "mem_threshold",
                config.mem_threshold,
                Box::new(MemoryProbe::new()),
                live_time,
            )),
        ],
        query_window: Duration::minutes(config.query_window_mins),
        policy: config.anomaly.clone(),
    });

    let telegram = Arc::new(TelegramClient::new(&token)?);
    let router = commands::build_router(Arc::clone(&state), Arc::clone(&telegram));
    let bot = Arc::new(Bot::new(telegram.clone(), router));

    for id in &config.seed_subscribers {
        bot.registry().subscribe(ChatId(*id));
    }
    if bot.registry().count() > 0 {
        tracing::info!(subscribers = bot.registry().count(), "Seeded subscribers");
        bot.broadcast("minder agent started, watching this host.").await;
    }

    let (tx, mut rx) = mpsc::channel(64);
    tokio::spawn(run_update_pump(
        Arc::clone(&telegram),
        tx,
        config.poll_timeout_secs,
    ));

    let mut interval_mins = config.interval_mins.max(1);
    let mut tick =
        tokio::time::interval(std::time::Duration::from_secs(interval_mins as u64 * 60));

    tracing::info!(
        interval_mins,
        query_window_mins = config.query_window_mins,
        live_time_mins = config.live_time_mins,
        "Starting sampling loop"
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {
                metrics::sample_cycle(&state, &bot).await;

                // `/set interval` takes effect on the next tick.
                let configured = state
                    .settings
                    .get_i64("interval")
                    .unwrap_or(interval_mins)
                    .max(1);
                if configured != interval_mins {
                    interval_mins = configured;
                    tick = tokio::time::interval(std::time::Duration::from_secs(
                        interval_mins as u64 * 60,
                    ));
                    tick.reset();
                    tracing::info!(minutes = interval_mins, "Sampling interval changed");
                }
            }
            Some(event) = rx.recv() => {
                tokio::spawn(Arc::clone(&bot).dispatch(event));
            }
            _ = signal::ctrl_c() => {
                tracing::info!("Shutting down gracefully");
                break;
            }
        }
    }

    Ok(())
}
