//! Command and button registrations plus their handlers.
//!
//! Handlers close over the shared [`AgentState`] (and, for the few
//! Telegram-specific extras, the concrete client); everything else they
//! need arrives through the dispatched event and the bot itself.

use crate::metrics::{sample_cycle, AgentState};
use minder_bot::{Bot, ChatId, InboundEvent, Router, RouterBuilder};
use minder_history::render;
use minder_telegram::TelegramClient;
use std::sync::Arc;

/// Builds the frozen dispatch tables for the agent.
pub fn build_router(state: Arc<AgentState>, telegram: Arc<TelegramClient>) -> Router {
    let mut builder = RouterBuilder::new()
        .command("subscribe", "Subscribe this chat to alerts", |bot, event| {
            async move { subscribe(bot, event.sender()).await }
        })
        .command("unsubscribe", "Stop receiving alerts", |bot, event| {
            async move { unsubscribe(bot, event.sender()).await }
        })
        .command("status", "Current readings and window averages", {
            let state = Arc::clone(&state);
            move |bot, event| {
                let state = Arc::clone(&state);
                async move { status(state, bot, event.sender()).await }
            }
        })
        .command("chart", "Chart a metric (/chart cpu)", {
            let state = Arc::clone(&state);
            move |bot, event| {
                let state = Arc::clone(&state);
                async move {
                    let InboundEvent::Command { from, args, .. } = event else {
                        return;
                    };
                    chart(state, bot, from, &args).await;
                }
            }
        })
        .command("history", "Recent samples (/history mem)", {
            let state = Arc::clone(&state);
            move |bot, event| {
                let state = Arc::clone(&state);
                async move {
                    let InboundEvent::Command { from, args, .. } = event else {
                        return;
                    };
                    history(state, bot, from, &args).await;
                }
            }
        })
        .command("set", "Change a setting (/set cpu_threshold 80)", {
            let state = Arc::clone(&state);
            move |bot, event| {
                let state = Arc::clone(&state);
                async move {
                    let InboundEvent::Command { from, args, .. } = event else {
                        return;
                    };
                    set_value(state, bot, from, &args).await;
                }
            }
        })
        .command("config", "Show current settings", {
            let state = Arc::clone(&state);
            move |bot, event| {
                let state = Arc::clone(&state);
                async move { show_config(state, bot, event.sender()).await }
            }
        })
        .command("cancel", "Cancel a pending question", |bot, event| {
            async move { cancel(bot, event.sender()).await }
        })
        .hidden_command("add", "Run extra sampling ticks (debug)", {
            let state = Arc::clone(&state);
            move |bot, event| {
                let state = Arc::clone(&state);
                async move {
                    let InboundEvent::Command { from, args, .. } = event else {
                        return;
                    };
                    add_ticks(state, bot, from, &args).await;
                }
            }
        })
        .hidden_command("hi", "Ask for a name and greet", |bot, event| {
            async move { hi(bot, event.sender()).await }
        })
        .hidden_command("chartbtn", "Pick a chart from buttons", {
            let state = Arc::clone(&state);
            let telegram = Arc::clone(&telegram);
            move |_bot, event| {
                let state = Arc::clone(&state);
                let telegram = Arc::clone(&telegram);
                async move { chart_buttons(state, telegram, event.sender()).await }
            }
        })
        .hidden_command("menu", "Publish the command menu", {
            let telegram = Arc::clone(&telegram);
            move |bot, event| {
                let telegram = Arc::clone(&telegram);
                async move { publish_menu(telegram, bot, event.sender()).await }
            }
        });

    for metric in &state.metrics {
        let key = metric.key;
        builder = builder.button(&format!("chart:{key}"), {
            let state = Arc::clone(&state);
            move |bot, event| {
                let state = Arc::clone(&state);
                async move { chart(state, bot, event.sender(), key).await }
            }
        });
    }

    builder.build()
}

async fn subscribe(bot: Arc<Bot>, from: ChatId) {
    if bot.registry().subscribe(from) {
        tracing::info!(chat = %from, "New subscriber");
        bot.reply(from, "Subscribed. This chat now receives alerts.")
            .await;
    } else {
        bot.reply(from, "Already subscribed.").await;
    }
}

async fn unsubscribe(bot: Arc<Bot>, from: ChatId) {
    if bot.registry().unsubscribe(from) {
        tracing::info!(chat = %from, "Subscriber left");
        bot.reply(from, "Unsubscribed. No more alerts for this chat.")
            .await;
    } else {
        bot.reply(from, "This chat was not subscribed.").await;
    }
}

async fn status(state: Arc<AgentState>, bot: Arc<Bot>, from: ChatId) {
    let mut lines = Vec::with_capacity(state.metrics.len());
    for metric in &state.metrics {
        let line = match metric.peek() {
            Ok(current) => {
                let (average, std_dev) = {
                    let history = metric.history.lock().unwrap();
                    (
                        history.average(state.query_window),
                        history.std_dev(state.query_window),
                    )
                };
                match (average, std_dev) {
                    (Some(average), Some(std_dev)) => format!(
                        "{}: {:.2}% (avg {:.2} ± {:.2} over {}m)",
                        metric.label,
                        current,
                        average,
                        std_dev,
                        state.query_window.num_minutes(),
                    ),
                    _ => format!("{}: {:.2}% (no history yet)", metric.label, current),
                }
            }
            Err(e) => {
                tracing::warn!(metric = metric.key, error = %e, "Probe failed during status");
                format!("{}: probe failed", metric.label)
            }
        };
        lines.push(line);
    }
    bot.reply(from, &lines.join("\n")).await;
}

async fn chart(state: Arc<AgentState>, bot: Arc<Bot>, from: ChatId, args: &str) {
    let key = args.split_whitespace().next().unwrap_or("cpu");
    let Some(metric) = state.metric(key) else {
        bot.reply(
            from,
            &format!("Unknown metric: {key} (try {})", state.metric_keys()),
        )
        .await;
        return;
    };
    let rendered = {
        let history = metric.history.lock().unwrap();
        render::chart(&history, state.query_window, render::DEFAULT_WIDTH)
    };
    bot.reply_preformatted(from, &rendered).await;
}

async fn history(state: Arc<AgentState>, bot: Arc<Bot>, from: ChatId, args: &str) {
    let key = args.split_whitespace().next().unwrap_or("cpu");
    let Some(metric) = state.metric(key) else {
        bot.reply(
            from,
            &format!("Unknown metric: {key} (try {})", state.metric_keys()),
        )
        .await;
        return;
    };
    let dump = metric.history.lock().unwrap().to_string();
    bot.reply_preformatted(from, &dump).await;
}

async fn set_value(state: Arc<AgentState>, bot: Arc<Bot>, from: ChatId, args: &str) {
    let mut parts = args.split_whitespace();
    let (Some(key), Some(raw)) = (parts.next(), parts.next()) else {
        bot.reply(from, "Usage: /set <key> <value>").await;
        return;
    };
    match state.settings.set(key, raw) {
        Ok(previous) => {
            tracing::info!(chat = %from, key, value = raw, "Setting changed");
            bot.reply(from, &format!("{key} set to {raw} (was {previous})"))
                .await;
        }
        Err(e) => bot.reply(from, &e.to_string()).await,
    }
}

async fn show_config(state: Arc<AgentState>, bot: Arc<Bot>, from: ChatId) {
    bot.reply_preformatted(from, &state.settings.format_all())
        .await;
}

/// Runs the sampling cycle `n` extra times, a second apart, so recent
/// history can be built up without waiting out the interval.
async fn add_ticks(state: Arc<AgentState>, bot: Arc<Bot>, from: ChatId, args: &str) {
    let count = match args.split_whitespace().next() {
        Some(raw) => match raw.parse::<u32>() {
            Ok(n) => n,
            Err(_) => {
                bot.reply(from, "Usage: /add [count]").await;
                return;
            }
        },
        None => 1,
    };
    for i in 0..count {
        sample_cycle(&state, &bot).await;
        bot.reply(from, &format!("add {i}")).await;
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    }
    bot.reply(from, "Done.").await;
}

async fn hi(bot: Arc<Bot>, from: ChatId) {
    if !bot.registry().is_subscribed(from) {
        bot.reply(from, "Subscribe first so I can remember your answer.")
            .await;
        return;
    }
    bot.wait_for(from, "name", |bot, event| async move {
        let from = event.sender();
        let name = bot
            .registry()
            .get(from)
            .and_then(|s| s.attributes.get("name").cloned())
            .unwrap_or_else(|| "stranger".to_string());
        bot.reply(from, &format!("Hello, {name}!")).await;
    });
    bot.reply(from, "What's your name?").await;
}

async fn cancel(bot: Arc<Bot>, from: ChatId) {
    if bot.waits().cancel(from) {
        bot.reply(from, "Cancelled.").await;
    } else {
        bot.reply(from, "Nothing to cancel.").await;
    }
}

async fn chart_buttons(state: Arc<AgentState>, telegram: Arc<TelegramClient>, from: ChatId) {
    let buttons: Vec<(String, String)> = state
        .metrics
        .iter()
        .map(|m| (m.label.to_string(), format!("chart:{}", m.key)))
        .collect();
    let refs: Vec<(&str, &str)> = buttons
        .iter()
        .map(|(label, data)| (label.as_str(), data.as_str()))
        .collect();
    if let Err(e) = telegram
        .send_message_with_buttons(from.0, "Which chart?", &refs)
        .await
    {
        tracing::warn!(chat = %from, error = %e, "Failed to send chart buttons");
    }
}

async fn publish_menu(telegram: Arc<TelegramClient>, bot: Arc<Bot>, from: ChatId) {
    let commands: Vec<(String, String)> = bot
        .router()
        .visible_commands()
        .iter()
        .map(|entry| (entry.keyword.clone(), entry.description.clone()))
        .collect();
    match telegram.set_my_commands(&commands).await {
        Ok(()) => bot.reply(from, "Command menu published.").await,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to publish command menu");
            bot.reply(from, "Failed to publish the command menu.").await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metric;
    use crate::settings::{SettingValue, Settings};
    use crate::testutil::{RecordingTransport, StaticProbe};
    use chrono::Duration;
    use minder_alert::AnomalyPolicy;

    const ALICE: ChatId = ChatId(100);

    fn test_state() -> Arc<AgentState> {
        let settings = Settings::new();
        settings.register(
            "cpu_threshold",
            "CPU usage alert limit (percent)",
            SettingValue::Float(75.0),
        );
        settings.register(
            "mem_threshold",
            "Memory usage alert limit (percent)",
            SettingValue::Float(85.0),
        );
        settings.register(
            "increase_threshold",
            "Sudden increase sensitivity",
            SettingValue::Float(2.0),
        );
        settings.register(
            "interval",
            "Sampling interval (minutes)",
            SettingValue::Int(1),
        );
        Arc::new(AgentState {
            settings,
            metrics: vec![
                Arc::new(Metric::new(
                    "cpu",
                    "CPU usage",
                    "cpu_threshold",
                    75.0,
                    Box::new(StaticProbe(12.5)),
                    Duration::minutes(30),
                )),
                Arc::new(Metric::new(
                    "mem",
                    "Memory usage",
                    "mem_threshold",
                    85.0,
                    Box::new(StaticProbe(40.0)),
                    Duration::minutes(30),
                )),
            ],
            query_window: Duration::minutes(10),
            policy: AnomalyPolicy::default(),
        })
    }

    fn test_bot(state: &Arc<AgentState>) -> (Arc<Bot>, Arc<RecordingTransport>) {
        let telegram = Arc::new(TelegramClient::new("000:test").unwrap());
        let router = build_router(Arc::clone(state), telegram);
        let transport = Arc::new(RecordingTransport::new());
        (Arc::new(Bot::new(transport.clone(), router)), transport)
    }

    fn cmd(from: ChatId, keyword: &str, args: &str) -> InboundEvent {
        InboundEvent::Command {
            from,
            keyword: keyword.to_string(),
            args: args.to_string(),
        }
    }

    fn text(from: ChatId, text: &str) -> InboundEvent {
        InboundEvent::PlainText {
            from,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn subscribe_reports_new_and_repeat() {
        let state = test_state();
        let (bot, transport) = test_bot(&state);

        bot.clone().dispatch(cmd(ALICE, "subscribe", "")).await;
        bot.clone().dispatch(cmd(ALICE, "subscribe", "")).await;

        assert_eq!(
            transport.texts_to(ALICE),
            vec![
                "Subscribed. This chat now receives alerts.".to_string(),
                "Already subscribed.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn set_reports_previous_value_and_config_reflects_it() {
        let state = test_state();
        let (bot, transport) = test_bot(&state);

        bot.clone().dispatch(cmd(ALICE, "set", "cpu_threshold 80")).await;
        assert_eq!(
            transport.texts_to(ALICE),
            vec!["cpu_threshold set to 80 (was 75)".to_string()]
        );
        transport.take();

        bot.clone().dispatch(cmd(ALICE, "config", "")).await;
        let listing = transport.preformatted_to(ALICE).join("\n");
        assert!(listing.contains("cpu_threshold = 80"));

        // Bad input keeps the stored value.
        transport.take();
        bot.clone().dispatch(cmd(ALICE, "set", "interval fast")).await;
        assert_eq!(
            transport.texts_to(ALICE),
            vec!["Invalid value for interval: expected an integer".to_string()]
        );
        assert_eq!(state.settings.get_i64("interval"), Some(1));

        transport.take();
        bot.clone().dispatch(cmd(ALICE, "set", "cpu_threshold")).await;
        assert_eq!(
            transport.texts_to(ALICE),
            vec!["Usage: /set <key> <value>".to_string()]
        );
    }

    #[tokio::test]
    async fn status_shows_probe_reading_and_window_average() {
        let state = test_state();
        let (bot, transport) = test_bot(&state);

        {
            let cpu = state.metric("cpu").unwrap();
            let mut history = cpu.history.lock().unwrap();
            history.append(10.0);
            history.append(20.0);
        }

        bot.clone().dispatch(cmd(ALICE, "status", "")).await;

        let reply = transport.texts_to(ALICE).join("\n");
        assert!(reply.contains("CPU usage: 12.50% (avg 15.00 ± 5.00 over 10m)"));
        assert!(reply.contains("Memory usage: 40.00% (no history yet)"));
    }

    #[tokio::test]
    async fn chart_defaults_to_cpu_and_rejects_unknown_keys() {
        let state = test_state();
        let (bot, transport) = test_bot(&state);

        bot.clone().dispatch(cmd(ALICE, "chart", "")).await;
        assert_eq!(
            transport.preformatted_to(ALICE),
            vec!["CPU usage: no samples in the last 10m".to_string()]
        );

        transport.take();
        bot.clone().dispatch(cmd(ALICE, "chart", "disk")).await;
        assert_eq!(
            transport.texts_to(ALICE),
            vec!["Unknown metric: disk (try cpu, mem)".to_string()]
        );
    }

    #[tokio::test]
    async fn hi_asks_waits_and_greets() {
        let state = test_state();
        let (bot, transport) = test_bot(&state);
        bot.registry().subscribe(ALICE);

        bot.clone().dispatch(cmd(ALICE, "hi", "")).await;
        assert_eq!(
            transport.texts_to(ALICE),
            vec!["What's your name?".to_string()]
        );
        assert!(bot.waits().is_waiting(ALICE));

        transport.take();
        bot.clone().dispatch(text(ALICE, "Ada")).await;
        assert_eq!(transport.texts_to(ALICE), vec!["Hello, Ada!".to_string()]);
        assert!(!bot.waits().is_waiting(ALICE));
    }

    #[tokio::test]
    async fn cancel_reports_whether_a_wait_was_armed() {
        let state = test_state();
        let (bot, transport) = test_bot(&state);
        bot.registry().subscribe(ALICE);

        bot.clone().dispatch(cmd(ALICE, "cancel", "")).await;
        bot.clone().dispatch(cmd(ALICE, "hi", "")).await;
        bot.clone().dispatch(cmd(ALICE, "cancel", "")).await;

        let replies = transport.texts_to(ALICE);
        assert_eq!(
            replies,
            vec![
                "Nothing to cancel.".to_string(),
                "What's your name?".to_string(),
                "Cancelled.".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn add_runs_extra_sampling_ticks() {
        let state = test_state();
        let (bot, transport) = test_bot(&state);

        bot.clone().dispatch(cmd(ALICE, "add", "2")).await;
        assert_eq!(
            transport.texts_to(ALICE),
            vec![
                "add 0".to_string(),
                "add 1".to_string(),
                "Done.".to_string(),
            ]
        );
        assert_eq!(state.metric("cpu").unwrap().history.lock().unwrap().len(), 2);
        assert_eq!(state.metric("mem").unwrap().history.lock().unwrap().len(), 2);

        transport.take();
        bot.clone().dispatch(cmd(ALICE, "add", "lots")).await;
        assert_eq!(
            transport.texts_to(ALICE),
            vec!["Usage: /add [count]".to_string()]
        );
    }

    #[tokio::test]
    async fn history_dumps_recent_samples() {
        let state = test_state();
        let (bot, transport) = test_bot(&state);
        state
            .metric("mem")
            .unwrap()
            .history
            .lock()
            .unwrap()
            .append(33.0);

        bot.clone().dispatch(cmd(ALICE, "history", "mem")).await;

        let dump = transport.preformatted_to(ALICE).join("\n");
        assert!(dump.starts_with("Memory usage (1 samples)"));
        assert!(dump.contains("33.00"));
    }

    #[tokio::test]
    async fn chart_button_renders_that_metric() {
        let state = test_state();
        let (bot, transport) = test_bot(&state);
        state
            .metric("mem")
            .unwrap()
            .history
            .lock()
            .unwrap()
            .append(50.0);

        bot.clone()
            .dispatch(InboundEvent::ButtonPress {
                from: ALICE,
                data: "chart:mem".to_string(),
            })
            .await;

        let rendered = transport.preformatted_to(ALICE).join("\n");
        assert!(rendered.starts_with("Memory usage · last 10m · 1 samples"));
    }
}
