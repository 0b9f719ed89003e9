//! Block-character chart rendering for chat messages.
//!
//! Telegram has no terminal, but it does have monospace blocks, so a
//! metric window is drawn as a row of 8-level block glyphs normalized to
//! the window's min/max, with a stats line underneath.

use crate::History;
use chrono::{DateTime, Duration, Utc};

const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Chart width that fits a phone-width monospace message.
pub const DEFAULT_WIDTH: usize = 32;

/// Renders the queried window of `history` as a chart message.
pub fn chart(history: &History, window: Duration, width: usize) -> String {
    chart_at(history, window, width, Utc::now())
}

/// Clock-passing variant of [`chart`].
pub fn chart_at(
    history: &History,
    window: Duration,
    width: usize,
    now: DateTime<Utc>,
) -> String {
    let values = history.window_values_at(window, now);
    if values.is_empty() {
        return format!(
            "{}: no samples in the last {}",
            history.label(),
            window_label(window)
        );
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let avg = values.iter().sum::<f64>() / values.len() as f64;

    format!(
        "{label} · last {window} · {n} samples\n{line}\nmin {min:.1}  avg {avg:.1}  max {max:.1}",
        label = history.label(),
        window = window_label(window),
        n = values.len(),
        line = sparkline(&values, width),
    )
}

/// Maps `values` onto block glyphs, downsampling to at most `width`
/// characters. A flat series renders mid-level blocks; an empty series
/// renders nothing.
pub fn sparkline(values: &[f64], width: usize) -> String {
    if values.is_empty() || width == 0 {
        return String::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    fit_to_width(values, width)
        .iter()
        .map(|&v| {
            if range < f64::EPSILON {
                BLOCKS[4]
            } else {
                let normalized = ((v - min) / range).clamp(0.0, 1.0);
                BLOCKS[((normalized * 7.0) as usize).min(7)]
            }
        })
        .collect()
}

/// Stride-picks the series down to `width` points; shorter series are
/// drawn as-is rather than padded.
fn fit_to_width(values: &[f64], width: usize) -> Vec<f64> {
    if values.len() <= width {
        return values.to_vec();
    }
    let step = values.len() as f64 / width as f64;
    (0..width)
        .map(|i| values[((i as f64 * step) as usize).min(values.len() - 1)])
        .collect()
}

fn window_label(window: Duration) -> String {
    let mins = window.num_minutes();
    if mins >= 60 && mins % 60 == 0 {
        format!("{}h", mins / 60)
    } else if mins >= 1 {
        format!("{mins}m")
    } else {
        format!("{}s", window.num_seconds())
    }
}
