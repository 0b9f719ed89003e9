//! Time-windowed sample history for host metrics.
//!
//! A [`History`] keeps the samples observed for one metric over a fixed
//! retention window (its live time) and answers windowed average and
//! standard-deviation queries over any sub-window. Appends evict samples
//! that have aged out; queries additionally filter by their own cutoff, so
//! a sample outside the queried window never influences a result even when
//! physical eviction has not run since the clock moved.
//!
//! The struct is single-threaded on purpose: the owner decides where the
//! lock lives (the agent wraps each metric's history in its own `Mutex`).

pub mod render;


use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::fmt;

/// One timestamped metric observation. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

/// Age-bounded, chronologically ordered sample store for one metric.
///
/// Samples arrive through [`History::append`] in wall-clock order, so the
/// store never reorders; eviction is a front-pop scan to the first sample
/// inside the retention cutoff. The sample count is bounded by
/// `live_time / sampling interval`, which stays in the tens to low
/// hundreds here, so the linear scan is the right tool.
#[derive(Debug, Clone)]
pub struct History {
    label: String,
    live_time: Duration,
    samples: VecDeque<Sample>,
}

impl History {
    /// Creates an empty history that retains samples for `live_time`.
    pub fn new(live_time: Duration, label: &str) -> Self {
        Self {
            label: label.to_string(),
            live_time,
            samples: VecDeque::new(),
        }
    }

    /// Display label of the tracked metric (e.g. `"CPU usage"`).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Retention window samples live for.
    pub fn live_time(&self) -> Duration {
        self.live_time
    }

    /// Appends a sample stamped with the current wall clock, then evicts
    /// anything older than the retention cutoff.
    pub fn append(&mut self, value: f64) {
        self.append_at(value, Utc::now());
    }

    /// Clock-passing variant of [`History::append`]. `now` must not move
    /// backwards across calls; chronological order is an invariant, not
    /// something the store re-establishes.
    pub fn append_at(&mut self, value: f64, now: DateTime<Utc>) {
        self.samples.push_back(Sample {
            value,
            observed_at: now,
        });
        self.evict_expired(now);
    }

    /// Drops every sample older than `now - live_time`.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.live_time;
        while let Some(front) = self.samples.front() {
            if front.observed_at < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Samples no older than the query window (capped at the live time).
    fn windowed(
        &self,
        window: Duration,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &Sample> + '_ {
        let horizon = window.min(self.live_time);
        let cutoff = now - horizon;
        self.samples.iter().filter(move |s| s.observed_at >= cutoff)
    }

    /// Arithmetic mean of the samples inside `window`, or `None` when no
    /// sample qualifies. `None` means "no data", not zero usage.
    pub fn average(&self, window: Duration) -> Option<f64> {
        self.average_at(window, Utc::now())
    }

    /// Clock-passing variant of [`History::average`].
    pub fn average_at(&self, window: Duration, now: DateTime<Utc>) -> Option<f64> {
        let mut count = 0_usize;
        let mut sum = 0.0;
        for s in self.windowed(window, now) {
            count += 1;
            sum += s.value;
        }
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// Population standard deviation over the same window and with the
    /// same empty-window policy as [`History::average`].
    pub fn std_dev(&self, window: Duration) -> Option<f64> {
        self.std_dev_at(window, Utc::now())
    }

    /// Clock-passing variant of [`History::std_dev`].
    pub fn std_dev_at(&self, window: Duration, now: DateTime<Utc>) -> Option<f64> {
        let mean = self.average_at(window, now)?;
        let mut count = 0_usize;
        let mut sq_sum = 0.0;
        for s in self.windowed(window, now) {
            count += 1;
            sq_sum += (s.value - mean) * (s.value - mean);
        }
        Some((sq_sum / count as f64).sqrt())
    }

    /// Read-only view of the currently live samples (retention-filtered,
    /// so serialization reflects post-eviction state).
    pub fn samples(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.windowed(self.live_time, Utc::now())
    }

    /// Values of the currently live samples, oldest first.
    pub fn values(&self) -> Vec<f64> {
        self.samples().map(|s| s.value).collect()
    }

    /// Timestamps of the currently live samples, oldest first.
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.samples().map(|s| s.observed_at).collect()
    }

    /// Values inside an arbitrary query window, oldest first.
    pub fn window_values_at(&self, window: Duration, now: DateTime<Utc>) -> Vec<f64> {
        self.windowed(window, now).map(|s| s.value).collect()
    }

    /// Number of physically retained samples (eviction runs on append, so
    /// this can briefly exceed the live count while the clock idles).
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl fmt::Display for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let now = Utc::now();
        let live: Vec<&Sample> = self.samples().collect();
        writeln!(f, "{} ({} samples)", self.label, live.len())?;
        for s in live {
            writeln!(f, "{:8.2}  {}", s.value, age_label(now - s.observed_at))?;
        }
        Ok(())
    }
}

fn age_label(age: Duration) -> String {
    let secs = age.num_seconds().max(0);
    if secs < 120 {
        format!("{secs}s ago")
    } else {
        format!("{}m ago", secs / 60)
    }
}
