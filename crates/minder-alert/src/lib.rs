//! Threshold and anomaly evaluation for sampled metrics.
//!
//! Each sampling tick feeds the current reading through [`observe`], which
//! checks it against an absolute usage limit and the configured
//! [`AnomalyPolicy`], then records it into the metric's [`History`]. The
//! evaluation order is fixed: a reading is judged against the history as
//! it stood before the reading itself was recorded.


use chrono::Duration;
use minder_history::History;
use serde::Deserialize;

/// Thresholds in effect for one evaluation, read from runtime settings at
/// each tick so `/set` changes apply without a restart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    /// Absolute usage ceiling in percent.
    pub usage: f64,
    /// Sensitivity of the anomaly check: z-score bound for
    /// [`AnomalyPolicy::ZScore`], fallback ratio factor for
    /// [`AnomalyPolicy::Ratio`].
    pub increase: f64,
}

/// Sudden-increase detection strategy, selected in the agent config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AnomalyPolicy {
    /// Flag readings more than `limits.increase` standard deviations away
    /// from the windowed mean.
    ZScore(ZScoreParams),
    /// Flag readings above the windowed mean times a per-band factor.
    Ratio(RatioParams),
}

impl Default for AnomalyPolicy {
    fn default() -> Self {
        Self::ZScore(ZScoreParams::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ZScoreParams {
    /// Noise floor: readings below this value are never flagged, no
    /// matter how far they sit from a near-zero baseline.
    #[serde(default = "default_min_value")]
    pub min_value: f64,
}

impl Default for ZScoreParams {
    fn default() -> Self {
        Self {
            min_value: default_min_value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RatioParams {
    /// Averages below this are too small for a ratio to mean anything;
    /// the check is skipped.
    #[serde(default = "default_min_average")]
    pub min_average: f64,
    /// Bands in ascending `max_average` order; the first band containing
    /// the windowed mean supplies the factor. Beyond the last band the
    /// factor falls back to `limits.increase`.
    #[serde(default)]
    pub tiers: Vec<RatioTier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RatioTier {
    pub max_average: f64,
    pub factor: f64,
}

fn default_min_value() -> f64 {
    5.0
}

fn default_min_average() -> f64 {
    10.0
}

/// One judgement about the current reading. A single evaluation can yield
/// both variants at once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Finding {
    /// The reading exceeds the absolute usage limit.
    HighUsage { value: f64 },
    /// The reading is anomalously high against the windowed baseline.
    /// `score` is the z-score under [`AnomalyPolicy::ZScore`] and the
    /// value-to-average ratio under [`AnomalyPolicy::Ratio`].
    SuddenIncrease {
        value: f64,
        average: f64,
        score: f64,
    },
}

/// Judges `current` against the usage limit and the anomaly policy
/// without touching `history`.
///
/// The anomaly check is skipped whenever the windowed baseline is
/// unusable: empty window, zero spread (z-score), or an average below the
/// policy's floor. A skipped check never raises.
pub fn evaluate(
    current: f64,
    history: &History,
    window: Duration,
    limits: &Limits,
    policy: &AnomalyPolicy,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    if current > limits.usage {
        findings.push(Finding::HighUsage { value: current });
    }

    match policy {
        AnomalyPolicy::ZScore(params) => {
            if current < params.min_value {
                return findings;
            }
            let (Some(average), Some(std_dev)) =
                (history.average(window), history.std_dev(window))
            else {
                return findings;
            };
            if std_dev < f64::EPSILON {
                return findings;
            }
            let score = (current - average).abs() / std_dev;
            if score > limits.increase {
                findings.push(Finding::SuddenIncrease {
                    value: current,
                    average,
                    score,
                });
            }
        }
        AnomalyPolicy::Ratio(params) => {
            let Some(average) = history.average(window) else {
                return findings;
            };
            if average < params.min_average {
                return findings;
            }
            let factor = params
                .tiers
                .iter()
                .find(|tier| average <= tier.max_average)
                .map(|tier| tier.factor)
                .unwrap_or(limits.increase);
            if current > average * factor {
                findings.push(Finding::SuddenIncrease {
                    value: current,
                    average,
                    score: current / average,
                });
            }
        }
    }

    findings
}

/// Evaluates `current`, then appends it to `history`. The check always
/// sees the history as it stood before this reading.
pub fn observe(
    history: &mut History,
    current: f64,
    window: Duration,
    limits: &Limits,
    policy: &AnomalyPolicy,
) -> Vec<Finding> {
    let findings = evaluate(current, history, window, limits, policy);
    history.append(current);
    findings
}
