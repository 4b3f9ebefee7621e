// Measured framerate from score arrival times

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Configuration, MetricKind};

/// How arrivals are aggregated into one estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FramerateMode {
    /// All arrivals pooled: count / (latest - earliest).
    #[default]
    Pooled,
    /// Pooled estimate per scene, then the mean of the scenes that have one.
    PerSceneAverage,
}

/// Arrivals per second over the span of `times`. `None` with fewer than two
/// arrivals or a zero span.
pub fn from_timestamps(times: &[DateTime<Utc>]) -> Option<f64> {
    if times.len() < 2 {
        return None;
    }
    let earliest = times.iter().min()?;
    let latest = times.iter().max()?;
    let span = (*latest - *earliest).num_microseconds()? as f64 / 1_000_000.0;
    if span <= 0.0 {
        return None;
    }
    Some(times.len() as f64 / span)
}

/// Arrival times of every filled slot, optionally for one metric only.
pub fn arrival_times(config: &Configuration, metric: Option<MetricKind>) -> Vec<DateTime<Utc>> {
    config
        .scored_frames()
        .filter(|f| metric.map_or(true, |m| f.metric == m))
        .map(|f| f.score.time)
        .collect()
}

pub fn estimate(config: &Configuration, metric: Option<MetricKind>, mode: FramerateMode) -> Option<f64> {
    match mode {
        FramerateMode::Pooled => from_timestamps(&arrival_times(config, metric)),
        FramerateMode::PerSceneAverage => {
            let mut per_scene: Vec<Vec<DateTime<Utc>>> = vec![Vec::new(); config.scenes.len()];
            for frame in config.scored_frames() {
                if metric.map_or(true, |m| frame.metric == m) {
                    per_scene[frame.scene].push(frame.score.time);
                }
            }
            let rates: Vec<f64> = per_scene.iter().filter_map(|times| from_timestamps(times)).collect();
            if rates.is_empty() {
                None
            } else {
                Some(rates.iter().sum::<f64>() / rates.len() as f64)
            }
        }
    }
}
