// Statistics over arrived scores
// Computed per (distorted variant, metric), per scene and pooled across scenes.
// Unfilled slots never contribute; an empty score set has no statistics (None), never zeros.

pub mod framerate;


use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::{Configuration, MetricKind};
use crate::constants::{LOW_PERCENTILE_1, LOW_PERCENTILE_5, MEDIAN_PERCENTILE};

pub use framerate::FramerateMode;

/// Descriptive statistics of one score set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub count: usize,
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
    /// Population standard deviation (divides by count)
    pub standard_deviation: f64,
    pub median: f64,
    pub percentile_1: f64,
    pub percentile_5: f64,
}

impl Statistics {
    /// `None` for an empty set.
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }

        let count = scores.len();
        let average = scores.iter().sum::<f64>() / count as f64;
        let variance = scores.iter().map(|s| (s - average).powi(2)).sum::<f64>() / count as f64;

        let mut sorted = scores.to_vec();
        sorted.sort_by(f64::total_cmp);

        Some(Self {
            count,
            average,
            minimum: sorted[0],
            maximum: sorted[count - 1],
            standard_deviation: variance.sqrt(),
            median: percentile(&sorted, MEDIAN_PERCENTILE),
            percentile_1: percentile(&sorted, LOW_PERCENTILE_1),
            percentile_5: percentile(&sorted, LOW_PERCENTILE_5),
        })
    }
}

/// Linear interpolation between order statistics at rank `(p / 100) * (n - 1)`.
/// `sorted` must be ascending and non-empty.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

/// Statistics for one (variant, metric): one entry per scene index, plus all scenes pooled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStatistics {
    /// `None` where the scene lacks the variant or has no scores yet
    pub scenes: Vec<Option<Statistics>>,
    pub overall: Option<Statistics>,
}

/// distorted id -> metric -> statistics
pub type StatisticsReport = BTreeMap<String, BTreeMap<MetricKind, MetricStatistics>>;

/// Per-frame contributions that have arrived for one scene/variant/metric.
pub fn scene_scores(config: &Configuration, scene: usize, distorted_id: &str, metric: MetricKind) -> Vec<f64> {
    config
        .slots(scene, distorted_id, metric)
        .unwrap_or_default()
        .iter()
        .flatten()
        .filter_map(|score| score.value.contribution())
        .collect()
}

/// Statistics for every distorted input and every metric enabled or carrying scores.
pub fn calculate(config: &Configuration) -> StatisticsReport {
    let mut report = StatisticsReport::new();

    for distorted_id in config.distorted.keys() {
        let mut metrics: BTreeSet<MetricKind> = config.metrics.keys().copied().collect();
        for scene in &config.scenes {
            if let Some(variant) = scene.distorted.get(distorted_id) {
                metrics.extend(variant.scores.keys().copied());
            }
        }

        let per_metric = metrics
            .into_iter()
            .map(|metric| (metric, metric_statistics(config, distorted_id, metric)))
            .collect();
        report.insert(distorted_id.clone(), per_metric);
    }

    report
}

pub fn metric_statistics(config: &Configuration, distorted_id: &str, metric: MetricKind) -> MetricStatistics {
    let mut pooled = Vec::new();
    let scenes = (0..config.scenes.len())
        .map(|scene| {
            let scores = scene_scores(config, scene, distorted_id, metric);
            let stats = Statistics::from_scores(&scores);
            pooled.extend(scores);
            stats
        })
        .collect();

    MetricStatistics {
        scenes,
        overall: Statistics::from_scores(&pooled),
    }
}
