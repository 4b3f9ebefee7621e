// Frame scores and the per-scene score matrix

pub mod matrix;
pub mod timestamp;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{MetricKind, Regions};

pub use matrix::Reallocation;

/// One slot of a per-(scene, variant, metric) sequence. `None` = not scored yet.
pub type ScoreSlot = Option<FrameScore>;

/// Butteraugli norms for one frame or region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    #[serde(rename = "Norm2")]
    pub norm_2: f64,
    #[serde(rename = "Norm3")]
    pub norm_3: f64,
    #[serde(rename = "NormInfinite", alias = "InifiniteNorm")]
    pub norm_infinity: f64,
}

/// Value of a single frame or a single region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionValue {
    Scalar(f64),
    Components(ComponentScores),
}

impl RegionValue {
    /// Scalar used for statistics. Composite values contribute their infinity norm.
    pub fn scalar(&self) -> f64 {
        match self {
            RegionValue::Scalar(v) => *v,
            RegionValue::Components(c) => c.norm_infinity,
        }
    }
}

/// Metric payload of one frame: a single value, or a row-major grid of regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreValue {
    Grid(Vec<Vec<Option<RegionValue>>>),
    Single(RegionValue),
}

impl ScoreValue {
    pub fn scalar(value: f64) -> Self {
        ScoreValue::Single(RegionValue::Scalar(value))
    }

    /// Per-frame contribution to statistics: the value itself, or the mean of the
    /// filled grid cells. `None` when a grid has no filled cell.
    pub fn contribution(&self) -> Option<f64> {
        match self {
            ScoreValue::Single(v) => Some(v.scalar()),
            ScoreValue::Grid(rows) => {
                let (sum, count) = rows
                    .iter()
                    .flatten()
                    .flatten()
                    .fold((0.0, 0usize), |(sum, count), cell| (sum + cell.scalar(), count + 1));
                if count == 0 {
                    None
                } else {
                    Some(sum / count as f64)
                }
            }
        }
    }

    /// Number of regions carried, filled or not.
    pub fn cell_count(&self) -> usize {
        match self {
            ScoreValue::Single(_) => 1,
            ScoreValue::Grid(rows) => rows.iter().map(Vec::len).sum(),
        }
    }

    /// Whether the payload has the region count configured for the metric and
    /// the value kind it reports (norm records for composite metrics, numbers otherwise).
    pub fn fits(&self, kind: MetricKind, regions: Option<Regions>) -> bool {
        let expected = regions.map_or(1, |r| r.cell_count());
        if self.cell_count() != expected {
            return false;
        }
        let composite = kind.is_composite();
        let fits_kind = |v: &RegionValue| matches!(v, RegionValue::Components(_)) == composite;
        match self {
            ScoreValue::Single(v) => fits_kind(v),
            ScoreValue::Grid(rows) => rows.iter().flatten().flatten().all(fits_kind),
        }
    }
}

/// A scored frame: when the score arrived and what it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameScore {
    #[serde(with = "timestamp")]
    pub time: DateTime<Utc>,
    pub value: ScoreValue,
}

impl FrameScore {
    pub fn new(time: DateTime<Utc>, value: ScoreValue) -> Self {
        Self { time, value }
    }
}
