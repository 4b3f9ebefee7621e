// Metric kinds and per-metric parameters

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::BUTTERAUGLI_DEFAULT_INTENSITY_TARGET;
use crate::error::MetrologistError;

/// Quality metric computed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    #[serde(rename = "PSNR")]
    Psnr,
    #[serde(rename = "SSIMULACRA")]
    Ssimulacra,
    #[serde(rename = "SSIMULACRA2")]
    Ssimulacra2,
    #[serde(rename = "VMAF")]
    Vmaf,
    Butteraugli,
    #[serde(rename = "XPSNR")]
    Xpsnr,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Psnr,
        MetricKind::Ssimulacra,
        MetricKind::Ssimulacra2,
        MetricKind::Vmaf,
        MetricKind::Butteraugli,
        MetricKind::Xpsnr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Psnr => "PSNR",
            MetricKind::Ssimulacra => "SSIMULACRA",
            MetricKind::Ssimulacra2 => "SSIMULACRA2",
            MetricKind::Vmaf => "VMAF",
            MetricKind::Butteraugli => "Butteraugli",
            MetricKind::Xpsnr => "XPSNR",
        }
    }

    /// Whether the metric reports a record of norms instead of a single number.
    pub fn is_composite(&self) -> bool {
        matches!(self, MetricKind::Butteraugli)
    }

    /// Whether a GPU implementation can be requested for the metric.
    pub fn supports_implementation(&self) -> bool {
        matches!(self, MetricKind::Ssimulacra2 | MetricKind::Butteraugli)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetrologistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| MetrologistError::Config(format!("Unknown metric: {}", s)))
    }
}

/// Grid the frame is divided into; each region is scored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Regions {
    pub rows: u32,
    pub columns: u32,
}

impl Regions {
    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.columns as usize
    }
}

/// Compute backend requested from the engine. Falls back to cpu when unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Implementation {
    Cuda,
    Hip,
    Cpu,
}

/// Parameters for one enabled metric. An empty object enables the metric with defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions: Option<Regions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<Implementation>,

    /// Butteraugli viewing conditions in nits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity_target: Option<i32>,

    /// Butteraugli: inputs already have a linear transfer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linput: Option<bool>,
}

impl MetricParams {
    pub fn with_regions(mut self, rows: u32, columns: u32) -> Self {
        self.regions = Some(Regions { rows, columns });
        self
    }

    pub fn intensity_target_or_default(&self) -> i32 {
        self.intensity_target.unwrap_or(BUTTERAUGLI_DEFAULT_INTENSITY_TARGET)
    }

    pub fn linput_or_default(&self) -> bool {
        self.linput.unwrap_or(false)
    }

    /// Check parameters against the metric they configure.
    pub fn check(&self, kind: MetricKind) -> Result<(), String> {
        if let Some(regions) = self.regions {
            if regions.rows < 1 || regions.columns < 1 {
                return Err(format!("{} regions must have at least one row and column", kind));
            }
        }
        if self.implementation.is_some() && !kind.supports_implementation() {
            return Err(format!("{} does not take an implementation", kind));
        }
        if kind != MetricKind::Butteraugli && (self.intensity_target.is_some() || self.linput.is_some()) {
            return Err(format!("{} does not take Butteraugli parameters", kind));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_kind_wire_names() {
        assert_eq!(serde_json::to_string(&MetricKind::Psnr).unwrap(), "\"PSNR\"");
        assert_eq!(serde_json::to_string(&MetricKind::Butteraugli).unwrap(), "\"Butteraugli\"");
        let kind: MetricKind = serde_json::from_str("\"SSIMULACRA2\"").unwrap();
        assert_eq!(kind, MetricKind::Ssimulacra2);
    }

    #[test]
    fn test_metric_kind_from_str_ignores_case() {
        assert_eq!("vmaf".parse::<MetricKind>().unwrap(), MetricKind::Vmaf);
        assert!("SSIM".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_empty_params_mean_defaults() {
        let params: MetricParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params, MetricParams::default());
        assert_eq!(params.intensity_target_or_default(), 80);
        assert!(!params.linput_or_default());
        assert_eq!(serde_json::to_string(&params).unwrap(), "{}");
    }

    #[test]
    fn test_params_check() {
        let params = MetricParams { implementation: Some(Implementation::Cuda), ..Default::default() };
        assert!(params.check(MetricKind::Butteraugli).is_ok());
        assert!(params.check(MetricKind::Psnr).is_err());

        let params = MetricParams::default().with_regions(0, 2);
        assert!(params.check(MetricKind::Vmaf).is_err());
    }
}
