// Job configuration: inputs, metrics, scenes and their scores
// The job file is the engine's only input and the durable record of progress.

pub mod generate;
pub mod import;
pub mod metric;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CONFIG_FILENAME, JSON_INDENT};
use crate::error::{MetrologistError, Result};
use crate::score::ScoreSlot;

pub use import::{ImportMethod, ImportMethodType};
pub use metric::{Implementation, MetricKind, MetricParams, Regions};

/// Width and height the engine scales an input to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scale {
    pub width: u32,
    pub height: u32,
}

/// A video input (file or VapourSynth script).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub path: PathBuf,

    /// Import methods in priority order
    #[serde(rename = "importMethods")]
    pub import_methods: Vec<ImportMethod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Scale>,
}

impl Input {
    pub fn new(path: impl Into<PathBuf>, import_methods: Vec<ImportMethod>) -> Self {
        Self { path: path.into(), import_methods, scale: None }
    }
}

/// Half-open frame range `[start, end)`, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: u32,
    pub end: u32,
}

impl FrameRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of frames; zero for inverted ranges.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One distorted variant's frame range within a scene and its scores per metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistortedScene {
    pub start: u32,
    pub end: u32,

    #[serde(default)]
    pub scores: BTreeMap<MetricKind, Vec<ScoreSlot>>,
}

impl DistortedScene {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end, scores: BTreeMap::new() }
    }

    pub fn range(&self) -> FrameRange {
        FrameRange::new(self.start, self.end)
    }

    /// Slot count every metric sequence must reach for this variant.
    pub fn frame_count(&self) -> usize {
        self.range().len()
    }
}

/// A reference frame range compared against one range per distorted variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub reference: FrameRange,
    pub distorted: BTreeMap<String, DistortedScene>,
}

impl Scene {
    /// Scene with every listed variant sharing the reference range.
    pub fn aligned<I, S>(reference: FrameRange, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let distorted = variants
            .into_iter()
            .map(|id| (id.into(), DistortedScene::new(reference.start, reference.end)))
            .collect();
        Self { reference, distorted }
    }

    /// Identity used for duplicate detection: ranges only, scores ignored.
    fn range_key(&self) -> (FrameRange, Vec<(&str, FrameRange)>) {
        let variants = self
            .distorted
            .iter()
            .map(|(id, d)| (id.as_str(), d.range()))
            .collect();
        (self.reference, variants)
    }
}

/// Where results go and how chatty the engine is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Output {
    /// Job file path. Defaults to `config.json` next to the reference video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

impl Output {
    pub fn console_enabled(&self) -> bool {
        self.console.unwrap_or(true)
    }

    pub fn verbose_enabled(&self) -> bool {
        self.verbose.unwrap_or(false)
    }
}

/// Root of a measurement job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    pub reference: Input,

    pub distorted: BTreeMap<String, Input>,

    pub metrics: BTreeMap<MetricKind, MetricParams>,

    pub scenes: Vec<Scene>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Output>,

    /// Thread hint for the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
}

impl Configuration {
    /// Read and parse a job file. Any failure is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MetrologistError::Config(format!("Failed to read job file {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut config: Configuration = serde_json::from_str(raw)
            .map_err(|e| MetrologistError::Config(format!("Invalid job file: {}", e)))?;
        config.normalize();
        Ok(config)
    }

    /// Pretty JSON with 4-space indentation, the layout the engine writes back.
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(JSON_INDENT);
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        String::from_utf8(buf).map_err(|e| MetrologistError::Other(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// Job file location: `output.path`, else `config.json` beside the reference video.
    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = self.output.as_ref().and_then(|o| o.path.clone()) {
            return path;
        }
        self.reference
            .path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(DEFAULT_CONFIG_FILENAME)
    }

    pub fn verbose(&self) -> bool {
        self.output.as_ref().is_some_and(Output::verbose_enabled)
    }

    pub fn console(&self) -> bool {
        self.output.as_ref().map_or(true, Output::console_enabled)
    }

    /// Import methods behave as ordered sets.
    fn normalize(&mut self) {
        import::dedup_import_methods(&mut self.reference.import_methods);
        for input in self.distorted.values_mut() {
            import::dedup_import_methods(&mut input.import_methods);
        }
    }

    /// Structural checks the engine relies on.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(MetrologistError::Config(msg));

        if self.scenes.is_empty() {
            return fail("At least one scene is required".to_string());
        }
        if self.threads == Some(0) {
            return fail("threads must be a positive integer".to_string());
        }
        if self.reference.import_methods.is_empty() {
            return fail("Reference input needs at least one import method".to_string());
        }
        for (id, input) in &self.distorted {
            if input.import_methods.is_empty() {
                return fail(format!("Distorted input '{}' needs at least one import method", id));
            }
        }
        for (kind, params) in &self.metrics {
            params.check(*kind).map_err(MetrologistError::Config)?;
        }

        let mut seen = HashSet::new();
        for (index, scene) in self.scenes.iter().enumerate() {
            if scene.reference.end < scene.reference.start {
                return fail(format!("Scene {} reference ends before it starts", index));
            }
            for (id, distorted) in &scene.distorted {
                if !self.distorted.contains_key(id) {
                    return fail(format!("Scene {} references unknown distorted input '{}'", index, id));
                }
                if distorted.end < distorted.start {
                    return fail(format!("Scene {} variant '{}' ends before it starts", index, id));
                }
            }
            if !seen.insert(scene.range_key()) {
                return fail(format!("Scene {} duplicates an earlier scene", index));
            }
        }
        Ok(())
    }

    /// Give every (scene, variant) a score sequence for every enabled metric.
    /// The engine only computes metrics listed under a variant's `scores`.
    pub fn prepare_scores(&mut self) {
        let metrics: Vec<MetricKind> = self.metrics.keys().copied().collect();
        for scene in &mut self.scenes {
            for distorted in scene.distorted.values_mut() {
                for metric in &metrics {
                    distorted.scores.entry(*metric).or_default();
                }
            }
        }
    }

    pub fn scene(&self, index: usize) -> Result<&Scene> {
        self.scenes.get(index).ok_or(MetrologistError::UnknownScene(index))
    }

    pub fn variant(&self, scene: usize, distorted_id: &str) -> Result<&DistortedScene> {
        self.scene(scene)?
            .distorted
            .get(distorted_id)
            .ok_or_else(|| MetrologistError::UnknownVariant {
                scene,
                distorted_id: distorted_id.to_string(),
            })
    }

    pub fn variant_mut(&mut self, scene: usize, distorted_id: &str) -> Result<&mut DistortedScene> {
        self.scenes
            .get_mut(scene)
            .ok_or(MetrologistError::UnknownScene(scene))?
            .distorted
            .get_mut(distorted_id)
            .ok_or_else(|| MetrologistError::UnknownVariant {
                scene,
                distorted_id: distorted_id.to_string(),
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// One reference, one variant "a", PSNR enabled, one scene of `len` frames.
    pub fn single_scene_config(len: u32) -> Configuration {
        let mut metrics = BTreeMap::new();
        metrics.insert(MetricKind::Psnr, MetricParams::default());
        let mut distorted = BTreeMap::new();
        distorted.insert(
            "a".to_string(),
            Input::new("/videos/a.mkv", vec![ImportMethod::new(ImportMethodType::Ffms2)]),
        );
        Configuration {
            schema: None,
            reference: Input::new("/videos/ref.mkv", vec![ImportMethod::new(ImportMethodType::Bestsource)]),
            distorted,
            metrics,
            scenes: vec![Scene::aligned(FrameRange::new(0, len), ["a"])],
            output: None,
            threads: None,
        }
    }

    const JOB_JSON: &str = r#"{
        "$schema": "./schema.json",
        "reference": {"path": "/v/ref.mkv", "importMethods": [{"type": "lsmash"}, {"type": "ffms2", "cache": false}, {"type": "lsmash"}]},
        "distorted": {"x264": {"path": "/v/x264.mkv", "importMethods": [{"type": "bestsource"}], "scale": {"width": 1920, "height": 1080}}},
        "metrics": {"SSIMULACRA2": {}, "Butteraugli": {"implementation": "cuda", "intensity_target": 203}},
        "scenes": [
            {"reference": {"start": 0, "end": 2}, "distorted": {"x264": {"start": 0, "end": 2, "scores": {
                "SSIMULACRA2": [{"time": "2024-01-01T00:00:00.500000", "value": [[81.5]]}, null]
            }}}}
        ],
        "output": {"verbose": true},
        "threads": 8
    }"#;

    #[test]
    fn test_parse_job_file() {
        let config = Configuration::from_json(JOB_JSON).unwrap();
        assert_eq!(config.schema.as_deref(), Some("./schema.json"));
        assert_eq!(config.reference.import_methods.len(), 2, "duplicate import method removed");
        assert_eq!(config.reference.import_methods[0].method, ImportMethodType::Lsmash);
        assert_eq!(config.metrics.len(), 2);
        assert_eq!(config.metrics[&MetricKind::Butteraugli].intensity_target, Some(203));
        assert_eq!(config.threads, Some(8));
        assert!(config.verbose());
        assert!(config.console());

        let slots = &config.scenes[0].distorted["x264"].scores[&MetricKind::Ssimulacra2];
        assert_eq!(slots.len(), 2);
        assert!(slots[0].is_some());
        assert!(slots[1].is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = Configuration::from_json("{not json").unwrap_err();
        assert!(matches!(err, MetrologistError::Config(_)));
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("jobs").join("job.json");
        let config = Configuration::from_json(JOB_JSON).unwrap();
        config.save(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n    \"$schema\""), "4-space indentation");
        assert!(written.contains("null"), "unfilled slot written as null");

        let loaded = Configuration::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Configuration::load(Path::new("/nonexistent/job.json")).unwrap_err();
        assert!(matches!(err, MetrologistError::Config(_)));
    }

    #[test]
    fn test_config_path_defaults_next_to_reference() {
        let mut config = single_scene_config(3);
        assert_eq!(config.config_path(), PathBuf::from("/videos/config.json"));

        config.output = Some(Output { path: Some(PathBuf::from("/tmp/out.json")), ..Default::default() });
        assert_eq!(config.config_path(), PathBuf::from("/tmp/out.json"));
    }

    #[test]
    fn test_validate_rejects_empty_and_duplicate_scenes() {
        let mut config = single_scene_config(3);
        config.validate().unwrap();

        let scene = config.scenes[0].clone();
        config.scenes.push(scene);
        assert!(config.validate().is_err());

        config.scenes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ignores_scores_for_duplicates() {
        let mut config = single_scene_config(3);
        let mut other = Scene::aligned(FrameRange::new(3, 6), ["a"]);
        config.scenes.push(other.clone());
        config.validate().unwrap();

        other.reference = FrameRange::new(0, 3);
        other.distorted.get_mut("a").unwrap().start = 0;
        other.distorted.get_mut("a").unwrap().end = 3;
        other.distorted.get_mut("a").unwrap().scores.insert(MetricKind::Psnr, vec![None]);
        config.scenes.push(other);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_ranges_and_unknown_variants() {
        let mut config = single_scene_config(3);
        config.scenes[0].reference = FrameRange::new(5, 2);
        assert!(config.validate().is_err());

        let mut config = single_scene_config(3);
        config.scenes[0].distorted.insert("ghost".into(), DistortedScene::new(0, 3));
        assert!(config.validate().is_err());

        let mut config = single_scene_config(3);
        config.threads = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_prepare_scores_adds_enabled_metrics() {
        let mut config = single_scene_config(3);
        config.metrics.insert(MetricKind::Vmaf, MetricParams::default());
        config.prepare_scores();
        let scores = &config.scenes[0].distorted["a"].scores;
        assert_eq!(scores.len(), 2);
        assert!(scores[&MetricKind::Psnr].is_empty());
        assert!(scores[&MetricKind::Vmaf].is_empty());
    }

    #[test]
    fn test_lookup_errors() {
        let config = single_scene_config(3);
        assert!(matches!(config.scene(4), Err(MetrologistError::UnknownScene(4))));
        assert!(matches!(config.variant(0, "b"), Err(MetrologistError::UnknownVariant { .. })));
    }
}
