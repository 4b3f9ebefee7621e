// Score matrix operations keyed by (scene, variant, metric, frame offset)

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::{Configuration, DistortedScene, MetricKind};
use crate::error::{MetrologistError, Result};
use crate::protocol::ScoreArrival;
use crate::score::{FrameScore, ScoreSlot};

/// What happens to filled slots when a sequence must grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reallocation {
    /// Extend with unfilled slots; filled slots keep their scores.
    #[default]
    Preserve,
    /// Replace the sequence with fresh unfilled slots, discarding scores.
    Reset,
}

/// Frames whose variant has every metric fully scored vs. the rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramesScored {
    pub completed: usize,
    pub remaining: usize,
}

/// A filled slot with its full key.
#[derive(Debug, Clone, Copy)]
pub struct ScoredFrame<'a> {
    pub scene: usize,
    pub distorted_id: &'a str,
    pub metric: MetricKind,
    pub frame: usize,
    pub score: &'a FrameScore,
}

impl DistortedScene {
    /// Metrics this variant is measured for: enabled ones plus any already carrying scores.
    fn requested_metrics(&self, enabled: impl Iterator<Item = MetricKind>) -> BTreeSet<MetricKind> {
        enabled.chain(self.scores.keys().copied()).collect()
    }

    fn variant_complete(&self, metrics: &BTreeSet<MetricKind>) -> bool {
        let expected = self.frame_count();
        metrics.iter().all(|metric| {
            self.scores
                .get(metric)
                .is_some_and(|slots| slots.len() == expected && slots.iter().all(Option::is_some))
        })
    }
}

impl Configuration {
    /// Ensure `length` slots exist for the key. A shorter sequence is replaced by
    /// `length` unfilled slots, which discards its scores.
    pub fn allocate(&mut self, scene: usize, distorted_id: &str, metric: MetricKind, length: usize) -> Result<()> {
        self.reserve(scene, distorted_id, metric, length, Reallocation::Reset)
    }

    /// Like [`allocate`](Self::allocate) but keeps filled slots when growing.
    pub fn grow(&mut self, scene: usize, distorted_id: &str, metric: MetricKind, length: usize) -> Result<()> {
        self.reserve(scene, distorted_id, metric, length, Reallocation::Preserve)
    }

    pub fn reserve(
        &mut self,
        scene: usize,
        distorted_id: &str,
        metric: MetricKind,
        length: usize,
        policy: Reallocation,
    ) -> Result<()> {
        let variant = self.variant_mut(scene, distorted_id)?;
        let slots = variant.scores.entry(metric).or_default();
        if slots.len() < length {
            match policy {
                Reallocation::Preserve => slots.resize(length, None),
                Reallocation::Reset => *slots = vec![None; length],
            }
        }
        Ok(())
    }

    /// Fill one slot, overwriting any previous score. Fails without mutating
    /// when `frame` is outside the allocated sequence.
    pub fn set_score(
        &mut self,
        scene: usize,
        distorted_id: &str,
        metric: MetricKind,
        frame: usize,
        score: FrameScore,
    ) -> Result<()> {
        let variant = self.variant_mut(scene, distorted_id)?;
        let length = variant.scores.get(&metric).map_or(0, Vec::len);
        match variant.scores.get_mut(&metric).and_then(|slots| slots.get_mut(frame)) {
            Some(slot) => {
                *slot = Some(score);
                Ok(())
            }
            None => Err(MetrologistError::OutOfRange {
                scene,
                distorted_id: distorted_id.to_string(),
                metric,
                frame,
                length,
            }),
        }
    }

    /// Apply one engine score: size the sequence to the variant's range, then fill the slot.
    pub fn record_arrival(&mut self, arrival: &ScoreArrival, policy: Reallocation) -> Result<()> {
        let required = self.variant(arrival.scene, &arrival.distorted_id)?.frame_count();
        self.reserve(arrival.scene, &arrival.distorted_id, arrival.metric, required, policy)?;
        self.set_score(
            arrival.scene,
            &arrival.distorted_id,
            arrival.metric,
            arrival.frame,
            arrival.score.clone(),
        )
    }

    pub fn slots(&self, scene: usize, distorted_id: &str, metric: MetricKind) -> Option<&[ScoreSlot]> {
        self.variant(scene, distorted_id)
            .ok()
            .and_then(|v| v.scores.get(&metric))
            .map(Vec::as_slice)
    }

    /// True when every requested metric of the variant has exactly one filled slot per frame.
    pub fn is_complete(&self, scene: usize, distorted_id: &str) -> bool {
        match self.variant(scene, distorted_id) {
            Ok(variant) => {
                let metrics = variant.requested_metrics(self.metrics.keys().copied());
                variant.variant_complete(&metrics)
            }
            Err(_) => false,
        }
    }

    /// Frames to score across all scenes, variants and metrics.
    pub fn total_frames(&self) -> usize {
        self.scenes
            .iter()
            .flat_map(|scene| scene.distorted.values())
            .map(|variant| variant.requested_metrics(self.metrics.keys().copied()).len() * variant.frame_count())
            .sum()
    }

    pub fn frames_scored(&self) -> FramesScored {
        let mut counts = FramesScored::default();
        for (index, scene) in self.scenes.iter().enumerate() {
            for id in scene.distorted.keys() {
                let frames = scene.distorted[id].frame_count();
                if self.is_complete(index, id) {
                    counts.completed += frames;
                } else {
                    counts.remaining += frames;
                }
            }
        }
        counts
    }

    /// Every filled slot in scene, variant, metric, frame order.
    pub fn scored_frames(&self) -> impl Iterator<Item = ScoredFrame<'_>> + '_ {
        self.scenes.iter().enumerate().flat_map(|(scene, s)| {
            s.distorted.iter().flat_map(move |(id, variant)| {
                variant.scores.iter().flat_map(move |(metric, slots)| {
                    slots.iter().enumerate().filter_map(move |(frame, slot)| {
                        slot.as_ref().map(|score| ScoredFrame {
                            scene,
                            distorted_id: id.as_str(),
                            metric: *metric,
                            frame,
                            score,
                        })
                    })
                })
            })
        })
    }

    pub fn filled_slots(&self) -> usize {
        self.scored_frames().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::single_scene_config;
    use crate::score::ScoreValue;
    use chrono::{TimeZone, Utc};

    fn score(v: f64) -> FrameScore {
        FrameScore::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), ScoreValue::scalar(v))
    }

    #[test]
    fn test_allocate_then_fill_completes() {
        let mut config = single_scene_config(3);
        assert!(!config.is_complete(0, "a"));

        config.allocate(0, "a", MetricKind::Psnr, 3).unwrap();
        assert_eq!(config.slots(0, "a", MetricKind::Psnr).unwrap().len(), 3);
        for frame in 0..3 {
            assert!(!config.is_complete(0, "a"));
            config.set_score(0, "a", MetricKind::Psnr, frame, score(frame as f64)).unwrap();
        }
        assert!(config.is_complete(0, "a"));
    }

    #[test]
    fn test_generated_jobs_complete_on_last_slot() {
        use crate::config::generate::random_configuration;
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        for seed in 0..40 {
            let mut config = random_configuration(&mut StdRng::seed_from_u64(seed));
            let metrics: Vec<MetricKind> = config.metrics.keys().copied().collect();

            for scene in 0..config.scenes.len() {
                let variants: Vec<(String, usize)> = config.scenes[scene]
                    .distorted
                    .iter()
                    .map(|(id, v)| (id.clone(), v.frame_count()))
                    .collect();

                for (id, frames) in variants {
                    for (m, &metric) in metrics.iter().enumerate() {
                        config.allocate(scene, &id, metric, frames).unwrap();
                        for frame in 0..frames {
                            assert!(!config.is_complete(scene, &id), "seed {} scene {} {}", seed, scene, id);
                            config.set_score(scene, &id, metric, frame, score(frame as f64)).unwrap();
                        }
                        let last = m + 1 == metrics.len();
                        assert_eq!(config.is_complete(scene, &id), last, "seed {} scene {} {}", seed, scene, id);
                    }
                }
            }

            let counts = config.frames_scored();
            assert_eq!(counts.remaining, 0, "seed {}", seed);
            assert_eq!(config.filled_slots(), config.total_frames(), "seed {}", seed);
        }
    }

    #[test]
    fn test_complete_requires_every_metric() {
        let mut config = single_scene_config(2);
        config.metrics.insert(MetricKind::Vmaf, Default::default());
        config.allocate(0, "a", MetricKind::Psnr, 2).unwrap();
        for frame in 0..2 {
            config.set_score(0, "a", MetricKind::Psnr, frame, score(1.0)).unwrap();
        }
        assert!(!config.is_complete(0, "a"), "VMAF has no scores yet");

        config.allocate(0, "a", MetricKind::Vmaf, 2).unwrap();
        for frame in 0..2 {
            config.set_score(0, "a", MetricKind::Vmaf, frame, score(90.0)).unwrap();
        }
        assert!(config.is_complete(0, "a"));
    }

    #[test]
    fn test_set_out_of_range_does_not_mutate() {
        let mut config = single_scene_config(3);
        config.allocate(0, "a", MetricKind::Psnr, 3).unwrap();
        let before = config.clone();

        let err = config.set_score(0, "a", MetricKind::Psnr, 3, score(1.0)).unwrap_err();
        assert!(matches!(err, MetrologistError::OutOfRange { frame: 3, length: 3, .. }));
        assert_eq!(config, before);

        let err = config.set_score(0, "a", MetricKind::Vmaf, 0, score(1.0)).unwrap_err();
        assert!(matches!(err, MetrologistError::OutOfRange { length: 0, .. }));
        assert_eq!(config, before);
    }

    #[test]
    fn test_set_overwrites_filled_slot() {
        let mut config = single_scene_config(1);
        config.allocate(0, "a", MetricKind::Psnr, 1).unwrap();
        config.set_score(0, "a", MetricKind::Psnr, 0, score(1.0)).unwrap();
        config.set_score(0, "a", MetricKind::Psnr, 0, score(2.0)).unwrap();
        let slot = config.slots(0, "a", MetricKind::Psnr).unwrap()[0].as_ref().unwrap();
        assert_eq!(slot.value, ScoreValue::scalar(2.0));
    }

    #[test]
    fn test_allocate_larger_resets_filled_slots() {
        let mut config = single_scene_config(4);
        config.allocate(0, "a", MetricKind::Psnr, 2).unwrap();
        config.set_score(0, "a", MetricKind::Psnr, 0, score(7.0)).unwrap();

        config.allocate(0, "a", MetricKind::Psnr, 4).unwrap();
        let slots = config.slots(0, "a", MetricKind::Psnr).unwrap();
        assert_eq!(slots.len(), 4);
        assert!(slots.iter().all(Option::is_none), "reallocation is destructive");
    }

    #[test]
    fn test_grow_preserves_filled_slots() {
        let mut config = single_scene_config(4);
        config.allocate(0, "a", MetricKind::Psnr, 2).unwrap();
        config.set_score(0, "a", MetricKind::Psnr, 1, score(7.0)).unwrap();

        config.grow(0, "a", MetricKind::Psnr, 4).unwrap();
        let slots = config.slots(0, "a", MetricKind::Psnr).unwrap();
        assert_eq!(slots.len(), 4);
        assert!(slots[1].is_some());
        assert_eq!(slots.iter().filter(|s| s.is_some()).count(), 1);
    }

    #[test]
    fn test_allocate_never_shrinks() {
        let mut config = single_scene_config(4);
        config.allocate(0, "a", MetricKind::Psnr, 4).unwrap();
        config.set_score(0, "a", MetricKind::Psnr, 3, score(1.0)).unwrap();
        config.allocate(0, "a", MetricKind::Psnr, 2).unwrap();
        assert_eq!(config.slots(0, "a", MetricKind::Psnr).unwrap().len(), 4);
        assert_eq!(config.filled_slots(), 1);
    }

    #[test]
    fn test_record_arrival_sizes_to_variant_range() {
        let mut config = single_scene_config(5);
        let arrival = ScoreArrival {
            scene: 0,
            distorted_id: "a".into(),
            frame: 4,
            metric: MetricKind::Psnr,
            score: score(33.0),
        };
        config.record_arrival(&arrival, Reallocation::Preserve).unwrap();
        assert_eq!(config.slots(0, "a", MetricKind::Psnr).unwrap().len(), 5);
        assert_eq!(config.filled_slots(), 1);

        let stray = ScoreArrival { distorted_id: "zz".into(), ..arrival };
        assert!(config.record_arrival(&stray, Reallocation::Preserve).unwrap_err().is_contract_violation());
    }

    #[test]
    fn test_frame_counts() {
        let mut config = single_scene_config(3);
        config.scenes[0].distorted.insert("b".into(), DistortedScene::new(10, 14));
        config.metrics.insert(MetricKind::Vmaf, Default::default());
        assert_eq!(config.total_frames(), 2 * 3 + 2 * 4);

        for metric in [MetricKind::Psnr, MetricKind::Vmaf] {
            config.allocate(0, "a", metric, 3).unwrap();
            for frame in 0..3 {
                config.set_score(0, "a", metric, frame, score(1.0)).unwrap();
            }
        }
        assert_eq!(config.frames_scored(), FramesScored { completed: 3, remaining: 4 });
        assert_eq!(config.filled_slots(), 6);
    }
}
