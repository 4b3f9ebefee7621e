// Random job generation for demos and tests
// Scenes are laid end to end so they never overlap and never repeat.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use super::{
    Configuration, FrameRange, ImportMethod, ImportMethodType, Implementation, Input, MetricKind, MetricParams,
    Output, Scene,
};
use crate::constants::{GENERATE_MAX_SCENES, GENERATE_MAX_SCENE_LENGTH, GENERATE_MAX_VARIANTS};

const IMPORT_METHODS: [ImportMethodType; 4] = [
    ImportMethodType::Ffms2,
    ImportMethodType::Lsmash,
    ImportMethodType::Dgdecnv,
    ImportMethodType::Bestsource,
];

const IMPLEMENTATIONS: [Implementation; 3] = [Implementation::Cuda, Implementation::Hip, Implementation::Cpu];

/// A valid job with at least one variant, scene and metric, score sequences prepared.
pub fn random_configuration<R: Rng + ?Sized>(rng: &mut R) -> Configuration {
    let variant_count = rng.gen_range(1..=GENERATE_MAX_VARIANTS);
    let ids: Vec<String> = (1..=variant_count).map(|i| format!("distorted-{}", i)).collect();

    let distorted: BTreeMap<String, Input> = ids
        .iter()
        .map(|id| (id.clone(), Input::new(format!("/videos/{}.mkv", id), random_import_methods(rng))))
        .collect();

    let metric_count = rng.gen_range(1..=MetricKind::ALL.len());
    let metrics: BTreeMap<MetricKind, MetricParams> = MetricKind::ALL
        .choose_multiple(rng, metric_count)
        .map(|kind| (*kind, random_params(rng, *kind)))
        .collect();

    let scene_count = rng.gen_range(1..=GENERATE_MAX_SCENES);
    let mut start = 0u32;
    let mut scenes = Vec::with_capacity(scene_count);
    for _ in 0..scene_count {
        let end = start + rng.gen_range(1..=GENERATE_MAX_SCENE_LENGTH);
        let members: Vec<&String> = ids.iter().filter(|_| rng.gen_bool(0.8)).collect();
        // every scene compares at least one variant
        let members = if members.is_empty() { vec![&ids[0]] } else { members };
        scenes.push(Scene::aligned(FrameRange::new(start, end), members.into_iter().cloned()));
        start = end;
    }

    let mut config = Configuration {
        schema: None,
        reference: Input::new("/videos/reference.mkv", random_import_methods(rng)),
        distorted,
        metrics,
        scenes,
        output: Some(Output {
            path: None,
            console: None,
            verbose: Some(rng.gen_bool(0.5)),
        }),
        threads: rng.gen_bool(0.5).then(|| rng.gen_range(1..=16)),
    };
    config.prepare_scores();
    config
}

/// Non-empty, duplicate-free, in random priority order.
fn random_import_methods<R: Rng + ?Sized>(rng: &mut R) -> Vec<ImportMethod> {
    let count = rng.gen_range(1..=IMPORT_METHODS.len());
    IMPORT_METHODS
        .choose_multiple(rng, count)
        .map(|method| ImportMethod::new(*method))
        .collect()
}

fn random_params<R: Rng + ?Sized>(rng: &mut R, kind: MetricKind) -> MetricParams {
    let mut params = MetricParams::default();
    if rng.gen_bool(0.25) {
        params = params.with_regions(rng.gen_range(1..=4), rng.gen_range(1..=4));
    }
    if kind.supports_implementation() && rng.gen_bool(0.5) {
        params.implementation = IMPLEMENTATIONS.choose(rng).copied();
    }
    if kind == MetricKind::Butteraugli && rng.gen_bool(0.5) {
        params.intensity_target = Some(rng.gen_range(80..=1000));
        params.linput = Some(rng.gen_bool(0.5));
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_jobs_are_valid() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let config = random_configuration(&mut rng);
            config.validate().unwrap_or_else(|e| panic!("seed {}: {}", seed, e));

            assert!(!config.distorted.is_empty());
            assert!(!config.metrics.is_empty());
            assert!(config.distorted.len() <= GENERATE_MAX_VARIANTS);
            assert!(config.scenes.len() <= GENERATE_MAX_SCENES);
            for scene in &config.scenes {
                assert!(!scene.distorted.is_empty());
                assert!(!scene.reference.is_empty());
                for variant in scene.distorted.values() {
                    assert_eq!(variant.scores.len(), config.metrics.len(), "scores prepared");
                }
            }
        }
    }

    #[test]
    fn test_scenes_do_not_overlap() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = random_configuration(&mut rng);
        for pair in config.scenes.windows(2) {
            assert_eq!(pair[0].reference.end, pair[1].reference.start);
        }
    }

    #[test]
    fn test_same_seed_same_job() {
        let a = random_configuration(&mut StdRng::seed_from_u64(42));
        let b = random_configuration(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_generated_job_survives_json() {
        let config = random_configuration(&mut StdRng::seed_from_u64(3));
        let json = config.to_json_pretty().unwrap();
        assert_eq!(Configuration::from_json(&json).unwrap(), config);
    }
}
