use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};

use crate::sample::{ConstructionType, Region, Sample, Variant};
use crate::{EstimatorError, Result};

/// Base consumption rates of the area-only label model, per square meter.
/// The inference floor reuses these exact values, so predictions can never
/// fall below what synthesis considers physically minimal.
pub const CEMENT_RATE: f32 = 8.0; // kg/m2
pub const SAND_RATE: f32 = 20.0; // kg/m2
pub const BRICK_RATE: f32 = 14.0; // units/m2

/// Base consumption rates of the categorical label model, before the
/// per-category adjustment factors.
const CEMENT_BASE: f32 = 0.2; // kg/m2
const SAND_BASE: f32 = 0.6; // kg/m2
const BRICK_BASE: f32 = 62.5; // units/m2, stored as thousands

/// Area domain shared by both variants.
const AREA_MIN: f32 = 1.0;
const AREA_MAX: f32 = 500.0;

/// Mean of the exponential area distribution (area-only variant).
const AREA_EXP_SCALE: f32 = 100.0;

/// Log-uniform area bands and their mixing proportions (categorical variant).
/// The banded mixture keeps small areas from dominating the sample.
const AREA_BANDS: [(f32, f32, f32); 3] = [(1.0, 10.0, 0.3), (10.0, 50.0, 0.3), (50.0, 500.0, 0.4)];

const TYPE_WEIGHTS: [f32; 3] = [0.6, 0.3, 0.1];
const REGION_WEIGHTS: [f32; 3] = [0.5, 0.3, 0.2];

/// Controls one synthesis run.
#[derive(Debug, Clone, Copy)]
pub struct SynthConfig {
    pub samples: usize,
    pub seed: u64,
    pub variant: Variant,
}

impl SynthConfig {
    pub fn new(samples: usize, seed: u64, variant: Variant) -> Self {
        Self { samples, seed, variant }
    }
}

fn cement_factor(t: ConstructionType) -> f32 {
    match t {
        ConstructionType::Residential => 1.0,
        ConstructionType::Commercial => 1.05,
        ConstructionType::Industrial => 1.1,
    }
}

fn sand_factor(t: ConstructionType) -> f32 {
    match t {
        ConstructionType::Residential | ConstructionType::Commercial => 1.0,
        ConstructionType::Industrial => 1.05,
    }
}

/// Brick adjustment depends on both region and construction type.
fn brick_factor(r: Region, t: ConstructionType) -> f32 {
    match (r, t) {
        (Region::Urban, ConstructionType::Residential) => 1.0,
        (Region::Urban, ConstructionType::Commercial) => 1.2,
        (Region::Urban, ConstructionType::Industrial) => 1.5,
        (Region::Suburban, ConstructionType::Residential) => 0.95,
        (Region::Suburban, ConstructionType::Commercial) => 1.15,
        (Region::Suburban, ConstructionType::Industrial) => 1.4,
        (Region::Rural, ConstructionType::Residential) => 0.9,
        (Region::Rural, ConstructionType::Commercial) => 1.1,
        (Region::Rural, ConstructionType::Industrial) => 1.3,
    }
}

fn pick_weighted<R: Rng>(rng: &mut R, weights: &[f32]) -> usize {
    let total: f32 = weights.iter().sum();
    let mut u = rng.random::<f32>() * total;
    for (i, w) in weights.iter().enumerate() {
        u -= w;
        if u <= 0.0 {
            return i;
        }
    }
    weights.len() - 1
}

fn round_to(x: f32, decimals: i32) -> f32 {
    let scale = 10.0_f32.powi(decimals);
    (x * scale).round() / scale
}

fn sample_area<R: Rng>(rng: &mut R, variant: Variant, exp: &Exp<f32>) -> f32 {
    let area = match variant {
        Variant::AreaOnly => exp.sample(rng).clamp(AREA_MIN, AREA_MAX),
        Variant::Categorical => {
            let weights: Vec<f32> = AREA_BANDS.iter().map(|b| b.2).collect();
            let (lo, hi, _) = AREA_BANDS[pick_weighted(rng, &weights)];
            let u = rng.random_range(lo.ln()..hi.ln());
            u.exp().clamp(AREA_MIN, AREA_MAX)
        }
    };

    round_to(area, 1)
}

fn labels<R: Rng>(rng: &mut R, variant: Variant, area: f32, t: ConstructionType, r: Region) -> (f32, f32, f32) {
    match variant {
        Variant::AreaOnly => {
            let cement = CEMENT_RATE * area * rng.random_range(0.95..1.05);
            let sand = SAND_RATE * area * rng.random_range(0.95..1.05);
            // Relative noise narrows for larger projects.
            let band = if area < 50.0 { 0.10 } else { 0.08 };
            let bricks = BRICK_RATE * area * rng.random_range(1.0 - band..1.0 + band);

            (round_to(cement, 1), round_to(sand, 1), bricks.round())
        }
        Variant::Categorical => {
            let cement = CEMENT_BASE * area * cement_factor(t) * rng.random_range(0.9..1.1);
            let sand = SAND_BASE * area * sand_factor(t) * rng.random_range(0.8..1.2);
            let bricks = BRICK_BASE * area * brick_factor(r, t) * rng.random_range(0.9..1.1) / 1000.0;

            (round_to(cement, 1), round_to(sand, 1), round_to(bricks, 3))
        }
    }
}

/// Produces a labeled synthetic dataset. No real-world measurement is
/// involved; every label follows the parametric rates above plus independent
/// uniform noise. Deterministic for a fixed config.
pub fn synthesize(cfg: &SynthConfig) -> Result<Vec<Sample>> {
    if cfg.samples == 0 {
        return Err(EstimatorError::InvalidConfig {
            field: "samples",
            msg: "must be greater than zero",
        });
    }

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let exp = Exp::new(1.0 / AREA_EXP_SCALE).map_err(|_| EstimatorError::InvalidConfig {
        field: "area distribution",
        msg: "invalid exponential rate",
    })?;

    let mut samples = Vec::with_capacity(cfg.samples);
    for _ in 0..cfg.samples {
        let area = sample_area(&mut rng, cfg.variant, &exp);
        let t = ConstructionType::ALL[pick_weighted(&mut rng, &TYPE_WEIGHTS)];
        let r = Region::ALL[pick_weighted(&mut rng, &REGION_WEIGHTS)];

        let (cement, sand, bricks) = labels(&mut rng, cfg.variant, area, t, r);
        samples.push(Sample {
            area,
            construction_type: t,
            region: r,
            cement: cement.max(0.0),
            sand: sand.max(0.0),
            bricks: bricks.max(0.0),
        });
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(variant: Variant) -> SynthConfig {
        SynthConfig::new(2_000, 42, variant)
    }

    #[test]
    fn all_quantities_within_domain_bounds() {
        for variant in [Variant::AreaOnly, Variant::Categorical] {
            let samples = synthesize(&cfg(variant)).unwrap();
            assert_eq!(samples.len(), 2_000);
            for s in &samples {
                assert!((AREA_MIN..=AREA_MAX).contains(&s.area), "area {}", s.area);
                assert!(s.cement >= 0.0 && s.sand >= 0.0 && s.bricks >= 0.0);
            }
        }
    }

    #[test]
    fn synthesis_is_deterministic_for_a_seed() {
        let a = synthesize(&cfg(Variant::Categorical)).unwrap();
        let b = synthesize(&cfg(Variant::Categorical)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let a = synthesize(&SynthConfig::new(100, 1, Variant::AreaOnly)).unwrap();
        let b = synthesize(&SynthConfig::new(100, 2, Variant::AreaOnly)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn area_only_labels_track_base_rates() {
        let samples = synthesize(&cfg(Variant::AreaOnly)).unwrap();
        for s in &samples {
            assert!(s.cement >= CEMENT_RATE * s.area * 0.94, "cement {} area {}", s.cement, s.area);
            assert!(s.cement <= CEMENT_RATE * s.area * 1.06);
            assert!(s.sand >= SAND_RATE * s.area * 0.94);
            assert!(s.sand <= SAND_RATE * s.area * 1.06);
            assert!(s.bricks >= (BRICK_RATE * s.area * 0.89).floor());
            assert!(s.bricks <= (BRICK_RATE * s.area * 1.11).ceil());
        }
    }

    #[test]
    fn categorical_mix_respects_weights_roughly() {
        let samples = synthesize(&SynthConfig::new(20_000, 7, Variant::Categorical)).unwrap();
        let residential = samples
            .iter()
            .filter(|s| s.construction_type == ConstructionType::Residential)
            .count() as f32
            / samples.len() as f32;
        assert!((residential - 0.6).abs() < 0.03, "residential share {residential}");

        let urban = samples.iter().filter(|s| s.region == Region::Urban).count() as f32
            / samples.len() as f32;
        assert!((urban - 0.5).abs() < 0.03, "urban share {urban}");
    }

    #[test]
    fn zero_samples_is_rejected() {
        let res = synthesize(&SynthConfig::new(0, 1, Variant::AreaOnly));
        assert!(matches!(res, Err(EstimatorError::InvalidConfig { .. })));
    }
}
