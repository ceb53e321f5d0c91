//! Static, per-vegetation-type parameter bundles, loaded once per run and frozen.
//!
//! Mirrors the per-type `setStaticData()` routines in the source model (e.g.
//! `WetlandTundra::setStaticData`): one bundle of fire-probability, seed-dispersal,
//! growth, and start-age parameters per [`VegType`], validated against the config
//! dictionary at load time and never mutated afterward.

use crate::config::ConfigSource;
use crate::error::{SimError, SimResult};
use crate::frame::VegType;
use crate::rng::ReplicateRng;
use rustc_hash::FxHashMap;

/// How an establishing cell is assigned an initial age at landscape load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartAgeDistribution {
    /// `age = 1 + floor(u * p0)`.
    Constant { p0: f64 },
    /// Weibull reliability integrated and normalized over `[0, ceil(5*p0)]`.
    Weibull { p0: f64, p1: f64 },
}

impl StartAgeDistribution {
    /// Draw an initial age from this distribution.
    pub fn sample(&self, rng: &mut ReplicateRng) -> i64 {
        match self {
            StartAgeDistribution::Constant { p0 } => {
                let u = rng.next_uniform();
                1 + (u * p0).floor() as i64
            }
            StartAgeDistribution::Weibull { p0, p1 } => {
                let cdf = weibull_cdf_table(*p0, *p1);
                let u = rng.next_uniform();
                for (age, cumulative) in cdf.iter().enumerate() {
                    if *cumulative >= u {
                        return age as i64;
                    }
                }
                (cdf.len() as i64 - 1).max(0)
            }
        }
    }
}

/// Weibull reliability function `exp(-(age/p1)^p0)`, used as the unnormalized density
/// for the start-age draw.
fn weibull_reliability(age: f64, p0: f64, p1: f64) -> f64 {
    if p1 <= 0.0 {
        return 0.0;
    }
    (-(age / p1).powf(p0)).exp()
}

/// Numerically integrate the Weibull reliability over `[0, ceil(5*p0)]` and normalize so
/// the final cumulative value is 1, matching the source's `Integrate`/normalize pair in
/// `WetlandTundra::setStaticData`.
fn weibull_cdf_table(p0: f64, p1: f64) -> Vec<f64> {
    if p0 == 0.0 {
        return vec![1.0];
    }
    let length = (5.0 * p0).ceil().max(1.0) as usize;
    let mut table = vec![0.0; length];
    let mut running = 0.0;
    for (age, slot) in table.iter_mut().enumerate() {
        running += weibull_reliability(age as f64, p0, p1);
        *slot = running;
    }
    let total = *table.last().unwrap_or(&1.0);
    if total > 0.0 {
        for v in &mut table {
            *v /= total;
        }
    }
    table
}

/// Immutable per-type parameter bundle.
#[derive(Debug, Clone)]
pub struct SpeciesParams {
    pub veg_type: VegType,
    pub fire_prob_age_dependent: bool,
    /// Constant fire probability, or the 3-term age regression coefficients.
    pub fire_prob: FireProb,
    pub ignition_depressor: f64,
    pub human_fire_prob: f64,
    pub base_flammability: [f64; 2],
    pub seed_range: f64,
    pub seed_source: [f64; 2],
    pub seed_basal_area: f64,
    pub seedling: f64,
    pub seedling_basal_area: f64,
    pub history: i64,
    pub seed_est_params: [f64; 2],
    pub mean_growth: f64,
    pub climate_growth: [f64; 3],
    pub calibration_factor: [f64; 2],
    pub tundra_spruce_basal_area: f64,
    pub start_age: StartAgeDistribution,
}

#[derive(Debug, Clone, Copy)]
pub enum FireProb {
    Constant(f64),
    AgeDependent([f64; 3]),
}

impl SpeciesParams {
    /// `fireProb = f(age; params)` when age-dependent, else the constant.
    pub fn fire_probability(&self, age: i64) -> f64 {
        match self.fire_prob {
            FireProb::Constant(p) => p,
            FireProb::AgeDependent([a0, a1, a2]) => {
                let age = age as f64;
                (a0 + a1 * age + a2 * age * age).clamp(0.0, 1.0)
            }
        }
    }

    /// Per-type base flammability regression used by fire spread: `clamp(b0 + b1*age, 0, 1)`.
    pub fn base_flammability(&self, age: i64) -> f64 {
        (self.base_flammability[0] + self.base_flammability[1] * age as f64).clamp(0.0, 1.0)
    }
}

/// All loaded species bundles, keyed by vegetation type. Immutable after construction.
#[derive(Debug, Clone)]
pub struct SpeciesRegistry {
    params: FxHashMap<VegType, SpeciesParams>,
}

impl SpeciesRegistry {
    /// Load and validate a bundle for every type in `types`, failing fatally (naming the
    /// offending key) on a missing or wrong-arity key.
    pub fn load(config: &dyn ConfigSource, types: &[VegType]) -> SimResult<Self> {
        let mut params = FxHashMap::default();
        for &veg_type in types {
            if veg_type == VegType::NoVeg {
                continue;
            }
            params.insert(veg_type, load_one(config, veg_type)?);
        }
        Ok(Self { params })
    }

    pub fn get(&self, veg_type: VegType) -> SimResult<&SpeciesParams> {
        self.params
            .get(&veg_type)
            .ok_or_else(|| SimError::Invariant(format!("no species params registered for {veg_type:?}")))
    }

    pub fn is_age_dependent_fire_prob(&self, veg_type: VegType) -> bool {
        self.params
            .get(&veg_type)
            .map(|p| p.fire_prob_age_dependent)
            .unwrap_or(false)
    }

    pub fn fire_prob(&self, veg_type: VegType, age: i64) -> f64 {
        self.params
            .get(&veg_type)
            .map(|p| p.fire_probability(age))
            .unwrap_or(0.0)
    }
}

fn load_one(config: &dyn ConfigSource, veg_type: VegType) -> SimResult<SpeciesParams> {
    let prefix = veg_type.config_prefix();
    let key = |suffix: &str| format!("{prefix}.{suffix}");

    let fire_prob_age_dependent = config.get_bool_or(&key("FireProb.IsAgeDependent"), false)?;
    let fire_prob = if fire_prob_age_dependent {
        let arr = config.get_float_array_exact(&key("FireProb"), 3)?;
        FireProb::AgeDependent([arr[0], arr[1], arr[2]])
    } else {
        FireProb::Constant(config.get_float(&key("FireProb"))?)
    };
    let ignition_depressor = config.get_float_or(&key("IgnitionDepressor"), 1.0)?;
    let human_fire_prob = config.get_float_or(&key("HumanFireProb"), 0.0)?;
    let base_flammability = {
        let arr = config.get_float_array_exact(&key("BaseFlammability"), 2)?;
        [arr[0], arr[1]]
    };
    let seed_range = config.get_float(&key("SeedRange"))?;
    let seed_source = {
        let arr = config.get_float_array_exact(&key("SeedSource"), 2)?;
        [arr[0], arr[1]]
    };
    let seed_basal_area = config.get_float(&key("Seed.BasalArea"))?;
    let seedling = config.get_float(&key("Seedling"))?;
    let seedling_basal_area = config.get_float(&key("SeedlingBA"))?;
    let history = config.get_int(&key("History"))?;
    let seed_est_params = {
        let arr = config.get_float_array_exact(&key("SeedEstParms"), 2)?;
        [arr[0], arr[1]]
    };
    let mean_growth = config.get_float(&key("MeanGrowth"))?;
    let climate_growth = {
        let arr = config.get_float_array_exact(&key("ClimGrowth"), 3)?;
        [arr[0], arr[1], arr[2]]
    };
    let calibration_factor = {
        let arr = config.get_float_array_exact(&key("CalFactor"), 2)?;
        [arr[0], arr[1]]
    };
    let tundra_spruce_basal_area = config.get_float_or(&key("Spruce.BasalArea"), 0.0)?;

    let start_age_type = config.get_string(&key("StartAge.Type")).unwrap_or_else(|_| "Constant".to_string());
    let start_age = if start_age_type.eq_ignore_ascii_case("Weibull") {
        let arr = config.get_float_array_exact(&key("StartAge"), 2)?;
        StartAgeDistribution::Weibull { p0: arr[0], p1: arr[1] }
    } else {
        let arr = config.get_float_array_exact(&key("StartAge"), 1)?;
        StartAgeDistribution::Constant { p0: arr[0] }
    };

    Ok(SpeciesParams {
        veg_type,
        fire_prob_age_dependent,
        fire_prob,
        ignition_depressor,
        human_fire_prob,
        base_flammability,
        seed_range,
        seed_source,
        seed_basal_area,
        seedling,
        seedling_basal_area,
        history,
        seed_est_params,
        mean_growth,
        climate_growth,
        calibration_factor,
        tundra_spruce_basal_area,
        start_age,
    })
}
