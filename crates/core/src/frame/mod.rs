//! Polymorphic per-cell vegetation state.
//!
//! A [`Frame`] is a tagged variant over the closed vegetation-type set plus the shared
//! attributes every cell carries, instead of a deep inheritance hierarchy: common fields
//! live on [`Frame`] itself, type-specific fields live in [`FrameKind`]'s payload.

pub mod succession;

use crate::raster::MapType;
use crate::rng::ReplicateRng;
use crate::species::{SpeciesParams, SpeciesRegistry};

/// The closed set of vegetation types a cell can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VegType {
    Tundra,
    WetlandTundra,
    ShrubTundra,
    GraminoidTundra,
    BlackSpruce,
    WhiteSpruce,
    Deciduous,
    Grassland,
    BarrenLichenMoss,
    TemperateRainforest,
    NoVeg,
}

impl VegType {
    /// Config key prefix this type's parameters are read under.
    pub fn config_prefix(self) -> &'static str {
        match self {
            VegType::Tundra => "Tundra",
            VegType::WetlandTundra => "WetlandTundra",
            VegType::ShrubTundra => "ShrubTundra",
            VegType::GraminoidTundra => "GraminoidTundra",
            VegType::BlackSpruce => "BSpruce",
            VegType::WhiteSpruce => "WSpruce",
            VegType::Deciduous => "Decid",
            VegType::Grassland => "Grassland",
            VegType::BarrenLichenMoss => "BarrenLichenMoss",
            VegType::TemperateRainforest => "TemperateRainforest",
            VegType::NoVeg => "NoVeg",
        }
    }

    /// The four tundra variants share one succession policy, parametrized by species.
    pub fn is_tundra_variant(self) -> bool {
        matches!(
            self,
            VegType::Tundra | VegType::WetlandTundra | VegType::ShrubTundra | VegType::GraminoidTundra
        )
    }

    pub fn is_spruce(self) -> bool {
        matches!(self, VegType::BlackSpruce | VegType::WhiteSpruce)
    }

    /// Types that carry a basal-area payload (tundra variants and spruce).
    pub fn is_woody(self) -> bool {
        self.is_tundra_variant() || self.is_spruce()
    }

    /// `NoVeg` never ignites and never transitions.
    pub fn is_flammable(self) -> bool {
        self != VegType::NoVeg
    }

    /// Reverse of [`VegType::config_prefix`]; used when config names a vegetation type by
    /// its prefix string, e.g. a habitat definition's `VegTypes` list.
    pub fn from_config_prefix(prefix: &str) -> Option<VegType> {
        VegType::ALL.iter().copied().find(|t| t.config_prefix() == prefix)
    }

    /// All non-`NoVeg` members of the closed set, in a fixed order used wherever a
    /// deterministic iteration over types is needed (e.g. registry loading).
    pub const ALL: [VegType; 11] = [
        VegType::Tundra,
        VegType::WetlandTundra,
        VegType::ShrubTundra,
        VegType::GraminoidTundra,
        VegType::BlackSpruce,
        VegType::WhiteSpruce,
        VegType::Deciduous,
        VegType::Grassland,
        VegType::BarrenLichenMoss,
        VegType::TemperateRainforest,
        VegType::NoVeg,
    ];
}

/// Severity of the most recent burn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnSeverity {
    None,
    LowLss,
    Moderate,
    HighLss,
    HighHss,
}

/// Type-specific payload. Tundra variants and spruce share the woody/basal-area shape;
/// everything else carries no extra state beyond the common fields.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    Woody(WoodyState),
    Deciduous,
    Grassland,
    BarrenLichenMoss,
    TemperateRainforest,
    NoVeg,
}

/// Shared state for the woody (tundra + spruce) types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WoodyState {
    pub basal_area: f64,
    pub year_of_establishment: i64,
    pub degrees: f64,
}

impl WoodyState {
    /// Fresh establishment, per the initial-basal-area formula: `ratioAK * ((spruceBA /
    /// ratioAK + 1)^u - 1)`, zero when `ratioAK == 0` (i.e. `k == 0`).
    pub fn establish(params: &SpeciesParams, tree_density: i64, rng: &mut ReplicateRng) -> Self {
        let basal_area = if tree_density <= 0 {
            0.0
        } else {
            initial_basal_area(params, rng)
        };
        WoodyState {
            basal_area,
            year_of_establishment: 0,
            degrees: -1.0,
        }
    }
}

/// `ratioAK = alpha/k`; `alpha` folds in the fat-tail seed-source kernel evaluated at the
/// cell's own location, `k = calib[0] * meanGrowth`.
pub fn ratio_ak(params: &SpeciesParams) -> f64 {
    let fat_tail_self = succession::fat_tail(0.0, params.seed_source[0], params.seed_source[1]);
    let alpha = params.calibration_factor[1] * params.tundra_spruce_basal_area * params.seed_basal_area * fat_tail_self
        / params.seedling
        * params.seedling_basal_area;
    let k = params.calibration_factor[0] * params.mean_growth;
    if k != 0.0 {
        alpha / k
    } else {
        0.0
    }
}

fn initial_basal_area(params: &SpeciesParams, rng: &mut ReplicateRng) -> f64 {
    let ratio_ak = ratio_ak(params);
    if ratio_ak == 0.0 {
        return 0.0;
    }
    let u = rng.next_uniform();
    ratio_ak * ((params.tundra_spruce_basal_area / ratio_ak + 1.0).powf(u) - 1.0)
}

/// One cell's vegetation state for one year.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub veg_type: VegType,
    pub age: i64,
    pub year_of_last_burn: i64,
    pub burn_severity: BurnSeverity,
    pub year_established: i64,
    pub year_frame_established: i64,
    pub site: f64,
    pub is_topo_complex: bool,
    pub fire_ignition_factor: f64,
    pub fire_sensitivity: f64,
    pub species_sub_canopy: VegType,
    pub fire_scar_id: u32,
    pub last_burn_was_origin: bool,
    pub kind: FrameKind,
}

impl Frame {
    /// Construct a freshly-established frame of `veg_type` at grid load time.
    pub fn establish(
        veg_type: VegType,
        current_year: i64,
        site: f64,
        is_topo_complex: bool,
        fire_ignition_factor: f64,
        fire_sensitivity: f64,
        species_sub_canopy: VegType,
        tree_density: i64,
        registry: &SpeciesRegistry,
        rng: &mut ReplicateRng,
    ) -> crate::error::SimResult<Self> {
        let kind = if veg_type == VegType::NoVeg {
            FrameKind::NoVeg
        } else if veg_type.is_woody() {
            let params = registry.get(veg_type)?;
            FrameKind::Woody(WoodyState::establish(params, tree_density, rng))
        } else {
            match veg_type {
                VegType::Deciduous => FrameKind::Deciduous,
                VegType::Grassland => FrameKind::Grassland,
                VegType::BarrenLichenMoss => FrameKind::BarrenLichenMoss,
                VegType::TemperateRainforest => FrameKind::TemperateRainforest,
                _ => unreachable!("woody and NoVeg handled above"),
            }
        };
        let age = if veg_type.is_woody() {
            let params = registry.get(veg_type)?;
            params.start_age.sample(rng)
        } else {
            0
        };
        Ok(Frame {
            veg_type,
            age: age.max(0),
            year_of_last_burn: -1,
            burn_severity: BurnSeverity::None,
            year_established: current_year,
            year_frame_established: current_year,
            site,
            is_topo_complex,
            fire_ignition_factor,
            fire_sensitivity,
            species_sub_canopy,
            fire_scar_id: 0,
            last_burn_was_origin: false,
            kind,
        })
    }

    pub fn age(&self) -> i64 {
        self.age
    }

    pub fn veg_type(&self) -> VegType {
        self.veg_type
    }

    pub fn site(&self) -> f64 {
        self.site
    }

    pub fn basal_area(&self) -> Option<f64> {
        match &self.kind {
            FrameKind::Woody(w) => Some(w.basal_area),
            _ => None,
        }
    }

    /// `fireProb(type, age) * ignitionDepressor + humanIgnitionsProb`, the probability
    /// the ignition phase compares a uniform draw against.
    pub fn fire_probability(&self, registry: &SpeciesRegistry) -> crate::error::SimResult<f64> {
        if self.veg_type == VegType::NoVeg {
            return Ok(0.0);
        }
        let params = registry.get(self.veg_type)?;
        Ok(params.fire_probability(self.age) * params.ignition_depressor * self.fire_ignition_factor
            + params.human_fire_prob)
    }

    /// Base flammability used by fire spread, before sensitivity/topo/suppression
    /// multipliers are applied.
    pub fn base_flammability(&self, registry: &SpeciesRegistry) -> crate::error::SimResult<f64> {
        if self.veg_type == VegType::NoVeg {
            return Ok(0.0);
        }
        Ok(registry.get(self.veg_type)?.base_flammability(self.age))
    }

    /// The neighborhood query callback: this cell's weighted contribution to a
    /// neighbor's seed-source tally.
    pub fn query_reply(&self, weight: f64) -> f64 {
        self.basal_area().unwrap_or(0.0) * weight
    }

    /// Read this frame's value for a given output map type. Returns an invariant error
    /// for a type/map combination the frame doesn't support — the hot-loop "programmer
    /// error" case from the error taxonomy.
    pub fn get_as_byte(&self, map_type: MapType) -> crate::error::SimResult<u8> {
        match map_type {
            MapType::Vegetation => Ok(veg_type_code(self.veg_type)),
            MapType::BurnSeverity => Ok(burn_severity_code(self.burn_severity)),
            MapType::Subcanopy => Ok(veg_type_code(self.species_sub_canopy)),
            MapType::DecidSpeciesTrajectory if self.veg_type == VegType::Deciduous => {
                Ok(veg_type_code(self.species_sub_canopy))
            }
            other => Err(crate::error::SimError::Invariant(format!(
                "frame type {:?} does not support map type {other:?}",
                self.veg_type
            ))),
        }
    }

    /// The succession rule: mutates `self` in place for the common case, returns a
    /// replacement frame only when the vegetation type actually changes.
    pub fn success(
        &mut self,
        grid: &crate::grid::Grid,
        row: usize,
        col: usize,
        registry: &SpeciesRegistry,
        ctx: &succession::SuccessionContext,
        rng: &mut ReplicateRng,
    ) -> crate::error::SimResult<Option<Frame>> {
        succession::success(self, grid, row, col, registry, ctx, rng)
    }

    pub fn get_as_float(&self, map_type: MapType) -> crate::error::SimResult<f32> {
        match map_type {
            MapType::SiteVariable => Ok(self.site as f32),
            MapType::TundraBasalArea => self.basal_area().map(|b| b as f32).ok_or_else(|| {
                crate::error::SimError::Invariant(format!(
                    "frame type {:?} does not support map type {map_type:?}",
                    self.veg_type
                ))
            }),
            other => Err(crate::error::SimError::Invariant(format!(
                "frame type {:?} does not support map type {other:?}",
                self.veg_type
            ))),
        }
    }
}

/// Byte encoding for vegetation type rasters, in the closed-set declaration order.
pub fn veg_type_code(veg_type: VegType) -> u8 {
    VegType::ALL.iter().position(|&v| v == veg_type).unwrap_or(255) as u8
}

pub fn burn_severity_code(severity: BurnSeverity) -> u8 {
    match severity {
        BurnSeverity::None => 0,
        BurnSeverity::LowLss => 1,
        BurnSeverity::Moderate => 2,
        BurnSeverity::HighLss => 3,
        BurnSeverity::HighHss => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noveg_never_burns_and_never_transitions() {
        assert!(!VegType::NoVeg.is_flammable());
    }

    #[test]
    fn veg_type_codes_are_stable_and_distinct() {
        let codes: Vec<u8> = VegType::ALL.iter().map(|&v| veg_type_code(v)).collect();
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn zero_ratio_ak_gives_zero_initial_basal_area() {
        let params = crate::species::SpeciesParams {
            veg_type: VegType::WetlandTundra,
            fire_prob_age_dependent: false,
            fire_prob: crate::species::FireProb::Constant(0.0),
            ignition_depressor: 1.0,
            human_fire_prob: 0.0,
            base_flammability: [0.0, 0.0],
            seed_range: 1.0,
            seed_source: [1.0, 1.0],
            seed_basal_area: 1.0,
            seedling: 1.0,
            seedling_basal_area: 1.0,
            history: 1,
            seed_est_params: [0.0, 0.0],
            mean_growth: 0.0,
            climate_growth: [0.0, 0.0, 0.0],
            calibration_factor: [0.0, 0.0],
            tundra_spruce_basal_area: 10.0,
            start_age: crate::species::StartAgeDistribution::Constant { p0: 0.0 },
        };
        let mut rng = ReplicateRng::for_replicate(1, 0);
        assert_eq!(initial_basal_area(&params, &mut rng), 0.0);
    }
}
