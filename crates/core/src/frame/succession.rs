//! The `success()` rule: per-type succession behavior, invoked once per cell per year
//! after the fire phase. Mutates `frame` in place for the common case (a tundra cell's
//! running basal-area growth, for instance); returns `Some(new_frame)` only when the
//! cell's vegetation type actually changes, in which case the driver replaces the frame
//! outright instead of bumping its age.

use super::{Frame, FrameKind, VegType, WoodyState};
use crate::error::SimResult;
use crate::grid::Grid;
use crate::rng::ReplicateRng;
use crate::species::SpeciesRegistry;

/// Per-replicate knobs that affect succession but aren't per-cell state.
#[derive(Debug, Clone, Copy)]
pub struct SuccessionContext {
    pub current_year: i64,
    /// Gates the climate-growth terms the original source leaves commented out.
    pub climate_coupling_enabled: bool,
    pub climate_temp: f64,
    pub climate_precip: f64,
    /// `<Type>.History`-keyed window after which Deciduous reverts toward spruce.
    pub decid_to_spruce_window: i64,
}

/// Heavy-tailed seed-dispersal weight as a function of distance.
///
/// The source's `FatTail(distance, p0, p1)` header wasn't available to recover exactly;
/// this crate uses a power-law kernel with the same qualitative shape (weight 1 at
/// distance 0, monotonically decaying, heavier tail for smaller `p1`) — see DESIGN.md.
pub fn fat_tail(distance: f64, p0: f64, p1: f64) -> f64 {
    if p0 <= 0.0 {
        return if distance == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 / (1.0 + (distance / p0).powf(p1))
}

/// `Site(site, p)`: a power-law site-suitability curve, resolved per DESIGN.md's open
/// question. `Site(0, p) == 0` and `Site(1, p) == 1` for any `p`.
pub fn site_suitability(site: f64, p: f64) -> f64 {
    site.clamp(0.0, 1.0).powf(p)
}

/// Dispatch to the per-type succession rule. See module docs for the mutate-vs-replace
/// contract.
pub fn success(
    frame: &mut Frame,
    grid: &Grid,
    row: usize,
    col: usize,
    registry: &SpeciesRegistry,
    ctx: &SuccessionContext,
    rng: &mut ReplicateRng,
) -> SimResult<Option<Frame>> {
    match frame.veg_type {
        VegType::NoVeg => Ok(None),
        VegType::Tundra | VegType::WetlandTundra | VegType::ShrubTundra | VegType::GraminoidTundra => {
            tundra_success(frame, grid, row, col, registry, ctx, rng)
        }
        VegType::BlackSpruce | VegType::WhiteSpruce => spruce_success(frame, registry, ctx),
        VegType::Deciduous => deciduous_success(frame, registry, ctx),
        VegType::Grassland | VegType::BarrenLichenMoss | VegType::TemperateRainforest => Ok(None),
    }
}

fn tundra_success(
    frame: &mut Frame,
    grid: &Grid,
    row: usize,
    col: usize,
    registry: &SpeciesRegistry,
    ctx: &SuccessionContext,
    rng: &mut ReplicateRng,
) -> SimResult<Option<Frame>> {
    let params = registry.get(frame.veg_type)?.clone();

    let years_since_last_burn = ctx.current_year - frame.year_of_last_burn;
    if years_since_last_burn == 1 {
        if let FrameKind::Woody(woody) = &mut frame.kind {
            woody.basal_area = 0.0;
            woody.year_of_establishment = -params.history;
            woody.degrees = -1.0;
        }
        frame.year_established = ctx.current_year;
        frame.species_sub_canopy = frame.veg_type;
    }

    let seed_source = [params.seed_source[0], params.seed_source[1]];
    let mut seeds = grid.neighbors_success(row, col, params.seed_range, |distance, neighbor| {
        let weight = fat_tail(distance, seed_source[0], seed_source[1]);
        neighbor.query_reply(weight)
    });
    seeds -= frame.query_reply(fat_tail(0.0, seed_source[0], seed_source[1]));
    seeds *= params.seed_basal_area;
    seeds /= params.seedling;

    let growth_factor = if ctx.climate_coupling_enabled {
        let raw = params.climate_growth[0]
            + params.climate_growth[1] * ctx.climate_temp
            + params.climate_growth[2] * ctx.climate_precip;
        raw / 1000.0 * params.mean_growth
    } else {
        0.0
    };

    let FrameKind::Woody(woody) = &mut frame.kind else {
        return Err(crate::error::SimError::Invariant(format!(
            "tundra frame {:?} missing woody payload",
            frame.veg_type
        )));
    };
    if woody.basal_area == 0.0 && seeds > 0.0 {
        woody.year_of_establishment = ctx.current_year;
    }
    if ctx.climate_coupling_enabled {
        woody.basal_area += woody.basal_area * growth_factor * params.calibration_factor[0];
    }
    woody.basal_area += seeds * params.seedling_basal_area * params.calibration_factor[1];

    if woody.basal_area >= params.tundra_spruce_basal_area {
        let target = if frame.species_sub_canopy.is_spruce() {
            frame.species_sub_canopy
        } else {
            let probability = site_suitability(frame.site, 0.5);
            if probability > rng.next_uniform() {
                VegType::BlackSpruce
            } else {
                VegType::WhiteSpruce
            }
        };
        let new_params = registry.get(target)?;
        let new_woody = WoodyState::establish(new_params, 1, rng);
        return Ok(Some(transition(frame, target, ctx.current_year, FrameKind::Woody(new_woody))));
    }

    Ok(None)
}

/// Spruce: post-fire transition only. Year-over-year aging/fire-probability lookups
/// happen in the fire engine and grid driver; `success` only reacts to last year's burn.
fn spruce_success(frame: &mut Frame, registry: &SpeciesRegistry, ctx: &SuccessionContext) -> SimResult<Option<Frame>> {
    if frame.year_of_last_burn != ctx.current_year - 1 {
        return Ok(None);
    }
    let suitable_for_deciduous = matches!(
        frame.burn_severity,
        crate::frame::BurnSeverity::Moderate | crate::frame::BurnSeverity::HighLss | crate::frame::BurnSeverity::HighHss
    ) && frame.site >= 0.3;
    let target = if suitable_for_deciduous {
        VegType::Deciduous
    } else if frame.species_sub_canopy.is_tundra_variant() {
        frame.species_sub_canopy
    } else {
        frame.veg_type
    };
    if target == frame.veg_type {
        return Ok(None);
    }
    let kind = kind_for(target, registry, ctx)?;
    Ok(Some(transition(frame, target, ctx.current_year, kind)))
}

fn deciduous_success(frame: &mut Frame, registry: &SpeciesRegistry, ctx: &SuccessionContext) -> SimResult<Option<Frame>> {
    if frame.year_of_last_burn == ctx.current_year - 1 {
        // a burned deciduous stand re-sprouts deciduous rather than changing type; the
        // driver resets age to 0 on this `None` return since yearOfLastBurn == currentYear - 1
        return Ok(None);
    }
    if frame.age < ctx.decid_to_spruce_window {
        return Ok(None);
    }
    let target = if frame.species_sub_canopy.is_spruce() {
        frame.species_sub_canopy
    } else {
        VegType::WhiteSpruce
    };
    let kind = kind_for(target, registry, ctx)?;
    Ok(Some(transition(frame, target, ctx.current_year, kind)))
}

fn kind_for(target: VegType, registry: &SpeciesRegistry, ctx: &SuccessionContext) -> SimResult<FrameKind> {
    Ok(if target.is_woody() {
        let _ = registry.get(target)?;
        FrameKind::Woody(WoodyState {
            basal_area: 0.0,
            year_of_establishment: ctx.current_year,
            degrees: -1.0,
        })
    } else {
        match target {
            VegType::Deciduous => FrameKind::Deciduous,
            VegType::Grassland => FrameKind::Grassland,
            VegType::BarrenLichenMoss => FrameKind::BarrenLichenMoss,
            VegType::TemperateRainforest => FrameKind::TemperateRainforest,
            VegType::NoVeg => FrameKind::NoVeg,
            _ => unreachable!("woody types handled above"),
        }
    })
}

/// Build the replacement frame for a type transition, carrying forward the attributes
/// the original model copy-constructs from the prior frame (site, topography,
/// sensitivity, fire history) while resetting establishment bookkeeping.
fn transition(frame: &Frame, target: VegType, current_year: i64, kind: FrameKind) -> Frame {
    Frame {
        veg_type: target,
        age: 0,
        year_of_last_burn: frame.year_of_last_burn,
        burn_severity: frame.burn_severity,
        year_established: current_year,
        year_frame_established: current_year,
        site: frame.site,
        is_topo_complex: frame.is_topo_complex,
        fire_ignition_factor: frame.fire_ignition_factor,
        fire_sensitivity: frame.fire_sensitivity,
        species_sub_canopy: target,
        fire_scar_id: frame.fire_scar_id,
        last_burn_was_origin: false,
        kind,
    }
}
