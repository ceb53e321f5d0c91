//! The fire engine: yearly ignition, 8-connected BFS spread, suppression, severity
//! accounting, and the suppression-class burn partition. One [`FireEngine::run`] call
//! realizes all five phases spec.md lays out for a single year, mutating `grid` in place
//! and returning the year's fire partition.

use std::collections::VecDeque;

use crate::config::ConfigSource;
use crate::error::SimResult;
use crate::frame::{BurnSeverity, VegType};
use crate::grid::Grid;
use crate::rng::ReplicateRng;
use crate::species::SpeciesRegistry;
use crate::suppression::SuppressionPolicy;

/// Hook matching `CustomLandscape::getCustomFireSpreadMultiplier`: identity by default,
/// swappable without touching the spread loop.
pub type CustomSpreadMultiplier = fn(row: usize, col: usize, total_burned_this_year: f64, fire_id: u32) -> f64;

fn identity_multiplier(_row: usize, _col: usize, _total_burned_this_year: f64, _fire_id: u32) -> f64 {
    1.0
}

/// Per-fire tally, matching spec.md's `FireSizeStats` tuple shape.
#[derive(Debug, Clone)]
pub struct FireRecord {
    pub fire_id: u32,
    pub ignition_cell: (usize, usize),
    pub cell_count: u32,
    pub low_lss: u32,
    pub moderate: u32,
    pub high_lss: u32,
    pub high_hss: u32,
}

impl FireRecord {
    fn tally(&mut self, severity: BurnSeverity) {
        match severity {
            BurnSeverity::LowLss => self.low_lss += 1,
            BurnSeverity::Moderate => self.moderate += 1,
            BurnSeverity::HighLss => self.high_lss += 1,
            BurnSeverity::HighHss => self.high_hss += 1,
            BurnSeverity::None => {}
        }
    }
}

/// The full fire partition for one year, consumed by the stat collectors.
#[derive(Debug, Clone, Default)]
pub struct FireYearStats {
    pub fires: Vec<FireRecord>,
    pub total_ignitions: u32,
    pub total_burned: u32,
    /// Phase-5 "partitioned stats": one burned-cell count per suppression class 0..6,
    /// bumped at the moment each cell burns using its class at that instant.
    pub burn_partition_by_suppclass: [u32; 6],
}

/// Terrain-driven spread multiplier: complex topography carries more wind exposure and
/// burns a little more readily. No source regression was recoverable for this factor; see
/// DESIGN.md for the chosen constant.
fn topo_factor(is_topo_complex: bool) -> f64 {
    if is_topo_complex {
        1.25
    } else {
        1.0
    }
}

/// Draw a burn severity for a freshly-burned cell, biased toward higher severity for
/// older pre-fire stands. No exact regression was recoverable for this step either; see
/// DESIGN.md.
fn draw_severity(pre_age: i64, draw: f64) -> BurnSeverity {
    let age_factor = (pre_age as f64 / 50.0).min(1.0);
    let low_cut = 0.5 - 0.3 * age_factor;
    let moderate_cut = low_cut + 0.25;
    let high_lss_cut = moderate_cut + 0.15;
    if draw < low_cut {
        BurnSeverity::LowLss
    } else if draw < moderate_cut {
        BurnSeverity::Moderate
    } else if draw < high_lss_cut {
        BurnSeverity::HighLss
    } else {
        BurnSeverity::HighHss
    }
}

/// Runs the per-year ignition/spread/suppression/severity pipeline.
pub struct FireEngine {
    pub custom_spread_multiplier: CustomSpreadMultiplier,
}

impl Default for FireEngine {
    fn default() -> Self {
        Self {
            custom_spread_multiplier: identity_multiplier,
        }
    }
}

impl FireEngine {
    pub fn load(_config: &dyn ConfigSource) -> Self {
        Self::default()
    }

    /// Run one year's fire phase over `grid`, consuming RNG draws in row-major ignition
    /// order, then BFS spread order within each fire.
    pub fn run(
        &self,
        grid: &mut Grid,
        registry: &SpeciesRegistry,
        current_year: i64,
        suppression: &SuppressionPolicy,
        rng: &mut ReplicateRng,
    ) -> SimResult<FireYearStats> {
        let mut stats = FireYearStats::default();
        let mut fire_id_counter: u32 = 0;
        let mut year_burned = 0.0f64;
        let mut year_ignitions: u32 = 0;

        for row in 0..grid.rows {
            for col in 0..grid.cols {
                let frame = grid.get(row, col);
                if !frame.veg_type.is_flammable() || frame.year_of_last_burn == current_year {
                    continue;
                }
                let p = frame.fire_probability(registry)?;
                if rng.next_uniform() >= p {
                    continue;
                }

                fire_id_counter += 1;
                year_ignitions += 1;
                let fire_id = fire_id_counter;

                let origin_severity = draw_severity(frame.age, rng.next_uniform());
                let origin_class = grid.suppression_class(row, col);
                self.mark_burned(grid, row, col, current_year, fire_id, true, origin_severity);
                stats.burn_partition_by_suppclass[origin_class as usize] += 1;
                year_burned += 1.0;
                let mut record = FireRecord {
                    fire_id,
                    ignition_cell: (row, col),
                    cell_count: 1,
                    low_lss: 0,
                    moderate: 0,
                    high_lss: 0,
                    high_hss: 0,
                };
                record.tally(origin_severity);

                let mut frontier = VecDeque::new();
                frontier.push_back((row, col));
                while let Some((r, c)) = frontier.pop_front() {
                    for (nr, nc) in grid.compass_neighbors(r, c) {
                        let neighbor = grid.get(nr, nc);
                        if neighbor.veg_type == VegType::NoVeg || neighbor.year_of_last_burn == current_year {
                            continue;
                        }
                        let class = grid.suppression_class(nr, nc);
                        let suppression_mult = suppression.multiplier_for(class, year_burned, year_ignitions);
                        let custom_mult = (self.custom_spread_multiplier)(nr, nc, year_burned, fire_id);
                        let spread_prob = neighbor.base_flammability(registry)?
                            * neighbor.fire_sensitivity
                            * topo_factor(neighbor.is_topo_complex)
                            * suppression_mult
                            * custom_mult;
                        if rng.next_uniform() < spread_prob {
                            let pre_age = neighbor.age;
                            let severity = draw_severity(pre_age, rng.next_uniform());
                            self.mark_burned(grid, nr, nc, current_year, fire_id, false, severity);
                            stats.burn_partition_by_suppclass[class as usize] += 1;
                            year_burned += 1.0;
                            record.cell_count += 1;
                            record.tally(severity);
                            frontier.push_back((nr, nc));
                        }
                    }
                }
                stats.fires.push(record);
            }
        }

        stats.total_ignitions = year_ignitions;
        stats.total_burned = year_burned as u32;
        Ok(stats)
    }

    fn mark_burned(&self, grid: &mut Grid, row: usize, col: usize, current_year: i64, fire_id: u32, is_origin: bool, severity: BurnSeverity) {
        let frame = grid.get_mut(row, col);
        frame.year_of_last_burn = current_year;
        frame.burn_severity = severity;
        frame.fire_scar_id = fire_id;
        frame.last_burn_was_origin = is_origin;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigValue, TextConfig};
    use crate::frame::VegType;
    use crate::grid::{Grid, GridInputs};
    use crate::raster::RasterBand;

    fn black_spruce_config() -> TextConfig {
        let mut cfg = TextConfig::default();
        for (k, v) in [
            ("BSpruce.FireProb", ConfigValue::Float(1.0)),
            ("BSpruce.BaseFlammability", ConfigValue::FloatArray(vec![1.0, 0.0])),
            ("BSpruce.SeedRange", ConfigValue::Float(1.0)),
            ("BSpruce.SeedSource", ConfigValue::FloatArray(vec![1.0, 1.0])),
            ("BSpruce.Seed.BasalArea", ConfigValue::Float(1.0)),
            ("BSpruce.Seedling", ConfigValue::Float(1.0)),
            ("BSpruce.SeedlingBA", ConfigValue::Float(0.01)),
            ("BSpruce.History", ConfigValue::Int(15)),
            ("BSpruce.SeedEstParms", ConfigValue::FloatArray(vec![5.0, 1.0])),
            ("BSpruce.MeanGrowth", ConfigValue::Float(0.1)),
            ("BSpruce.ClimGrowth", ConfigValue::FloatArray(vec![0.0, 0.0, 0.0])),
            ("BSpruce.CalFactor", ConfigValue::FloatArray(vec![1.0, 1.0])),
            ("BSpruce.Spruce.BasalArea", ConfigValue::Float(20.0)),
            ("BSpruce.StartAge.Type", ConfigValue::Str("Constant".to_string())),
            ("BSpruce.StartAge", ConfigValue::FloatArray(vec![5.0])),
        ] {
            cfg.set(k, v);
        }
        cfg
    }

    fn build_3x3_spruce_grid() -> (Grid, SpeciesRegistry) {
        let cfg = black_spruce_config();
        let registry = SpeciesRegistry::load(&cfg, &[VegType::BlackSpruce]).unwrap();
        let veg = RasterBand {
            rows: 3,
            cols: 3,
            nodata: 255,
            data: vec![1; 9],
            georef: Default::default(),
        };
        let age = RasterBand {
            rows: 3,
            cols: 3,
            nodata: crate::raster::NODATA_INT32,
            data: vec![10; 9],
            georef: Default::default(),
        };
        let topo = RasterBand::new(3, 3, 0u8);
        let site = RasterBand::new(3, 3, 0.0f32);
        let mut tree_density = RasterBand::new(3, 3, 0i32);
        tree_density.data = vec![1; 9];
        let ignition_factor = RasterBand::new(3, 3, 1.0f32);
        let sensitivity = {
            let mut b = RasterBand::new(3, 3, 0.0f32);
            b.data = vec![1.0; 9];
            b
        };
        let inputs = GridInputs {
            vegetation: &veg,
            age: &age,
            topo_complex: &topo,
            site: &site,
            tree_density: &tree_density,
            ignition_factor: &ignition_factor,
            sensitivity: &sensitivity,
            veg_code_to_type: vec![(1, VegType::BlackSpruce)],
        };
        let mut rng = ReplicateRng::for_replicate(1, 0);
        let grid = Grid::from_rasters(&inputs, &registry, 2000, &mut rng).unwrap();
        (grid, registry)
    }

    #[test]
    fn certain_ignition_and_spread_burns_whole_grid_in_one_year() {
        let (mut grid, registry) = build_3x3_spruce_grid();
        let engine = FireEngine::default();
        let suppression = SuppressionPolicy::disabled();
        let mut rng = ReplicateRng::for_replicate(5, 0);
        let stats = engine.run(&mut grid, &registry, 2010, &suppression, &mut rng).unwrap();

        for row in 0..3 {
            for col in 0..3 {
                assert_eq!(grid.get(row, col).year_of_last_burn, 2010);
            }
        }
        assert_eq!(stats.total_burned, 9);
        assert_eq!(grid.get(0, 0).fire_scar_id, 1);
    }

    /// A forced single ignition at column 0 (via a per-cell ignition-factor raster, the
    /// same mechanism `CustomLandscape`'s ignition-factor layer provides) spreading along
    /// a row whose suppression class flips from unsuppressed to fully suppressed partway
    /// across: the burn stops exactly at the boundary.
    #[test]
    fn suppression_class_boundary_halts_spread_on_a_row() {
        let cfg = black_spruce_config();
        let registry = SpeciesRegistry::load(&cfg, &[VegType::BlackSpruce]).unwrap();
        let cols = 10;
        let veg = RasterBand {
            rows: 1,
            cols,
            nodata: 255,
            data: vec![1; cols],
            georef: Default::default(),
        };
        let age = RasterBand {
            rows: 1,
            cols,
            nodata: crate::raster::NODATA_INT32,
            data: vec![10; cols],
            georef: Default::default(),
        };
        let topo = RasterBand::new(1, cols, 0u8);
        let site = RasterBand::new(1, cols, 0.0f32);
        let mut tree_density = RasterBand::new(1, cols, 0i32);
        tree_density.data = vec![1; cols];
        let ignition_factor = {
            let mut b = RasterBand::new(1, cols, 0.0f32);
            b.set(0, 0, 1.0);
            b
        };
        let sensitivity = {
            let mut b = RasterBand::new(1, cols, 0.0f32);
            b.data = vec![1.0; cols];
            b
        };
        let inputs = GridInputs {
            vegetation: &veg,
            age: &age,
            topo_complex: &topo,
            site: &site,
            tree_density: &tree_density,
            ignition_factor: &ignition_factor,
            sensitivity: &sensitivity,
            veg_code_to_type: vec![(1, VegType::BlackSpruce)],
        };
        let mut rng = ReplicateRng::for_replicate(1, 0);
        let mut grid = Grid::from_rasters(&inputs, &registry, 2000, &mut rng).unwrap();

        // Classes {1.0, 0.0, ...}: cols 0-3 at class 0 (unsuppressed), cols 4-9 at class 1
        // (fully suppressed) — the policy's per-class multiplier, exercised at a clean
        // binary boundary so the outcome doesn't depend on the RNG draw sequence.
        for col in 4..cols {
            grid.set_suppression_class(0, col, 1);
        }
        let mut supp_cfg = TextConfig::default();
        supp_cfg.set("Suppression.Years", ConfigValue::FloatArray(vec![0.0]));
        supp_cfg.set("Suppression.0.Classes", ConfigValue::FloatArray(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0]));
        let mut policy = SuppressionPolicy::load(&supp_cfg, |_| unreachable!("no map configured")).unwrap();
        policy.apply_transition_if_due(2010, &mut grid).unwrap();

        let engine = FireEngine::default();
        let stats = engine.run(&mut grid, &registry, 2010, &policy, &mut rng).unwrap();
        assert_eq!(stats.total_burned, 4);
        assert_eq!(stats.total_ignitions, 1);
        assert_eq!(stats.burn_partition_by_suppclass[0], 4);
        assert_eq!(stats.burn_partition_by_suppclass[1], 0);
    }
}
