//! The step orchestrator: the per-year phase order and the replicate loop.
//!
//! A single replicate is strictly serial — the RNG stream is consumed in a fixed
//! row-major, phase-deterministic order so a replicate is reproducible from
//! `(base_seed, replicate_index)`. Parallelism, via `rayon`, only ever spans independent
//! replicates.

use rayon::prelude::*;

use crate::error::SimResult;
use crate::fire::FireEngine;
use crate::frame::VegType;
use crate::frame::succession::SuccessionContext;
use crate::grid::Grid;
use crate::raster::RasterSink;
use crate::rng::ReplicateRng;
use crate::species::SpeciesRegistry;
use crate::stats::{HabitatDefinition, MapStats, StatCollector, YearStats};
use crate::suppression::SuppressionPolicy;

/// Per-replicate knobs that don't vary year to year.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuccessionParams {
    pub climate_coupling_enabled: bool,
    pub climate_temp: f64,
    pub climate_precip: f64,
}

/// One replicate's final grid state plus its full year-by-year stat history.
#[derive(Debug)]
pub struct ReplicateOutput {
    pub grid: Grid,
    pub years: Vec<YearStats>,
}

/// Drives the replicate loop and the per-year phase order.
pub struct Simulation {
    pub registry: SpeciesRegistry,
    pub fire_engine: FireEngine,
    pub base_seed: u64,
    pub first_year: i64,
    pub num_years: i64,
    pub habitats: Vec<HabitatDefinition>,
}

impl Simulation {
    pub fn new(
        registry: SpeciesRegistry,
        fire_engine: FireEngine,
        base_seed: u64,
        first_year: i64,
        num_years: i64,
        habitats: Vec<HabitatDefinition>,
    ) -> Self {
        Self {
            registry,
            fire_engine,
            base_seed,
            first_year,
            num_years,
            habitats,
        }
    }

    /// `Decid.History`-keyed window, looked up once per replicate rather than once per
    /// cell per year. Falls back to "never" when `Deciduous` isn't a registered type.
    fn decid_to_spruce_window(&self) -> i64 {
        self.registry.get(VegType::Deciduous).map(|p| p.history).unwrap_or(i64::MAX)
    }

    /// Run one replicate start to finish: `repStart` (seed the RNG), then for each year,
    /// `yearStart` → suppression/vegetation transitions → fire → succession → stats →
    /// map writes. Each of `map_requests` due for `(replicate_index, current_year)` is
    /// written to `map_sink` right after that year's stats are gathered.
    pub fn run_replicate(
        &self,
        replicate_index: u64,
        mut grid: Grid,
        mut suppression: SuppressionPolicy,
        params: SuccessionParams,
        map_requests: &[MapStats],
        map_sink: &mut dyn RasterSink,
    ) -> SimResult<ReplicateOutput> {
        let mut rng = ReplicateRng::for_replicate(self.base_seed, replicate_index);
        let collector = StatCollector::new();
        let decid_to_spruce_window = self.decid_to_spruce_window();
        let mut years = Vec::with_capacity(self.num_years.max(0) as usize);

        tracing::info!(replicate = replicate_index, first_year = self.first_year, num_years = self.num_years, "replicate start");

        for offset in 0..self.num_years {
            let current_year = self.first_year + offset;

            suppression.apply_transition_if_due(current_year, &mut grid)?;

            let fire_stats = self.fire_engine.run(&mut grid, &self.registry, current_year, &suppression, &mut rng)?;
            tracing::debug!(
                replicate = replicate_index,
                year = current_year,
                ignitions = fire_stats.total_ignitions,
                burned = fire_stats.total_burned,
                "fire phase complete"
            );

            let ctx = SuccessionContext {
                current_year,
                climate_coupling_enabled: params.climate_coupling_enabled,
                climate_temp: params.climate_temp,
                climate_precip: params.climate_precip,
                decid_to_spruce_window,
            };
            self.run_succession(&mut grid, &ctx, &mut rng)?;

            let year_stats = collector.gather(&grid, current_year, fire_stats, &self.habitats);

            for request in map_requests {
                if !request.should_write(replicate_index as i64, current_year) {
                    continue;
                }
                for map_type in request.active_map_types() {
                    let name = request.resolve_name(map_type, replicate_index as i64, current_year);
                    grid.write_map(map_type, map_sink, &name)?;
                }
            }

            years.push(year_stats);
        }

        tracing::info!(replicate = replicate_index, "replicate complete");
        Ok(ReplicateOutput { grid, years })
    }

    /// Runs `success` over every cell in row-major order, replacing or aging each frame
    /// in place before moving to the next cell — later cells in the same year see earlier
    /// cells' post-succession state, matching the grid's in-year-visible replacement rule.
    ///
    /// A cell burned last year and still of the same type this year (no `*_success` rule
    /// fired a type change) has its age reset to 0 before the yearly increment, so it
    /// reads `age == currentYear - yearOfLastBurn` from this year onward, matching the
    /// post-fire age-reset invariant. A type change resets age itself (see
    /// `succession::transition`), so this only fires on the `None` branch.
    fn run_succession(&self, grid: &mut Grid, ctx: &SuccessionContext, rng: &mut ReplicateRng) -> SimResult<()> {
        for row in 0..grid.rows {
            for col in 0..grid.cols {
                let mut frame = grid.get(row, col).clone();
                if frame.veg_type == VegType::NoVeg {
                    continue;
                }
                match frame.success(grid, row, col, &self.registry, ctx, rng)? {
                    Some(replacement) => grid.replace(row, col, replacement),
                    None => {
                        if frame.year_of_last_burn == ctx.current_year - 1 {
                            frame.age = 0;
                        }
                        frame.age += 1;
                        grid.replace(row, col, frame);
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs `num_reps` independent replicates. Each gets its own `Grid` (from
    /// `grid_factory`), `SuppressionPolicy` (from `suppression_factory`), and map-write
    /// sink (from `map_sink_factory`, since a single `&mut dyn RasterSink` can't be shared
    /// safely across `rayon`'s parallel closures); a single reduction over the returned
    /// `Vec` is the only cross-replicate interaction, the boundary this crate's `rayon`
    /// dependency is scoped to.
    pub fn run_replicates<S: RasterSink + Send>(
        &self,
        num_reps: u64,
        grid_factory: impl Fn(u64) -> SimResult<Grid> + Sync,
        suppression_factory: impl Fn() -> SuppressionPolicy + Sync,
        params: SuccessionParams,
        map_requests: &[MapStats],
        map_sink_factory: impl Fn(u64) -> S + Sync,
    ) -> Vec<SimResult<ReplicateOutput>> {
        (0..num_reps)
            .into_par_iter()
            .map(|rep| {
                let grid = grid_factory(rep)?;
                let suppression = suppression_factory();
                let mut sink = map_sink_factory(rep);
                self.run_replicate(rep, grid, suppression, params, map_requests, &mut sink)
            })
            .collect()
    }
}
