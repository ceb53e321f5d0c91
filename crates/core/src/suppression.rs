//! Fire-suppression policy: an ordered schedule of effort-class transitions applied
//! across a run, the way `CustomFresco` reloads a new suppression-class map and
//! thresholds at configured calendar years.
//!
//! A policy has at most one transition per year. Absent any transitions, suppression is
//! disabled (no multiplier, no size/ignition caps) from year one onward.

use crate::config::ConfigSource;
use crate::error::SimResult;
use crate::grid::Grid;
use crate::raster::RasterBand;

/// One scheduled change to the suppression regime.
#[derive(Debug, Clone)]
pub struct SuppressionTransition {
    pub year: i64,
    /// A replacement per-cell suppression-class raster, when the transition reloads one.
    pub new_map: Option<RasterBand<u8>>,
    /// Per-class spread multiplier, indexed by suppression class 0..6.
    pub classes: [f64; 6],
    /// Once the running fire-size total for the year exceeds this, suppression trips to
    /// full effort (multiplier 1.0 is disabled; see [`SuppressionPolicy::multiplier_for`]).
    pub threshold_fire_size: f64,
    /// Once the running ignition count for the year exceeds this, suppression trips.
    pub threshold_ignitions: u32,
}

/// The active suppression regime plus the year-ordered schedule of future transitions.
#[derive(Debug, Clone)]
pub struct SuppressionPolicy {
    transitions: Vec<SuppressionTransition>,
    next_index: usize,
    active_classes: [f64; 6],
    active_threshold_fire_size: f64,
    active_threshold_ignitions: u32,
}

impl SuppressionPolicy {
    /// No scheduled transitions: suppression never engages.
    pub fn disabled() -> Self {
        Self {
            transitions: Vec::new(),
            next_index: 0,
            active_classes: [1.0; 6],
            active_threshold_fire_size: f64::INFINITY,
            active_threshold_ignitions: u32::MAX,
        }
    }

    /// Build a policy from a config-declared schedule, e.g.
    /// `Suppression.Years = [1995, 2010]` paired with per-year class/threshold keys.
    /// Transitions are sorted ascending by year; config order doesn't matter.
    pub fn load(config: &dyn ConfigSource, grid_loader: impl Fn(&str) -> SimResult<RasterBand<u8>>) -> SimResult<Self> {
        if !config.has_key("Suppression.Years") {
            return Ok(Self::disabled());
        }
        let years = config.get_float_array("Suppression.Years")?;
        let mut transitions = Vec::new();
        for (i, year) in years.into_iter().enumerate() {
            let prefix = format!("Suppression.{i}");
            let classes_vec = config.get_float_array_exact(&format!("{prefix}.Classes"), 6)?;
            let mut classes = [1.0; 6];
            classes.copy_from_slice(&classes_vec);
            let threshold_fire_size = config.get_float_or(&format!("{prefix}.ThresholdFireSize"), f64::INFINITY)?;
            let threshold_ignitions = config.get_float_or(&format!("{prefix}.ThresholdIgnitions"), f64::from(u32::MAX))? as u32;
            let map_name = config.get_string(&format!("{prefix}.Map")).ok();
            let new_map = match map_name {
                Some(name) => Some(grid_loader(&name)?),
                None => None,
            };
            transitions.push(SuppressionTransition {
                year: year as i64,
                new_map,
                classes,
                threshold_fire_size,
                threshold_ignitions,
            });
        }
        transitions.sort_by_key(|t| t.year);
        Ok(Self {
            transitions,
            next_index: 0,
            active_classes: [1.0; 6],
            active_threshold_fire_size: f64::INFINITY,
            active_threshold_ignitions: u32::MAX,
        })
    }

    /// Apply the transition scheduled for `year`, if any, reloading the grid's
    /// suppression-class layer when the transition carries a new map. At most one
    /// transition fires per year; years are consumed in ascending order.
    pub fn apply_transition_if_due(&mut self, year: i64, grid: &mut Grid) -> SimResult<()> {
        while let Some(t) = self.transitions.get(self.next_index) {
            if t.year > year {
                break;
            }
            if let Some(map) = &t.new_map {
                grid.reload_suppression_map(map)?;
            }
            self.active_classes = t.classes;
            self.active_threshold_fire_size = t.threshold_fire_size;
            self.active_threshold_ignitions = t.threshold_ignitions;
            self.next_index += 1;
        }
        Ok(())
    }

    /// The spread multiplier for a cell's suppression class, given this year's running
    /// fire-size and ignition tallies. Once either threshold is exceeded suppression
    /// trips off for the remainder of the year: the multiplier becomes 1.0 (unsuppressed)
    /// regardless of class.
    pub fn multiplier_for(&self, class: u8, year_fire_size_so_far: f64, year_ignitions_so_far: u32) -> f64 {
        if year_fire_size_so_far > self.active_threshold_fire_size || year_ignitions_so_far > self.active_threshold_ignitions {
            return 1.0;
        }
        self.active_classes.get(class as usize).copied().unwrap_or(1.0)
    }
}
