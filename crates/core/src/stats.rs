//! Per-year statistical collectors: pure accumulation (testable without I/O) split from
//! the flush-to-writer step, mirroring `StatArray`/`StatFile`'s
//! `gatherStats`/`writeStats` split in the original source. Also holds the config-driven
//! habitat definitions and map-write requests `setupHabitatStats`/`setupMapStats` build
//! once at replicate start.

use crate::config::ConfigSource;
use crate::error::{SimError, SimResult};
use crate::fire::FireYearStats;
use crate::frame::VegType;
use crate::grid::Grid;
use crate::raster::MapType;

/// A habitat definition: tallies cells whose type is in `veg_types` and whose age falls
/// in `[min_age, max_age]`, the shape `SHabitatStat` reads out of `HabitatStats.*` config.
#[derive(Debug, Clone, PartialEq)]
pub struct HabitatDefinition {
    pub name: String,
    pub veg_types: Vec<VegType>,
    pub min_age: i64,
    pub max_age: i64,
}

impl HabitatDefinition {
    fn matches(&self, veg_type: VegType, age: i64) -> bool {
        self.veg_types.contains(&veg_type) && age >= self.min_age && age <= self.max_age
    }
}

/// Parse `HabitatStats.Count` plus `HabitatStats.{i}.{VegTypes,MinAge,MaxAge,Name}`,
/// one entry per configured habitat.
pub fn load_habitat_definitions(config: &dyn ConfigSource) -> SimResult<Vec<HabitatDefinition>> {
    if !config.has_key("HabitatStats.Count") {
        return Ok(Vec::new());
    }
    let count = config.get_int("HabitatStats.Count")?;
    let mut habitats = Vec::with_capacity(count.max(0) as usize);
    for i in 0..count {
        let prefix = format!("HabitatStats.{i}");
        let names = config.get_string_array(&format!("{prefix}.VegTypes"))?;
        let veg_types = names
            .iter()
            .map(|name| {
                VegType::from_config_prefix(name)
                    .ok_or_else(|| SimError::Config(format!("{prefix}.VegTypes: unknown vegetation type {name:?}")))
            })
            .collect::<SimResult<Vec<_>>>()?;
        let min_age = config.get_int(&format!("{prefix}.MinAge"))?;
        let max_age = config.get_int(&format!("{prefix}.MaxAge"))?;
        let name = config.get_string(&format!("{prefix}.Name")).unwrap_or_else(|_| format!("habitat{i}"));
        habitats.push(HabitatDefinition {
            name,
            veg_types,
            min_age,
            max_age,
        });
    }
    Ok(habitats)
}

/// One year's per-habitat cell tally, aligned by position with the `habitats` slice
/// passed to [`StatCollector::gather`].
#[derive(Debug, Clone, Default)]
pub struct HabitatStats {
    pub counts: Vec<(String, u64)>,
}

impl HabitatStats {
    fn gather(grid: &Grid, habitats: &[HabitatDefinition]) -> Self {
        let mut counts: Vec<(String, u64)> = habitats.iter().map(|h| (h.name.clone(), 0)).collect();
        for row in 0..grid.rows {
            for col in 0..grid.cols {
                let frame = grid.get(row, col);
                for (habitat, (_, count)) in habitats.iter().zip(counts.iter_mut()) {
                    if habitat.matches(frame.veg_type, frame.age) {
                        *count += 1;
                    }
                }
            }
        }
        Self { counts }
    }
}

/// All map types a `Flags` bitmask can select, in bit order 0..9.
const ALL_MAP_TYPES: [MapType; 10] = [
    MapType::Vegetation,
    MapType::Age,
    MapType::FireAge,
    MapType::FireScar,
    MapType::BurnSeverity,
    MapType::BurnSeverityHistory,
    MapType::Subcanopy,
    MapType::SiteVariable,
    MapType::DecidSpeciesTrajectory,
    MapType::TundraBasalArea,
];

fn map_type_bit(map_type: MapType) -> u32 {
    1 << ALL_MAP_TYPES.iter().position(|&t| t == map_type).expect("exhaustive MapType list")
}

fn map_type_suffix(map_type: MapType) -> &'static str {
    match map_type {
        MapType::Vegetation => "veg",
        MapType::Age => "age",
        MapType::FireAge => "fireage",
        MapType::FireScar => "firescar",
        MapType::BurnSeverity => "burnseverity",
        MapType::BurnSeverityHistory => "burnseverityhistory",
        MapType::Subcanopy => "subcanopy",
        MapType::SiteVariable => "site",
        MapType::DecidSpeciesTrajectory => "decidtrajectory",
        MapType::TundraBasalArea => "basalarea",
    }
}

/// `true` iff `counter` is due against a `(start, freq)` schedule: `counter >= start` and
/// `(counter - start) mod freq == 0`. A non-positive frequency only ever fires at exactly
/// `start`, since modulo against a zero or negative period is otherwise undefined.
fn due(counter: i64, start: i64, freq: i64) -> bool {
    if counter < start {
        return false;
    }
    if freq <= 0 {
        return counter == start;
    }
    (counter - start) % freq == 0
}

/// One scheduled map-write request, matching `SMapStat`'s `{File, Code, Flags, repStart,
/// RepFreq, yearStart, YearFreq}` shape: a map is written iff `(rep - repStart) mod
/// repFreq == 0` and similarly for year, for each map type the `flags` bitmask selects.
#[derive(Debug, Clone, PartialEq)]
pub struct MapStats {
    pub file_pattern: String,
    /// Opaque run tag carried through from config; this crate never interprets it beyond
    /// passing it along, the way `SMapStat::Code` is stamped but unused by `writeMaps`.
    pub code: String,
    pub flags: u32,
    pub rep_start: i64,
    pub rep_freq: i64,
    pub year_start: i64,
    pub year_freq: i64,
}

impl MapStats {
    pub fn should_write(&self, replicate: i64, year: i64) -> bool {
        due(replicate, self.rep_start, self.rep_freq) && due(year, self.year_start, self.year_freq)
    }

    /// The map types this request's `flags` bitmask selects, in `ALL_MAP_TYPES` order.
    pub fn active_map_types(&self) -> Vec<MapType> {
        ALL_MAP_TYPES.iter().copied().filter(|&t| self.flags & map_type_bit(t) != 0).collect()
    }

    /// Resolve `{rep}`/`{year}` placeholders in `file_pattern` into one map type's output
    /// name.
    pub fn resolve_name(&self, map_type: MapType, replicate: i64, year: i64) -> String {
        let base = self
            .file_pattern
            .replace("{rep}", &replicate.to_string())
            .replace("{year}", &year.to_string());
        format!("{base}_{}", map_type_suffix(map_type))
    }
}

/// Parse `MapStats.Count` plus `MapStats.{i}.{FilePattern,Code,Flags,RepStart,RepFreq,
/// YearStart,YearFreq}`, one entry per configured write request.
pub fn load_map_stats_requests(config: &dyn ConfigSource) -> SimResult<Vec<MapStats>> {
    if !config.has_key("MapStats.Count") {
        return Ok(Vec::new());
    }
    let count = config.get_int("MapStats.Count")?;
    let mut requests = Vec::with_capacity(count.max(0) as usize);
    for i in 0..count {
        let prefix = format!("MapStats.{i}");
        requests.push(MapStats {
            file_pattern: config.get_string(&format!("{prefix}.FilePattern"))?,
            code: config.get_string(&format!("{prefix}.Code")).unwrap_or_default(),
            flags: config.get_int(&format!("{prefix}.Flags"))? as u32,
            rep_start: config.get_int(&format!("{prefix}.RepStart"))?,
            rep_freq: config.get_int(&format!("{prefix}.RepFreq"))?,
            year_start: config.get_int(&format!("{prefix}.YearStart"))?,
            year_freq: config.get_int(&format!("{prefix}.YearFreq"))?,
        });
    }
    Ok(requests)
}

/// One year's accumulated statistics, ready to flush.
#[derive(Debug, Clone, Default)]
pub struct YearStats {
    pub year: i64,
    pub habitat_stats: HabitatStats,
    pub fire_size_stats: FireYearStats,
}

/// Destination for a flushed year of stats. The default no-op sink is used when the
/// harness isn't configured to persist stats (e.g. in-process tests).
pub trait StatSink {
    fn write_year(&mut self, replicate: u64, stats: &YearStats) -> SimResult<()>;
}

/// A sink that records every flushed year in memory, for tests and small runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatSink {
    pub years: Vec<(u64, YearStats)>,
}

impl StatSink for MemoryStatSink {
    fn write_year(&mut self, replicate: u64, stats: &YearStats) -> SimResult<()> {
        self.years.push((replicate, stats.clone()));
        Ok(())
    }
}

/// Accumulates one year's worth of statistics from the post-succession grid state and the
/// year's fire partition, then hands the result to a [`StatSink`] at year end.
#[derive(Debug, Default)]
pub struct StatCollector;

impl StatCollector {
    pub fn new() -> Self {
        Self
    }

    /// Pure accumulation step: reads `grid`, `habitats`, and `fire_stats`, produces one
    /// [`YearStats`]. Never touches I/O.
    pub fn gather(&self, grid: &Grid, current_year: i64, fire_stats: FireYearStats, habitats: &[HabitatDefinition]) -> YearStats {
        YearStats {
            year: current_year,
            habitat_stats: HabitatStats::gather(grid, habitats),
            fire_size_stats: fire_stats,
        }
    }

    /// Flush a gathered year to `sink`. Kept as a separate call (rather than folded into
    /// `gather`) so accumulation stays testable without a writer in hand.
    pub fn write_year(&self, sink: &mut dyn StatSink, replicate: u64, stats: &YearStats) -> SimResult<()> {
        sink.write_year(replicate, stats)
    }
}
