//! Landscape succession and wildfire simulation core.
//!
//! A spatially explicit, raster-based stochastic simulator of boreal/tundra landscape
//! dynamics: vegetation succession, wildfire ignition and spread, fire suppression
//! policy, and multi-decade replicate runs producing map and statistical outputs.

pub mod config;
pub mod error;
pub mod fire;
pub mod frame;
pub mod grid;
pub mod orchestrator;
pub mod raster;
pub mod rng;
pub mod species;
pub mod stats;
pub mod suppression;

pub use config::{ConfigSource, ConfigValue, TextConfig};
pub use error::{SimError, SimResult};
pub use fire::FireEngine;
pub use frame::{BurnSeverity, Frame, FrameKind, VegType};
pub use grid::{Grid, GridInputs};
pub use orchestrator::{ReplicateOutput, Simulation, SuccessionParams};
pub use raster::{FlatRaster, GeoReference, MapType, MemoryRaster, RasterBand, RasterSink, RasterSource};
pub use rng::ReplicateRng;
pub use species::SpeciesRegistry;
pub use stats::{
    HabitatDefinition, HabitatStats, MapStats, MemoryStatSink, StatCollector, StatSink, YearStats, load_habitat_definitions,
    load_map_stats_requests,
};
pub use suppression::{SuppressionPolicy, SuppressionTransition};
