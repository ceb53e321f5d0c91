//! The dense, row-major matrix of frames plus the mutable suppression-class layer.
//!
//! The grid exclusively owns every [`Frame`]; replacing a cell's frame destroys the
//! prior value after the new one is constructed — ordinary move semantics give this for
//! free in Rust, unlike the source's explicit `delete` before `new`.

use crate::error::{SimError, SimResult};
use crate::frame::{Frame, VegType};
use crate::raster::{MapType, RasterBand, RasterSink};
use crate::rng::ReplicateRng;
use crate::species::SpeciesRegistry;

/// Inputs needed to build the initial grid, mirroring `CustomLandscape`'s per-layer
/// raster inputs (vegetation, age, topography, site, tree density, initial burn
/// severity, historical fire scar, ignition factor, sensitivity).
pub struct GridInputs<'a> {
    pub vegetation: &'a RasterBand<u8>,
    pub age: &'a RasterBand<i32>,
    pub topo_complex: &'a RasterBand<u8>,
    pub site: &'a RasterBand<f32>,
    pub tree_density: &'a RasterBand<i32>,
    pub ignition_factor: &'a RasterBand<f32>,
    pub sensitivity: &'a RasterBand<f32>,
    /// Maps raw raster byte codes to [`VegType`], the way `CustomFresco::customSetup`
    /// reads per-type numeric ids out of config before building the landscape.
    pub veg_code_to_type: Vec<(u8, VegType)>,
}

/// The landscape grid: owns every cell's [`Frame`] plus the mutable suppression layer.
#[derive(Debug, Clone)]
pub struct Grid {
    pub rows: usize,
    pub cols: usize,
    frames: Vec<Frame>,
    suppression_class: Vec<u8>,
}

impl Grid {
    pub fn from_rasters(
        inputs: &GridInputs<'_>,
        registry: &SpeciesRegistry,
        current_year: i64,
        rng: &mut ReplicateRng,
    ) -> SimResult<Self> {
        let rows = inputs.vegetation.rows;
        let cols = inputs.vegetation.cols;
        if inputs.age.rows != rows || inputs.age.cols != cols {
            return Err(SimError::Invariant("age raster dimensions don't match vegetation raster".to_string()));
        }

        let mut frames = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let code = inputs.vegetation.get(row, col);
                let veg_type = if inputs.vegetation.is_nodata(row, col) || inputs.age.is_nodata(row, col) {
                    VegType::NoVeg
                } else {
                    inputs
                        .veg_code_to_type
                        .iter()
                        .find(|(c, _)| *c == code)
                        .map(|(_, t)| *t)
                        .unwrap_or(VegType::NoVeg)
                };
                let site = inputs.site.get(row, col) as f64;
                let is_topo_complex = inputs.topo_complex.get(row, col) != 0;
                let fire_ignition_factor = inputs.ignition_factor.get(row, col) as f64;
                let fire_sensitivity = inputs.sensitivity.get(row, col) as f64;
                let tree_density = inputs.tree_density.get(row, col) as i64;
                let frame = Frame::establish(
                    veg_type,
                    current_year,
                    site,
                    is_topo_complex,
                    fire_ignition_factor,
                    fire_sensitivity,
                    veg_type,
                    tree_density,
                    registry,
                    rng,
                )?;
                frames.push(frame);
            }
        }

        Ok(Self {
            rows,
            cols,
            frames,
            suppression_class: vec![0; rows * cols],
        })
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn get(&self, row: usize, col: usize) -> &Frame {
        &self.frames[self.index(row, col)]
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut Frame {
        let idx = self.index(row, col);
        &mut self.frames[idx]
    }

    pub fn replace(&mut self, row: usize, col: usize, frame: Frame) {
        let idx = self.index(row, col);
        self.frames[idx] = frame;
    }

    pub fn suppression_class(&self, row: usize, col: usize) -> u8 {
        self.suppression_class[self.index(row, col)]
    }

    pub fn set_suppression_class(&mut self, row: usize, col: usize, class: u8) {
        let idx = self.index(row, col);
        self.suppression_class[idx] = class;
    }

    pub fn reload_suppression_map(&mut self, classes: &RasterBand<u8>) -> SimResult<()> {
        if classes.rows != self.rows || classes.cols != self.cols {
            return Err(SimError::Invariant("suppression map dimensions don't match grid".to_string()));
        }
        self.suppression_class = classes.data.clone();
        Ok(())
    }

    pub fn in_bounds(&self, row: i64, col: i64) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.rows && (col as usize) < self.cols
    }

    /// Iterate cells within `radius` (cell units) of `(row, col)`, including the cell
    /// itself at distance 0, applying `query` to each and summing the results. This is
    /// the iterator-based realization of the neighborhood-callback design note: no
    /// function pointers, just a closure over `(distance, neighbor)`.
    pub fn neighbors_success(&self, row: usize, col: usize, radius: f64, mut query: impl FnMut(f64, &Frame) -> f64) -> f64 {
        let r_i = radius.ceil() as i64;
        let mut total = 0.0;
        for dr in -r_i..=r_i {
            for dc in -r_i..=r_i {
                let nr = row as i64 + dr;
                let nc = col as i64 + dc;
                if !self.in_bounds(nr, nc) {
                    continue;
                }
                let distance = ((dr * dr + dc * dc) as f64).sqrt();
                if distance > radius {
                    continue;
                }
                total += query(distance, self.get(nr as usize, nc as usize));
            }
        }
        total
    }

    /// 8-connected neighbors in the fixed tie-break compass order (N, NE, E, SE, S, SW,
    /// W, NW) used by the fire engine's spread phase.
    pub fn compass_neighbors(&self, row: usize, col: usize) -> Vec<(usize, usize)> {
        const OFFSETS: [(i64, i64); 8] = [(-1, 0), (-1, 1), (0, 1), (1, 1), (1, 0), (1, -1), (0, -1), (-1, -1)];
        OFFSETS
            .iter()
            .filter_map(|(dr, dc)| {
                let nr = row as i64 + dr;
                let nc = col as i64 + dc;
                self.in_bounds(nr, nc).then_some((nr as usize, nc as usize))
            })
            .collect()
    }

    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Export a full raster band for `map_type`, used by the stat/map-writing phase.
    pub fn export_byte(&self, map_type: MapType) -> SimResult<RasterBand<u8>> {
        let mut band = RasterBand::new(self.rows, self.cols, crate::raster::NODATA_BYTE);
        for row in 0..self.rows {
            for col in 0..self.cols {
                let value = self.get(row, col).get_as_byte(map_type)?;
                band.set(row, col, value);
            }
        }
        Ok(band)
    }

    pub fn export_float(&self, map_type: MapType) -> SimResult<RasterBand<f32>> {
        let mut band = RasterBand::new(self.rows, self.cols, crate::raster::NODATA_FLOAT32);
        for row in 0..self.rows {
            for col in 0..self.cols {
                let value = self.get(row, col).get_as_float(map_type)?;
                band.set(row, col, value);
            }
        }
        Ok(band)
    }

    /// Export `map_type` and hand it to `sink` under `name`, the way `writeMaps` realizes
    /// one `MapStats` request's active flags. Map types with no output encoding yet
    /// (`Age`, `FireAge`, `FireScar`, `BurnSeverityHistory`) surface as an invariant error
    /// rather than silently skipping the write.
    pub fn write_map(&self, map_type: MapType, sink: &mut dyn RasterSink, name: &str) -> SimResult<()> {
        match map_type {
            MapType::Vegetation | MapType::BurnSeverity | MapType::Subcanopy | MapType::DecidSpeciesTrajectory => {
                sink.write_byte(name, &self.export_byte(map_type)?)
            }
            MapType::SiteVariable | MapType::TundraBasalArea => sink.write_float32(name, &self.export_float(map_type)?),
            MapType::Age | MapType::FireAge | MapType::FireScar | MapType::BurnSeverityHistory => Err(SimError::Invariant(
                format!("map type {map_type:?} has no output encoding yet"),
            )),
        }
    }
}
