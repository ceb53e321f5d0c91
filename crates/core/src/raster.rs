//! Georeferenced 2-D raster codec.
//!
//! The core never reads or writes files directly; it goes through [`RasterSource`] and
//! [`RasterSink`]. [`MemoryRaster`] is the in-process default used by tests and by
//! [`FlatRaster`] is a minimal file-backed default (a stand-in for the GDAL-backed
//! GeoTIFF codec real deployments would plug in) so the crate is runnable without
//! external raster libraries.

use crate::error::{SimError, SimResult};
use std::io::{Read, Write};
use std::path::Path;

/// Nodata sentinels, matching the georeferenced raster convention this model targets.
pub const NODATA_BYTE: u8 = 255;
pub const NODATA_INT32: i32 = -2_147_483_647;
pub const NODATA_FLOAT32: f32 = -3.4e38;
pub const NODATA_FLOAT32_ALTERNATE: f32 = -3.402_82e+38;

/// Map types the simulator can write as output rasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapType {
    Vegetation,
    Age,
    FireAge,
    FireScar,
    BurnSeverity,
    BurnSeverityHistory,
    Subcanopy,
    SiteVariable,
    DecidSpeciesTrajectory,
    TundraBasalArea,
}

/// Georeference metadata shared by every raster band in a run.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoReference {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_w: f64,
    pub pixel_h: f64,
    pub rotation_x: f64,
    pub rotation_y: f64,
    pub spatial_reference: String,
}

impl Default for GeoReference {
    fn default() -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            pixel_w: 1.0,
            pixel_h: -1.0,
            rotation_x: 0.0,
            rotation_y: 0.0,
            spatial_reference: "NAD83".to_string(),
        }
    }
}

/// A dense `rows x cols` typed raster band with a nodata sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBand<T> {
    pub rows: usize,
    pub cols: usize,
    pub nodata: T,
    pub data: Vec<T>,
    pub georef: GeoReference,
}

impl<T: Copy + PartialEq> RasterBand<T> {
    pub fn new(rows: usize, cols: usize, nodata: T) -> Self {
        Self {
            rows,
            cols,
            nodata,
            data: vec![nodata; rows * cols],
            georef: GeoReference::default(),
        }
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[self.index(row, col)]
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) {
        let idx = self.index(row, col);
        self.data[idx] = value;
    }

    pub fn is_nodata(&self, row: usize, col: usize) -> bool {
        self.get(row, col) == self.nodata
    }
}

/// Reads named input rasters for grid initialization.
pub trait RasterSource {
    fn read_byte(&self, name: &str) -> SimResult<RasterBand<u8>>;
    fn read_int32(&self, name: &str) -> SimResult<RasterBand<i32>>;
    fn read_float32(&self, name: &str) -> SimResult<RasterBand<f32>>;
}

/// Writes output rasters, one map type per year.
pub trait RasterSink {
    fn write_byte(&mut self, name: &str, band: &RasterBand<u8>) -> SimResult<()>;
    fn write_int32(&mut self, name: &str, band: &RasterBand<i32>) -> SimResult<()>;
    fn write_float32(&mut self, name: &str, band: &RasterBand<f32>) -> SimResult<()>;
}

/// In-memory raster store, keyed by name. Used by tests and as a harness default when no
/// output directory is configured.
#[derive(Debug, Clone, Default)]
pub struct MemoryRaster {
    bytes: std::collections::HashMap<String, RasterBand<u8>>,
    int32s: std::collections::HashMap<String, RasterBand<i32>>,
    float32s: std::collections::HashMap<String, RasterBand<f32>>,
}

impl MemoryRaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_byte(&mut self, name: impl Into<String>, band: RasterBand<u8>) {
        self.bytes.insert(name.into(), band);
    }

    pub fn insert_int32(&mut self, name: impl Into<String>, band: RasterBand<i32>) {
        self.int32s.insert(name.into(), band);
    }

    pub fn insert_float32(&mut self, name: impl Into<String>, band: RasterBand<f32>) {
        self.float32s.insert(name.into(), band);
    }

    pub fn get_byte(&self, name: &str) -> Option<&RasterBand<u8>> {
        self.bytes.get(name)
    }

    pub fn get_int32(&self, name: &str) -> Option<&RasterBand<i32>> {
        self.int32s.get(name)
    }

    pub fn get_float32(&self, name: &str) -> Option<&RasterBand<f32>> {
        self.float32s.get(name)
    }
}

impl RasterSource for MemoryRaster {
    fn read_byte(&self, name: &str) -> SimResult<RasterBand<u8>> {
        self.bytes
            .get(name)
            .cloned()
            .ok_or_else(|| SimError::Io(format!("no byte raster named {name}")))
    }

    fn read_int32(&self, name: &str) -> SimResult<RasterBand<i32>> {
        self.int32s
            .get(name)
            .cloned()
            .ok_or_else(|| SimError::Io(format!("no int32 raster named {name}")))
    }

    fn read_float32(&self, name: &str) -> SimResult<RasterBand<f32>> {
        self.float32s
            .get(name)
            .cloned()
            .ok_or_else(|| SimError::Io(format!("no float32 raster named {name}")))
    }
}

impl RasterSink for MemoryRaster {
    fn write_byte(&mut self, name: &str, band: &RasterBand<u8>) -> SimResult<()> {
        self.bytes.insert(name.to_string(), band.clone());
        Ok(())
    }

    fn write_int32(&mut self, name: &str, band: &RasterBand<i32>) -> SimResult<()> {
        self.int32s.insert(name.to_string(), band.clone());
        Ok(())
    }

    fn write_float32(&mut self, name: &str, band: &RasterBand<f32>) -> SimResult<()> {
        self.float32s.insert(name.to_string(), band.clone());
        Ok(())
    }
}

/// Minimal row-major binary raster codec backed by a directory on disk.
///
/// Each band is written to its own `<name>.flat` file: a fixed header (rows, cols,
/// nodata, georeference) followed by the raw row-major samples. Writes are
/// transactional at the file level: the file is created, every row written, then
/// closed; on any failure the caller is responsible for removing the partial file (the
/// same contract the model's GDAL-backed writer follows).
#[derive(Debug, Clone)]
pub struct FlatRaster {
    dir: std::path::PathBuf,
}

impl FlatRaster {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> std::path::PathBuf {
        self.dir.join(format!("{name}.flat"))
    }
}

fn write_header(w: &mut impl Write, rows: usize, cols: usize, georef: &GeoReference) -> SimResult<()> {
    writeln!(w, "{rows} {cols}").map_err(|e| SimError::Io(e.to_string()))?;
    writeln!(
        w,
        "{} {} {} {} {} {} {}",
        georef.origin_x,
        georef.origin_y,
        georef.pixel_w,
        georef.pixel_h,
        georef.rotation_x,
        georef.rotation_y,
        georef.spatial_reference
    )
    .map_err(|e| SimError::Io(e.to_string()))?;
    Ok(())
}

fn read_header(text: &str) -> SimResult<(usize, usize, GeoReference, usize)> {
    let mut lines = text.lines();
    let dims = lines
        .next()
        .ok_or_else(|| SimError::Io("empty raster file".to_string()))?;
    let mut parts = dims.split_whitespace();
    let rows: usize = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| SimError::Io("bad rows header".to_string()))?;
    let cols: usize = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| SimError::Io("bad cols header".to_string()))?;
    let geo_line = lines
        .next()
        .ok_or_else(|| SimError::Io("missing georeference header".to_string()))?;
    let mut geo_parts = geo_line.split_whitespace();
    let mut next_f64 = || -> SimResult<f64> {
        geo_parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| SimError::Io("bad georeference header".to_string()))
    };
    let origin_x = next_f64()?;
    let origin_y = next_f64()?;
    let pixel_w = next_f64()?;
    let pixel_h = next_f64()?;
    let rotation_x = next_f64()?;
    let rotation_y = next_f64()?;
    let spatial_reference = geo_parts.next().unwrap_or("NAD83").to_string();
    let header_bytes = dims.len() + 1 + geo_line.len() + 1;
    Ok((
        rows,
        cols,
        GeoReference {
            origin_x,
            origin_y,
            pixel_w,
            pixel_h,
            rotation_x,
            rotation_y,
            spatial_reference,
        },
        header_bytes,
    ))
}

impl RasterSource for FlatRaster {
    fn read_byte(&self, name: &str) -> SimResult<RasterBand<u8>> {
        let mut text_and_body = Vec::new();
        std::fs::File::open(self.path_for(name))
            .and_then(|mut f| f.read_to_end(&mut text_and_body))
            .map_err(|e| SimError::Io(format!("{name}: {e}")))?;
        let header_text = String::from_utf8_lossy(&text_and_body);
        let (rows, cols, georef, header_len) = read_header(&header_text)?;
        let data = text_and_body[header_len..].to_vec();
        if data.len() != rows * cols {
            return Err(SimError::Io(format!("{name}: truncated raster body")));
        }
        Ok(RasterBand {
            rows,
            cols,
            nodata: NODATA_BYTE,
            data,
            georef,
        })
    }

    fn read_int32(&self, name: &str) -> SimResult<RasterBand<i32>> {
        let bytes = std::fs::read(self.path_for(name)).map_err(|e| SimError::Io(format!("{name}: {e}")))?;
        let header_text = String::from_utf8_lossy(&bytes);
        let (rows, cols, georef, header_len) = read_header(&header_text)?;
        let body = &bytes[header_len..];
        if body.len() != rows * cols * 4 {
            return Err(SimError::Io(format!("{name}: truncated raster body")));
        }
        let data = body
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(RasterBand {
            rows,
            cols,
            nodata: NODATA_INT32,
            data,
            georef,
        })
    }

    fn read_float32(&self, name: &str) -> SimResult<RasterBand<f32>> {
        let bytes = std::fs::read(self.path_for(name)).map_err(|e| SimError::Io(format!("{name}: {e}")))?;
        let header_text = String::from_utf8_lossy(&bytes);
        let (rows, cols, georef, header_len) = read_header(&header_text)?;
        let body = &bytes[header_len..];
        if body.len() != rows * cols * 4 {
            return Err(SimError::Io(format!("{name}: truncated raster body")));
        }
        let data = body
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(RasterBand {
            rows,
            cols,
            nodata: NODATA_FLOAT32,
            data,
            georef,
        })
    }
}

impl RasterSink for FlatRaster {
    fn write_byte(&mut self, name: &str, band: &RasterBand<u8>) -> SimResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| SimError::Io(e.to_string()))?;
        let path = self.path_for(name);
        let write = || -> std::io::Result<()> {
            let mut f = std::fs::File::create(&path)?;
            write_header(&mut f, band.rows, band.cols, &band.georef).map_err(|_| std::io::ErrorKind::Other)?;
            f.write_all(&band.data)
        };
        write().map_err(|e| {
            let _ = std::fs::remove_file(&path);
            SimError::Io(format!("{name}: {e}"))
        })
    }

    fn write_int32(&mut self, name: &str, band: &RasterBand<i32>) -> SimResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| SimError::Io(e.to_string()))?;
        let path = self.path_for(name);
        let write = || -> std::io::Result<()> {
            let mut f = std::fs::File::create(&path)?;
            write_header(&mut f, band.rows, band.cols, &band.georef).map_err(|_| std::io::ErrorKind::Other)?;
            for v in &band.data {
                f.write_all(&v.to_le_bytes())?;
            }
            Ok(())
        };
        write().map_err(|e| {
            let _ = std::fs::remove_file(&path);
            SimError::Io(format!("{name}: {e}"))
        })
    }

    fn write_float32(&mut self, name: &str, band: &RasterBand<f32>) -> SimResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| SimError::Io(e.to_string()))?;
        let path = self.path_for(name);
        let write = || -> std::io::Result<()> {
            let mut f = std::fs::File::create(&path)?;
            write_header(&mut f, band.rows, band.cols, &band.georef).map_err(|_| std::io::ErrorKind::Other)?;
            for v in &band.data {
                f.write_all(&v.to_le_bytes())?;
            }
            Ok(())
        };
        write().map_err(|e| {
            let _ = std::fs::remove_file(&path);
            SimError::Io(format!("{name}: {e}"))
        })
    }
}

/// Encode a fire-scar value: `sign(±) * year.fireID`, with the decimal scale chosen so
/// `fireID` occupies the fractional digits without colliding with `year`'s integer part.
/// Sign is negative for ignition-origin cells.
fn decimal_digits(n: u32) -> u32 {
    if n == 0 {
        1
    } else {
        (n as f64).log10().floor() as u32 + 1
    }
}

pub fn encode_fire_scar(year: i64, fire_id: u32, is_origin: bool) -> f64 {
    if fire_id == 0 {
        return year as f64;
    }
    let digits = decimal_digits(fire_id) + 1;
    let scale = 10f64.powi(digits as i32);
    let encoded = year as f64 + (fire_id as f64) / scale;
    if is_origin {
        -encoded
    } else {
        encoded
    }
}

/// Decode a fire-scar value back into `(year_of_last_burn, fire_id, was_origin)`. Only
/// exact for `fire_id < 10_000_000` per the model's own round-trip guarantee; like the
/// source format it embeds, a fire id with trailing zeros (e.g. 100) is indistinguishable
/// from the shorter id its trailing-zero-stripped fraction also encodes (e.g. 1) — this
/// is a property of the `year.fireID` scheme itself, not of this implementation.
pub fn decode_fire_scar(value: f64) -> (i64, u32, bool) {
    let is_origin = value < 0.0;
    let magnitude = value.abs();
    let year = magnitude.trunc() as i64;
    let frac = magnitude.fract();
    if frac < 1e-12 {
        return (year, 0, is_origin);
    }
    for d in 2..=8u32 {
        let scale = 10f64.powi(d as i32);
        let candidate = (frac * scale).round();
        if (frac * scale - candidate).abs() < 1e-6 {
            let fire_id = candidate as u32;
            if decimal_digits(fire_id) + 1 == d {
                return (year, fire_id, is_origin);
            }
        }
    }
    (year, (frac * 10f64.powi(8)).round() as u32, is_origin)
}

/// Helper for tests and the run harness: resolve an output directory's `Path`.
pub fn ensure_dir(path: &Path) -> SimResult<()> {
    std::fs::create_dir_all(path).map_err(|e| SimError::Io(e.to_string()))
}
