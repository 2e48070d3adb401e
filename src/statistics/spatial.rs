//! Region-level spatial reduction at a nominal scale
//!
//! Grids are sampled on a lattice whose spacing is the nominal `scale` in
//! metres, converted to degrees at [`METERS_PER_DEGREE`]. The lattice is
//! anchored at the north-west corner of the region's bounding box; each lattice
//! centre inside the region reads the native pixel containing it. The result is
//! deterministic for a given scale, and coarser scales give coarser estimates.
//!
//! A region thinner than one lattice step may hold no lattice centre at all.
//! It is then sampled from the native pixels it overlaps, each weighted by the
//! overlapping area.

use crate::errors::{ClimNormError, Result};
use crate::region::Region;
use crate::snapshot::GridExtent;
use log::debug;
use ndarray::Array2;

/// Metres per degree used to turn a nominal scale into a lattice step
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Default pixel ceiling for sampling lattices
pub const DEFAULT_MAX_PIXELS: u64 = 10_000_000_000_000;

/// Nominal sampling resolution and computation budget
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    /// Nominal resolution in metres
    pub scale: f64,
    /// Largest lattice allowed
    pub max_pixels: u64,
}

impl Sampling {
    /// # Errors
    ///
    /// Returns [`ClimNormError::InvalidScale`] unless `scale` is finite and positive.
    pub fn new(scale: f64, max_pixels: u64) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ClimNormError::InvalidScale { scale });
        }
        Ok(Self { scale, max_pixels })
    }

    /// Lattice step in degrees
    #[must_use]
    pub fn step_degrees(&self) -> f64 {
        self.scale / METERS_PER_DEGREE
    }
}

/// Regular sampling lattice over the region's bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingLattice {
    pub extent: GridExtent,
}

impl SamplingLattice {
    /// # Errors
    ///
    /// Returns [`ClimNormError::ComputationBudget`] if the lattice has more
    /// cells than `sampling.max_pixels`.
    pub fn new(region: &Region, sampling: &Sampling) -> Result<Self> {
        let (west, south, east, north) = region.bounds();
        let step = sampling.step_degrees();
        let cols = ((east - west) / step).ceil().max(1.0);
        let rows = ((north - south) / step).ceil().max(1.0);

        let pixels = rows * cols;
        if pixels > sampling.max_pixels as f64 {
            return Err(ClimNormError::ComputationBudget {
                pixels: pixels as u64,
                max_pixels: sampling.max_pixels,
            });
        }

        Ok(Self {
            extent: GridExtent::new(west, north, step, step, rows as usize, cols as usize),
        })
    }

    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.extent.rows * self.extent.cols
    }
}

/// Weighted native pixels sampled for a region
///
/// Lattice samples all weigh 1. Building the sampler once per grid extent lets
/// many grids with the same footprint be collapsed cheaply.
#[derive(Debug, Clone)]
pub struct RegionSampler {
    extent: GridExtent,
    samples: Vec<((usize, usize), f64)>,
}

impl RegionSampler {
    pub fn new(extent: &GridExtent, region: &Region, sampling: &Sampling) -> Result<Self> {
        let lattice = SamplingLattice::new(region, sampling)?;
        let mut samples = Vec::new();
        for row in 0..lattice.extent.rows {
            for col in 0..lattice.extent.cols {
                let (lon, lat) = lattice.extent.cell_center(row, col);
                if !region.contains(lon, lat) {
                    continue;
                }
                if let Some(cell) = extent.locate(lon, lat) {
                    samples.push((cell, 1.0));
                }
            }
        }

        if samples.is_empty() {
            samples = overlap_samples(extent, region);
            if !samples.is_empty() {
                debug!(
                    "No lattice centre at {} m falls in the region; sampling {} overlapping pixels by area",
                    sampling.scale,
                    samples.len()
                );
            }
        }

        Ok(Self {
            extent: *extent,
            samples,
        })
    }

    #[must_use]
    pub fn extent(&self) -> &GridExtent {
        &self.extent
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Weighted mean of the finite sampled values, `None` if there are none
    #[must_use]
    pub fn mean(&self, grid: &Array2<f64>) -> Option<f64> {
        let (sum, weight) = self
            .samples
            .iter()
            .filter_map(|&(cell, w)| grid.get(cell).map(|&v| (v, w)))
            .filter(|(v, _)| v.is_finite())
            .fold((0.0_f64, 0.0_f64), |(s, total), (v, w)| (s + v * w, total + w));
        (weight > 0.0).then(|| sum / weight)
    }
}

/// Native pixels overlapping `region`, weighted by the shared area
fn overlap_samples(extent: &GridExtent, region: &Region) -> Vec<((usize, usize), f64)> {
    let (west, south, east, north) = region.bounds();
    let Some((rows, cols)) = extent.window(west, south, east, north) else {
        return Vec::new();
    };
    let mut samples = Vec::new();
    for row in rows {
        for col in cols.clone() {
            let (w, s, e, n) = extent.cell_bounds(row, col);
            let area = region.overlap_area(w, s, e, n);
            if area > 0.0 {
                samples.push(((row, col), area));
            }
        }
    }
    samples
}

/// Collapse a grid to its spatial mean over `region`
///
/// # Errors
///
/// Returns [`ClimNormError::ComputationBudget`] when the sampling lattice is
/// too large and [`ClimNormError::ShapeMismatch`] when `grid` does not match
/// `extent`.
pub fn collapse_to_region(
    grid: &Array2<f64>,
    extent: &GridExtent,
    region: &Region,
    sampling: &Sampling,
) -> Result<Option<f64>> {
    if grid.dim() != extent.shape() {
        return Err(ClimNormError::ShapeMismatch {
            band: "grid".to_string(),
            expected: extent.shape(),
            found: grid.dim(),
        });
    }
    Ok(RegionSampler::new(extent, region, sampling)?.mean(grid))
}

/// Copy of `grid` with pixels whose centre lies outside `region` set to NaN
#[must_use]
pub fn clip_to_region(grid: &Array2<f64>, extent: &GridExtent, region: &Region) -> Array2<f64> {
    let mut clipped = grid.clone();
    for ((row, col), value) in clipped.indexed_iter_mut() {
        let (lon, lat) = extent.cell_center(row, col);
        if !region.contains(lon, lat) {
            *value = f64::NAN;
        }
    }
    clipped
}

/// Nearest-pixel resampling of `grid` onto the region's sampling lattice
///
/// Lattice cells outside the region or the source grid are NaN.
pub fn resample_to_lattice(
    grid: &Array2<f64>,
    extent: &GridExtent,
    region: &Region,
    sampling: &Sampling,
) -> Result<(GridExtent, Array2<f64>)> {
    let lattice = SamplingLattice::new(region, sampling)?;
    let target = lattice.extent;
    let out = Array2::from_shape_fn(target.shape(), |(row, col)| {
        let (lon, lat) = target.cell_center(row, col);
        if !region.contains(lon, lat) {
            return f64::NAN;
        }
        extent
            .locate(lon, lat)
            .and_then(|cell| grid.get(cell).copied())
            .unwrap_or(f64::NAN)
    });
    Ok((target, out))
}
