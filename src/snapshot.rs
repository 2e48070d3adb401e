//! Time-stamped grid snapshots and their spatial extent
//!
//! A [`GridSnapshot`] is one day's (or one month's) measurement field: a set of
//! named bands sharing the same regular lon/lat grid. NaN pixels are treated as
//! masked and are skipped by every reduction.

use crate::errors::{ClimNormError, Result};
use chrono::NaiveDate;
use ndarray::Array2;
use std::collections::BTreeMap;
use std::ops::Range;

/// Band name to grid
pub type BandGrids = BTreeMap<String, Array2<f64>>;

/// Regular lon/lat grid anchored at its north-west corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridExtent {
    /// Longitude of the western edge, degrees
    pub west: f64,
    /// Latitude of the northern edge, degrees
    pub north: f64,
    /// Cell width in degrees of longitude
    pub cell_width: f64,
    /// Cell height in degrees of latitude
    pub cell_height: f64,
    pub rows: usize,
    pub cols: usize,
}

impl GridExtent {
    pub fn new(west: f64, north: f64, cell_width: f64, cell_height: f64, rows: usize, cols: usize) -> Self {
        Self {
            west,
            north,
            cell_width,
            cell_height,
            rows,
            cols,
        }
    }

    #[must_use]
    pub fn east(&self) -> f64 {
        self.west + self.cell_width * self.cols as f64
    }

    #[must_use]
    pub fn south(&self) -> f64 {
        self.north - self.cell_height * self.rows as f64
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Bounding box as `(west, south, east, north)`
    #[must_use]
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (self.west, self.south(), self.east(), self.north)
    }

    /// Centre of a cell as `(lon, lat)`
    #[must_use]
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.west + (col as f64 + 0.5) * self.cell_width,
            self.north - (row as f64 + 0.5) * self.cell_height,
        )
    }

    /// Bounds of a cell as `(west, south, east, north)`
    #[must_use]
    pub fn cell_bounds(&self, row: usize, col: usize) -> (f64, f64, f64, f64) {
        let west = self.west + col as f64 * self.cell_width;
        let north = self.north - row as f64 * self.cell_height;
        (west, north - self.cell_height, west + self.cell_width, north)
    }

    /// Row and column ranges of the cells overlapping a lon/lat box
    #[must_use]
    pub fn window(&self, west: f64, south: f64, east: f64, north: f64) -> Option<(Range<usize>, Range<usize>)> {
        let col_start = ((west - self.west) / self.cell_width).floor().max(0.0);
        let col_end = ((east - self.west) / self.cell_width).ceil().min(self.cols as f64);
        let row_start = ((self.north - north) / self.cell_height).floor().max(0.0);
        let row_end = ((self.north - south) / self.cell_height).ceil().min(self.rows as f64);
        if !(col_start < col_end && row_start < row_end) {
            return None;
        }
        Some((
            row_start as usize..row_end as usize,
            col_start as usize..col_end as usize,
        ))
    }

    /// Cell containing a point, or `None` when the point lies outside the grid
    #[must_use]
    pub fn locate(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        let col = ((lon - self.west) / self.cell_width).floor();
        let row = ((self.north - lat) / self.cell_height).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        (row < self.rows && col < self.cols).then_some((row, col))
    }
}

/// One time-stamped measurement field with one or more named bands
#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    pub date: NaiveDate,
    pub extent: GridExtent,
    pub bands: BandGrids,
}

impl GridSnapshot {
    /// Build a snapshot, checking every band against the extent's shape
    pub fn new(date: NaiveDate, extent: GridExtent, bands: BandGrids) -> Result<Self> {
        for (band, grid) in &bands {
            if grid.dim() != extent.shape() {
                return Err(ClimNormError::ShapeMismatch {
                    band: band.clone(),
                    expected: extent.shape(),
                    found: grid.dim(),
                });
            }
        }
        Ok(Self {
            date,
            extent,
            bands,
        })
    }

    /// Snapshot where every pixel of every listed band holds `value`
    pub fn uniform(date: NaiveDate, extent: GridExtent, band_names: &[&str], value: f64) -> Self {
        let bands = band_names
            .iter()
            .map(|name| (name.to_string(), Array2::from_elem(extent.shape(), value)))
            .collect();
        Self {
            date,
            extent,
            bands,
        }
    }

    pub fn band(&self, name: &str) -> Result<&Array2<f64>> {
        self.bands.get(name).ok_or_else(|| ClimNormError::BandNotFound {
            band: name.to_string(),
            date: self.date.to_string(),
        })
    }

    /// Keep only the listed bands, in any order
    pub fn select(&self, band_names: &[String]) -> Result<Self> {
        let mut bands = BandGrids::new();
        for name in band_names {
            bands.insert(name.clone(), self.band(name)?.clone());
        }
        Ok(Self {
            date: self.date,
            extent: self.extent,
            bands,
        })
    }
}
