//! Raster source abstraction
//!
//! The pipeline only needs one capability from a data provider: the snapshots
//! of a named dataset for a region and date window. [`RasterSource`] is that
//! seam; [`InMemoryRasterSource`] and [`NetCDFRasterSource`] implement it.

use crate::errors::{ClimNormError, Result};
use crate::region::Region;
use crate::snapshot::{BandGrids, GridExtent, GridSnapshot};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use log::{debug, info};
use ndarray::{s, Array2, Array3};
use netcdf::{AttributeValue, Variable};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Provider of time-stamped grid snapshots
pub trait RasterSource {
    /// Identifiers of the datasets this source can serve
    fn datasets(&self) -> Vec<String>;

    /// Snapshots of `dataset` dated within `[start, end]` that overlap `region`
    ///
    /// # Errors
    ///
    /// Returns [`ClimNormError::DatasetNotFound`] for an unknown identifier, or
    /// the underlying read error.
    fn fetch(&self, dataset: &str, region: &Region, start: NaiveDate, end: NaiveDate) -> Result<Vec<GridSnapshot>>;
}

/// Snapshots held in memory, keyed by dataset id
#[derive(Debug, Clone, Default)]
pub struct InMemoryRasterSource {
    datasets: BTreeMap<String, Vec<GridSnapshot>>,
}

impl InMemoryRasterSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_dataset(mut self, dataset: &str, snapshots: Vec<GridSnapshot>) -> Self {
        self.datasets.insert(dataset.to_string(), snapshots);
        self
    }
}

impl RasterSource for InMemoryRasterSource {
    fn datasets(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    fn fetch(&self, dataset: &str, region: &Region, start: NaiveDate, end: NaiveDate) -> Result<Vec<GridSnapshot>> {
        let snapshots = self
            .datasets
            .get(dataset)
            .ok_or_else(|| ClimNormError::DatasetNotFound {
                dataset: dataset.to_string(),
            })?;
        Ok(snapshots
            .iter()
            .filter(|s| s.date >= start && s.date <= end && region.intersects(&s.extent))
            .cloned()
            .collect())
    }
}

/// CF-style NetCDF files, one per dataset id
///
/// Each file needs `time`, `lat` and `lon` coordinate variables and one
/// `(time, lat, lon)` variable per band. `time` carries CF units such as
/// `days since 1981-01-01`. Values equal to `_FillValue` or `missing_value`
/// become NaN.
#[derive(Debug, Clone, Default)]
pub struct NetCDFRasterSource {
    datasets: BTreeMap<String, PathBuf>,
}

impl NetCDFRasterSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_dataset(mut self, dataset: &str, path: impl Into<PathBuf>) -> Self {
        self.datasets.insert(dataset.to_string(), path.into());
        self
    }

    fn path(&self, dataset: &str) -> Result<&Path> {
        self.datasets
            .get(dataset)
            .map(PathBuf::as_path)
            .ok_or_else(|| ClimNormError::DatasetNotFound {
                dataset: dataset.to_string(),
            })
    }
}

impl RasterSource for NetCDFRasterSource {
    fn datasets(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    fn fetch(&self, dataset: &str, region: &Region, start: NaiveDate, end: NaiveDate) -> Result<Vec<GridSnapshot>> {
        let path = self.path(dataset)?;
        let file = netcdf::open(path)?;
        info!("Reading dataset '{}' from {}", dataset, path.display());

        let time_var = coordinate(&file, "time")?;
        let units = string_attribute(&time_var, "units").ok_or_else(|| ClimNormError::InvalidTimeUnits {
            units: String::new(),
        })?;
        let dates = time_var
            .get_values::<f64, _>(..)?
            .into_iter()
            .map(|t| decode_time(t, &units))
            .collect::<Result<Vec<NaiveDate>>>()?;

        let lats = coordinate(&file, "lat")?.get_values::<f64, _>(..)?;
        let lons = coordinate(&file, "lon")?.get_values::<f64, _>(..)?;
        let layout = GridLayout::from_coordinates(&lats, &lons)?;

        if !region.intersects(&layout.extent) {
            debug!("Dataset '{}' does not overlap the region", dataset);
            return Ok(Vec::new());
        }

        let selected: Vec<usize> = (0..dates.len())
            .filter(|&i| dates[i] >= start && dates[i] <= end)
            .collect();
        let (Some(&first), Some(&last)) = (selected.first(), selected.last()) else {
            return Ok(Vec::new());
        };

        let mut bands: BTreeMap<String, Array3<f64>> = BTreeMap::new();
        for var in file.variables() {
            let dims: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
            if dims != ["time", "lat", "lon"] {
                continue;
            }
            let values = var.get_values::<f64, _>((first..last + 1, 0..lats.len(), 0..lons.len()))?;
            let mut block = Array3::from_shape_vec((last + 1 - first, lats.len(), lons.len()), values)?;
            if let Some(fill) = fill_value(&var) {
                block.mapv_inplace(|v| if v == fill { f64::NAN } else { v });
            }
            bands.insert(var.name().to_string(), block);
        }

        let snapshots = selected
            .into_iter()
            .map(|t| {
                let grids: BandGrids = bands
                    .iter()
                    .map(|(name, block)| (name.clone(), layout.orient(block.slice(s![t - first, .., ..]).to_owned())))
                    .collect();
                GridSnapshot::new(dates[t], layout.extent, grids)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Fetched {} snapshots with {} bands", snapshots.len(), bands.len());
        Ok(snapshots)
    }
}

/// Extent derived from coordinate vectors plus whether rows must be flipped
struct GridLayout {
    extent: GridExtent,
    flip_rows: bool,
}

impl GridLayout {
    fn from_coordinates(lats: &[f64], lons: &[f64]) -> Result<Self> {
        let cell_height = spacing(lats).or_else(|| spacing(lons));
        let cell_width = spacing(lons).or(cell_height);
        let (Some(cell_width), Some(cell_height)) = (cell_width, cell_height) else {
            return Err(ClimNormError::Generic(
                "cannot infer cell size from single-point lat/lon coordinates".to_string(),
            ));
        };

        let north = lats.iter().copied().fold(f64::NEG_INFINITY, f64::max) + cell_height / 2.0;
        let west = lons.iter().copied().fold(f64::INFINITY, f64::min) - cell_width / 2.0;
        let flip_rows = lats.len() > 1 && lats[0] < lats[1];

        Ok(Self {
            extent: GridExtent::new(west, north, cell_width, cell_height, lats.len(), lons.len()),
            flip_rows,
        })
    }

    // Rows run north to south in a GridSnapshot
    fn orient(&self, grid: Array2<f64>) -> Array2<f64> {
        if self.flip_rows {
            grid.slice(s![..;-1, ..]).to_owned()
        } else {
            grid
        }
    }
}

fn spacing(values: &[f64]) -> Option<f64> {
    (values.len() > 1).then(|| (values[1] - values[0]).abs())
}

fn coordinate<'f>(file: &'f netcdf::File, name: &str) -> Result<Variable<'f>> {
    file.variable(name)
        .ok_or_else(|| ClimNormError::Generic(format!("Coordinate variable '{name}' not found in file")))
}

fn string_attribute(var: &Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

fn fill_value(var: &Variable) -> Option<f64> {
    ["_FillValue", "missing_value"].iter().find_map(|name| {
        match var.attribute(name)?.value().ok()? {
            AttributeValue::Float(v) => Some(f64::from(v)),
            AttributeValue::Double(v) => Some(v),
            AttributeValue::Short(v) => Some(f64::from(v)),
            AttributeValue::Int(v) => Some(f64::from(v)),
            _ => None,
        }
    })
}

/// Decode a CF time value such as `15` with units `days since 2000-01-01`
pub fn decode_time(value: f64, units: &str) -> Result<NaiveDate> {
    let invalid = || ClimNormError::InvalidTimeUnits {
        units: units.to_string(),
    };
    if !value.is_finite() {
        return Err(invalid());
    }

    let (unit, origin) = units.split_once(" since ").ok_or_else(invalid)?;
    let seconds_per_unit = match unit.trim().to_lowercase().as_str() {
        "days" | "day" | "d" => 86_400.0,
        "hours" | "hour" | "h" => 3_600.0,
        "minutes" | "minute" | "min" => 60.0,
        "seconds" | "second" | "s" => 1.0,
        _ => return Err(invalid()),
    };

    let origin = origin.trim();
    let base = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(origin, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(origin.split_whitespace().next()?, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
        })
        .ok_or_else(invalid)?;

    let offset = TimeDelta::try_seconds((value * seconds_per_unit).round() as i64).ok_or_else(invalid)?;
    base.checked_add_signed(offset)
        .map(|dt| dt.date())
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_time_units() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(decode_time(0.0, "days since 1980-01-01").unwrap(), d(1980, 1, 1));
        assert_eq!(decode_time(31.0, "days since 1980-01-01 00:00:00").unwrap(), d(1980, 2, 1));
        assert_eq!(decode_time(48.0, "hours since 1900-01-01T00:00:00").unwrap(), d(1900, 1, 3));
        assert!(matches!(
            decode_time(1.0, "fortnights since 2000-01-01"),
            Err(ClimNormError::InvalidTimeUnits { .. })
        ));
        assert!(decode_time(1.0, "days").is_err());
    }

    #[test]
    fn test_decode_time_rejects_non_finite_values() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                decode_time(value, "days since 2000-01-01"),
                Err(ClimNormError::InvalidTimeUnits { .. })
            ));
        }
    }

    #[test]
    fn test_in_memory_source() {
        let extent = GridExtent::new(0.0, 1.0, 1.0, 1.0, 1, 1);
        let day = |d| NaiveDate::from_ymd_opt(2000, 1, d).unwrap();
        let source = InMemoryRasterSource::new().with_dataset(
            "test",
            (1..=5).map(|d| GridSnapshot::uniform(day(d), extent, &["precipitation"], 1.0)).collect(),
        );
        let region = Region::from_extent(&extent).unwrap();

        assert_eq!(source.datasets(), vec!["test".to_string()]);
        assert_eq!(source.fetch("test", &region, day(2), day(4)).unwrap().len(), 3);
        assert!(matches!(
            source.fetch("other", &region, day(1), day(5)),
            Err(ClimNormError::DatasetNotFound { .. })
        ));
    }

    #[test]
    fn test_layout_flips_ascending_latitudes() {
        let layout = GridLayout::from_coordinates(&[-30.0, -29.5], &[-55.0, -54.5, -54.0]).unwrap();
        assert!(layout.flip_rows);
        assert_eq!(layout.extent.north, -29.25);
        assert_eq!(layout.extent.west, -55.25);
        let grid = Array2::from_shape_vec((2, 3), vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]).unwrap();
        assert_eq!(layout.orient(grid)[[0, 0]], 2.0);
    }
}
