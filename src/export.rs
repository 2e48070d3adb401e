//! Output collaborators for the climatology table and raster
//!
//! Exporters never retry: any failure is surfaced as
//! [`ClimNormError::ExportFailure`] carrying the collaborator's own message.

use crate::errors::{ClimNormError, Result};
use crate::region::Region;
use crate::statistics::{ClimatologyRaster, ClimatologyTable, Sampling};
use csv::Writer;
use log::info;
use std::path::{Path, PathBuf};

/// Marker written for a missing statistic
pub const MISSING_MARKER: &str = "NaN";

/// Consumer of the twelve-row climatology table
pub trait TableExporter {
    fn export_table(&self, table: &ClimatologyTable, description: &str) -> Result<()>;
}

/// Everything a raster exporter needs besides the raster itself
#[derive(Debug, Clone, Copy)]
pub struct RasterExportRequest<'a> {
    pub region: &'a Region,
    /// Target nominal resolution and pixel ceiling
    pub sampling: Sampling,
    /// Coordinate reference system identifier, e.g. `EPSG:4326`
    pub crs: &'a str,
    pub description: &'a str,
}

/// Consumer of the region-clipped climatology raster
pub trait RasterExporter {
    fn export_raster(&self, raster: &ClimatologyRaster, request: &RasterExportRequest<'_>) -> Result<()>;
}

/// Stable column names: `month`, `years`, then `mean_<band>`, `std_<band>`,
/// `sum_<band>` for each band
#[must_use]
pub fn table_header(table: &ClimatologyTable) -> Vec<String> {
    let mut header = vec!["month".to_string(), "years".to_string()];
    for band in &table.bands {
        header.push(format!("mean_{band}"));
        header.push(format!("std_{band}"));
        header.push(format!("sum_{band}"));
    }
    header
}

/// Rows matching [`table_header`], one per month
#[must_use]
pub fn table_rows(table: &ClimatologyTable) -> Vec<Vec<String>> {
    let cell = |v: Option<f64>| v.map_or_else(|| MISSING_MARKER.to_string(), |v| v.to_string());
    table
        .records
        .iter()
        .map(|record| {
            let mut row = vec![record.month.to_string(), record.years.to_string()];
            for band in &table.bands {
                let stat = record.statistic(band);
                row.push(cell(stat.mean));
                row.push(cell(stat.std));
                row.push(cell(stat.sum));
            }
            row
        })
        .collect()
}

/// Writes `<dir>/<description>.csv`
#[derive(Debug, Clone)]
pub struct CsvTableExporter {
    dir: PathBuf,
}

impl CsvTableExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path_for(&self, description: &str) -> PathBuf {
        self.dir.join(format!("{description}.csv"))
    }

    fn write(path: &Path, table: &ClimatologyTable) -> std::result::Result<(), csv::Error> {
        let mut writer = Writer::from_path(path)?;
        writer.write_record(table_header(table))?;
        for row in table_rows(table) {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl TableExporter for CsvTableExporter {
    fn export_table(&self, table: &ClimatologyTable, description: &str) -> Result<()> {
        let path = self.path_for(description);
        Self::write(&path, table).map_err(|e| ClimNormError::export(path.display().to_string(), e))?;
        info!("Wrote climatology table to {}", path.display());
        Ok(())
    }
}
