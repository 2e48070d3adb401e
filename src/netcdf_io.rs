//! NetCDF raster export
//!
//! Writes a [`ClimatologyRaster`] resampled onto the region's sampling lattice
//! as a CF-style NetCDF file with `lat`/`lon` coordinates and one variable per
//! band and statistic.

use crate::errors::{ClimNormError, Result};
use crate::export::{RasterExportRequest, RasterExporter};
use crate::snapshot::GridExtent;
use crate::statistics::{resample_to_lattice, ClimatologyRaster};
use chrono::Utc;
use log::info;
use ndarray::{Array1, Array2};
use std::{fs, path::Path, path::PathBuf};

/// Raster exporter writing a single NetCDF file
#[derive(Debug, Clone)]
pub struct NetCDFRasterExporter {
    output_path: PathBuf,
}

/// One resampled layer ready to be written
struct Layer {
    name: String,
    statistic: &'static str,
    band: String,
    data: Array2<f64>,
}

impl NetCDFRasterExporter {
    /// Create a new NetCDF raster exporter
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    fn write(
        &self,
        target: &GridExtent,
        layers: &[Layer],
        request: &RasterExportRequest<'_>,
        months: usize,
    ) -> Result<()> {
        if self.output_path.exists() {
            fs::remove_file(&self.output_path)?;
        }

        let mut file = netcdf::create(&self.output_path)?;
        file.add_dimension("lat", target.rows)?;
        file.add_dimension("lon", target.cols)?;

        let lats = Array1::from_shape_fn(target.rows, |row| target.cell_center(row, 0).1);
        let lons = Array1::from_shape_fn(target.cols, |col| target.cell_center(0, col).0);

        let mut lat_var = file.add_variable::<f64>("lat", &["lat"])?;
        lat_var.put_attribute("units", "degrees_north")?;
        lat_var.put_attribute("standard_name", "latitude")?;
        lat_var.put(lats.view(), ..)?;

        let mut lon_var = file.add_variable::<f64>("lon", &["lon"])?;
        lon_var.put_attribute("units", "degrees_east")?;
        lon_var.put_attribute("standard_name", "longitude")?;
        lon_var.put(lons.view(), ..)?;

        for layer in layers {
            let mut var = file.add_variable::<f64>(&layer.name, &["lat", "lon"])?;
            var.put_attribute("_FillValue", f64::NAN)?;
            var.put_attribute("band", layer.band.as_str())?;
            var.put_attribute("statistic", layer.statistic)?;
            var.put(layer.data.view(), ..)?;
        }

        file.add_attribute("title", request.description)?;
        file.add_attribute("crs", request.crs)?;
        file.add_attribute("nominal_scale_m", request.sampling.scale)?;
        file.add_attribute("months_with_data", months as i32)?;
        file.add_attribute(
            "history",
            format!("Created by ClimNorm on {}", Utc::now().to_rfc3339()),
        )?;

        Ok(())
    }
}

impl RasterExporter for NetCDFRasterExporter {
    fn export_raster(&self, raster: &ClimatologyRaster, request: &RasterExportRequest<'_>) -> Result<()> {
        let mut target = None;
        let mut layers = Vec::new();
        for (statistic, band, grid) in raster.layers() {
            let (extent, data) = resample_to_lattice(grid, &raster.extent, request.region, &request.sampling)?;
            target = Some(extent);
            layers.push(Layer {
                name: format!("{band}_{statistic}"),
                statistic,
                band: band.to_string(),
                data,
            });
        }
        let Some(target) = target else {
            return Err(ClimNormError::export(
                self.output_path.display().to_string(),
                "raster has no layers",
            ));
        };

        self.write(&target, &layers, request, raster.months)
            .map_err(|e| ClimNormError::export(self.output_path.display().to_string(), e))?;

        info!(
            "Wrote {} raster layers ({}x{}) to {}",
            layers.len(),
            target.rows,
            target.cols,
            self.output_path.display()
        );
        Ok(())
    }
}
