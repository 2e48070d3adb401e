//! ClimNorm: monthly climatologies of gridded precipitation and temperature
//!
//! ClimNorm turns a time series of gridded snapshots (daily or monthly
//! rasters of precipitation and temperature) into a twelve-row table of
//! monthly climatological statistics over a region of interest, and
//! optionally a region-clipped raster of mean, standard deviation and sum
//! across the twelve monthly climatology grids.
//!
//! ## Key Features
//!
//! - **Calendar grouping**: by calendar month, or by (year, month) pair
//! - **Parallel reductions**: per-group and pixel-wise kernels on Rayon
//! - **Regional statistics**: unweighted mean over a scale lattice clipped to the region
//! - **Explicit missing data**: months without observations stay in the table as missing
//! - **NetCDF & CSV**: read CF-style NetCDF inputs, write CSV tables and NetCDF rasters
//!
//! ## Module Organization
//!
//! - [`snapshot`]: grid extents and time-stamped multi-band snapshots
//! - [`region`]: polygon regions of interest, including GeoJSON input
//! - [`units`]: per-band unit conversions
//! - [`grouping`]: calendar grouping of snapshots
//! - [`statistics`]: temporal reductions, spatial collapse and the climatology
//! - [`data_source`]: raster sources (in-memory and NetCDF)
//! - [`export`]: table export and the raster exporter seam
//! - [`netcdf_io`]: NetCDF raster export
//! - [`pipeline`]: end-to-end run driven by a [`PipelineConfig`]
//! - [`parallel`]: parallel processing configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use clim_norm::prelude::*;
//! use chrono::NaiveDate;
//!
//! let start = NaiveDate::from_ymd_opt(1991, 1, 1).unwrap();
//! let end = NaiveDate::from_ymd_opt(2020, 12, 31).unwrap();
//! let config = PipelineConfig::chirps_daily(start, end);
//!
//! let source = NetCDFRasterSource::new().with_dataset(&config.dataset, "chirps_daily.nc");
//! let region = Region::from_geojson_file("pampa.geojson".as_ref()).unwrap();
//!
//! let output = run_with_source(&config, &source, &region).unwrap();
//! for record in output.table.iter() {
//!     println!("{} {:?}", record.month_name(), record.statistic("precipitation").mean);
//! }
//! ```

// Core modules
pub mod data_source;
pub mod errors;
pub mod export;
pub mod grouping;
pub mod netcdf_io;
pub mod parallel;
pub mod pipeline;
pub mod region;
pub mod snapshot;
pub mod statistics;
pub mod units;

// Direct re-exports for the public API
pub use data_source::{decode_time, InMemoryRasterSource, NetCDFRasterSource, RasterSource};
pub use errors::{ClimNormError, Result};
pub use export::{
    table_header, table_rows, CsvTableExporter, RasterExportRequest, RasterExporter, TableExporter,
    MISSING_MARKER,
};
pub use grouping::{group, observed_years, validate_range, GroupBy, PeriodGroup, PeriodKey, MONTH_NAMES};
pub use netcdf_io::NetCDFRasterExporter;
pub use parallel::{get_parallel_info, ParallelConfig, ParallelInfo};
pub use pipeline::{export, run, run_with_source, ClimatologyOutput, PipelineConfig};
pub use region::Region;
pub use snapshot::{BandGrids, GridExtent, GridSnapshot};
pub use statistics::{
    climatology, climatology_raster, collapse_reductions, reduce_groups, ClimatologyOptions,
    ClimatologyRaster, ClimatologyRecord, ClimatologyTable, DivisorPolicy, MonthlyStatistic,
    PeriodReduction, Reducer, RegionalReduction, Sampling, DEFAULT_MAX_PIXELS,
};
pub use units::{ConversionTable, UnitConversion};

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::data_source::{InMemoryRasterSource, NetCDFRasterSource, RasterSource};
    pub use crate::errors::{ClimNormError, Result};
    pub use crate::export::{CsvTableExporter, RasterExporter, TableExporter};
    pub use crate::grouping::GroupBy;
    pub use crate::netcdf_io::NetCDFRasterExporter;
    pub use crate::parallel::ParallelConfig;
    pub use crate::pipeline::{run, run_with_source, ClimatologyOutput, PipelineConfig};
    pub use crate::region::Region;
    pub use crate::snapshot::{GridExtent, GridSnapshot};
    pub use crate::statistics::{ClimatologyTable, DivisorPolicy, Reducer, StatisticalReduction};
    pub use crate::units::{ConversionTable, UnitConversion};
}
