//! Temporal and spatial reductions behind the monthly climatology
//!
//! # Organization
//!
//! This module is organized into submodules:
//! - [`operations`]: reducers, per-group reduction and series statistics
//! - [`parallel`]: pixel-wise kernels running on the rayon pool
//! - [`spatial`]: collapsing grids to a region at a nominal scale
//! - [`climatology`]: cross-year monthly statistics and the summary raster

pub mod climatology;
pub mod operations;
pub mod parallel;
pub mod spatial;

// Re-export the main types and functions for convenience
pub use climatology::{
    climatology, climatology_raster, collapse_reductions, ClimatologyOptions, ClimatologyRaster,
    ClimatologyRecord, ClimatologyTable, DivisorPolicy, MonthlyStatistic, RegionalReduction,
};
pub use operations::{
    reduce_groups, PeriodReduction, ReducedGrids, Reducer, SeriesStatistics, StatisticalReduction,
};
pub use parallel::{pixelwise_reduce, pixelwise_statistics, PixelStatistics};
pub use spatial::{
    clip_to_region, collapse_to_region, resample_to_lattice, RegionSampler, Sampling, SamplingLattice,
    DEFAULT_MAX_PIXELS, METERS_PER_DEGREE,
};
