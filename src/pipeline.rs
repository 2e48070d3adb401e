//! End-to-end climatology run
//!
//! `select bands → convert units → group → reduce → collapse → climatology`,
//! with every parameter carried by an explicit [`PipelineConfig`].

use crate::data_source::RasterSource;
use crate::errors::Result;
use crate::export::{RasterExportRequest, RasterExporter, TableExporter};
use crate::grouping::{self, validate_range, GroupBy};
use crate::region::Region;
use crate::snapshot::GridSnapshot;
use crate::statistics::{
    climatology, climatology_raster, collapse_reductions, reduce_groups, ClimatologyOptions,
    ClimatologyRaster, ClimatologyTable, DivisorPolicy, PeriodReduction, Reducer, Sampling,
    DEFAULT_MAX_PIXELS,
};
use crate::units::ConversionTable;
use chrono::NaiveDate;
use log::info;

/// Inputs of one run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Dataset identifier passed to the raster source
    pub dataset: String,
    /// Bands to keep; each must be declared in `conversions`
    pub bands: Vec<String>,
    pub conversions: ConversionTable,
    pub start: NaiveDate,
    /// Inclusive
    pub end: NaiveDate,
    pub group_by: GroupBy,
    pub reducer: Reducer,
    pub divisor: DivisorPolicy,
    /// Nominal resolution in metres for the regional mean
    pub scale: f64,
    pub max_pixels: u64,
    /// Build the all-months raster as well as the table
    pub raster: bool,
    /// Prefix for export file names
    pub output_prefix: String,
}

impl PipelineConfig {
    /// Configuration with no defaults for the required inputs
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dataset: &str,
        bands: &[&str],
        conversions: ConversionTable,
        start: NaiveDate,
        end: NaiveDate,
        group_by: GroupBy,
        reducer: Reducer,
        scale: f64,
    ) -> Self {
        Self {
            dataset: dataset.to_string(),
            bands: bands.iter().map(|b| b.to_string()).collect(),
            conversions,
            start,
            end,
            group_by,
            reducer,
            divisor: DivisorPolicy::PerMonth,
            scale,
            max_pixels: DEFAULT_MAX_PIXELS,
            raster: false,
            output_prefix: "climatology".to_string(),
        }
    }

    /// CHIRPS daily precipitation: monthly totals per year, averaged across years
    pub fn chirps_daily(start: NaiveDate, end: NaiveDate) -> Self {
        let mut config = Self::new(
            "UCSB-CHG/CHIRPS/DAILY",
            &["precipitation"],
            ConversionTable::chirps_daily(),
            start,
            end,
            GroupBy::YearMonth,
            Reducer::Sum,
            5566.0,
        );
        config.output_prefix = "precip_CHIRPS".to_string();
        config
    }

    /// ERA5-Land monthly aggregates: mean per calendar month
    pub fn era5_land_monthly(start: NaiveDate, end: NaiveDate) -> Self {
        let mut config = Self::new(
            "ECMWF/ERA5_LAND/MONTHLY_AGGR",
            &[
                "total_precipitation_sum",
                "total_precipitation_min",
                "total_precipitation_max",
                "temperature_2m",
                "temperature_2m_min",
                "temperature_2m_max",
            ],
            ConversionTable::era5_land_monthly(),
            start,
            end,
            GroupBy::YearMonth,
            Reducer::Mean,
            11132.0,
        );
        config.output_prefix = "precip_temp_ERA5".to_string();
        config
    }

    #[must_use]
    pub fn with_divisor(mut self, divisor: DivisorPolicy) -> Self {
        self.divisor = divisor;
        self
    }

    #[must_use]
    pub fn with_raster(mut self, raster: bool) -> Self {
        self.raster = raster;
        self
    }

    #[must_use]
    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    /// Export description, e.g. `precip_CHIRPS_1991-01-01_2020-12-31`
    #[must_use]
    pub fn description(&self) -> String {
        format!("{}_{}_{}", self.output_prefix, self.start, self.end)
    }

    /// Fail fast on inputs that make the run meaningless
    pub fn validate(&self) -> Result<Sampling> {
        validate_range(self.start, self.end)?;
        self.conversions.check(&self.bands)?;
        Sampling::new(self.scale, self.max_pixels)
    }
}

/// Everything one run produces
#[derive(Debug, Clone, PartialEq)]
pub struct ClimatologyOutput {
    pub table: ClimatologyTable,
    pub raster: Option<ClimatologyRaster>,
    /// Per-period reductions, kept for inspection
    pub reductions: Vec<PeriodReduction>,
    /// Snapshots that survived band selection and filtering
    pub snapshot_count: usize,
}

/// Run the pipeline on snapshots already in memory
///
/// # Errors
///
/// Validation errors (`InvalidRange`, `UnsupportedBand`, `BandNotFound`,
/// `InvalidScale`) abort before any reduction. Months without data never
/// error; they show up as missing statistics in the table.
pub fn run(config: &PipelineConfig, snapshots: &[GridSnapshot], region: &Region) -> Result<ClimatologyOutput> {
    let sampling = config.validate()?;

    let prepared = snapshots
        .iter()
        .filter(|s| s.date >= config.start && s.date <= config.end)
        .map(|s| config.conversions.convert(&s.select(&config.bands)?))
        .collect::<Result<Vec<_>>>()?;

    let groups = grouping::group(&prepared, region, config.start, config.end, config.group_by)?;
    let observed_years = grouping::observed_years(&groups);
    let snapshot_count: usize = groups.iter().map(|g| g.len()).sum();
    info!(
        "Grouped {} snapshots into {} {} groups over {} years",
        snapshot_count,
        groups.len(),
        config.group_by.as_str(),
        observed_years.len()
    );

    let reductions = reduce_groups(&groups, config.reducer)?;
    let regional = collapse_reductions(&reductions, region, &sampling)?;

    let options = ClimatologyOptions {
        group_by: config.group_by,
        reducer: config.reducer,
        divisor: config.divisor,
        bands: config.bands.clone(),
        observed_years,
    };
    let table = climatology(&regional, &options);
    let raster = if config.raster {
        climatology_raster(&reductions, region, &options)?
    } else {
        None
    };

    Ok(ClimatologyOutput {
        table,
        raster,
        reductions,
        snapshot_count,
    })
}

/// Fetch from a raster source, then [`run`]
pub fn run_with_source(
    config: &PipelineConfig,
    source: &dyn RasterSource,
    region: &Region,
) -> Result<ClimatologyOutput> {
    config.validate()?;
    let snapshots = source.fetch(&config.dataset, region, config.start, config.end)?;
    info!("Fetched {} snapshots of '{}'", snapshots.len(), config.dataset);
    run(config, &snapshots, region)
}

/// Hand the results to the export collaborators
pub fn export(
    config: &PipelineConfig,
    output: &ClimatologyOutput,
    region: &Region,
    table_exporter: Option<&dyn TableExporter>,
    raster_exporter: Option<(&dyn RasterExporter, &str)>,
) -> Result<()> {
    let description = config.description();
    if let Some(exporter) = table_exporter {
        exporter.export_table(&output.table, &description)?;
    }
    if let (Some((exporter, crs)), Some(raster)) = (raster_exporter, &output.raster) {
        let request = RasterExportRequest {
            region,
            sampling: config.validate()?,
            crs,
            description: &description,
        };
        exporter.export_raster(raster, &request)?;
    }
    Ok(())
}
