//! Cross-year monthly climatology
//!
//! Turns per-period reductions into twelve [`ClimatologyRecord`]s and,
//! optionally, a region-clipped [`ClimatologyRaster`]. Missing periods are
//! excluded from every count and never read as zero.

use super::operations::{PeriodReduction, Reducer, SeriesStatistics};
use super::parallel::pixelwise_statistics;
use super::spatial::{clip_to_region, RegionSampler, Sampling};
use crate::errors::Result;
use crate::grouping::{GroupBy, PeriodKey, MONTH_NAMES};
use crate::region::Region;
use crate::snapshot::{BandGrids, GridExtent};
use log::{debug, warn};
use ndarray::Array2;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// What a month's mean is divided by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DivisorPolicy {
    /// Number of years that actually have data for that month
    #[default]
    PerMonth,
    /// Number of distinct years in the whole filtered collection
    Fixed,
}

impl DivisorPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PerMonth => "per-month",
            Self::Fixed => "fixed",
        }
    }

    fn divisor(self, contributing: usize, observed_years: usize) -> Option<f64> {
        let n = match self {
            Self::PerMonth => contributing,
            Self::Fixed => observed_years,
        };
        (n > 0).then_some(n as f64)
    }
}

/// Statistic of one band for one calendar month; `None` means no data
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MonthlyStatistic {
    pub mean: Option<f64>,
    /// Population standard deviation across years
    pub std: Option<f64>,
    pub sum: Option<f64>,
    /// Years whose value for this band was finite
    pub years: usize,
}

impl MonthlyStatistic {
    #[must_use]
    pub fn missing() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.mean.is_none()
    }
}

/// Cross-year statistics for one calendar month
#[derive(Debug, Clone, PartialEq)]
pub struct ClimatologyRecord {
    pub month: u32,
    /// Years that contributed data to at least one band this month
    pub years: usize,
    /// Observed years with no data for this month; always empty for
    /// [`GroupBy::Month`], whose merged value has no per-year breakdown
    pub missing_years: Vec<i32>,
    pub bands: BTreeMap<String, MonthlyStatistic>,
}

impl ClimatologyRecord {
    #[must_use]
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }

    /// Statistic for a band; unknown bands read as missing
    #[must_use]
    pub fn statistic(&self, band: &str) -> MonthlyStatistic {
        self.bands.get(band).copied().unwrap_or_default()
    }

    /// True when no band has a value for this month
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.bands.values().all(MonthlyStatistic::is_missing)
    }
}

/// Exactly twelve records, January first
#[derive(Debug, Clone, PartialEq)]
pub struct ClimatologyTable {
    pub bands: Vec<String>,
    pub records: Vec<ClimatologyRecord>,
}

impl ClimatologyTable {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn record(&self, month: u32) -> Option<&ClimatologyRecord> {
        self.records.iter().find(|r| r.month == month)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClimatologyRecord> {
        self.records.iter()
    }

    /// Months whose every band is missing
    #[must_use]
    pub fn missing_months(&self) -> Vec<u32> {
        self.records
            .iter()
            .filter(|r| r.is_missing())
            .map(|r| r.month)
            .collect()
    }
}

/// A period reduction collapsed to one scalar per band
#[derive(Debug, Clone, PartialEq)]
pub struct RegionalReduction {
    pub key: PeriodKey,
    pub years: Vec<i32>,
    /// `None` for an empty period; a band is `None` when no sample was valid
    pub values: Option<BTreeMap<String, Option<f64>>>,
}

/// Settings shared by the table and raster climatologies
#[derive(Debug, Clone, PartialEq)]
pub struct ClimatologyOptions {
    pub group_by: GroupBy,
    pub reducer: Reducer,
    pub divisor: DivisorPolicy,
    pub bands: Vec<String>,
    /// Distinct years in the whole filtered collection
    pub observed_years: BTreeSet<i32>,
}

/// Collapse every reduction to regional scalars, in parallel
///
/// One [`RegionSampler`] is built per distinct grid extent.
pub fn collapse_reductions(
    reductions: &[PeriodReduction],
    region: &Region,
    sampling: &Sampling,
) -> Result<Vec<RegionalReduction>> {
    let mut samplers: Vec<RegionSampler> = Vec::new();
    for reduction in reductions {
        if let Some(grids) = &reduction.values {
            if !samplers.iter().any(|s| *s.extent() == grids.extent) {
                samplers.push(RegionSampler::new(&grids.extent, region, sampling)?);
            }
        }
    }
    for sampler in &samplers {
        if sampler.sample_count() == 0 {
            warn!(
                "No sample at scale {} m falls inside both the region and the grid; values will be missing",
                sampling.scale
            );
        }
    }

    Ok(reductions
        .par_iter()
        .map(|reduction| {
            let values = reduction.values.as_ref().and_then(|grids| {
                let sampler = samplers.iter().find(|s| *s.extent() == grids.extent)?;
                Some(
                    grids
                        .bands
                        .iter()
                        .map(|(band, grid)| (band.clone(), sampler.mean(grid)))
                        .collect(),
                )
            });
            RegionalReduction {
                key: reduction.key,
                years: reduction.years.clone(),
                values,
            }
        })
        .collect())
}

/// Build the twelve-month climatology from regional reductions
///
/// Per month and band, statistics run over the years with a value. With
/// [`GroupBy::Month`] each month has one merged value, so `std` is `None`.
#[must_use]
pub fn climatology(regional: &[RegionalReduction], options: &ClimatologyOptions) -> ClimatologyTable {
    let n_observed = options.observed_years.len();

    let records = (1..=12_u32)
        .map(|month| {
            let entries: Vec<&RegionalReduction> = regional
                .iter()
                .filter(|r| r.key.month == month && r.values.is_some())
                .collect();

            let mut contributing = BTreeSet::new();
            let bands = options
                .bands
                .iter()
                .map(|band| {
                    let observed: Vec<(f64, &[i32])> = entries
                        .iter()
                        .filter_map(|r| {
                            let value = r.values.as_ref()?.get(band).copied().flatten()?;
                            value.is_finite().then_some((value, r.years.as_slice()))
                        })
                        .collect();
                    let band_years: BTreeSet<i32> =
                        observed.iter().flat_map(|(_, years)| years.iter().copied()).collect();
                    contributing.extend(band_years.iter().copied());

                    let values: Vec<f64> = observed.iter().map(|(v, _)| *v).collect();
                    let statistic = match options.group_by {
                        GroupBy::YearMonth => year_month_statistic(&values, options.divisor, n_observed),
                        GroupBy::Month => merged_statistic(
                            values.first().copied(),
                            options.reducer,
                            options.divisor,
                            band_years.len(),
                            n_observed,
                        ),
                    };
                    (band.clone(), statistic)
                })
                .collect();

            let missing_years = match options.group_by {
                GroupBy::YearMonth => options
                    .observed_years
                    .difference(&contributing)
                    .copied()
                    .collect(),
                GroupBy::Month => Vec::new(),
            };

            ClimatologyRecord {
                month,
                years: contributing.len(),
                missing_years,
                bands,
            }
        })
        .collect();

    let table = ClimatologyTable {
        bands: options.bands.clone(),
        records,
    };
    debug!("Climatology built, missing months: {:?}", table.missing_months());
    table
}

fn year_month_statistic(values: &[f64], divisor: DivisorPolicy, n_observed: usize) -> MonthlyStatistic {
    let Some(stats) = SeriesStatistics::from_values(values.iter().copied()) else {
        return MonthlyStatistic::missing();
    };
    MonthlyStatistic {
        mean: divisor.divisor(stats.count, n_observed).map(|d| stats.sum / d),
        std: Some(stats.std),
        sum: Some(stats.sum),
        years: stats.count,
    }
}

fn merged_statistic(
    value: Option<f64>,
    reducer: Reducer,
    divisor: DivisorPolicy,
    contributing_years: usize,
    n_observed: usize,
) -> MonthlyStatistic {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return MonthlyStatistic::missing();
    };
    let mean = match reducer {
        Reducer::Sum => divisor.divisor(contributing_years, n_observed).map(|d| value / d),
        Reducer::Mean => Some(value),
    };
    MonthlyStatistic {
        mean,
        std: None,
        sum: Some(value),
        years: contributing_years,
    }
}

/// Per-pixel aggregate of the twelve monthly climatology grids
#[derive(Debug, Clone, PartialEq)]
pub struct ClimatologyRaster {
    pub extent: GridExtent,
    /// Mean across months of the monthly climatology
    pub mean: BandGrids,
    /// Population standard deviation across months
    pub std: BandGrids,
    /// Sum across months, e.g. the annual total for precipitation
    pub sum: BandGrids,
    /// Months that had data
    pub months: usize,
}

impl ClimatologyRaster {
    /// Grids in export order as `(statistic, band, grid)`
    pub fn layers(&self) -> impl Iterator<Item = (&'static str, &str, &Array2<f64>)> {
        let mean = self.mean.iter().map(|(b, g)| ("mean", b.as_str(), g));
        let std = self.std.iter().map(|(b, g)| ("std", b.as_str(), g));
        let sum = self.sum.iter().map(|(b, g)| ("sum", b.as_str(), g));
        mean.chain(std).chain(sum)
    }
}

/// Pixel-wise climatology across all months, clipped to `region`
///
/// Each month's grid is the cross-year mean of that month's reductions
/// (divided per `options.divisor`); the twelve monthly grids are then
/// aggregated per pixel. Returns `None` when no period has data.
pub fn climatology_raster(
    reductions: &[PeriodReduction],
    region: &Region,
    options: &ClimatologyOptions,
) -> Result<Option<ClimatologyRaster>> {
    let Some(extent) = reductions.iter().find_map(|r| r.values.as_ref().map(|v| v.extent)) else {
        return Ok(None);
    };
    let n_observed = options.observed_years.len();

    let mut monthly: BTreeMap<String, Vec<Array2<f64>>> = BTreeMap::new();
    for month in 1..=12_u32 {
        let present: Vec<&PeriodReduction> = reductions
            .iter()
            .filter(|r| r.key.month == month && r.values.is_some())
            .collect();
        if present.is_empty() {
            continue;
        }
        let contributing: BTreeSet<i32> = present.iter().flat_map(|r| r.years.iter().copied()).collect();

        for band in &options.bands {
            let grids: Vec<&Array2<f64>> = present
                .iter()
                .filter_map(|r| r.values.as_ref()?.bands.get(band))
                .collect();
            let Some(stats) = pixelwise_statistics(band, &grids)? else {
                continue;
            };

            let grid = match (options.group_by, options.reducer) {
                (GroupBy::Month, Reducer::Mean) => stats.sum,
                (GroupBy::YearMonth, _) if options.divisor == DivisorPolicy::PerMonth => stats.mean,
                (GroupBy::YearMonth, _) => match options.divisor.divisor(grids.len(), n_observed) {
                    Some(d) => stats.sum.mapv(|v| v / d),
                    None => continue,
                },
                (GroupBy::Month, Reducer::Sum) => {
                    match options.divisor.divisor(contributing.len(), n_observed) {
                        Some(d) => stats.sum.mapv(|v| v / d),
                        None => continue,
                    }
                }
            };
            monthly.entry(band.clone()).or_default().push(grid);
        }
    }

    let mut raster = ClimatologyRaster {
        extent,
        mean: BandGrids::new(),
        std: BandGrids::new(),
        sum: BandGrids::new(),
        months: 0,
    };
    for (band, grids) in &monthly {
        let refs: Vec<&Array2<f64>> = grids.iter().collect();
        if let Some(stats) = pixelwise_statistics(band, &refs)? {
            raster.months = raster.months.max(grids.len());
            raster.mean.insert(band.clone(), clip_to_region(&stats.mean, &extent, region));
            raster.std.insert(band.clone(), clip_to_region(&stats.std, &extent, region));
            raster.sum.insert(band.clone(), clip_to_region(&stats.sum, &extent, region));
        }
    }

    Ok((raster.months > 0).then_some(raster))
}
