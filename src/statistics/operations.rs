//! Core reduction types and the per-group temporal reduction
//!
//! Each [`PeriodGroup`] reduces to one [`PeriodReduction`]. Groups are
//! independent and are reduced in parallel on the rayon pool.

use super::parallel::pixelwise_reduce;
use crate::errors::Result;
use crate::grouping::{PeriodGroup, PeriodKey};
use crate::snapshot::{BandGrids, GridExtent};
use log::debug;
use rayon::prelude::*;

/// Supported temporal reducers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    /// Sum of values
    Sum,
    /// Arithmetic mean
    Mean,
}

impl Reducer {
    /// Get the string representation of the reducer
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
        }
    }

    /// Final value from an accumulated sum and a non-zero count
    #[must_use]
    pub fn finish(self, sum: f64, count: usize) -> f64 {
        match self {
            Self::Sum => sum,
            Self::Mean => sum / count as f64,
        }
    }
}

/// Summary of a set of scalar values, missing values excluded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStatistics {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
}

impl SeriesStatistics {
    /// Statistics over the finite values, or `None` if there are none
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let sum: f64 = values.iter().sum();
        let mean = sum / count as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        Some(Self {
            count,
            sum,
            mean,
            std: variance.sqrt(),
        })
    }
}

/// Band grids of a non-empty reduction plus the extent they cover
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedGrids {
    pub extent: GridExtent,
    pub bands: BandGrids,
}

/// Result of reducing one [`PeriodGroup`]
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodReduction {
    pub key: PeriodKey,
    pub member_count: usize,
    /// Distinct years among the group's members, ascending
    pub years: Vec<i32>,
    /// `None` when the group had no snapshots
    pub values: Option<ReducedGrids>,
}

impl PeriodReduction {
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.values.is_none()
    }
}

/// Types that can be reduced pixel-wise over time
pub trait StatisticalReduction {
    /// Reduce all members with `reducer`
    ///
    /// # Errors
    ///
    /// Returns an error if members disagree on band names or grid shapes.
    fn reduce_pixelwise(&self, reducer: Reducer) -> Result<PeriodReduction>;
}

impl StatisticalReduction for PeriodGroup<'_> {
    fn reduce_pixelwise(&self, reducer: Reducer) -> Result<PeriodReduction> {
        let years = self.years().into_iter().collect();
        let Some(first) = self.members.first() else {
            return Ok(PeriodReduction {
                key: self.key,
                member_count: 0,
                years,
                values: None,
            });
        };

        let mut bands = BandGrids::new();
        for band in first.bands.keys() {
            let grids = self
                .members
                .iter()
                .map(|s| s.band(band))
                .collect::<Result<Vec<_>>>()?;
            if let Some(reduced) = pixelwise_reduce(band, &grids, reducer)? {
                bands.insert(band.clone(), reduced);
            }
        }

        Ok(PeriodReduction {
            key: self.key,
            member_count: self.members.len(),
            years,
            values: Some(ReducedGrids {
                extent: first.extent,
                bands,
            }),
        })
    }
}

/// Reduce every group in parallel, preserving group order
///
/// # Errors
///
/// Propagates the first reduction error.
pub fn reduce_groups(groups: &[PeriodGroup<'_>], reducer: Reducer) -> Result<Vec<PeriodReduction>> {
    debug!(
        "Reducing {} groups with {} across {} threads",
        groups.len(),
        reducer.as_str(),
        rayon::current_num_threads()
    );

    groups
        .par_iter()
        .map(|group| group.reduce_pixelwise(reducer))
        .collect()
}
