//! Parallel pixel-wise kernels
//!
//! Every kernel skips non-finite inputs; a pixel with no finite input comes out
//! as NaN rather than zero.

use super::operations::Reducer;
use crate::errors::{ClimNormError, Result};
use ndarray::{Array2, Zip};

/// Running sum and count of finite values per pixel
struct Accumulator {
    sum: Array2<f64>,
    count: Array2<u32>,
}

impl Accumulator {
    fn new(shape: (usize, usize)) -> Self {
        Self {
            sum: Array2::zeros(shape),
            count: Array2::zeros(shape),
        }
    }

    fn add(&mut self, band: &str, grid: &Array2<f64>) -> Result<()> {
        check_shape(band, self.sum.dim(), grid)?;
        Zip::from(&mut self.sum)
            .and(&mut self.count)
            .and(grid)
            .par_for_each(|sum, count, &value| {
                if value.is_finite() {
                    *sum += value;
                    *count += 1;
                }
            });
        Ok(())
    }
}

fn check_shape(band: &str, expected: (usize, usize), grid: &Array2<f64>) -> Result<()> {
    if grid.dim() != expected {
        return Err(ClimNormError::ShapeMismatch {
            band: band.to_string(),
            expected,
            found: grid.dim(),
        });
    }
    Ok(())
}

/// Reduces a stack of grids pixel by pixel with `reducer`
///
/// Returns `None` for an empty stack.
///
/// # Errors
///
/// Returns [`ClimNormError::ShapeMismatch`] if the grids differ in shape.
pub fn pixelwise_reduce(band: &str, grids: &[&Array2<f64>], reducer: Reducer) -> Result<Option<Array2<f64>>> {
    let Some(first) = grids.first() else {
        return Ok(None);
    };

    let mut acc = Accumulator::new(first.dim());
    for grid in grids {
        acc.add(band, grid)?;
    }

    let result = Zip::from(&acc.sum)
        .and(&acc.count)
        .par_map_collect(|&sum, &count| {
            if count == 0 {
                f64::NAN
            } else {
                reducer.finish(sum, count as usize)
            }
        });
    Ok(Some(result))
}

/// Per-pixel sum, mean and population standard deviation across grids
#[derive(Debug, Clone)]
pub struct PixelStatistics {
    pub sum: Array2<f64>,
    pub mean: Array2<f64>,
    pub std: Array2<f64>,
    pub count: Array2<u32>,
}

/// Computes [`PixelStatistics`] across a stack of grids
///
/// # Errors
///
/// Returns [`ClimNormError::ShapeMismatch`] if the grids differ in shape.
pub fn pixelwise_statistics(band: &str, grids: &[&Array2<f64>]) -> Result<Option<PixelStatistics>> {
    let Some(first) = grids.first() else {
        return Ok(None);
    };

    let mut acc = Accumulator::new(first.dim());
    for grid in grids {
        acc.add(band, grid)?;
    }

    let mean = Zip::from(&acc.sum)
        .and(&acc.count)
        .par_map_collect(|&sum, &count| if count == 0 { f64::NAN } else { sum / f64::from(count) });

    let mut squares = Array2::<f64>::zeros(first.dim());
    for grid in grids {
        Zip::from(&mut squares)
            .and(&mean)
            .and(*grid)
            .par_for_each(|sq, &m, &value| {
                if value.is_finite() {
                    *sq += (value - m).powi(2);
                }
            });
    }

    let std = Zip::from(&squares)
        .and(&acc.count)
        .par_map_collect(|&sq, &count| if count == 0 { f64::NAN } else { (sq / f64::from(count)).sqrt() });

    let sum = Zip::from(&acc.sum)
        .and(&acc.count)
        .par_map_collect(|&sum, &count| if count == 0 { f64::NAN } else { sum });

    Ok(Some(PixelStatistics {
        sum,
        mean,
        std,
        count: acc.count,
    }))
}
