//! Per-band unit conversion
//!
//! Conversions are declared explicitly per band in a [`ConversionTable`]; a band
//! without a declaration is rejected rather than guessed.

use crate::errors::{ClimNormError, Result};
use crate::snapshot::GridSnapshot;
use std::collections::BTreeMap;

/// Offset between Kelvin and degrees Celsius
pub const KELVIN_OFFSET: f64 = 273.15;

/// Millimetres per metre
pub const MILLIMETERS_PER_METER: f64 = 1000.0;

/// A pure, element-wise unit transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitConversion {
    /// Values are already in the target unit
    Identity,
    /// Kelvin to degrees Celsius
    KelvinToCelsius,
    /// Metres to millimetres
    MetersToMillimeters,
    /// `value * scale + offset`
    Linear { scale: f64, offset: f64 },
}

impl UnitConversion {
    #[must_use]
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::Identity => value,
            Self::KelvinToCelsius => value - KELVIN_OFFSET,
            Self::MetersToMillimeters => value * MILLIMETERS_PER_METER,
            Self::Linear { scale, offset } => value * scale + offset,
        }
    }
}

/// Declared conversions keyed by band name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionTable {
    conversions: BTreeMap<String, UnitConversion>,
}

impl ConversionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or replace) the conversion for a band
    #[must_use]
    pub fn with(mut self, band: &str, conversion: UnitConversion) -> Self {
        self.conversions.insert(band.to_string(), conversion);
        self
    }

    /// CHIRPS daily: precipitation is already in mm/day
    pub fn chirps_daily() -> Self {
        Self::new().with("precipitation", UnitConversion::Identity)
    }

    /// ERA5-Land monthly aggregates: Kelvin temperatures, metre precipitation
    pub fn era5_land_monthly() -> Self {
        Self::new()
            .with("temperature_2m", UnitConversion::KelvinToCelsius)
            .with("temperature_2m_min", UnitConversion::KelvinToCelsius)
            .with("temperature_2m_max", UnitConversion::KelvinToCelsius)
            .with("total_precipitation_sum", UnitConversion::MetersToMillimeters)
            .with("total_precipitation_min", UnitConversion::MetersToMillimeters)
            .with("total_precipitation_max", UnitConversion::MetersToMillimeters)
    }

    pub fn get(&self, band: &str) -> Result<UnitConversion> {
        self.conversions
            .get(band)
            .copied()
            .ok_or_else(|| ClimNormError::UnsupportedBand {
                band: band.to_string(),
            })
    }

    /// Fail fast if any requested band lacks a declaration
    pub fn check(&self, bands: &[String]) -> Result<()> {
        for band in bands {
            self.get(band)?;
        }
        Ok(())
    }

    /// Convert every band of a snapshot; NaN stays NaN
    pub fn convert(&self, snapshot: &GridSnapshot) -> Result<GridSnapshot> {
        let mut converted = snapshot.clone();
        for (band, grid) in converted.bands.iter_mut() {
            let conversion = self.get(band)?;
            if conversion != UnitConversion::Identity {
                grid.mapv_inplace(|v| conversion.apply(v));
            }
        }
        Ok(converted)
    }
}
