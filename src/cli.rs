//! Defines command-line interface options using `clap` for the ClimNorm application.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Monthly climatology of a gridded precipitation/temperature dataset
#[derive(Parser, Debug)]
#[command(
    version,
    name = "climnorm",
    about = "Compute monthly climatological statistics of a gridded dataset over a region"
)]
pub struct Args {
    /// Path to the NetCDF file holding the dataset
    #[arg(short, long)]
    pub file: PathBuf,

    /// GeoJSON file with the region polygon(s)
    #[arg(short, long)]
    pub region: PathBuf,

    /// Dataset preset providing bands, unit conversions, reducer and scale
    #[arg(long, value_enum, default_value_t = Preset::Chirps)]
    pub preset: Preset,

    /// Dataset identifier; defaults to the preset's
    #[arg(long)]
    pub dataset: Option<String>,

    /// Comma-separated bands to keep; defaults to the preset's
    #[arg(long, value_delimiter = ',')]
    pub bands: Vec<String>,

    /// First day of the period, YYYY-MM-DD
    #[arg(long, value_parser = parse_date)]
    pub start: chrono::NaiveDate,

    /// Last day of the period (inclusive), YYYY-MM-DD
    #[arg(long, value_parser = parse_date)]
    pub end: chrono::NaiveDate,

    /// Calendar grouping; defaults to the preset's
    #[arg(long, value_enum)]
    pub group_by: Option<GroupByArg>,

    /// Temporal reducer; defaults to the preset's
    #[arg(long, value_enum)]
    pub reducer: Option<ReducerArg>,

    /// Divisor used for monthly means
    #[arg(long, value_enum, default_value_t = DivisorArg::PerMonth)]
    pub divisor: DivisorArg,

    /// Nominal resolution in metres for the regional mean; defaults to the preset's
    #[arg(long)]
    pub scale: Option<f64>,

    /// Pixel ceiling for sampling lattices
    #[arg(long)]
    pub max_pixels: Option<u64>,

    /// Directory to write the climatology CSV into
    #[arg(long)]
    pub output_csv: Option<PathBuf>,

    /// Path to write the all-months climatology raster as NetCDF
    #[arg(long)]
    pub output_netcdf: Option<PathBuf>,

    /// Coordinate reference system recorded in the raster
    #[arg(long, default_value = "EPSG:4326")]
    pub crs: String,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// CHIRPS daily precipitation (mm/day)
    Chirps,
    /// ERA5-Land monthly aggregates (K and m, converted to degC and mm)
    Era5Land,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupByArg {
    Month,
    YearMonth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReducerArg {
    Sum,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DivisorArg {
    PerMonth,
    Fixed,
}

fn parse_date(s: &str) -> Result<chrono::NaiveDate, String> {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("Invalid date '{}': expected YYYY-MM-DD ({})", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "climnorm",
            "--file",
            "chirps.nc",
            "--region",
            "pampa.geojson",
            "--start",
            "1991-01-01",
            "--end",
            "2020-12-31",
            "--bands",
            "precipitation,other",
            "--group-by",
            "year-month",
            "--divisor",
            "fixed",
        ])
        .unwrap();
        assert_eq!(args.preset, Preset::Chirps);
        assert_eq!(args.bands, vec!["precipitation", "other"]);
        assert_eq!(args.group_by, Some(GroupByArg::YearMonth));
        assert_eq!(args.divisor, DivisorArg::Fixed);
        assert_eq!(args.crs, "EPSG:4326");
    }

    #[test]
    fn test_bad_date_rejected() {
        assert!(parse_date("2020-13-01").is_err());
        assert!(parse_date("2020-02-29").is_ok());
    }
}
