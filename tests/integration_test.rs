//! End-to-end climatology runs over synthetic snapshot series

use approx::assert_relative_eq;
use chrono::NaiveDate;
use clim_norm::{
    export, run, run_with_source, BandGrids, ClimNormError, ConversionTable, CsvTableExporter,
    DivisorPolicy, GridExtent, GridSnapshot, GroupBy, InMemoryRasterSource, PipelineConfig, Reducer,
    Region, TableExporter, UnitConversion,
};
use ndarray::Array2;
use tempfile::tempdir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// 4x4 one-degree cells over south-eastern South America
fn extent() -> GridExtent {
    GridExtent::new(-56.0, -28.0, 1.0, 1.0, 4, 4)
}

fn full_region() -> Region {
    Region::from_extent(&extent()).unwrap()
}

fn daily(start: NaiveDate, end: NaiveDate, value: f64) -> Vec<GridSnapshot> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|d| GridSnapshot::uniform(d, extent(), &["precipitation"], value))
        .collect()
}

// Half a degree: a 4x4 grid is read by an 8x8 lattice
fn precip_config(start: NaiveDate, end: NaiveDate, group_by: GroupBy, reducer: Reducer) -> PipelineConfig {
    PipelineConfig::new(
        "synthetic",
        &["precipitation"],
        ConversionTable::chirps_daily(),
        start,
        end,
        group_by,
        reducer,
        55_660.0,
    )
}

#[test]
fn test_thirty_year_daily_totals() {
    let (start, end) = (date(1991, 1, 1), date(2020, 12, 31));
    let snapshots = daily(start, end, 1.0);
    let config = precip_config(start, end, GroupBy::YearMonth, Reducer::Sum);

    let output = run(&config, &snapshots, &full_region()).unwrap();
    assert_eq!(output.table.len(), 12);
    assert_eq!(output.snapshot_count, snapshots.len());
    assert_eq!(output.reductions.len(), 360);

    let jan = output.table.record(1).unwrap().statistic("precipitation");
    assert_relative_eq!(jan.mean.unwrap(), 31.0, epsilon = 1e-9);
    assert_relative_eq!(jan.std.unwrap(), 0.0, epsilon = 1e-9);

    // 22 years of 28 days and 8 leap years of 29
    let feb = output.table.record(2).unwrap();
    assert_eq!(feb.years, 30);
    let feb = feb.statistic("precipitation");
    assert_relative_eq!(feb.mean.unwrap(), (22.0 * 28.0 + 8.0 * 29.0) / 30.0, epsilon = 1e-9);
    assert!(feb.std.unwrap() > 0.0);
    assert_relative_eq!(feb.sum.unwrap(), 22.0 * 28.0 + 8.0 * 29.0, epsilon = 1e-9);

    for record in output.table.iter() {
        assert!(record.missing_years.is_empty());
    }
}

#[test]
fn test_small_regions_are_not_missing() {
    let (start, end) = (date(2000, 1, 1), date(2000, 12, 31));
    let snapshots = daily(start, end, 1.0);
    let mut config = precip_config(start, end, GroupBy::YearMonth, Reducer::Sum);
    config.scale = 5566.0;

    for region in [
        Region::rectangle(-55.50, -28.52, -55.48, -28.50).unwrap(),
        Region::rectangle(-56.0, -28.52, -55.0, -28.50).unwrap(),
    ] {
        let output = run(&config, &snapshots, &region).unwrap();
        assert!(output.table.missing_months().is_empty());
        let jan = output.table.record(1).unwrap();
        assert_eq!(jan.years, 1);
        assert_relative_eq!(jan.statistic("precipitation").mean.unwrap(), 31.0, epsilon = 1e-9);
    }
}

#[test]
fn test_missing_month_is_not_zero() {
    let (start, end) = (date(1999, 1, 1), date(2000, 12, 31));
    let snapshots: Vec<GridSnapshot> = daily(start, end, 1.0)
        .into_iter()
        .filter(|s| s.date >= date(1999, 2, 1))
        .collect();

    let per_month = precip_config(start, end, GroupBy::YearMonth, Reducer::Sum);
    let output = run(&per_month, &snapshots, &full_region()).unwrap();

    let jan = output.table.record(1).unwrap();
    assert_eq!(jan.years, 1);
    assert_eq!(jan.missing_years, vec![1999]);
    let stat = jan.statistic("precipitation");
    assert_relative_eq!(stat.mean.unwrap(), 31.0, epsilon = 1e-9);
    assert_relative_eq!(stat.std.unwrap(), 0.0, epsilon = 1e-9);

    let feb = output.table.record(2).unwrap().statistic("precipitation");
    assert_relative_eq!(feb.mean.unwrap(), 28.5, epsilon = 1e-9);

    // A fixed divisor counts 1999 for January even though it has no data
    let fixed = per_month.clone().with_divisor(DivisorPolicy::Fixed);
    let output = run(&fixed, &snapshots, &full_region()).unwrap();
    let jan = output.table.record(1).unwrap().statistic("precipitation");
    assert_relative_eq!(jan.mean.unwrap(), 15.5, epsilon = 1e-9);
    let feb = output.table.record(2).unwrap().statistic("precipitation");
    assert_relative_eq!(feb.mean.unwrap(), 28.5, epsilon = 1e-9);
}

#[test]
fn test_empty_collection_gives_twelve_missing_rows() {
    let (start, end) = (date(2000, 1, 1), date(2000, 12, 31));
    let config = precip_config(start, end, GroupBy::YearMonth, Reducer::Sum);

    let output = run(&config, &[], &full_region()).unwrap();
    assert_eq!(output.table.len(), 12);
    assert_eq!(output.table.missing_months(), (1..=12).collect::<Vec<u32>>());
    assert!(output.reductions.is_empty());
    assert_eq!(output.snapshot_count, 0);
}

#[test]
fn test_region_outside_grid_gives_missing_rows() {
    let (start, end) = (date(2000, 1, 1), date(2000, 3, 31));
    let snapshots = daily(start, end, 1.0);
    let config = precip_config(start, end, GroupBy::YearMonth, Reducer::Sum);
    let far_away = Region::rectangle(10.0, 10.0, 12.0, 12.0).unwrap();

    let output = run(&config, &snapshots, &far_away).unwrap();
    assert_eq!(output.table.missing_months().len(), 12);
}

#[test]
fn test_calendar_month_grouping() {
    let (start, end) = (date(1999, 1, 1), date(2000, 12, 31));
    let snapshots = daily(start, end, 1.0);

    let sum = precip_config(start, end, GroupBy::Month, Reducer::Sum);
    let output = run(&sum, &snapshots, &full_region()).unwrap();
    assert_eq!(output.reductions.len(), 12);
    let jan = output.table.record(1).unwrap();
    assert_eq!(jan.years, 2);
    let stat = jan.statistic("precipitation");
    assert_relative_eq!(stat.sum.unwrap(), 62.0, epsilon = 1e-9);
    assert_relative_eq!(stat.mean.unwrap(), 31.0, epsilon = 1e-9);
    assert!(stat.std.is_none());

    let mean = precip_config(start, end, GroupBy::Month, Reducer::Mean);
    let output = run(&mean, &snapshots, &full_region()).unwrap();
    let stat = output.table.record(7).unwrap().statistic("precipitation");
    assert_relative_eq!(stat.mean.unwrap(), 1.0, epsilon = 1e-12);
}

#[test]
fn test_era5_monthly_conversions() {
    let (start, end) = (date(2010, 1, 1), date(2011, 12, 31));
    let config = PipelineConfig::era5_land_monthly(start, end);
    let snapshots: Vec<GridSnapshot> = (2010..=2011)
        .flat_map(|y| (1..=12).map(move |m| date(y, m, 1)))
        .map(|d| {
            let bands: BandGrids = config
                .bands
                .iter()
                .map(|band| {
                    let value = if band.starts_with("temperature") { 293.15 } else { 0.1 };
                    (band.clone(), Array2::from_elem(extent().shape(), value))
                })
                .collect();
            GridSnapshot::new(d, extent(), bands).unwrap()
        })
        .collect();

    let output = run(&config, &snapshots, &full_region()).unwrap();
    for record in output.table.iter() {
        assert_eq!(record.years, 2);
        assert_relative_eq!(record.statistic("temperature_2m").mean.unwrap(), 20.0, epsilon = 1e-9);
        assert_relative_eq!(
            record.statistic("total_precipitation_sum").mean.unwrap(),
            100.0,
            epsilon = 1e-9
        );
    }
    assert_eq!(config.description(), "precip_temp_ERA5_2010-01-01_2011-12-31");
}

#[test]
fn test_validation_errors() {
    let (start, end) = (date(2000, 1, 1), date(2000, 12, 31));
    let snapshots = daily(start, end, 1.0);
    let region = full_region();

    let inverted = precip_config(end, start, GroupBy::YearMonth, Reducer::Sum);
    assert!(matches!(
        run(&inverted, &snapshots, &region),
        Err(ClimNormError::InvalidRange { .. })
    ));

    let mut undeclared = precip_config(start, end, GroupBy::YearMonth, Reducer::Sum);
    undeclared.bands = vec!["temperature_2m".to_string()];
    assert!(matches!(
        run(&undeclared, &snapshots, &region),
        Err(ClimNormError::UnsupportedBand { .. })
    ));

    let mut absent = precip_config(start, end, GroupBy::YearMonth, Reducer::Sum);
    absent.conversions = ConversionTable::chirps_daily().with("temperature_2m", UnitConversion::Identity);
    absent.bands = vec!["temperature_2m".to_string()];
    assert!(matches!(
        run(&absent, &snapshots, &region),
        Err(ClimNormError::BandNotFound { .. })
    ));

    for scale in [0.0, -10.0, f64::NAN] {
        let mut bad = precip_config(start, end, GroupBy::YearMonth, Reducer::Sum);
        bad.scale = scale;
        let err = run(&bad, &snapshots, &region).unwrap_err();
        assert!(matches!(err, ClimNormError::InvalidScale { .. }));
        assert!(err.is_validation());
    }

    let tight = precip_config(start, end, GroupBy::YearMonth, Reducer::Sum).with_max_pixels(10);
    assert!(matches!(
        run(&tight, &snapshots, &region),
        Err(ClimNormError::ComputationBudget { .. })
    ));
}

#[test]
fn test_run_is_deterministic() {
    let (start, end) = (date(2001, 1, 1), date(2003, 12, 31));
    let snapshots: Vec<GridSnapshot> = daily(start, end, 1.0)
        .into_iter()
        .enumerate()
        .map(|(i, mut s)| {
            s.bands.insert("precipitation".to_string(), Array2::from_elem((4, 4), (i % 7) as f64));
            s
        })
        .collect();
    let config = precip_config(start, end, GroupBy::YearMonth, Reducer::Sum);

    let first = run(&config, &snapshots, &full_region()).unwrap();
    let second = run(&config, &snapshots, &full_region()).unwrap();
    assert_eq!(first.table, second.table);
}

#[test]
fn test_mean_times_years_is_sum() {
    let (start, end) = (date(2001, 1, 1), date(2004, 12, 31));
    let snapshots: Vec<GridSnapshot> = daily(start, end, 1.0)
        .into_iter()
        .map(|mut s| {
            let value = f64::from(chrono::Datelike::year(&s.date) - 2000) * 0.5;
            s.bands.insert("precipitation".to_string(), Array2::from_elem((4, 4), value));
            s
        })
        .collect();
    let config = precip_config(start, end, GroupBy::YearMonth, Reducer::Sum);

    let output = run(&config, &snapshots, &full_region()).unwrap();
    for record in output.table.iter() {
        let stat = record.statistic("precipitation");
        assert_relative_eq!(
            stat.mean.unwrap() * record.years as f64,
            stat.sum.unwrap(),
            max_relative = 1e-12
        );
        assert!(stat.std.unwrap() > 0.0);
    }
}

#[test]
fn test_raster_is_clipped_to_region() {
    let (start, end) = (date(2001, 1, 1), date(2002, 12, 31));
    let snapshots = daily(start, end, 1.0);
    let west_half = Region::rectangle(-56.0, -32.0, -54.0, -28.0).unwrap();
    let config = precip_config(start, end, GroupBy::YearMonth, Reducer::Sum).with_raster(true);

    let output = run(&config, &snapshots, &west_half).unwrap();
    let raster = output.raster.expect("raster requested");
    assert_eq!(raster.months, 12);

    let mean = &raster.mean["precipitation"];
    let sum = &raster.sum["precipitation"];
    assert_relative_eq!(mean[[0, 0]], 365.0 / 12.0, epsilon = 1e-9);
    assert_relative_eq!(sum[[3, 1]], 365.0, epsilon = 1e-9);
    assert!(mean[[0, 2]].is_nan());
    assert!(sum[[3, 3]].is_nan());
    assert!(raster.std["precipitation"][[0, 0]] > 0.0);

    let no_raster = precip_config(start, end, GroupBy::YearMonth, Reducer::Sum);
    assert!(run(&no_raster, &snapshots, &west_half).unwrap().raster.is_none());
}

#[test]
fn test_run_with_source_and_csv_export() {
    let (start, end) = (date(2005, 1, 1), date(2005, 6, 30));
    let region = full_region();
    let source = InMemoryRasterSource::new().with_dataset("synthetic", daily(start, end, 2.0));
    let config = precip_config(start, end, GroupBy::YearMonth, Reducer::Sum);

    let output = run_with_source(&config, &source, &region).unwrap();
    assert_eq!(output.table.missing_months(), vec![7, 8, 9, 10, 11, 12]);

    let dir = tempdir().unwrap();
    let exporter = CsvTableExporter::new(dir.path());
    export(&config, &output, &region, Some(&exporter as &dyn TableExporter), None).unwrap();

    let path = exporter.path_for(&config.description());
    assert!(path.ends_with("climatology_2005-01-01_2005-06-30.csv"));
    let text = std::fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 13);
    assert_eq!(lines[0], "month,years,mean_precipitation,std_precipitation,sum_precipitation");
    assert_eq!(lines[1], "1,1,62,0,62");
    assert_eq!(lines[12], "12,0,NaN,NaN,NaN");

    let mut unknown = config.clone();
    unknown.dataset = "missing".to_string();
    assert!(matches!(
        run_with_source(&unknown, &source, &region),
        Err(ClimNormError::DatasetNotFound { .. })
    ));
}
