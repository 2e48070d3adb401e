//! Entry point for the ClimNorm application.
//! Handles CLI parsing, logging and thread pool setup, then runs the climatology and exports it.

use chrono::Local;
use clap::Parser;
use log::{info, LevelFilter};
use std::io::Write;
mod cli;

use clim_norm::{
    export, run_with_source, ClimatologyTable, CsvTableExporter, DivisorPolicy, GroupBy,
    NetCDFRasterExporter, NetCDFRasterSource, ParallelConfig, PipelineConfig, RasterExporter, Reducer,
    Region, TableExporter,
};
use cli::{Args, DivisorArg, GroupByArg, Preset, ReducerArg};

fn init_logging(verbose: bool) {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        std::env::var("RUST_LOG")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(LevelFilter::Info)
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(buf, "[{} {:5}] {}", Local::now().format("%H:%M:%S"), record.level(), record.args())
        })
        .init();
}

fn build_config(args: &Args) -> PipelineConfig {
    let mut config = match args.preset {
        Preset::Chirps => PipelineConfig::chirps_daily(args.start, args.end),
        Preset::Era5Land => PipelineConfig::era5_land_monthly(args.start, args.end),
    };

    if let Some(dataset) = &args.dataset {
        config.dataset = dataset.clone();
    }
    if !args.bands.is_empty() {
        config.bands = args.bands.clone();
    }
    if let Some(group_by) = args.group_by {
        config.group_by = match group_by {
            GroupByArg::Month => GroupBy::Month,
            GroupByArg::YearMonth => GroupBy::YearMonth,
        };
    }
    if let Some(reducer) = args.reducer {
        config.reducer = match reducer {
            ReducerArg::Sum => Reducer::Sum,
            ReducerArg::Mean => Reducer::Mean,
        };
    }
    if let Some(scale) = args.scale {
        config.scale = scale;
    }
    if let Some(max_pixels) = args.max_pixels {
        config.max_pixels = max_pixels;
    }
    config.divisor = match args.divisor {
        DivisorArg::PerMonth => DivisorPolicy::PerMonth,
        DivisorArg::Fixed => DivisorPolicy::Fixed,
    };
    config.raster = args.output_netcdf.is_some();
    config
}

fn print_table(table: &ClimatologyTable) {
    let mut header = format!("{:<10} {:>5}", "month", "years");
    for band in &table.bands {
        header.push_str(&format!(" {:>16} {:>16}", format!("mean_{band}"), format!("std_{band}")));
    }
    println!("{header}");

    let cell = |v: Option<f64>| v.map_or_else(|| "NaN".to_string(), |v| format!("{v:.3}"));
    for record in table.iter() {
        let mut line = format!("{:<10} {:>5}", record.month_name(), record.years);
        for band in &table.bands {
            let stat = record.statistic(band);
            line.push_str(&format!(" {:>16} {:>16}", cell(stat.mean), cell(stat.std)));
        }
        println!("{line}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(args.verbose);

    let parallel_config = match args.threads {
        Some(threads) => ParallelConfig::with_threads(threads),
        None => ParallelConfig::default(),
    };
    parallel_config.setup_global_pool()?;
    clim_norm::get_parallel_info().log_info();

    let config = build_config(&args);
    let region = Region::from_geojson_file(&args.region)?;
    let source = NetCDFRasterSource::new().with_dataset(&config.dataset, &args.file);
    info!(
        "Computing {} climatology of '{}' from {} to {}",
        config.reducer.as_str(),
        config.dataset,
        config.start,
        config.end
    );

    let output = match run_with_source(&config, &source, &region) {
        Ok(output) => output,
        Err(e) if e.is_validation() => {
            eprintln!("Invalid input: {e}");
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };

    print_table(&output.table);
    let missing = output.table.missing_months();
    if !missing.is_empty() {
        info!("Months without data: {:?}", missing);
    }

    let csv_exporter = args.output_csv.as_ref().map(CsvTableExporter::new);
    let netcdf_exporter = args.output_netcdf.as_ref().map(NetCDFRasterExporter::new);
    export(
        &config,
        &output,
        &region,
        csv_exporter.as_ref().map(|e| e as &dyn TableExporter),
        netcdf_exporter
            .as_ref()
            .map(|e| (e as &dyn RasterExporter, args.crs.as_str())),
    )?;

    if let Some(exporter) = &csv_exporter {
        println!("✅ Saved table to {}", exporter.path_for(&config.description()).display());
    }
    if let Some(exporter) = &netcdf_exporter {
        if output.raster.is_some() {
            println!("✅ Saved raster to {}", exporter.output_path().display());
        }
    }

    Ok(())
}
