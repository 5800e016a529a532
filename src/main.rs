use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use transit_ratio::report::format_km;
use transit_ratio::{
    CityFetcher, Report, TransitRatio, TransitRatioConfig, TransitRatioError, http, logging,
};

/// Compare public transport and road travel times from one origin to a country's largest cities
#[derive(Parser, Debug)]
#[command(name = "transit-ratio", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maps API key, overrides the configuration
    #[arg(long, global = true, env = "TRANSIT_RATIO_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Retrieve cities, calculate travel times and write the report
    Run(RunArgs),
    /// List the country codes accepted by `run`
    Countries,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// ISO 3166-1 alpha-2 country code, e.g. ES
    #[arg(short, long)]
    country: String,

    /// Keep the top N percent of cities by population (0-100)
    #[arg(short, long)]
    percentile: Option<f64>,

    /// Address every route starts from
    #[arg(short, long)]
    origin: Option<String>,

    /// Number of rows printed to the terminal
    #[arg(short, long)]
    top: Option<usize>,

    /// Write the full report as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the full report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write an interactive Leaflet map (HTML)
    #[arg(long)]
    map: Option<PathBuf>,

    /// Write the map markers as GeoJSON
    #[arg(long)]
    geojson: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<TransitRatioError>() {
                Some(e) => eprintln!("Error: {e}\n{}", e.user_message()),
                None => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = TransitRatioConfig::load_from_path(cli.config.clone())?;
    if let Some(key) = cli.api_key {
        config.maps.api_key = Some(key);
        config.validate_api_keys()?;
    }

    logging::init(&config.logging, cli.verbose);
    info!("transit-ratio v{}", transit_ratio::VERSION);

    match cli.command {
        Command::Countries => {
            // the open-data catalogue needs no maps key
            let fetcher = CityFetcher::new(http::build_client(&config.maps)?, config.open_data);
            for (code, name) in fetcher.fetch_countries().await? {
                println!("{code}  {name}");
            }
        }
        Command::Run(args) => {
            let mut session = TransitRatio::new(config.clone())?;
            let percentile = args.percentile.unwrap_or(config.defaults.percentile);
            let origin = args.origin.unwrap_or_else(|| config.defaults.origin.clone());
            let top = args.top.unwrap_or(config.defaults.top);

            let kept = session.retrieve_cities(&args.country, percentile).await?;
            println!("Found {kept} cities");

            let report = session.calculate_travel(&origin).await?;
            print_summary(report, top);

            if let Some(path) = &args.csv {
                let file = create(path)?;
                session.report()?.write_csv(BufWriter::new(file))?;
                println!("CSV report written to {}", path.display());
            }

            if let Some(path) = &args.json {
                std::fs::write(path, session.report()?.to_json()?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("JSON report written to {}", path.display());
            }

            if args.map.is_some() || args.geojson.is_some() {
                let view = session.map().await?;
                if let Some(path) = &args.map {
                    std::fs::write(path, view.to_html()?)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Map written to {}", path.display());
                }
                if let Some(path) = &args.geojson {
                    std::fs::write(path, serde_json::to_string_pretty(&view.to_geojson())?)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("GeoJSON written to {}", path.display());
                }
            }
        }
    }

    Ok(())
}

fn create(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("Failed to create {}", path.display()))
}

fn print_summary(report: &Report, top: usize) {
    let summary = report.summary();

    println!();
    println!("Travel from {} ({})", report.origin.address, report.origin.point);
    println!("{}", Report::format_table(report.top(top)));

    if report.len() > top {
        println!("... {} more cities", report.len() - top);
    }
    if let Some(km) = summary.average_distance_km() {
        println!("Average distance: {km:.2} km");
    }
    if let Some(ratio) = summary.mean_ratio {
        println!("Mean transit/driving ratio: {ratio:.2}");
    }
    for failure in &report.failures {
        println!("No {} route to {}", failure.mode, failure.city);
    }
    if let Some(row) = report.rows.iter().max_by_key(|r| r.driving.distance_m) {
        println!(
            "Farthest by road: {} ({} km)",
            row.city.name,
            format_km(row.driving.distance_m)
        );
    }
}
