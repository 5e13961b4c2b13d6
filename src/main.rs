use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use edu_locations::app::{GeocodeUseCase, MergeUseCase, RefineUseCase};
use edu_locations::config::Config;
use edu_locations::constants;
use edu_locations::domain::Sector;
use edu_locations::infra::GoogleGeocoder;
use edu_locations::logging;
use edu_locations::observability;

#[derive(Parser)]
#[command(name = "edu_locations")]
#[command(about = "Merge, geocode and refine DUO education facility locations")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = constants::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Sectors to process (comma-separated). Available: primary, secondary,
    /// vocational, higher, unknown. Defaults to all.
    #[arg(long, global = true, value_delimiter = ',')]
    sectors: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the raw registries into per-sector location tables
    Merge,
    /// Geocode the unique addresses of each merged table
    Geocode,
    /// Join coordinates and derive analysis fields
    Refine,
    /// Run merge, geocode and refine in order
    Run,
}

fn parse_sectors(raw: &[String]) -> Result<Vec<Sector>> {
    if raw.is_empty() {
        return Ok(Sector::ALL.to_vec());
    }
    let mut sectors = Vec::new();
    for name in raw.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let sector = name.parse::<Sector>().map_err(anyhow::Error::msg)?;
        if !sectors.contains(&sector) {
            sectors.push(sector);
        }
    }
    if sectors.is_empty() {
        bail!("--sectors was given but names no sector");
    }
    Ok(sectors)
}

fn merge(config: &Config, sectors: &[Sector]) -> Result<()> {
    println!("🔄 Merging registries...");
    let report = MergeUseCase::new(config.paths.clone()).run(sectors)?;

    println!("\n📊 Merge Results:");
    println!("   Rows read: {}", report.rows_read);
    println!("   Rows dropped: {}", report.rows_dropped());
    println!("   Unreadable rows skipped: {}", report.unreadable_rows);
    println!("   Rows collapsed into shared addresses: {}", report.collapsed_rows);
    println!("   Malformed dates: {}", report.malformed_dates);
    println!("   Unknown sector: {}", report.unknown_sector);
    for (sector, count) in &report.locations_per_sector {
        println!("   {}: {} locations", sector, count);
    }
    Ok(())
}

async fn geocode(config: &Config, sectors: &[Sector]) -> Result<()> {
    println!("🌍 Geocoding addresses...");
    let geocoder = GoogleGeocoder::from_config(&config.geocoder)
        .context("Geocoder could not be configured")?;
    let use_case = GeocodeUseCase::new(
        Box::new(geocoder),
        config.paths.clone(),
        config.geocoder.clone(),
    );
    let report = use_case.run(sectors).await?;

    println!("\n📊 Geocode Results:");
    println!("   Unique addresses: {}", report.unique_addresses);
    println!("   Already cached: {}", report.cached);
    println!("   Copied from other sectors: {}", report.copied);
    println!("   Provider requests: {}", report.requests);
    println!("   Resolved: {}", report.ok);
    println!("   Not found: {}", report.not_found);
    println!("   Failed: {}", report.failed);
    Ok(())
}

fn refine(config: &Config, sectors: &[Sector]) -> Result<()> {
    println!("🛠️  Refining locations...");
    let summaries = RefineUseCase::new(config.paths.clone()).run(sectors)?;

    println!("\n📊 Refine Results:");
    for (sector, summary) in &summaries {
        println!(
            "   {}: {} rows, {:.1}% with coordinates, {} active / {} inactive",
            sector,
            summary.total,
            summary.coverage(),
            summary.active,
            summary.inactive
        );
    }
    Ok(())
}

async fn execute(cli: &Cli, config: &Config) -> Result<()> {
    let sectors = parse_sectors(&cli.sectors)?;
    match cli.command {
        Commands::Merge => merge(config, &sectors),
        Commands::Geocode => geocode(config, &sectors).await,
        Commands::Refine => refine(config, &sectors),
        Commands::Run => {
            merge(config, &sectors)?;
            geocode(config, &sectors).await?;
            refine(config, &sectors)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may live in a local .env file
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).context("Failed to load configuration")?;

    let _log_guard = logging::init_logging(&config.paths.log_dir);
    observability::init();
    info!("Starting edu_locations");

    let outcome = execute(&cli, &config).await;

    let snapshot = config.paths.log_dir.join(constants::METRICS_SNAPSHOT_FILE);
    if let Err(e) = observability::write_snapshot(&snapshot) {
        error!("Failed to write metrics snapshot: {}", e);
    }

    if let Err(e) = &outcome {
        error!("Run failed: {:#}", e);
    } else {
        println!("\n✅ Done");
    }
    outcome
}
