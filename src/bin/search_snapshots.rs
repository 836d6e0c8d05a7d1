//! Search the ASF catalog for SAR snapshots covering each IIP iceberg sighting.

use anyhow::{Context, Result};
use clap::Parser;
use icesar::io::sightings::{read_season, IIP_DATASET_DIR};
use icesar::search::{progress_bar, AsfCatalog, Platform, SearchConfig, SnapshotSearch, ASF_SEARCH_URL};
use icesar::ErrorPolicy;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Find SAR snapshots for IIP iceberg sightings", long_about = None)]
struct Cli {
    /// Iceberg season to process
    #[arg(long, default_value_t = 2019)]
    year: i32,

    /// Directory holding IIP_{year}IcebergSeason.csv
    #[arg(long, env = "IIP_DATASET_DIR", default_value = IIP_DATASET_DIR)]
    dataset_dir: PathBuf,

    /// Where iip-urls-{year}.json and iip-search-result-{year}.json go
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = Platform::Sentinel1)]
    platform: Platform,

    /// Days searched from the sighting date
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i64).range(1..=36500))]
    window_days: i64,

    /// Cap on results per sighting
    #[arg(long)]
    max_results: Option<usize>,

    #[arg(long, env = "ASF_SEARCH_URL", default_value = ASF_SEARCH_URL)]
    search_url: String,

    /// HTTP timeout per search, in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Stop at the first failed search or skip the sighting
    #[arg(long, value_enum, default_value_t = ErrorPolicy::FailFast)]
    on_error: ErrorPolicy,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let sightings = read_season(&cli.dataset_dir, cli.year)
        .with_context(|| format!("failed to read the {} sightings", cli.year))?;
    let catalog = AsfCatalog::new(cli.search_url, Duration::from_secs(cli.timeout_secs))?;

    let window = chrono::Duration::try_days(cli.window_days)
        .with_context(|| format!("--window-days {} is out of range", cli.window_days))?;
    let config = SearchConfig {
        platform: cli.platform,
        window,
        max_results: cli.max_results,
        error_policy: cli.on_error,
    };
    let search = SnapshotSearch::new(&catalog, config);
    let progress = progress_bar(sightings.len());
    let aggregates = search.run(&sightings, &progress).context("snapshot search aborted")?;

    aggregates
        .write_json(&cli.out_dir, cli.year)
        .context("failed to write search results")?;

    if !aggregates.failures.is_empty() {
        log::warn!(
            "{} sightings could not be searched: {:?}",
            aggregates.failures.len(),
            aggregates.failures.iter().map(|(idx, _)| idx).collect::<Vec<_>>()
        );
    }
    Ok(())
}
