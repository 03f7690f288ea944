//! TileKeeper CLI - download map tiles for offline use.
//!
//! `tilekeeper <region>` downloads every tile of a named region into
//! `<out-dir>/<z>/<x>/<y>.png` and writes a JSON metadata sidecar next to
//! them. Without a region it lists the catalogue.

mod download;
mod error;
mod output;
mod regions;

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use tilekeeper::config::ConfigFile;
use tilekeeper::logging;
use tilekeeper::prefetch::DownloadConfig;
use tracing::info;

use download::DownloadRequest;
use error::CliError;

#[derive(Parser, Debug)]
#[command(name = "tilekeeper", version, disable_help_flag = true)]
#[command(about = "Download map tiles for a named region for offline use", long_about = None)]
struct Args {
    /// Region key (see the list printed without arguments)
    region: Option<String>,

    /// Show usage and the region list
    #[arg(short = 'h', long = "help")]
    help: bool,

    /// Output directory
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Concurrent downloads per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Pause between batches in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Attempts per tile
    #[arg(long)]
    retries: Option<u32>,

    /// Override the region's minimum zoom
    #[arg(long)]
    min_zoom: Option<u8>,

    /// Override the region's maximum zoom
    #[arg(long)]
    max_zoom: Option<u8>,

    /// Config file (default: ~/.tilekeeper/config.ini)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Mirror log output to the terminal
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let Some(region_key) = args.region.clone().filter(|_| !args.help) else {
        output::print_usage();
        output::print_region_list();
        process::exit(0);
    };

    if let Err(e) = run(&region_key, &args) {
        e.exit();
    }
}

fn run(region_key: &str, args: &Args) -> Result<(), CliError> {
    let entry =
        regions::find(region_key).ok_or_else(|| CliError::UnknownRegion(region_key.to_string()))?;

    let config = match &args.config {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };

    let _logging_guard =
        logging::init_logging(&config.logging.directory, &config.logging.file, args.verbose)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    ctrlc::set_handler(|| {
        eprintln!();
        eprintln!("Interrupted. Tiles downloaded so far are kept.");
        process::exit(0);
    })
    .map_err(|e| CliError::SignalHandler(e.to_string()))?;

    let request = DownloadRequest {
        region: entry.spec(args.min_zoom, args.max_zoom),
        out_dir: args
            .out_dir
            .clone()
            .unwrap_or_else(|| config.download.output_dir.clone()),
        config: resolve_download_config(args, &config),
        source: config.tile_source().map_err(CliError::Source)?,
        show_progress: true,
    };
    let client = config.http_client().map_err(CliError::HttpClient)?;

    println!(
        "Downloading {} (z{}-{}, {} tiles) into {}",
        request.region.name,
        request.region.min_zoom,
        request.region.max_zoom,
        request.region.tile_count(),
        request.out_dir.display()
    );
    info!(region = %request.region.name, out_dir = %request.out_dir.display(), "CLI download started");

    let summary = download::run_download(client, &request)?;
    let metadata = output::write_metadata(&request.out_dir, &request.region, &summary, chrono::Utc::now())?;
    output::print_summary(&summary, &request.out_dir, &metadata);
    Ok(())
}

/// Command-line flags override config.ini, which overrides the defaults.
fn resolve_download_config(args: &Args, config: &ConfigFile) -> DownloadConfig {
    let mut download = config.download_config();
    if let Some(batch_size) = args.batch_size {
        download = download.with_batch_size(batch_size);
    }
    if let Some(delay_ms) = args.delay_ms {
        download = download.with_batch_delay(Duration::from_millis(delay_ms));
    }
    if let Some(retries) = args.retries {
        download = download.with_max_retries(retries);
    }
    download
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments_parses() {
        let args = Args::try_parse_from(["tilekeeper"]).unwrap();
        assert!(args.region.is_none());
        assert!(!args.help);
    }

    #[test]
    fn test_help_flag_is_ours() {
        let args = Args::try_parse_from(["tilekeeper", "-h"]).unwrap();
        assert!(args.help);
        let args = Args::try_parse_from(["tilekeeper", "paris", "--help"]).unwrap();
        assert!(args.help);
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "tilekeeper",
            "paris",
            "--batch-size",
            "2",
            "--delay-ms",
            "0",
        ])
        .unwrap();
        let mut config = ConfigFile::default();
        config.download.batch_size = 9;
        config.download.max_retries = 5;

        let download = resolve_download_config(&args, &config);

        assert_eq!(download.batch_size, 2);
        assert_eq!(download.batch_delay, Duration::ZERO);
        assert_eq!(download.max_retries, 5);
    }

    #[test]
    fn test_defaults_without_flags_or_config() {
        let args = Args::try_parse_from(["tilekeeper", "paris"]).unwrap();
        assert_eq!(
            resolve_download_config(&args, &ConfigFile::default()),
            DownloadConfig::default()
        );
    }
}
