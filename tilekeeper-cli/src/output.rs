//! Console output and the JSON metadata sidecar.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tilekeeper::config::format_bytes;
use tilekeeper::coord::{BoundingBox, RegionSpec};
use tilekeeper::prefetch::DownloadSummary;

use crate::error::CliError;
use crate::regions::{self, REGIONS};

/// Contents of `<out_dir>/<region-slug>.json`.
#[derive(Debug, Serialize)]
pub struct RegionMetadata<'a> {
    pub name: &'a str,
    pub bounds: BoundingBox,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// RFC 3339 / ISO-8601, UTC.
    pub downloaded_at: String,
    pub stats: SummaryStats,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub total: u64,
    pub skipped: u64,
    pub downloaded: u64,
    pub failed: u64,
    pub bytes_transferred: u64,
    pub elapsed_secs: f64,
    pub tiles_per_second: f64,
}

impl From<&DownloadSummary> for SummaryStats {
    fn from(summary: &DownloadSummary) -> Self {
        Self {
            total: summary.total,
            skipped: summary.skipped,
            downloaded: summary.downloaded,
            failed: summary.failed,
            bytes_transferred: summary.bytes_transferred,
            elapsed_secs: summary.elapsed.as_secs_f64(),
            tiles_per_second: summary.tiles_per_second(),
        }
    }
}

/// Path of the metadata sidecar for `region`.
pub fn metadata_path(out_dir: &Path, region: &RegionSpec) -> PathBuf {
    out_dir.join(format!("{}.json", regions::slug(&region.name)))
}

/// Write the metadata sidecar and return its path.
pub fn write_metadata(
    out_dir: &Path,
    region: &RegionSpec,
    summary: &DownloadSummary,
    downloaded_at: DateTime<Utc>,
) -> Result<PathBuf, CliError> {
    let metadata = RegionMetadata {
        name: &region.name,
        bounds: region.bounds,
        min_zoom: region.min_zoom,
        max_zoom: region.max_zoom,
        downloaded_at: downloaded_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        stats: SummaryStats::from(summary),
    };
    let json = serde_json::to_string_pretty(&metadata).map_err(CliError::Metadata)?;

    let path = metadata_path(out_dir, region);
    std::fs::write(&path, json).map_err(|error| CliError::FileWrite {
        path: path.clone(),
        error,
    })?;
    Ok(path)
}

pub fn print_usage() {
    println!("Usage: tilekeeper [REGION] [OPTIONS]");
    println!();
    println!("Download map tiles for a named region into <out-dir>/<z>/<x>/<y>.png");
    println!();
    println!("Options:");
    println!("  --out-dir <DIR>       Output directory (default: tiles)");
    println!("  --batch-size <N>      Concurrent downloads per batch (default: 5)");
    println!("  --delay-ms <MS>       Pause between batches (default: 100)");
    println!("  --retries <N>         Attempts per tile (default: 3)");
    println!("  --min-zoom <Z>        Override the region's minimum zoom");
    println!("  --max-zoom <Z>        Override the region's maximum zoom");
    println!("  --config <FILE>       Config file (default: ~/.tilekeeper/config.ini)");
    println!("  -v, --verbose         Mirror log output to the terminal");
    println!("  -h, --help            Show this help");
    println!();
}

pub fn print_region_list() {
    println!("Available regions:");
    for region in &REGIONS {
        println!(
            "  {:<15} {:<15} z{}-{}  ~{} tiles",
            region.key,
            region.name,
            region.min_zoom,
            region.max_zoom,
            region.estimated_tiles()
        );
    }
}

pub fn print_summary(summary: &DownloadSummary, out_dir: &Path, metadata: &Path) {
    println!();
    println!("Download complete: {}", summary.region);
    println!("  Tiles:       {}", summary.total);
    println!("  Downloaded:  {}", summary.downloaded);
    println!("  Skipped:     {} (already present)", summary.skipped);
    println!("  Failed:      {}", summary.failed);
    println!("  Transferred: {}", format_bytes(summary.bytes_transferred));
    println!(
        "  Time:        {:.1}s ({:.1} tiles/s)",
        summary.elapsed.as_secs_f64(),
        summary.tiles_per_second()
    );
    println!("  Output:      {}", out_dir.display());
    println!("  Metadata:    {}", metadata.display());
}
