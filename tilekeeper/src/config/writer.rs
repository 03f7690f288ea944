//! INI serialization: `ConfigFile` → commented INI string.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to the commented INI written to `config.ini`.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[cache]
; Root directory of the tile and metadata stores
directory = {}
; Byte ceiling before least-recently-used tiles are evicted
; Supports: KB, MB, GB suffixes (e.g., 200MB, 1GB)
max_size = {}
; Tile count ceiling before eviction
max_tiles = {}
; Tiles older than this many days are treated as missing
ttl_days = {}

[download]
; Concurrent downloads per batch
batch_size = {}
; Pause between batches in milliseconds
batch_delay_ms = {}
; Attempts per tile, rotating through mirrors
max_retries = {}
; Per-request timeout in seconds
timeout_secs = {}
; Output directory for the command-line downloader
output_dir = {}

[server]
; Primary tile URL template; {{s}} is replaced by a subdomain
url_template = {}
; Comma-separated subdomains for {{s}}
subdomains = {}
; Comma-separated templates tried after the primary mirrors
fallback_templates = {}
; Public tile servers require a descriptive User-Agent
user_agent = {}

[logging]
directory = {}
file = {}
"#,
        path_to_string(&config.cache.directory),
        format_size(config.cache.max_size),
        config.cache.max_tiles,
        config.cache.ttl_days,
        config.download.batch_size,
        config.download.batch_delay_ms,
        config.download.max_retries,
        config.download.timeout_secs,
        path_to_string(&config.download.output_dir),
        config.server.url_template,
        config.server.subdomains.join(","),
        config.server.fallback_templates.join(","),
        config.server.user_agent,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

/// Display a path, abbreviating the home directory to `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
