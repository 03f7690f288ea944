//! Settings structs for each configuration section, and their defaults.
//!
//! Each struct represents one `[section]` of the INI config file.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{CacheConfig, DEFAULT_MAX_CACHE_SIZE_BYTES, DEFAULT_MAX_TILE_COUNT};
use crate::prefetch::{
    default_user_agent, AsyncReqwestClient, DownloadConfig, NetworkError, SourceError,
    TileSource, DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES,
    DEFAULT_TIMEOUT_SECS, OSM_FALLBACK_TEMPLATE, OSM_SUBDOMAINS, OSM_TEMPLATE,
};

/// Default tile time-to-live in days.
pub const DEFAULT_TTL_DAYS: u64 = 7;

/// Default CLI output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "tiles";

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "tilekeeper.log";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub download: DownloadSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Root of the on-disk stores.
    pub directory: PathBuf,
    /// Byte ceiling.
    pub max_size: u64,
    /// Tile count ceiling.
    pub max_tiles: u64,
    pub ttl_days: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: super::config_directory().join("cache"),
            max_size: DEFAULT_MAX_CACHE_SIZE_BYTES,
            max_tiles: DEFAULT_MAX_TILE_COUNT,
            ttl_days: DEFAULT_TTL_DAYS,
        }
    }
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub max_retries: u32,
    pub timeout_secs: u64,
    /// Where the CLI writes `<z>/<x>/<y>.png`.
    pub output_dir: PathBuf,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay_ms: DEFAULT_BATCH_DELAY.as_millis() as u64,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Primary template; may contain `{s}`.
    pub url_template: String,
    pub subdomains: Vec<String>,
    /// Tried after every primary mirror.
    pub fallback_templates: Vec<String>,
    pub user_agent: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url_template: OSM_TEMPLATE.to_string(),
            subdomains: OSM_SUBDOMAINS.iter().map(|s| s.to_string()).collect(),
            fallback_templates: vec![OSM_FALLBACK_TEMPLATE.to_string()],
            user_agent: default_user_agent(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: super::config_directory().join("logs"),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl ConfigFile {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::default()
            .with_max_size(self.cache.max_size)
            .with_max_tiles(self.cache.max_tiles)
            .with_ttl(Duration::from_secs(self.cache.ttl_days * SECONDS_PER_DAY))
    }

    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig::default()
            .with_batch_size(self.download.batch_size)
            .with_batch_delay(Duration::from_millis(self.download.batch_delay_ms))
            .with_max_retries(self.download.max_retries)
    }

    /// Primary template followed by the fallbacks.
    pub fn tile_source(&self) -> Result<TileSource, SourceError> {
        let templates = std::iter::once(self.server.url_template.clone())
            .chain(self.server.fallback_templates.iter().cloned())
            .collect();
        TileSource::new(templates, self.server.subdomains.clone())
    }

    pub fn http_client(&self) -> Result<AsyncReqwestClient, NetworkError> {
        AsyncReqwestClient::with_options(self.download.timeout_secs, &self.server.user_agent)
    }
}
