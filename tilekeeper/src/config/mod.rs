//! User configuration.
//!
//! [`ConfigFile`] is read from `~/.tilekeeper/config.ini` (missing file →
//! defaults) and converts into the runtime configs of the cache, the
//! downloader and the tile source.
//!
//! # Example
//!
//! ```ignore
//! use tilekeeper::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let cache_config = config.cache_config();
//! let source = config.tile_source()?;
//! ```

mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    CacheSettings, ConfigFile, DownloadSettings, LoggingSettings, ServerSettings,
    DEFAULT_LOG_FILE, DEFAULT_OUTPUT_DIR, DEFAULT_TTL_DAYS,
};
pub use size::{format_bytes, format_size, parse_size, Size, SizeParseError};
