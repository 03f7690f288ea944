//! INI parsing: `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = non_empty(section, "directory") {
            config.cache.directory = expand_tilde(v);
        }
        if let Some(v) = section.get("max_size") {
            config.cache.max_size = parse_size(v).map_err(|_| {
                invalid("cache", "max_size", v, "expected format like '500MB', '2GB', or '1024KB'")
            })?;
        }
        if let Some(v) = parse_positive(section, "cache", "max_tiles")? {
            config.cache.max_tiles = v;
        }
        if let Some(v) = parse_positive(section, "cache", "ttl_days")? {
            config.cache.ttl_days = v;
        }
    }

    // [download] section
    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = parse_positive(section, "download", "batch_size")? {
            config.download.batch_size = v;
        }
        if let Some(v) = section.get("batch_delay_ms") {
            config.download.batch_delay_ms = v.trim().parse().map_err(|_| {
                invalid("download", "batch_delay_ms", v, "must be a non-negative integer (milliseconds)")
            })?;
        }
        if let Some(v) = parse_positive(section, "download", "max_retries")? {
            config.download.max_retries = v;
        }
        if let Some(v) = parse_positive(section, "download", "timeout_secs")? {
            config.download.timeout_secs = v;
        }
        if let Some(v) = non_empty(section, "output_dir") {
            config.download.output_dir = expand_tilde(v);
        }
    }

    // [server] section
    if let Some(section) = ini.section(Some("server")) {
        if let Some(v) = non_empty(section, "url_template") {
            config.server.url_template = v.to_string();
        }
        if let Some(v) = section.get("subdomains") {
            config.server.subdomains = split_list(v);
        }
        if let Some(v) = section.get("fallback_templates") {
            config.server.fallback_templates = split_list(v);
        }
        if let Some(v) = non_empty(section, "user_agent") {
            config.server.user_agent = v.to_string();
        }
        if let Err(e) = config.tile_source() {
            return Err(invalid(
                "server",
                "url_template",
                &config.server.url_template,
                &e.to_string(),
            ));
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section, "directory") {
            config.logging.directory = expand_tilde(v);
        }
        if let Some(v) = non_empty(section, "file") {
            config.logging.file = v.to_string();
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

/// Parse an integer that must be at least 1.
fn parse_positive<T>(
    section: &Properties,
    section_name: &str,
    key: &str,
) -> Result<Option<T>, ConfigFileError>
where
    T: FromStr + PartialOrd + From<u8>,
{
    let Some(v) = section.get(key) else {
        return Ok(None);
    };
    match v.trim().parse::<T>() {
        Ok(n) if n >= T::from(1) => Ok(Some(n)),
        _ => Err(invalid(section_name, key, v, "must be a positive integer")),
    }
}

/// Split a comma-separated list, dropping empty entries.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
