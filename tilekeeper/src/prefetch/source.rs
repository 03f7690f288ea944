//! Tile server URL templates and mirror selection.
//!
//! A template holds the placeholders `{z}`, `{x}` and `{y}`, and
//! optionally `{s}` for a subdomain. Each template expanded with each
//! subdomain is one *mirror*.

use thiserror::Error;

use crate::coord::TileKey;

/// Primary OpenStreetMap tile template.
pub const OSM_TEMPLATE: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Fallback server used once the primary mirrors are exhausted.
pub const OSM_FALLBACK_TEMPLATE: &str = "https://tile.openstreetmap.de/{z}/{x}/{y}.png";

/// Default OSM subdomains.
pub const OSM_SUBDOMAINS: [&str; 3] = ["a", "b", "c"];

/// Errors in a tile source definition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("At least one URL template is required")]
    NoTemplates,

    #[error("URL template '{0}' must contain {{z}}, {{x}} and {{y}}")]
    MissingPlaceholder(String),

    #[error("URL template '{0}' uses {{s}} but no subdomains are configured")]
    NoSubdomains(String),
}

/// A set of tile servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSource {
    /// Primary template first, then fallbacks.
    templates: Vec<String>,
    /// Substituted for `{s}`.
    subdomains: Vec<String>,
    /// Every (template, subdomain) expansion, in fallback order.
    mirrors: Vec<(usize, Option<usize>)>,
}

impl TileSource {
    pub fn new(templates: Vec<String>, subdomains: Vec<String>) -> Result<Self, SourceError> {
        if templates.is_empty() {
            return Err(SourceError::NoTemplates);
        }

        let mut mirrors = Vec::new();
        for (t, template) in templates.iter().enumerate() {
            if !["{z}", "{x}", "{y}"].iter().all(|p| template.contains(p)) {
                return Err(SourceError::MissingPlaceholder(template.clone()));
            }
            if template.contains("{s}") {
                if subdomains.is_empty() {
                    return Err(SourceError::NoSubdomains(template.clone()));
                }
                mirrors.extend((0..subdomains.len()).map(|s| (t, Some(s))));
            } else {
                mirrors.push((t, None));
            }
        }

        Ok(Self {
            templates,
            subdomains,
            mirrors,
        })
    }

    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    pub fn subdomains(&self) -> &[String] {
        &self.subdomains
    }

    /// Number of distinct mirrors.
    pub fn mirror_count(&self) -> usize {
        self.mirrors.len()
    }

    /// URL of `key` on the `index`-th mirror, wrapping around.
    pub fn mirror_url(&self, key: &TileKey, index: usize) -> String {
        let (t, s) = self.mirrors[index % self.mirrors.len()];
        let url = self.templates[t]
            .replace("{z}", &key.zoom.to_string())
            .replace("{x}", &key.x.to_string())
            .replace("{y}", &key.y.to_string());
        match s {
            Some(s) => url.replace("{s}", &self.subdomains[s]),
            None => url,
        }
    }

    /// Primary-template mirror index `(x + y) mod subdomains`.
    ///
    /// Spreads neighbouring tiles over the subdomains.
    pub fn primary_index(&self, key: &TileKey) -> usize {
        let primary_mirrors = self.mirrors.iter().filter(|(t, _)| *t == 0).count();
        ((u64::from(key.x) + u64::from(key.y)) % primary_mirrors as u64) as usize
    }

    /// Remote URL handed to renderers that fetch tiles themselves.
    pub fn remote_url(&self, key: &TileKey) -> String {
        self.mirror_url(key, self.primary_index(key))
    }
}

impl Default for TileSource {
    fn default() -> Self {
        Self {
            templates: vec![OSM_TEMPLATE.to_string(), OSM_FALLBACK_TEMPLATE.to_string()],
            subdomains: OSM_SUBDOMAINS.iter().map(|s| s.to_string()).collect(),
            mirrors: vec![(0, Some(0)), (0, Some(1)), (0, Some(2)), (1, None)],
        }
    }
}
