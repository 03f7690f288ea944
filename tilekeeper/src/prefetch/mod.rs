//! Bulk download of whole regions for offline use.
//!
//! A region is expanded into tile keys, keys already present in the
//! [`TileSink`] are skipped, and the rest are fetched in small concurrent
//! batches with a pause between batches so public tile servers are not
//! hammered.
//!
//! # Architecture
//!
//! ```text
//! RegionSpec ──► RegionDownloader ──► TileFetcher ──► AsyncHttpClient
//!                     │                   │
//!                     │                   └── TileSource (mirrors)
//!                     ▼
//!                 TileSink (TileCache | DirectorySink)
//! ```
//!
//! Failures are per tile: a tile that cannot be fetched from any mirror is
//! counted and the download carries on. While a [`Connectivity`] receiver
//! reports offline, dequeueing pauses and failed jobs are requeued.

mod connectivity;
mod downloader;
mod fetcher;
mod http;
mod progress;
mod sink;
mod source;

pub use connectivity::{channel as connectivity_channel, wait_until_online, Connectivity};
pub use downloader::{
    DownloadConfig, DownloadJob, DownloadSummary, RegionDownloader, DEFAULT_BATCH_DELAY,
    DEFAULT_BATCH_SIZE,
};
pub use fetcher::{FetchError, FetchedTile, TileFetcher, DEFAULT_MAX_RETRIES};
pub use http::{
    default_user_agent, AsyncHttpClient, AsyncReqwestClient, NetworkError, DEFAULT_TIMEOUT_SECS,
};
pub use progress::{DownloadProgress, ProgressSnapshot};
pub use sink::{DirectorySink, SinkError, TileSink};
pub use source::{
    SourceError, TileSource, OSM_FALLBACK_TEMPLATE, OSM_SUBDOMAINS, OSM_TEMPLATE,
};

#[cfg(test)]
pub(crate) use http::tests::{png_bytes, MockHttpClient};
