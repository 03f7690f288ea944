//! Region pre-download in rate-limited batches.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connectivity::{wait_until_online, Connectivity};
use super::fetcher::{TileFetcher, DEFAULT_MAX_RETRIES};
use super::http::AsyncHttpClient;
use super::progress::DownloadProgress;
use super::sink::TileSink;
use crate::coord::{CoordError, RegionSpec, TileKey};

/// Default number of concurrent downloads per batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Default pause between batches.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(100);

/// Download pacing and retry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Concurrent downloads per batch (at least 1).
    pub batch_size: usize,
    pub batch_delay: Duration,
    /// Attempts per tile, used when building the [`TileFetcher`].
    pub max_retries: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl DownloadConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// One pending tile download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub key: TileKey,
    pub region: Arc<str>,
    /// Fetch attempts spent so far, across requeues.
    pub attempts: u32,
}

/// Outcome of a region download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSummary {
    pub region: String,
    /// Tiles in the region.
    pub total: u64,
    /// Tiles already present.
    pub skipped: u64,
    pub downloaded: u64,
    pub failed: u64,
    pub bytes_transferred: u64,
    pub elapsed: Duration,
    /// The download was stopped before every job ran.
    pub cancelled: bool,
}

impl DownloadSummary {
    pub fn tiles_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.downloaded as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for DownloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} tiles, {} downloaded, {} already cached, {} failed ({} bytes in {:.1}s, {:.1} tiles/s){}",
            self.region,
            self.total,
            self.downloaded,
            self.skipped,
            self.failed,
            self.bytes_transferred,
            self.elapsed.as_secs_f64(),
            self.tiles_per_second(),
            if self.cancelled { ", cancelled" } else { "" }
        )
    }
}

enum JobOutcome {
    Downloaded(u64),
    Failed,
    /// Failed while offline; try again once connectivity returns.
    Requeue(DownloadJob),
    Abandoned,
}

/// Downloads every tile of a region into a [`TileSink`].
///
/// Jobs run in batches of `batch_size` concurrent fetches with
/// `batch_delay` between batches. Per-tile failures are counted, never
/// propagated.
pub struct RegionDownloader<C, S> {
    fetcher: Arc<TileFetcher<C>>,
    sink: Arc<S>,
    config: DownloadConfig,
    progress: Arc<DownloadProgress>,
    connectivity: Option<watch::Receiver<Connectivity>>,
    cancel: CancellationToken,
}

impl<C: AsyncHttpClient, S: TileSink> RegionDownloader<C, S> {
    pub fn new(fetcher: Arc<TileFetcher<C>>, sink: Arc<S>, config: DownloadConfig) -> Self {
        Self {
            fetcher,
            sink,
            config,
            progress: Arc::new(DownloadProgress::new()),
            connectivity: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Pause dequeueing while `rx` reports offline.
    pub fn with_connectivity(mut self, rx: watch::Receiver<Connectivity>) -> Self {
        self.connectivity = Some(rx);
        self
    }

    /// Stop early when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Live counters, pollable while a download runs.
    pub fn progress(&self) -> Arc<DownloadProgress> {
        Arc::clone(&self.progress)
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// A closed connectivity source counts as online.
    fn is_offline(&self) -> bool {
        self.connectivity
            .as_ref()
            .is_some_and(|rx| rx.has_changed().is_ok() && !rx.borrow().is_online())
    }

    /// Download every tile of `region` not already in the sink.
    ///
    /// The region is validated before any network activity. The region
    /// name is recorded in the sink even when nothing needs downloading.
    /// Tiles are enumerated lazily, so memory stays bounded by the batch
    /// size rather than the region size.
    pub async fn predownload_region(
        &self,
        region: &RegionSpec,
    ) -> Result<DownloadSummary, CoordError> {
        region.validate()?;
        let start = Instant::now();
        let region_name: Arc<str> = Arc::from(region.name.as_str());
        let total = region.tile_count();

        info!(
            region = %region.name,
            bounds = %region.bounds,
            min_zoom = region.min_zoom,
            max_zoom = region.max_zoom,
            tiles = total,
            "Region download starting"
        );

        if let Err(e) = self.sink.record_region(region).await {
            warn!(region = %region.name, error = %e, "Failed to record region");
        }
        self.progress.start(total, 0, total);

        // Tiles are pulled from the region one batch at a time
        let mut tiles = region.tiles().peekable();
        let mut requeued: VecDeque<DownloadJob> = VecDeque::new();
        let mut cancelled = false;
        let mut skipped = 0u64;
        let mut downloaded = 0u64;
        let mut failed = 0u64;
        let mut bytes_transferred = 0u64;
        let mut connectivity = self.connectivity.clone();
        let batch_size = self.config.batch_size.max(1);

        loop {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let mut batch = Vec::with_capacity(batch_size);
            while batch.len() < batch_size && !self.cancel.is_cancelled() {
                if let Some(job) = requeued.pop_front() {
                    batch.push(job);
                    continue;
                }
                let Some(key) = tiles.next() else {
                    break;
                };
                match self.sink.contains(key).await {
                    Ok(true) => {
                        skipped += 1;
                        self.progress.tile_skipped();
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        debug!(
                            tile = %key,
                            error = %e,
                            "Presence check failed, downloading anyway"
                        );
                    }
                }
                batch.push(DownloadJob {
                    key,
                    region: Arc::clone(&region_name),
                    attempts: 0,
                });
            }

            if batch.is_empty() {
                cancelled = self.cancel.is_cancelled();
                break;
            }
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            if let Some(rx) = connectivity.as_mut() {
                if !rx.borrow().is_online() {
                    info!(region = %region.name, "Offline, download paused");
                    self.progress.set_paused_offline(true);
                    let resumed = wait_until_online(rx, &self.cancel).await;
                    self.progress.set_paused_offline(false);

                    if self.cancel.is_cancelled() {
                        cancelled = true;
                        break;
                    }
                    if resumed {
                        info!(region = %region.name, "Online, download resumed");
                    } else {
                        warn!("Connectivity source closed, continuing without it");
                        connectivity = None;
                    }
                }
            }

            self.progress.jobs_dequeued(batch.len() as u64);
            let outcomes = join_all(batch.into_iter().map(|job| self.run_job(job))).await;

            for outcome in outcomes {
                match outcome {
                    JobOutcome::Downloaded(bytes) => {
                        downloaded += 1;
                        bytes_transferred += bytes;
                    }
                    JobOutcome::Failed => failed += 1,
                    JobOutcome::Requeue(job) => requeued.push_back(job),
                    JobOutcome::Abandoned => cancelled = true,
                }
            }
            if cancelled {
                break;
            }

            let more = !requeued.is_empty() || tiles.peek().is_some();
            if more && !self.config.batch_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.batch_delay) => {}
                    _ = self.cancel.cancelled() => cancelled = true,
                }
            }
        }

        let summary = DownloadSummary {
            region: region.name.clone(),
            total,
            skipped,
            downloaded,
            failed,
            bytes_transferred,
            elapsed: start.elapsed(),
            cancelled,
        };

        if cancelled {
            info!(
                summary = %summary,
                remaining = self.progress.snapshot().queued,
                "Region download cancelled"
            );
        } else {
            info!(summary = %summary, "Region download complete");
        }
        Ok(summary)
    }

    async fn run_job(&self, mut job: DownloadJob) -> JobOutcome {
        let fetched = tokio::select! {
            result = self.fetcher.fetch(job.key) => result,
            _ = self.cancel.cancelled() => {
                self.progress.job_abandoned();
                return JobOutcome::Abandoned;
            }
        };

        match fetched {
            // Storing is not cancellable: a complete tile is never half-written
            Ok(tile) => match self.sink.store(job.key, &tile.bytes).await {
                Ok(()) => {
                    let bytes = tile.bytes.len() as u64;
                    self.progress.job_downloaded(bytes);
                    JobOutcome::Downloaded(bytes)
                }
                Err(e) => {
                    warn!(tile = %job.key, region = %job.region, error = %e, "Failed to store tile");
                    self.progress.job_failed();
                    JobOutcome::Failed
                }
            },
            Err(e) => {
                job.attempts += e.attempts;
                if self.is_offline() {
                    debug!(tile = %job.key, attempts = job.attempts, "Fetch failed while offline, requeueing");
                    self.progress.jobs_requeued(1);
                    JobOutcome::Requeue(job)
                } else {
                    self.progress.job_failed();
                    JobOutcome::Failed
                }
            }
        }
    }
}
