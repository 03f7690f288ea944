//! Lock-free download progress counters.
//!
//! A [`DownloadProgress`] is shared via `Arc` between the downloader and
//! any number of observers (progress bars, status endpoints). Observers
//! call [`DownloadProgress::snapshot`] whenever they like.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Live counters for one region download.
///
/// All operations use `Relaxed` ordering; counters are independent and a
/// snapshot is only a point-in-time approximation.
#[derive(Debug, Default)]
pub struct DownloadProgress {
    /// Tiles in the region.
    total: AtomicU64,
    /// Tiles found already present.
    skipped: AtomicU64,
    /// Tiles not yet checked or dispatched, plus requeued jobs.
    queued: AtomicU64,
    /// Jobs currently being fetched or stored.
    in_flight: AtomicU64,
    downloaded: AtomicU64,
    failed: AtomicU64,
    bytes_transferred: AtomicU64,
    /// Set while dequeueing is paused for lack of connectivity.
    paused_offline: AtomicBool,
}

/// Point-in-time copy of [`DownloadProgress`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: u64,
    pub skipped: u64,
    pub queued: u64,
    pub in_flight: u64,
    pub downloaded: u64,
    pub failed: u64,
    pub bytes_transferred: u64,
    pub paused_offline: bool,
}

impl ProgressSnapshot {
    /// Tiles accounted for so far (skipped, downloaded or failed).
    pub fn completed(&self) -> u64 {
        self.skipped + self.downloaded + self.failed
    }

    /// Completion percentage (0.0 to 100.0).
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed() as f64 / self.total as f64 * 100.0
        }
    }
}

impl DownloadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn start(&self, total: u64, skipped: u64, queued: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.skipped.store(skipped, Ordering::Relaxed);
        self.queued.store(queued, Ordering::Relaxed);
        self.in_flight.store(0, Ordering::Relaxed);
        self.downloaded.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.bytes_transferred.store(0, Ordering::Relaxed);
        self.paused_offline.store(false, Ordering::Relaxed);
    }

    /// A queued tile turned out to be present already.
    pub(crate) fn tile_skipped(&self) {
        self.queued.fetch_sub(1, Ordering::Relaxed);
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn jobs_dequeued(&self, count: u64) {
        self.queued.fetch_sub(count, Ordering::Relaxed);
        self.in_flight.fetch_add(count, Ordering::Relaxed);
    }

    /// Jobs returned to the queue unfinished.
    pub(crate) fn jobs_requeued(&self, count: u64) {
        self.in_flight.fetch_sub(count, Ordering::Relaxed);
        self.queued.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn job_downloaded(&self, bytes: u64) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_transferred.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn job_failed(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Abandoned by cancellation: no longer in flight, not a failure.
    pub(crate) fn job_abandoned(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn set_paused_offline(&self, paused: bool) {
        self.paused_offline.store(paused, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            downloaded: self.downloaded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes_transferred: self.bytes_transferred.load(Ordering::Relaxed),
            paused_offline: self.paused_offline.load(Ordering::Relaxed),
        }
    }
}
