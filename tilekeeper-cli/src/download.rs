//! Region download into a `<z>/<x>/<y>.png` directory tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tilekeeper::coord::RegionSpec;
use tilekeeper::prefetch::{
    AsyncHttpClient, DirectorySink, DownloadConfig, DownloadProgress, DownloadSummary,
    RegionDownloader, TileFetcher, TileSource,
};
use tokio_util::sync::CancellationToken;

use crate::error::CliError;

/// How often the progress bar polls the downloader.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Everything needed to download one region.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub region: RegionSpec,
    pub out_dir: PathBuf,
    pub config: DownloadConfig,
    pub source: TileSource,
    /// Draw a progress bar on stderr.
    pub show_progress: bool,
}

/// Download `request.region` into `request.out_dir`, blocking until done.
///
/// Per-tile failures are reported in the summary, not as errors.
pub fn run_download<C>(client: C, request: &DownloadRequest) -> Result<DownloadSummary, CliError>
where
    C: AsyncHttpClient + 'static,
{
    request.region.validate()?;
    create_dir(&request.out_dir)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    runtime.block_on(async {
        let fetcher = Arc::new(TileFetcher::new(
            Arc::new(client),
            request.source.clone(),
            request.config.max_retries,
        ));
        let sink = Arc::new(DirectorySink::new(&request.out_dir));
        let downloader = RegionDownloader::new(fetcher, sink, request.config.clone());

        let stop = CancellationToken::new();
        let reporter = request.show_progress.then(|| {
            let bar = progress_bar(request.region.tile_count());
            tokio::spawn(report_progress(downloader.progress(), bar, stop.clone()))
        });

        let result = downloader.predownload_region(&request.region).await;

        stop.cancel();
        if let Some(reporter) = reporter {
            // The reporter only fails if it panicked; the download result stands
            let _ = reporter.await;
        }
        result.map_err(CliError::from)
    })
}

fn create_dir(path: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(path).map_err(|error| CliError::FileWrite {
        path: path.to_path_buf(),
        error,
    })
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tiles ({per_sec}, eta {eta}) {msg}",
    ) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

async fn report_progress(progress: Arc<DownloadProgress>, bar: ProgressBar, stop: CancellationToken) {
    loop {
        let snapshot = progress.snapshot();
        bar.set_position(snapshot.completed());
        if snapshot.paused_offline {
            bar.set_message("paused: offline");
        } else if snapshot.failed > 0 {
            bar.set_message(format!("{} failed", snapshot.failed));
        }

        tokio::select! {
            _ = tokio::time::sleep(PROGRESS_INTERVAL) => {}
            _ = stop.cancelled() => break,
        }
    }

    let snapshot = progress.snapshot();
    bar.set_position(snapshot.completed());
    bar.finish_and_clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tilekeeper::coord::BoundingBox;
    use tilekeeper::prefetch::NetworkError;
    use tempfile::TempDir;

    struct StubClient {
        calls: Arc<AtomicUsize>,
        fail_every: Option<usize>,
    }

    impl AsyncHttpClient for StubClient {
        async fn get(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_every.is_some_and(|every| n % every == 0) {
                return Err(NetworkError::Status {
                    status: 500,
                    url: url.to_string(),
                });
            }
            let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
            bytes.extend_from_slice(url.as_bytes());
            Ok(bytes)
        }
    }

    fn request(out_dir: PathBuf) -> DownloadRequest {
        DownloadRequest {
            region: RegionSpec::new("Paris", BoundingBox::new(48.9, 48.8, 2.4, 2.2), 10, 12),
            out_dir,
            config: DownloadConfig::default().with_batch_delay(Duration::ZERO),
            source: TileSource::default(),
            show_progress: false,
        }
    }

    #[test]
    fn test_writes_tile_tree() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path().join("out");
        let calls = Arc::new(AtomicUsize::new(0));
        let client = StubClient {
            calls: Arc::clone(&calls),
            fail_every: None,
        };

        let summary = run_download(client, &request(out_dir.clone())).unwrap();

        assert_eq!(summary.total, 14);
        assert_eq!(summary.downloaded, 14);
        assert!(out_dir.join("10").join("518").join("352.png").is_file());
        assert!(out_dir.join("12").join("2075").join("1410.png").is_file());
        assert_eq!(calls.load(Ordering::SeqCst), 14);
    }

    #[test]
    fn test_second_run_skips_existing_files() {
        let temp_dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let req = request(temp_dir.path().to_path_buf());

        run_download(StubClient { calls: Arc::clone(&calls), fail_every: None }, &req).unwrap();
        let second =
            run_download(StubClient { calls: Arc::clone(&calls), fail_every: None }, &req).unwrap();

        assert_eq!(second.skipped, 14);
        assert_eq!(calls.load(Ordering::SeqCst), 14);
    }

    #[test]
    fn test_invalid_zoom_override_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut req = request(temp_dir.path().join("never"));
        req.region.min_zoom = 14;

        let err = run_download(
            StubClient { calls: Arc::new(AtomicUsize::new(0)), fail_every: None },
            &req,
        )
        .unwrap_err();

        assert!(matches!(err, CliError::Region(_)));
        assert!(!temp_dir.path().join("never").exists());
    }
}
