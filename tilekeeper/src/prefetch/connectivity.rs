//! Network connectivity as an explicit input.
//!
//! The host application owns a `watch::Sender<Connectivity>` and flips it
//! as the network comes and goes; the downloader and the tile service hold
//! receivers.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    #[default]
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

/// Create a connectivity channel starting in `initial`.
pub fn channel(initial: Connectivity) -> (watch::Sender<Connectivity>, watch::Receiver<Connectivity>) {
    watch::channel(initial)
}

/// Wait until the state is online.
///
/// Returns `false` if `cancel` fires first or the sender is dropped while
/// offline.
pub async fn wait_until_online(
    rx: &mut watch::Receiver<Connectivity>,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        result = rx.wait_for(|state| state.is_online()) => result.is_ok(),
        _ = cancel.cancelled() => false,
    }
}
