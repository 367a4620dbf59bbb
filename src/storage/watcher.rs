use crate::error::PlayerError;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Watch the storage root and send a notification on `tx` whenever its
/// top-level contents change (card swapped, folder added or removed).
///
/// # Errors
/// Returns `PlayerError::Watcher` if the file watcher cannot be initialized.
pub async fn watch_root(
    root: PathBuf,
    tx: mpsc::Sender<()>,
    cancel: CancellationToken,
) -> crate::error::Result<()> {
    let (notify_tx, mut notify_rx) = mpsc::channel(16);

    let mut debouncer = new_debouncer(
        Duration::from_millis(500),
        move |events: Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>| {
            match events {
                Ok(evts) => {
                    for evt in evts {
                        if evt.kind == DebouncedEventKind::Any {
                            let _ = notify_tx.blocking_send(evt.path);
                        }
                    }
                }
                Err(e) => {
                    warn!("storage watcher error: {e}");
                }
            }
        },
    )
    .map_err(|e| PlayerError::Watcher(e.to_string()))?;

    debouncer
        .watcher()
        .watch(&root, notify::RecursiveMode::NonRecursive)
        .map_err(|e| PlayerError::Watcher(format!("{}: {e}", root.display())))?;
    info!("watching storage root: {}", root.display());

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("storage watcher shutting down");
                return Ok(());
            }
            changed = notify_rx.recv() => {
                let Some(path) = changed else {
                    return Ok(());
                };
                debug!("storage changed: {}", path.display());
                // The navigation task coalesces; a full channel already
                // carries a pending rescan.
                let _ = tx.try_send(());
            }
        }
    }
}
