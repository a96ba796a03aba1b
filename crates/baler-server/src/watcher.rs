//! Filesystem watching, bridged into the async world.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Raw signals from the filesystem watcher.
#[derive(Debug)]
pub enum WatchSignal {
    /// A filesystem event
    Event(notify::Event),

    /// The underlying watch failed (e.g. a watched path disappeared)
    Error(String),
}

/// File watcher forwarding notify callbacks into a tokio channel.
///
/// notify delivers events on its own thread; a forwarding thread moves them
/// onto an async channel so the watch session can consume them with
/// `select!`. Events are queued, not dropped, while the consumer is busy.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch the given paths recursively.
    ///
    /// Returns the watcher and the signal channel. The watcher must stay
    /// alive for the subscriptions to hold.
    pub fn new(paths: &[PathBuf]) -> Result<(Self, async_mpsc::Receiver<WatchSignal>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(256);

        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                let signal = match res {
                    Ok(event) => WatchSignal::Event(event),
                    Err(e) => WatchSignal::Error(e.to_string()),
                };
                let _ = sync_tx.send(signal);
            })
            .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
            } else {
                tracing::warn!("watch path does not exist, skipping: {}", path.display());
            }
        }

        std::thread::spawn(move || {
            while let Ok(signal) = sync_rx.recv() {
                if async_tx.blocking_send(signal).is_err() {
                    break;
                }
            }
        });

        Ok((Self { watcher }, async_rx))
    }

    /// Re-subscribe a path (after a lost watch).
    pub fn rewatch(&mut self, path: &Path) -> Result<(), std::io::Error> {
        self.watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(std::io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_paths_are_skipped_without_failing() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("nope");

        let (watcher, mut rx) =
            FileWatcher::new(&[missing, temp.path().to_path_buf()]).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(temp.path().join("a.js"), "1").unwrap();

        let signal = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;
        drop(watcher);

        assert!(matches!(signal, Ok(Some(WatchSignal::Event(_)))));
    }

    #[tokio::test]
    async fn forwards_file_events() {
        let temp = tempdir().unwrap();
        let test_file = temp.path().join("test.js");

        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()]).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&test_file, "console.log(1);").unwrap();

        let signal = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        drop(watcher);

        assert!(signal.is_ok(), "timeout waiting for file watch event");
        assert!(matches!(signal.unwrap(), Some(WatchSignal::Event(_))));
    }
}
