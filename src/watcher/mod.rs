use notify::{RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use crate::Result;

/// Debounced change notifications for the data file.
///
/// The parent directory is watched rather than the file itself so that
/// writers replacing the file through a rename are still seen.
pub struct Watcher {
    path: PathBuf,
    debounce: Duration,
}

/// Live subscription; dropping it stops watching
pub struct Changes {
    _debouncer: Debouncer<RecommendedWatcher>,
    rx: mpsc::Receiver<()>,
}

impl Changes {
    /// Wait for the next burst of changes to settle
    pub async fn next(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

impl Watcher {
    pub fn new(path: PathBuf, debounce: Duration) -> Self {
        Self { path, debounce }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn watch(&self) -> Result<Changes> {
        // One pending notification is enough; later ones coalesce into it
        let (tx, rx) = mpsc::channel(1);
        let file_name = self.path.file_name().map(OsString::from);

        let mut debouncer = new_debouncer(self.debounce, move |res: DebounceEventResult| {
            match res {
                Ok(events) => {
                    let touched = events
                        .iter()
                        .any(|event| is_target(&event.path, file_name.as_deref()));
                    if touched {
                        let _ = tx.try_send(());
                    }
                }
                Err(e) => tracing::warn!("watch error: {:?}", e),
            }
        })?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        debouncer.watcher().watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!("Watching {}", self.path.display());

        Ok(Changes { _debouncer: debouncer, rx })
    }
}

fn is_target(path: &Path, file_name: Option<&std::ffi::OsStr>) -> bool {
    match file_name {
        Some(name) => path.file_name() == Some(name),
        None => false,
    }
}
