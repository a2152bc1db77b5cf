use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::BoxFuture;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use weft_core::error::{Result, WeftError};
use weft_core::traits::{FileService, Unsubscribe};
use weft_core::types::{ChangeType, FileChangeEvent, FileContent};

/// [`FileService`] over the local filesystem, watched with `notify`.
///
/// Each subscription watches the file's parent directory, so a file that
/// does not exist yet is reported when it appears. The watcher lives inside
/// the returned [`Unsubscribe`] handle and stops when it runs.
pub struct LocalFileService {
    poll_interval: Option<Duration>,
}

impl LocalFileService {
    /// Use the platform's native change notifications.
    pub fn new() -> Self {
        Self {
            poll_interval: None,
        }
    }

    /// Scan for changes every `interval` instead. For filesystems without
    /// native notifications (network mounts, some containers).
    pub fn polling(interval: Duration) -> Self {
        Self {
            poll_interval: Some(interval),
        }
    }

    fn watcher(&self, handler: impl notify::EventHandler) -> notify::Result<Box<dyn Watcher + Send>> {
        Ok(match self.poll_interval {
            Some(interval) => Box::new(PollWatcher::new(
                handler,
                Config::default().with_poll_interval(interval),
            )?),
            None => Box::new(RecommendedWatcher::new(handler, Config::default())?),
        })
    }
}

impl Default for LocalFileService {
    fn default() -> Self {
        Self::new()
    }
}

impl FileService for LocalFileService {
    fn read_file(&self, path: &Path) -> BoxFuture<'_, Result<FileContent>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| WeftError::FileService {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            Ok(FileContent { content })
        })
    }

    fn subscribe(
        &self,
        path: &Path,
        events: mpsc::UnboundedSender<FileChangeEvent>,
    ) -> Result<Unsubscribe> {
        let service_error = |message: String| WeftError::FileService {
            path: path.display().to_string(),
            message,
        };
        let file_name = path
            .file_name()
            .ok_or_else(|| service_error("not a file path".to_string()))?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        // Some backends report canonical paths; match either spelling.
        let mut targets = vec![path.to_path_buf()];
        if let Ok(canonical) = dir.canonicalize() {
            targets.push(canonical.join(file_name));
        }

        let reported = path.to_path_buf();
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let Some(change) = classify(&event, &targets) else {
                    return;
                };
                trace!(path = %reported.display(), ?change, "File changed");
                let _ = events.send(FileChangeEvent::new(reported.clone(), change));
            }
            Err(e) => warn!(path = %reported.display(), error = %e, "Watch error"),
        };

        let mut watcher = self
            .watcher(handler)
            .map_err(|e| service_error(e.to_string()))?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| service_error(e.to_string()))?;
        debug!(path = %path.display(), polling = self.poll_interval.is_some(), "Watching file");

        Ok(Unsubscribe::new(move || drop(watcher)))
    }
}

/// What a raw watcher event means for one watched file, if anything.
///
/// Renames count as the file disappearing or appearing under its name.
/// Access and metadata-only events leave the content alone and are skipped.
fn classify(event: &Event, targets: &[PathBuf]) -> Option<ChangeType> {
    let is_target = |p: &PathBuf| targets.contains(p);
    match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let from = event.paths.first().is_some_and(is_target);
            let to = event.paths.get(1).is_some_and(is_target);
            match (from, to) {
                (_, true) => Some(ChangeType::Created),
                (true, false) => Some(ChangeType::Deleted),
                _ => None,
            }
        }
        _ if !event.paths.iter().any(is_target) => None,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            Some(ChangeType::Created)
        }
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            Some(ChangeType::Deleted)
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(ChangeType::Modified),
        _ => None,
    }
}
