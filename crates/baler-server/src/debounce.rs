//! Event debouncing: many raw notifications, one rebuild.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const DEBOUNCE_MS: u64 = 100;

/// How a path changed within the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// Coalesces rapid successive filesystem events into a single change set.
///
/// Editors write several times per save; without this every save would
/// trigger a rebuild storm. Purely timing and deduplication, no business
/// logic.
#[derive(Debug)]
pub struct Debouncer {
    changes: HashMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
    window: Duration,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::with_window(Duration::from_millis(DEBOUNCE_MS))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            changes: HashMap::new(),
            last_event: None,
            window,
        }
    }

    /// Record a notify event, merging repeated events per path:
    /// removal followed by re-creation keeps the newer kind, creation
    /// followed by removal cancels out, otherwise the first kind wins.
    pub fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(modify) => {
                // Metadata-only changes (mtime/chmod noise) would loop the
                // rebuild forever.
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                ChangeKind::Modified
            }
            _ => return,
        };

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }

            match (self.changes.get(path).copied(), kind) {
                (Some(ChangeKind::Removed), ChangeKind::Created | ChangeKind::Modified) => {
                    self.changes.insert(path.clone(), kind);
                }
                (Some(ChangeKind::Modified), ChangeKind::Removed) => {
                    self.changes.insert(path.clone(), ChangeKind::Removed);
                }
                (Some(ChangeKind::Created), ChangeKind::Removed) => {
                    self.changes.remove(path);
                }
                (Some(_), _) => {}
                (None, _) => {
                    self.changes.insert(path.clone(), kind);
                }
            }

            self.last_event = Some(Instant::now());
        }
    }

    /// Take the accumulated change set if the debounce window has elapsed.
    pub fn take_if_ready(&mut self) -> Option<HashMap<PathBuf, ChangeKind>> {
        if !self.is_ready() {
            return None;
        }

        self.last_event = None;
        let changes = std::mem::take(&mut self.changes);
        if changes.is_empty() {
            return None;
        }
        Some(changes)
    }

    pub fn is_ready(&self) -> bool {
        match self.last_event {
            Some(last) => last.elapsed() >= self.window && !self.changes.is_empty(),
            None => false,
        }
    }

    /// How long to sleep until the window can next be ready.
    pub fn sleep_duration(&self) -> Duration {
        match self.last_event {
            Some(last) => self
                .window
                .saturating_sub(last.elapsed())
                .max(Duration::from_millis(1)),
            // Nothing pending; sleep until an event arrives.
            None => Duration::from_secs(86400),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

/// Editor temp/backup artifacts that never belong to the build.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bak" | "swp" | "swo" | "tmp") || name.ends_with('~') || name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, EventKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> notify::Event {
        notify::Event::new(kind).add_path(PathBuf::from(path))
    }

    fn modify(path: &str) -> notify::Event {
        event(EventKind::Modify(ModifyKind::Any), path)
    }

    #[test]
    fn repeated_events_for_one_path_coalesce() {
        let mut debouncer = Debouncer::with_window(Duration::ZERO);

        for _ in 0..5 {
            debouncer.add_event(&modify("/src/style.scss"));
        }

        let changes = debouncer.take_if_ready().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes.get(Path::new("/src/style.scss")),
            Some(&ChangeKind::Modified)
        );

        // Nothing left for a second cycle.
        assert!(debouncer.take_if_ready().is_none());
    }

    #[test]
    fn not_ready_before_window_elapses() {
        let mut debouncer = Debouncer::with_window(Duration::from_secs(60));
        debouncer.add_event(&modify("/src/index.js"));

        assert!(!debouncer.is_ready());
        assert!(debouncer.take_if_ready().is_none());
        assert!(!debouncer.is_empty());
    }

    #[test]
    fn created_then_removed_cancels_out() {
        let mut debouncer = Debouncer::with_window(Duration::ZERO);

        debouncer.add_event(&event(EventKind::Create(CreateKind::File), "/src/new.js"));
        debouncer.add_event(&event(EventKind::Remove(RemoveKind::File), "/src/new.js"));

        assert!(debouncer.take_if_ready().is_none());
    }

    #[test]
    fn modified_then_removed_upgrades_to_removed() {
        let mut debouncer = Debouncer::with_window(Duration::ZERO);

        debouncer.add_event(&modify("/src/a.js"));
        debouncer.add_event(&event(EventKind::Remove(RemoveKind::File), "/src/a.js"));

        let changes = debouncer.take_if_ready().unwrap();
        assert_eq!(changes.get(Path::new("/src/a.js")), Some(&ChangeKind::Removed));
    }

    #[test]
    fn ignores_editor_temp_files() {
        let mut debouncer = Debouncer::with_window(Duration::ZERO);

        debouncer.add_event(&modify("/src/.index.js.swp"));
        debouncer.add_event(&modify("/src/index.js~"));
        debouncer.add_event(&modify("/src/index.js.tmp"));

        assert!(debouncer.is_empty());
    }

    #[test]
    fn ignores_metadata_only_changes() {
        let mut debouncer = Debouncer::with_window(Duration::ZERO);

        debouncer.add_event(&event(
            EventKind::Modify(ModifyKind::Metadata(notify::event::MetadataKind::Any)),
            "/src/index.js",
        ));

        assert!(debouncer.is_empty());
    }
}
