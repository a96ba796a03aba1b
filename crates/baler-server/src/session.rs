//! The watch/serve loop.
//!
//! A single coordinating task consumes debounced change events and drives
//! the `Idle -> Watching -> Rebuilding -> Watching -> ... -> Stopped` state
//! machine. At most one rebuild cycle is in flight at a time; events that
//! arrive during a cycle queue on the channel and coalesce into exactly one
//! follow-up cycle.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use baler_build::{BuildError, BuildOutput, Builder, OutputManifest};
use baler_pipeline::{classify, PipelineKind};

use crate::debounce::{ChangeKind, Debouncer};
use crate::hub::HmrMessage;
use crate::server::{ServerError, ServerState};
use crate::watcher::{FileWatcher, WatchSignal};

/// Consecutive resubscription failures tolerated before the session stops
/// with a fatal error.
const MAX_WATCH_FAILURES: u32 = 5;

/// States of the watch/serve loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Watching,
    Rebuilding,
    Stopped,
}

/// Session lifecycle transitions exposed to registered hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    SessionStart,
    SessionStop,
}

type LifecycleHook = Box<dyn Fn(LifecycleEvent) + Send + Sync>;

/// One long-running development invocation.
///
/// Owns the watched-path set and, through [`ServerState`], the
/// connected-client registry. Every asset referenced by an active bundle
/// lives under the source root and is therefore covered by the recursive
/// root subscription; configured extra paths are added on top, never
/// replacing the graph set.
pub struct WatchSession {
    builder: Builder,
    server: Arc<ServerState>,
    current: BuildOutput,
    canonical_root: PathBuf,
    hooks: Vec<LifecycleHook>,
    state_tx: watch::Sender<LoopState>,
    state_rx: watch::Receiver<LoopState>,
    cycles: Arc<AtomicUsize>,
}

impl WatchSession {
    /// Create a session around an initial successful build.
    pub fn new(builder: Builder, initial: BuildOutput, server: Arc<ServerState>) -> Self {
        let canonical_root = builder
            .config()
            .source_root
            .canonicalize()
            .unwrap_or_else(|_| builder.config().source_root.clone());

        let (state_tx, state_rx) = watch::channel(LoopState::Idle);

        Self {
            builder,
            server,
            current: initial,
            canonical_root,
            hooks: Vec::new(),
            state_tx,
            state_rx,
            cycles: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register a handler invoked at session start and stop.
    pub fn on_lifecycle(&mut self, hook: impl Fn(LifecycleEvent) + Send + Sync + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Observe loop state transitions.
    pub fn state(&self) -> watch::Receiver<LoopState> {
        self.state_rx.clone()
    }

    /// Counter of completed rebuild cycles.
    pub fn cycle_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.cycles)
    }

    fn set_state(&self, state: LoopState) {
        let _ = self.state_tx.send(state);
    }

    fn fire(&self, event: LifecycleEvent) {
        for hook in &self.hooks {
            hook(event);
        }
    }

    /// Paths to subscribe: the source root plus configured extra paths,
    /// strictly additive.
    fn watch_paths(&self) -> Vec<PathBuf> {
        let config = self.builder.config();
        let mut paths = vec![config.source_root.clone()];
        for extra in &config.dev.watch {
            let full = config.source_root.join(extra);
            if !paths.contains(&full) {
                paths.push(full);
            }
        }
        paths
    }

    /// Run the loop until shutdown.
    ///
    /// Shutdown is observed only between cycles, so an in-flight rebuild
    /// always reaches a terminal outcome before watch handles are released;
    /// no half-written update is ever delivered. Signalling shutdown more
    /// than once is harmless.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        let (mut watcher, mut rx) =
            FileWatcher::new(&self.watch_paths()).map_err(|e| ServerError::Watch(e.to_string()))?;

        let mut debouncer = Debouncer::new();
        let mut watch_failures = 0u32;

        self.fire(LifecycleEvent::SessionStart);
        self.set_state(LoopState::Watching);

        let result = loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break Ok(());
                    }
                }
                signal = rx.recv() => match signal {
                    Some(WatchSignal::Event(event)) => debouncer.add_event(&event),
                    Some(WatchSignal::Error(message)) => {
                        if let Err(e) = self
                            .recover_watch(&mut watcher, &mut watch_failures, message)
                            .await
                        {
                            break Err(e);
                        }
                    }
                    None => break Ok(()),
                },
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    if let Some(changes) = debouncer.take_if_ready() {
                        self.rebuild_cycle(changes).await;
                    }
                }
            }
        };

        // Terminal: release subscriptions, close client channels.
        drop(watcher);
        self.set_state(LoopState::Stopped);
        self.fire(LifecycleEvent::SessionStop);

        result
    }

    /// Map absolute notification paths back to source-root-relative ones.
    fn relativize(&self, changes: &HashMap<PathBuf, ChangeKind>) -> HashSet<PathBuf> {
        let root = &self.builder.config().source_root;
        changes
            .keys()
            .filter_map(|path| {
                path.strip_prefix(&self.canonical_root)
                    .or_else(|_| path.strip_prefix(root))
                    .ok()
                    .map(Path::to_path_buf)
            })
            .collect()
    }

    /// One `Rebuilding` cycle: rebuild the affected bundles and push the
    /// resulting updates. A stage failure is reported to the operator and
    /// the clients, and the previous manifest stays served untouched.
    async fn rebuild_cycle(&mut self, changes: HashMap<PathBuf, ChangeKind>) {
        self.set_state(LoopState::Rebuilding);
        self.cycles.fetch_add(1, Ordering::Relaxed);

        let changed = self.relativize(&changes);

        if changed.is_empty() {
            self.set_state(LoopState::Watching);
            return;
        }

        tracing::info!("rebuilding ({} changed paths)", changed.len());

        let result =
            tokio::task::block_in_place(|| self.builder.rebuild(&self.current, &changed));

        match result {
            Ok(output) => {
                let untouched = output.bundles_built.is_empty()
                    && manifests_equal(&output.manifest, &self.current.manifest);

                if untouched {
                    tracing::debug!("no bundle affected, nothing to push");
                } else {
                    tracing::info!(
                        "rebuilt {} bundle(s) in {}ms",
                        output.bundles_built.len(),
                        output.duration_ms
                    );
                    self.push_updates(&output, &changed).await;
                    *self.server.manifest.write().await = output.manifest.clone();
                    self.current = output;
                }
            }
            Err(BuildError::Stage(e)) => {
                tracing::error!("rebuild failed: {e}");
                self.server.hub.send(HmrMessage::BuildFailed {
                    stage: e.stage,
                    message: e.message,
                });
            }
            Err(e) => {
                // A vanished file or broken config mid-session is reported
                // like a stage failure; the loop keeps watching.
                tracing::error!("rebuild failed: {e}");
                self.server.hub.send(HmrMessage::BuildFailed {
                    stage: "build".to_string(),
                    message: e.to_string(),
                });
            }
        }

        self.set_state(LoopState::Watching);
    }

    /// Push hot updates for a successful rebuild.
    ///
    /// A change set consisting solely of stylesheets becomes per-module
    /// stylesheet updates; everything else is a full reload.
    async fn push_updates(&self, output: &BuildOutput, changed: &HashSet<PathBuf>) {
        let root = &self.builder.config().source_root;

        let style_only = !changed.is_empty()
            && changed
                .iter()
                .all(|path| matches!(classify(path, root), Ok(PipelineKind::Stylesheet)));

        if style_only {
            let updates = tokio::task::block_in_place(|| {
                self.builder.style_updates(&output.graph, changed)
            });

            match updates {
                Ok(updates) if !updates.is_empty() => {
                    for update in updates {
                        self.server.hub.send(HmrMessage::UpdateStylesheet {
                            path: update.source_path.to_string_lossy().into_owned(),
                            css: update.css,
                        });
                    }
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("stylesheet update failed, falling back to reload: {e}");
                }
            }
        }

        self.server.hub.send(HmrMessage::Reload);
    }

    /// Resubscribe after a lost watch, with exponential backoff. Repeated
    /// failures for the source root (required by every active entry) are
    /// escalated as a fatal error.
    async fn recover_watch(
        &self,
        watcher: &mut FileWatcher,
        failures: &mut u32,
        message: String,
    ) -> Result<(), ServerError> {
        tracing::warn!("filesystem watch error: {message}");
        let root = self.builder.config().source_root.clone();

        loop {
            let delay = Duration::from_millis(100u64.saturating_mul(1 << *failures));
            tokio::time::sleep(delay).await;

            match watcher.rewatch(&root) {
                Ok(()) => {
                    tracing::info!("watch restored for {}", root.display());
                    *failures = 0;
                    return Ok(());
                }
                Err(e) => {
                    *failures += 1;
                    tracing::warn!(
                        "resubscription attempt {} failed for {}: {e}",
                        failures,
                        root.display()
                    );
                    if *failures >= MAX_WATCH_FAILURES {
                        return Err(ServerError::WatchLost {
                            path: root.display().to_string(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
    }
}

fn manifests_equal(a: &OutputManifest, b: &OutputManifest) -> bool {
    a.files.len() == b.files.len()
        && a.files.iter().all(|(logical, file)| {
            b.files
                .get(logical)
                .is_some_and(|other| other.filename == file.filename && other.content == file.content)
        })
}
