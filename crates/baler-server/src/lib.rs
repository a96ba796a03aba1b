//! Development server with hot updates for baler.
//!
//! Watches the source tree, rebuilds affected bundles incrementally, serves
//! the latest assembled manifest over HTTP and pushes module updates to
//! connected clients over a WebSocket channel.

pub mod debounce;
pub mod hub;
pub mod server;
pub mod session;
pub mod watcher;

pub use debounce::{ChangeKind, Debouncer};
pub use hub::{hmr_client_script, HmrHub, HmrMessage};
pub use server::{DevServer, ServerError, ServerState};
pub use session::{LifecycleEvent, LoopState, WatchSession};
pub use watcher::{FileWatcher, WatchSignal};
