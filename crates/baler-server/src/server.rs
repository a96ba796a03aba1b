//! HTTP server for the development session.
//!
//! Serves the most recently assembled manifest from memory and exposes the
//! hot-update WebSocket channel.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio::sync::{watch, RwLock};

use baler_build::OutputManifest;

use crate::hub::{hmr_client_script, HmrHub, HmrMessage};

/// Errors from the dev server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("File watch error: {0}")]
    Watch(String),

    #[error("Watch subscription for {path} could not be restored: {message}")]
    WatchLost { path: String, message: String },
}

/// State shared between the server and the watch session.
pub struct ServerState {
    /// Most recently assembled output, replaced wholesale after each
    /// successful rebuild
    pub manifest: RwLock<OutputManifest>,

    /// Connected-client registry for hot updates
    pub hub: HmrHub,
}

impl ServerState {
    pub fn new(manifest: OutputManifest) -> Arc<Self> {
        Arc::new(Self {
            manifest: RwLock::new(manifest),
            hub: HmrHub::new(),
        })
    }
}

/// Development HTTP server.
pub struct DevServer {
    state: Arc<ServerState>,
}

impl DevServer {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/__hmr", get(ws_handler))
            .route("/__hmr.js", get(hmr_script_handler))
            .fallback(get(asset_handler))
            .with_state(Arc::clone(&self.state))
    }

    /// Serve until the shutdown signal flips.
    pub async fn run(
        self,
        host: &str,
        port: u16,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ServerError> {
        let addr = format!("{host}:{port}");

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            ServerError::Bind {
                addr: addr.clone(),
                message: e.to_string(),
            }
        })?;

        tracing::info!("dev server listening at http://{addr}");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await
            .map_err(|e| ServerError::Bind {
                addr,
                message: e.to_string(),
            })
    }
}

fn content_type(filename: &str) -> &'static str {
    let ext = filename.rsplit('.').next().unwrap_or("");
    match ext {
        "html" => "text/html; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// Serve a manifest file by its emitted filename.
async fn asset_handler(State(state): State<Arc<ServerState>>, uri: Uri) -> impl IntoResponse {
    let mut path = uri.path().trim_start_matches('/').to_string();
    if path.is_empty() {
        path = "index.html".to_string();
    }

    let manifest = state.manifest.read().await;

    let Some(file) = manifest.by_filename(&path) else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };

    let ct = content_type(&file.filename);

    // Served entry documents get the hot-update client appended; the file
    // on disk stays byte-identical to the one-shot build output.
    if ct.starts_with("text/html") {
        let html = String::from_utf8_lossy(&file.content);
        let tag = "  <script src=\"/__hmr.js\"></script>\n";
        let html = match html.find("</body>") {
            Some(pos) => {
                let mut out = html.into_owned();
                out.insert_str(pos, tag);
                out
            }
            None => format!("{html}{tag}"),
        };
        return ([(header::CONTENT_TYPE, ct)], html).into_response();
    }

    ([(header::CONTENT_TYPE, ct)], file.content.clone()).into_response()
}

/// Handler for the hot-update WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Forward hub messages to one client until it disconnects.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    let Ok(msg) = serde_json::to_string(&HmrMessage::Connected) else {
        return;
    };
    if socket.send(Message::Text(msg.into())).await.is_err() {
        return;
    }

    while let Ok(hmr_msg) = rx.recv().await {
        let Ok(json) = serde_json::to_string(&hmr_msg) else {
            continue;
        };
        if socket.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
}

/// Handler for the hot-update client script.
async fn hmr_script_handler() -> impl IntoResponse {
    let script = hmr_client_script("/__hmr");
    ([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use baler_build::{OutputFile, OutputKind};

    fn manifest() -> OutputManifest {
        let mut manifest = OutputManifest::default();
        manifest.insert(
            "index.js",
            OutputFile {
                filename: "index.bundle.js".to_string(),
                kind: OutputKind::Script,
                content: b"console.log(1);".to_vec(),
            },
        );
        manifest.insert(
            "index.html",
            OutputFile {
                filename: "index.html".to_string(),
                kind: OutputKind::Html,
                content: b"<html><body></body></html>".to_vec(),
            },
        );
        manifest
    }

    #[test]
    fn content_types_cover_bundle_outputs() {
        assert_eq!(content_type("index.bundle.js"), "text/javascript; charset=utf-8");
        assert_eq!(content_type("index.bundle.css"), "text/css; charset=utf-8");
        assert_eq!(content_type("index.html"), "text/html; charset=utf-8");
    }

    #[tokio::test]
    async fn state_swaps_manifest_wholesale() {
        let state = ServerState::new(manifest());

        {
            let read = state.manifest.read().await;
            assert!(read.by_filename("index.bundle.js").is_some());
        }

        *state.manifest.write().await = OutputManifest::default();
        assert!(state.manifest.read().await.by_filename("index.bundle.js").is_none());
    }

    #[tokio::test]
    async fn router_builds_with_state() {
        let state = ServerState::new(manifest());
        let _router = DevServer::new(state).router();
    }
}
