//! Broadcast hub for hot-update messages.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Messages pushed to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HmrMessage {
    /// Connection established
    Connected,

    /// Full page reload (script or template change)
    Reload,

    /// Replace the styles of one stylesheet module in place
    UpdateStylesheet {
        /// Source path of the module (matches the `data-source` attribute)
        path: String,
        /// New CSS content
        css: String,
    },

    /// A rebuild failed; the previous output is still being served
    BuildFailed {
        /// Name of the failing stage
        stage: String,
        /// Diagnostic message
        message: String,
    },
}

/// Fans hot-update messages out to every connected client.
///
/// Delivery is fire-and-forget per client: a slow or disconnected receiver
/// lags or drops out of the broadcast channel without blocking the sender
/// or the other clients.
#[derive(Debug, Clone)]
pub struct HmrHub {
    sender: broadcast::Sender<HmrMessage>,
}

impl HmrHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: HmrMessage) {
        // Ignore send errors (no receivers)
        let _ = self.sender.send(msg);
    }

    /// Subscribe to hot-update messages.
    pub fn subscribe(&self) -> broadcast::Receiver<HmrMessage> {
        self.sender.subscribe()
    }

    /// Number of currently connected clients.
    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for HmrHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate the client-side hot-update script.
///
/// Stylesheet updates swap the text of the matching
/// `<style data-source="...">` element the bundle's style runtime created;
/// anything else falls back to a reload. Development-only, never part of
/// production output.
pub fn hmr_client_script(ws_path: &str) -> String {
    format!(
        r#"
(function() {{
  'use strict';

  var ws = new WebSocket((location.protocol === 'https:' ? 'wss://' : 'ws://') + location.host + '{}');
  var reconnectAttempts = 0;
  var maxReconnectAttempts = 10;

  ws.onopen = function() {{
    console.log('[baler] connected');
    reconnectAttempts = 0;
  }};

  ws.onmessage = function(event) {{
    var msg = JSON.parse(event.data);

    switch (msg.type) {{
      case 'connected':
        break;

      case 'reload':
        location.reload();
        break;

      case 'update_stylesheet':
        var el = document.querySelector('style[data-source="' + msg.path + '"]');
        if (el) {{
          el.textContent = msg.css;
          console.log('[baler] updated styles from ' + msg.path);
        }} else {{
          location.reload();
        }}
        break;

      case 'build_failed':
        console.error('[baler] build failed in stage ' + msg.stage + ': ' + msg.message);
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[baler] disconnected');
    if (reconnectAttempts < maxReconnectAttempts) {{
      reconnectAttempts++;
      setTimeout(function() {{
        location.reload();
      }}, 1000 * reconnectAttempts);
    }}
  }};
}})();
"#,
        ws_path
    )
}
