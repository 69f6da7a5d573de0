// WebSocket push channel
//
// Connects to Moonraker's /websocket endpoint, subscribes to printer object
// updates, and forwards each notify_gcode_response event to an unbounded
// channel. The reader task exits when the connection closes or when the
// receiving side is dropped.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::error::{ConsoleError, Result};
use crate::models::ConsoleMessage;

/// Connect and subscribe, returning a receiver of pushed console messages.
///
/// Connection or subscription failure is returned to the caller; once this
/// function returns `Ok`, read errors only end the stream (the receiver sees
/// end-of-channel), they are never surfaced as panics or further errors.
pub async fn open_console_stream(ws_url: &str) -> Result<mpsc::UnboundedReceiver<ConsoleMessage>> {
    let (mut stream, _) = connect_async(ws_url)
        .await
        .map_err(|e| ConsoleError::backend(format!("WebSocket connect failed: {e}")))?;

    let subscribe = json!({
        "jsonrpc": "2.0",
        "method": "printer.objects.subscribe",
        "params": {
            "objects": {
                "gcode_move": null,
                "toolhead": null,
            }
        },
        "id": 1,
    });
    stream
        .send(Message::Text(subscribe.to_string()))
        .await
        .map_err(|e| ConsoleError::backend(format!("WebSocket subscribe failed: {e}")))?;

    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if let Some(msg) = parse_notification(&text) {
                        if tx.send(msg).is_err() {
                            // Receiver gone; the viewer has shut down.
                            break;
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("websocket closed by server");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("websocket read error: {e}");
                    break;
                }
            }
        }
        debug!("console stream reader finished");
    });

    Ok(rx)
}

/// Extract a console message from a notify_gcode_response frame; anything
/// else is ignored.
fn parse_notification(text: &str) -> Option<ConsoleMessage> {
    let data: Value = serde_json::from_str(text).ok()?;
    if data.get("method")?.as_str()? != "notify_gcode_response" {
        return None;
    }
    let message = data.get("params")?.as_array()?.first()?.as_str()?.to_string();
    let time = data
        .get("time")
        .and_then(Value::as_f64)
        .unwrap_or_else(|| chrono::Local::now().timestamp() as f64);

    Some(ConsoleMessage {
        message,
        time,
        kind: "response".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gcode_response_notification_is_parsed() {
        let frame = r#"{"jsonrpc":"2.0","method":"notify_gcode_response","params":["ok T:25.0"]}"#;
        let msg = parse_notification(frame).unwrap();
        assert_eq!(msg.message, "ok T:25.0");
        assert_eq!(msg.kind, "response");
    }

    #[test]
    fn other_notifications_are_ignored() {
        let frame = r#"{"jsonrpc":"2.0","method":"notify_status_update","params":[{}]}"#;
        assert!(parse_notification(frame).is_none());
    }

    #[test]
    fn garbage_frames_are_ignored() {
        assert!(parse_notification("not json").is_none());
        assert!(parse_notification(r#"{"params":["x"]}"#).is_none());
    }
}
