// HTTP client for the Moonraker REST API
//
// Moonraker wraps successful responses in {"result": ...} and failures in
// {"error": {...}}; both are unwrapped here so callers only ever see the
// payload or a ConsoleError::Backend.

use anyhow::{Context, Result as AnyResult};
use reqwest::multipart;
use reqwest::Client;
use serde_json::Value;
use std::path::Path;

use crate::config::Config;
use crate::error::{ConsoleError, Result};

pub struct MoonrakerClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl MoonrakerClient {
    pub fn new(config: &Config) -> AnyResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Verify the server is reachable. Called once at startup; a failure
    /// here is fatal to the process.
    pub async fn connect(&self) -> AnyResult<()> {
        self.server_info()
            .await
            .map(|_| ())
            .with_context(|| format!("Failed to connect to Moonraker at {}", self.base_url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// WebSocket endpoint derived from the HTTP base URL.
    pub fn websocket_url(&self) -> String {
        let ws_base = self
            .base_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        format!("{ws_base}/websocket")
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header("X-Api-Key", key);
        }
        builder
    }

    /// Unwrap Moonraker's response envelope.
    fn unwrap_envelope(mut body: Value) -> Result<Value> {
        if let Some(result) = body.get_mut("result") {
            return Ok(result.take());
        }
        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(ConsoleError::backend(format!("Moonraker error: {message}")));
        }
        Ok(body)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConsoleError::backend(format!(
                "Moonraker request failed: {status} {body}"
            )));
        }
        let body: Value = response.json().await?;
        Self::unwrap_envelope(body)
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        tracing::debug!(path, "GET");
        self.send(self.request(reqwest::Method::GET, path).query(query))
            .await
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value> {
        tracing::debug!(path, "POST");
        self.send(self.request(reqwest::Method::POST, path).json(&body))
            .await
    }

    // -- server / printer info --

    pub async fn server_info(&self) -> Result<Value> {
        self.get("/server/info", &[]).await
    }

    pub async fn printer_info(&self) -> Result<Value> {
        self.get("/printer/info", &[]).await
    }

    // -- printer objects --

    pub async fn list_objects(&self) -> Result<Vec<String>> {
        let result = self.get("/printer/objects/list", &[]).await?;
        let objects = result
            .get("objects")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(objects)
    }

    /// Query object state. Returns the "status" map keyed by object name;
    /// all fields of each object are requested.
    pub async fn query_objects(&self, objects: &[&str]) -> Result<Value> {
        let query: Vec<(&str, String)> =
            objects.iter().map(|obj| (*obj, String::new())).collect();
        let mut result = self.get("/printer/objects/query", &query).await?;
        Ok(result
            .get_mut("status")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    // -- G-code --

    /// Execute a G-code script and return its textual output ("ok" when the
    /// command produced none).
    pub async fn run_gcode(&self, script: &str) -> Result<String> {
        let result = self
            .send(
                self.request(reqwest::Method::POST, "/printer/gcode/script")
                    .query(&[("script", script)]),
            )
            .await?;
        Ok(match result {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    pub async fn gcode_help(&self) -> Result<Vec<(String, String)>> {
        let result = self.get("/printer/gcode/help", &[]).await?;
        let mut commands: Vec<(String, String)> = result
            .as_object()
            .map(|map| {
                map.iter()
                    .map(|(name, help)| {
                        (
                            name.clone(),
                            help.as_str().unwrap_or_default().to_string(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        commands.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(commands)
    }

    /// Last `count` entries from the gcode_store message history.
    pub async fn gcode_store(&self, count: usize) -> Result<Vec<Value>> {
        let status = self.query_objects(&["gcode_store"]).await?;
        let mut messages: Vec<Value> = status
            .get("gcode_store")
            .and_then(|store| store.get("gcode_store"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if messages.len() > count {
            messages = messages.split_off(messages.len() - count);
        }
        Ok(messages)
    }

    pub async fn query_endstops(&self) -> Result<Value> {
        self.get("/printer/query_endstops/status", &[]).await
    }

    pub async fn start_print(&self, filename: &str) -> Result<Value> {
        self.post_json(
            "/printer/print/start",
            serde_json::json!({ "filename": filename }),
        )
        .await
    }

    // -- files and directories --

    pub async fn list_files(&self, root: &str) -> Result<Vec<Value>> {
        let result = self
            .get("/server/files/list", &[("path", root.to_string())])
            .await?;
        Ok(match result {
            Value::Array(files) => files,
            Value::Object(mut map) => map
                .remove("files")
                .and_then(|v| v.as_array().cloned())
                .unwrap_or_default(),
            _ => Vec::new(),
        })
    }

    pub async fn file_metadata(&self, filename: &str) -> Result<Value> {
        self.get(
            "/server/files/metadata",
            &[("filename", filename.to_string())],
        )
        .await
    }

    pub async fn delete_file(&self, filename: &str) -> Result<Value> {
        let encoded = urlencode(filename);
        self.send(self.request(
            reqwest::Method::DELETE,
            &format!("/server/files/gcodes/{encoded}"),
        ))
        .await
    }

    pub async fn move_file(&self, source: &str, dest: &str) -> Result<Value> {
        self.post_json(
            "/server/files/move",
            serde_json::json!({
                "source": format!("gcodes/{source}"),
                "dest": format!("gcodes/{dest}"),
            }),
        )
        .await
    }

    pub async fn copy_file(&self, source: &str, dest: &str) -> Result<Value> {
        self.post_json(
            "/server/files/copy",
            serde_json::json!({
                "source": format!("gcodes/{source}"),
                "dest": format!("gcodes/{dest}"),
            }),
        )
        .await
    }

    pub async fn create_directory(&self, path: &str) -> Result<Value> {
        self.post_json(
            "/server/files/directory",
            serde_json::json!({ "path": path }),
        )
        .await
    }

    pub async fn list_directory(&self, path: &str) -> Result<Value> {
        self.get(
            "/server/files/directory",
            &[
                ("path", path.to_string()),
                ("extended", "true".to_string()),
            ],
        )
        .await
    }

    // -- file transfer --

    pub async fn upload_file(&self, local: &Path, remote: &str) -> Result<Value> {
        let filename = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ConsoleError::filesystem(format!("Bad local path: {}", local.display()))
            })?
            .to_string();

        let bytes = tokio::fs::read(local).await.map_err(|e| {
            ConsoleError::filesystem(format!("Cannot read {}: {e}", local.display()))
        })?;

        let (root, path) = match remote.split_once('/') {
            Some((root, rest)) => (root.to_string(), rest.to_string()),
            None => (remote.to_string(), String::new()),
        };

        let part = multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str("application/octet-stream")
            .map_err(|e| ConsoleError::backend(e.to_string()))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("root", root)
            .text("path", path);

        self.send(
            self.request(reqwest::Method::POST, "/server/files/upload")
                .multipart(form),
        )
        .await
    }

    pub async fn download_file(&self, remote: &str, local: &Path) -> Result<()> {
        let encoded = urlencode(remote);
        let response = self
            .request(reqwest::Method::GET, &format!("/server/files/{encoded}"))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConsoleError::backend(format!(
                "Download failed: {status}"
            )));
        }
        let bytes = response.bytes().await?;

        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ConsoleError::filesystem(format!("Cannot create {}: {e}", parent.display()))
            })?;
        }
        tokio::fs::write(local, &bytes).await.map_err(|e| {
            ConsoleError::filesystem(format!("Cannot write {}: {e}", local.display()))
        })?;
        Ok(())
    }
}

/// Percent-encode a path segment, including '/'.
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(url: &str) -> Config {
        Config::new(url.to_string(), None, 5.0, false)
    }

    #[test]
    fn websocket_url_swaps_scheme() {
        let client = MoonrakerClient::new(&test_config("http://printer:7125")).unwrap();
        assert_eq!(client.websocket_url(), "ws://printer:7125/websocket");

        let client = MoonrakerClient::new(&test_config("https://printer")).unwrap();
        assert_eq!(client.websocket_url(), "wss://printer/websocket");
    }

    #[test]
    fn urlencode_escapes_slashes_and_spaces() {
        assert_eq!(urlencode("gcodes/my part.gcode"), "gcodes%2Fmy%20part.gcode");
    }

    #[test]
    fn envelope_unwraps_result() {
        let body = serde_json::json!({ "result": { "objects": [] } });
        let value = MoonrakerClient::unwrap_envelope(body).unwrap();
        assert!(value.get("objects").is_some());
    }

    #[test]
    fn envelope_surfaces_error_as_backend() {
        let body = serde_json::json!({ "error": { "message": "not ready" } });
        let err = MoonrakerClient::unwrap_envelope(body).unwrap_err();
        assert!(matches!(err, ConsoleError::Backend(_)));
        assert!(err.to_string().contains("not ready"));
    }

    #[tokio::test]
    async fn list_objects_parses_names() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/printer/objects/list")
            .with_status(200)
            .with_body(r#"{"result": {"objects": ["fan", "extruder"]}}"#)
            .create_async()
            .await;

        let client = MoonrakerClient::new(&test_config(&server.url())).unwrap();
        let objects = client.list_objects().await.unwrap();
        assert_eq!(objects, vec!["fan", "extruder"]);
    }

    #[tokio::test]
    async fn http_error_status_becomes_backend_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/server/info")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = MoonrakerClient::new(&test_config(&server.url())).unwrap();
        let err = client.server_info().await.unwrap_err();
        assert!(matches!(err, ConsoleError::Backend(_)));
    }

    #[tokio::test]
    async fn api_key_header_is_sent_when_configured() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/server/info")
            .match_header("X-Api-Key", "secret")
            .with_status(200)
            .with_body(r#"{"result": {}}"#)
            .create_async()
            .await;

        let config = Config::new(server.url(), Some("secret".into()), 5.0, false);
        let client = MoonrakerClient::new(&config).unwrap();
        client.server_info().await.unwrap();
        mock.assert_async().await;
    }
}
