// Interactive console viewer
//
// Streams printer console traffic into a bounded in-memory log while the
// foreground reads raw G-code lines from stdin. All mutable state lives in
// one `Arc<Mutex<ViewerShared>>`; rendering clones what it needs under the
// lock and formats after release. Background roles degrade independently:
// a failed WebSocket subscription leaves a log-only viewer, and each status
// sub-query failure blanks only its own field.

use crossterm::style::Stylize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::{LogEntry, LogKind, StatusSnapshot};
use crate::provider::Provider;
use crate::render::timestamp_to_local;

const LOG_CAPACITY: usize = 1000;
const HISTORY_BACKFILL: usize = 100;
const RENDER_INTERVAL: Duration = Duration::from_millis(100);
const STATUS_INTERVAL: Duration = Duration::from_secs(2);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// State shared between the input loop and the background tasks. `appended`
/// counts every entry ever pushed so the renderer can tell which tail of the
/// ring it has not printed yet, even across evictions.
#[derive(Debug, Default)]
struct ViewerShared {
    log: VecDeque<LogEntry>,
    appended: u64,
    status: StatusSnapshot,
    status_revision: u64,
}

impl ViewerShared {
    fn push(&mut self, entry: LogEntry) {
        if self.log.len() == LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(entry);
        self.appended += 1;
    }
}

pub struct ConsoleViewer {
    provider: Arc<dyn Provider>,
    shared: Arc<Mutex<ViewerShared>>,
    cancel: CancellationToken,
    split: bool,
}

impl ConsoleViewer {
    pub fn new(provider: Arc<dyn Provider>, split: bool) -> Self {
        Self {
            provider,
            shared: Arc::new(Mutex::new(ViewerShared::default())),
            cancel: CancellationToken::new(),
            split,
        }
    }

    /// Run the viewer until the user types `exit`/`quit` or closes stdin.
    /// The log buffer is discarded with the viewer.
    pub async fn run(self) {
        println!(
            "{}",
            "Console mode. Type G-code to send it; 'exit' to leave.".dark_grey()
        );

        self.backfill_history().await;

        let stream_task = self.spawn_stream_task().await;
        let status_task = self.split.then(|| self.spawn_status_task());
        let render_task = self.spawn_render_task();

        self.input_loop().await;

        // Cooperative shutdown: signal, then bound the wait.
        self.cancel.cancel();
        if let Some(task) = status_task {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await.is_err() {
                warn!("status task did not stop within {SHUTDOWN_TIMEOUT:?}");
            }
        }
        if let Err(e) = tokio::time::timeout(SHUTDOWN_TIMEOUT, render_task).await {
            debug!("render task shutdown timed out: {e}");
        }
        if let Some(task) = stream_task {
            task.abort();
        }
    }

    /// Seed the log with recent console history. A failure here is not
    /// fatal; the viewer just starts empty.
    async fn backfill_history(&self) {
        match self.provider.console_history(HISTORY_BACKFILL).await {
            Ok(messages) => {
                let mut shared = lock(&self.shared);
                for msg in messages {
                    shared.push(LogEntry {
                        time: timestamp_to_local(msg.time),
                        text: msg.message,
                        kind: LogKind::from_wire(&msg.kind),
                    });
                }
            }
            Err(e) => {
                debug!("console history backfill failed: {e}");
                lock(&self.shared).push(warning(format!("History unavailable: {e}")));
            }
        }
    }

    /// Subscribe to pushed console messages. On failure, record a one-time
    /// warning and continue without live updates.
    async fn spawn_stream_task(&self) -> Option<JoinHandle<()>> {
        let mut rx = match self.provider.subscribe_console().await {
            Ok(rx) => rx,
            Err(e) => {
                warn!("console subscription failed: {e}");
                lock(&self.shared).push(warning(format!("Live updates unavailable: {e}")));
                return None;
            }
        };

        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Some(msg) => {
                            lock(&shared).push(LogEntry {
                                time: timestamp_to_local(msg.time),
                                text: msg.message,
                                kind: LogKind::from_wire(&msg.kind),
                            });
                        }
                        None => break,
                    },
                }
            }
        }))
    }

    /// Refresh the status snapshot every two seconds. Each sub-query is
    /// isolated: a failure blanks that field and leaves the rest intact.
    fn spawn_status_task(&self) -> JoinHandle<()> {
        let provider = Arc::clone(&self.provider);
        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(STATUS_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let snapshot = StatusSnapshot {
                    printer: provider.printer_state().await.ok(),
                    print: provider.print_status().await.ok(),
                    extruder: provider.heater("extruder").await.ok(),
                    bed: provider.heater("heater_bed").await.ok(),
                    toolhead: provider.toolhead().await.ok(),
                    fan: provider.fan("fan").await.ok(),
                };
                let mut shared = lock(&shared);
                if shared.status != snapshot {
                    shared.status = snapshot;
                    shared.status_revision += 1;
                }
            }
        })
    }

    /// Print newly appended log entries (and status changes, in split mode)
    /// at most once per render interval. Entries are cloned under the lock
    /// and formatted after it is released.
    fn spawn_render_task(&self) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        let split = self.split;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RENDER_INTERVAL);
            let mut printed: u64 = 0;
            let mut status_seen: u64 = 0;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let (fresh, status) = {
                    let shared = lock(&shared);
                    let pending = ((shared.appended - printed) as usize).min(shared.log.len());
                    printed = shared.appended;
                    let fresh: Vec<LogEntry> = shared
                        .log
                        .iter()
                        .skip(shared.log.len() - pending)
                        .cloned()
                        .collect();
                    let status = (split && shared.status_revision != status_seen).then(|| {
                        status_seen = shared.status_revision;
                        shared.status.clone()
                    });
                    (fresh, status)
                };
                for entry in &fresh {
                    print_entry(entry);
                }
                if let Some(status) = status {
                    println!("{}", format_status_line(&status).dark_grey());
                }
            }
        })
    }

    /// Foreground loop: record each line as a Command entry and run it as
    /// raw G-code. `exit`/`quit`, EOF, or Ctrl+C leaves the viewer; an
    /// interrupt must end only this mode, never the process.
    async fn input_loop(&self) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                interrupt = tokio::signal::ctrl_c() => {
                    if let Err(e) = interrupt {
                        warn!("interrupt handler failed: {e}");
                    }
                    break;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("stdin read failed: {e}");
                        break;
                    }
                },
            };
            let script = line.trim();
            if script.is_empty() {
                continue;
            }
            if script.eq_ignore_ascii_case("exit") || script.eq_ignore_ascii_case("quit") {
                break;
            }

            lock(&self.shared).push(LogEntry {
                time: chrono::Local::now(),
                text: script.to_string(),
                kind: LogKind::Command,
            });
            match self.provider.run_gcode(script).await {
                Ok(response) => {
                    let response = response.trim();
                    if !response.is_empty() && response != "ok" {
                        lock(&self.shared).push(LogEntry {
                            time: chrono::Local::now(),
                            text: response.to_string(),
                            kind: LogKind::Response,
                        });
                    }
                }
                Err(e) => {
                    lock(&self.shared).push(LogEntry {
                        time: chrono::Local::now(),
                        text: e.to_string(),
                        kind: LogKind::Error,
                    });
                }
            }
        }
    }
}

fn lock(shared: &Mutex<ViewerShared>) -> std::sync::MutexGuard<'_, ViewerShared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

fn warning(text: String) -> LogEntry {
    LogEntry {
        time: chrono::Local::now(),
        text,
        kind: LogKind::Warning,
    }
}

fn print_entry(entry: &LogEntry) {
    let stamp = entry.time.format("%H:%M:%S").to_string();
    let text = match entry.kind {
        LogKind::Command => format!("> {}", entry.text).cyan().to_string(),
        LogKind::Response => entry.text.clone(),
        LogKind::Error => entry.text.clone().red().to_string(),
        LogKind::Warning => entry.text.clone().yellow().to_string(),
    };
    println!("{} {}", stamp.dark_grey(), text);
}

/// Compact one-line status summary for split-screen mode.
fn format_status_line(status: &StatusSnapshot) -> String {
    let mut parts = Vec::new();
    if let Some(printer) = &status.printer {
        parts.push(printer.state.clone());
    }
    if let Some(print) = &status.print {
        if print.state == "printing" || print.state == "paused" {
            parts.push(format!(
                "{} {} {:.1}%",
                print.state,
                print.filename,
                print.progress * 100.0
            ));
        }
    }
    if let Some(extruder) = &status.extruder {
        parts.push(format!(
            "E {:.1}/{:.1}",
            extruder.temperature, extruder.target
        ));
    }
    if let Some(bed) = &status.bed {
        parts.push(format!("B {:.1}/{:.1}", bed.temperature, bed.target));
    }
    if let Some(toolhead) = &status.toolhead {
        if let Some(z) = toolhead.position.get(2) {
            parts.push(format!("Z {z:.2}"));
        }
    }
    if let Some(fan) = &status.fan {
        parts.push(format!("fan {:.0}%", fan.speed * 100.0));
    }
    if parts.is_empty() {
        "status unavailable".to_string()
    } else {
        parts.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fan, Heater, PrinterState};

    fn entry(n: u64) -> LogEntry {
        LogEntry {
            time: chrono::Local::now(),
            text: format!("line {n}"),
            kind: LogKind::Response,
        }
    }

    #[test]
    fn log_evicts_oldest_at_capacity() {
        let mut shared = ViewerShared::default();
        for n in 0..(LOG_CAPACITY as u64 + 5) {
            shared.push(entry(n));
        }
        assert_eq!(shared.log.len(), LOG_CAPACITY);
        assert_eq!(shared.log.front().unwrap().text, "line 5");
        assert_eq!(
            shared.log.back().unwrap().text,
            format!("line {}", LOG_CAPACITY + 4)
        );
        assert_eq!(shared.appended, LOG_CAPACITY as u64 + 5);
    }

    #[test]
    fn appended_counter_survives_eviction() {
        let mut shared = ViewerShared::default();
        let mut printed = 0u64;
        for n in 0..10 {
            shared.push(entry(n));
        }
        let pending = ((shared.appended - printed) as usize).min(shared.log.len());
        assert_eq!(pending, 10);
        printed = shared.appended;

        for n in 10..12 {
            shared.push(entry(n));
        }
        let pending = ((shared.appended - printed) as usize).min(shared.log.len());
        assert_eq!(pending, 2);
    }

    #[test]
    fn status_line_skips_missing_fields() {
        let status = StatusSnapshot {
            printer: Some(PrinterState {
                state: "ready".to_string(),
                state_message: String::new(),
            }),
            extruder: Some(Heater {
                name: "extruder".to_string(),
                temperature: 205.2,
                target: 210.0,
                power: 0.6,
            }),
            fan: Some(Fan {
                name: "fan".to_string(),
                speed: 0.8,
                rpm: None,
            }),
            ..StatusSnapshot::default()
        };
        assert_eq!(format_status_line(&status), "ready | E 205.2/210.0 | fan 80%");
    }

    #[test]
    fn empty_status_has_placeholder() {
        assert_eq!(
            format_status_line(&StatusSnapshot::default()),
            "status unavailable"
        );
    }
}
