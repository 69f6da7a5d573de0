// Domain records for printer state
//
// Plain immutable data carried between the Moonraker client, the command
// handlers, and the renderer. No behavior lives here.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSensor {
    pub name: String,
    pub temperature: f64,
    pub measured_min_temp: Option<f64>,
    pub measured_max_temp: Option<f64>,
    pub target: Option<f64>,
    pub power: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fan {
    pub name: String,
    pub speed: f64,
    pub rpm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Led {
    pub name: String,
    /// Per-chip (red, green, blue, white) channels, each 0.0-1.0.
    pub color_data: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroInfo {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<String>,
    pub gcode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heater {
    pub name: String,
    pub temperature: f64,
    pub target: f64,
    pub power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPin {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcodeCommand {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterState {
    pub state: String,
    pub state_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toolhead {
    pub homed_axes: String,
    pub position: Vec<f64>,
    pub print_time: f64,
    pub estimated_print_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endstops {
    pub endstops: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcodeFile {
    pub filename: String,
    pub size: u64,
    /// Unix timestamp of last modification.
    pub modified: f64,
    pub estimated_time: Option<f64>,
    pub filament_total: Option<f64>,
    pub first_layer_height: Option<f64>,
    pub layer_height: Option<f64>,
    pub object_height: Option<f64>,
    pub slicer: Option<String>,
}

impl GcodeFile {
    pub fn basic(filename: impl Into<String>, size: u64, modified: f64) -> Self {
        Self {
            filename: filename.into(),
            size,
            modified,
            estimated_time: None,
            filament_total: None,
            first_layer_height: None,
            layer_height: None,
            object_height: None,
            slicer: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDirectory {
    pub dirname: String,
    pub size: u64,
    pub modified: f64,
    pub permissions: Option<String>,
}

/// Print job status. `state` is one of standby, printing, paused, complete,
/// cancelled, error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintStatus {
    pub state: String,
    pub filename: String,
    pub total_duration: f64,
    pub print_duration: f64,
    pub filament_used: f64,
    /// 0.0 to 1.0.
    pub progress: f64,
    pub message: String,
}

/// One console message from the printer, either historical (gcode_store)
/// or pushed over the WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    pub message: String,
    /// Unix timestamp.
    pub time: f64,
    #[serde(default = "default_message_kind")]
    pub kind: String,
}

fn default_message_kind() -> String {
    "response".to_string()
}

/// Kind tag for entries in the console viewer's log buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Command,
    Response,
    Error,
    Warning,
}

impl LogKind {
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "command" => LogKind::Command,
            "error" => LogKind::Error,
            "warning" => LogKind::Warning,
            _ => LogKind::Response,
        }
    }
}

/// One timestamped line in the console viewer's bounded log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub time: DateTime<Local>,
    pub text: String,
    pub kind: LogKind,
}

/// Point-in-time status rendered beside the console log in split-screen
/// mode. Each field is independently optional; a failed sub-query leaves
/// only its own field empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub printer: Option<PrinterState>,
    pub print: Option<PrintStatus>,
    pub extruder: Option<Heater>,
    pub bed: Option<Heater>,
    pub toolhead: Option<Toolhead>,
    pub fan: Option<Fan>,
}
