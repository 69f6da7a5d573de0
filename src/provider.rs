// Capability provider interface
//
// The registry, completion engine, and console viewer all talk to the
// printer through this trait rather than the concrete Moonraker client, so
// they can be exercised against an in-memory fake in tests. Implementations
// must be safe to call concurrently; callers never assume serialized access.

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::models::{
    ConsoleMessage, Endstops, Fan, GcodeCommand, GcodeFile, Heater, Led, MacroInfo, OutputPin,
    PrintStatus, PrinterState, RemoteDirectory, TemperatureSensor, Toolhead,
};

#[async_trait]
pub trait Provider: Send + Sync {
    // -- resource enumeration (raw object names, with Klipper prefixes) --

    async fn list_sensors(&self) -> Result<Vec<String>>;
    async fn list_fans(&self) -> Result<Vec<String>>;
    async fn list_leds(&self) -> Result<Vec<String>>;
    async fn list_macros(&self) -> Result<Vec<String>>;
    async fn list_heaters(&self) -> Result<Vec<String>>;
    async fn list_pins(&self) -> Result<Vec<String>>;

    // -- resource state --

    async fn sensor(&self, name: &str) -> Result<TemperatureSensor>;
    async fn all_sensors(&self) -> Result<Vec<TemperatureSensor>>;
    async fn fan(&self, name: &str) -> Result<Fan>;
    async fn all_fans(&self) -> Result<Vec<Fan>>;
    async fn led(&self, name: &str) -> Result<Led>;
    async fn all_leds(&self) -> Result<Vec<Led>>;
    async fn macro_info(&self, name: &str) -> Result<MacroInfo>;
    async fn heater(&self, name: &str) -> Result<Heater>;
    async fn all_heaters(&self) -> Result<Vec<Heater>>;
    async fn pin(&self, name: &str) -> Result<OutputPin>;
    async fn all_pins(&self) -> Result<Vec<OutputPin>>;
    async fn toolhead(&self) -> Result<Toolhead>;
    async fn endstops(&self) -> Result<Endstops>;
    async fn printer_state(&self) -> Result<PrinterState>;
    async fn print_status(&self) -> Result<PrintStatus>;

    // -- resource mutation --

    async fn set_fan_speed(&self, name: &str, speed: f64) -> Result<()>;
    async fn set_led_color(
        &self,
        name: &str,
        red: f64,
        green: f64,
        blue: f64,
        white: f64,
        index: Option<u32>,
    ) -> Result<()>;
    async fn set_heater_temp(&self, name: &str, target: f64) -> Result<()>;
    async fn set_pin_value(&self, name: &str, value: f64) -> Result<()>;

    // -- G-code --

    async fn list_gcode_commands(&self) -> Result<Vec<String>>;
    async fn gcode_command(&self, name: &str) -> Result<GcodeCommand>;
    /// Execute a raw G-code script and return its textual output.
    async fn run_gcode(&self, script: &str) -> Result<String>;
    async fn home_axes(&self, axes: &[String]) -> Result<()>;
    async fn extrude(&self, amount: f64, feedrate: i64) -> Result<()>;

    // -- console log --

    async fn console_history(&self, count: usize) -> Result<Vec<ConsoleMessage>>;

    /// Open the push-notification channel. Messages arrive on the returned
    /// receiver in receipt order; dropping the receiver closes the channel.
    async fn subscribe_console(&self) -> Result<mpsc::UnboundedReceiver<ConsoleMessage>>;

    // -- remote files and directories --

    async fn list_gcode_files(&self) -> Result<Vec<GcodeFile>>;
    async fn file_info(&self, filename: &str) -> Result<GcodeFile>;
    async fn delete_file(&self, filename: &str) -> Result<()>;
    async fn move_file(&self, source: &str, dest: &str) -> Result<()>;
    async fn copy_file(&self, source: &str, dest: &str) -> Result<()>;
    async fn start_print(&self, filename: &str) -> Result<()>;
    async fn create_directory(&self, path: &str) -> Result<String>;
    async fn list_directories(&self, path: &str) -> Result<Vec<RemoteDirectory>>;

    // -- file transfer --

    async fn upload_file(&self, local: &Path, remote: &str) -> Result<String>;
    async fn download_file(&self, remote: &str, local: &Path) -> Result<String>;
}
