// Production capability provider backed by the Moonraker client
//
// Translates between raw Klipper object names (e.g. "fan_generic BedFans")
// and the display names operators type, and maps wire JSON to the domain
// records in `models`. All prefix knowledge lives here.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{ConsoleError, Result};
use crate::models::{
    ConsoleMessage, Endstops, Fan, GcodeCommand, GcodeFile, Heater, Led, MacroInfo, OutputPin,
    PrintStatus, PrinterState, RemoteDirectory, TemperatureSensor, Toolhead,
};
use crate::moonraker::{open_console_stream, MoonrakerClient};
use crate::provider::Provider;

pub const SENSOR_PREFIXES: &[&str] = &["temperature_sensor ", "temperature_host "];
pub const FAN_PREFIXES: &[&str] = &["fan_generic ", "heater_fan ", "controller_fan "];
pub const LED_PREFIXES: &[&str] = &["neopixel ", "led ", "dotstar "];
pub const PIN_PREFIXES: &[&str] = &["output_pin "];

/// Strip the first matching prefix to produce a display name.
pub fn display_name(full: &str, prefixes: &[&str]) -> String {
    for prefix in prefixes {
        if let Some(rest) = full.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    full.to_string()
}

fn f64_field(data: &Value, field: &str) -> Option<f64> {
    data.get(field).and_then(Value::as_f64)
}

fn str_field(data: &Value, field: &str) -> String {
    data.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub struct Handlers {
    client: Arc<MoonrakerClient>,
}

impl Handlers {
    pub fn new(client: Arc<MoonrakerClient>) -> Self {
        Self { client }
    }

    async fn objects_matching(&self, keep: impl Fn(&str) -> bool) -> Result<Vec<String>> {
        let objects = self.client.list_objects().await?;
        Ok(objects.into_iter().filter(|o| keep(o)).collect())
    }

    /// Query a single object and return its status map.
    async fn query_one(&self, full_name: &str) -> Result<Value> {
        let status = self.client.query_objects(&[full_name]).await?;
        Ok(status.get(full_name).cloned().unwrap_or(Value::Null))
    }

    fn sensor_from(name: &str, data: &Value) -> TemperatureSensor {
        TemperatureSensor {
            name: name.to_string(),
            temperature: f64_field(data, "temperature").unwrap_or(0.0),
            measured_min_temp: f64_field(data, "measured_min_temp"),
            measured_max_temp: f64_field(data, "measured_max_temp"),
            target: f64_field(data, "target"),
            power: f64_field(data, "power"),
        }
    }

    fn fan_from(name: &str, data: &Value) -> Fan {
        Fan {
            name: name.to_string(),
            speed: f64_field(data, "speed").unwrap_or(0.0),
            rpm: f64_field(data, "rpm"),
        }
    }

    fn led_from(name: &str, data: &Value) -> Led {
        let color_data = data.get("color_data").and_then(Value::as_array).map(|chips| {
            chips
                .iter()
                .map(|chip| {
                    chip.as_array()
                        .map(|vals| vals.iter().filter_map(Value::as_f64).collect())
                        .unwrap_or_default()
                })
                .collect()
        });
        Led {
            name: name.to_string(),
            color_data,
        }
    }

    fn heater_from(name: &str, data: &Value) -> Heater {
        Heater {
            name: name.to_string(),
            temperature: f64_field(data, "temperature").unwrap_or(0.0),
            target: f64_field(data, "target").unwrap_or(0.0),
            power: f64_field(data, "power").unwrap_or(0.0),
        }
    }

    fn pin_from(name: &str, data: &Value) -> OutputPin {
        OutputPin {
            name: name.to_string(),
            value: f64_field(data, "value").unwrap_or(0.0),
        }
    }

    fn file_from(data: &Value) -> Option<GcodeFile> {
        let filename = data.get("path").and_then(Value::as_str)?.to_string();
        Some(GcodeFile {
            filename,
            size: data.get("size").and_then(Value::as_u64).unwrap_or(0),
            modified: f64_field(data, "modified").unwrap_or(0.0),
            estimated_time: f64_field(data, "estimated_time"),
            filament_total: f64_field(data, "filament_total"),
            first_layer_height: None,
            layer_height: None,
            object_height: None,
            slicer: None,
        })
    }

    /// Qualify a typed sensor name with its Klipper prefix when missing.
    fn qualify_sensor(name: &str) -> String {
        if SENSOR_PREFIXES.iter().any(|p| name.starts_with(p))
            || name == "extruder"
            || name == "heater_bed"
        {
            name.to_string()
        } else {
            format!("temperature_sensor {name}")
        }
    }

    fn qualify_fan(name: &str) -> String {
        if name == "fan" || FAN_PREFIXES.iter().any(|p| name.starts_with(p)) {
            name.to_string()
        } else {
            format!("fan_generic {name}")
        }
    }

    fn qualify_led(name: &str) -> String {
        if LED_PREFIXES.iter().any(|p| name.starts_with(p)) {
            name.to_string()
        } else {
            format!("neopixel {name}")
        }
    }

    fn qualify_heater(name: &str) -> String {
        if name == "extruder"
            || name == "heater_bed"
            || name.starts_with("extruder")
            || name.starts_with("heater_generic ")
        {
            name.to_string()
        } else {
            format!("heater_generic {name}")
        }
    }

    fn qualify_pin(name: &str) -> String {
        if name.starts_with("output_pin ") {
            name.to_string()
        } else {
            format!("output_pin {name}")
        }
    }

    /// Query a set of objects and map each to a record via `build`,
    /// stripping `prefixes` for display names.
    async fn collect<T>(
        &self,
        names: Vec<String>,
        prefixes: &[&str],
        build: impl Fn(&str, &Value) -> T,
    ) -> Result<Vec<T>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let status = self.client.query_objects(&refs).await?;

        Ok(names
            .iter()
            .map(|full| {
                let data = status.get(full).cloned().unwrap_or(Value::Null);
                build(&display_name(full, prefixes), &data)
            })
            .collect())
    }
}

#[async_trait]
impl Provider for Handlers {
    async fn list_sensors(&self) -> Result<Vec<String>> {
        self.objects_matching(|o| {
            SENSOR_PREFIXES.iter().any(|p| o.starts_with(p))
                || o == "extruder"
                || o == "heater_bed"
        })
        .await
    }

    async fn list_fans(&self) -> Result<Vec<String>> {
        self.objects_matching(|o| {
            FAN_PREFIXES.iter().any(|p| o.starts_with(p)) || o == "fan"
        })
        .await
    }

    async fn list_leds(&self) -> Result<Vec<String>> {
        self.objects_matching(|o| LED_PREFIXES.iter().any(|p| o.starts_with(p)))
            .await
    }

    async fn list_macros(&self) -> Result<Vec<String>> {
        let objects = self.client.list_objects().await?;
        Ok(objects
            .into_iter()
            .filter_map(|o| o.strip_prefix("gcode_macro ").map(str::to_string))
            .collect())
    }

    async fn list_heaters(&self) -> Result<Vec<String>> {
        self.objects_matching(|o| {
            o == "extruder"
                || o == "heater_bed"
                || (o.starts_with("extruder") && o[8..].chars().all(|c| c.is_ascii_digit()))
                || o.starts_with("heater_generic ")
        })
        .await
    }

    async fn list_pins(&self) -> Result<Vec<String>> {
        self.objects_matching(|o| o.starts_with("output_pin ")).await
    }

    async fn sensor(&self, name: &str) -> Result<TemperatureSensor> {
        let data = self.query_one(&Self::qualify_sensor(name)).await?;
        Ok(Self::sensor_from(name, &data))
    }

    async fn all_sensors(&self) -> Result<Vec<TemperatureSensor>> {
        let names = self.list_sensors().await?;
        self.collect(names, SENSOR_PREFIXES, Self::sensor_from).await
    }

    async fn fan(&self, name: &str) -> Result<Fan> {
        let data = self.query_one(&Self::qualify_fan(name)).await?;
        Ok(Self::fan_from(name, &data))
    }

    async fn all_fans(&self) -> Result<Vec<Fan>> {
        let names = self.list_fans().await?;
        self.collect(names, FAN_PREFIXES, Self::fan_from).await
    }

    async fn led(&self, name: &str) -> Result<Led> {
        let data = self.query_one(&Self::qualify_led(name)).await?;
        Ok(Self::led_from(name, &data))
    }

    async fn all_leds(&self) -> Result<Vec<Led>> {
        let names = self.list_leds().await?;
        self.collect(names, LED_PREFIXES, Self::led_from).await
    }

    async fn macro_info(&self, name: &str) -> Result<MacroInfo> {
        let config = self.query_one("configfile").await?;
        let settings = config.get("settings").cloned().unwrap_or(Value::Null);

        let (key, display) = if let Some(stripped) = name
            .to_lowercase()
            .strip_prefix("gcode_macro ")
            .map(str::to_string)
        {
            (name.to_lowercase(), stripped)
        } else {
            (format!("gcode_macro {}", name.to_lowercase()), name.to_string())
        };

        let macro_config = settings
            .get(&key)
            .ok_or_else(|| ConsoleError::validation(format!("Macro not found: {name}")))?;

        let description = macro_config
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        let gcode = str_field(macro_config, "gcode");

        Ok(MacroInfo {
            name: display,
            description,
            parameters: extract_macro_parameters(&gcode),
            gcode: Some(if gcode.len() > 500 {
                format!("{}...", &gcode[..500])
            } else {
                gcode
            }),
        })
    }

    async fn heater(&self, name: &str) -> Result<Heater> {
        let data = self.query_one(&Self::qualify_heater(name)).await?;
        Ok(Self::heater_from(name, &data))
    }

    async fn all_heaters(&self) -> Result<Vec<Heater>> {
        let names = self.list_heaters().await?;
        self.collect(names, &["heater_generic "], Self::heater_from)
            .await
    }

    async fn pin(&self, name: &str) -> Result<OutputPin> {
        let data = self.query_one(&Self::qualify_pin(name)).await?;
        Ok(Self::pin_from(&display_name(name, PIN_PREFIXES), &data))
    }

    async fn all_pins(&self) -> Result<Vec<OutputPin>> {
        let names = self.list_pins().await?;
        self.collect(names, PIN_PREFIXES, Self::pin_from).await
    }

    async fn toolhead(&self) -> Result<Toolhead> {
        let data = self.query_one("toolhead").await?;
        Ok(Toolhead {
            homed_axes: str_field(&data, "homed_axes"),
            position: data
                .get("position")
                .and_then(Value::as_array)
                .map(|p| p.iter().filter_map(Value::as_f64).collect())
                .unwrap_or_else(|| vec![0.0, 0.0, 0.0, 0.0]),
            print_time: f64_field(&data, "print_time").unwrap_or(0.0),
            estimated_print_time: f64_field(&data, "estimated_print_time").unwrap_or(0.0),
        })
    }

    async fn endstops(&self) -> Result<Endstops> {
        let result = self.client.query_endstops().await?;
        let endstops = result
            .as_object()
            .map(|map| {
                map.iter()
                    .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Endstops { endstops })
    }

    async fn printer_state(&self) -> Result<PrinterState> {
        let info = self.client.printer_info().await?;
        Ok(PrinterState {
            state: data_or(&info, "state", "unknown"),
            state_message: str_field(&info, "state_message"),
        })
    }

    async fn print_status(&self) -> Result<PrintStatus> {
        let status = self
            .client
            .query_objects(&["print_stats", "virtual_sdcard"])
            .await?;
        let stats = status.get("print_stats").cloned().unwrap_or(Value::Null);
        let sdcard = status.get("virtual_sdcard").cloned().unwrap_or(Value::Null);

        Ok(PrintStatus {
            state: data_or(&stats, "state", "standby"),
            filename: str_field(&stats, "filename"),
            total_duration: f64_field(&stats, "total_duration").unwrap_or(0.0),
            print_duration: f64_field(&stats, "print_duration").unwrap_or(0.0),
            filament_used: f64_field(&stats, "filament_used").unwrap_or(0.0),
            progress: f64_field(&sdcard, "progress").unwrap_or(0.0),
            message: str_field(&stats, "message"),
        })
    }

    async fn set_fan_speed(&self, name: &str, speed: f64) -> Result<()> {
        // The part cooling fan speaks M106/M107; generic fans use
        // SET_FAN_SPEED.
        if name == "fan" || name == "part_cooling" {
            if speed == 0.0 {
                self.client.run_gcode("M107").await?;
            } else {
                let s = (speed * 255.0) as u32;
                self.client.run_gcode(&format!("M106 S{s}")).await?;
            }
        } else {
            self.client
                .run_gcode(&format!("SET_FAN_SPEED FAN={name} SPEED={speed}"))
                .await?;
        }
        Ok(())
    }

    async fn set_led_color(
        &self,
        name: &str,
        red: f64,
        green: f64,
        blue: f64,
        white: f64,
        index: Option<u32>,
    ) -> Result<()> {
        let mut script = format!("SET_LED LED={name} RED={red} GREEN={green} BLUE={blue}");
        if white > 0.0 {
            script.push_str(&format!(" WHITE={white}"));
        }
        if let Some(index) = index {
            script.push_str(&format!(" INDEX={index}"));
        }
        self.client.run_gcode(&script).await?;
        Ok(())
    }

    async fn set_heater_temp(&self, name: &str, target: f64) -> Result<()> {
        let script = match name {
            "extruder" | "hotend" => format!("M104 S{target}"),
            "heater_bed" | "bed" => format!("M140 S{target}"),
            other => format!("SET_HEATER_TEMPERATURE HEATER={other} TARGET={target}"),
        };
        self.client.run_gcode(&script).await?;
        Ok(())
    }

    async fn set_pin_value(&self, name: &str, value: f64) -> Result<()> {
        self.client
            .run_gcode(&format!("SET_PIN PIN={name} VALUE={value}"))
            .await?;
        Ok(())
    }

    async fn list_gcode_commands(&self) -> Result<Vec<String>> {
        let help = self.client.gcode_help().await?;
        Ok(help.into_iter().map(|(name, _)| name).collect())
    }

    async fn gcode_command(&self, name: &str) -> Result<GcodeCommand> {
        let help = self.client.gcode_help().await?;

        if let Some((cmd, description)) = help
            .iter()
            .find(|(cmd, _)| cmd == name)
            .or_else(|| help.iter().find(|(cmd, _)| cmd.eq_ignore_ascii_case(name)))
        {
            return Ok(GcodeCommand {
                name: cmd.clone(),
                description: description.clone(),
            });
        }
        Err(ConsoleError::validation(format!(
            "G-code command not found: {name}"
        )))
    }

    async fn run_gcode(&self, script: &str) -> Result<String> {
        self.client.run_gcode(script).await
    }

    async fn home_axes(&self, axes: &[String]) -> Result<()> {
        let script = if axes.is_empty() {
            "G28".to_string()
        } else {
            format!("G28 {}", axes.join(" "))
        };
        self.client.run_gcode(&script).await?;
        Ok(())
    }

    async fn extrude(&self, amount: f64, feedrate: i64) -> Result<()> {
        // Relative extrusion, restoring absolute mode afterwards.
        self.client.run_gcode("M83").await?;
        self.client
            .run_gcode(&format!("G1 E{amount} F{feedrate}"))
            .await?;
        self.client.run_gcode("M82").await?;
        Ok(())
    }

    async fn console_history(&self, count: usize) -> Result<Vec<ConsoleMessage>> {
        let raw = self.client.gcode_store(count).await?;
        let now = chrono::Local::now().timestamp() as f64;

        Ok(raw
            .into_iter()
            .filter_map(|entry| match entry {
                Value::Object(_) => Some(ConsoleMessage {
                    message: str_field(&entry, "message"),
                    time: f64_field(&entry, "time").unwrap_or(now),
                    kind: data_or(&entry, "type", "response"),
                }),
                Value::String(s) => Some(ConsoleMessage {
                    message: s,
                    time: now,
                    kind: "response".to_string(),
                }),
                _ => None,
            })
            .collect())
    }

    async fn subscribe_console(&self) -> Result<mpsc::UnboundedReceiver<ConsoleMessage>> {
        open_console_stream(&self.client.websocket_url()).await
    }

    async fn list_gcode_files(&self) -> Result<Vec<GcodeFile>> {
        let raw = self.client.list_files("gcodes").await?;
        Ok(raw.iter().filter_map(Self::file_from).collect())
    }

    async fn file_info(&self, filename: &str) -> Result<GcodeFile> {
        let meta = self.client.file_metadata(filename).await?;
        Ok(GcodeFile {
            filename: data_or(&meta, "filename", filename),
            size: meta.get("size").and_then(Value::as_u64).unwrap_or(0),
            modified: f64_field(&meta, "modified").unwrap_or(0.0),
            estimated_time: f64_field(&meta, "estimated_time"),
            filament_total: f64_field(&meta, "filament_total"),
            first_layer_height: f64_field(&meta, "first_layer_height"),
            layer_height: f64_field(&meta, "layer_height"),
            object_height: f64_field(&meta, "object_height"),
            slicer: meta.get("slicer").and_then(Value::as_str).map(str::to_string),
        })
    }

    async fn delete_file(&self, filename: &str) -> Result<()> {
        self.client.delete_file(filename).await.map(|_| ())
    }

    async fn move_file(&self, source: &str, dest: &str) -> Result<()> {
        self.client.move_file(source, dest).await.map(|_| ())
    }

    async fn copy_file(&self, source: &str, dest: &str) -> Result<()> {
        self.client.copy_file(source, dest).await.map(|_| ())
    }

    async fn start_print(&self, filename: &str) -> Result<()> {
        self.client.start_print(filename).await.map(|_| ())
    }

    async fn create_directory(&self, path: &str) -> Result<String> {
        // Default into the gcodes root unless another root was named.
        let path = if path.starts_with("gcodes/") || path.starts_with("config/") {
            path.to_string()
        } else {
            format!("gcodes/{path}")
        };
        let result = self.client.create_directory(&path).await?;
        let created = result
            .get("item")
            .map(|item| data_or(item, "path", &path))
            .unwrap_or(path);
        Ok(format!("Created directory: {created}"))
    }

    async fn list_directories(&self, path: &str) -> Result<Vec<RemoteDirectory>> {
        let result = self.client.list_directory(path).await?;
        Ok(result
            .get("dirs")
            .and_then(Value::as_array)
            .map(|dirs| {
                dirs.iter()
                    .map(|d| RemoteDirectory {
                        dirname: str_field(d, "dirname"),
                        size: d.get("size").and_then(Value::as_u64).unwrap_or(0),
                        modified: f64_field(d, "modified").unwrap_or(0.0),
                        permissions: d
                            .get("permissions")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upload_file(&self, local: &Path, remote: &str) -> Result<String> {
        let result = self.client.upload_file(local, remote).await?;
        let dest = result
            .get("item")
            .map(|item| data_or(item, "path", remote))
            .unwrap_or_else(|| remote.to_string());
        Ok(format!("Uploaded: {} -> {dest}", local.display()))
    }

    async fn download_file(&self, remote: &str, local: &Path) -> Result<String> {
        self.client.download_file(remote, local).await?;
        Ok(format!("Downloaded: {remote} -> {}", local.display()))
    }
}

fn data_or(data: &Value, field: &str, default: &str) -> String {
    data.get(field)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Pull `params.NAME` references out of macro G-code.
fn extract_macro_parameters(gcode: &str) -> Vec<String> {
    let mut params: Vec<String> = Vec::new();
    let mut rest = gcode;
    while let Some(pos) = rest.find("params.") {
        rest = &rest[pos + "params.".len()..];
        let name: String = rest
            .chars()
            .take_while(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '_')
            .collect();
        if !name.is_empty() && !params.contains(&name) {
            params.push(name);
        }
    }
    params.sort();
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_strips_first_matching_prefix() {
        assert_eq!(display_name("fan_generic BedFans", FAN_PREFIXES), "BedFans");
        assert_eq!(display_name("heater_fan hotend", FAN_PREFIXES), "hotend");
        assert_eq!(display_name("fan", FAN_PREFIXES), "fan");
    }

    #[test]
    fn qualify_adds_prefix_only_when_missing() {
        assert_eq!(Handlers::qualify_fan("BedFans"), "fan_generic BedFans");
        assert_eq!(Handlers::qualify_fan("fan"), "fan");
        assert_eq!(
            Handlers::qualify_fan("heater_fan hotend"),
            "heater_fan hotend"
        );
        assert_eq!(Handlers::qualify_sensor("extruder"), "extruder");
        assert_eq!(Handlers::qualify_sensor("Pi"), "temperature_sensor Pi");
        assert_eq!(Handlers::qualify_pin("caselight"), "output_pin caselight");
    }

    #[test]
    fn macro_parameters_are_extracted_sorted_and_deduped() {
        let gcode = "M117 {params.MSG}\nG1 F{params.SPEED}\nM117 {params.MSG}";
        assert_eq!(extract_macro_parameters(gcode), vec!["MSG", "SPEED"]);
    }
}
