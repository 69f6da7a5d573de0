// Terminal rendering for command results
//
// Pure formatting helpers return strings so they can be tested; `render`
// writes to stdout with crossterm styling and is the only place that
// prints command output.

use chrono::{DateTime, Local, TimeZone};
use crossterm::style::Stylize;

use crate::error::ConsoleError;
use crate::models::{
    Endstops, Fan, GcodeCommand, GcodeFile, Heater, Led, MacroInfo, OutputPin, PrintStatus,
    PrinterState, RemoteDirectory, TemperatureSensor, Toolhead,
};
use crate::registry::CommandOutput;

pub fn render(output: &CommandOutput) {
    match output {
        CommandOutput::Exit => {}
        CommandOutput::Text(text) => println!("{text}"),
        CommandOutput::Lines(lines) => {
            for line in lines {
                println!("{line}");
            }
        }
        CommandOutput::Sensor(sensor) => render_sensor(sensor),
        CommandOutput::Sensors(sensors) => {
            for sensor in sensors {
                render_sensor(sensor);
            }
        }
        CommandOutput::Fan(fan) => render_fan(fan),
        CommandOutput::Fans(fans) => {
            for fan in fans {
                render_fan(fan);
            }
        }
        CommandOutput::Led(led) => render_led(led),
        CommandOutput::Leds(leds) => {
            for led in leds {
                render_led(led);
            }
        }
        CommandOutput::Macro(info) => render_macro(info),
        CommandOutput::Heater(heater) => render_heater(heater),
        CommandOutput::Heaters(heaters) => {
            for heater in heaters {
                render_heater(heater);
            }
        }
        CommandOutput::Pin(pin) => render_pin(pin),
        CommandOutput::Pins(pins) => {
            for pin in pins {
                render_pin(pin);
            }
        }
        CommandOutput::GcodeCommand(command) => {
            println!("{}", command.name.clone().cyan().bold());
            println!("  {}", command.description);
        }
        CommandOutput::Toolhead(toolhead) => render_toolhead(toolhead),
        CommandOutput::Endstops(endstops) => render_endstops(endstops),
        CommandOutput::PrinterState(state) => render_printer_state(state),
        CommandOutput::PrintStatus(status) => render_print_status(status),
        CommandOutput::File(file) => render_file_details(file),
        CommandOutput::Files(files) => render_file_list(files),
        CommandOutput::Directories(dirs) => render_directory_list(dirs),
    }
}

pub fn print_error(err: &ConsoleError) {
    eprintln!("{}", format!("Error: {err}").red());
}

fn render_sensor(sensor: &TemperatureSensor) {
    let mut line = format!(
        "{:<24} {:>7.1}°C",
        sensor.name.clone().cyan(),
        sensor.temperature
    );
    if let Some(target) = sensor.target {
        line.push_str(&format!("  target {target:>5.1}°C"));
    }
    if let Some(power) = sensor.power {
        line.push_str(&format!("  power {:>4.0}%", power * 100.0));
    }
    if let (Some(min), Some(max)) = (sensor.measured_min_temp, sensor.measured_max_temp) {
        line.push_str(&format!("  (min {min:.1}, max {max:.1})"));
    }
    println!("{line}");
}

fn render_fan(fan: &Fan) {
    let mut line = format!(
        "{:<24} {:>4.0}%",
        fan.name.clone().cyan(),
        fan.speed * 100.0
    );
    if let Some(rpm) = fan.rpm {
        line.push_str(&format!("  {rpm:.0} RPM"));
    }
    println!("{line}");
}

fn render_led(led: &Led) {
    println!("{}", led.name.clone().cyan());
    match &led.color_data {
        Some(chips) if !chips.is_empty() => {
            for (index, chip) in chips.iter().enumerate() {
                println!("  [{index}] {}", format_channels(chip));
            }
        }
        _ => println!("  (no color data)"),
    }
}

/// "R=1.00 G=0.50 B=0.00 W=0.00"; trailing channels beyond the chip's
/// channel count are simply absent.
fn format_channels(chip: &[f64]) -> String {
    const LABELS: [&str; 4] = ["R", "G", "B", "W"];
    chip.iter()
        .zip(LABELS)
        .map(|(value, label)| format!("{label}={value:.2}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_macro(info: &MacroInfo) {
    println!("{}", info.name.clone().cyan().bold());
    if let Some(description) = &info.description {
        println!("  {description}");
    }
    if !info.parameters.is_empty() {
        println!("  Parameters: {}", info.parameters.join(", "));
    }
    if let Some(gcode) = &info.gcode {
        println!("  Gcode:");
        for line in gcode.lines() {
            println!("    {}", line.dark_grey());
        }
    }
}

fn render_heater(heater: &Heater) {
    println!(
        "{:<24} {:>7.1}°C  target {:>5.1}°C  power {:>4.0}%",
        heater.name.clone().cyan(),
        heater.temperature,
        heater.target,
        heater.power * 100.0
    );
}

fn render_pin(pin: &OutputPin) {
    println!("{:<24} {:.2}", pin.name.clone().cyan(), pin.value);
}

fn render_toolhead(toolhead: &Toolhead) {
    let homed = if toolhead.homed_axes.is_empty() {
        "none".to_string()
    } else {
        toolhead.homed_axes.to_uppercase()
    };
    println!("Homed axes:  {homed}");
    let position = toolhead
        .position
        .iter()
        .zip(["X", "Y", "Z", "E"])
        .map(|(value, axis)| format!("{axis}={value:.2}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!("Position:    {position}");
    println!("Print time:  {}", format_duration(toolhead.print_time));
}

fn render_endstops(endstops: &Endstops) {
    for (name, state) in &endstops.endstops {
        let styled = if state == "TRIGGERED" {
            state.clone().red().to_string()
        } else {
            state.clone().green().to_string()
        };
        println!("{name:<16} {styled}");
    }
}

fn render_printer_state(state: &PrinterState) {
    let styled = match state.state.as_str() {
        "ready" => state.state.clone().green().to_string(),
        "error" | "shutdown" => state.state.clone().red().to_string(),
        _ => state.state.clone().yellow().to_string(),
    };
    println!("State: {styled}");
    if !state.state_message.trim().is_empty() {
        println!("{}", state.state_message.trim());
    }
}

fn render_print_status(status: &PrintStatus) {
    let state = match status.state.as_str() {
        "printing" => status.state.clone().green().to_string(),
        "error" | "cancelled" => status.state.clone().red().to_string(),
        "paused" => status.state.clone().yellow().to_string(),
        _ => status.state.clone(),
    };
    println!("State:     {state}");
    if !status.filename.is_empty() {
        println!("File:      {}", status.filename);
        println!("Progress:  {:.1}%", status.progress * 100.0);
        println!("Elapsed:   {}", format_duration(status.print_duration));
        println!("Filament:  {:.1} mm", status.filament_used);
    }
    if !status.message.is_empty() {
        println!("{}", status.message.clone().yellow());
    }
}

fn render_file_details(file: &GcodeFile) {
    println!("{}", file.filename.clone().cyan().bold());
    println!("  Size:      {}", format_size(file.size));
    println!("  Modified:  {}", format_timestamp(file.modified));
    if let Some(estimated) = file.estimated_time {
        println!("  Est. time: {}", format_duration(estimated));
    }
    if let Some(filament) = file.filament_total {
        println!("  Filament:  {filament:.1} mm");
    }
    if let Some(height) = file.object_height {
        println!("  Height:    {height:.2} mm");
    }
    if let Some(layer) = file.layer_height {
        println!("  Layer:     {layer:.2} mm");
    }
    if let Some(slicer) = &file.slicer {
        println!("  Slicer:    {slicer}");
    }
}

fn render_file_list(files: &[GcodeFile]) {
    if files.is_empty() {
        println!("(no files)");
        return;
    }
    for file in files {
        println!(
            "{:>9}  {}  {}",
            format_size(file.size),
            format_timestamp(file.modified),
            file.filename
        );
    }
}

fn render_directory_list(dirs: &[RemoteDirectory]) {
    if dirs.is_empty() {
        println!("(no directories)");
        return;
    }
    for dir in dirs {
        println!(
            "{:>9}  {}  {}",
            format_size(dir.size),
            format_timestamp(dir.modified),
            format!("{}/", dir.dirname).cyan()
        );
    }
}

// -- formatting helpers --

/// Human-readable byte size, one decimal place above bytes.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// "2h 5m 30s", dropping leading zero components.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Local time from a Unix timestamp.
pub fn format_timestamp(timestamp: f64) -> String {
    match Local.timestamp_opt(timestamp as i64, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        _ => "-".to_string(),
    }
}

/// Local time from a Unix timestamp, for use in the console viewer.
pub fn timestamp_to_local(timestamp: f64) -> DateTime<Local> {
    match Local.timestamp_opt(timestamp as i64, 0) {
        chrono::LocalResult::Single(dt) => dt,
        _ => Local::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_scale_through_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn durations_drop_leading_zero_components() {
        assert_eq!(format_duration(42.0), "42s");
        assert_eq!(format_duration(125.0), "2m 5s");
        assert_eq!(format_duration(7530.0), "2h 5m 30s");
        assert_eq!(format_duration(-5.0), "0s");
    }

    #[test]
    fn channels_label_up_to_four() {
        assert_eq!(format_channels(&[1.0, 0.5]), "R=1.00 G=0.50");
        assert_eq!(
            format_channels(&[0.0, 0.0, 1.0, 0.25]),
            "R=0.00 G=0.00 B=1.00 W=0.25"
        );
    }
}
