// Command registry and dispatcher
//
// A closed table of commands is built once at startup; execution looks the
// typed name up and runs the matching handler against the capability
// provider. The registry also owns the session's local working-directory
// cursor, used by the filesystem navigation commands and by anything that
// resolves a relative local path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{ConsoleError, Result};
use crate::listing::{filter_entries, sort_entries, ListEntry, ListingArgs};
use crate::models::{
    Endstops, Fan, GcodeCommand, GcodeFile, Heater, Led, MacroInfo, OutputPin, PrintStatus,
    PrinterState, RemoteDirectory, TemperatureSensor, Toolhead,
};
use crate::parser::ParsedCommand;
use crate::provider::Provider;
use crate::viewer::ConsoleViewer;

/// What a command evaluates to. `Exit` is the sentinel the session loop
/// recognizes; everything else is handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Exit,
    Text(String),
    Lines(Vec<String>),
    Sensor(TemperatureSensor),
    Sensors(Vec<TemperatureSensor>),
    Fan(Fan),
    Fans(Vec<Fan>),
    Led(Led),
    Leds(Vec<Led>),
    Macro(MacroInfo),
    Heater(Heater),
    Heaters(Vec<Heater>),
    Pin(OutputPin),
    Pins(Vec<OutputPin>),
    GcodeCommand(GcodeCommand),
    Toolhead(Toolhead),
    Endstops(Endstops),
    PrinterState(PrinterState),
    PrintStatus(PrintStatus),
    File(GcodeFile),
    Files(Vec<GcodeFile>),
    Directories(Vec<RemoteDirectory>),
}

/// Closed set of operations the dispatcher knows. Built once; no open-ended
/// registration at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    GetSensor,
    GetFan,
    GetLed,
    GetMacro,
    GetHeater,
    GetPin,
    GetToolhead,
    GetEndstops,
    GetStatus,
    GetPrintStatus,
    GetGcode,
    GetFile,
    RunGcode,
    RunMacro,
    Home,
    Extrude,
    SetFan,
    SetLed,
    SetHeater,
    SetPin,
    Console,
    Pwd,
    Cd,
    Ls,
    Mkdir,
    ListDir,
    DeleteFile,
    MoveFile,
    CopyFile,
    PrintFile,
    UploadFile,
    DownloadFile,
    Help,
    Exit,
}

struct CommandDescriptor {
    kind: CommandKind,
    help: &'static str,
}

/// Name and one-line summary, as the completion engine wants them.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub help: &'static str,
}

/// Local working-directory cursor. Shared between the registry and the
/// completion engine; only `cd` writes it.
#[derive(Clone)]
pub struct SessionCursor {
    inner: Arc<Mutex<PathBuf>>,
}

impl SessionCursor {
    fn new() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self {
            inner: Arc::new(Mutex::new(cwd)),
        }
    }

    pub fn get(&self) -> PathBuf {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set(&self, path: PathBuf) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = path;
    }

    /// Resolve a possibly relative path against the cursor, expanding `~`.
    pub fn resolve(&self, path: &str) -> PathBuf {
        if path == "~" {
            return dirs::home_dir().unwrap_or_else(|| self.get());
        }
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.get().join(p)
        }
    }
}

fn command_table() -> BTreeMap<&'static str, CommandDescriptor> {
    use CommandKind::*;

    let mut table = BTreeMap::new();
    let mut add = |name: &'static str, kind: CommandKind, help: &'static str| {
        table.insert(name, CommandDescriptor { kind, help });
    };

    add("get_sensor", GetSensor, "Get sensor(s): get_sensor [name]");
    add("get_fan", GetFan, "Get fan(s): get_fan [name]");
    add("get_led", GetLed, "Get LED(s): get_led [name]");
    add("get_macro", GetMacro, "Get macro(s): get_macro [name]");
    add("get_heater", GetHeater, "Get heater(s): get_heater [name]");
    add("get_pin", GetPin, "Get pin(s): get_pin [name]");
    add("get_toolhead", GetToolhead, "Get toolhead status and homing state");
    add("get_endstops", GetEndstops, "Get endstop status");
    add("get_status", GetStatus, "Get printer status");
    add("get_print_status", GetPrintStatus, "Get current print job status");
    add(
        "get_file",
        GetFile,
        "Get file(s): get_file [flags] [pattern] or get_file <filename>\n\
         Flags: -t (time) -S (size) -n (name) -r (reverse)\n\
         Example: get_file -t *.gcode",
    );
    add(
        "console",
        Console,
        "Enter interactive console viewer with real-time output",
    );
    add("set_fan", SetFan, "Set fan speed: set_fan <name> SPEED=<0.0-1.0>");
    add(
        "set_led",
        SetLed,
        "Set LED color: set_led <name> RED=<0-1> GREEN=<0-1> BLUE=<0-1> [WHITE=<0-1>] [INDEX=<n>]",
    );
    add(
        "set_heater",
        SetHeater,
        "Set heater temp: set_heater <name> TEMP=<celsius> (CAUTION: Physical heater control)",
    );
    add("set_pin", SetPin, "Set pin value: set_pin <name> VALUE=<0.0-1.0>");
    add("get_gcode", GetGcode, "Get G-code command(s): get_gcode [command]");
    add("run_gcode", RunGcode, "Run G-code: run_gcode <command> [params...]");
    add("run", RunMacro, "Run macro: run <macro_name> [PARAM=value ...]");
    add("home", Home, "Home axes: home [X] [Y] [Z] (no args = home all)");
    add(
        "extrude",
        Extrude,
        "Extrude filament: extrude AMOUNT=<mm> [FEEDRATE=<mm/min>]",
    );
    add("pwd", Pwd, "Show current local working directory");
    add(
        "ls",
        Ls,
        "List local files: ls [flags] [pattern]\n\
         Flags: -t (time) -S (size) -n (name) -r (reverse) -a (all/hidden)\n\
         Example: ls -t *.gcode",
    );
    add("cd", Cd, "Change local directory: cd <path>");
    add("mkdir", Mkdir, "Create directory: mkdir <path>");
    add(
        "list_dir",
        ListDir,
        "List directories: list_dir [flags] [pattern]\n\
         Flags: -t (time) -S (size) -n (name) -r (reverse)\n\
         Example: list_dir -t subfolder_*",
    );
    add("delete_file", DeleteFile, "Delete G-code file: delete_file <filename>");
    add("move_file", MoveFile, "Move G-code file: move_file <source> <dest>");
    add("copy_file", CopyFile, "Copy G-code file: copy_file <source> <dest>");
    add("print_file", PrintFile, "Print G-code file: print_file <filename>");
    add(
        "upload_file",
        UploadFile,
        "Upload file: upload_file <local_path> [remote_path]",
    );
    add(
        "download_file",
        DownloadFile,
        "Download file: download_file <remote_path> <local_path>",
    );
    add("help", Help, "Show available commands");
    add("exit", Exit, "Exit the console");
    add("quit", Exit, "Exit the console");

    table
}

pub struct CommandRegistry {
    provider: Arc<dyn Provider>,
    commands: BTreeMap<&'static str, CommandDescriptor>,
    cursor: SessionCursor,
    split_screen: bool,
}

impl CommandRegistry {
    pub fn new(provider: Arc<dyn Provider>, split_screen: bool) -> Self {
        Self {
            provider,
            commands: command_table(),
            cursor: SessionCursor::new(),
            split_screen,
        }
    }

    /// Registered command names in sorted order.
    pub fn command_names(&self) -> Vec<&'static str> {
        self.commands.keys().copied().collect()
    }

    pub fn help_for(&self, name: &str) -> Option<&'static str> {
        self.commands.get(name).map(|d| d.help)
    }

    /// Name/summary pairs for the completion engine.
    pub fn command_specs(&self) -> Vec<CommandSpec> {
        self.commands
            .iter()
            .map(|(name, d)| CommandSpec {
                name,
                help: d.help,
            })
            .collect()
    }

    pub fn cursor(&self) -> SessionCursor {
        self.cursor.clone()
    }

    pub fn provider(&self) -> Arc<dyn Provider> {
        Arc::clone(&self.provider)
    }

    /// Execute a parsed command. Unknown names are a dispatch error; handler
    /// failures propagate as typed errors.
    pub async fn execute(&self, cmd: &ParsedCommand) -> Result<CommandOutput> {
        let descriptor = self
            .commands
            .get(cmd.name.as_str())
            .ok_or_else(|| ConsoleError::Dispatch(cmd.name.clone()))?;

        use CommandKind::*;
        match descriptor.kind {
            GetSensor => match cmd.args.first() {
                Some(name) => Ok(CommandOutput::Sensor(self.provider.sensor(name).await?)),
                None => Ok(CommandOutput::Sensors(self.provider.all_sensors().await?)),
            },
            GetFan => match cmd.args.first() {
                Some(name) => Ok(CommandOutput::Fan(self.provider.fan(name).await?)),
                None => Ok(CommandOutput::Fans(self.provider.all_fans().await?)),
            },
            GetLed => match cmd.args.first() {
                Some(name) => Ok(CommandOutput::Led(self.provider.led(name).await?)),
                None => Ok(CommandOutput::Leds(self.provider.all_leds().await?)),
            },
            GetMacro => match cmd.args.first() {
                Some(name) => Ok(CommandOutput::Macro(self.provider.macro_info(name).await?)),
                None => Ok(CommandOutput::Lines(self.provider.list_macros().await?)),
            },
            GetHeater => match cmd.args.first() {
                Some(name) => Ok(CommandOutput::Heater(self.provider.heater(name).await?)),
                None => Ok(CommandOutput::Heaters(self.provider.all_heaters().await?)),
            },
            GetPin => match cmd.args.first() {
                Some(name) => Ok(CommandOutput::Pin(self.provider.pin(name).await?)),
                None => Ok(CommandOutput::Pins(self.provider.all_pins().await?)),
            },
            GetToolhead => Ok(CommandOutput::Toolhead(self.provider.toolhead().await?)),
            GetEndstops => Ok(CommandOutput::Endstops(self.provider.endstops().await?)),
            GetStatus => Ok(CommandOutput::PrinterState(
                self.provider.printer_state().await?,
            )),
            GetPrintStatus => Ok(CommandOutput::PrintStatus(
                self.provider.print_status().await?,
            )),
            GetGcode => match cmd.args.first() {
                Some(name) => Ok(CommandOutput::GcodeCommand(
                    self.provider.gcode_command(name).await?,
                )),
                None => Ok(CommandOutput::Lines(
                    self.provider.list_gcode_commands().await?,
                )),
            },
            GetFile => self.get_file(cmd).await,
            RunGcode => self.run_gcode(cmd).await,
            RunMacro => self.run_macro(cmd).await,
            Home => self.home(cmd).await,
            Extrude => self.extrude(cmd).await,
            SetFan => self.set_fan(cmd).await,
            SetLed => self.set_led(cmd).await,
            SetHeater => self.set_heater(cmd).await,
            SetPin => self.set_pin(cmd).await,
            Console => {
                let viewer =
                    ConsoleViewer::new(Arc::clone(&self.provider), self.split_screen);
                viewer.run().await;
                Ok(CommandOutput::Text("Exited console mode".to_string()))
            }
            Pwd => Ok(CommandOutput::Text(format!(
                "Local: {}",
                self.cursor.get().display()
            ))),
            Cd => self.cd(cmd),
            Ls => self.ls(cmd),
            Mkdir => {
                let path = cmd
                    .args
                    .first()
                    .ok_or_else(|| ConsoleError::validation("Usage: mkdir <path>"))?;
                Ok(CommandOutput::Text(
                    self.provider.create_directory(path).await?,
                ))
            }
            ListDir => self.list_dir(cmd).await,
            DeleteFile => {
                let filename = cmd
                    .args
                    .first()
                    .ok_or_else(|| ConsoleError::validation("Usage: delete_file <filename>"))?;
                self.provider.delete_file(filename).await?;
                Ok(CommandOutput::Text(format!("Deleted: {filename}")))
            }
            MoveFile => {
                let (source, dest) = two_args(cmd, "Usage: move_file <source> <dest>")?;
                self.provider.move_file(source, dest).await?;
                Ok(CommandOutput::Text(format!("Moved: {source} -> {dest}")))
            }
            CopyFile => {
                let (source, dest) = two_args(cmd, "Usage: copy_file <source> <dest>")?;
                self.provider.copy_file(source, dest).await?;
                Ok(CommandOutput::Text(format!("Copied: {source} -> {dest}")))
            }
            PrintFile => {
                let filename = cmd
                    .args
                    .first()
                    .ok_or_else(|| ConsoleError::validation("Usage: print_file <filename>"))?;
                self.provider.start_print(filename).await?;
                Ok(CommandOutput::Text(format!("Starting print: {filename}")))
            }
            UploadFile => self.upload_file(cmd).await,
            DownloadFile => self.download_file(cmd).await,
            Help => Ok(self.help(cmd)),
            Exit => Ok(CommandOutput::Exit),
        }
    }

    // -- file listing --

    async fn get_file(&self, cmd: &ParsedCommand) -> Result<CommandOutput> {
        let listing = ListingArgs::parse(&cmd.args)?;

        // An exact filename with no competing pattern is a detail lookup.
        if let Some(filename) = listing.free.first() {
            if listing.patterns.is_empty() {
                return Ok(CommandOutput::File(self.provider.file_info(filename).await?));
            }
        }

        let files = self.provider.list_gcode_files().await?;
        let mut files = filter_entries(files, &listing.patterns);
        sort_entries(&mut files, listing.key, listing.reverse);
        Ok(CommandOutput::Files(files))
    }

    async fn list_dir(&self, cmd: &ParsedCommand) -> Result<CommandOutput> {
        let listing = ListingArgs::parse(&cmd.args)?;
        let base = listing
            .free
            .first()
            .map(String::as_str)
            .unwrap_or("gcodes");

        let dirs = self.provider.list_directories(base).await?;
        let mut dirs = filter_entries(dirs, &listing.patterns);
        sort_entries(&mut dirs, listing.key, listing.reverse);
        Ok(CommandOutput::Directories(dirs))
    }

    // -- G-code and execution --

    async fn run_gcode(&self, cmd: &ParsedCommand) -> Result<CommandOutput> {
        if cmd.args.is_empty() {
            let commands = self.provider.list_gcode_commands().await?;
            if commands.is_empty() {
                return Ok(CommandOutput::Text("No G-code commands available".into()));
            }
            let mut lines =
                vec!["Available G-code commands (use 'get_gcode <cmd>' for help):".to_string()];
            lines.extend(commands.iter().take(20).map(|c| format!("  {c}")));
            if commands.len() > 20 {
                lines.push(format!("  ... and {} more", commands.len() - 20));
            }
            return Ok(CommandOutput::Text(lines.join("\n")));
        }

        let script = build_script(&cmd.args, &cmd.params);
        let output = self.provider.run_gcode(&script).await?;
        Ok(CommandOutput::Text(if output.is_empty() || output == "ok" {
            format!("Executed: {script}")
        } else {
            output
        }))
    }

    async fn run_macro(&self, cmd: &ParsedCommand) -> Result<CommandOutput> {
        if cmd.args.is_empty() {
            let macros = self.provider.list_macros().await?;
            if macros.is_empty() {
                return Ok(CommandOutput::Text("No macros available".into()));
            }
            let mut lines = vec!["Available macros:".to_string()];
            lines.extend(macros.iter().map(|m| format!("  {m}")));
            return Ok(CommandOutput::Text(lines.join("\n")));
        }

        let script = build_script(&cmd.args[..1], &cmd.params);
        let output = self.provider.run_gcode(&script).await?;
        Ok(CommandOutput::Text(if output.is_empty() || output == "ok" {
            format!("Executed: {script}")
        } else {
            output
        }))
    }

    async fn home(&self, cmd: &ParsedCommand) -> Result<CommandOutput> {
        let axes: Vec<String> = cmd
            .args
            .iter()
            .map(|a| a.to_uppercase())
            .filter(|a| matches!(a.as_str(), "X" | "Y" | "Z"))
            .collect();

        self.provider.home_axes(&axes).await?;
        Ok(CommandOutput::Text(if axes.is_empty() {
            "Homing all axes".to_string()
        } else {
            format!("Homing {}", axes.join(", "))
        }))
    }

    async fn extrude(&self, cmd: &ParsedCommand) -> Result<CommandOutput> {
        let amount = param_f64(cmd, "AMOUNT")
            .map_err(|_| ConsoleError::validation("Usage: extrude AMOUNT=<mm> [FEEDRATE=<mm/min>]"))?;
        if amount == 0.0 {
            return Err(ConsoleError::validation("Extrude amount cannot be zero"));
        }
        let feedrate = match cmd.param("FEEDRATE") {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| ConsoleError::validation(format!("Bad FEEDRATE: {raw}")))?,
            None => 300,
        };

        self.provider.extrude(amount, feedrate).await?;
        let action = if amount > 0.0 { "Extruding" } else { "Retracting" };
        Ok(CommandOutput::Text(format!(
            "{action} {}mm at {feedrate}mm/min",
            amount.abs()
        )))
    }

    // -- set commands --

    async fn set_fan(&self, cmd: &ParsedCommand) -> Result<CommandOutput> {
        let name = cmd
            .args
            .first()
            .ok_or_else(|| ConsoleError::validation("Usage: set_fan <name> SPEED=<0.0-1.0>"))?;
        let speed = unit_range(param_f64(cmd, "SPEED")?, "Fan speed")?;

        self.provider.set_fan_speed(name, speed).await?;
        Ok(CommandOutput::Text(format!("Set {name} speed to {speed}")))
    }

    async fn set_led(&self, cmd: &ParsedCommand) -> Result<CommandOutput> {
        let name = cmd.args.first().ok_or_else(|| {
            ConsoleError::validation(
                "Usage: set_led <name> RED=<0-1> GREEN=<0-1> BLUE=<0-1> [WHITE=<0-1>] [INDEX=<n>]",
            )
        })?;

        let red = unit_range(param_f64(cmd, "RED")?, "RED")?;
        let green = unit_range(param_f64(cmd, "GREEN")?, "GREEN")?;
        let blue = unit_range(param_f64(cmd, "BLUE")?, "BLUE")?;
        let white = match cmd.param("WHITE") {
            Some(raw) => unit_range(parse_f64(raw, "WHITE")?, "WHITE")?,
            None => 0.0,
        };
        let index = match cmd.param("INDEX") {
            Some(raw) => Some(
                raw.parse::<u32>()
                    .map_err(|_| ConsoleError::validation(format!("Bad INDEX: {raw}")))?,
            ),
            None => None,
        };

        self.provider
            .set_led_color(name, red, green, blue, white, index)
            .await?;
        Ok(CommandOutput::Text(format!(
            "Set {name} color to R={red} G={green} B={blue}"
        )))
    }

    async fn set_heater(&self, cmd: &ParsedCommand) -> Result<CommandOutput> {
        let name = cmd
            .args
            .first()
            .ok_or_else(|| ConsoleError::validation("Usage: set_heater <name> TEMP=<celsius>"))?;
        let temp = param_f64(cmd, "TEMP")?;
        if !(0.0..=300.0).contains(&temp) {
            return Err(ConsoleError::validation(format!(
                "Temperature must be between 0 and 300°C, got {temp}"
            )));
        }

        self.provider.set_heater_temp(name, temp).await?;
        Ok(CommandOutput::Text(format!(
            "Set {name} target temperature to {temp}°C"
        )))
    }

    async fn set_pin(&self, cmd: &ParsedCommand) -> Result<CommandOutput> {
        let name = cmd
            .args
            .first()
            .ok_or_else(|| ConsoleError::validation("Usage: set_pin <name> VALUE=<0.0-1.0>"))?;
        let value = unit_range(param_f64(cmd, "VALUE")?, "Pin value")?;

        self.provider.set_pin_value(name, value).await?;
        Ok(CommandOutput::Text(format!("Set {name} to {value}")))
    }

    // -- local filesystem --

    fn cd(&self, cmd: &ParsedCommand) -> Result<CommandOutput> {
        let target = match cmd.args.first() {
            None => dirs::home_dir()
                .ok_or_else(|| ConsoleError::filesystem("Cannot determine home directory"))?,
            Some(path) => self.cursor.resolve(path),
        };

        if !target.is_dir() {
            return Err(ConsoleError::filesystem(format!(
                "Not a directory: {}",
                target.display()
            )));
        }

        // Normalize so `..` does not accumulate in the cursor.
        let target = target.canonicalize().unwrap_or(target);
        self.cursor.set(target.clone());
        Ok(CommandOutput::Text(format!("Changed to: {}", target.display())))
    }

    fn ls(&self, cmd: &ParsedCommand) -> Result<CommandOutput> {
        let listing = ListingArgs::parse(&cmd.args)?;
        let target = match listing.free.last() {
            Some(path) => self.cursor.resolve(path),
            None => self.cursor.get(),
        };

        if !target.is_dir() {
            return Err(ConsoleError::filesystem(format!(
                "Not a directory: {}",
                target.display()
            )));
        }

        let mut entries = Vec::new();
        let read_dir = std::fs::read_dir(&target).map_err(|e| {
            ConsoleError::filesystem(format!("Cannot read {}: {e}", target.display()))
        })?;
        for entry in read_dir.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !listing.show_hidden && name.starts_with('.') {
                continue;
            }
            // Entries that cannot be stat'ed are skipped.
            let Ok(meta) = entry.metadata() else { continue };
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            entries.push(LocalEntry {
                name,
                size: meta.len(),
                modified,
                is_dir: meta.is_dir(),
            });
        }

        let mut entries = filter_entries(entries, &listing.patterns);
        sort_entries(&mut entries, listing.key, listing.reverse);

        let names: Vec<String> = entries
            .into_iter()
            .map(|e| {
                if e.is_dir {
                    format!("{}/", e.name)
                } else {
                    e.name
                }
            })
            .collect();

        Ok(CommandOutput::Lines(if names.is_empty() {
            vec!["(empty directory)".to_string()]
        } else {
            names
        }))
    }

    // -- file transfer --

    async fn upload_file(&self, cmd: &ParsedCommand) -> Result<CommandOutput> {
        let local = cmd.args.first().ok_or_else(|| {
            ConsoleError::validation("Usage: upload_file <local_path> [remote_path]")
        })?;
        let remote = cmd.args.get(1).map(String::as_str).unwrap_or("gcodes");

        let local = self.cursor.resolve(local);
        let message = self.provider.upload_file(&local, remote).await?;
        Ok(CommandOutput::Text(message))
    }

    async fn download_file(&self, cmd: &ParsedCommand) -> Result<CommandOutput> {
        let (remote, local) = two_args(cmd, "Usage: download_file <remote_path> <local_path>")?;
        let local = self.cursor.resolve(local);
        let message = self.provider.download_file(remote, &local).await?;
        Ok(CommandOutput::Text(message))
    }

    // -- help --

    fn help(&self, cmd: &ParsedCommand) -> CommandOutput {
        if let Some(name) = cmd.args.first() {
            return CommandOutput::Text(match self.help_for(name) {
                Some(help) => format!("{name}: {help}"),
                None => format!("No help available for: {name}"),
            });
        }

        let mut lines = vec!["Available commands:".to_string()];
        for name in self.command_names() {
            let help = self.help_for(name).unwrap_or_default();
            let mut parts = help.lines();
            match parts.next() {
                Some(first) => {
                    lines.push(format!("  {name:20} - {first}"));
                    for continuation in parts {
                        lines.push(format!("  {:20}   {continuation}", ""));
                    }
                }
                None => lines.push(format!("  {name}")),
            }
        }
        CommandOutput::Text(lines.join("\n"))
    }
}

/// Build a `NAME ARG.. KEY=value..` G-code script from parsed pieces.
fn build_script(args: &[String], params: &[(String, String)]) -> String {
    let mut parts: Vec<String> = args.to_vec();
    for (key, value) in params {
        parts.push(format!("{key}={value}"));
    }
    parts.join(" ")
}

fn two_args<'a>(cmd: &'a ParsedCommand, usage: &str) -> Result<(&'a str, &'a str)> {
    match (cmd.args.first(), cmd.args.get(1)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ConsoleError::validation(usage)),
    }
}

fn parse_f64(raw: &str, what: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|_| ConsoleError::validation(format!("Bad {what}: {raw}")))
}

fn param_f64(cmd: &ParsedCommand, key: &str) -> Result<f64> {
    let raw = cmd
        .param(key)
        .ok_or_else(|| ConsoleError::validation(format!("{key} parameter required")))?;
    parse_f64(raw, key)
}

fn unit_range(value: f64, what: &str) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConsoleError::validation(format!(
            "{what} must be between 0.0 and 1.0, got {value}"
        )))
    }
}

struct LocalEntry {
    name: String,
    size: u64,
    modified: f64,
    is_dir: bool,
}

impl ListEntry for LocalEntry {
    fn entry_name(&self) -> &str {
        &self.name
    }
    fn entry_modified(&self) -> f64 {
        self.modified
    }
    fn entry_size(&self) -> u64 {
        self.size
    }
}
