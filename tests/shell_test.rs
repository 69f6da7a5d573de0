// End-to-end command dispatch against an in-memory provider.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use moonshell::complete::{Category, CompletionCache};
use moonshell::error::{ConsoleError, Result};
use moonshell::models::{
    ConsoleMessage, Endstops, Fan, GcodeCommand, GcodeFile, Heater, Led, MacroInfo, OutputPin,
    PrintStatus, PrinterState, RemoteDirectory, TemperatureSensor, Toolhead,
};
use moonshell::parser::parse_line;
use moonshell::provider::Provider;
use moonshell::registry::{CommandOutput, CommandRegistry};
use moonshell::viewer::ConsoleViewer;

#[derive(Default)]
struct FakeProvider {
    fan_speeds: Mutex<HashMap<String, f64>>,
    scripts: Mutex<Vec<String>>,
    files: Vec<GcodeFile>,
    fail_fans: bool,
}

fn unwired<T>() -> Result<T> {
    Err(ConsoleError::backend("not wired in this test"))
}

#[async_trait]
impl Provider for FakeProvider {
    async fn list_sensors(&self) -> Result<Vec<String>> {
        Ok(vec![
            "temperature_sensor chamber".to_string(),
            "extruder".to_string(),
        ])
    }

    async fn list_fans(&self) -> Result<Vec<String>> {
        if self.fail_fans {
            return Err(ConsoleError::backend("fan query failed"));
        }
        Ok(vec!["fan_generic BedFans".to_string(), "fan".to_string()])
    }

    async fn list_leds(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn list_macros(&self) -> Result<Vec<String>> {
        Ok(vec!["LOAD_FILAMENT".to_string()])
    }

    async fn list_heaters(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn list_pins(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn sensor(&self, _name: &str) -> Result<TemperatureSensor> {
        unwired()
    }

    async fn all_sensors(&self) -> Result<Vec<TemperatureSensor>> {
        unwired()
    }

    async fn fan(&self, name: &str) -> Result<Fan> {
        let speeds = self.fan_speeds.lock().unwrap();
        Ok(Fan {
            name: name.to_string(),
            speed: speeds.get(name).copied().unwrap_or(0.0),
            rpm: None,
        })
    }

    async fn all_fans(&self) -> Result<Vec<Fan>> {
        unwired()
    }

    async fn led(&self, _name: &str) -> Result<Led> {
        unwired()
    }

    async fn all_leds(&self) -> Result<Vec<Led>> {
        unwired()
    }

    async fn macro_info(&self, _name: &str) -> Result<MacroInfo> {
        unwired()
    }

    async fn heater(&self, _name: &str) -> Result<Heater> {
        unwired()
    }

    async fn all_heaters(&self) -> Result<Vec<Heater>> {
        unwired()
    }

    async fn pin(&self, _name: &str) -> Result<OutputPin> {
        unwired()
    }

    async fn all_pins(&self) -> Result<Vec<OutputPin>> {
        unwired()
    }

    async fn toolhead(&self) -> Result<Toolhead> {
        unwired()
    }

    async fn endstops(&self) -> Result<Endstops> {
        unwired()
    }

    async fn printer_state(&self) -> Result<PrinterState> {
        unwired()
    }

    async fn print_status(&self) -> Result<PrintStatus> {
        unwired()
    }

    async fn set_fan_speed(&self, name: &str, speed: f64) -> Result<()> {
        self.fan_speeds
            .lock()
            .unwrap()
            .insert(name.to_string(), speed);
        Ok(())
    }

    async fn set_led_color(
        &self,
        _name: &str,
        _red: f64,
        _green: f64,
        _blue: f64,
        _white: f64,
        _index: Option<u32>,
    ) -> Result<()> {
        unwired()
    }

    async fn set_heater_temp(&self, _name: &str, _target: f64) -> Result<()> {
        unwired()
    }

    async fn set_pin_value(&self, _name: &str, _value: f64) -> Result<()> {
        unwired()
    }

    async fn list_gcode_commands(&self) -> Result<Vec<String>> {
        Ok(vec!["G28".to_string(), "M104".to_string()])
    }

    async fn gcode_command(&self, _name: &str) -> Result<GcodeCommand> {
        unwired()
    }

    async fn run_gcode(&self, script: &str) -> Result<String> {
        self.scripts.lock().unwrap().push(script.to_string());
        Ok("ok".to_string())
    }

    async fn home_axes(&self, axes: &[String]) -> Result<()> {
        let script = if axes.is_empty() {
            "G28".to_string()
        } else {
            format!("G28 {}", axes.join(" "))
        };
        self.scripts.lock().unwrap().push(script);
        Ok(())
    }

    async fn extrude(&self, _amount: f64, _feedrate: i64) -> Result<()> {
        unwired()
    }

    async fn console_history(&self, _count: usize) -> Result<Vec<ConsoleMessage>> {
        Ok(Vec::new())
    }

    async fn subscribe_console(&self) -> Result<mpsc::UnboundedReceiver<ConsoleMessage>> {
        unwired()
    }

    async fn list_gcode_files(&self) -> Result<Vec<GcodeFile>> {
        Ok(self.files.clone())
    }

    async fn file_info(&self, filename: &str) -> Result<GcodeFile> {
        self.files
            .iter()
            .find(|f| f.filename == filename)
            .cloned()
            .ok_or_else(|| ConsoleError::backend(format!("File not found: {filename}")))
    }

    async fn delete_file(&self, _filename: &str) -> Result<()> {
        unwired()
    }

    async fn move_file(&self, _source: &str, _dest: &str) -> Result<()> {
        unwired()
    }

    async fn copy_file(&self, _source: &str, _dest: &str) -> Result<()> {
        unwired()
    }

    async fn start_print(&self, _filename: &str) -> Result<()> {
        unwired()
    }

    async fn create_directory(&self, _path: &str) -> Result<String> {
        unwired()
    }

    async fn list_directories(&self, _path: &str) -> Result<Vec<RemoteDirectory>> {
        unwired()
    }

    async fn upload_file(&self, _local: &Path, _remote: &str) -> Result<String> {
        unwired()
    }

    async fn download_file(&self, _remote: &str, _local: &Path) -> Result<String> {
        unwired()
    }
}

fn registry_with(provider: FakeProvider) -> (Arc<FakeProvider>, CommandRegistry) {
    let provider = Arc::new(provider);
    let registry = CommandRegistry::new(Arc::clone(&provider) as Arc<dyn Provider>, false);
    (provider, registry)
}

async fn run(registry: &CommandRegistry, line: &str) -> Result<CommandOutput> {
    let parsed = parse_line(line).expect("input should parse");
    registry.execute(&parsed).await
}

#[tokio::test]
async fn set_fan_round_trips_through_the_provider() {
    let (provider, registry) = registry_with(FakeProvider::default());

    let output = run(&registry, "set_fan BedFans SPEED=0.25").await.unwrap();
    assert_eq!(
        output,
        CommandOutput::Text("Set BedFans speed to 0.25".to_string())
    );
    assert_eq!(provider.fan_speeds.lock().unwrap()["BedFans"], 0.25);

    match run(&registry, "get_fan BedFans").await.unwrap() {
        CommandOutput::Fan(fan) => assert_eq!(fan.speed, 0.25),
        other => panic!("expected a fan, got {other:?}"),
    }
}

#[tokio::test]
async fn set_fan_rejects_out_of_range_speed() {
    let (provider, registry) = registry_with(FakeProvider::default());

    let err = run(&registry, "set_fan BedFans SPEED=1.5").await.unwrap_err();
    assert!(matches!(err, ConsoleError::Validation(_)));
    assert!(provider.fan_speeds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_command_is_a_dispatch_error() {
    let (_, registry) = registry_with(FakeProvider::default());

    let err = run(&registry, "frobnicate now").await.unwrap_err();
    assert!(matches!(err, ConsoleError::Dispatch(name) if name == "frobnicate"));
}

#[tokio::test]
async fn run_builds_a_macro_script_from_params() {
    let (provider, registry) = registry_with(FakeProvider::default());

    let output = run(&registry, "run LOAD_FILAMENT SPEED=300").await.unwrap();
    assert_eq!(
        output,
        CommandOutput::Text("Executed: LOAD_FILAMENT SPEED=300".to_string())
    );
    assert_eq!(
        provider.scripts.lock().unwrap().as_slice(),
        ["LOAD_FILAMENT SPEED=300"]
    );
}

#[tokio::test]
async fn home_filters_to_known_axes() {
    let (provider, registry) = registry_with(FakeProvider::default());

    let output = run(&registry, "home x q z").await.unwrap();
    assert_eq!(output, CommandOutput::Text("Homing X, Z".to_string()));
    assert_eq!(provider.scripts.lock().unwrap().as_slice(), ["G28 X Z"]);
}

#[tokio::test]
async fn get_file_with_exact_name_returns_details() {
    let mut provider = FakeProvider::default();
    provider.files = vec![
        GcodeFile::basic("benchy.gcode", 1024, 100.0),
        GcodeFile::basic("bracket.gcode", 2048, 200.0),
    ];
    let (_, registry) = registry_with(provider);

    match run(&registry, "get_file benchy.gcode").await.unwrap() {
        CommandOutput::File(file) => assert_eq!(file.filename, "benchy.gcode"),
        other => panic!("expected file details, got {other:?}"),
    }

    // A glob is a listing, newest first.
    match run(&registry, "get_file -t *.gcode").await.unwrap() {
        CommandOutput::Files(files) => {
            let names: Vec<_> = files.iter().map(|f| f.filename.as_str()).collect();
            assert_eq!(names, ["bracket.gcode", "benchy.gcode"]);
        }
        other => panic!("expected a file listing, got {other:?}"),
    }
}

#[tokio::test]
async fn ls_hides_dotfiles_unless_asked() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("part.gcode"), b"").unwrap();
    std::fs::write(dir.path().join(".secret"), b"").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();

    let (_, registry) = registry_with(FakeProvider::default());
    registry.cursor().set(dir.path().to_path_buf());

    match run(&registry, "ls").await.unwrap() {
        CommandOutput::Lines(lines) => {
            assert_eq!(lines, ["part.gcode", "sub/"]);
        }
        other => panic!("expected lines, got {other:?}"),
    }

    match run(&registry, "ls -a").await.unwrap() {
        CommandOutput::Lines(lines) => assert!(lines.contains(&".secret".to_string())),
        other => panic!("expected lines, got {other:?}"),
    }
}

#[tokio::test]
async fn cd_moves_the_cursor_into_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("prints")).unwrap();

    let (_, registry) = registry_with(FakeProvider::default());
    registry.cursor().set(dir.path().to_path_buf());

    run(&registry, "cd prints").await.unwrap();
    assert_eq!(
        registry.cursor().get(),
        dir.path().join("prints").canonicalize().unwrap()
    );
}

#[tokio::test]
async fn cd_into_a_non_directory_leaves_the_cursor_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("part.gcode"), b"").unwrap();

    let (_, registry) = registry_with(FakeProvider::default());
    registry.cursor().set(dir.path().to_path_buf());

    let err = run(&registry, "cd part.gcode").await.unwrap_err();
    assert!(matches!(err, ConsoleError::Filesystem(_)));
    assert_eq!(registry.cursor().get(), dir.path());

    let err = run(&registry, "cd no_such_dir").await.unwrap_err();
    assert!(matches!(err, ConsoleError::Filesystem(_)));
    assert_eq!(registry.cursor().get(), dir.path());
}

#[tokio::test]
async fn exit_and_quit_both_signal_the_sentinel() {
    let (_, registry) = registry_with(FakeProvider::default());
    assert_eq!(run(&registry, "exit").await.unwrap(), CommandOutput::Exit);
    assert_eq!(run(&registry, "quit").await.unwrap(), CommandOutput::Exit);
}

#[tokio::test]
async fn help_lists_every_registered_command() {
    let (_, registry) = registry_with(FakeProvider::default());

    match run(&registry, "help").await.unwrap() {
        CommandOutput::Text(text) => {
            for name in registry.command_names() {
                assert!(text.contains(name), "help is missing {name}");
            }
        }
        other => panic!("expected text, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn viewer_stops_promptly_at_end_of_input() {
    // Needs a non-interactive stdin (EOF) so the viewer goes straight to
    // shutdown: background roles must stop within their bounded joins.
    use crossterm::tty::IsTty;
    if std::io::stdin().is_tty() {
        return;
    }
    let provider: Arc<dyn Provider> = Arc::new(FakeProvider::default());
    let viewer = ConsoleViewer::new(provider, true);
    tokio::time::timeout(std::time::Duration::from_secs(10), viewer.run())
        .await
        .expect("viewer should stop once input ends");
}

#[tokio::test]
async fn cache_refresh_failure_keeps_prior_category() {
    let mut cache = CompletionCache::default();

    cache.refresh(&FakeProvider::default()).await;
    assert!(cache.is_valid());
    assert_eq!(cache.names(Category::Fans), ["BedFans", "fan"]);
    assert_eq!(cache.names(Category::Sensors), ["chamber", "extruder"]);

    // Fans now fail; the stale fan list survives and sensors still refresh.
    let failing = FakeProvider {
        fail_fans: true,
        ..FakeProvider::default()
    };
    cache.refresh(&failing).await;
    assert_eq!(cache.names(Category::Fans), ["BedFans", "fan"]);
    assert_eq!(cache.names(Category::Sensors), ["chamber", "extruder"]);
}
