// Context-sensitive tab completion
//
// The engine itself is a pure function over (text before cursor, command
// table, candidate cache, working directory) so it can be tested without a
// terminal; `ShellHelper` adapts it to rustyline and owns the lazy cache
// refresh against the capability provider.

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Helper;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::handlers::{display_name, FAN_PREFIXES, LED_PREFIXES, PIN_PREFIXES, SENSOR_PREFIXES};
use crate::provider::Provider;
use crate::registry::{CommandSpec, SessionCursor};

/// One completion candidate. `insert` is what lands in the buffer (quoted
/// when it contains spaces); `display` is the unquoted label shown in the
/// candidate list.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub insert: String,
    pub display: String,
    pub meta: Option<String>,
}

/// Commands whose first argument is a local path.
const LOCAL_PATH_COMMANDS: &[&str] = &["upload_file", "ls", "cd"];

/// Fixed parameter vocabulary offered from the third token onward.
fn parameter_vocabulary(command: &str) -> &'static [&'static str] {
    match command {
        "set_fan" => &["SPEED="],
        "set_led" => &["RED=", "GREEN=", "BLUE=", "WHITE=", "INDEX="],
        "set_heater" => &["TEMP="],
        "set_pin" => &["VALUE="],
        "extrude" => &["AMOUNT=", "FEEDRATE="],
        _ => &[],
    }
}

/// Candidate categories for slow-to-fetch name lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Sensors,
    Fans,
    Leds,
    Macros,
    Heaters,
    Pins,
    GcodeCommands,
    GcodeFiles,
}

fn category_for(command: &str) -> Option<Category> {
    Some(match command {
        "get_sensor" => Category::Sensors,
        "get_fan" | "set_fan" => Category::Fans,
        "get_led" | "set_led" => Category::Leds,
        "get_macro" | "run" => Category::Macros,
        "get_heater" | "set_heater" => Category::Heaters,
        "get_pin" | "set_pin" => Category::Pins,
        "get_gcode" | "run_gcode" => Category::GcodeCommands,
        "get_file" | "delete_file" | "move_file" | "copy_file" | "print_file"
        | "download_file" => Category::GcodeFiles,
        _ => return None,
    })
}

/// Soft cache of resource display names, one ordered list per category.
/// Created invalid; populated wholesale on first use; never invalidated
/// automatically. A failed fetch for one category leaves the others alone.
#[derive(Debug, Default)]
pub struct CompletionCache {
    valid: bool,
    sensors: Vec<String>,
    fans: Vec<String>,
    leds: Vec<String>,
    macros: Vec<String>,
    heaters: Vec<String>,
    pins: Vec<String>,
    gcode_commands: Vec<String>,
    gcode_files: Vec<String>,
}

impl CompletionCache {
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn names(&self, category: Category) -> &[String] {
        match category {
            Category::Sensors => &self.sensors,
            Category::Fans => &self.fans,
            Category::Leds => &self.leds,
            Category::Macros => &self.macros,
            Category::Heaters => &self.heaters,
            Category::Pins => &self.pins,
            Category::GcodeCommands => &self.gcode_commands,
            Category::GcodeFiles => &self.gcode_files,
        }
    }

    #[cfg(test)]
    pub fn populate(&mut self, category: Category, names: Vec<String>) {
        match category {
            Category::Sensors => self.sensors = names,
            Category::Fans => self.fans = names,
            Category::Leds => self.leds = names,
            Category::Macros => self.macros = names,
            Category::Heaters => self.heaters = names,
            Category::Pins => self.pins = names,
            Category::GcodeCommands => self.gcode_commands = names,
            Category::GcodeFiles => self.gcode_files = names,
        }
        self.valid = true;
    }

    /// Populate every category from the provider. Fetch failures are logged
    /// and skipped, leaving any previously populated list untouched; this
    /// never surfaces an error to the completion caller.
    pub async fn refresh(&mut self, provider: &dyn Provider) {
        match provider.list_sensors().await {
            Ok(names) => self.sensors = strip_and_dedup(names, SENSOR_PREFIXES),
            Err(e) => debug!("sensor name fetch failed: {e}"),
        }
        match provider.list_fans().await {
            Ok(names) => self.fans = strip_and_dedup(names, FAN_PREFIXES),
            Err(e) => debug!("fan name fetch failed: {e}"),
        }
        match provider.list_leds().await {
            Ok(names) => self.leds = strip_and_dedup(names, LED_PREFIXES),
            Err(e) => debug!("led name fetch failed: {e}"),
        }
        match provider.list_macros().await {
            Ok(names) => self.macros = dedup_keep_order(names),
            Err(e) => debug!("macro name fetch failed: {e}"),
        }
        match provider.list_heaters().await {
            Ok(names) => self.heaters = dedup_keep_order(names),
            Err(e) => debug!("heater name fetch failed: {e}"),
        }
        match provider.list_pins().await {
            Ok(names) => self.pins = strip_and_dedup(names, PIN_PREFIXES),
            Err(e) => debug!("pin name fetch failed: {e}"),
        }
        match provider.list_gcode_commands().await {
            Ok(names) => self.gcode_commands = names,
            Err(e) => debug!("gcode command fetch failed: {e}"),
        }
        match provider.list_gcode_files().await {
            Ok(files) => {
                self.gcode_files = files.into_iter().map(|f| f.filename).collect();
            }
            Err(e) => debug!("gcode file fetch failed: {e}"),
        }
        self.valid = true;
    }
}

fn strip_and_dedup(names: Vec<String>, prefixes: &[&str]) -> Vec<String> {
    dedup_keep_order(
        names
            .into_iter()
            .map(|n| display_name(&n, prefixes))
            .collect(),
    )
}

fn dedup_keep_order(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names.into_iter().filter(|n| seen.insert(n.clone())).collect()
}

/// Quote an insertion when it contains spaces; the display label never is.
fn quote_if_needed(text: &str) -> String {
    if text.contains(' ') {
        format!("\"{text}\"")
    } else {
        text.to_string()
    }
}

/// Compute completion candidates for the text before the cursor.
///
/// Returns the byte offset where the replacement starts plus the ranked
/// candidates.
pub fn complete_line(
    text: &str,
    commands: &[CommandSpec],
    cache: &CompletionCache,
    cwd: &Path,
) -> (usize, Vec<Candidate>) {
    let words: Vec<&str> = text.split_whitespace().collect();
    let at_word_boundary = text.ends_with(char::is_whitespace) || text.is_empty();

    // First token: command names.
    if words.is_empty() || (words.len() == 1 && !at_word_boundary) {
        let prefix = words.first().copied().unwrap_or("");
        let candidates = commands
            .iter()
            .filter(|spec| spec.name.starts_with(prefix))
            .map(|spec| Candidate {
                insert: spec.name.to_string(),
                display: spec.name.to_string(),
                meta: spec.help.lines().next().map(str::to_string),
            })
            .collect();
        return (text.len() - prefix.len(), candidates);
    }

    let command = words[0];

    // Local filesystem paths for upload_file / ls / cd.
    if LOCAL_PATH_COMMANDS.contains(&command) {
        let after = text[command.len()..].trim_start();
        let (quoted, prefix) = match after.strip_prefix('"').or_else(|| after.strip_prefix('\'')) {
            Some(rest) => (true, rest),
            None if at_word_boundary => (false, ""),
            None => (false, *words.last().unwrap_or(&"")),
        };
        let candidates = local_path_candidates(prefix, quoted, cwd);
        return (text.len() - prefix.len(), candidates);
    }

    // Second token: resource names for the command's category.
    let second_token = (words.len() == 1 && at_word_boundary)
        || (words.len() == 2 && !at_word_boundary);
    if second_token {
        let prefix = if words.len() == 2 { words[1] } else { "" };
        let prefix_lower = prefix.to_lowercase();

        let names: Vec<String> = if command == "home" {
            vec!["X".into(), "Y".into(), "Z".into()]
        } else if let Some(category) = category_for(command) {
            cache.names(category).to_vec()
        } else {
            Vec::new()
        };

        let candidates = names
            .into_iter()
            .filter(|n| n.to_lowercase().starts_with(&prefix_lower))
            .map(|n| Candidate {
                insert: quote_if_needed(&n),
                display: n,
                meta: None,
            })
            .collect();
        return (text.len() - prefix.len(), candidates);
    }

    // Third token and later: the command's parameter vocabulary.
    let current = if at_word_boundary {
        ""
    } else {
        *words.last().unwrap_or(&"")
    };
    let current_upper = current.to_uppercase();
    let candidates = parameter_vocabulary(command)
        .iter()
        .filter(|p| p.starts_with(&current_upper))
        .map(|p| Candidate {
            insert: p.to_string(),
            display: p.to_string(),
            meta: None,
        })
        .collect();
    (text.len() - current.len(), candidates)
}

/// Filesystem entries under the directory implied by `prefix`, matched
/// case-insensitively against the final path segment.
fn local_path_candidates(prefix: &str, already_quoted: bool, cwd: &Path) -> Vec<Candidate> {
    let (dir_part, file_part) = match prefix.rfind('/') {
        Some(pos) => (&prefix[..pos + 1], &prefix[pos + 1..]),
        None => ("", prefix),
    };

    let search_dir = if dir_part.is_empty() {
        cwd.to_path_buf()
    } else if Path::new(dir_part).is_absolute() {
        Path::new(dir_part).to_path_buf()
    } else {
        cwd.join(dir_part)
    };

    let Ok(read_dir) = std::fs::read_dir(&search_dir) else {
        return Vec::new();
    };

    let file_lower = file_part.to_lowercase();
    let mut candidates = Vec::new();
    for entry in read_dir.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') && !file_part.starts_with('.') {
            continue;
        }
        if !name.to_lowercase().starts_with(&file_lower) {
            continue;
        }
        let is_dir = entry.path().is_dir();
        let display = if is_dir { format!("{name}/") } else { name.clone() };

        let completed = format!("{dir_part}{name}{}", if is_dir { "/" } else { "" });
        let insert = if already_quoted {
            completed
        } else {
            quote_if_needed(&completed)
        };
        candidates.push(Candidate {
            insert,
            display,
            meta: None,
        });
    }
    candidates.sort_by(|a, b| a.display.cmp(&b.display));
    candidates
}

// ---------------------------------------------------------------------------
// Rustyline adapter
// ---------------------------------------------------------------------------

pub struct ShellHelper {
    specs: Vec<CommandSpec>,
    cache: Arc<Mutex<CompletionCache>>,
    cursor: SessionCursor,
    provider: Arc<dyn Provider>,
    runtime: tokio::runtime::Handle,
}

impl ShellHelper {
    pub fn new(
        specs: Vec<CommandSpec>,
        cursor: SessionCursor,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            specs,
            cache: Arc::new(Mutex::new(CompletionCache::default())),
            cursor,
            provider,
            runtime: tokio::runtime::Handle::current(),
        }
    }

    /// Lazily populate the cache the first time resource candidates are
    /// needed. Runs the async fetch on the runtime from rustyline's
    /// synchronous callback.
    fn ensure_cache(&self) {
        let needs_refresh = {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            !cache.is_valid()
        };
        if !needs_refresh {
            return;
        }

        let provider = Arc::clone(&self.provider);
        let cache = Arc::clone(&self.cache);
        let handle = self.runtime.clone();
        tokio::task::block_in_place(move || {
            handle.block_on(async move {
                let mut cache = cache.lock().unwrap_or_else(|e| e.into_inner());
                cache.refresh(provider.as_ref()).await;
            });
        });
    }
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let text = &line[..pos];

        // Only resource-name positions need the remote cache; command names,
        // local paths, and parameter keys complete without it.
        let first = text.split_whitespace().next().unwrap_or("");
        let past_command = text.trim_start().len() > first.len();
        if past_command && category_for(first).is_some() {
            self.ensure_cache();
        }

        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let (start, candidates) = complete_line(text, &self.specs, &cache, &self.cursor.get());

        let pairs = candidates
            .into_iter()
            .map(|c| Pair {
                display: match c.meta {
                    Some(meta) => format!("{} - {meta}", c.display),
                    None => c.display,
                },
                replacement: c.insert,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<CommandSpec> {
        vec![
            CommandSpec {
                name: "get_fan",
                help: "Get fan(s): get_fan [name]",
            },
            CommandSpec {
                name: "get_file",
                help: "Get file(s)",
            },
            CommandSpec {
                name: "set_fan",
                help: "Set fan speed: set_fan <name> SPEED=<0.0-1.0>",
            },
            CommandSpec {
                name: "home",
                help: "Home axes",
            },
        ]
    }

    fn cache() -> CompletionCache {
        let mut cache = CompletionCache::default();
        cache.populate(Category::Fans, vec!["BedFans".into(), "exhaust fan".into()]);
        cache.populate(
            Category::GcodeFiles,
            vec!["benchy.gcode".into(), "Bracket.gcode".into()],
        );
        cache
    }

    fn complete(text: &str) -> (usize, Vec<Candidate>) {
        complete_line(text, &specs(), &cache(), Path::new("/tmp"))
    }

    #[test]
    fn first_token_matches_command_prefix_case_sensitively() {
        let (start, candidates) = complete("get_f");
        assert_eq!(start, 0);
        let names: Vec<_> = candidates.iter().map(|c| c.display.as_str()).collect();
        assert_eq!(names, vec!["get_fan", "get_file"]);
        assert_eq!(
            candidates[0].meta.as_deref(),
            Some("Get fan(s): get_fan [name]")
        );

        let (_, candidates) = complete("GET_F");
        assert!(candidates.is_empty());
    }

    #[test]
    fn empty_input_offers_all_commands() {
        let (_, candidates) = complete("");
        assert_eq!(candidates.len(), specs().len());
    }

    #[test]
    fn second_token_uses_command_category_case_insensitively() {
        let (start, candidates) = complete("get_fan bed");
        assert_eq!(start, "get_fan ".len());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].display, "BedFans");
    }

    #[test]
    fn names_with_spaces_are_quoted_in_insert_only() {
        let (_, candidates) = complete("get_fan ex");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].insert, "\"exhaust fan\"");
        assert_eq!(candidates[0].display, "exhaust fan");
    }

    #[test]
    fn home_completes_fixed_axes() {
        let (_, candidates) = complete("home ");
        let names: Vec<_> = candidates.iter().map(|c| c.display.as_str()).collect();
        assert_eq!(names, vec!["X", "Y", "Z"]);

        let (_, candidates) = complete("home x");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].display, "X");
    }

    #[test]
    fn third_token_offers_parameter_vocabulary() {
        let (_, candidates) = complete("set_fan BedFans ");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].insert, "SPEED=");

        let (start, candidates) = complete("set_fan BedFans sp");
        assert_eq!(start, "set_fan BedFans ".len());
        assert_eq!(candidates[0].insert, "SPEED=");
    }

    #[test]
    fn unrelated_command_gets_no_resource_candidates() {
        let (_, candidates) = complete("home BedFans ");
        assert!(candidates.is_empty());
    }

    #[test]
    fn local_paths_complete_for_filesystem_commands() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("prints")).unwrap();
        std::fs::write(dir.path().join("part one.gcode"), b"").unwrap();
        std::fs::write(dir.path().join(".hidden"), b"").unwrap();

        let (_, candidates) = complete_line("cd ", &specs(), &cache(), dir.path());
        let displays: Vec<_> = candidates.iter().map(|c| c.display.as_str()).collect();
        assert!(displays.contains(&"prints/"));
        assert!(displays.contains(&"part one.gcode"));
        assert!(!displays.iter().any(|d| d.starts_with('.')));

        // Spaces quoted in the inserted text, never the display.
        let spaced = candidates
            .iter()
            .find(|c| c.display == "part one.gcode")
            .unwrap();
        assert_eq!(spaced.insert, "\"part one.gcode\"");

        // Dot prefix opts in to hidden entries.
        let (_, candidates) = complete_line("cd .h", &specs(), &cache(), dir.path());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].display, ".hidden");
    }

    #[test]
    fn case_insensitive_prefix_for_path_segments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Benchy.gcode"), b"").unwrap();

        let (_, candidates) = complete_line("ls ben", &specs(), &cache(), dir.path());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].display, "Benchy.gcode");
    }

    #[test]
    fn dedup_preserves_first_seen_order() {
        let names = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(dedup_keep_order(names), vec!["b", "a"]);
    }
}
