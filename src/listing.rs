// Shared listing policy for list-style commands
//
// `ls`, `get_file`, and `list_dir` all accept the same flag vocabulary and
// sort/filter their entries the same way:
//
//   -n  sort by name (default), ascending case-insensitive
//   -t  sort by modification time, newest first
//   -S  sort by size, largest first
//   -r  invert whichever direction the active key defaults to
//   -a  include dot-prefixed entries (ls only)
//
// Glob patterns filter before sorting; an entry matching any one of several
// patterns is kept.

use glob::Pattern;

use crate::error::ConsoleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Time,
    Size,
}

/// Anything the shared sort/filter policy can operate on.
pub trait ListEntry {
    fn entry_name(&self) -> &str;
    fn entry_modified(&self) -> f64;
    fn entry_size(&self) -> u64;
}

impl ListEntry for crate::models::GcodeFile {
    fn entry_name(&self) -> &str {
        &self.filename
    }
    fn entry_modified(&self) -> f64 {
        self.modified
    }
    fn entry_size(&self) -> u64 {
        self.size
    }
}

impl ListEntry for crate::models::RemoteDirectory {
    fn entry_name(&self) -> &str {
        &self.dirname
    }
    fn entry_modified(&self) -> f64 {
        self.modified
    }
    fn entry_size(&self) -> u64 {
        self.size
    }
}

/// Flags, glob patterns, and free-form arguments split out of a command's
/// positional argument list.
#[derive(Debug, Default)]
pub struct ListingArgs {
    pub key: SortKey,
    pub reverse: bool,
    pub show_hidden: bool,
    pub patterns: Vec<Pattern>,
    /// Non-flag, non-pattern tokens (a path or an exact filename).
    pub free: Vec<String>,
}

impl Default for SortKey {
    fn default() -> Self {
        SortKey::Name
    }
}

impl ListingArgs {
    /// Split positional arguments into flags, glob patterns, and free
    /// tokens. Combined short flags (`-tr`) are accepted. Unknown flags are
    /// a validation error.
    pub fn parse(args: &[String]) -> Result<Self, ConsoleError> {
        let mut out = ListingArgs::default();

        for arg in args {
            if let Some(flags) = arg.strip_prefix('-') {
                for flag in flags.chars() {
                    match flag {
                        't' => out.key = SortKey::Time,
                        'S' => out.key = SortKey::Size,
                        'n' => out.key = SortKey::Name,
                        'r' => out.reverse = true,
                        'a' => out.show_hidden = true,
                        other => {
                            return Err(ConsoleError::validation(format!(
                                "Unknown flag: -{other}"
                            )))
                        }
                    }
                }
            } else if is_glob(arg) {
                let pattern = Pattern::new(arg).map_err(|e| {
                    ConsoleError::validation(format!("Bad pattern '{arg}': {e}"))
                })?;
                out.patterns.push(pattern);
            } else {
                out.free.push(arg.clone());
            }
        }

        Ok(out)
    }
}

/// True when the token contains glob metacharacters.
pub fn is_glob(token: &str) -> bool {
    token.contains('*') || token.contains('?') || token.contains('[')
}

/// Drop entries matching none of the patterns. No patterns keeps everything.
pub fn filter_entries<T: ListEntry>(entries: Vec<T>, patterns: &[Pattern]) -> Vec<T> {
    if patterns.is_empty() {
        return entries;
    }
    entries
        .into_iter()
        .filter(|e| patterns.iter().any(|p| p.matches(e.entry_name())))
        .collect()
}

/// Sort in place per the shared policy. Name defaults ascending; time and
/// size default descending; `reverse` flips the active key's default.
pub fn sort_entries<T: ListEntry>(entries: &mut [T], key: SortKey, reverse: bool) {
    match key {
        SortKey::Name => {
            entries.sort_by(|a, b| {
                a.entry_name()
                    .to_lowercase()
                    .cmp(&b.entry_name().to_lowercase())
            });
            if reverse {
                entries.reverse();
            }
        }
        SortKey::Time => {
            entries.sort_by(|a, b| b.entry_modified().total_cmp(&a.entry_modified()));
            if reverse {
                entries.reverse();
            }
        }
        SortKey::Size => {
            entries.sort_by(|a, b| b.entry_size().cmp(&a.entry_size()));
            if reverse {
                entries.reverse();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GcodeFile;

    fn files() -> Vec<GcodeFile> {
        vec![
            GcodeFile::basic("bravo.gcode", 300, 20.0),
            GcodeFile::basic("Alpha.gcode", 100, 30.0),
            GcodeFile::basic("charlie.gcode", 200, 10.0),
        ]
    }

    fn names(files: &[GcodeFile]) -> Vec<&str> {
        files.iter().map(|f| f.filename.as_str()).collect()
    }

    #[test]
    fn name_sort_is_case_insensitive_ascending() {
        let mut f = files();
        sort_entries(&mut f, SortKey::Name, false);
        assert_eq!(names(&f), vec!["Alpha.gcode", "bravo.gcode", "charlie.gcode"]);
    }

    #[test]
    fn time_sort_defaults_newest_first() {
        let mut f = files();
        sort_entries(&mut f, SortKey::Time, false);
        assert_eq!(names(&f), vec!["Alpha.gcode", "bravo.gcode", "charlie.gcode"]);
    }

    #[test]
    fn size_sort_defaults_largest_first() {
        let mut f = files();
        sort_entries(&mut f, SortKey::Size, false);
        assert_eq!(names(&f), vec!["bravo.gcode", "charlie.gcode", "Alpha.gcode"]);
    }

    #[test]
    fn reverse_inverts_each_keys_default() {
        let mut f = files();
        sort_entries(&mut f, SortKey::Time, true);
        // -t alone is newest-first, so -t -r is oldest-first.
        assert_eq!(names(&f), vec!["charlie.gcode", "bravo.gcode", "Alpha.gcode"]);

        let mut f = files();
        sort_entries(&mut f, SortKey::Name, true);
        assert_eq!(names(&f), vec!["charlie.gcode", "bravo.gcode", "Alpha.gcode"]);
    }

    #[test]
    fn sorting_is_idempotent() {
        let mut once = files();
        sort_entries(&mut once, SortKey::Size, false);
        let mut twice = once.clone();
        sort_entries(&mut twice, SortKey::Size, false);
        assert_eq!(once, twice);
    }

    #[test]
    fn reverse_twice_restores_default_order() {
        let mut base = files();
        sort_entries(&mut base, SortKey::Time, false);

        let mut flipped = files();
        sort_entries(&mut flipped, SortKey::Time, true);
        flipped.reverse();
        assert_eq!(base, flipped);
    }

    #[test]
    fn multiple_patterns_filter_with_or_semantics() {
        let patterns = vec![
            Pattern::new("Alpha*").unwrap(),
            Pattern::new("charlie*").unwrap(),
        ];
        let kept = filter_entries(files(), &patterns);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|f| f.filename != "bravo.gcode"));
    }

    #[test]
    fn combined_short_flags_are_split() {
        let args = vec!["-tr".to_string()];
        let parsed = ListingArgs::parse(&args).unwrap();
        assert_eq!(parsed.key, SortKey::Time);
        assert!(parsed.reverse);
    }

    #[test]
    fn unknown_flag_is_a_validation_error() {
        let args = vec!["-z".to_string()];
        assert!(matches!(
            ListingArgs::parse(&args),
            Err(ConsoleError::Validation(_))
        ));
    }

    #[test]
    fn patterns_and_free_tokens_are_separated() {
        let args = vec!["*.gcode".to_string(), "subdir".to_string()];
        let parsed = ListingArgs::parse(&args).unwrap();
        assert_eq!(parsed.patterns.len(), 1);
        assert_eq!(parsed.free, vec!["subdir"]);
    }
}
