// Command line parsing
//
// Turns a raw input line into a command name, positional arguments, and
// KEY=value parameters. No validation happens here; the registry decides
// whether the command exists and whether the arguments make sense.

/// A parsed input line. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
    /// KEY=value parameters in the order typed. Re-typing a key replaces
    /// its earlier value.
    pub params: Vec<(String, String)>,
}

impl ParsedCommand {
    /// Look up a named parameter by exact key.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a command line into a [`ParsedCommand`].
///
/// Returns `None` for empty or whitespace-only input so the caller can skip
/// the line rather than report an error.
///
/// Quoting follows shell conventions: single or double quotes group a token,
/// permitting embedded spaces. An unterminated quote falls back to naive
/// whitespace splitting so a stray quote never blocks the operator.
pub fn parse_line(line: &str) -> Option<ParsedCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let tokens = tokenize(line)
        .unwrap_or_else(|| line.split_whitespace().map(str::to_string).collect());

    let mut iter = tokens.into_iter();
    let name = iter.next()?;

    let mut args = Vec::new();
    let mut params: Vec<(String, String)> = Vec::new();

    for token in iter {
        match token.split_once('=') {
            Some((key, value)) => {
                let key = key.to_string();
                let value = value.to_string();
                if let Some(entry) = params.iter_mut().find(|(k, _)| *k == key) {
                    entry.1 = value;
                } else {
                    params.push((key, value));
                }
            }
            None => args.push(token),
        }
    }

    Some(ParsedCommand { name, args, params })
}

/// Quote-aware tokenizer. Returns `None` when a quote is left open.
fn tokenize(line: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                in_token = true;
                let quote = c;
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => current.push(ch),
                        None => return None,
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }

    Some(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace_lines_yield_none() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
        assert!(parse_line("\t \n").is_none());
    }

    #[test]
    fn bare_command_has_no_args() {
        let cmd = parse_line("get_sensor").unwrap();
        assert_eq!(cmd.name, "get_sensor");
        assert!(cmd.args.is_empty());
        assert!(cmd.params.is_empty());
    }

    #[test]
    fn positional_and_named_arguments_are_separated() {
        let cmd = parse_line("set_fan BedFans SPEED=0.5").unwrap();
        assert_eq!(cmd.name, "set_fan");
        assert_eq!(cmd.args, vec!["BedFans"]);
        assert_eq!(cmd.param("SPEED"), Some("0.5"));
    }

    #[test]
    fn params_split_on_first_equals_only() {
        let cmd = parse_line("run MACRO A=B=C").unwrap();
        assert_eq!(cmd.param("A"), Some("B=C"));
    }

    #[test]
    fn empty_param_value_is_preserved() {
        let cmd = parse_line("run MACRO KEY=").unwrap();
        assert_eq!(cmd.param("KEY"), Some(""));
    }

    #[test]
    fn quoted_tokens_keep_embedded_spaces() {
        let cmd = parse_line("get_file \"my part.gcode\"").unwrap();
        assert_eq!(cmd.args, vec!["my part.gcode"]);

        let cmd = parse_line("cd 'some dir'").unwrap();
        assert_eq!(cmd.args, vec!["some dir"]);
    }

    #[test]
    fn unterminated_quote_falls_back_to_whitespace_split() {
        let cmd = parse_line("get_file \"broken name").unwrap();
        assert_eq!(cmd.args, vec!["\"broken", "name"]);
    }

    #[test]
    fn retyped_key_replaces_earlier_value() {
        let cmd = parse_line("run M SPEED=1 SPEED=2").unwrap();
        assert_eq!(cmd.param("SPEED"), Some("2"));
        assert_eq!(cmd.params.len(), 1);
    }
}
