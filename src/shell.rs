// Interactive session loop
//
// Owns the rustyline editor and drives parse -> dispatch -> render until the
// exit sentinel or end of input. Command failures are printed and the loop
// continues; only readline-level errors end the session.

use anyhow::Context;
use crossterm::style::Stylize;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config as LineConfig, Editor};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::complete::ShellHelper;
use crate::parser::parse_line;
use crate::provider::Provider;
use crate::registry::{CommandOutput, CommandRegistry};
use crate::render::{print_error, render};

const HISTORY_FILE: &str = ".moonshell_history";

fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(HISTORY_FILE))
}

/// Run the shell to completion. Returns when the user exits.
pub async fn run(provider: Arc<dyn Provider>, split_screen: bool) -> anyhow::Result<()> {
    let registry = CommandRegistry::new(Arc::clone(&provider), split_screen);
    let helper = ShellHelper::new(registry.command_specs(), registry.cursor(), provider);

    let line_config = LineConfig::builder()
        .completion_type(rustyline::CompletionType::List)
        .build();
    let mut editor: Editor<ShellHelper, DefaultHistory> =
        Editor::with_config(line_config).context("failed to initialize line editor")?;
    editor.set_helper(Some(helper));

    let history = history_path();
    if let Some(path) = &history {
        if let Err(e) = editor.load_history(path) {
            debug!("no readline history loaded: {e}");
        }
    }

    println!("{}", "Type 'help' for commands, 'exit' to quit.".dark_grey());
    // Plain prompt: rustyline miscounts the cursor column with ANSI codes.
    let prompt = "moonshell> ";

    loop {
        // readline blocks its thread; background tasks keep running on the
        // other runtime workers.
        let readline = tokio::task::block_in_place(|| editor.readline(prompt));
        match readline {
            Ok(line) => {
                let Some(parsed) = parse_line(&line) else {
                    continue;
                };
                let _ = editor.add_history_entry(line.as_str());
                match registry.execute(&parsed).await {
                    Ok(CommandOutput::Exit) => break,
                    Ok(output) => render(&output),
                    Err(e) => print_error(&e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C cancels the current line only.
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("readline failed"),
        }
    }

    if let Some(path) = &history {
        if let Err(e) = editor.save_history(path) {
            debug!("failed to save readline history: {e}");
        }
    }
    Ok(())
}
