// Moonshell - interactive console for Klipper printers over Moonraker
// Main entry point

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use moonshell::config::{Config, DEFAULT_TIMEOUT_SECS, DEFAULT_URL};
use moonshell::handlers::Handlers;
use moonshell::moonraker::MoonrakerClient;
use moonshell::shell;

#[derive(Parser, Debug)]
#[command(name = "moonshell", version, about = "Interactive console for Klipper printers over the Moonraker API")]
struct Cli {
    /// Moonraker base URL
    #[arg(long, default_value = DEFAULT_URL)]
    url: String,

    /// Moonraker API key (falls back to MOONRAKER_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: f64,

    /// Show a live status panel in console mode
    #[arg(long)]
    split_screen: bool,

    /// Verbose logging (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("moonshell=debug"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::new(cli.url, cli.api_key, cli.timeout, cli.split_screen);
    let split_screen = config.split_screen;

    let client = Arc::new(MoonrakerClient::new(&config)?);
    if let Err(e) = client.connect().await {
        eprintln!("Failed to connect to Moonraker at {}: {e:#}", config.url);
        std::process::exit(1);
    }
    println!("Connected to Moonraker at {}", config.url);

    let provider = Arc::new(Handlers::new(client));
    shell::run(provider, split_screen).await
}
