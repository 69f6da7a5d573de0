// Moonraker API transport
//
// HTTP client for the REST surface plus a WebSocket reader for push
// notifications. Wire-format knowledge stays inside this module; everything
// above it works with domain records.

mod client;
mod ws;

pub use client::MoonrakerClient;
pub use ws::open_console_stream;
