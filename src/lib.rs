// Moonshell - interactive console for Klipper printers over Moonraker
// Library exports

pub mod complete;
pub mod config;
pub mod error;
pub mod handlers;
pub mod listing;
pub mod models;
pub mod moonraker;
pub mod parser;
pub mod provider;
pub mod registry;
pub mod render;
pub mod shell;
pub mod viewer;
