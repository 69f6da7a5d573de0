// Session configuration
//
// All knobs are accepted once at process start (CLI flags, with an
// environment fallback for the API key) and are immutable for the life of
// the session.

use std::time::Duration;

pub const DEFAULT_URL: &str = "http://localhost:7125";
pub const DEFAULT_TIMEOUT_SECS: f64 = 120.0;

#[derive(Debug, Clone)]
pub struct Config {
    /// Moonraker base URL, e.g. "http://localhost:7125".
    pub url: String,

    /// Optional API key sent as the X-Api-Key header.
    pub api_key: Option<String>,

    /// Per-request timeout for HTTP calls.
    pub timeout: Duration,

    /// Render a periodically refreshed status panel beside the console log.
    pub split_screen: bool,
}

impl Config {
    pub fn new(
        url: String,
        api_key: Option<String>,
        timeout_secs: f64,
        split_screen: bool,
    ) -> Self {
        let api_key = api_key.or_else(|| std::env::var("MOONRAKER_API_KEY").ok());

        Self {
            url: url.trim_end_matches('/').to_string(),
            api_key,
            timeout: Duration::from_secs_f64(timeout_secs),
            split_screen,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_URL.to_string(), None, DEFAULT_TIMEOUT_SECS, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped_from_url() {
        let config = Config::new("http://printer:7125/".into(), None, 120.0, false);
        assert_eq!(config.url, "http://printer:7125");
    }

    #[test]
    fn explicit_api_key_wins() {
        let config = Config::new(DEFAULT_URL.into(), Some("abc".into()), 120.0, false);
        assert_eq!(config.api_key.as_deref(), Some("abc"));
    }
}
