// Error taxonomy for console commands
//
// Every failure a command can surface falls into one of four buckets so the
// renderer and the session loop can treat them uniformly: dispatch (unknown
// command), validation (bad arguments), backend (Moonraker-side), and
// filesystem (local path problems). None of these terminate the session.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The leading token did not match any registered command.
    #[error("Unknown command: {0}")]
    Dispatch(String),

    /// Arguments were present but malformed (missing parameter, value out
    /// of range, unrecognized flag).
    #[error("{0}")]
    Validation(String),

    /// Moonraker rejected the request or the request never completed.
    #[error("{0}")]
    Backend(String),

    /// A local path did not exist, was not a directory, or was unreadable.
    #[error("{0}")]
    Filesystem(String),
}

impl ConsoleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ConsoleError::Validation(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        ConsoleError::Backend(msg.into())
    }

    pub fn filesystem(msg: impl Into<String>) -> Self {
        ConsoleError::Filesystem(msg.into())
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(err: reqwest::Error) -> Self {
        ConsoleError::Backend(err.to_string())
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(err: std::io::Error) -> Self {
        ConsoleError::Filesystem(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
