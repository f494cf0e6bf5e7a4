use thiserror::Error;

/// Errors surfaced by the browser core and its listing sources.
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("root {root:?} is not a prefix of key {key:?}")]
    RootNotPrefix { key: String, root: String },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, BrowserError>;
