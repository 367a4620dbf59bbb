use std::path::PathBuf;

/// Central error type for wavnav.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("config error: {0}")]
    Config(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("directory unreadable: {path}: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watcher error: {0}")]
    Watcher(String),
}

pub type Result<T> = std::result::Result<T, PlayerError>;

/// Failure of a single `stream()` call. Never fatal: the arbiter treats
/// every variant like a completed stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("bad WAV header: {path}: {reason}")]
    BadHeader { path: PathBuf, reason: String },

    #[error("unsupported format: {path}: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("audio output configuration failed: {0}")]
    DeviceConfig(#[source] DeviceError),

    #[error("read error: {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors reported by an audio output device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The device did not accept the buffer within its write timeout.
    #[error("write timed out")]
    Timeout,

    #[error("device rejected request: {0}")]
    Rejected(String),

    #[error("device IO error: {0}")]
    Io(#[from] std::io::Error),
}
