use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlayerError>;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("template error: {0}")]
    Template(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("media toolkit unavailable: {0}")]
    ToolkitUnavailable(String),

    #[error("backend not initialized")]
    BackendNotInitialized,

    #[error("empty playlist")]
    EmptyPlaylist,

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("health probe failed: {0}")]
    Health(String),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
