//! Error types shared by the response writer, the sinks and the config loader.

use thiserror::Error;

/// Result alias used across the response API.
pub type Result<T> = std::result::Result<T, ResponseError>;

/// Errors raised while driving a [`Response`](crate::http::response::Response).
///
/// `AlreadyStarted` and `SinkAlreadyAttached` are contract violations: they are
/// returned to the offending caller and never retried.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("start must only be called once on a response")]
    AlreadyStarted,

    #[error("a sink is already attached to this response")]
    SinkAlreadyAttached,

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The completion callback was dropped without ever firing, e.g. because the
    /// response was discarded before the sink attached.
    #[error("write was abandoned before completion")]
    Abandoned,

    #[error("handler error: {0}")]
    Handler(String),
}

/// Errors raised while loading a [`ResponseConfig`](crate::config::ResponseConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl From<ResponseError> for std::io::Error {
    fn from(err: ResponseError) -> Self {
        match err {
            ResponseError::Transport(inner) => inner,
            other => std::io::Error::other(other),
        }
    }
}
