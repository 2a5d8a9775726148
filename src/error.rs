use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read or write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("model download failed: {0}")]
    Hub(#[from] hf_hub::api::sync::ApiError),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("invalid {field}: {value}")]
    Offset { field: &'static str, value: String },

    #[error("malformed line {line} in {}: {reason}", .path.display())]
    Table {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
