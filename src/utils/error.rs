use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("invalid config file: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("architecture error: {0}")]
    Architecture(String),

    #[error("invalid data: {0}")]
    Data(String),

    #[error("empty dataset: {0}")]
    EmptyDataset(String),
}

pub type Result<T> = std::result::Result<T, Error>;
