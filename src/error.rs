use thiserror::Error;

/// Failures surfaced to the user from the worker or the thumbnail fetch.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse video metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("{0}")]
    Extractor(String),

    #[error("thumbnail request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("thumbnail decode failed: {0}")]
    Image(#[from] image::ImageError),
}
