use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid crawl request: {0}")]
    InvalidRequest(String),

    #[error("Server responded with status {0}")]
    Status(u16),

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, StreamError>;
