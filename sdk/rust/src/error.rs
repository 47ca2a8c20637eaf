use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to read run file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("host returned status {status}: {body}")]
    Status { status: u16, body: String },
}
