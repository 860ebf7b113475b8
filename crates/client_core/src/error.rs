use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    Url(#[from] url::ParseError),
    #[error("unsupported url scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("push channel failed: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("unexpected status code '{0}'")]
    UnknownStatus(String),
}
