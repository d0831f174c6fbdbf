use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("manifest body is empty")]
    Empty,

    #[error("manifest is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("malformed manifest: {0}")]
    Manifest(#[from] dash_mpd::DashMpdError),
}
