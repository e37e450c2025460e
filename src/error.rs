use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop a single image from being tagged.
#[derive(Debug, Error)]
pub enum TagError {
    #[error("cannot read {}: {reason}", path.display())]
    UnreadableImage { path: PathBuf, reason: String },

    #[error("malformed GPS data: {0}")]
    InvalidCoordinateData(String),

    #[error("composition failed: {0}")]
    CompositionFailed(String),
}

impl TagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TagError::UnreadableImage { .. } => ErrorKind::UnreadableImage,
            TagError::InvalidCoordinateData(_) => ErrorKind::InvalidCoordinateData,
            TagError::CompositionFailed(_) => ErrorKind::CompositionFailed,
        }
    }

    pub fn unreadable(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        TagError::UnreadableImage {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Error category reported to callers in a failed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnreadableImage,
    InvalidCoordinateData,
    CompositionFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UnreadableImage => "UnreadableImage",
            ErrorKind::InvalidCoordinateData => "InvalidCoordinateData",
            ErrorKind::CompositionFailed => "CompositionFailed",
        };
        f.write_str(name)
    }
}

/// Lookup failures. These are absorbed by the geocoder and never reach the
/// caller of the tagging pipeline.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("service returned HTTP {0}")]
    Service(u16),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GeocodeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GeocodeError::Timeout
        } else if let Some(status) = err.status() {
            GeocodeError::Service(status.as_u16())
        } else if err.is_decode() {
            GeocodeError::Decode(err.to_string())
        } else {
            GeocodeError::Network(err.to_string())
        }
    }
}
