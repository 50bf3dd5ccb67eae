use thiserror::Error;

/// Failure reported by a content source.
///
/// The engine never propagates these to the render surface; they are logged
/// and recovered from with defaults or last-good data.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing store could not be reached.
    #[error("content store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with data that does not parse.
    #[error("malformed content: {0}")]
    Malformed(#[from] serde_yaml::Error),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;
