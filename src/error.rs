use std::path::{Path, PathBuf};

use crate::decode::DecodeError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure taxonomy for bag processing.
///
/// Per-message decode failures (`MalformedPayload`, `UnsupportedType`) are
/// logged and skipped by the extraction loop; they never abort a stream.
/// Everything else terminates the current operation, except that batch
/// (folder) processing catches per-bag errors and continues with the next
/// file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} does not exist")]
    NotFound(PathBuf),

    #[error("{0} is not a rosbag")]
    NotABag(PathBuf),

    #[error("failed to parse bag {path}: {source}")]
    CorruptContainer {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to decode message on {topic} at t={time_ns}: {source}")]
    MalformedPayload {
        topic: String,
        time_ns: u64,
        #[source]
        source: DecodeError,
    },

    #[error("invalid timestamp type '{0}', valid values are [rosbag_ns, offset_s]")]
    InvalidTimestampMode(String),

    #[error("no messages matched the requested topics and time range")]
    EmptyResult,

    #[error("{0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl Error {
    pub(crate) fn corrupt(
        path: &Path,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::CorruptContainer {
            path: path.to_path_buf(),
            source: Box::new(source),
        }
    }
}
