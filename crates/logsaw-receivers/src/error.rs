//! Error types for logsaw-receivers

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A line that is not a JSON object describing an event
    #[error("malformed event: {0}")]
    Decode(String),

    #[error("event could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("line longer than {0} bytes")]
    LineTooLong(usize),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The loader thread ended without reporting a result
    #[error("load of {} was aborted", .0.display())]
    LoadAborted(PathBuf),
}

impl From<LinesCodecError> for ReceiverError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => Self::LineTooLong(crate::codec::MAX_LINE_LENGTH),
            LinesCodecError::Io(e) => Self::Io(e),
        }
    }
}
