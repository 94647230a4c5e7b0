use std::path::PathBuf;

use crate::config::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),
    /// The transport could not be opened. No session was started.
    #[error("failed to open {address}: {source}")]
    TransportOpen {
        address: String,
        #[source]
        source: serialport::Error,
    },
    #[error("failed to create output {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start acquisition worker: {0}")]
    Worker(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
