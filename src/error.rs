use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] io::Error),

    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("graceful shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),
}
