use crate::keys::KeySourceError;
use crate::pool::WorkerFailure;
use crate::transport::TransportError;
use parkbench_core::{ConfigError, Summary};
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    KeySource(#[from] KeySourceError),

    #[error("Unable to set up transport: {0}")]
    Transport(#[from] TransportError),

    /// A worker failed fatally. `partial` is the run as it stood when the failure was observed.
    #[error("Run aborted: {failure}")]
    Aborted {
        #[source]
        failure: WorkerFailure,
        partial: Box<Summary>,
    },

    #[error("Worker task panicked: {0}")]
    Panicked(#[source] JoinError),
}

impl RunError {
    /// Statistics gathered before a fatal abort.
    pub fn partial_summary(&self) -> Option<&Summary> {
        match self {
            RunError::Aborted { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
