//! Error types shared by history loading, analysis, and generation.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort a simulation run.
///
/// Cancellation is not an error: a stop request ends the generation
/// loop with [`StopReason::Cancelled`](crate::generator::StopReason) instead.
#[derive(Debug, Error)]
pub enum SimError {
    /// History file missing, empty, unparseable, or without channels.
    #[error("invalid history: {0}")]
    InvalidHistory(String),

    /// Generation method accepted by configuration but not implemented.
    #[error("generation method '{0}' is not supported yet (only 'trend_seasonal' is implemented)")]
    UnsupportedMethod(String),

    /// Failure while deriving statistics or producing a value.
    #[error("computation failed: {0}")]
    Computation(String),

    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The interrupt handler that feeds the stop signal could not be installed.
    #[error("failed to install stop handler: {0}")]
    SignalHandler(String),

    /// I/O failure against a history or output file.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SimError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used throughout the crate.
pub type SimResult<T> = Result<T, SimError>;
