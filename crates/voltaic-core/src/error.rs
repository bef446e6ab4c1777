//! Error types for voltaic-core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("matrix dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("voltage source loop or branch shorted by a wire")]
    ShortCircuit,
}

pub type Result<T> = std::result::Result<T, Error>;
