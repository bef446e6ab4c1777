//! Error types for voltaic-solver.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("newton iteration failed to converge after {0} iterations")]
    NonConvergence(usize),

    #[error(
        "newton iteration failed to converge after {0} iterations; \
         check that current sources have a conductive path to ground"
    )]
    NonConvergenceCurrentPath(usize),

    #[error("ac analysis refers to unknown source: {0}")]
    UnknownSource(String),

    #[error(transparent)]
    Core(#[from] voltaic_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
