//! Error types shared by every strategy.
//!
//! All errors here are programmer errors: a strategy built with an invalid
//! configuration, or a batch handed to `tell` that does not match the shape the
//! strategy was built for.  Nothing in the core retries.

use thiserror::Error;

/// Errors raised by strategies, optimizers and checkpoints.
#[derive(Debug, Error)]
pub enum EvoError {
    /// Population size is odd for a strategy which uses mirrored sampling.
    #[error("population size ({popsize}) must be even for antithetic sampling")]
    OddPopulation {
        /// The offending population size
        popsize: usize,
    },

    /// A size which must be positive was zero.
    #[error("{what} must be > 0")]
    EmptyDimension {
        /// Name of the size
        what: &'static str,
    },

    /// Elite ratio outside of (0, 1].
    #[error("invalid elite ratio: {ratio} (must be in (0, 1])")]
    InvalidEliteRatio {
        /// The offending ratio
        ratio: f32,
    },

    /// Optimizer name is not one of sgd, adam, rmsprop or clipup.
    #[error("unknown optimizer: {name}")]
    UnknownOptimizer {
        /// Name which failed to parse
        name: String,
    },

    /// Strategy name is not registered.
    #[error("unknown strategy: {name}")]
    UnknownStrategy {
        /// Name which failed to parse
        name: String,
    },

    /// A state or params record was handed to a strategy of another kind.
    #[error("{what} belongs to {found}, strategy is {expected}")]
    StrategyMismatch {
        /// Which record mismatched
        what: &'static str,
        /// Kind of the strategy
        expected: &'static str,
        /// Kind of the record
        found: &'static str,
    },

    /// The number of rows in a batch differs from the configured popsize.
    #[error("batch size mismatch for {what}: expected {expected}, got {got}")]
    BatchMismatch {
        /// Which input mismatched
        what: &'static str,
        /// Configured population size
        expected: usize,
        /// Size provided
        got: usize,
    },

    /// The dimensionality of a vector differs from the configured num_dims.
    #[error("dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Which input mismatched
        what: &'static str,
        /// Configured number of dimensions
        expected: usize,
        /// Dimensions provided
        got: usize,
    },

    /// Another worker of a collective failed before contributing its update.
    #[error("worker {rank} failed during the reduction")]
    WorkerFailed {
        /// Rank of the first failed worker
        rank: usize,
    },

    /// Reading or writing a checkpoint failed.
    #[error("checkpoint serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized `Result` type for strategy operations.
pub type Result<T> = std::result::Result<T, EvoError>;

impl EvoError {
    /// Returns `true` if the error was caused by an invalid configuration.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            EvoError::OddPopulation { .. }
            | EvoError::EmptyDimension { .. }
            | EvoError::InvalidEliteRatio { .. }
            | EvoError::UnknownOptimizer { .. }
            | EvoError::UnknownStrategy { .. }
            | EvoError::StrategyMismatch { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the error was caused by a batch of the wrong shape.
    pub fn is_shape_error(&self) -> bool {
        match self {
            EvoError::BatchMismatch { .. } | EvoError::DimensionMismatch { .. } => true,
            _ => false,
        }
    }
}

/// Fails unless `popsize` is positive and even.
pub(crate) fn check_antithetic(popsize: usize) -> Result<()> {
    check_sizes(1, popsize)?;
    if popsize % 2 != 0 {
        return Err(EvoError::OddPopulation { popsize: popsize });
    }
    Ok(())
}

/// Fails unless both sizes are positive.
pub(crate) fn check_sizes(num_dims: usize, popsize: usize) -> Result<()> {
    if num_dims == 0 {
        return Err(EvoError::EmptyDimension { what: "num_dims" });
    }
    if popsize == 0 {
        return Err(EvoError::EmptyDimension { what: "popsize" });
    }
    Ok(())
}

/// Fails unless a vector has the expected length.
pub(crate) fn check_dims(what: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(EvoError::DimensionMismatch {
            what: what,
            expected: expected,
            got: got,
        });
    }
    Ok(())
}
