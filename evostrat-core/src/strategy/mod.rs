//! The ask/tell contract shared by every strategy.
//!
//! A strategy is a stateless description of a search (dimensionality,
//! population size, update rule).  Everything that changes between
//! generations lives in its `State`, which is threaded through the calls by
//! value: `ask` and `tell` read the state they are given and return a new one.
//!
//! ```text
//! initialize -> (ask -> evaluate -> tell)*
//! ```
//!
//! Fitness is always minimized.
use crate::error::{EvoError, Result};
use crate::population::Population;
use crate::random::RandomStream;

/// Defines a population based search following the ask/tell protocol.
pub trait Strategy: Send + Sync {
    /// Per-generation record threaded through `ask` and `tell`
    type State: Clone + Send + Sync;

    /// Immutable hyperparameters
    type Params: Clone + Send + Sync;

    /// Name of the strategy
    fn name(&self) -> &'static str;

    /// Dimensionality of each candidate
    fn num_dims(&self) -> usize;

    /// Number of candidates produced per `ask`
    fn popsize(&self) -> usize;

    /// Returns the default hyperparameters for this strategy
    fn default_params(&self) -> Self::Params;

    /// Creates the initial state.  Must be called before `ask`.
    fn initialize(&self, rng: RandomStream, params: &Self::Params) -> Result<Self::State>;

    /// Proposes a new batch of candidates.  The returned state must be handed
    /// to the matching `tell`.
    fn ask(
        &self,
        rng: RandomStream,
        state: &Self::State,
        params: &Self::Params,
    ) -> Result<(Population, Self::State)>;

    /// Updates the state given the fitness of each candidate, in row order.
    fn tell(
        &self,
        x: &Population,
        fitness: &[f32],
        state: &Self::State,
        params: &Self::Params,
    ) -> Result<Self::State>;
}

/// Checks a batch handed to `tell` against the strategy's configuration
pub fn check_batch<S: Strategy + ?Sized>(strategy: &S, x: &Population, fitness: &[f32]) -> Result<()> {
    x.check_shape(strategy.popsize(), strategy.num_dims())?;
    if fitness.len() != strategy.popsize() {
        return Err(EvoError::BatchMismatch {
            what: "fitness",
            expected: strategy.popsize(),
            got: fitness.len(),
        });
    }
    Ok(())
}

/// Search space initialization bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitBounds {
    /// Lower bound of the uniform initialization
    pub init_min: f32,
    /// Upper bound of the uniform initialization
    pub init_max: f32,
}

impl Default for InitBounds {
    fn default() -> Self {
        InitBounds {
            init_min: -2.0,
            init_max: 2.0,
        }
    }
}

impl InitBounds {
    /// Draws `n` values uniformly within the bounds
    pub fn sample(&self, rng: RandomStream, n: usize) -> Vec<f32> {
        rng.uniform(n, self.init_min, self.init_max)
    }
}
