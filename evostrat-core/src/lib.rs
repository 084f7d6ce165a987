//! Evostrat-Core
//! ===
//!
//! This library contains a family of population based black-box optimizers,
//! all exposed through the same ask/tell protocol: a strategy proposes a batch
//! of candidates, the caller evaluates them however it likes, and the strategy
//! is told the resulting fitness.  Fitness is always minimized.
//!
//! Every call takes the current state by reference and returns a new one, and
//! every source of randomness is an explicit `RandomStream`, so a run is fully
//! reproducible from its seed.
//!
//! Open NES
//! ---
//! Isotropic Gaussian search with mirrored sampling, where the search gradient
//! drives an Adam step of the mean ala Salimans et al.
//!
//! PEPG
//! ---
//! Parameter-exploring Policy Gradients.  Mirrored pairs are ranked, only the
//! elite pairs drive the mean, and the per-dimension sigma follows its own
//! clipped gradient.  The mean can be driven by any of the gradient optimizers.
//!
//! Persistent ES
//! ---
//! Truncated unrolls of a long inner problem, where perturbations are
//! accumulated across the segments of an unroll to remove truncation bias.
//!
//! Particle Swarm
//! ---
//! A swarm pulled toward the best positions found by each particle and by the
//! swarm as a whole.
//!
//! SNES
//! ---
//! Separable Natural Evolution Strategies with rank based weights.  Its update
//! can be averaged across workers before being applied, see `distributed`.
//!
//! Beyond the strategies, `registry` builds them from names or JSON files and
//! `driver` runs the whole loop against an objective.

#![warn(missing_docs, unused)]

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;

/// Defines the error type shared across the crate
pub mod error;

/// Defines splittable random streams
pub mod random;

/// Defines the batch of candidates exchanged by ask and tell
pub mod population;

/// Defines the ask/tell interface
pub mod strategy;

/// Defines the first-order step rules (sgd, adam, rmsprop, clipup)
pub mod gradient;

/// Defines rank based recombination weights
pub mod weights;

/// Defines fitness shaping
pub mod shaping;

/// Defines the OpenAI-style NES strategy
pub mod nes;

/// Defines the PEPG strategy
pub mod pepg;

/// Defines the Persistent ES strategy
pub mod persistent;

/// Defines the Particle Swarm strategy
pub mod pso;

/// Defines the SNES strategy
pub mod snes;

/// Defines cross-worker reduction of strategy updates
pub mod distributed;

/// Defines runtime selection of strategies
pub mod registry;

/// Defines the optimization loop
pub mod driver;

/// Defines JSON checkpoints
pub mod checkpoint;

pub use crate::checkpoint::Checkpoint;
pub use crate::driver::{Driver, Objective, Outcome};
pub use crate::error::{EvoError, Result};
pub use crate::population::Population;
pub use crate::random::RandomStream;
pub use crate::registry::{default_config, AnyParams, AnyState, AnyStrategy, StrategyConfig, StrategyKind};
pub use crate::strategy::Strategy;
