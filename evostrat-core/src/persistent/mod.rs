//! Persistent Evolution Strategies (Vicol et al., 2021).
//!
//! An inner problem of length `T` is unrolled in truncated segments of `K`
//! steps.  Each segment samples fresh mirrored perturbations which are summed
//! into a per-member accumulator, and the gradient estimate uses the whole
//! accumulator.  Credit is therefore assigned across every segment of the
//! current unroll rather than only the latest one.  Once the unroll is complete
//! the accumulator is cleared.

use crate::error::{check_antithetic, check_dims, check_sizes, Result};
use crate::gradient::{decay, GradientOptimizer, OptParams, OptState, OptimizerKind};
use crate::population::{mirror, Population};
use crate::random::RandomStream;
use crate::strategy::{check_batch, InitBounds, Strategy};

/// Hyperparameters for Persistent ES
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistentParams {
    /// Initial perturbation scale
    pub sigma_init: f32,
    /// Perturbation scale decay per generation
    pub sigma_decay: f32,
    /// Perturbation scale floor
    pub sigma_limit: f32,
    /// Total length of the inner problem, `T`
    pub inner_steps: usize,
    /// Truncation length of a partial unroll, `K`
    pub unroll_steps: usize,
    /// Hyperparameters of the mean optimizer
    #[serde(flatten)]
    pub opt: OptParams,
    /// Initialization range of the mean
    #[serde(flatten)]
    pub bounds: InitBounds,
}

impl PersistentParams {
    /// Default hyperparameters when the mean is driven by `kind`
    pub fn with_optimizer(kind: OptimizerKind) -> Self {
        PersistentParams {
            sigma_init: 0.1,
            sigma_decay: 0.999,
            sigma_limit: 0.1,
            inner_steps: 100,
            unroll_steps: 10,
            opt: kind.default_params(),
            bounds: InitBounds::default(),
        }
    }
}

/// Search state for Persistent ES
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistentState {
    /// Center of the search distribution
    pub mean: Vec<f32>,
    /// Isotropic perturbation scale
    pub sigma: f32,
    /// Perturbations summed over the segments of the current unroll
    pub pert_accum: Population,
    /// Inner steps completed in the current unroll
    pub inner_step_counter: usize,
    /// Optimizer accumulators and current learning rate
    pub opt: OptState,
    /// Number of completed `tell` calls
    pub gen_counter: u32,
}

/// Settings for Persistent ES
#[derive(Debug, Clone, PartialEq)]
pub struct PersistentEs {
    num_dims: usize,
    popsize: usize,
    optimizer: GradientOptimizer,
}

impl PersistentEs {
    /// Returns a new Persistent ES.  `popsize` must be even.
    pub fn new(num_dims: usize, popsize: usize, optimizer: OptimizerKind) -> Result<Self> {
        check_antithetic(popsize)?;
        check_sizes(num_dims, popsize)?;
        Ok(PersistentEs {
            num_dims: num_dims,
            popsize: popsize,
            optimizer: GradientOptimizer::new(optimizer, num_dims),
        })
    }

    /// Rule driving the mean
    pub fn optimizer(&self) -> OptimizerKind {
        self.optimizer.kind()
    }
}

impl Strategy for PersistentEs {
    type State = PersistentState;
    type Params = PersistentParams;

    fn name(&self) -> &'static str {
        "persistent_es"
    }

    fn num_dims(&self) -> usize {
        self.num_dims
    }

    fn popsize(&self) -> usize {
        self.popsize
    }

    fn default_params(&self) -> PersistentParams {
        PersistentParams::with_optimizer(self.optimizer.kind())
    }

    fn initialize(&self, rng: RandomStream, params: &PersistentParams) -> Result<PersistentState> {
        Ok(PersistentState {
            mean: params.bounds.sample(rng, self.num_dims),
            sigma: params.sigma_init,
            pert_accum: Population::zeros(self.popsize, self.num_dims),
            inner_step_counter: 0,
            opt: self.optimizer.initialize(&params.opt),
            gen_counter: 0,
        })
    }

    fn ask(
        &self,
        rng: RandomStream,
        state: &PersistentState,
        _params: &PersistentParams,
    ) -> Result<(Population, PersistentState)> {
        check_dims("mean", self.num_dims, state.mean.len())?;
        self.optimizer.check_state(&state.opt)?;
        state.pert_accum.check_shape(self.popsize, self.num_dims)?;

        let z_plus = rng.normal(self.popsize / 2 * self.num_dims);
        let mut x = mirror(&z_plus, self.popsize, self.num_dims);
        let mut next = state.clone();
        for i in 0..self.popsize {
            let accum = next.pert_accum.row_mut(i);
            for ((xi, a), m) in x.row_mut(i).iter_mut().zip(accum.iter_mut()).zip(&state.mean) {
                let pert = state.sigma * *xi;
                *a += pert;
                *xi = m + pert;
            }
        }
        Ok((x, next))
    }

    fn tell(
        &self,
        x: &Population,
        fitness: &[f32],
        state: &PersistentState,
        params: &PersistentParams,
    ) -> Result<PersistentState> {
        check_batch(self, x, fitness)?;
        check_dims("mean", self.num_dims, state.mean.len())?;
        self.optimizer.check_state(&state.opt)?;
        state.pert_accum.check_shape(self.popsize, self.num_dims)?;

        let denom = self.popsize as f32 * state.sigma * state.sigma;
        let mut grad = vec![0f32; self.num_dims];
        for (accum, f) in state.pert_accum.rows().zip(fitness) {
            for (g, a) in grad.iter_mut().zip(accum) {
                *g += a * f;
            }
        }
        for g in grad.iter_mut() {
            *g /= denom;
        }

        let (delta, opt) = self.optimizer.step(&grad, &state.opt, &params.opt);
        let opt = self.optimizer.update(&opt, &params.opt);
        let mean: Vec<f32> = state.mean.iter().zip(&delta).map(|(m, d)| m - d).collect();
        let sigma = decay(state.sigma, params.sigma_decay, params.sigma_limit);

        let mut inner_step_counter = state.inner_step_counter + params.unroll_steps;
        let pert_accum = if inner_step_counter >= params.inner_steps {
            debug!(
                "persistent_es: unroll complete after {} inner steps",
                inner_step_counter
            );
            inner_step_counter = 0;
            Population::zeros(self.popsize, self.num_dims)
        } else {
            state.pert_accum.clone()
        };

        Ok(PersistentState {
            mean: mean,
            sigma: sigma,
            pert_accum: pert_accum,
            inner_step_counter: inner_step_counter,
            opt: opt,
            gen_counter: state.gen_counter + 1,
        })
    }
}
