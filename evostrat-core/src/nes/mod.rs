//! OpenAI-style Natural Evolution Strategies (Salimans et al., 2017).
//!
//! An isotropic Gaussian around `mean` is sampled with mirrored noise, and the
//! search gradient `noise^T * fitness / (P * sigma)` drives an Adam step on the
//! mean.  Learning rate and sigma both anneal toward a floor.

use crate::error::{check_antithetic, check_dims, check_sizes, Result};
use crate::gradient::{decay, GradientOptimizer, OptParams, OptState, OptimizerKind};
use crate::population::{mirror, Population};
use crate::random::RandomStream;
use crate::strategy::{check_batch, InitBounds, Strategy};

/// Hyperparameters for Open NES
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenNesParams {
    /// Adam learning rate
    pub lrate_init: f32,
    /// Learning rate decay per generation
    pub lrate_decay: f32,
    /// Learning rate floor
    pub lrate_limit: f32,
    /// Adam first moment decay
    pub beta_1: f32,
    /// Adam second moment decay
    pub beta_2: f32,
    /// Adam stability constant
    pub eps: f32,
    /// Initial perturbation scale
    pub sigma_init: f32,
    /// Perturbation scale decay per generation
    pub sigma_decay: f32,
    /// Perturbation scale floor
    pub sigma_limit: f32,
    /// Initialization range of the mean
    #[serde(flatten)]
    pub bounds: InitBounds,
}

impl Default for OpenNesParams {
    fn default() -> Self {
        OpenNesParams {
            lrate_init: 0.01,
            lrate_decay: 0.999,
            lrate_limit: 0.01,
            beta_1: 0.99,
            beta_2: 0.999,
            eps: 1e-8,
            sigma_init: 0.1,
            sigma_decay: 0.999,
            sigma_limit: 0.1,
            bounds: InitBounds::default(),
        }
    }
}

impl OpenNesParams {
    // The Adam hyperparameters embedded in these params
    fn adam(&self) -> OptParams {
        OptParams {
            lrate_init: self.lrate_init,
            lrate_decay: self.lrate_decay,
            lrate_limit: self.lrate_limit,
            beta_1: self.beta_1,
            beta_2: self.beta_2,
            eps: self.eps,
            ..OptimizerKind::Adam.default_params()
        }
    }
}

/// Search state for Open NES
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenNesState {
    /// Center of the search distribution
    pub mean: Vec<f32>,
    /// Isotropic perturbation scale
    pub sigma: f32,
    /// Adam accumulators and current learning rate
    pub opt: OptState,
    /// Number of completed `tell` calls
    pub gen_counter: u32,
}

/// Settings for Open NES
#[derive(Debug, Clone, PartialEq)]
pub struct OpenNes {
    num_dims: usize,
    popsize: usize,
    optimizer: GradientOptimizer,
}

impl OpenNes {
    /// Returns a new Open NES.  `popsize` must be even.
    pub fn new(num_dims: usize, popsize: usize) -> Result<Self> {
        check_antithetic(popsize)?;
        check_sizes(num_dims, popsize)?;
        Ok(OpenNes {
            num_dims: num_dims,
            popsize: popsize,
            optimizer: GradientOptimizer::new(OptimizerKind::Adam, num_dims),
        })
    }
}

impl Strategy for OpenNes {
    type State = OpenNesState;
    type Params = OpenNesParams;

    fn name(&self) -> &'static str {
        "open_nes"
    }

    fn num_dims(&self) -> usize {
        self.num_dims
    }

    fn popsize(&self) -> usize {
        self.popsize
    }

    fn default_params(&self) -> OpenNesParams {
        OpenNesParams::default()
    }

    fn initialize(&self, rng: RandomStream, params: &OpenNesParams) -> Result<OpenNesState> {
        Ok(OpenNesState {
            mean: params.bounds.sample(rng, self.num_dims),
            sigma: params.sigma_init,
            opt: self.optimizer.initialize(&params.adam()),
            gen_counter: 0,
        })
    }

    fn ask(
        &self,
        rng: RandomStream,
        state: &OpenNesState,
        _params: &OpenNesParams,
    ) -> Result<(Population, OpenNesState)> {
        check_dims("mean", self.num_dims, state.mean.len())?;
        self.optimizer.check_state(&state.opt)?;

        // Antithetic sampling of noise
        let z_plus = rng.normal(self.popsize / 2 * self.num_dims);
        let mut x = mirror(&z_plus, self.popsize, self.num_dims);
        for i in 0..self.popsize {
            for (xi, m) in x.row_mut(i).iter_mut().zip(&state.mean) {
                *xi = m + state.sigma * *xi;
            }
        }
        Ok((x, state.clone()))
    }

    fn tell(
        &self,
        x: &Population,
        fitness: &[f32],
        state: &OpenNesState,
        params: &OpenNesParams,
    ) -> Result<OpenNesState> {
        check_batch(self, x, fitness)?;
        check_dims("mean", self.num_dims, state.mean.len())?;
        self.optimizer.check_state(&state.opt)?;

        // Reconstruct the noise from the mean and sigma used to sample x
        let scale = 1. / (self.popsize as f32 * state.sigma);
        let mut grad = vec![0f32; self.num_dims];
        for (row, f) in x.rows().zip(fitness) {
            for ((g, xi), m) in grad.iter_mut().zip(row).zip(&state.mean) {
                *g += (xi - m) / state.sigma * f;
            }
        }
        for g in grad.iter_mut() {
            *g *= scale;
        }

        let adam = params.adam();
        let (delta, opt) = self.optimizer.step(&grad, &state.opt, &adam);
        let opt = self.optimizer.update(&opt, &adam);

        let mean: Vec<f32> = state.mean.iter().zip(&delta).map(|(m, d)| m - d).collect();
        let sigma = decay(state.sigma, params.sigma_decay, params.sigma_limit);

        debug!(
            "open_nes gen {}: lrate {:.6}, sigma {:.6}",
            state.gen_counter + 1,
            opt.lrate,
            sigma
        );

        Ok(OpenNesState {
            mean: mean,
            sigma: sigma,
            opt: opt,
            gen_counter: state.gen_counter + 1,
        })
    }
}
