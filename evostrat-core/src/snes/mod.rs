//! Separable Natural Evolution Strategies (Schaul et al., 2011).
//!
//! A diagonal Gaussian is sampled without mirroring, and the mean and the
//! per-dimension scales are updated from rank-weighted noise:
//!
//! ```text
//! delta_mean  = lrate_mean * sigma * sum_r w_r * z_r
//! delta_sigma = exp(lrate_sigma / 2 * sum_r w_r * (z_r^2 - 1))
//! ```
//!
//! `tell` is split in two phases (`get_update`, `apply_update`) so that the
//! deltas can be averaged across workers before they are applied; see
//! `distributed`.
extern crate float_ord;

use self::float_ord::FloatOrd;

use crate::distributed::TwoPhase;
use crate::error::{check_dims, check_sizes, Result};
use crate::population::Population;
use crate::random::RandomStream;
use crate::strategy::{check_batch, InitBounds, Strategy};
use crate::weights::{snes_weights, temperature_weights};

/// Hyperparameters for SNES
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnesParams {
    /// Step size of the mean
    pub lrate_mean: f32,
    /// Step size of the log scales
    pub lrate_sigma: f32,
    /// Initial scale of every dimension
    pub sigma_init: f32,
    /// When positive, temperature sharpened weights replace the log-rank ones
    pub temperature: f32,
    /// Shrinkage applied to the mean after every update
    pub mean_decay: f32,
    /// Lower clip of the candidates
    pub clip_min: f32,
    /// Upper clip of the candidates
    pub clip_max: f32,
    /// Initialization range of the mean
    #[serde(flatten)]
    pub bounds: InitBounds,
}

impl SnesParams {
    /// Default hyperparameters for a problem of `num_dims` dimensions
    pub fn for_dims(num_dims: usize) -> Self {
        let d = num_dims.max(1) as f32;
        SnesParams {
            lrate_mean: 1.0,
            lrate_sigma: (3. + d.ln()) / (5. * d.sqrt()),
            sigma_init: 1.0,
            temperature: 0.0,
            mean_decay: 0.0,
            clip_min: std::f32::MIN,
            clip_max: std::f32::MAX,
            bounds: InitBounds {
                init_min: 0.,
                init_max: 0.,
            },
        }
    }

    fn weights(&self, popsize: usize) -> Vec<f32> {
        if self.temperature > 0. {
            temperature_weights(popsize, self.temperature)
        } else {
            snes_weights(popsize, true)
        }
    }
}

/// Search state for SNES
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnesState {
    /// Center of the search distribution
    pub mean: Vec<f32>,
    /// Per-dimension scale
    pub sigma: Vec<f32>,
    /// Recombination weights, indexed by rank
    pub weights: Vec<f32>,
    /// Number of completed `tell` calls
    pub gen_counter: u32,
}

/// Deltas produced by a single worker, before reduction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnesUpdate {
    /// Additive change of the mean
    pub delta_mean: Vec<f32>,
    /// Multiplicative change of sigma
    pub delta_sigma: Vec<f32>,
}

/// Settings for SNES
#[derive(Debug, Clone, PartialEq)]
pub struct Snes {
    num_dims: usize,
    popsize: usize,
}

impl Snes {
    /// Returns a new SNES.  Any positive `popsize` is accepted.
    pub fn new(num_dims: usize, popsize: usize) -> Result<Self> {
        check_sizes(num_dims, popsize)?;
        Ok(Snes {
            num_dims: num_dims,
            popsize: popsize,
        })
    }

    fn check_state(&self, state: &SnesState) -> Result<()> {
        check_dims("mean", self.num_dims, state.mean.len())?;
        check_dims("sigma", self.num_dims, state.sigma.len())?;
        check_dims("weights", self.popsize, state.weights.len())
    }
}

impl Strategy for Snes {
    type State = SnesState;
    type Params = SnesParams;

    fn name(&self) -> &'static str {
        "snes"
    }

    fn num_dims(&self) -> usize {
        self.num_dims
    }

    fn popsize(&self) -> usize {
        self.popsize
    }

    fn default_params(&self) -> SnesParams {
        SnesParams::for_dims(self.num_dims)
    }

    fn initialize(&self, rng: RandomStream, params: &SnesParams) -> Result<SnesState> {
        Ok(SnesState {
            mean: params.bounds.sample(rng, self.num_dims),
            sigma: vec![params.sigma_init; self.num_dims],
            weights: params.weights(self.popsize),
            gen_counter: 0,
        })
    }

    fn ask(
        &self,
        rng: RandomStream,
        state: &SnesState,
        params: &SnesParams,
    ) -> Result<(Population, SnesState)> {
        self.check_state(state)?;

        let noise = rng.normal(self.popsize * self.num_dims);
        let mut x = Population::from_vec(self.popsize, self.num_dims, noise)?;
        for i in 0..self.popsize {
            for ((xi, m), s) in x.row_mut(i).iter_mut().zip(&state.mean).zip(&state.sigma) {
                *xi = (m + s * *xi).max(params.clip_min).min(params.clip_max);
            }
        }
        Ok((x, state.clone()))
    }

    fn tell(
        &self,
        x: &Population,
        fitness: &[f32],
        state: &SnesState,
        params: &SnesParams,
    ) -> Result<SnesState> {
        let update = self.get_update(x, fitness, state, params)?;
        self.apply_update(&update, state, params)
    }
}

impl TwoPhase for Snes {
    type Update = SnesUpdate;

    fn get_update(
        &self,
        x: &Population,
        fitness: &[f32],
        state: &SnesState,
        params: &SnesParams,
    ) -> Result<SnesUpdate> {
        check_batch(self, x, fitness)?;
        self.check_state(state)?;

        // Best (lowest) fitness first
        let mut order: Vec<usize> = (0..self.popsize).collect();
        order.sort_by_key(|i| FloatOrd(fitness[*i]));

        let mut grad_mean = vec![0f32; self.num_dims];
        let mut grad_sigma = vec![0f32; self.num_dims];
        for (w, idx) in state.weights.iter().zip(order) {
            let row = x.row(idx);
            for j in 0..self.num_dims {
                // Clipped candidates yield the clipped noise
                let z = (row[j] - state.mean[j]) / state.sigma[j];
                grad_mean[j] += w * z;
                grad_sigma[j] += w * (z * z - 1.);
            }
        }

        let delta_mean = grad_mean
            .iter()
            .zip(&state.sigma)
            .map(|(g, s)| params.lrate_mean * s * g)
            .collect();
        let delta_sigma = grad_sigma
            .iter()
            .map(|g| (params.lrate_sigma / 2. * g).exp())
            .collect();

        Ok(SnesUpdate {
            delta_mean: delta_mean,
            delta_sigma: delta_sigma,
        })
    }

    fn apply_update(
        &self,
        update: &SnesUpdate,
        state: &SnesState,
        params: &SnesParams,
    ) -> Result<SnesState> {
        self.check_state(state)?;
        check_dims("delta_mean", self.num_dims, update.delta_mean.len())?;
        check_dims("delta_sigma", self.num_dims, update.delta_sigma.len())?;

        let shrink = 1. - params.mean_decay;
        let mean: Vec<f32> = state
            .mean
            .iter()
            .zip(&update.delta_mean)
            .map(|(m, d)| (m + d) * shrink)
            .collect();
        let sigma: Vec<f32> = state
            .sigma
            .iter()
            .zip(&update.delta_sigma)
            .map(|(s, d)| s * d)
            .collect();

        debug!(
            "snes gen {}: mean sigma {:.6}",
            state.gen_counter + 1,
            sigma.iter().sum::<f32>() / sigma.len() as f32
        );

        Ok(SnesState {
            mean: mean,
            sigma: sigma,
            weights: state.weights.clone(),
            gen_counter: state.gen_counter + 1,
        })
    }

    fn flatten(&self, update: &SnesUpdate) -> Vec<f32> {
        let mut flat = update.delta_mean.clone();
        flat.extend_from_slice(&update.delta_sigma);
        flat
    }

    fn unflatten(&self, mut flat: Vec<f32>) -> Result<SnesUpdate> {
        check_dims("reduced update", 2 * self.num_dims, flat.len())?;
        let delta_sigma = flat.split_off(self.num_dims);
        Ok(SnesUpdate {
            delta_mean: flat,
            delta_sigma: delta_sigma,
        })
    }
}
