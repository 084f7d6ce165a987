//! Particle Swarm Optimization (Kennedy & Eberhart, 1995).
//!
//! Each particle keeps a position, a velocity and the best position it has
//! visited.  On `ask` every particle is pulled toward its personal best and the
//! swarm's global best:
//!
//! ```text
//! v(t+1) = w * v(t) + c_1 * r_1 * (p_best - x(t)) + c_2 * r_2 * (g_best - x(t))
//! x(t+1) = x(t) + v(t+1)
//! ```
//!
//! `r_1` and `r_2` are drawn once per particle and shared across its
//! dimensions.
extern crate float_ord;
extern crate rayon;

use self::float_ord::FloatOrd;
use self::rayon::prelude::*;

use crate::error::{check_dims, check_sizes, Result};
use crate::population::Population;
use crate::random::RandomStream;
use crate::strategy::{check_batch, InitBounds, Strategy};

/// Fitness assigned to particles which have not been evaluated yet
pub const UNEVALUATED: f32 = 20e10;

/// Hyperparameters for PSO
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsoParams {
    /// Momentum of the velocity, `w`
    pub inertia_coeff: f32,
    /// Pull toward the personal best, `c_1`
    pub cognitive_coeff: f32,
    /// Pull toward the global best, `c_2`
    pub social_coeff: f32,
    /// Initialization range of the positions
    #[serde(flatten)]
    pub bounds: InitBounds,
}

impl Default for PsoParams {
    fn default() -> Self {
        PsoParams {
            inertia_coeff: 0.75,
            cognitive_coeff: 1.5,
            social_coeff: 2.0,
            bounds: InitBounds::default(),
        }
    }
}

/// Swarm state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsoState {
    /// Current position of every particle
    pub archive: Population,
    /// Latest fitness of every particle
    pub fitness: Vec<f32>,
    /// Current velocity of every particle
    pub velocity: Population,
    /// Best position visited by every particle
    pub best_archive: Population,
    /// Fitness at the best position of every particle
    pub best_fitness: Vec<f32>,
    /// Number of completed `tell` calls
    pub gen_counter: u32,
}

impl PsoState {
    /// Index of the particle holding the global best, first on ties
    pub fn global_best(&self) -> usize {
        self.best_fitness
            .iter()
            .enumerate()
            .min_by_key(|(_i, f)| FloatOrd(**f))
            .map(|(i, _f)| i)
            .unwrap_or(0)
    }
}

/// Settings for PSO
#[derive(Debug, Clone, PartialEq)]
pub struct Pso {
    num_dims: usize,
    popsize: usize,
}

impl Pso {
    /// Returns a new swarm of `popsize` particles
    pub fn new(num_dims: usize, popsize: usize) -> Result<Self> {
        check_sizes(num_dims, popsize)?;
        Ok(Pso {
            num_dims: num_dims,
            popsize: popsize,
        })
    }

    fn check_state(&self, state: &PsoState) -> Result<()> {
        state.archive.check_shape(self.popsize, self.num_dims)?;
        state.velocity.check_shape(self.popsize, self.num_dims)?;
        state.best_archive.check_shape(self.popsize, self.num_dims)?;
        check_dims("best_fitness", self.popsize, state.best_fitness.len())
    }
}

// Velocity of a single particle
fn particle_velocity(
    rng: RandomStream,
    idx: usize,
    state: &PsoState,
    global_best: &[f32],
    params: &PsoParams,
) -> Vec<f32> {
    let r = rng.uniform(2, 0., 1.);
    let (r1, r2) = (r[0], r[1]);
    let position = state.archive.row(idx);
    state
        .velocity
        .row(idx)
        .iter()
        .zip(position)
        .zip(state.best_archive.row(idx))
        .zip(global_best)
        .map(|(((v, x), p), g)| {
            params.inertia_coeff * v
                + params.cognitive_coeff * r1 * (p - x)
                + params.social_coeff * r2 * (g - x)
        })
        .collect()
}

impl Strategy for Pso {
    type State = PsoState;
    type Params = PsoParams;

    fn name(&self) -> &'static str {
        "pso"
    }

    fn num_dims(&self) -> usize {
        self.num_dims
    }

    fn popsize(&self) -> usize {
        self.popsize
    }

    fn default_params(&self) -> PsoParams {
        PsoParams::default()
    }

    fn initialize(&self, rng: RandomStream, params: &PsoParams) -> Result<PsoState> {
        let positions = params.bounds.sample(rng, self.popsize * self.num_dims);
        let archive = Population::from_vec(self.popsize, self.num_dims, positions)?;
        Ok(PsoState {
            best_archive: archive.clone(),
            archive: archive,
            fitness: vec![UNEVALUATED; self.popsize],
            velocity: Population::zeros(self.popsize, self.num_dims),
            best_fitness: vec![UNEVALUATED; self.popsize],
            gen_counter: 0,
        })
    }

    fn ask(
        &self,
        rng: RandomStream,
        state: &PsoState,
        params: &PsoParams,
    ) -> Result<(Population, PsoState)> {
        self.check_state(state)?;

        let global_best = state.best_archive.row(state.global_best());
        let streams = rng.split_n(self.popsize);
        let velocities: Vec<Vec<f32>> = streams
            .par_iter()
            .enumerate()
            .map(|(i, stream)| particle_velocity(*stream, i, state, global_best, params))
            .collect();

        let velocity = Population::from_rows(&velocities)?;
        let mut x = state.archive.clone();
        for i in 0..self.popsize {
            for (xi, v) in x.row_mut(i).iter_mut().zip(velocity.row(i)) {
                *xi += v;
            }
        }

        let mut next = state.clone();
        next.velocity = velocity;
        Ok((x, next))
    }

    fn tell(
        &self,
        x: &Population,
        fitness: &[f32],
        state: &PsoState,
        _params: &PsoParams,
    ) -> Result<PsoState> {
        check_batch(self, x, fitness)?;
        self.check_state(state)?;

        let mut best_archive = state.best_archive.clone();
        let mut best_fitness = state.best_fitness.clone();
        let mut replaced = 0;
        for (i, f) in fitness.iter().enumerate() {
            // Ties favor the newer position
            if *f <= best_fitness[i] {
                best_fitness[i] = *f;
                best_archive.row_mut(i).copy_from_slice(x.row(i));
                replaced += 1;
            }
        }
        debug!(
            "pso gen {}: {} personal bests improved",
            state.gen_counter + 1,
            replaced
        );

        Ok(PsoState {
            archive: x.clone(),
            fitness: fitness.to_vec(),
            velocity: state.velocity.clone(),
            best_archive: best_archive,
            best_fitness: best_fitness,
            gen_counter: state.gen_counter + 1,
        })
    }
}
