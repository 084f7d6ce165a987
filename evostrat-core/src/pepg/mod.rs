//! Parameter-exploring Policy Gradients with adaptive sigma (Sehnke et al., 2010).
//!
//! Candidates come in mirrored pairs `mean ± sigma * z`.  Only the elite pairs,
//! ranked by the better of their two fitness values, contribute to the mean
//! gradient.  The per-dimension sigma follows its own gradient estimate, which
//! is clipped to a fraction of the current sigma before being applied.
extern crate float_ord;

use self::float_ord::FloatOrd;

use crate::error::{check_antithetic, check_dims, check_sizes, EvoError, Result};
use crate::gradient::{decay, GradientOptimizer, OptParams, OptState, OptimizerKind};
use crate::population::{floor_at, mirror, Population};
use crate::random::RandomStream;
use crate::strategy::{check_batch, InitBounds, Strategy};

/// Hyperparameters for PEPG
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PepgParams {
    /// Initial perturbation scale, shared by every dimension
    pub sigma_init: f32,
    /// Perturbation scale decay per generation
    pub sigma_decay: f32,
    /// Perturbation scale floor
    pub sigma_limit: f32,
    /// Learning rate of the sigma gradient
    pub sigma_lrate: f32,
    /// Maximum relative change of sigma per generation
    pub sigma_max_change: f32,
    /// Hyperparameters of the mean optimizer
    #[serde(flatten)]
    pub opt: OptParams,
    /// Initialization range of the mean
    #[serde(flatten)]
    pub bounds: InitBounds,
}

impl PepgParams {
    /// Default hyperparameters when the mean is driven by `kind`
    pub fn with_optimizer(kind: OptimizerKind) -> Self {
        PepgParams {
            sigma_init: 0.10,
            sigma_decay: 0.999,
            sigma_limit: 0.01,
            sigma_lrate: 0.20,
            sigma_max_change: 0.2,
            opt: kind.default_params(),
            bounds: InitBounds::default(),
        }
    }
}

/// Search state for PEPG
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PepgState {
    /// Center of the search distribution
    pub mean: Vec<f32>,
    /// Per-dimension perturbation scale
    pub sigma: Vec<f32>,
    /// Optimizer accumulators and current learning rate
    pub opt: OptState,
    /// Number of completed `tell` calls
    pub gen_counter: u32,
}

/// Settings for PEPG
#[derive(Debug, Clone, PartialEq)]
pub struct Pepg {
    num_dims: usize,
    popsize: usize,
    elite_ratio: f32,
    elite_popsize: usize,
    optimizer: GradientOptimizer,
}

impl Pepg {
    /// Returns a new PEPG.  `popsize` must be even and `elite_ratio` in (0, 1].
    pub fn new(
        num_dims: usize,
        popsize: usize,
        elite_ratio: f32,
        optimizer: OptimizerKind,
    ) -> Result<Self> {
        check_antithetic(popsize)?;
        check_sizes(num_dims, popsize)?;
        if !(elite_ratio > 0. && elite_ratio <= 1.) {
            return Err(EvoError::InvalidEliteRatio { ratio: elite_ratio });
        }
        Ok(Pepg {
            num_dims: num_dims,
            popsize: popsize,
            elite_ratio: elite_ratio,
            elite_popsize: (popsize as f32 / 2. * elite_ratio) as usize,
            optimizer: GradientOptimizer::new(optimizer, num_dims),
        })
    }

    /// Number of mirrored pairs used for the update
    pub fn elite_popsize(&self) -> usize {
        self.elite_popsize
    }

    /// Fraction of pairs considered elite
    pub fn elite_ratio(&self) -> f32 {
        self.elite_ratio
    }

    /// Rule driving the mean
    pub fn optimizer(&self) -> OptimizerKind {
        self.optimizer.kind()
    }
}

/// Indices of the `elite_popsize` pairs with the lowest `min(fit_1, fit_2)`,
/// best first.
pub(crate) fn elite_pairs(fit_1: &[f32], fit_2: &[f32], elite_popsize: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..fit_1.len()).collect();
    order.sort_by_key(|i| FloatOrd(fit_1[*i].min(fit_2[*i])));
    order.truncate(elite_popsize);
    order
}

impl Strategy for Pepg {
    type State = PepgState;
    type Params = PepgParams;

    fn name(&self) -> &'static str {
        "pepg"
    }

    fn num_dims(&self) -> usize {
        self.num_dims
    }

    fn popsize(&self) -> usize {
        self.popsize
    }

    fn default_params(&self) -> PepgParams {
        PepgParams::with_optimizer(self.optimizer.kind())
    }

    fn initialize(&self, rng: RandomStream, params: &PepgParams) -> Result<PepgState> {
        Ok(PepgState {
            mean: params.bounds.sample(rng, self.num_dims),
            sigma: vec![params.sigma_init; self.num_dims],
            opt: self.optimizer.initialize(&params.opt),
            gen_counter: 0,
        })
    }

    fn ask(
        &self,
        rng: RandomStream,
        state: &PepgState,
        _params: &PepgParams,
    ) -> Result<(Population, PepgState)> {
        check_dims("mean", self.num_dims, state.mean.len())?;
        check_dims("sigma", self.num_dims, state.sigma.len())?;
        self.optimizer.check_state(&state.opt)?;

        let z_plus = rng.normal(self.popsize / 2 * self.num_dims);
        let mut x = mirror(&z_plus, self.popsize, self.num_dims);
        for i in 0..self.popsize {
            for ((xi, m), s) in x.row_mut(i).iter_mut().zip(&state.mean).zip(&state.sigma) {
                *xi = m + *xi * s;
            }
        }
        Ok((x, state.clone()))
    }

    fn tell(
        &self,
        x: &Population,
        fitness: &[f32],
        state: &PepgState,
        params: &PepgParams,
    ) -> Result<PepgState> {
        check_batch(self, x, fitness)?;
        check_dims("mean", self.num_dims, state.mean.len())?;
        check_dims("sigma", self.num_dims, state.sigma.len())?;
        self.optimizer.check_state(&state.opt)?;

        let half = self.popsize / 2;
        let (fit_1, fit_2) = fitness.split_at(half);

        // Perturbations of the positive half
        let eps: Vec<Vec<f32>> = (0..half)
            .map(|i| {
                x.row(i)
                    .iter()
                    .zip(&state.mean)
                    .map(|(xi, m)| xi - m)
                    .collect()
            })
            .collect();

        let mut mean = state.mean.clone();
        let mut sigma = state.sigma.clone();
        let mut opt = state.opt.clone();

        if self.elite_popsize == 0 {
            debug!("pepg: no elite pairs, skipping the gradient updates");
        } else {
            let n_elite = self.elite_popsize as f32;
            let elite = elite_pairs(fit_1, fit_2, self.elite_popsize);

            // Mean gradient from the fitness difference within each elite pair
            let mut grad = vec![0f32; self.num_dims];
            for &k in elite.iter() {
                let fit_diff = fit_1[k] - fit_2[k];
                for ((g, e), s) in grad.iter_mut().zip(&eps[k]).zip(&state.sigma) {
                    *g += fit_diff * e / s;
                }
            }
            for g in grad.iter_mut() {
                *g /= n_elite;
            }

            let (delta, stepped) = self.optimizer.step(&grad, &opt, &params.opt);
            opt = stepped;
            for (m, d) in mean.iter_mut().zip(&delta) {
                *m -= d;
            }

            // Adaptive sigma, baselined on the elite mean fitness
            let elite_mean = elite
                .iter()
                .map(|&k| fit_1[k] + fit_2[k])
                .sum::<f32>()
                / (2. * n_elite);
            let mut change = vec![0f32; self.num_dims];
            for k in 0..half {
                let r_s = (fit_1[k] + fit_2[k]) / 2. - elite_mean;
                for ((c, e), s) in change.iter_mut().zip(&eps[k]).zip(&state.sigma) {
                    let z = e / s;
                    *c += r_s * (z * z - s * s) / s;
                }
            }
            for (c, s) in change.iter().zip(sigma.iter_mut()) {
                let max_change = params.sigma_max_change * *s;
                let c = (params.sigma_lrate * c / n_elite)
                    .min(max_change)
                    .max(-max_change);
                *s -= c;
            }
        }

        let opt = self.optimizer.update(&opt, &params.opt);
        for s in sigma.iter_mut() {
            *s *= params.sigma_decay;
        }
        floor_at(&mut sigma, params.sigma_limit);

        debug!(
            "pepg gen {}: lrate {:.6}, elite {}",
            state.gen_counter + 1,
            opt.lrate,
            self.elite_popsize
        );

        Ok(PepgState {
            mean: mean,
            sigma: sigma,
            opt: opt,
            gen_counter: state.gen_counter + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testing::{assert_vectors, sphere};
    use proptest::prelude::*;

    fn one_dim(popsize: usize, elite_ratio: f32) -> (Pepg, PepgParams, PepgState) {
        let strategy = Pepg::new(1, popsize, elite_ratio, OptimizerKind::Sgd).unwrap();
        let params = PepgParams {
            sigma_init: 1.,
            ..strategy.default_params()
        };
        let state = PepgState {
            mean: vec![0.],
            sigma: vec![1.],
            opt: GradientOptimizer::new(OptimizerKind::Sgd, 1).initialize(&params.opt),
            gen_counter: 0,
        };
        (strategy, params, state)
    }

    #[test]
    fn test_construction() {
        assert_eq!(Pepg::new(2, 10, 0.5, OptimizerKind::Sgd).unwrap().elite_popsize(), 2);
        assert_eq!(Pepg::new(2, 100, 0.1, OptimizerKind::Adam).unwrap().elite_popsize(), 5);
        assert_eq!(Pepg::new(2, 8, 0.1, OptimizerKind::Sgd).unwrap().elite_popsize(), 0);

        assert!(Pepg::new(2, 7, 0.5, OptimizerKind::Sgd).unwrap_err().is_configuration_error());
        assert!(Pepg::new(2, 8, 0., OptimizerKind::Sgd).unwrap_err().is_configuration_error());
        assert!(Pepg::new(2, 8, 1.5, OptimizerKind::Sgd).unwrap_err().is_configuration_error());
    }

    #[test]
    fn test_elite_pairs() {
        let fit_1 = [5., 1., 7., 3.];
        let fit_2 = [0.5, 9., 8., 2.];
        assert_eq!(elite_pairs(&fit_1, &fit_2, 2), vec![0, 1]);
        assert_eq!(elite_pairs(&fit_1, &fit_2, 3), vec![0, 1, 3]);
        assert!(elite_pairs(&fit_1, &fit_2, 0).is_empty());
    }

    #[test]
    fn test_mean_moves_toward_lower_fitness() {
        let (strategy, params, state) = one_dim(2, 1.);
        let x = Population::from_rows(&[vec![1.], vec![-1.]]).unwrap();
        // (x + 3)^2
        let fitness = [16., 4.];
        let next = strategy.tell(&x, &fitness, &state, &params).unwrap();
        assert_vectors(&[-0.12], &next.mean, 1e-6);
        // Both members are elite, the baseline cancels
        assert_vectors(&[0.999], &next.sigma, 1e-6);
        assert_eq!(next.gen_counter, 1);
    }

    #[test]
    fn test_sigma_grows_when_large_steps_win() {
        let (strategy, params, state) = one_dim(4, 0.5);
        let x = Population::from_rows(&[vec![2.], vec![0.5], vec![-2.], vec![-0.5]]).unwrap();
        let fitness = [0., 10., 0., 10.];
        let next = strategy.tell(&x, &fitness, &state, &params).unwrap();
        // Change is clipped to 20% of sigma
        assert_vectors(&[1.2 * 0.999], &next.sigma, 1e-5);
        assert_vectors(&[0.], &next.mean, 1e-6);
    }

    #[test]
    fn test_sigma_update_uses_standardized_noise() {
        let (strategy, mut params, mut state) = one_dim(4, 1.);
        params.sigma_max_change = 100.;
        params.sigma_decay = 1.;
        params.sigma_limit = 0.;
        state.sigma = vec![0.5];
        let x = Population::from_rows(&[vec![1.], vec![0.25], vec![-1.], vec![-0.25]]).unwrap();
        let fitness = [0., 10., 0., 10.];
        let next = strategy.tell(&x, &fitness, &state, &params).unwrap();
        // z = [2, 0.5], S = [7.5, 0], r_s = [-5, 5], change = 0.2 * -37.5 / 2
        assert_vectors(&[4.25], &next.sigma, 1e-5);
        assert_vectors(&[0.], &next.mean, 1e-6);

        // Same batch with the default 20% clip and decay
        let params = PepgParams {
            sigma_limit: 0.,
            ..strategy.default_params()
        };
        let next = strategy.tell(&x, &fitness, &state, &params).unwrap();
        assert_vectors(&[0.6 * 0.999], &next.sigma, 1e-6);
    }

    #[test]
    fn test_rejects_short_optimizer_state() {
        let strategy = Pepg::new(3, 8, 0.5, OptimizerKind::Adam).unwrap();
        let params = strategy.default_params();
        let mut state = strategy.initialize(RandomStream::new(0), &params).unwrap();
        let (x, _) = strategy.ask(RandomStream::new(1), &state, &params).unwrap();
        state.opt.v = vec![0.];
        assert!(strategy.ask(RandomStream::new(1), &state, &params).unwrap_err().is_shape_error());
        assert!(strategy.tell(&x, &sphere(&x), &state, &params).unwrap_err().is_shape_error());
    }

    #[test]
    fn test_sigma_floor_after_adaptation() {
        let (strategy, mut params, state) = one_dim(4, 0.5);
        params.sigma_limit = 0.9;
        let x = Population::from_rows(&[vec![2.], vec![0.5], vec![-2.], vec![-0.5]]).unwrap();
        let fitness = [10., 0., 10., 0.];
        let next = strategy.tell(&x, &fitness, &state, &params).unwrap();
        assert_vectors(&[0.9], &next.sigma, 1e-6);
    }

    #[test]
    fn test_no_elite_skips_update() {
        let strategy = Pepg::new(3, 8, 0.1, OptimizerKind::Adam).unwrap();
        let params = strategy.default_params();
        let state = strategy.initialize(RandomStream::new(0), &params).unwrap();
        let (x, asked) = strategy.ask(RandomStream::new(1), &state, &params).unwrap();
        let next = strategy.tell(&x, &sphere(&x), &asked, &params).unwrap();

        assert_eq!(next.mean, state.mean);
        assert!(next.mean.iter().all(|m| m.is_finite()));
        assert_vectors(&[0.0999; 3], &next.sigma, 1e-6);
        assert!(next.opt.lrate < state.opt.lrate);
    }

    #[test]
    fn test_descends_sphere() {
        let strategy = Pepg::new(4, 20, 0.5, OptimizerKind::Adam).unwrap();
        let params = PepgParams {
            opt: OptParams {
                lrate_init: 0.05,
                beta_1: 0.9,
                ..OptimizerKind::Adam.default_params()
            },
            ..strategy.default_params()
        };
        let (init_rng, mut rng) = RandomStream::new(5).split();
        let init = strategy.initialize(init_rng, &params).unwrap();
        let mut state = init.clone();
        for _ in 0..100 {
            let (next_rng, ask_rng) = rng.split();
            rng = next_rng;
            let (x, asked) = strategy.ask(ask_rng, &state, &params).unwrap();
            state = strategy.tell(&x, &sphere(&x), &asked, &params).unwrap();
            assert!(state.sigma.iter().all(|s| *s >= params.sigma_limit));
        }
        let norm = |v: &[f32]| v.iter().map(|m| m * m).sum::<f32>();
        assert!(norm(&state.mean) < norm(&init.mean));
    }

    proptest! {
        #[test]
        fn prop_mirrored_noise(seed in any::<u64>(), half in 1usize..8, dims in 1usize..5) {
            let strategy = Pepg::new(dims, half * 2, 0.5, OptimizerKind::Sgd).unwrap();
            let params = strategy.default_params();
            let state = strategy.initialize(RandomStream::new(seed), &params).unwrap();
            let (x, _) = strategy.ask(RandomStream::new(seed).fold_in(1), &state, &params).unwrap();
            let noise = x.column_mean();
            for (n, m) in noise.iter().zip(&state.mean) {
                prop_assert!((n - m).abs() < 1e-4);
            }
        }

        #[test]
        fn prop_sigma_above_floor(seed in any::<u64>()) {
            let strategy = Pepg::new(3, 10, 0.4, OptimizerKind::ClipUp).unwrap();
            let params = strategy.default_params();
            let mut state = strategy.initialize(RandomStream::new(seed), &params).unwrap();
            let mut rng = RandomStream::new(seed).fold_in(7);
            for _ in 0..10 {
                let (next_rng, ask_rng) = rng.split();
                rng = next_rng;
                let (x, asked) = strategy.ask(ask_rng, &state, &params).unwrap();
                state = strategy.tell(&x, &sphere(&x), &asked, &params).unwrap();
                prop_assert!(state.sigma.iter().all(|s| *s >= params.sigma_limit));
                prop_assert!(state.opt.lrate >= params.opt.lrate_limit);
            }
        }
    }
}
