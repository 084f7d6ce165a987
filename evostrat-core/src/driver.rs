//! Runs the ask/evaluate/tell loop of any strategy against an objective.
extern crate hashbrown;
extern crate rayon;

use std::f32;
use std::fmt::Debug;
use std::time::SystemTime;

use self::hashbrown::HashMap;
use self::rayon::prelude::*;

use crate::error::Result;
use crate::random::RandomStream;
use crate::shaping::FitnessShaper;
use crate::strategy::Strategy;

/// Function to minimize
pub trait Objective: Send + Sync {
    /// Evaluates a single candidate.  Lower is better unless the driver's
    /// shaper maximizes.
    fn evaluate(&self, x: &[f32]) -> f32;
}

impl<F> Objective for F
where
    F: Fn(&[f32]) -> f32 + Send + Sync,
{
    fn evaluate(&self, x: &[f32]) -> f32 {
        self(x)
    }
}

#[derive(Clone, PartialEq)]
/// Logger for outputting scores
pub struct ScoreLogger {
    /// Score name to score value
    counts: HashMap<String, f32>,
}

impl ScoreLogger {
    /// Returns a new ScoreLogger
    pub fn new() -> ScoreLogger {
        ScoreLogger {
            counts: HashMap::new(),
        }
    }

    #[inline]
    /// Adds a score
    pub fn insert(&mut self, key: &str, value: f32) -> () {
        self.counts.insert(key.to_string(), value);
    }

    #[inline]
    /// Gets a score
    pub fn get(&self, key: &str) -> Option<f32> {
        self.counts.get(key).map(|x| *x)
    }

    /// Iterates over the logged scores
    pub fn iter(&self) -> impl Iterator<Item = (&String, &f32)> {
        self.counts.iter()
    }
}

impl Debug for ScoreLogger {
    /// Prints the scores
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        // sort counts
        let mut data: Vec<(&String, &f32)> = self.counts.iter().collect();
        data.sort_by_key(|(k, _v)| *k);
        write!(f, "{:?}", data)
    }
}

/// Result of a run
#[derive(Debug, Clone)]
pub struct Outcome<S> {
    /// State after the last `tell`
    pub state: S,
    /// Best candidate evaluated during the run
    pub best_member: Vec<f32>,
    /// Raw fitness of `best_member`
    pub best_fitness: f32,
    /// Scores logged at every report
    pub history: Vec<ScoreLogger>,
}

/// Settings for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Driver {
    /// Number of generations
    pub iterations: usize,
    /// Number of iterations between reporting metrics.  Zero disables reports.
    pub report_iter: usize,
    /// Seed of the whole run
    pub seed: u64,
    /// Transformation applied to raw fitness before `tell`
    pub shaper: FitnessShaper,
}

impl Default for Driver {
    fn default() -> Self {
        Driver {
            iterations: 100,
            report_iter: 10,
            seed: 2019,
            shaper: FitnessShaper::default(),
        }
    }
}

impl Driver {
    /// Runs `strategy` on `objective` for `iterations` generations.
    pub fn run<S, O>(&self, strategy: &S, params: &S::Params, objective: &O) -> Result<Outcome<S::State>>
    where
        S: Strategy,
        O: Objective,
    {
        let (init_rng, gen_rng) = RandomStream::new(self.seed).split();
        let mut state = strategy.initialize(init_rng, params)?;

        // Raw fitness is compared in the direction the shaper optimizes
        let sign = if self.shaper.maximize { -1. } else { 1. };
        let mut best_member = Vec::new();
        let mut best_fitness = sign * f32::INFINITY;
        let mut history = Vec::new();

        let now = SystemTime::now();
        for (pass, rng) in gen_rng.split_n(self.iterations).into_iter().enumerate() {
            let (x, asked) = strategy.ask(rng, &state, params)?;

            let raw: Vec<f32> = (0..x.popsize())
                .into_par_iter()
                .map(|i| objective.evaluate(x.row(i)))
                .collect();

            for (i, f) in raw.iter().enumerate() {
                if sign * f < sign * best_fitness {
                    best_fitness = *f;
                    best_member = x.row(i).to_vec();
                }
            }

            let shaped = self.shaper.apply(&x, &raw);
            state = strategy.tell(&x, &shaped, &asked, params)?;

            let last = pass + 1 == self.iterations;
            if self.report_iter > 0 && (pass % self.report_iter == 0 || last) {
                let (s, m) = now
                    .elapsed()
                    .map(|e| (e.as_secs(), e.subsec_millis()))
                    .unwrap_or((0, 0));

                let mut logger = ScoreLogger::new();
                logger.insert("iteration", pass as f32);
                logger.insert("mean", raw.iter().sum::<f32>() / raw.len() as f32);
                logger.insert("gen_best", raw.iter().fold(sign * f32::INFINITY, |acc, f| {
                    if sign * f < sign * acc {
                        *f
                    } else {
                        acc
                    }
                }));
                logger.insert("best", best_fitness);
                info!(
                    "Time: {}.{:03},\tIteration: {},\tFitness: {},\tBest: {},\tStats: {:?}",
                    s,
                    m,
                    pass,
                    logger.get("gen_best").unwrap_or(f32::NAN),
                    best_fitness,
                    logger
                );
                history.push(logger);
            }
        }

        Ok(Outcome {
            state: state,
            best_member: best_member,
            best_fitness: best_fitness,
            history: history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::OptimizerKind;
    use crate::nes::{OpenNes, OpenNesParams};
    use crate::pepg::Pepg;
    use crate::pso::Pso;
    use crate::registry::{StrategyConfig, StrategyKind};
    use crate::strategy::InitBounds;

    fn sphere(x: &[f32]) -> f32 {
        x.iter().map(|v| v * v).sum()
    }

    #[test]
    fn test_score_logger() {
        let mut logger = ScoreLogger::new();
        logger.insert("b", 2.);
        logger.insert("a", 1.);
        assert_eq!(logger.get("a"), Some(1.));
        assert_eq!(logger.get("c"), None);
        assert_eq!(format!("{:?}", logger), "[(\"a\", 1.0), (\"b\", 2.0)]");
        assert_eq!(logger.iter().count(), 2);
    }

    // Faster learning rate and sigma decay than the defaults, so that 50
    // generations reach the sigma floor and settle near the origin
    #[test]
    fn test_open_nes_end_to_end() {
        let strategy = OpenNes::new(2, 4).unwrap();
        let params = OpenNesParams {
            lrate_init: 0.1,
            lrate_decay: 0.97,
            lrate_limit: 0.01,
            beta_1: 0.9,
            sigma_decay: 0.9,
            sigma_limit: 0.01,
            bounds: InitBounds {
                init_min: -1.,
                init_max: 1.,
            },
            ..OpenNesParams::default()
        };
        let driver = Driver {
            iterations: 50,
            report_iter: 10,
            seed: 0,
            shaper: FitnessShaper::default(),
        };
        let outcome = driver.run(&strategy, &params, &sphere).unwrap();

        assert_eq!(outcome.state.gen_counter, 50);
        assert_eq!(outcome.state.sigma, 0.01);
        // Reports at 0, 10, .., 40 and the last generation
        assert_eq!(outcome.history.len(), 6);
        assert_eq!(outcome.history[5].get("iteration"), Some(49.));
        assert_eq!(outcome.best_fitness, sphere(&outcome.best_member));
        assert!(outcome.best_fitness < 0.5);
    }

    #[test]
    fn test_open_nes_default_params() {
        let strategy = OpenNes::new(2, 4).unwrap();
        let params = OpenNesParams {
            bounds: InitBounds {
                init_min: 1.,
                init_max: 1.,
            },
            ..OpenNesParams::default()
        };
        let driver = Driver {
            iterations: 50,
            report_iter: 10,
            seed: 0,
            shaper: FitnessShaper::default(),
        };
        let outcome = driver.run(&strategy, &params, &sphere).unwrap();

        assert!(outcome.state.sigma <= params.sigma_init);
        assert!(outcome.state.sigma >= params.sigma_limit);
        // Started at (1, 1)
        assert!(sphere(&outcome.state.mean) < 2., "mean {:?}", outcome.state.mean);
        let bests: Vec<f32> = outcome.history.iter().filter_map(|l| l.get("best")).collect();
        assert!(bests.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_deterministic() {
        let strategy = StrategyConfig::new(StrategyKind::Snes, 3, 8).build().unwrap();
        let params = strategy.default_params();
        let driver = Driver {
            iterations: 20,
            report_iter: 0,
            ..Driver::default()
        };
        let a = driver.run(&strategy, &params, &sphere).unwrap();
        let b = driver.run(&strategy, &params, &sphere).unwrap();
        assert_eq!(a.state, b.state);
        assert_eq!(a.best_member, b.best_member);
        assert!(a.history.is_empty());
    }

    #[test]
    fn test_best_tracks_raw_fitness() {
        let strategy = Pso::new(2, 6).unwrap();
        let params = strategy.default_params();
        let driver = Driver {
            iterations: 15,
            report_iter: 5,
            seed: 3,
            shaper: FitnessShaper {
                centered_rank: true,
                ..FitnessShaper::default()
            },
        };
        let outcome = driver.run(&strategy, &params, &sphere).unwrap();
        // Shaped values live in [-0.5, 0.5], the best is reported raw
        assert_eq!(outcome.best_fitness, sphere(&outcome.best_member));
        let bests: Vec<f32> = outcome.history.iter().filter_map(|l| l.get("best")).collect();
        assert!(bests.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_maximize() {
        let strategy = Pepg::new(2, 8, 0.5, OptimizerKind::Adam).unwrap();
        let params = strategy.default_params();
        let driver = Driver {
            iterations: 10,
            report_iter: 0,
            seed: 1,
            shaper: FitnessShaper {
                maximize: true,
                ..FitnessShaper::default()
            },
        };
        let neg_sphere = |x: &[f32]| -sphere(x);
        let outcome = driver.run(&strategy, &params, &neg_sphere).unwrap();
        assert!(outcome.best_fitness <= 0.);
        assert_eq!(outcome.best_fitness, neg_sphere(&outcome.best_member));
    }

    #[test]
    fn test_driver_config() {
        let driver: Driver = serde_json::from_str("{\"iterations\": 5}").unwrap();
        assert_eq!(driver.iterations, 5);
        assert_eq!(driver.report_iter, Driver::default().report_iter);
    }
}
