//! First-order step rules used by the gradient-estimating strategies.
//!
//! An optimizer never touches the search mean itself: `step` turns a gradient
//! estimate into a delta which the strategy subtracts from its mean, and
//! `update` anneals the learning rate once per generation.
//!
//! | rule      | delta                                   |
//! |-----------|-----------------------------------------|
//! | `sgd`     | `lrate * (grad + momentum * m)`         |
//! | `adam`    | `lrate * m_hat / (sqrt(v_hat) + eps)`   |
//! | `rmsprop` | `lrate * (momentum * m + grad / (sqrt(v) + eps))` |
//! | `clipup`  | momentum on the unit gradient, clipped to `max_speed` |
use std::fmt;
use std::str::FromStr;

use crate::error::{check_dims, EvoError, Result};
use crate::population::l2norm;

/// Names the step rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    /// Plain gradient step with optional momentum
    Sgd,
    /// Adam with bias corrected moments
    Adam,
    /// RMSProp with momentum
    RmsProp,
    /// ClipUp (Toklu et al.), momentum with a clipped step norm
    ClipUp,
}

impl OptimizerKind {
    /// All the registered rules
    pub const ALL: [OptimizerKind; 4] = [
        OptimizerKind::Sgd,
        OptimizerKind::Adam,
        OptimizerKind::RmsProp,
        OptimizerKind::ClipUp,
    ];

    /// Name used in configurations
    pub fn name(&self) -> &'static str {
        match self {
            OptimizerKind::Sgd => "sgd",
            OptimizerKind::Adam => "adam",
            OptimizerKind::RmsProp => "rmsprop",
            OptimizerKind::ClipUp => "clipup",
        }
    }

    /// Default hyperparameters of the rule
    pub fn default_params(&self) -> OptParams {
        match self {
            OptimizerKind::Sgd => OptParams {
                lrate_init: 0.01,
                lrate_decay: 0.999,
                lrate_limit: 0.001,
                momentum: 0.0,
                beta_1: 0.0,
                beta_2: 0.0,
                eps: 0.0,
                max_speed: 0.0,
            },
            OptimizerKind::Adam => OptParams {
                lrate_init: 0.01,
                lrate_decay: 0.999,
                lrate_limit: 0.001,
                momentum: 0.0,
                beta_1: 0.99,
                beta_2: 0.999,
                eps: 1e-8,
                max_speed: 0.0,
            },
            OptimizerKind::RmsProp => OptParams {
                lrate_init: 0.01,
                lrate_decay: 0.999,
                lrate_limit: 0.001,
                momentum: 0.9,
                beta_1: 0.0,
                beta_2: 0.99,
                eps: 1e-8,
                max_speed: 0.0,
            },
            OptimizerKind::ClipUp => OptParams {
                lrate_init: 0.15,
                lrate_decay: 0.999,
                lrate_limit: 0.001,
                momentum: 0.9,
                beta_1: 0.0,
                beta_2: 0.0,
                eps: 0.0,
                max_speed: 0.3,
            },
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = EvoError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.to_lowercase();
        OptimizerKind::ALL
            .iter()
            .find(|k| k.name() == name)
            .cloned()
            .ok_or_else(|| EvoError::UnknownOptimizer {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Hyperparameters of a step rule.  Fields a rule does not use are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptParams {
    /// Initial learning rate
    pub lrate_init: f32,
    /// Multiplicative decay applied once per generation
    pub lrate_decay: f32,
    /// Floor of the learning rate
    pub lrate_limit: f32,
    /// Momentum (sgd, rmsprop, clipup)
    pub momentum: f32,
    /// First moment decay (adam)
    pub beta_1: f32,
    /// Second moment decay (adam, rmsprop)
    pub beta_2: f32,
    /// Numerical stability constant (adam, rmsprop)
    pub eps: f32,
    /// Maximum step norm (clipup)
    pub max_speed: f32,
}

/// Accumulators of a step rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptState {
    /// Current learning rate
    pub lrate: f32,
    /// First moment / momentum / velocity
    pub m: Vec<f32>,
    /// Second moment
    pub v: Vec<f32>,
    /// Number of steps taken
    pub step: u32,
}

/// A step rule bound to a dimensionality
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientOptimizer {
    kind: OptimizerKind,
    num_dims: usize,
}

impl GradientOptimizer {
    /// Returns a new optimizer
    pub fn new(kind: OptimizerKind, num_dims: usize) -> Self {
        GradientOptimizer {
            kind: kind,
            num_dims: num_dims,
        }
    }

    /// Looks up the rule by name, failing on unknown names
    pub fn from_name(name: &str, num_dims: usize) -> Result<Self> {
        Ok(GradientOptimizer::new(name.parse()?, num_dims))
    }

    /// The step rule
    pub fn kind(&self) -> OptimizerKind {
        self.kind
    }

    /// Default hyperparameters of the rule
    pub fn default_params(&self) -> OptParams {
        self.kind.default_params()
    }

    /// Zeroed accumulators at the initial learning rate
    pub fn initialize(&self, params: &OptParams) -> OptState {
        OptState {
            lrate: params.lrate_init,
            m: vec![0f32; self.num_dims],
            v: vec![0f32; self.num_dims],
            step: 0,
        }
    }

    /// Fails unless the accumulators match the optimizer's dimensionality.
    /// Guards states loaded from a checkpoint.
    pub fn check_state(&self, state: &OptState) -> Result<()> {
        check_dims("optimizer m", self.num_dims, state.m.len())?;
        check_dims("optimizer v", self.num_dims, state.v.len())
    }

    /// Computes the delta for `grad` without applying it.  The caller
    /// subtracts the delta from its parameters.
    pub fn step(&self, grad: &[f32], state: &OptState, params: &OptParams) -> (Vec<f32>, OptState) {
        assert_eq!(grad.len(), self.num_dims);
        let mut next = state.clone();
        next.step += 1;
        let lrate = state.lrate;

        let delta = match self.kind {
            OptimizerKind::Sgd => {
                for (m, g) in next.m.iter_mut().zip(grad) {
                    *m = g + params.momentum * *m;
                }
                next.m.iter().map(|m| lrate * m).collect()
            }

            OptimizerKind::Adam => {
                let t = next.step as i32;
                let m_corr = 1. - params.beta_1.powi(t);
                let v_corr = 1. - params.beta_2.powi(t);
                let mut delta = Vec::with_capacity(self.num_dims);
                for ((m, v), g) in next.m.iter_mut().zip(next.v.iter_mut()).zip(grad) {
                    *m = (1. - params.beta_1) * g + params.beta_1 * *m;
                    *v = (1. - params.beta_2) * g * g + params.beta_2 * *v;
                    let m_hat = *m / m_corr;
                    let v_hat = *v / v_corr;
                    delta.push(lrate * m_hat / (v_hat.sqrt() + params.eps));
                }
                delta
            }

            OptimizerKind::RmsProp => {
                for ((m, v), g) in next.m.iter_mut().zip(next.v.iter_mut()).zip(grad) {
                    *v = (1. - params.beta_2) * g * g + params.beta_2 * *v;
                    *m = params.momentum * *m + g / (v.sqrt() + params.eps);
                }
                next.m.iter().map(|m| lrate * m).collect()
            }

            OptimizerKind::ClipUp => {
                let norm = l2norm(grad);
                // A flat gradient carries no direction
                let unit = if norm > 0. { lrate / norm } else { 0. };
                let mut velocity: Vec<f32> = next
                    .m
                    .iter()
                    .zip(grad)
                    .map(|(m, g)| params.momentum * m + unit * g)
                    .collect();
                let speed = l2norm(&velocity);
                if speed > params.max_speed {
                    let ratio = params.max_speed / speed;
                    for v in velocity.iter_mut() {
                        *v *= ratio;
                    }
                }
                next.m = velocity.clone();
                velocity
            }
        };
        (delta, next)
    }

    /// Anneals the learning rate toward its floor
    pub fn update(&self, state: &OptState, params: &OptParams) -> OptState {
        let mut next = state.clone();
        next.lrate = decay(state.lrate, params.lrate_decay, params.lrate_limit);
        next
    }
}

/// Shared annealing policy: `max(value * decay, floor)`
#[inline]
pub fn decay(value: f32, decay: f32, floor: f32) -> f32 {
    (value * decay).max(floor)
}
