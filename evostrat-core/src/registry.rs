//! Construction of strategies from names and configuration files.
//!
//! `AnyStrategy` closes over the built-in strategies so that the strategy can
//! be picked at runtime.  Its state and params are tagged unions; handing a
//! record of one kind to a strategy of another is a configuration error.
use std::fmt;
use std::str::FromStr;

use crate::error::{EvoError, Result};
use crate::gradient::OptimizerKind;
use crate::nes::{OpenNes, OpenNesParams, OpenNesState};
use crate::pepg::{Pepg, PepgParams, PepgState};
use crate::persistent::{PersistentEs, PersistentParams, PersistentState};
use crate::population::Population;
use crate::pso::{Pso, PsoParams, PsoState};
use crate::random::RandomStream;
use crate::snes::{Snes, SnesParams, SnesState};
use crate::strategy::Strategy;

/// Built-in strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// OpenAI-style NES
    OpenNes,
    /// Parameter-exploring policy gradients
    Pepg,
    /// Persistent ES
    PersistentEs,
    /// Particle swarm
    Pso,
    /// Separable NES
    Snes,
}

impl StrategyKind {
    /// Every registered strategy
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::OpenNes,
        StrategyKind::Pepg,
        StrategyKind::PersistentEs,
        StrategyKind::Pso,
        StrategyKind::Snes,
    ];

    /// Registered name of the strategy
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::OpenNes => "open_nes",
            StrategyKind::Pepg => "pepg",
            StrategyKind::PersistentEs => "persistent_es",
            StrategyKind::Pso => "pso",
            StrategyKind::Snes => "snes",
        }
    }

    /// Whether the optimizer of the mean can be configured
    pub fn takes_optimizer(&self) -> bool {
        match self {
            StrategyKind::Pepg | StrategyKind::PersistentEs => true,
            _ => false,
        }
    }

    /// Optimizer used when none is configured
    pub fn default_optimizer(&self) -> Option<OptimizerKind> {
        match self {
            StrategyKind::OpenNes => Some(OptimizerKind::Adam),
            StrategyKind::Pepg => Some(OptimizerKind::Sgd),
            StrategyKind::PersistentEs => Some(OptimizerKind::Adam),
            StrategyKind::Pso | StrategyKind::Snes => None,
        }
    }
}

impl FromStr for StrategyKind {
    type Err = EvoError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        StrategyKind::ALL
            .iter()
            .find(|k| k.name() == name)
            .cloned()
            .ok_or_else(|| EvoError::UnknownStrategy {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn default_elite_ratio() -> f32 {
    0.1
}

/// Construction time configuration of a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Which strategy to build
    #[serde(rename = "strategy")]
    pub kind: StrategyKind,
    /// Dimensionality of the search space
    pub num_dims: usize,
    /// Candidates per generation
    pub popsize: usize,
    /// Share of the pairs used by PEPG
    #[serde(default = "default_elite_ratio")]
    pub elite_ratio: f32,
    /// Rule driving the mean, for strategies which take one
    #[serde(default)]
    pub optimizer: Option<OptimizerKind>,
}

impl StrategyConfig {
    /// Returns a configuration with the default elite ratio and optimizer
    pub fn new(kind: StrategyKind, num_dims: usize, popsize: usize) -> Self {
        StrategyConfig {
            kind: kind,
            num_dims: num_dims,
            popsize: popsize,
            elite_ratio: default_elite_ratio(),
            optimizer: None,
        }
    }

    fn optimizer_or_default(&self) -> OptimizerKind {
        self.optimizer
            .or(self.kind.default_optimizer())
            .unwrap_or(OptimizerKind::Sgd)
    }

    /// Builds the configured strategy
    pub fn build(&self) -> Result<AnyStrategy> {
        if let Some(opt) = self.optimizer {
            if !self.kind.takes_optimizer() && Some(opt) != self.kind.default_optimizer() {
                warn!("{} does not take an optimizer, ignoring {}", self.kind, opt);
            }
        }
        let optimizer = self.optimizer_or_default();
        let strategy = match self.kind {
            StrategyKind::OpenNes => AnyStrategy::OpenNes(OpenNes::new(self.num_dims, self.popsize)?),
            StrategyKind::Pepg => AnyStrategy::Pepg(Pepg::new(
                self.num_dims,
                self.popsize,
                self.elite_ratio,
                optimizer,
            )?),
            StrategyKind::PersistentEs => AnyStrategy::PersistentEs(PersistentEs::new(
                self.num_dims,
                self.popsize,
                optimizer,
            )?),
            StrategyKind::Pso => AnyStrategy::Pso(Pso::new(self.num_dims, self.popsize)?),
            StrategyKind::Snes => AnyStrategy::Snes(Snes::new(self.num_dims, self.popsize)?),
        };
        Ok(strategy)
    }

    /// Default hyperparameters for this configuration.  Does not validate the
    /// sizes.
    pub fn default_params(&self) -> AnyParams {
        match self.kind {
            StrategyKind::OpenNes => AnyParams::OpenNes(OpenNesParams::default()),
            StrategyKind::Pepg => AnyParams::Pepg(PepgParams::with_optimizer(self.optimizer_or_default())),
            StrategyKind::PersistentEs => {
                AnyParams::PersistentEs(PersistentParams::with_optimizer(self.optimizer_or_default()))
            }
            StrategyKind::Pso => AnyParams::Pso(PsoParams::default()),
            StrategyKind::Snes => AnyParams::Snes(SnesParams::for_dims(self.num_dims)),
        }
    }
}

/// Default hyperparameters of a strategy kind with its default optimizer
pub fn default_config(kind: StrategyKind, num_dims: usize) -> AnyParams {
    StrategyConfig::new(kind, num_dims, 0).default_params()
}

/// Any built-in strategy
#[derive(Debug, Clone, PartialEq)]
pub enum AnyStrategy {
    /// OpenAI-style NES
    OpenNes(OpenNes),
    /// Parameter-exploring policy gradients
    Pepg(Pepg),
    /// Persistent ES
    PersistentEs(PersistentEs),
    /// Particle swarm
    Pso(Pso),
    /// Separable NES
    Snes(Snes),
}

/// State of any built-in strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnyState {
    /// OpenAI-style NES
    OpenNes(OpenNesState),
    /// Parameter-exploring policy gradients
    Pepg(PepgState),
    /// Persistent ES
    PersistentEs(PersistentState),
    /// Particle swarm
    Pso(PsoState),
    /// Separable NES
    Snes(SnesState),
}

/// Hyperparameters of any built-in strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnyParams {
    /// OpenAI-style NES
    OpenNes(OpenNesParams),
    /// Parameter-exploring policy gradients
    Pepg(PepgParams),
    /// Persistent ES
    PersistentEs(PersistentParams),
    /// Particle swarm
    Pso(PsoParams),
    /// Separable NES
    Snes(SnesParams),
}

impl AnyStrategy {
    /// Kind of the wrapped strategy
    pub fn kind(&self) -> StrategyKind {
        match self {
            AnyStrategy::OpenNes(_) => StrategyKind::OpenNes,
            AnyStrategy::Pepg(_) => StrategyKind::Pepg,
            AnyStrategy::PersistentEs(_) => StrategyKind::PersistentEs,
            AnyStrategy::Pso(_) => StrategyKind::Pso,
            AnyStrategy::Snes(_) => StrategyKind::Snes,
        }
    }
}

impl AnyState {
    /// Kind of strategy which produced this state
    pub fn kind(&self) -> StrategyKind {
        match self {
            AnyState::OpenNes(_) => StrategyKind::OpenNes,
            AnyState::Pepg(_) => StrategyKind::Pepg,
            AnyState::PersistentEs(_) => StrategyKind::PersistentEs,
            AnyState::Pso(_) => StrategyKind::Pso,
            AnyState::Snes(_) => StrategyKind::Snes,
        }
    }

    /// Best guess of the optimum held by the state: the mean, or the global
    /// best particle for PSO
    pub fn center(&self) -> &[f32] {
        match self {
            AnyState::OpenNes(s) => &s.mean,
            AnyState::Pepg(s) => &s.mean,
            AnyState::PersistentEs(s) => &s.mean,
            AnyState::Pso(s) => s.best_archive.row(s.global_best()),
            AnyState::Snes(s) => &s.mean,
        }
    }
}

impl AnyParams {
    /// Kind of strategy these params belong to
    pub fn kind(&self) -> StrategyKind {
        match self {
            AnyParams::OpenNes(_) => StrategyKind::OpenNes,
            AnyParams::Pepg(_) => StrategyKind::Pepg,
            AnyParams::PersistentEs(_) => StrategyKind::PersistentEs,
            AnyParams::Pso(_) => StrategyKind::Pso,
            AnyParams::Snes(_) => StrategyKind::Snes,
        }
    }
}

impl AnyStrategy {
    fn mismatch(&self, what: &'static str, found: StrategyKind) -> EvoError {
        EvoError::StrategyMismatch {
            what: what,
            expected: self.kind().name(),
            found: found.name(),
        }
    }

    fn params_mismatch(&self, params: &AnyParams) -> EvoError {
        self.mismatch("params", params.kind())
    }

    fn state_mismatch(&self, state: &AnyState, params: &AnyParams) -> EvoError {
        if params.kind() != self.kind() {
            self.params_mismatch(params)
        } else {
            self.mismatch("state", state.kind())
        }
    }
}

impl Strategy for AnyStrategy {
    type State = AnyState;
    type Params = AnyParams;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn num_dims(&self) -> usize {
        match self {
            AnyStrategy::OpenNes(s) => s.num_dims(),
            AnyStrategy::Pepg(s) => s.num_dims(),
            AnyStrategy::PersistentEs(s) => s.num_dims(),
            AnyStrategy::Pso(s) => s.num_dims(),
            AnyStrategy::Snes(s) => s.num_dims(),
        }
    }

    fn popsize(&self) -> usize {
        match self {
            AnyStrategy::OpenNes(s) => s.popsize(),
            AnyStrategy::Pepg(s) => s.popsize(),
            AnyStrategy::PersistentEs(s) => s.popsize(),
            AnyStrategy::Pso(s) => s.popsize(),
            AnyStrategy::Snes(s) => s.popsize(),
        }
    }

    fn default_params(&self) -> AnyParams {
        match self {
            AnyStrategy::OpenNes(s) => AnyParams::OpenNes(s.default_params()),
            AnyStrategy::Pepg(s) => AnyParams::Pepg(s.default_params()),
            AnyStrategy::PersistentEs(s) => AnyParams::PersistentEs(s.default_params()),
            AnyStrategy::Pso(s) => AnyParams::Pso(s.default_params()),
            AnyStrategy::Snes(s) => AnyParams::Snes(s.default_params()),
        }
    }

    fn initialize(&self, rng: RandomStream, params: &AnyParams) -> Result<AnyState> {
        let state = match (self, params) {
            (AnyStrategy::OpenNes(s), AnyParams::OpenNes(p)) => AnyState::OpenNes(s.initialize(rng, p)?),
            (AnyStrategy::Pepg(s), AnyParams::Pepg(p)) => AnyState::Pepg(s.initialize(rng, p)?),
            (AnyStrategy::PersistentEs(s), AnyParams::PersistentEs(p)) => {
                AnyState::PersistentEs(s.initialize(rng, p)?)
            }
            (AnyStrategy::Pso(s), AnyParams::Pso(p)) => AnyState::Pso(s.initialize(rng, p)?),
            (AnyStrategy::Snes(s), AnyParams::Snes(p)) => AnyState::Snes(s.initialize(rng, p)?),
            _ => return Err(self.params_mismatch(params)),
        };
        Ok(state)
    }

    fn ask(
        &self,
        rng: RandomStream,
        state: &AnyState,
        params: &AnyParams,
    ) -> Result<(Population, AnyState)> {
        match (self, state, params) {
            (AnyStrategy::OpenNes(s), AnyState::OpenNes(st), AnyParams::OpenNes(p)) => {
                s.ask(rng, st, p).map(|(x, st)| (x, AnyState::OpenNes(st)))
            }
            (AnyStrategy::Pepg(s), AnyState::Pepg(st), AnyParams::Pepg(p)) => {
                s.ask(rng, st, p).map(|(x, st)| (x, AnyState::Pepg(st)))
            }
            (AnyStrategy::PersistentEs(s), AnyState::PersistentEs(st), AnyParams::PersistentEs(p)) => {
                s.ask(rng, st, p).map(|(x, st)| (x, AnyState::PersistentEs(st)))
            }
            (AnyStrategy::Pso(s), AnyState::Pso(st), AnyParams::Pso(p)) => {
                s.ask(rng, st, p).map(|(x, st)| (x, AnyState::Pso(st)))
            }
            (AnyStrategy::Snes(s), AnyState::Snes(st), AnyParams::Snes(p)) => {
                s.ask(rng, st, p).map(|(x, st)| (x, AnyState::Snes(st)))
            }
            _ => Err(self.state_mismatch(state, params)),
        }
    }

    fn tell(
        &self,
        x: &Population,
        fitness: &[f32],
        state: &AnyState,
        params: &AnyParams,
    ) -> Result<AnyState> {
        match (self, state, params) {
            (AnyStrategy::OpenNes(s), AnyState::OpenNes(st), AnyParams::OpenNes(p)) => {
                s.tell(x, fitness, st, p).map(AnyState::OpenNes)
            }
            (AnyStrategy::Pepg(s), AnyState::Pepg(st), AnyParams::Pepg(p)) => {
                s.tell(x, fitness, st, p).map(AnyState::Pepg)
            }
            (AnyStrategy::PersistentEs(s), AnyState::PersistentEs(st), AnyParams::PersistentEs(p)) => {
                s.tell(x, fitness, st, p).map(AnyState::PersistentEs)
            }
            (AnyStrategy::Pso(s), AnyState::Pso(st), AnyParams::Pso(p)) => {
                s.tell(x, fitness, st, p).map(AnyState::Pso)
            }
            (AnyStrategy::Snes(s), AnyState::Snes(st), AnyParams::Snes(p)) => {
                s.tell(x, fitness, st, p).map(AnyState::Snes)
            }
            _ => Err(self.state_mismatch(state, params)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testing::sphere;

    #[test]
    fn test_parse_kind() {
        for kind in StrategyKind::ALL.iter() {
            assert_eq!(kind.name().parse::<StrategyKind>().unwrap(), *kind);
        }
        assert_eq!(" PSO ".parse::<StrategyKind>().unwrap(), StrategyKind::Pso);
        let err = "cma_es".parse::<StrategyKind>().unwrap_err();
        assert!(err.is_configuration_error());
        assert_eq!(err.to_string(), "unknown strategy: cma_es");
    }

    #[test]
    fn test_build_from_json() {
        let json = r#"{"strategy": "pepg", "num_dims": 3, "popsize": 20, "optimizer": "adam"}"#;
        let config: StrategyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.elite_ratio, 0.1);
        match config.build().unwrap() {
            AnyStrategy::Pepg(p) => {
                assert_eq!(p.optimizer(), OptimizerKind::Adam);
                assert_eq!(p.elite_popsize(), 1);
            }
            other => panic!("built {:?}", other),
        }

        let json = r#"{"strategy": "pepg", "num_dims": 3, "popsize": 20, "optimizer": "nadam"}"#;
        assert!(serde_json::from_str::<StrategyConfig>(json).is_err());
    }

    #[test]
    fn test_build_validates() {
        let config = StrategyConfig::new(StrategyKind::OpenNes, 2, 5);
        assert!(config.build().unwrap_err().is_configuration_error());
        let config = StrategyConfig::new(StrategyKind::Pso, 2, 5);
        assert!(config.build().is_ok());
        let config = StrategyConfig {
            elite_ratio: 0.,
            ..StrategyConfig::new(StrategyKind::Pepg, 2, 4)
        };
        assert!(config.build().unwrap_err().is_configuration_error());
    }

    #[test]
    fn test_default_config() {
        for kind in StrategyKind::ALL.iter() {
            assert_eq!(default_config(*kind, 4).kind(), *kind);
        }
        match default_config(StrategyKind::PersistentEs, 4) {
            AnyParams::PersistentEs(p) => {
                assert_eq!(p.opt, OptimizerKind::Adam.default_params());
            }
            other => panic!("got {:?}", other),
        }
        let strategy = StrategyConfig::new(StrategyKind::Snes, 4, 6).build().unwrap();
        assert_eq!(strategy.default_params(), default_config(StrategyKind::Snes, 4));
    }

    #[test]
    fn test_dispatch_matches_concrete() {
        let any = StrategyConfig::new(StrategyKind::OpenNes, 3, 6).build().unwrap();
        let concrete = OpenNes::new(3, 6).unwrap();
        let params = concrete.default_params();

        let state = concrete.initialize(RandomStream::new(1), &params).unwrap();
        let (x, state) = concrete.ask(RandomStream::new(2), &state, &params).unwrap();
        let state = concrete.tell(&x, &sphere(&x), &state, &params).unwrap();

        let any_params = any.default_params();
        let any_state = any.initialize(RandomStream::new(1), &any_params).unwrap();
        let (any_x, any_state) = any.ask(RandomStream::new(2), &any_state, &any_params).unwrap();
        let any_state = any.tell(&any_x, &sphere(&any_x), &any_state, &any_params).unwrap();

        assert_eq!(x, any_x);
        assert_eq!(any_state, AnyState::OpenNes(state));
        assert_eq!(any.name(), "open_nes");
    }

    #[test]
    fn test_mismatch() {
        let pso = StrategyConfig::new(StrategyKind::Pso, 2, 4).build().unwrap();
        let snes = StrategyConfig::new(StrategyKind::Snes, 2, 4).build().unwrap();

        let err = pso.initialize(RandomStream::new(0), &snes.default_params()).unwrap_err();
        assert!(err.is_configuration_error());

        let snes_params = snes.default_params();
        let snes_state = snes.initialize(RandomStream::new(0), &snes_params).unwrap();
        let err = pso
            .ask(RandomStream::new(0), &snes_state, &pso.default_params())
            .unwrap_err();
        match err {
            EvoError::StrategyMismatch { what, expected, found } => {
                assert_eq!(what, "state");
                assert_eq!(expected, "pso");
                assert_eq!(found, "snes");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_state_round_trip() {
        let strategy = StrategyConfig::new(StrategyKind::Pso, 2, 3).build().unwrap();
        let params = strategy.default_params();
        let state = strategy.initialize(RandomStream::new(4), &params).unwrap();
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.starts_with("{\"pso\":"));
        let back: AnyState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert_eq!(back.center(), state.center());
    }
}
