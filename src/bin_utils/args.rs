extern crate evostrat_core;

use std::fs::File;
use std::io::BufReader;

use clap::{App, Arg, ArgMatches};
use thiserror::Error;

use self::evostrat_core::checkpoint::Checkpoint;
use self::evostrat_core::driver::Driver;
use self::evostrat_core::error::EvoError;
use self::evostrat_core::gradient::OptimizerKind;
use self::evostrat_core::registry::{AnyParams, StrategyConfig, StrategyKind};
use self::evostrat_core::shaping::FitnessShaper;

use crate::objectives::Benchmark;

/// Failures while reading the arguments of a binary
#[derive(Debug, Error)]
pub enum ArgsError {
    /// A flag failed to parse
    #[error("invalid argument: {0}")]
    Clap(#[from] clap::Error),

    /// A value failed validation
    #[error("{0}")]
    Invalid(String),

    /// The configuration file could not be opened
    #[error("could not open {path}: {source}")]
    Io {
        /// Path of the file
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// The strategy configuration is invalid or unreadable
    #[error(transparent)]
    Strategy(#[from] EvoError),
}

/// Trait to add new arguments to the current app
pub trait ArgAugmenter {
    /// Type of struct to output from this parser
    type Output;

    /// Specifies arguments to add
    fn add_args<'a, 'b>(&self, app: App<'a, 'b>) -> App<'a, 'b>;

    /// Parses the arguments
    fn load_from_args<'a>(&self, args: &ArgMatches<'a>) -> Result<Self::Output, ArgsError>;
}

/// Everything needed for a single run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Strategy to build
    pub strategy: StrategyConfig,
    /// Hyperparameters.  Defaults of the strategy when missing.
    #[serde(default)]
    pub params: Option<AnyParams>,
    /// Loop settings
    #[serde(default)]
    pub driver: Driver,
    /// Function to minimize
    pub objective: Benchmark,
}

impl RunConfig {
    /// Loads a run from a JSON file
    pub fn from_file(path: &str) -> Result<Self, ArgsError> {
        let file = File::open(path).map_err(|e| ArgsError::Io {
            path: path.to_string(),
            source: e,
        })?;
        Ok(RunConfig::load(&mut BufReader::new(file))?)
    }

    /// Hyperparameters of the run
    pub fn params(&self) -> AnyParams {
        self.params
            .clone()
            .unwrap_or_else(|| self.strategy.default_params())
    }
}

/// Struct defining the run arguments using ArgAugmenter
pub struct RunArgs;

impl ArgAugmenter for RunArgs {
    type Output = RunConfig;

    /// Specifies arguments to add for the run
    fn add_args<'a, 'b>(&self, app: App<'a, 'b>) -> App<'a, 'b> {
        app
      .arg(Arg::with_name("config")
           .short("c")
           .long("config")
           .takes_value(true)
           .conflicts_with_all(&["strategy", "objective"])
           .help("JSON file describing the whole run"))
      .arg(Arg::with_name("strategy")
           .short("s")
           .long("strategy")
           .takes_value(true)
           .possible_values(&["open_nes", "pepg", "persistent_es", "pso", "snes"])
           .help("Strategy to run.  Defaults to open_nes"))
      .arg(Arg::with_name("objective")
           .short("o")
           .long("objective")
           .takes_value(true)
           .help("Benchmark to minimize.  Defaults to quadratic"))
      .arg(Arg::with_name("dims")
           .short("d")
           .long("dims")
           .takes_value(true)
           .help("Number of dimensions of the search space"))
      .arg(Arg::with_name("popsize")
           .short("p")
           .long("popsize")
           .takes_value(true)
           .help("Number of candidates per generation"))
      .arg(Arg::with_name("iters")
           .short("i")
           .long("iters")
           .takes_value(true)
           .help("Number of iterations to run before exiting"))
      .arg(Arg::with_name("report_iters")
           .short("r")
           .long("report")
           .takes_value(true)
           .help("How often to report progress."))
      .arg(Arg::with_name("seed")
           .long("seed")
           .takes_value(true)
           .help("Seed of the run"))
      .arg(Arg::with_name("optimizer")
           .long("optimizer")
           .takes_value(true)
           .possible_values(&["sgd", "adam", "rmsprop", "clipup"])
           .help("Optimizer driving the mean, for pepg and persistent_es"))
      .arg(Arg::with_name("elite_ratio")
           .long("elite-ratio")
           .takes_value(true)
           .help("Share of the pairs used by pepg.  Defaults to 0.1"))
      .arg(Arg::with_name("centered_rank")
           .long("centered-rank")
           .help("If provided, optimizes centered ranks of the fitness"))
    }

    /// Parses the arguments for the run
    fn load_from_args<'a>(&self, args: &ArgMatches<'a>) -> Result<Self::Output, ArgsError> {
        if let Some(path) = args.value_of("config") {
            return RunConfig::from_file(path);
        }

        let kind: StrategyKind = args.value_of("strategy").unwrap_or("open_nes").parse()?;
        let objective: Benchmark = args
            .value_of("objective")
            .unwrap_or("quadratic")
            .parse()
            .map_err(ArgsError::Invalid)?;

        let num_dims = value_t!(args, "dims", usize).unwrap_or(2);
        let popsize = value_t!(args, "popsize", usize).unwrap_or(20);
        let defaults = Driver::default();
        let driver = Driver {
            iterations: value_t!(args, "iters", usize).unwrap_or(defaults.iterations),
            report_iter: value_t!(args, "report_iters", usize).unwrap_or(defaults.report_iter),
            seed: value_t!(args, "seed", u64).unwrap_or(defaults.seed),
            shaper: FitnessShaper {
                centered_rank: args.is_present("centered_rank"),
                ..FitnessShaper::default()
            },
        };

        let optimizer = match args.value_of("optimizer") {
            Some(name) => Some(name.parse::<OptimizerKind>()?),
            None => None,
        };
        let mut strategy = StrategyConfig::new(kind, num_dims, popsize);
        strategy.optimizer = optimizer;
        if args.is_present("elite_ratio") {
            strategy.elite_ratio = value_t!(args, "elite_ratio", f32)?;
        }

        Ok(RunConfig {
            strategy: strategy,
            params: None,
            driver: driver,
            objective: objective,
        })
    }
}
