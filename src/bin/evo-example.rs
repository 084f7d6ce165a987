extern crate clap;
extern crate env_logger;
extern crate evostrat;
extern crate evostrat_core;
#[macro_use]
extern crate log;

use std::fs::File;
use std::process;

use clap::App;

use self::evostrat::bin_utils::args::{ArgAugmenter, ArgsError, RunArgs, RunConfig};
use self::evostrat_core::checkpoint::Checkpoint;
use self::evostrat_core::strategy::Strategy;

fn parse_args() -> Result<(RunConfig, Option<String>), ArgsError> {
    let app = App::new("evo-example")
        .version("0.1.0")
        .about("Minimizes a benchmark function with an evolution strategy")
        .arg(
            clap::Arg::with_name("save_state")
                .long("save-state")
                .takes_value(true)
                .help("Writes the final state as JSON to this path"),
        );
    let matches = RunArgs.add_args(app).get_matches();
    let config = RunArgs.load_from_args(&matches)?;
    Ok((config, matches.value_of("save_state").map(|s| s.to_string())))
}

fn run() -> Result<(), ArgsError> {
    let (config, save_path) = parse_args()?;
    let strategy = config.strategy.build()?;
    let params = config.params();
    info!(
        "Running {} on {} with {} dims and {} candidates per generation",
        strategy.name(),
        config.objective,
        strategy.num_dims(),
        strategy.popsize()
    );

    let results = config.driver.run(&strategy, &params, &config.objective)?;
    println!(
        "Best Score: {}, Best Model: {:?}, Final Center: {:?}",
        results.best_fitness,
        results.best_member,
        results.state.center()
    );

    if let Some(path) = save_path {
        let mut file = File::create(&path).map_err(|e| ArgsError::Io {
            path: path.clone(),
            source: e,
        })?;
        results.state.save(&mut file)?;
        info!("Saved state to {}", path);
    }
    Ok(())
}

fn main() -> () {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run() {
        error!("{}", e);
        process::exit(1);
    }
}
