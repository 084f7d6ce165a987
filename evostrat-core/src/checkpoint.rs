//! JSON checkpoints of states, params and configurations.
use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Serialization for anything a run needs to resume
pub trait Checkpoint: Sized {
    /// Writes out the record as JSON
    fn save<A: Write>(&self, writer: &mut A) -> Result<()>;

    /// Loads a record written by `save`
    fn load<A: Read>(reader: &mut A) -> Result<Self>;
}

impl<T: Serialize + DeserializeOwned> Checkpoint for T {
    fn save<A: Write>(&self, writer: &mut A) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    fn load<A: Read>(reader: &mut A) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvoError;
    use crate::gradient::OptimizerKind;
    use crate::nes::{OpenNes, OpenNesState};
    use crate::pepg::PepgParams;
    use crate::pso::{Pso, PsoState};
    use crate::random::RandomStream;
    use crate::registry::{StrategyConfig, StrategyKind};
    use crate::strategy::Strategy;

    #[test]
    fn test_state_checkpoint() {
        let strategy = OpenNes::new(3, 4).unwrap();
        let params = strategy.default_params();
        let state = strategy.initialize(RandomStream::new(11), &params).unwrap();

        let mut buffer = Vec::new();
        state.save(&mut buffer).unwrap();
        let loaded = OpenNesState::load(&mut buffer.as_slice()).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_flattened_params() {
        let params = PepgParams::with_optimizer(OptimizerKind::ClipUp);
        let mut buffer = Vec::new();
        params.save(&mut buffer).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        // Optimizer and bounds fields sit next to the strategy's own
        assert!(text.contains("\"max_speed\""));
        assert!(text.contains("\"init_min\""));
        assert_eq!(PepgParams::load(&mut buffer.as_slice()).unwrap(), params);
    }

    #[test]
    fn test_config_checkpoint() {
        let config = StrategyConfig::new(StrategyKind::PersistentEs, 8, 16);
        let mut buffer = Vec::new();
        config.save(&mut buffer).unwrap();
        assert_eq!(StrategyConfig::load(&mut buffer.as_slice()).unwrap(), config);
    }

    #[test]
    fn test_load_failure() {
        let err = OpenNesState::load(&mut "{\"mean\": [1.0]}".as_bytes()).unwrap_err();
        match err {
            EvoError::Serialization(_) => (),
            other => panic!("unexpected error {:?}", other),
        }
        let err = OpenNesState::load(&mut "[".as_bytes()).unwrap_err();
        assert!(!err.is_configuration_error() && !err.is_shape_error());
    }

    #[test]
    fn test_loaded_swarm_with_short_archive() {
        let strategy = Pso::new(2, 2).unwrap();
        let params = strategy.default_params();
        let state = strategy.initialize(RandomStream::new(0), &params).unwrap();
        let mut buffer = Vec::new();
        state.save(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let valid = serde_json::to_string(&state.archive).unwrap();
        let broken = text.replacen(&valid, "{\"popsize\":2,\"num_dims\":2,\"data\":[1.0]}", 1);
        assert_ne!(broken, text);
        match PsoState::load(&mut broken.as_bytes()) {
            Err(EvoError::Serialization(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_loaded_state_with_short_moments() {
        let strategy = OpenNes::new(3, 4).unwrap();
        let params = strategy.default_params();
        let state = strategy.initialize(RandomStream::new(0), &params).unwrap();
        let (x, asked) = strategy.ask(RandomStream::new(1), &state, &params).unwrap();

        let mut json = serde_json::to_value(&asked).unwrap();
        json["opt"]["m"] = serde_json::json!([0.0]);
        let loaded = OpenNesState::load(&mut json.to_string().as_bytes()).unwrap();

        let fitness: Vec<f32> = (0..4).map(|i| i as f32).collect();
        let err = strategy.tell(&x, &fitness, &loaded, &params).unwrap_err();
        assert!(err.is_shape_error());
        assert!(strategy.ask(RandomStream::new(1), &loaded, &params).unwrap_err().is_shape_error());
    }
}
