//! Averaging strategy updates across workers.
//!
//! Each worker evaluates its own shard of fitness, computes its local update
//! and hands the flattened update to a `Reducer`.  The reducer returns the mean
//! over all workers, which is then applied to every worker's state, keeping the
//! states identical.  `Distributed` performs exactly one reduction per `tell`.
use std::sync::{Arc, Barrier, Mutex};

use crate::error::{EvoError, Result};
use crate::population::Population;
use crate::random::RandomStream;
use crate::strategy::Strategy;

/// A strategy whose `tell` can be split into computing and applying an update.
pub trait TwoPhase: Strategy {
    /// Local update produced by a worker
    type Update: Clone + Send;

    /// Computes the update implied by a batch, without touching the state
    fn get_update(
        &self,
        x: &Population,
        fitness: &[f32],
        state: &Self::State,
        params: &Self::Params,
    ) -> Result<Self::Update>;

    /// Applies an (optionally reduced) update to the state
    fn apply_update(
        &self,
        update: &Self::Update,
        state: &Self::State,
        params: &Self::Params,
    ) -> Result<Self::State>;

    /// Lays the update out as a flat vector for reduction
    fn flatten(&self, update: &Self::Update) -> Vec<f32>;

    /// Inverse of `flatten`
    fn unflatten(&self, flat: Vec<f32>) -> Result<Self::Update>;
}

/// Collective which averages a vector over all workers.
pub trait Reducer: Send + Sync {
    /// Number of participating workers
    fn workers(&self) -> usize;

    /// Returns the element-wise mean of `local` over all workers.  Blocks until
    /// every worker has contributed.
    fn mean(&self, local: Vec<f32>) -> Result<Vec<f32>>;

    /// Takes part in the current round without a contribution, after a local
    /// failure.  The other workers' `mean` returns `WorkerFailed`.
    fn abstain(&self) -> () {}
}

/// Identity reduction for a single process
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleWorker;

impl Reducer for SingleWorker {
    fn workers(&self) -> usize {
        1
    }

    fn mean(&self, local: Vec<f32>) -> Result<Vec<f32>> {
        Ok(local)
    }
}

// Contribution of a single worker to the current round
#[derive(Debug, Clone)]
enum Slot {
    Empty,
    Ready(Vec<f32>),
    Failed,
}

/// In-process collective shared by a fixed number of threads
pub struct ThreadGroup {
    workers: usize,
    barrier: Barrier,
    slots: Mutex<Vec<Slot>>,
}

impl ThreadGroup {
    /// Creates a group of `workers` members, one per thread
    pub fn new(workers: usize) -> Result<Vec<GroupMember>> {
        if workers == 0 {
            return Err(EvoError::EmptyDimension { what: "workers" });
        }
        let group = Arc::new(ThreadGroup {
            workers: workers,
            barrier: Barrier::new(workers),
            slots: Mutex::new(vec![Slot::Empty; workers]),
        });
        Ok((0..workers)
            .map(|rank| GroupMember {
                group: group.clone(),
                rank: rank,
            })
            .collect())
    }

    // Averages the contributions currently in the slots
    fn average(&self) -> Result<Vec<f32>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let mut total: Option<Vec<f32>> = None;
        for (rank, slot) in slots.iter().enumerate() {
            let local = match slot {
                Slot::Ready(l) => l,
                Slot::Failed => return Err(EvoError::WorkerFailed { rank: rank }),
                Slot::Empty => {
                    return Err(EvoError::BatchMismatch {
                        what: "reducer contributions",
                        expected: self.workers,
                        got: slots
                            .iter()
                            .filter(|s| match s {
                                Slot::Empty => false,
                                _ => true,
                            })
                            .count(),
                    })
                }
            };
            match total {
                None => total = Some(local.clone()),
                Some(ref mut t) => {
                    if t.len() != local.len() {
                        return Err(EvoError::DimensionMismatch {
                            what: "reducer contribution",
                            expected: t.len(),
                            got: local.len(),
                        });
                    }
                    for (ti, li) in t.iter_mut().zip(local) {
                        *ti += li;
                    }
                }
            }
        }
        let scale = 1. / self.workers as f32;
        Ok(total
            .unwrap_or_default()
            .into_iter()
            .map(|v| v * scale)
            .collect())
    }
}

/// Handle held by a single worker of a `ThreadGroup`
#[derive(Clone)]
pub struct GroupMember {
    group: Arc<ThreadGroup>,
    rank: usize,
}

impl GroupMember {
    /// Position of this worker in the group
    pub fn rank(&self) -> usize {
        self.rank
    }

    // Fills this worker's slot and averages once every worker has filled theirs
    fn contribute(&self, slot: Slot) -> Result<Vec<f32>> {
        {
            let mut slots = self.group.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots[self.rank] = slot;
        }
        self.group.barrier.wait();
        let reduced = self.group.average();
        // Nobody may overwrite a slot before everyone has read them all
        self.group.barrier.wait();
        reduced
    }
}

impl Reducer for GroupMember {
    fn workers(&self) -> usize {
        self.group.workers
    }

    fn mean(&self, local: Vec<f32>) -> Result<Vec<f32>> {
        self.contribute(Slot::Ready(local))
    }

    fn abstain(&self) -> () {
        // The local error is what this worker reports
        let _ = self.contribute(Slot::Failed);
    }
}

/// Wraps a two phase strategy so that every `tell` reduces its update across
/// workers before applying it.
#[derive(Debug, Clone)]
pub struct Distributed<S, R> {
    strategy: S,
    reducer: R,
}

impl<S: TwoPhase, R: Reducer> Distributed<S, R> {
    /// Returns a new distributed strategy
    pub fn new(strategy: S, reducer: R) -> Self {
        Distributed {
            strategy: strategy,
            reducer: reducer,
        }
    }

    /// The wrapped strategy
    pub fn inner(&self) -> &S {
        &self.strategy
    }

    /// The reducer used by `tell`
    pub fn reducer(&self) -> &R {
        &self.reducer
    }
}

impl<S: TwoPhase, R: Reducer> Strategy for Distributed<S, R> {
    type State = S::State;
    type Params = S::Params;

    fn name(&self) -> &'static str {
        self.strategy.name()
    }

    fn num_dims(&self) -> usize {
        self.strategy.num_dims()
    }

    fn popsize(&self) -> usize {
        self.strategy.popsize()
    }

    fn default_params(&self) -> S::Params {
        self.strategy.default_params()
    }

    fn initialize(&self, rng: RandomStream, params: &S::Params) -> Result<S::State> {
        self.strategy.initialize(rng, params)
    }

    fn ask(
        &self,
        rng: RandomStream,
        state: &S::State,
        params: &S::Params,
    ) -> Result<(Population, S::State)> {
        self.strategy.ask(rng, state, params)
    }

    fn tell(
        &self,
        x: &Population,
        fitness: &[f32],
        state: &S::State,
        params: &S::Params,
    ) -> Result<S::State> {
        // Every worker joins the reduction, even when its own update failed
        let local = match self.strategy.get_update(x, fitness, state, params) {
            Ok(local) => local,
            Err(e) => {
                self.reducer.abstain();
                return Err(e);
            }
        };
        let reduced = self.reducer.mean(self.strategy.flatten(&local))?;
        let update = self.strategy.unflatten(reduced)?;
        self.strategy.apply_update(&update, state, params)
    }
}
