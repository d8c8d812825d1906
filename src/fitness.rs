//! Fitness of a candidate message: how far it spreads through the graph.
//!
//! Every evaluation starts from the same message-free copy of the graph and
//! the same freshly seeded PRNG, injects the candidate at the origin node and
//! runs a fixed number of ticks. The score is the number of times a follower
//! accepted the message.
//!
//! Evaluations share nothing mutable, so any number of them may run
//! concurrently and will produce exactly the results of a sequential run.

use symbios_genetics::Evaluator;

use crate::engine::{step_with_topology, RunStatistics};
use crate::error::{SpreadError, SpreadResult};
use crate::genome::TraitGenome;
use crate::graph::{Graph, NodeKey};
use crate::optimizer::{GeneticConfig, Objective};
use crate::rng::SeededRandom;
use crate::topology::Topology;

/// Id given to the candidate message during evaluation.
const CANDIDATE_MESSAGE_ID: &str = "ga-candidate";

/// Outcome of one fitness evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// The evaluated genome.
    pub genome: TraitGenome,
    /// Accepted count of the simulated run.
    pub score: f64,
    /// Counters of the simulated run.
    pub stats: RunStatistics,
}

/// Simulation-backed fitness function.
#[derive(Debug, Clone)]
pub struct SpreadFitness {
    base: Graph,
    topology: Topology,
    origin: NodeKey,
    origin_id: String,
    iterations: usize,
    seed: String,
    objective: Objective,
}

impl SpreadFitness {
    /// Prepare the fitness function for `graph` under `config`.
    ///
    /// The graph is copied with every queue, log and display state cleared.
    ///
    /// # Errors
    ///
    /// Returns [`SpreadError::NodeNotFound`] if the configured origin is not a
    /// node of `graph`.
    pub fn new(graph: &Graph, config: &GeneticConfig) -> SpreadResult<Self> {
        let mut base = graph.clone();
        base.reset_messages();
        base.reset_states();

        let origin = base
            .node_key(&config.origin)
            .ok_or_else(|| SpreadError::NodeNotFound(config.origin.clone()))?;
        let topology = Topology::from_graph(&base);

        Ok(Self {
            base,
            topology,
            origin,
            origin_id: config.origin.clone(),
            iterations: config.iterations,
            seed: config.fitness_seed.clone(),
            objective: config.objective,
        })
    }

    /// Id of the node candidates are injected at.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin_id
    }

    /// Number of nodes reachable from the origin; an upper bound on the score.
    #[must_use]
    pub fn reachable_nodes(&self) -> usize {
        self.topology.reach(self.origin)
    }

    /// Simulate `genome` and report its score and counters.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // accepted counts are far below 2^52
    pub fn evaluate_detailed(&self, genome: &TraitGenome) -> Evaluation {
        let mut graph = self.base.clone();
        let mut prng = SeededRandom::new(&self.seed);
        let mut stats = RunStatistics::default();

        if let Some(node) = graph.nodes.get_mut(self.origin) {
            node.queue.push_back(genome.to_message(CANDIDATE_MESSAGE_ID));
        }
        for _ in 0..self.iterations {
            step_with_topology(&mut graph, &self.topology, &mut prng, &mut stats);
        }

        tracing::debug!(
            sent = stats.sent,
            accepted = stats.accepted,
            rejected = stats.rejected,
            "genome evaluated"
        );
        Evaluation {
            genome: *genome,
            score: stats.accepted as f64,
            stats,
        }
    }
}

impl Evaluator<TraitGenome> for SpreadFitness {
    /// Fitness oriented so that higher is better under the configured
    /// objective; the raw score is the single objective value.
    #[allow(clippy::cast_possible_truncation)]
    fn evaluate(&self, genotype: &TraitGenome) -> (f32, Vec<f32>, Vec<f32>) {
        let score = self.evaluate_detailed(genotype).score as f32;
        let fitness = match self.objective {
            Objective::Maximize => score,
            Objective::Minimize => -score,
        };
        (fitness, vec![score], vec![])
    }
}
