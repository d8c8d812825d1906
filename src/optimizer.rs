//! Genetic search for the message that spreads best (or worst).
//!
//! # Algorithm
//!
//! A generational GA with elitism over [`TraitGenome`]s:
//!
//! 1. Start from `population_size` uniform random genomes.
//! 2. Each generation, score every genome with [`SpreadFitness`] and sort the
//!    population best first under the configured [`Objective`].
//! 3. Carry the top `max(1, ⌊N · elitism_rate / 100⌋)` genomes over unchanged.
//! 4. Fill the rest with offspring: two 3-way tournaments pick the parents,
//!    single-point crossover yields two children, and each gene of each child
//!    is replaced with probability `mutation_rate / 100`.
//!
//! The best genome ever seen is kept across generations and replaced only on
//! strict improvement. A [`StopSignal`] checked at the top of every generation
//! ends the search early.
//!
//! # Randomness
//!
//! Search randomness (initial population, selection, crossover, mutation) comes
//! from the caller's RNG. Fitness evaluations use their own PRNG, reseeded
//! identically for every genome, so scores are reproducible and a seeded search
//! RNG makes the whole search reproducible.

use std::cmp::Ordering;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::control::StopSignal;
use crate::engine::RunStatistics;
use crate::error::SpreadResult;
use crate::fitness::{Evaluation, SpreadFitness};
use crate::genome::TraitGenome;
use crate::graph::{Graph, Message};

/// Tournament size used for parent selection.
pub const TOURNAMENT_SIZE: usize = 3;

/// Seed of the fitness PRNG unless configured otherwise.
pub const DEFAULT_FITNESS_SEED: &str = "genetic-algorithm";

/// Direction of the search.
///
/// Parsed leniently: `"maximize"` (any case) selects [`Objective::Maximize`],
/// anything else falls back to [`Objective::Minimize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Objective {
    /// Favour messages that spread widely.
    Maximize,
    /// Favour messages that barely spread.
    #[default]
    Minimize,
}

impl Objective {
    /// Ordering that puts the better of two scores first.
    #[must_use]
    pub fn rank(self, a: f64, b: f64) -> Ordering {
        match self {
            Self::Maximize => b.total_cmp(&a),
            Self::Minimize => a.total_cmp(&b),
        }
    }

    /// Whether `candidate` is strictly better than `incumbent`.
    #[must_use]
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        self.rank(candidate, incumbent) == Ordering::Less
    }
}

impl From<&str> for Objective {
    fn from(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("maximize") {
            Self::Maximize
        } else {
            Self::Minimize
        }
    }
}

impl From<String> for Objective {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Objective> for String {
    fn from(value: Objective) -> Self {
        match value {
            Objective::Maximize => "maximize".to_string(),
            Objective::Minimize => "minimize".to_string(),
        }
    }
}

/// Parameters of a genetic search.
///
/// Rates are percentages. Call [`normalized`](Self::normalized) (done by
/// [`GeneticOptimizer::new`]) to repair degenerate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    /// Genomes per generation.
    pub population_size: usize,
    /// Generations to run.
    pub generations: usize,
    /// Share of the population carried over unchanged, in percent.
    pub elitism_rate: f64,
    /// Per-gene replacement probability, in percent.
    pub mutation_rate: f64,
    /// Simulation ticks per fitness evaluation.
    pub iterations: usize,
    /// Search direction.
    pub objective: Objective,
    /// Id of the node candidate messages are injected at.
    pub origin: String,
    /// Seed of the fitness PRNG.
    pub fitness_seed: String,
    /// Evaluate each generation on the rayon thread pool.
    pub parallel: bool,
    /// Delay after each generation, in milliseconds.
    pub generation_pause_ms: u64,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            generations: 50,
            elitism_rate: 10.0,
            mutation_rate: 5.0,
            iterations: 10,
            objective: Objective::Minimize,
            origin: String::new(),
            fitness_seed: DEFAULT_FITNESS_SEED.to_string(),
            parallel: true,
            generation_pause_ms: 0,
        }
    }
}

impl GeneticConfig {
    /// Default settings searching from `origin`.
    #[must_use]
    pub fn from_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Self::default()
        }
    }

    /// Replace degenerate values: zero population or generations fall back to
    /// the defaults, rates are clamped to `[0, 100]` (NaN falls back too).
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if self.population_size == 0 {
            warn!("population size of zero, using {}", defaults.population_size);
            self.population_size = defaults.population_size;
        }
        if self.generations == 0 {
            warn!("generation count of zero, using {}", defaults.generations);
            self.generations = defaults.generations;
        }
        self.elitism_rate = clamp_rate(self.elitism_rate, defaults.elitism_rate);
        self.mutation_rate = clamp_rate(self.mutation_rate, defaults.mutation_rate);
        self
    }

    /// Number of genomes carried over each generation: at least one, at most
    /// the whole population.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn elite_count(&self) -> usize {
        let n = self.population_size;
        let elites = (n as f64 * self.elitism_rate / 100.0).floor() as usize;
        elites.max(1).min(n)
    }
}

fn clamp_rate(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Summary of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Generation index, starting at 1.
    pub generation: usize,
    /// Best genome of the generation.
    pub best_genome: TraitGenome,
    /// Score of the best genome.
    pub best_score: f64,
    /// Mean score over the generation.
    pub average_score: f64,
    /// Counters of the best genome's evaluation.
    pub stats: RunStatistics,
}

/// Callbacks invoked while a search runs.
///
/// Both methods default to doing nothing. Any `FnMut(&GenerationRecord)`
/// closure is an observer of generations.
pub trait SearchObserver {
    /// Called after each genome is scored, in population order.
    fn on_evaluation(&mut self, _evaluation: &Evaluation) {}

    /// Called after each generation is scored.
    fn on_generation(&mut self, _record: &GenerationRecord) {}
}

impl<F> SearchObserver for F
where
    F: FnMut(&GenerationRecord),
{
    fn on_generation(&mut self, record: &GenerationRecord) {
        self(record);
    }
}

/// An observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SearchObserver for NoopObserver {}

/// Result of a genetic search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// The best message found, or [`Message::invalid`] if nothing was scored.
    pub message: Message,
    /// Score of the best message.
    pub best_score: Option<f64>,
    /// One record per completed generation.
    pub history: Vec<GenerationRecord>,
    /// Counters summed over every evaluation.
    pub stats: RunStatistics,
    /// Whether the stop signal ended the search early.
    pub cancelled: bool,
}

impl SearchOutcome {
    /// Mean of the per-generation average scores, zero without history.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // generation counts are small
    pub fn average_spread(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().map(|r| r.average_score).sum::<f64>() / self.history.len() as f64
    }

    /// Whether a real message was found.
    #[must_use]
    pub fn found(&self) -> bool {
        self.message.is_valid()
    }
}

/// A configured genetic search over one graph.
#[derive(Debug, Clone)]
pub struct GeneticOptimizer {
    config: GeneticConfig,
    fitness: SpreadFitness,
    stop: StopSignal,
}

impl GeneticOptimizer {
    /// Prepare a search over `graph`.
    ///
    /// The configuration is normalized and the graph copied without messages.
    ///
    /// # Errors
    ///
    /// Returns [`SpreadError::NodeNotFound`](crate::SpreadError::NodeNotFound)
    /// if the origin is not a node of `graph`.
    pub fn new(graph: &Graph, config: GeneticConfig) -> SpreadResult<Self> {
        let config = config.normalized();
        let fitness = SpreadFitness::new(graph, &config)?;
        if fitness.reachable_nodes() == 0 {
            warn!(origin = %config.origin, "origin has no followers, every genome will score zero");
        }
        Ok(Self {
            config,
            fitness,
            stop: StopSignal::new(),
        })
    }

    /// Share an existing stop signal instead of the optimizer's own.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Handle that cancels the search before its next generation.
    #[must_use]
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// The normalized configuration.
    #[must_use]
    pub fn config(&self) -> &GeneticConfig {
        &self.config
    }

    /// The fitness function.
    #[must_use]
    pub fn fitness(&self) -> &SpreadFitness {
        &self.fitness
    }

    /// Score every genome, in population order.
    #[must_use]
    pub fn evaluate_population(&self, population: &[TraitGenome]) -> Vec<Evaluation> {
        if self.config.parallel {
            population
                .par_iter()
                .map(|genome| self.fitness.evaluate_detailed(genome))
                .collect()
        } else {
            population
                .iter()
                .map(|genome| self.fitness.evaluate_detailed(genome))
                .collect()
        }
    }

    /// Run the search to completion or cancellation.
    #[allow(clippy::cast_precision_loss)] // population sizes are small
    pub fn run<R: Rng, O: SearchObserver + ?Sized>(
        &self,
        rng: &mut R,
        observer: &mut O,
    ) -> SearchOutcome {
        let objective = self.config.objective;
        let generations = self.config.generations;
        let elites = self.config.elite_count();
        info!(
            origin = self.fitness.origin(),
            population = self.config.population_size,
            generations,
            elites,
            objective = ?objective,
            "genetic search started"
        );

        let mut population: Vec<TraitGenome> = (0..self.config.population_size)
            .map(|_| TraitGenome::random(rng))
            .collect();
        let mut history = Vec::with_capacity(generations);
        let mut best: Option<Evaluation> = None;
        let mut totals = RunStatistics::default();
        let mut cancelled = false;

        for generation in 1..=generations {
            if self.stop.is_stopped() {
                info!(generation, "genetic search cancelled");
                cancelled = true;
                break;
            }

            let mut evaluations = self.evaluate_population(&population);
            for evaluation in &evaluations {
                observer.on_evaluation(evaluation);
                totals.absorb(&evaluation.stats);
            }

            evaluations.sort_by(|a, b| objective.rank(a.score, b.score));
            let Some(&leader) = evaluations.first() else {
                break;
            };
            let average_score =
                evaluations.iter().map(|e| e.score).sum::<f64>() / evaluations.len() as f64;

            let record = GenerationRecord {
                generation,
                best_genome: leader.genome,
                best_score: leader.score,
                average_score,
                stats: leader.stats,
            };
            info!(
                generation,
                best_score = record.best_score,
                average_score,
                "generation complete"
            );
            observer.on_generation(&record);
            history.push(record);

            if best.is_none_or(|b| objective.is_better(leader.score, b.score)) {
                debug!(generation, score = leader.score, "new best genome");
                best = Some(leader);
            }

            if self.config.generation_pause_ms > 0 {
                std::thread::sleep(Duration::from_millis(self.config.generation_pause_ms));
            }
            if generation < generations {
                population = self.breed(&evaluations, elites, rng);
            }
        }

        let message = match &best {
            Some(evaluation) => evaluation.genome.to_message(discovered_message_id(rng)),
            None => Message::invalid(),
        };
        let best_score = best.map(|b| b.score);
        info!(
            message = %message.id,
            best_score = ?best_score,
            sent = totals.sent,
            accepted = totals.accepted,
            rejected = totals.rejected,
            "genetic search finished"
        );

        SearchOutcome {
            message,
            best_score,
            history,
            stats: totals,
            cancelled,
        }
    }

    /// Next generation from a population sorted best first.
    fn breed<R: Rng>(&self, ranked: &[Evaluation], elites: usize, rng: &mut R) -> Vec<TraitGenome> {
        let size = self.config.population_size;
        let probability = self.config.mutation_rate / 100.0;

        let mut next: Vec<TraitGenome> = ranked.iter().take(elites).map(|e| e.genome).collect();
        while next.len() < size {
            let first = tournament(ranked, rng);
            let second = tournament(ranked, rng);
            let (mut a, mut b) = TraitGenome::crossover_pair(first, second, rng);
            a.mutate_genes(rng, probability);
            b.mutate_genes(rng, probability);
            next.push(a);
            if next.len() < size {
                next.push(b);
            }
        }
        next
    }
}

/// Best of [`TOURNAMENT_SIZE`] uniformly sampled contestants.
///
/// `ranked` is sorted best first, so the winner is the lowest sampled index.
fn tournament<'a, R: Rng>(ranked: &'a [Evaluation], rng: &mut R) -> Option<&'a TraitGenome> {
    if ranked.is_empty() {
        return None;
    }
    let winner = (0..TOURNAMENT_SIZE)
        .map(|_| rng.random_range(0..ranked.len()))
        .min()?;
    Some(&ranked[winner].genome)
}

/// `ga-<unix millis>-<9 random base36 chars>`.
fn discovered_message_id<R: Rng>(rng: &mut R) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    let suffix: String = (0..9)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect();
    format!("ga-{millis}-{suffix}")
}

/// Run a search over `graph` with a thread-local search RNG.
///
/// # Errors
///
/// Returns [`SpreadError::NodeNotFound`](crate::SpreadError::NodeNotFound)
/// if the origin is not a node of `graph`.
pub fn run_genetic_search<O: SearchObserver + ?Sized>(
    graph: &Graph,
    config: GeneticConfig,
    observer: &mut O,
) -> SpreadResult<SearchOutcome> {
    let optimizer = GeneticOptimizer::new(graph, config)?;
    Ok(optimizer.run(&mut rand::rng(), observer))
}

/// A search running on a background thread.
#[derive(Debug)]
pub struct SearchHandle {
    stop: StopSignal,
    thread: JoinHandle<SearchOutcome>,
}

impl SearchHandle {
    /// Ask the search to stop before its next generation.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Whether the search thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the search to end and return its outcome.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from the search thread.
    #[must_use]
    pub fn join(self) -> SearchOutcome {
        match self.thread.join() {
            Ok(outcome) => outcome,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}

/// Start a search over `graph` on a background thread.
///
/// The search RNG is seeded from the operating system.
///
/// # Errors
///
/// Returns [`SpreadError::NodeNotFound`](crate::SpreadError::NodeNotFound)
/// if the origin is not a node of `graph`; no thread is started then.
pub fn spawn_genetic_search<O>(
    graph: &Graph,
    config: GeneticConfig,
    mut observer: O,
) -> SpreadResult<SearchHandle>
where
    O: SearchObserver + Send + 'static,
{
    let optimizer = GeneticOptimizer::new(graph, config)?;
    let stop = optimizer.stop_signal();
    let thread = std::thread::spawn(move || {
        let mut rng = ChaCha8Rng::from_os_rng();
        optimizer.run(&mut rng, &mut observer)
    });
    Ok(SearchHandle { stop, thread })
}
