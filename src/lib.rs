//! # Symbios Spread
//!
//! Deterministic message diffusion over trait-weighted social graphs, and a
//! genetic search for the message that spreads the most (or the least).
//!
//! ## Features
//!
//! - **Reproducible Simulation**: A string-seeded linear congruential PRNG drives
//!   every probabilistic decision, in a fixed order, so a seed replays exactly
//! - **Directional Trait Profiles**: Each node has an outgoing profile (what it
//!   relays) and an incoming profile (what it accepts) over ten trait keys
//! - **Arena-Graph Model**: `SlotMap` storage for nodes and links; snapshots are a
//!   clone away and serialize with Serde
//! - **Genotype Trait**: [`TraitGenome`] implements `symbios_genetics::Genotype`,
//!   and [`SpreadFitness`] implements `symbios_genetics::Evaluator`
//! - **Parallel Fitness**: Generations are scored on the rayon pool with results
//!   identical to a sequential run
//!
//! ## Quick Start
//!
//! ```rust
//! use symbios_spread::{
//!     DiffusionEngine, Graph, Message, NullSink, SimulationConfig, TraitProfile, TraitVector,
//! };
//!
//! let mut graph = Graph::new();
//! let profile = TraitProfile::symmetric(TraitVector::splat(0.5));
//! graph.add_node("alice", profile).unwrap();
//! graph.add_node("bob", profile).unwrap();
//! graph.add_link("alice", "bob").unwrap();
//! graph
//!     .insert_message("alice", Message::new("hello", TraitVector::splat(0.5)))
//!     .unwrap();
//!
//! let mut engine = DiffusionEngine::new(graph, SimulationConfig::seeded("demo"));
//! let completion = engine.run_to_completion(&mut NullSink);
//! assert!(completion.finished);
//! assert_eq!(engine.stats().accepted, 1);
//! ```
//!
//! ## Searching for a Message
//!
//! ```rust
//! use symbios_spread::{run_genetic_search, GeneticConfig, Graph, NoopObserver, Objective};
//! use symbios_spread::{TraitProfile, TraitVector};
//!
//! let mut graph = Graph::new();
//! let profile = TraitProfile::symmetric(TraitVector::splat(0.3));
//! for id in ["hub", "a", "b"] {
//!     graph.add_node(id, profile).unwrap();
//! }
//! graph.add_link("hub", "a").unwrap();
//! graph.add_link("hub", "b").unwrap();
//!
//! let config = GeneticConfig {
//!     population_size: 10,
//!     generations: 5,
//!     objective: Objective::Maximize,
//!     ..GeneticConfig::from_origin("hub")
//! };
//! let outcome = run_genetic_search(&graph, config, &mut NoopObserver).unwrap();
//! assert!(outcome.found());
//! assert_eq!(outcome.history.len(), 5);
//! ```
//!
//! ## Architecture
//!
//! ### Propagation Model
//!
//! Messages flow along links from source to target. Each tick, every node with
//! a pending message dequeues one and relays it with probability equal to its
//! outgoing compatibility with the message; each follower then accepts it with
//! probability equal to its incoming compatibility. Compatibility is one minus
//! the mean absolute trait difference, floored at zero. See [`engine`].
//!
//! ### Fitness
//!
//! A candidate message is scored by injecting it at the origin node of a
//! message-free copy of the graph and running a fixed number of ticks under a
//! PRNG reseeded identically for every candidate. The score is the number of
//! acceptances. See [`fitness`] and [`optimizer`].
//!
//! ### Logging
//!
//! The crate emits `tracing` events and never installs a subscriber.

pub mod compat;
pub mod control;
pub mod engine;
pub mod error;
pub mod fitness;
pub mod genome;
pub mod graph;
pub mod optimizer;
pub mod rng;
pub mod topology;
pub mod traits;

// Re-exports for convenience
pub use compat::{compatibility, compatibility_score};
pub use control::StopSignal;
pub use engine::{
    run_diffusion_step, run_diffusion_to_completion, Completion, DiffusionEngine, EngineStatus,
    NullSink, PresentationSink, RunStatistics, SimulationConfig, Snapshot, StepReport, TickFrame,
};
pub use error::{SpreadError, SpreadResult};
pub use fitness::{Evaluation, SpreadFitness};
pub use genome::TraitGenome;
pub use graph::{
    Graph, Link, LinkKey, LinkState, Message, MessageId, Node, NodeKey, NodeState,
    INVALID_MESSAGE_ID,
};
pub use optimizer::{
    run_genetic_search, spawn_genetic_search, GenerationRecord, GeneticConfig, GeneticOptimizer,
    NoopObserver, Objective, SearchHandle, SearchObserver, SearchOutcome,
};
pub use rng::SeededRandom;
pub use topology::Topology;
pub use traits::{Direction, TraitKey, TraitProfile, TraitVector, TRAIT_COUNT};
