//! Find the message that spreads furthest through a small community, then
//! replay it in the interactive engine.
//!
//! Run with: `cargo run --example optimize_spread`
//!
//! Set `RUST_LOG=symbios_spread=debug` for per-tick logging.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use symbios_genetics::{algorithms::simple::SimpleGA, Evolver};
use symbios_spread::{
    DiffusionEngine, GenerationRecord, GeneticConfig, GeneticOptimizer, Graph, Objective,
    SimulationConfig, SpreadFitness, TickFrame, TraitGenome, TraitProfile, TraitVector,
};
use tracing_subscriber::EnvFilter;

/// Two loosely connected clusters of twelve nodes each.
fn build_community(rng: &mut ChaCha8Rng) -> Graph {
    let mut graph = Graph::new();
    for cluster in 0..2 {
        let centre = TraitVector::random(rng);
        for i in 0..12 {
            let mut outgoing = centre;
            let mut incoming = centre;
            for value in outgoing.as_mut_slice().iter_mut().chain(incoming.as_mut_slice()) {
                *value = (*value + (rng.random::<f64>() - 0.5) * 0.4).clamp(0.0, 1.0);
            }
            graph
                .add_node(format!("c{cluster}-{i}"), TraitProfile::new(outgoing, incoming))
                .unwrap();
        }
        for i in 0..12 {
            for offset in [1, 2, 5] {
                let target = format!("c{cluster}-{}", (i + offset) % 12);
                graph.add_link(&format!("c{cluster}-{i}"), &target).unwrap();
            }
        }
    }
    graph.add_link("c0-0", "c1-0").unwrap();
    graph.add_link("c1-6", "c0-6").unwrap();
    graph
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("symbios_spread=info")),
        )
        .init();

    println!("Spread Optimization Example");
    println!("===========================\n");

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let graph = build_community(&mut rng);
    println!("Nodes: {}, links: {}", graph.node_count(), graph.link_count());

    let config = GeneticConfig {
        population_size: 40,
        generations: 30,
        mutation_rate: 10.0,
        objective: Objective::Maximize,
        ..GeneticConfig::from_origin("c0-3")
    };
    let optimizer = GeneticOptimizer::new(&graph, config.clone()).unwrap();
    println!(
        "Reachable from {}: {}\n",
        optimizer.fitness().origin(),
        optimizer.fitness().reachable_nodes()
    );

    let mut observer = |record: &GenerationRecord| {
        if record.generation % 5 == 0 || record.generation == 1 {
            println!(
                "Gen {:3}: best={:.1}, avg={:.2}, best accepted={}",
                record.generation, record.best_score, record.average_score, record.stats.accepted
            );
        }
    };
    let outcome = optimizer.run(&mut rng, &mut observer);

    println!("\nSearch Complete!");
    println!("================");
    println!("Message: {}", outcome.message.id);
    println!("Best spread: {:?}", outcome.best_score);
    println!("Average spread: {:.2}", outcome.average_spread());
    for (key, value) in outcome.message.traits.labelled() {
        println!("  {:<4} {:.3}", key.label(), value);
    }

    // The same fitness function plugs into any symbios-genetics algorithm
    let fitness = SpreadFitness::new(&graph, &config).unwrap();
    let initial: Vec<TraitGenome> = (0..40).map(|_| TraitGenome::random(&mut rng)).collect();
    let mut ga = SimpleGA::new(initial, 0.1, 4, 42);
    for _ in 0..30 {
        ga.step(&fitness);
    }
    let simple_best = ga
        .population()
        .iter()
        .map(|p| p.fitness)
        .fold(f32::NEG_INFINITY, f32::max);
    println!("\nSimpleGA best spread: {simple_best:.1}");

    // Replay the winner interactively
    println!("\nReplay:");
    let mut replay = graph;
    replay
        .insert_message(&config.origin, outcome.message.clone())
        .unwrap();
    let mut engine = DiffusionEngine::new(replay, SimulationConfig::seeded("replay"));
    let completion = engine.run_to_completion(&mut |frame: &TickFrame<'_>| {
        println!(
            "  tick {:2}: relayed={}, accepted={}, rejected={}",
            frame.tick,
            frame.report.relayed,
            frame.report.stats.accepted,
            frame.report.stats.rejected
        );
    });
    println!(
        "Finished after {} ticks: sent={}, accepted={}, rejected={}",
        completion.ticks,
        engine.stats().sent,
        engine.stats().accepted,
        engine.stats().rejected
    );
}
