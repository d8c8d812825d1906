//! Benchmarks for symbios-spread.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use symbios_genetics::Genotype;
use symbios_spread::engine::step_with_topology;
use symbios_spread::{
    compatibility_score, Direction, GeneticConfig, GeneticOptimizer, Graph, Message, NoopObserver,
    Objective, RunStatistics, SeededRandom, SpreadFitness, Topology, TraitGenome, TraitProfile,
    TraitVector,
};

/// Ring lattice of `size` nodes, each following its next `degree` neighbours.
fn lattice(size: usize, degree: usize, rng: &mut ChaCha8Rng) -> Graph {
    let mut graph = Graph::new();
    for i in 0..size {
        let profile = TraitProfile::new(TraitVector::random(rng), TraitVector::random(rng));
        graph.add_node(format!("n{i}"), profile).unwrap();
    }
    for i in 0..size {
        for d in 1..=degree {
            graph
                .add_link(&format!("n{i}"), &format!("n{}", (i + d) % size))
                .unwrap();
        }
    }
    graph
}

fn bench_prng(c: &mut Criterion) {
    c.bench_function("seeded_random_next_f64", |b| {
        let mut prng = SeededRandom::new("bench");
        b.iter(|| black_box(prng.next_f64()));
    });
}

fn bench_compatibility(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let profile = TraitProfile::new(TraitVector::random(&mut rng), TraitVector::random(&mut rng));
    let message = TraitVector::random(&mut rng);

    c.bench_function("compatibility_score", |b| {
        b.iter(|| black_box(compatibility_score(&profile, &message, Direction::Out)));
    });
}

fn bench_topology(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let graph = lattice(200, 4, &mut rng);

    c.bench_function("topology_from_graph_200", |b| {
        b.iter(|| black_box(Topology::from_graph(&graph)));
    });
}

fn bench_diffusion(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut graph = lattice(200, 4, &mut rng);
    for i in (0..200).step_by(20) {
        graph
            .insert_message(
                &format!("n{i}"),
                Message::new(format!("m{i}"), TraitVector::random(&mut rng)),
            )
            .unwrap();
    }
    let topology = Topology::from_graph(&graph);

    c.bench_function("diffusion_to_quiescence_200", |b| {
        b.iter(|| {
            let mut g = graph.clone();
            let mut prng = SeededRandom::new("bench");
            let mut stats = RunStatistics::default();
            while !g.is_quiescent() {
                step_with_topology(&mut g, &topology, &mut prng, &mut stats);
            }
            black_box(stats)
        });
    });
}

fn bench_fitness(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let graph = lattice(100, 3, &mut rng);
    let fitness = SpreadFitness::new(&graph, &GeneticConfig::from_origin("n0")).unwrap();
    let genome = TraitGenome::random(&mut rng);

    c.bench_function("fitness_evaluation_100", |b| {
        b.iter(|| black_box(fitness.evaluate_detailed(&genome)));
    });
}

fn bench_genetic_operators(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let parent1 = TraitGenome::random(&mut rng);
    let parent2 = TraitGenome::random(&mut rng);

    c.bench_function("genome_crossover", |b| {
        b.iter(|| black_box(parent1.crossover(&parent2, &mut rng)));
    });

    c.bench_function("genome_mutation", |b| {
        let mut g = parent1;
        b.iter(|| {
            g.mutate(&mut rng, 0.05);
            black_box(&g);
        });
    });
}

fn bench_search(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let graph = lattice(60, 3, &mut rng);
    let config = GeneticConfig {
        population_size: 20,
        generations: 5,
        objective: Objective::Maximize,
        ..GeneticConfig::from_origin("n0")
    };
    let optimizer = GeneticOptimizer::new(&graph, config).unwrap();

    c.bench_function("genetic_search_20x5", |b| {
        b.iter(|| black_box(optimizer.run(&mut rng, &mut NoopObserver)));
    });
}

criterion_group!(
    benches,
    bench_prng,
    bench_compatibility,
    bench_topology,
    bench_diffusion,
    bench_fitness,
    bench_genetic_operators,
    bench_search,
);
criterion_main!(benches);
