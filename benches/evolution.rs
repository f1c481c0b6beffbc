//! Benchmarks for markup evolution.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use markup_evolution::{
    Document, EvolutionConfig, EvolutionEngine, Organism,
    evolution::{
        EvolutionRng, FitnessEvaluator, MarkupFitnessEvaluator, MutationOperator, Operator,
        default_mutations,
    },
};

const SEED: &str = r#"<div class="container"><p>hi</p></div>"#;

/// A fragment with `rows` rows of interactive game elements.
fn grown_fragment(rows: usize) -> String {
    let row = r#"<div class="row" style="display: flex; gap: 4px"><button data-evolve-on-click="score">+</button><div data-evolve-role="collectible" style="animation: evolve-spin 2s infinite"></div></div>"#;
    format!(r#"<div class="arena">{}</div>"#, row.repeat(rows))
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for rows in [1, 10, 100] {
        let markup = grown_fragment(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &markup, |b, markup| {
            b.iter(|| Document::parse(black_box(markup)));
        });
    }

    group.finish();
}

fn bench_fitness(c: &mut Criterion) {
    let mut group = c.benchmark_group("fitness");
    let evaluator = MarkupFitnessEvaluator::default();

    for rows in [1, 10, 100] {
        let organism = Organism::new(0, grown_fragment(rows));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &organism, |b, organism| {
            b.iter(|| evaluator.evaluate(black_box(organism)));
        });
    }

    group.finish();
}

fn bench_mutation(c: &mut Criterion) {
    let mut group = c.benchmark_group("mutation");
    let markup = grown_fragment(10);

    for op in default_mutations() {
        let mut rng = EvolutionRng::new(42);
        group.bench_function(op.name().to_string(), |b| {
            b.iter(|| op.apply(black_box(&markup), &mut rng));
        });
    }

    group.finish();
}

fn bench_generations(c: &mut Criterion) {
    let mut group = c.benchmark_group("evolve");
    group.sample_size(10);

    for population_size in [10, 40] {
        let config = EvolutionConfig {
            population_size,
            max_generations: 5,
            persist_best: false,
            random_seed: Some(42),
            ..Default::default()
        };
        let Ok(engine) = EvolutionEngine::with_defaults(config) else {
            continue;
        };

        group.bench_with_input(
            BenchmarkId::from_parameter(population_size),
            &population_size,
            |b, _| {
                b.iter(|| engine.evolve(black_box(SEED)));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_parse,
    bench_fitness,
    bench_mutation,
    bench_generations
);
criterion_main!(benches);
