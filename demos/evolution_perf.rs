//! Quick evolution performance test

use markup_evolution::{EvolutionConfig, EvolutionEngine};
use std::time::Instant;

const SEED: &str = r#"<div class="container"><p>hi</p></div>"#;

fn main() {
    println!("=== Evolution Performance Test ===\n");

    // Test different mutation chain lengths
    for chain in [1, 3, 5, 8] {
        println!("Mutation chain limit: {}", chain);

        let config = EvolutionConfig {
            population_size: 20,
            max_generations: 10,
            mutation_rate: 0.6,
            crossover_rate: 0.8,
            elitism_count: 2,
            tournament_size: 3,
            max_mutation_chain: chain,
            persist_best: false,
            random_seed: Some(42),
            ..Default::default()
        };

        let start = Instant::now();
        let engine = match EvolutionEngine::with_defaults(config) {
            Ok(engine) => engine,
            Err(e) => {
                eprintln!("  Invalid configuration: {}", e);
                continue;
            }
        };
        let outcome = match engine.evolve(SEED) {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("  Evolution failed: {}", e);
                continue;
            }
        };
        let elapsed = start.elapsed();

        let total_evals = outcome.stats.total_evaluations;
        let evals_per_sec = total_evals as f64 / elapsed.as_secs_f64();

        println!("  Generations:    {}", outcome.stats.generations);
        println!("  Evaluations:    {}", total_evals);
        println!("  Elapsed:        {:.2}s", elapsed.as_secs_f64());
        println!("  Evals/sec:      {:.1}", evals_per_sec);
        println!("  Best fitness:   {:.4}", outcome.stats.best_fitness);
        println!("  Best size:      {} bytes", outcome.best.markup.len());
        println!();
    }

    println!("=== Scalability Test ===\n");

    // Test different population sizes
    for pop_size in [10, 20, 40, 80] {
        let config = EvolutionConfig {
            population_size: pop_size,
            max_generations: 5,
            persist_best: false,
            random_seed: Some(42),
            ..Default::default()
        };

        let start = Instant::now();
        let outcome = match EvolutionEngine::with_defaults(config).map(|e| e.evolve(SEED)) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                eprintln!("Population {}: evolution failed: {}", pop_size, e);
                continue;
            }
            Err(e) => {
                eprintln!("Population {}: invalid configuration: {}", pop_size, e);
                continue;
            }
        };
        let elapsed = start.elapsed();

        let total_evals = outcome.stats.total_evaluations;
        let evals_per_sec = total_evals as f64 / elapsed.as_secs_f64();

        println!(
            "Population {}: {} evals in {:.2}s ({:.1} evals/sec)",
            pop_size,
            total_evals,
            elapsed.as_secs_f64(),
            evals_per_sec
        );
    }
}
