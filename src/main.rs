//! Markup Evolution CLI - Evolve a markup fragment from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use markup_evolution::{
    evolution::{EvolutionEngine, JsonDirPatternStore},
    schema::{EvolutionConfig, EvolutionWarning},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let mut args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--example") {
        print_example_config();
        return;
    }

    let store_dir = match args.iter().position(|a| a == "--store") {
        Some(i) if i + 1 < args.len() => {
            let dir = args.remove(i + 1);
            args.remove(i);
            Some(PathBuf::from(dir))
        }
        Some(_) => {
            eprintln!("--store needs a directory");
            std::process::exit(1);
        }
        None => None,
    };

    if args.len() < 2 {
        eprintln!("Usage: {} <seed.html> [config.json] [--store <dir>]", args[0]);
        eprintln!();
        eprintln!("Evolve a markup fragment toward an interactive mini-application.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  seed.html      Seed fragment");
        eprintln!("  config.json    Evolution configuration (default: built-in defaults)");
        eprintln!("  --store <dir>  JSON pattern directory used for seeding and persistence");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    let seed_path = PathBuf::from(&args[1]);
    let seed = fs::read_to_string(&seed_path).unwrap_or_else(|e| {
        eprintln!("Error reading seed file: {}", e);
        std::process::exit(1);
    });

    let config: EvolutionConfig = match args.get(2) {
        Some(path) => {
            let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error reading config file: {}", e);
                std::process::exit(1);
            });
            serde_json::from_str(&config_str).unwrap_or_else(|e| {
                eprintln!("Error parsing config: {}", e);
                std::process::exit(1);
            })
        }
        None => EvolutionConfig::default(),
    };

    println!("Markup Evolution");
    println!("================");
    println!("Population: {}", config.population_size);
    println!("Generations: {}", config.max_generations);
    println!(
        "Rates: mutation {:.2}, crossover {:.2}",
        config.mutation_rate, config.crossover_rate
    );
    println!();

    let mut engine = EvolutionEngine::with_defaults(config).unwrap_or_else(|e| {
        eprintln!("Error building engine: {}", e);
        std::process::exit(1);
    });

    if let Some(dir) = store_dir {
        let store = JsonDirPatternStore::open(&dir).unwrap_or_else(|e| {
            eprintln!("Error opening pattern store {}: {}", dir.display(), e);
            std::process::exit(1);
        });
        engine.set_pattern_store(Arc::new(store));
    }

    let outcome = engine
        .evolve_with_callback(&seed, |progress| {
            println!(
                "  Generation {}/{}: best={:.4}, gen best={:.4}, avg={:.4} ({:?})",
                progress.generation,
                progress.max_generations,
                progress.best_fitness,
                progress.generation_best,
                progress.average_fitness,
                progress.phase
            );
        })
        .unwrap_or_else(|e| {
            eprintln!("Evolution failed: {}", e);
            std::process::exit(1);
        });

    for warning in &outcome.warnings {
        match warning {
            EvolutionWarning::PersistenceFailed(reason) => {
                eprintln!("Warning: best organism not stored: {}", reason);
            }
        }
    }

    let stats = &outcome.stats;
    println!();
    println!("Stopped: {:?}", stats.stop_reason);
    println!("Generations: {}", stats.generations);
    println!("Best fitness: {:.4}", stats.best_fitness);
    println!("Final average: {:.4}", stats.final_avg_fitness);
    println!("Recovered failures: {}", stats.recovered_failures);
    println!(
        "Time: {:.2}s ({:.1} evaluations/s)",
        stats.elapsed_seconds, stats.evaluations_per_second
    );

    let out_path = seed_path.with_extension("evolved.html");
    if let Err(e) = fs::write(&out_path, &outcome.best.markup) {
        eprintln!("Error writing {}: {}", out_path.display(), e);
        std::process::exit(1);
    }
    println!("Best organism written to {}", out_path.display());
}

fn print_example_config() {
    let config = EvolutionConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}
