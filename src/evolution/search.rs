//! Generational search over markup organisms.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::schema::{
    ConfigError, EvolutionConfig, EvolutionOutcome, EvolutionPhase, EvolutionProgress,
    EvolutionStats, EvolutionWarning, FitnessScores, GenerationRecord, Organism, StopReason,
};

use super::behavior::ensure_behavior;
use super::crossover::default_crossovers;
use super::fitness::{FitnessEvaluator, MarkupFitnessEvaluator};
use super::mutation::default_mutations;
use super::registry::{CrossoverOperator, MutationOperator, OperatorRegistry, catch_panic};
use super::rng::EvolutionRng;
use super::selection::TournamentSelection;
use super::store::{
    PatternStore, SimilarityQuery, StoreError, StoredPattern, auto_tags, pattern_id,
    structural_embedding,
};

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("configuration rejected before seeding: {0}")]
    Configuration(#[from] ConfigError),
    #[error("seeding failed: similar-pattern lookup returned {0}")]
    Seeding(#[source] StoreError),
}

/// Evolution engine that runs the search.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    mutations: OperatorRegistry<dyn MutationOperator>,
    crossovers: OperatorRegistry<dyn CrossoverOperator>,
    evaluator: Option<Arc<dyn FitnessEvaluator>>,
    store: Option<Arc<dyn PatternStore>>,
    next_id: Arc<AtomicU64>,
    cancelled: Arc<AtomicBool>,
}

impl EvolutionEngine {
    /// Create an engine with no operators, evaluator or store.
    pub fn new(config: EvolutionConfig) -> Self {
        Self {
            config,
            mutations: OperatorRegistry::new(),
            crossovers: OperatorRegistry::new(),
            evaluator: None,
            store: None,
            next_id: Arc::new(AtomicU64::new(0)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create an engine with the built-in operators and the markup evaluator.
    pub fn with_defaults(config: EvolutionConfig) -> Result<Self, ConfigError> {
        let evaluator = MarkupFitnessEvaluator::new(config.fitness.clone());
        let mut engine = Self::new(config);
        for op in default_mutations() {
            engine.register_mutation_operator(op)?;
        }
        for op in default_crossovers() {
            engine.register_crossover_operator(op)?;
        }
        engine.set_fitness_evaluator(Arc::new(evaluator));
        Ok(engine)
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn register_mutation_operator(
        &mut self,
        operator: Box<dyn MutationOperator>,
    ) -> Result<(), ConfigError> {
        self.mutations.register(operator)
    }

    pub fn register_crossover_operator(
        &mut self,
        operator: Box<dyn CrossoverOperator>,
    ) -> Result<(), ConfigError> {
        self.crossovers.register(operator)
    }

    pub fn set_fitness_evaluator(&mut self, evaluator: Arc<dyn FitnessEvaluator>) {
        self.evaluator = Some(evaluator);
    }

    pub fn set_pattern_store(&mut self, store: Arc<dyn PatternStore>) {
        self.store = Some(store);
    }

    /// Get cancellation handle. Checked before each evaluation phase.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn validate(&self) -> Result<Arc<dyn FitnessEvaluator>, ConfigError> {
        self.config.validate()?;
        if self.mutations.is_empty() {
            return Err(ConfigError::NoMutationOperators);
        }
        if self.crossovers.is_empty() && self.config.crossover_rate > 0.0 {
            return Err(ConfigError::NoCrossoverOperators);
        }
        self.evaluator.clone().ok_or(ConfigError::MissingEvaluator)
    }

    /// Apply the runtime behavior block when configured.
    fn prepare(&self, markup: &str) -> String {
        if self.config.inject_behavior {
            ensure_behavior(markup)
        } else {
            markup.to_string()
        }
    }

    /// Build generation 0: the seed, similar stored patterns, then mutants
    /// of the seed.
    fn seed_population(
        &self,
        seed_markup: &str,
        rng: &mut EvolutionRng,
        failures: &mut u64,
    ) -> Result<Vec<Organism>, EvolutionError> {
        let size = self.config.population_size;
        let seed = Organism::new(self.next_id(), self.prepare(seed_markup));
        let mut population = Vec::with_capacity(size);
        population.push(seed.clone());

        if let Some(store) = &self.store {
            let seeding = &self.config.seeding;
            let query = SimilarityQuery {
                embedding: structural_embedding(&seed.markup),
                pattern_type: seeding.pattern_type.clone(),
                threshold: seeding.similarity_threshold,
                limit: seeding.limit.min(size - 1),
            };
            let similar = store.find_similar(&query).map_err(EvolutionError::Seeding)?;
            log::debug!("seeding with {} similar patterns", similar.len());
            for hit in similar.into_iter().take(size - 1) {
                population.push(Organism::new(self.next_id(), self.prepare(&hit.pattern.markup)));
            }
        }

        while population.len() < size {
            let outcome = self.mutations.mutate(
                &seed.markup,
                self.config.mutation_rate,
                self.config.max_mutation_chain,
                rng,
            );
            *failures += outcome.failures;

            let mut mutant = Organism::new(self.next_id(), self.prepare(&outcome.markup));
            mutant.parent_ids = vec![seed.id];
            mutant.applied_patterns = outcome.applied.into_iter().collect();
            population.push(mutant);
        }

        Ok(population)
    }

    /// Evaluate organisms in parallel. Failures score zero.
    fn evaluate(population: &mut [Organism], evaluator: &dyn FitnessEvaluator) -> u64 {
        population
            .par_iter_mut()
            .map(|organism| match catch_panic(|| evaluator.evaluate(organism)) {
                Ok(Ok(scores)) => {
                    organism.fitness = scores;
                    0
                }
                Ok(Err(err)) => {
                    log::warn!("evaluation of organism {} failed: {err}", organism.id);
                    organism.fitness = FitnessScores::zero();
                    1
                }
                Err(panic) => {
                    log::warn!("evaluation of organism {} panicked: {panic}", organism.id);
                    organism.fitness = FitnessScores::zero();
                    1
                }
            })
            .sum()
    }

    /// Produce two children from one parent pair.
    fn breed(
        &self,
        first: &Organism,
        second: &Organism,
        generation: usize,
        rng: &mut EvolutionRng,
    ) -> (Vec<Organism>, u64) {
        let mut failures = 0;

        let mut children = Vec::with_capacity(2);
        if rng.chance(self.config.crossover_rate) {
            let outcome = self.crossovers.recombine(&first.markup, &second.markup, rng);
            failures += u64::from(outcome.failed);

            // Only an exchange that changed something makes two-parent children.
            if let Some(operator) = outcome.operator {
                let mut lineage = first.applied_patterns.clone();
                lineage.extend(second.applied_patterns.iter().cloned());
                lineage.insert(operator);

                children.extend([outcome.first, outcome.second].into_iter().map(|markup| {
                    Organism {
                        parent_ids: vec![first.id, second.id],
                        applied_patterns: lineage.clone(),
                        ..Organism::new(0, markup)
                    }
                }));
            }
        }
        if children.is_empty() {
            children.extend([first, second].into_iter().map(|parent| Organism {
                parent_ids: vec![parent.id],
                applied_patterns: parent.applied_patterns.clone(),
                ..Organism::new(0, parent.markup.clone())
            }));
        }

        for child in &mut children {
            if rng.chance(self.config.mutation_rate) {
                let outcome = self.mutations.mutate(
                    &child.markup,
                    self.config.mutation_rate,
                    self.config.max_mutation_chain,
                    rng,
                );
                failures += outcome.failures;
                child.markup = outcome.markup;
                child.applied_patterns.extend(outcome.applied);
            }
            child.markup = self.prepare(&child.markup);
            child.generation = generation;
        }

        (children, failures)
    }

    /// Breed `count` offspring from `parents`, pairing them in order. An odd
    /// last parent is paired with the first one.
    fn reproduce(
        &self,
        parents: &[&Organism],
        count: usize,
        generation: usize,
        rng: &mut EvolutionRng,
    ) -> (Vec<Organism>, u64) {
        let pairs: Vec<(&Organism, &Organism)> = parents
            .chunks(2)
            .map(|pair| (pair[0], pair.get(1).copied().unwrap_or(parents[0])))
            .collect();
        let rngs: Vec<EvolutionRng> = pairs.iter().map(|_| rng.fork()).collect();

        let bred: Vec<(Vec<Organism>, u64)> = pairs
            .par_iter()
            .zip(rngs)
            .map(|(&(first, second), mut rng)| self.breed(first, second, generation, &mut rng))
            .collect();

        let mut failures = 0;
        let mut offspring = Vec::with_capacity(count);
        for (children, failed) in bred {
            failures += failed;
            offspring.extend(children);
        }
        offspring.truncate(count);

        // Ids are assigned after the parallel section so they follow pair order.
        for child in &mut offspring {
            child.id = self.next_id();
        }
        (offspring, failures)
    }

    /// Keep the top `elitism_count` organisms and append the offspring.
    fn replace(&self, population: &[Organism], offspring: Vec<Organism>) -> Vec<Organism> {
        let mut ranked: Vec<&Organism> = population.iter().collect();
        ranked.sort_by(|a, b| b.fitness.total.total_cmp(&a.fitness.total));

        let mut next: Vec<Organism> = ranked
            .into_iter()
            .take(self.config.elitism_count)
            .cloned()
            .collect();
        next.extend(offspring);
        next
    }

    fn record(generation: usize, population: &[Organism]) -> GenerationRecord {
        let best_fitness = population
            .iter()
            .map(|o| o.fitness.total)
            .fold(0.0, f32::max);
        let average_fitness = if population.is_empty() {
            0.0
        } else {
            population.iter().map(|o| o.fitness.total).sum::<f32>() / population.len() as f32
        };

        GenerationRecord {
            generation,
            best_fitness,
            average_fitness,
            population_snapshot: population.to_vec(),
        }
    }

    /// Stop check after a generation has been recorded.
    fn should_stop(&self, recorded: usize, best: f32, start: Instant) -> Option<StopReason> {
        if recorded >= self.config.max_generations {
            return Some(StopReason::MaxGenerations);
        }

        if let Some(target) = self.config.fitness_threshold
            && best >= target
        {
            return Some(StopReason::TargetReached);
        }

        if let Some(budget) = self.config.time_budget_secs
            && start.elapsed().as_secs_f64() >= budget
        {
            return Some(StopReason::TimeBudget);
        }

        None
    }

    fn persist(&self, best: &Organism) -> Option<EvolutionWarning> {
        let store = self.store.as_ref()?;
        let pattern = StoredPattern {
            id: pattern_id(&best.markup),
            markup: best.markup.clone(),
            pattern_type: self.config.seeding.pattern_type.clone(),
            embedding: structural_embedding(&best.markup),
            fitness: best.fitness.total,
            generation: best.generation,
            tags: auto_tags(&best.markup, best.fitness.total),
        };

        match store.store(&pattern) {
            Ok(()) => {
                log::info!("stored best organism {} (fitness {:.4})", best.id, best.fitness.total);
                None
            }
            Err(e) => {
                log::warn!("failed to store best organism {}: {e}", best.id);
                Some(EvolutionWarning::PersistenceFailed(e.to_string()))
            }
        }
    }

    /// Run evolution with a progress callback invoked after every recorded
    /// generation and once more when the run ends.
    pub fn evolve_with_callback<F>(
        &self,
        seed_markup: &str,
        mut callback: F,
    ) -> Result<EvolutionOutcome, EvolutionError>
    where
        F: FnMut(&EvolutionProgress),
    {
        let start = Instant::now();
        let evaluator = self.validate()?;

        let random_seed = self.config.random_seed.unwrap_or_else(rand::random);
        let mut rng = EvolutionRng::new(random_seed);
        log::info!(
            "starting evolution: population {}, {} generations, seed {random_seed}",
            self.config.population_size,
            self.config.max_generations
        );

        let mut recovered_failures = 0;
        let mut population = self.seed_population(seed_markup, &mut rng, &mut recovered_failures)?;
        let mut best = population[0].clone();
        let mut history: Vec<GenerationRecord> = Vec::new();
        let mut total_evaluations = 0u64;
        let mut pending = 0;
        let selection = TournamentSelection::new(self.config.tournament_size);
        let offspring_count = self.config.population_size - self.config.elitism_count;

        let stop_reason = loop {
            if self.cancelled.load(Ordering::Relaxed) {
                break StopReason::Cancelled;
            }

            // Elites keep the scores they were recorded with.
            recovered_failures += Self::evaluate(&mut population[pending..], evaluator.as_ref());
            total_evaluations += (population.len() - pending) as u64;

            let generation = history.len();
            let record = Self::record(generation, &population);
            if let Some(top) = population
                .iter()
                .reduce(|a, b| if b.fitness.total > a.fitness.total { b } else { a })
                && (history.is_empty() || top.fitness.total > best.fitness.total)
            {
                best = top.clone();
            }
            log::debug!(
                "generation {generation}: best {:.4}, average {:.4}",
                record.best_fitness,
                record.average_fitness
            );
            history.push(record);

            callback(&EvolutionProgress {
                generation,
                max_generations: self.config.max_generations,
                best_fitness: best.fitness.total,
                generation_best: history[generation].best_fitness,
                average_fitness: history[generation].average_fitness,
                phase: EvolutionPhase::Recording,
            });

            if let Some(reason) = self.should_stop(history.len(), best.fitness.total, start) {
                break reason;
            }

            let parents = selection.select(&population, offspring_count, &mut rng);
            let (offspring, failed) =
                self.reproduce(&parents, offspring_count, generation + 1, &mut rng);
            recovered_failures += failed;

            population = self.replace(&population, offspring);
            pending = self.config.elitism_count;
        };

        let elapsed = start.elapsed().as_secs_f64();
        let final_avg_fitness = history.last().map_or(0.0, |r| r.average_fitness);
        log::info!(
            "evolution stopped ({stop_reason:?}) after {} generations: best {:.4}",
            history.len(),
            best.fitness.total
        );

        let phase = match stop_reason {
            StopReason::MaxGenerations | StopReason::TargetReached => EvolutionPhase::Complete,
            StopReason::TimeBudget | StopReason::Cancelled => EvolutionPhase::Stopped,
        };
        callback(&EvolutionProgress {
            generation: history.len(),
            max_generations: self.config.max_generations,
            best_fitness: best.fitness.total,
            generation_best: history.last().map_or(0.0, |r| r.best_fitness),
            average_fitness: final_avg_fitness,
            phase,
        });

        let mut warnings = Vec::new();
        if self.config.persist_best
            && !history.is_empty()
            && let Some(warning) = self.persist(&best)
        {
            warnings.push(warning);
        }

        Ok(EvolutionOutcome {
            stats: EvolutionStats {
                generations: history.len(),
                total_evaluations,
                best_fitness: best.fitness.total,
                final_avg_fitness,
                elapsed_seconds: elapsed,
                evaluations_per_second: if elapsed > 0.0 {
                    total_evaluations as f64 / elapsed
                } else {
                    0.0
                },
                recovered_failures,
                stop_reason,
            },
            best,
            history,
            warnings,
        })
    }

    /// Run evolution (blocking).
    pub fn evolve(&self, seed_markup: &str) -> Result<EvolutionOutcome, EvolutionError> {
        self.evolve_with_callback(seed_markup, |_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::behavior::RUNTIME_MARKER;
    use crate::evolution::crossover::AttributeCrossover;
    use crate::evolution::fitness::EvaluationError;
    use crate::evolution::store::{InMemoryPatternStore, SimilarPattern};

    const SEED: &str = r#"<div class="container"><p>hi</p></div>"#;

    const ARENA: &str = r##"<div class="arena" style="display: grid; gap: 4px; padding: 8px; background: #102030; color: #fafafa; border-radius: 6px; font-family: monospace; margin: 0 auto"><div class="row" style="display: flex"><div data-evolve-role="player" tabindex="0" onkeydown="move(event)" draggable="true" style="animation: evolve-pulse 1s infinite"></div><span data-evolve-role="score">0</span></div><div data-evolve-role="collectible" data-evolve-on-click="collect" style="animation: evolve-spin 2s infinite"></div><div data-evolve-role="goal" data-evolve-on-hover="highlight" style="transition: transform 0.2s"></div><button data-evolve-on-click="score">Go</button><button onclick="reset()">Reset</button></div>"##;

    fn config(population_size: usize, max_generations: usize) -> EvolutionConfig {
        EvolutionConfig {
            population_size,
            max_generations,
            elitism_count: 1,
            random_seed: Some(42),
            ..Default::default()
        }
    }

    fn engine(config: EvolutionConfig) -> EvolutionEngine {
        EvolutionEngine::with_defaults(config).unwrap()
    }

    struct FailingStore {
        fail_lookup: bool,
    }

    impl PatternStore for FailingStore {
        fn find_similar(&self, _query: &SimilarityQuery) -> Result<Vec<SimilarPattern>, StoreError> {
            if self.fail_lookup {
                Err(StoreError::Unavailable("offline".to_string()))
            } else {
                Ok(Vec::new())
            }
        }

        fn store(&self, _pattern: &StoredPattern) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read-only".to_string()))
        }
    }

    struct PanickingEvaluator;

    impl FitnessEvaluator for PanickingEvaluator {
        fn evaluate(&self, organism: &Organism) -> Result<FitnessScores, EvaluationError> {
            if organism.id % 2 == 0 {
                panic!("evaluator blew up");
            }
            Err(EvaluationError::Failed("nope".to_string()))
        }
    }

    fn parent_of<'a>(history: &'a [GenerationRecord], id: u64) -> &'a Organism {
        history
            .iter()
            .flat_map(|r| r.population_snapshot.iter())
            .find(|o| o.id == id)
            .unwrap()
    }

    #[test]
    fn test_small_run_scenario() {
        let outcome = engine(config(4, 2)).evolve(SEED).unwrap();
        assert_eq!(outcome.history.len(), 2);
        assert_eq!(outcome.stats.generations, 2);
        assert_eq!(outcome.stats.stop_reason, StopReason::MaxGenerations);
        assert!(outcome.best.fitness.total >= 0.0);
        assert!(outcome.best.generation <= 2);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_zero_generations_records_once() {
        let outcome = engine(config(4, 0)).evolve(SEED).unwrap();
        assert_eq!(outcome.history.len(), 1);
    }

    #[test]
    fn test_population_size_is_constant() {
        let outcome = engine(config(7, 4)).evolve(SEED).unwrap();
        for record in &outcome.history {
            assert_eq!(record.population_snapshot.len(), 7);
        }
    }

    #[test]
    fn test_best_fitness_never_decreases_with_elitism() {
        let outcome = engine(config(8, 6)).evolve(SEED).unwrap();
        for pair in outcome.history.windows(2) {
            assert!(pair[1].best_fitness >= pair[0].best_fitness);
        }
        let last = outcome.history.last().unwrap();
        assert_eq!(outcome.best.fitness.total, outcome.stats.best_fitness);
        assert!(outcome.best.fitness.total >= last.best_fitness);
    }

    #[test]
    fn test_threshold_stops_early() {
        let store = InMemoryPatternStore::with_patterns(vec![StoredPattern {
            id: 99,
            markup: ARENA.to_string(),
            pattern_type: "interactive-fragment".to_string(),
            embedding: structural_embedding(ARENA),
            fitness: 0.95,
            generation: 0,
            tags: Vec::new(),
        }]);
        let mut config = config(6, 10);
        config.fitness_threshold = Some(0.8);
        config.seeding.similarity_threshold = 0.0;

        let mut engine = engine(config);
        engine.set_pattern_store(Arc::new(store));
        let outcome = engine.evolve(SEED).unwrap();

        assert_eq!(outcome.stats.stop_reason, StopReason::TargetReached);
        assert!(outcome.history.len() < 10);
        assert!(outcome.best.fitness.total >= 0.8);
    }

    #[test]
    fn test_mutation_only_offspring_differ_from_parent() {
        let mut config = config(6, 2);
        config.mutation_rate = 1.0;
        config.crossover_rate = 0.0;
        let outcome = engine(config).evolve(SEED).unwrap();

        let offspring: Vec<_> = outcome.history[1]
            .population_snapshot
            .iter()
            .filter(|o| o.generation == 1)
            .collect();
        assert_eq!(offspring.len(), 5);
        for child in offspring {
            assert_eq!(child.parent_ids.len(), 1);
            let parent = parent_of(&outcome.history, child.parent_ids[0]);
            assert_ne!(child.markup, parent.markup);
        }
    }

    #[test]
    fn test_crossover_offspring_mix_both_parents() {
        let names = ["single-point", "attribute", "subtree", "interaction"];
        for seed in 0..6 {
            let mut config = config(8, 2);
            config.mutation_rate = 0.0;
            config.crossover_rate = 1.0;
            config.random_seed = Some(seed);
            let outcome = engine(config).evolve(SEED).unwrap();

            let offspring: Vec<_> = outcome.history[1]
                .population_snapshot
                .iter()
                .filter(|o| o.generation == 1)
                .collect();
            assert_eq!(offspring.len(), 7);
            for child in offspring {
                assert_eq!(child.parent_ids.len(), 2, "seed {seed}");
                for &id in &child.parent_ids {
                    let parent = parent_of(&outcome.history, id);
                    assert_ne!(child.markup, parent.markup, "seed {seed}");
                }
                let crossovers = child
                    .applied_patterns
                    .iter()
                    .filter(|p| names.contains(&p.as_str()))
                    .count();
                assert_eq!(crossovers, 1, "seed {seed}");
            }
        }
    }

    #[test]
    fn test_identical_parents_pass_through_without_crossover() {
        let mut config = config(4, 1);
        config.mutation_rate = 0.0;
        config.crossover_rate = 1.0;
        let mut engine = EvolutionEngine::new(config);
        for op in default_mutations() {
            engine.register_mutation_operator(op).unwrap();
        }
        engine.register_crossover_operator(Box::new(AttributeCrossover::default())).unwrap();

        // Swapping an element's class with an identical copy changes nothing.
        let parent = Organism::new(0, SEED);
        let mut rng = EvolutionRng::new(1);
        let (children, failures) = engine.breed(&parent, &parent, 1, &mut rng);
        assert_eq!(failures, 0);
        for child in children {
            assert_eq!(child.parent_ids, vec![0]);
            assert!(child.applied_patterns.is_empty());
        }
    }

    #[test]
    fn test_behavior_block_on_every_organism() {
        let outcome = engine(config(5, 3)).evolve(SEED).unwrap();
        for organism in outcome.history.iter().flat_map(|r| &r.population_snapshot) {
            assert_eq!(organism.markup.matches(RUNTIME_MARKER).count(), 1);
        }
    }

    #[test]
    fn test_same_seed_same_run() {
        let a = engine(config(6, 3)).evolve(SEED).unwrap();
        let b = engine(config(6, 3)).evolve(SEED).unwrap();
        assert_eq!(a.best.markup, b.best.markup);
        let fa: Vec<f32> = a.history.iter().map(|r| r.best_fitness).collect();
        let fb: Vec<f32> = b.history.iter().map(|r| r.best_fitness).collect();
        assert_eq!(fa, fb);
    }

    #[test]
    fn test_missing_evaluator_is_rejected() {
        let mut engine = EvolutionEngine::new(config(4, 2));
        for op in default_mutations() {
            engine.register_mutation_operator(op).unwrap();
        }
        for op in default_crossovers() {
            engine.register_crossover_operator(op).unwrap();
        }
        assert!(matches!(
            engine.evolve(SEED),
            Err(EvolutionError::Configuration(ConfigError::MissingEvaluator))
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = config(4, 2);
        config.elitism_count = 4;
        assert!(matches!(
            engine(config).evolve(SEED),
            Err(EvolutionError::Configuration(ConfigError::ElitismTooLarge { .. }))
        ));
    }

    #[test]
    fn test_seeding_failure_aborts() {
        let mut engine = engine(config(4, 2));
        engine.set_pattern_store(Arc::new(FailingStore { fail_lookup: true }));
        let err = engine.evolve(SEED).unwrap_err();
        assert!(matches!(err, EvolutionError::Seeding(_)));
        assert!(err.to_string().contains("seeding"));
    }

    #[test]
    fn test_persistence_failure_is_a_warning() {
        let mut engine = engine(config(4, 1));
        engine.set_pattern_store(Arc::new(FailingStore { fail_lookup: false }));
        let outcome = engine.evolve(SEED).unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert!(matches!(
            outcome.warnings[0],
            EvolutionWarning::PersistenceFailed(_)
        ));
    }

    #[test]
    fn test_best_is_persisted() {
        let store = Arc::new(InMemoryPatternStore::new());
        let mut engine = engine(config(4, 2));
        engine.set_pattern_store(store.clone());
        let outcome = engine.evolve(SEED).unwrap();

        let stored = store.patterns().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].markup, outcome.best.markup);
    }

    #[test]
    fn test_runs_sharing_a_store_keep_their_patterns() {
        let store = Arc::new(InMemoryPatternStore::new());
        let seeds = [SEED, r#"<section><button>go</button><span>0</span></section>"#];
        let mut best = Vec::new();
        // Each engine numbers its organisms from zero.
        for seed in seeds {
            let mut engine = engine(config(4, 1));
            engine.set_pattern_store(store.clone());
            best.push(engine.evolve(seed).unwrap().best);
        }
        assert_ne!(best[0].markup, best[1].markup);

        let stored = store.patterns().unwrap();
        assert_eq!(stored.len(), 2);
        for organism in &best {
            let kept = stored.iter().find(|p| p.markup == organism.markup).unwrap();
            assert_eq!(kept.id, pattern_id(&organism.markup));
        }
    }

    #[test]
    fn test_failing_evaluator_is_recovered() {
        let mut engine = engine(config(4, 2));
        engine.set_fitness_evaluator(Arc::new(PanickingEvaluator));
        let outcome = engine.evolve(SEED).unwrap();
        assert!(outcome.stats.recovered_failures >= 4);
        assert_eq!(outcome.best.fitness, FitnessScores::zero());
    }

    #[test]
    fn test_cancellation() {
        let engine = engine(config(4, 100));
        engine.cancel_handle().store(true, Ordering::Relaxed);
        let outcome = engine.evolve(SEED).unwrap();
        assert_eq!(outcome.stats.stop_reason, StopReason::Cancelled);
        assert!(outcome.history.is_empty());
        assert!(outcome.best.markup.contains("container"));
    }

    #[test]
    fn test_callback_sees_every_generation() {
        let mut seen = Vec::new();
        engine(config(4, 3))
            .evolve_with_callback(SEED, |p| seen.push((p.generation, p.phase)))
            .unwrap();
        assert_eq!(
            seen,
            vec![
                (0, EvolutionPhase::Recording),
                (1, EvolutionPhase::Recording),
                (2, EvolutionPhase::Recording),
                (3, EvolutionPhase::Complete),
            ]
        );
    }
}
