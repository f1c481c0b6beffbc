//! Parent selection.

use rand::{Rng, RngCore};

use crate::schema::Organism;

/// Tournament selection with replacement.
#[derive(Debug, Clone, Copy)]
pub struct TournamentSelection {
    pub size: usize,
}

impl TournamentSelection {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    /// Run `count` tournaments. Each draws `size` contestants uniformly with
    /// replacement and keeps the highest total fitness; the first contestant
    /// drawn wins ties.
    pub fn select<'a>(
        &self,
        population: &'a [Organism],
        count: usize,
        rng: &mut dyn RngCore,
    ) -> Vec<&'a Organism> {
        if population.is_empty() {
            return Vec::new();
        }
        (0..count)
            .map(|_| {
                let mut winner = &population[rng.gen_range(0..population.len())];
                for _ in 1..self.size {
                    let contestant = &population[rng.gen_range(0..population.len())];
                    if contestant.fitness.total > winner.fitness.total {
                        winner = contestant;
                    }
                }
                winner
            })
            .collect()
    }
}
