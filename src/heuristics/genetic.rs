//! Genetic and memetic engines.
//!
//! The generational loop follows the classic scheme: seed, evaluate,
//! select, recombine, mutate, replace with elitism. The memetic engine is
//! the same loop with one extra step: every offspring is refined to a local
//! optimum by one of the local search operators.
//!
//! All randomness flows through a single `ChaCha8Rng` seeded from the
//! configuration, and the crossover/mutation operators take the random
//! source as an explicit argument, so a fixed seed reproduces a run
//! exactly.

use crate::heuristics::construction::{ConstructionHeuristic, NearestNeighbor};
use crate::heuristics::local_search::OperatorKind;
use crate::instance::TspInstance;
use crate::tour::Tour;

use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// A tour with its fitness. Lower cost means higher fitness.
#[derive(Debug, Clone)]
pub struct Individual {
    pub tour: Tour,
    pub fitness: f64,
}

impl Individual {
    pub fn new(tour: Tour) -> Self {
        let fitness = -tour.cost();
        Individual { tour, fitness }
    }

    pub fn cost(&self) -> f64 {
        self.tour.cost()
    }
}

/// Parent selection schemes. Both are stochastic and can re-select the
/// same individual for several pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionType {
    Tournament,
    RouletteWheel,
}

/// Permutation crossover operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossoverType {
    /// Order Crossover (OX).
    Order,
    /// Partially Mapped Crossover (PMX).
    PartiallyMapped,
}

/// Permutation mutation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    /// Exchange two random positions.
    Swap,
    /// Reverse a random segment.
    Inversion,
    /// Remove one city and reinsert it elsewhere.
    Shift,
}

/// How the memetic engine picks the refinement operator for an offspring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinementChoice {
    /// The same operator for the whole run.
    Fixed(OperatorKind),
    /// An operator drawn uniformly per offspring.
    RandomPerOffspring,
}

/// Evolutionary engine configuration.
#[derive(Debug, Clone)]
pub struct GaConfig {
    /// Population size, constant across generations.
    pub population_size: usize,
    /// Hard generation limit.
    pub max_generations: usize,
    /// Stop after this many generations without a new global best.
    pub max_no_improve: usize,
    /// Probability of recombining a parent pair.
    pub crossover_prob: f64,
    /// Per-offspring mutation probability.
    pub mutation_prob: f64,
    /// Best individuals carried unmutated into the next generation.
    pub elite_count: usize,
    /// Participants per tournament.
    pub tournament_size: usize,
    pub selection_type: SelectionType,
    pub crossover_type: CrossoverType,
    pub mutation_type: MutationType,
    /// Seed of the run's random source.
    pub seed: u64,
}

impl Default for GaConfig {
    fn default() -> Self {
        GaConfig {
            population_size: 100,
            max_generations: 500,
            max_no_improve: 100,
            crossover_prob: 0.9,
            mutation_prob: 0.05,
            elite_count: 10,
            tournament_size: 5,
            selection_type: SelectionType::Tournament,
            crossover_type: CrossoverType::Order,
            mutation_type: MutationType::Inversion,
            seed: 42,
        }
    }
}

/// Order Crossover: copy a contiguous segment from the first parent, then
/// fill the remaining positions circularly with the second parent's order,
/// skipping cities already present.
pub fn order_crossover<R: Rng>(parent1: &[usize], parent2: &[usize], rng: &mut R) -> Vec<usize> {
    let n = parent1.len();
    if n < 2 {
        return parent1.to_vec();
    }

    let (start, end) = random_cut_points(n, rng);

    let mut child = vec![usize::MAX; n];
    let mut in_child = vec![false; n];
    for pos in start..=end {
        child[pos] = parent1[pos];
        in_child[parent1[pos]] = true;
    }

    let mut write = (end + 1) % n;
    for offset in 0..n {
        let city = parent2[(end + 1 + offset) % n];
        if !in_child[city] {
            child[write] = city;
            in_child[city] = true;
            write = (write + 1) % n;
        }
    }

    child
}

/// Partially Mapped Crossover: copy a segment from the first parent and
/// fill the rest from the second, resolving conflicts through the
/// segment's position mapping.
pub fn pmx_crossover<R: Rng>(parent1: &[usize], parent2: &[usize], rng: &mut R) -> Vec<usize> {
    let n = parent1.len();
    if n < 2 {
        return parent1.to_vec();
    }

    let (start, end) = random_cut_points(n, rng);

    let mut position_in_p1 = vec![0usize; n];
    for (pos, &city) in parent1.iter().enumerate() {
        position_in_p1[city] = pos;
    }

    let mut child = vec![usize::MAX; n];
    let mut in_segment = vec![false; n];
    for pos in start..=end {
        child[pos] = parent1[pos];
        in_segment[parent1[pos]] = true;
    }

    for pos in (0..start).chain(end + 1..n) {
        let mut city = parent2[pos];
        // Follow the mapping out of the copied segment.
        while in_segment[city] {
            city = parent2[position_in_p1[city]];
        }
        child[pos] = city;
    }

    child
}

/// Exchange two distinct random positions.
pub fn mutate_swap<R: Rng>(cities: &mut [usize], rng: &mut R) {
    let n = cities.len();
    if n < 2 {
        return;
    }
    let i = rng.gen_range(0..n);
    let mut j = rng.gen_range(0..n);
    while j == i {
        j = rng.gen_range(0..n);
    }
    cities.swap(i, j);
}

/// Reverse a random segment.
pub fn mutate_inversion<R: Rng>(cities: &mut [usize], rng: &mut R) {
    let n = cities.len();
    if n < 2 {
        return;
    }
    let (start, end) = random_cut_points(n, rng);
    cities[start..=end].reverse();
}

/// Remove one city and reinsert it at another position.
pub fn mutate_shift<R: Rng>(cities: &mut Vec<usize>, rng: &mut R) {
    let n = cities.len();
    if n < 2 {
        return;
    }
    let origin = rng.gen_range(0..n);
    let mut destination = rng.gen_range(0..n);
    while destination == origin {
        destination = rng.gen_range(0..n);
    }

    let city = cities.remove(origin);
    let adjusted = if destination > origin {
        destination - 1
    } else {
        destination
    };
    cities.insert(adjusted, city);
}

/// Two distinct cut points, returned in ascending order.
fn random_cut_points<R: Rng>(n: usize, rng: &mut R) -> (usize, usize) {
    let a = rng.gen_range(0..n);
    let mut b = rng.gen_range(0..n);
    while b == a {
        b = rng.gen_range(0..n);
    }
    (a.min(b), a.max(b))
}

/// Generational genetic engine.
///
/// The global best is first-class engine state: it is updated after every
/// generation's evaluation and can only improve, independently of what
/// crossover and mutation do to the population.
pub struct GeneticEngine<'a> {
    instance: &'a TspInstance,
    config: GaConfig,
    population: Vec<Individual>,
    best: Option<Individual>,
    rng: ChaCha8Rng,
    generation: usize,
    no_improve_count: usize,
    refinement: Option<RefinementChoice>,
}

impl<'a> GeneticEngine<'a> {
    pub fn new(instance: &'a TspInstance, config: GaConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        GeneticEngine {
            instance,
            config,
            population: Vec::new(),
            best: None,
            rng,
            generation: 0,
            no_improve_count: 0,
            refinement: None,
        }
    }

    fn with_refinement(
        instance: &'a TspInstance,
        config: GaConfig,
        refinement: RefinementChoice,
    ) -> Self {
        let mut engine = Self::new(instance, config);
        engine.refinement = Some(refinement);
        engine
    }

    /// Seed the initial population: a quarter from Nearest Neighbor with
    /// randomized start cities, the rest uniformly random permutations.
    pub fn seed_population(&mut self) {
        let n = self.instance.dimension();
        self.population.clear();

        let heuristic_count = self.config.population_size / 4;
        for _ in 0..heuristic_count {
            let start = self.rng.gen_range(0..n);
            let tour = NearestNeighbor::from_start(start).construct(self.instance);
            self.population.push(Individual::new(tour));
        }

        while self.population.len() < self.config.population_size {
            let tour = Tour::random(self.instance, &mut self.rng);
            self.population.push(Individual::new(tour));
        }

        self.population.sort_by_key(|ind| OrderedFloat(-ind.fitness));
        self.best = self.population.first().cloned();
        self.generation = 0;
        self.no_improve_count = 0;
    }

    fn tournament_select(&mut self) -> &Individual {
        let mut best_idx = self.rng.gen_range(0..self.population.len());
        for _ in 1..self.config.tournament_size {
            let idx = self.rng.gen_range(0..self.population.len());
            if self.population[idx].fitness > self.population[best_idx].fitness {
                best_idx = idx;
            }
        }
        &self.population[best_idx]
    }

    fn roulette_select(&mut self) -> &Individual {
        let min_fitness = self
            .population
            .iter()
            .map(|ind| ind.fitness)
            .fold(f64::INFINITY, f64::min);

        let adjusted: Vec<f64> = self
            .population
            .iter()
            .map(|ind| ind.fitness - min_fitness + 1.0)
            .collect();
        let total: f64 = adjusted.iter().sum();

        let mut pick = self.rng.gen::<f64>() * total;
        for (idx, weight) in adjusted.iter().enumerate() {
            pick -= weight;
            if pick <= 0.0 {
                return &self.population[idx];
            }
        }

        self.population.last().expect("population is non-empty")
    }

    fn select_parent(&mut self) -> Individual {
        match self.config.selection_type {
            SelectionType::Tournament => self.tournament_select().clone(),
            SelectionType::RouletteWheel => self.roulette_select().clone(),
        }
    }

    fn make_offspring(&mut self, parent1: &Individual, parent2: &Individual) -> Individual {
        let mut cities = if self.rng.gen::<f64>() < self.config.crossover_prob {
            match self.config.crossover_type {
                CrossoverType::Order => order_crossover(
                    parent1.tour.cities(),
                    parent2.tour.cities(),
                    &mut self.rng,
                ),
                CrossoverType::PartiallyMapped => pmx_crossover(
                    parent1.tour.cities(),
                    parent2.tour.cities(),
                    &mut self.rng,
                ),
            }
        } else {
            parent1.tour.cities().to_vec()
        };

        if self.rng.gen::<f64>() < self.config.mutation_prob {
            match self.config.mutation_type {
                MutationType::Swap => mutate_swap(&mut cities, &mut self.rng),
                MutationType::Inversion => mutate_inversion(&mut cities, &mut self.rng),
                MutationType::Shift => mutate_shift(&mut cities, &mut self.rng),
            }
        }

        let mut tour = Tour::new(self.instance, cities);

        if let Some(choice) = self.refinement {
            let kind = match choice {
                RefinementChoice::Fixed(kind) => kind,
                RefinementChoice::RandomPerOffspring => {
                    *OperatorKind::ALL.choose(&mut self.rng).expect("non-empty")
                }
            };
            kind.build().improve(self.instance, &mut tour);
        }

        Individual::new(tour)
    }

    /// Advance one generation: elitist replacement plus freshly bred
    /// offspring, then update the tracked global best.
    pub fn evolve(&mut self) {
        if self.population.is_empty() {
            self.seed_population();
        }

        let elite = self
            .config
            .elite_count
            .min(self.config.population_size.saturating_sub(1));

        let mut next = Vec::with_capacity(self.config.population_size);
        next.extend(self.population.iter().take(elite).cloned());

        while next.len() < self.config.population_size {
            let parent1 = self.select_parent();
            let parent2 = self.select_parent();
            next.push(self.make_offspring(&parent1, &parent2));
        }

        next.sort_by_key(|ind| OrderedFloat(-ind.fitness));

        if let Some(generation_best) = next.first() {
            match &self.best {
                Some(current) if generation_best.fitness > current.fitness => {
                    self.best = Some(generation_best.clone());
                    self.no_improve_count = 0;
                }
                Some(_) => self.no_improve_count += 1,
                None => self.best = Some(generation_best.clone()),
            }
        }

        self.population = next;
        self.generation += 1;
    }

    /// Run until the generation limit or the stagnation window is hit and
    /// return the best tour seen across all generations.
    pub fn run(&mut self) -> Tour {
        self.seed_population();

        while self.generation < self.config.max_generations
            && self.no_improve_count < self.config.max_no_improve
        {
            self.evolve();

            if let Some(best) = &self.best {
                log::debug!(
                    "{}: generation {} best cost {:.3} (stagnant {})",
                    self.instance.name,
                    self.generation,
                    best.cost(),
                    self.no_improve_count
                );
            }
        }

        let best = self.best.as_ref().expect("population is never empty");
        log::info!(
            "{}: finished after {} generations, best cost {:.3}",
            self.instance.name,
            self.generation,
            best.cost()
        );
        best.tour.clone()
    }

    /// Best individual seen so far across all generations.
    pub fn best(&self) -> Option<&Individual> {
        self.best.as_ref()
    }

    /// Generations evolved so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Current population size.
    pub fn population_len(&self) -> usize {
        self.population.len()
    }
}

/// Memetic engine: the genetic loop with local search applied to every
/// offspring.
pub struct MemeticEngine<'a> {
    engine: GeneticEngine<'a>,
}

impl<'a> MemeticEngine<'a> {
    /// Memetic engine drawing a refinement operator per offspring.
    pub fn new(instance: &'a TspInstance, config: GaConfig) -> Self {
        Self::with_refinement(instance, config, RefinementChoice::RandomPerOffspring)
    }

    pub fn with_refinement(
        instance: &'a TspInstance,
        config: GaConfig,
        refinement: RefinementChoice,
    ) -> Self {
        MemeticEngine {
            engine: GeneticEngine::with_refinement(instance, config, refinement),
        }
    }

    pub fn run(&mut self) -> Tour {
        self.engine.run()
    }

    pub fn best(&self) -> Option<&Individual> {
        self.engine.best()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five_city_instance() -> TspInstance {
        let matrix = vec![
            vec![0.0, 2.0, 9.0, 10.0, 7.0],
            vec![2.0, 0.0, 6.0, 4.0, 3.0],
            vec![9.0, 6.0, 0.0, 8.0, 5.0],
            vec![10.0, 4.0, 8.0, 0.0, 1.0],
            vec![7.0, 3.0, 5.0, 1.0, 0.0],
        ];
        TspInstance::from_matrix("five", matrix).unwrap()
    }

    fn unit_square() -> TspInstance {
        let s = std::f64::consts::SQRT_2;
        let matrix = vec![
            vec![0.0, 1.0, s, 1.0],
            vec![1.0, 0.0, 1.0, s],
            vec![s, 1.0, 0.0, 1.0],
            vec![1.0, s, 1.0, 0.0],
        ];
        TspInstance::from_matrix("square", matrix).unwrap()
    }

    fn is_permutation(cities: &[usize], n: usize) -> bool {
        let mut seen = vec![false; n];
        cities.len() == n
            && cities.iter().all(|&c| {
                if c >= n || seen[c] {
                    false
                } else {
                    seen[c] = true;
                    true
                }
            })
    }

    #[test]
    fn test_crossover_closure() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let n = 8;

        for _ in 0..50 {
            let mut p1: Vec<usize> = (0..n).collect();
            let mut p2: Vec<usize> = (0..n).collect();
            p1.shuffle(&mut rng);
            p2.shuffle(&mut rng);

            let ox = order_crossover(&p1, &p2, &mut rng);
            assert!(is_permutation(&ox, n), "OX broke the permutation: {:?}", ox);

            let pmx = pmx_crossover(&p1, &p2, &mut rng);
            assert!(is_permutation(&pmx, n), "PMX broke the permutation: {:?}", pmx);
        }
    }

    #[test]
    fn test_mutation_closure() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let n = 8;

        for _ in 0..50 {
            let mut cities: Vec<usize> = (0..n).collect();
            cities.shuffle(&mut rng);

            let mut swapped = cities.clone();
            mutate_swap(&mut swapped, &mut rng);
            assert!(is_permutation(&swapped, n));

            let mut inverted = cities.clone();
            mutate_inversion(&mut inverted, &mut rng);
            assert!(is_permutation(&inverted, n));

            let mut shifted = cities.clone();
            mutate_shift(&mut shifted, &mut rng);
            assert!(is_permutation(&shifted, n));
        }
    }

    #[test]
    fn test_global_best_never_worsens() {
        let instance = five_city_instance();
        let config = GaConfig {
            population_size: 20,
            max_generations: 30,
            elite_count: 2,
            seed: 123,
            ..Default::default()
        };

        let mut engine = GeneticEngine::new(&instance, config);
        engine.seed_population();
        let mut previous = engine.best().unwrap().cost();

        for _ in 0..30 {
            engine.evolve();
            let current = engine.best().unwrap().cost();
            assert!(current <= previous + 1e-9, "global best worsened");
            previous = current;
        }
    }

    #[test]
    fn test_population_size_is_constant() {
        let instance = five_city_instance();
        let config = GaConfig {
            population_size: 15,
            elite_count: 3,
            seed: 7,
            ..Default::default()
        };

        let mut engine = GeneticEngine::new(&instance, config);
        engine.seed_population();
        for _ in 0..5 {
            engine.evolve();
            assert_eq!(engine.population_len(), 15);
        }
    }

    #[test]
    fn test_genetic_run_produces_valid_tour() {
        let instance = five_city_instance();
        let config = GaConfig {
            population_size: 20,
            max_generations: 40,
            max_no_improve: 40,
            elite_count: 2,
            seed: 1,
            ..Default::default()
        };

        let mut engine = GeneticEngine::new(&instance, config);
        let seeded_best = {
            let mut probe = GeneticEngine::new(
                &instance,
                GaConfig {
                    population_size: 20,
                    elite_count: 2,
                    seed: 1,
                    ..Default::default()
                },
            );
            probe.seed_population();
            probe.best().unwrap().cost()
        };

        let tour = engine.run();
        assert!(tour.is_permutation(5));
        assert!(tour.cost().is_finite() && tour.cost() >= 0.0);
        // The tracked best starts at the seeded best and can only improve.
        assert!(tour.cost() <= seeded_best + 1e-9);
    }

    #[test]
    fn test_roulette_selection_runs() {
        let instance = five_city_instance();
        let config = GaConfig {
            population_size: 12,
            max_generations: 5,
            elite_count: 1,
            selection_type: SelectionType::RouletteWheel,
            crossover_type: CrossoverType::PartiallyMapped,
            mutation_type: MutationType::Shift,
            seed: 8,
            ..Default::default()
        };

        let tour = GeneticEngine::new(&instance, config).run();
        assert!(tour.is_permutation(5));
    }

    #[test]
    fn test_memetic_reaches_square_optimum() {
        let instance = unit_square();
        let config = GaConfig {
            population_size: 10,
            max_generations: 5,
            max_no_improve: 5,
            elite_count: 1,
            seed: 2,
            ..Default::default()
        };

        // Every 4-city tour refined by 2-opt lands on the cost-4 ring.
        let mut memetic = MemeticEngine::with_refinement(
            &instance,
            config,
            RefinementChoice::Fixed(OperatorKind::TwoOpt),
        );
        let tour = memetic.run();

        assert!(tour.is_permutation(4));
        assert!((tour.cost() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_memetic_not_worse_than_genetic_on_square() {
        let instance = unit_square();
        let config = GaConfig {
            population_size: 10,
            max_generations: 5,
            max_no_improve: 5,
            elite_count: 1,
            seed: 2,
            ..Default::default()
        };

        let genetic = GeneticEngine::new(&instance, config.clone()).run();
        let memetic = MemeticEngine::new(&instance, config).run();

        assert!(memetic.cost() <= genetic.cost() + 1e-9);
    }

    #[test]
    fn test_memetic_random_refinement_is_valid() {
        let instance = five_city_instance();
        let config = GaConfig {
            population_size: 12,
            max_generations: 10,
            max_no_improve: 10,
            elite_count: 1,
            seed: 4,
            ..Default::default()
        };

        let tour = MemeticEngine::new(&instance, config).run();
        assert!(tour.is_permutation(5));
        assert!(tour.cost().is_finite());
    }
}
