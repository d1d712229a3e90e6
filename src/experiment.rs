//! Experiment execution and statistics.
//!
//! Each benchmark run pairs one of the four algorithms with one instance.
//! Deterministic algorithms (1, 2) execute once; the stochastic engines
//! (3, 4) execute a fixed number of independently seeded repetitions, each
//! from a fresh population, and the results are aggregated into a single
//! [`RunResult`].
//!
//! Repetitions share nothing but the read-only instance, so they run in
//! parallel by default; sequential execution gives identical results.

use crate::heuristics::construction::{CheapestInsertion, ConstructionHeuristic, NearestNeighbor};
use crate::heuristics::genetic::{GaConfig, GeneticEngine, MemeticEngine};
use crate::heuristics::local_search::{LocalSearch, TwoOptSearch};
use crate::instance::TspInstance;
use crate::tour::Tour;

use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fs::File;
use std::path::Path;
use std::time::Instant;

/// Repetition count for the stochastic algorithms.
pub const STOCHASTIC_RUNS: usize = 20;

/// The four benchmark algorithms, keyed by their CLI ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlgorithmId {
    /// 1: Nearest Neighbor construction + 2-opt.
    NearestNeighborTwoOpt,
    /// 2: Cheapest Insertion construction + 2-opt.
    CheapestInsertionTwoOpt,
    /// 3: Genetic algorithm.
    Genetic,
    /// 4: Memetic algorithm.
    Memetic,
}

impl AlgorithmId {
    pub fn from_id(id: u8) -> Option<AlgorithmId> {
        match id {
            1 => Some(AlgorithmId::NearestNeighborTwoOpt),
            2 => Some(AlgorithmId::CheapestInsertionTwoOpt),
            3 => Some(AlgorithmId::Genetic),
            4 => Some(AlgorithmId::Memetic),
            _ => None,
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            AlgorithmId::NearestNeighborTwoOpt => 1,
            AlgorithmId::CheapestInsertionTwoOpt => 2,
            AlgorithmId::Genetic => 3,
            AlgorithmId::Memetic => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmId::NearestNeighborTwoOpt => "NearestNeighbor+2Opt",
            AlgorithmId::CheapestInsertionTwoOpt => "CheapestInsertion+2Opt",
            AlgorithmId::Genetic => "Genetic",
            AlgorithmId::Memetic => "Memetic",
        }
    }

    /// Whether one run is enough (no random source involved).
    pub fn is_deterministic(&self) -> bool {
        matches!(
            self,
            AlgorithmId::NearestNeighborTwoOpt | AlgorithmId::CheapestInsertionTwoOpt
        )
    }
}

/// Aggregated statistics of one (algorithm, instance) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub instance_id: usize,
    pub algorithm: String,
    pub best_cost: f64,
    pub average_cost: f64,
    pub average_time_seconds: f64,
    pub runs: usize,
}

/// A [`RunResult`] together with the best tour that produced it.
#[derive(Debug, Clone)]
pub struct ExperimentOutcome {
    pub result: RunResult,
    pub best_tour: Tour,
}

/// Experiment configuration.
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    /// Repetitions for stochastic algorithms.
    pub runs: usize,
    /// Repetition `rep` is seeded with `base_seed + rep`.
    pub base_seed: u64,
    /// Engine parameters for the evolutionary algorithms.
    pub ga: GaConfig,
    /// Run repetitions on the rayon pool.
    pub parallel: bool,
    /// Show a progress bar while repetitions run.
    pub progress: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            runs: STOCHASTIC_RUNS,
            base_seed: 42,
            ga: GaConfig::default(),
            parallel: true,
            progress: true,
        }
    }
}

/// Executes algorithms on one instance and aggregates their statistics.
pub struct ExperimentRunner<'a> {
    instance: &'a TspInstance,
    instance_id: usize,
    config: ExperimentConfig,
}

impl<'a> ExperimentRunner<'a> {
    pub fn new(instance: &'a TspInstance, instance_id: usize) -> Self {
        Self::with_config(instance, instance_id, ExperimentConfig::default())
    }

    pub fn with_config(
        instance: &'a TspInstance,
        instance_id: usize,
        config: ExperimentConfig,
    ) -> Self {
        ExperimentRunner {
            instance,
            instance_id,
            config,
        }
    }

    /// Run the selected algorithm: once for the deterministic ids, the
    /// configured repetition count for the stochastic ones.
    pub fn run(&self, algorithm: AlgorithmId) -> ExperimentOutcome {
        if algorithm.is_deterministic() {
            self.run_deterministic(algorithm)
        } else {
            self.run_stochastic(algorithm)
        }
    }

    fn construct_and_refine(&self, algorithm: AlgorithmId) -> Tour {
        let mut tour = match algorithm {
            AlgorithmId::NearestNeighborTwoOpt => NearestNeighbor::new().construct(self.instance),
            AlgorithmId::CheapestInsertionTwoOpt => {
                CheapestInsertion::new().construct(self.instance)
            }
            AlgorithmId::Genetic | AlgorithmId::Memetic => {
                unreachable!("stochastic algorithms take the repetition path")
            }
        };
        TwoOptSearch::new().improve(self.instance, &mut tour);
        tour
    }

    fn run_deterministic(&self, algorithm: AlgorithmId) -> ExperimentOutcome {
        log::info!(
            "{}: running {} once (deterministic)",
            self.instance.name,
            algorithm.name()
        );

        let start = Instant::now();
        let tour = self.construct_and_refine(algorithm);
        let elapsed = start.elapsed().as_secs_f64();

        ExperimentOutcome {
            result: RunResult {
                instance_id: self.instance_id,
                algorithm: algorithm.name().to_string(),
                best_cost: tour.cost(),
                average_cost: tour.cost(),
                average_time_seconds: elapsed,
                runs: 1,
            },
            best_tour: tour,
        }
    }

    fn single_stochastic_run(&self, algorithm: AlgorithmId, rep: usize) -> (Tour, f64) {
        let ga = GaConfig {
            seed: self.config.base_seed + rep as u64,
            ..self.config.ga.clone()
        };

        let start = Instant::now();
        let tour = match algorithm {
            AlgorithmId::Genetic => GeneticEngine::new(self.instance, ga).run(),
            AlgorithmId::Memetic => MemeticEngine::new(self.instance, ga).run(),
            AlgorithmId::NearestNeighborTwoOpt | AlgorithmId::CheapestInsertionTwoOpt => {
                unreachable!("deterministic algorithms take the single-run path")
            }
        };
        (tour, start.elapsed().as_secs_f64())
    }

    fn run_stochastic(&self, algorithm: AlgorithmId) -> ExperimentOutcome {
        let runs = self.config.runs;
        log::info!(
            "{}: running {} for {} repetitions",
            self.instance.name,
            algorithm.name(),
            runs
        );

        let bar = if self.config.progress {
            ProgressBar::new(runs as u64)
        } else {
            ProgressBar::hidden()
        };

        // Each repetition builds its own engine and population; the only
        // shared state is the read-only instance.
        let repetitions: Vec<(Tour, f64)> = if self.config.parallel {
            (0..runs)
                .into_par_iter()
                .map(|rep| {
                    let outcome = self.single_stochastic_run(algorithm, rep);
                    bar.inc(1);
                    outcome
                })
                .collect()
        } else {
            (0..runs)
                .map(|rep| {
                    let outcome = self.single_stochastic_run(algorithm, rep);
                    bar.inc(1);
                    outcome
                })
                .collect()
        };
        bar.finish_and_clear();

        let costs: Vec<f64> = repetitions.iter().map(|(tour, _)| tour.cost()).collect();
        let times: Vec<f64> = repetitions.iter().map(|&(_, time)| time).collect();

        let best_index = costs
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).expect("costs are finite"))
            .map(|(idx, _)| idx)
            .expect("at least one repetition");

        let average_cost = costs.iter().mean();
        let average_time = times.iter().mean();
        let std_cost = costs.iter().std_dev();

        log::info!(
            "{}: {} best {:.3} avg {:.3} (std {:.3}) over {} runs",
            self.instance.name,
            algorithm.name(),
            costs[best_index],
            average_cost,
            std_cost,
            runs
        );

        ExperimentOutcome {
            result: RunResult {
                instance_id: self.instance_id,
                algorithm: algorithm.name().to_string(),
                best_cost: costs[best_index],
                average_cost,
                average_time_seconds: average_time,
                runs,
            },
            best_tour: repetitions.into_iter().nth(best_index).map(|(t, _)| t).expect("best index in range"),
        }
    }
}

/// Append results to a CSV file (header written for new files).
pub fn write_results_csv<P: AsRef<Path>>(path: P, results: &[RunResult]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for result in results {
        writer.serialize(result)?;
    }
    writer.flush()?;
    Ok(())
}

/// Serialize results as pretty JSON.
pub fn write_results_json<P: AsRef<Path>>(path: P, results: &[RunResult]) -> std::io::Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
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

    fn small_config(parallel: bool) -> ExperimentConfig {
        ExperimentConfig {
            runs: 20,
            base_seed: 42,
            ga: GaConfig {
                population_size: 12,
                max_generations: 10,
                max_no_improve: 10,
                elite_count: 2,
                ..Default::default()
            },
            parallel,
            progress: false,
        }
    }

    #[test]
    fn test_algorithm_id_mapping() {
        assert_eq!(
            AlgorithmId::from_id(1),
            Some(AlgorithmId::NearestNeighborTwoOpt)
        );
        assert_eq!(AlgorithmId::from_id(4), Some(AlgorithmId::Memetic));
        assert_eq!(AlgorithmId::from_id(0), None);
        assert_eq!(AlgorithmId::from_id(5), None);

        assert!(AlgorithmId::NearestNeighborTwoOpt.is_deterministic());
        assert!(AlgorithmId::CheapestInsertionTwoOpt.is_deterministic());
        assert!(!AlgorithmId::Genetic.is_deterministic());
        assert!(!AlgorithmId::Memetic.is_deterministic());
        assert_eq!(AlgorithmId::Genetic.id(), 3);
    }

    #[test]
    fn test_deterministic_runs_once_and_repeats_exactly() {
        let instance = five_city_instance();
        let runner = ExperimentRunner::new(&instance, 7);

        let first = runner.run(AlgorithmId::NearestNeighborTwoOpt);
        let second = runner.run(AlgorithmId::NearestNeighborTwoOpt);

        assert_eq!(first.result.runs, 1);
        assert_eq!(first.result.instance_id, 7);
        assert_eq!(first.result.best_cost, first.result.average_cost);
        assert_eq!(first.result.best_cost, second.result.best_cost);
        assert_eq!(first.best_tour.cities(), second.best_tour.cities());
    }

    #[test]
    fn test_stochastic_aggregation_bounds() {
        let instance = five_city_instance();
        let runner = ExperimentRunner::with_config(&instance, 3, small_config(false));

        let outcome = runner.run(AlgorithmId::Genetic);
        let result = &outcome.result;

        assert_eq!(result.runs, 20);
        assert!(result.best_cost.is_finite() && result.best_cost >= 0.0);
        assert!(result.average_cost.is_finite());
        assert!(result.average_cost >= result.best_cost - 1e-9);
        assert!(result.average_time_seconds >= 0.0);
        assert!(outcome.best_tour.is_permutation(5));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let instance = five_city_instance();

        let sequential = ExperimentRunner::with_config(&instance, 1, small_config(false))
            .run(AlgorithmId::Memetic);
        let parallel = ExperimentRunner::with_config(&instance, 1, small_config(true))
            .run(AlgorithmId::Memetic);

        // Seeding is per repetition, so scheduling cannot change the costs.
        assert_eq!(sequential.result.best_cost, parallel.result.best_cost);
        assert_eq!(sequential.result.average_cost, parallel.result.average_cost);
        assert_eq!(
            sequential.best_tour.cities(),
            parallel.best_tour.cities()
        );
    }
}
