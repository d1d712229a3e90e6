//! TSP Solver Library
//!
//! Approximate solvers for the symmetric Travelling Salesman Problem over a
//! fixed set of 12 benchmark instances.
//!
//! # Features
//!
//! - Construction heuristics (Nearest Neighbor, Cheapest Insertion)
//! - Local search operators (2-opt, Swap, Or-opt)
//! - Evolutionary metaheuristics (Genetic Algorithm, Memetic Algorithm)
//! - Experiment runner aggregating statistics over repeated seeded runs
//!
//! # Example
//!
//! ```no_run
//! use tsp_solver::experiment::{AlgorithmId, ExperimentRunner};
//! use tsp_solver::instance::{problem_config, TspInstance};
//!
//! // Load the full benchmark matrix and extract problem 5.
//! let full = TspInstance::from_csv_file("data/matrix_km.csv", "km").unwrap();
//! let config = problem_config(5).unwrap();
//! let instance = full.submatrix("problem-5", &config.city_ids).unwrap();
//!
//! // Run the memetic algorithm over 20 seeded repetitions.
//! let runner = ExperimentRunner::new(&instance, config.id);
//! let outcome = runner.run(AlgorithmId::Memetic);
//!
//! println!("best cost: {:.2}", outcome.result.best_cost);
//! ```

pub mod experiment;
pub mod heuristics;
pub mod instance;
pub mod tour;

pub use instance::TspInstance;
pub use tour::Tour;
