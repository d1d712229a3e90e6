//! TSP Solver - Command Line Interface
//!
//! Runs one of the four benchmark algorithms on one of the 12 fixed
//! problems and appends the aggregated statistics to a markdown report.

use clap::Parser;
use tsp_solver::experiment::{AlgorithmId, ExperimentConfig, ExperimentOutcome, ExperimentRunner};
use tsp_solver::heuristics::genetic::GaConfig;
use tsp_solver::instance::{load_city_names, problem_config, MatrixKind, ProblemConfig, TspInstance};

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Distance-weighted benchmark matrix (kilometres).
const KM_MATRIX_FILE: &str = "matrix_km.csv";
/// Time-weighted benchmark matrix (minutes).
const MIN_MATRIX_FILE: &str = "matrix_min.csv";
/// City id to name mapping.
const CITY_NAMES_FILE: &str = "cities.csv";

#[derive(Parser)]
#[command(name = "tsp-solver")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Symmetric TSP heuristics over the 12 benchmark problems")]
struct Cli {
    /// Algorithm: 1 NN+2opt, 2 CheapestInsertion+2opt, 3 Genetic, 4 Memetic
    #[arg(short, long)]
    alg: u8,

    /// Benchmark problem id (1 to 12)
    #[arg(short, long)]
    prob: usize,

    /// Directory containing the benchmark CSV files
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Repetitions for the stochastic algorithms
    #[arg(short, long, default_value = "20")]
    runs: usize,

    /// Base random seed (repetition i uses seed + i)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Markdown report the result row is appended to
    #[arg(short, long, default_value = "output/results.md")]
    output: PathBuf,

    /// Run stochastic repetitions sequentially instead of in parallel
    #[arg(long)]
    sequential: bool,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let algorithm = AlgorithmId::from_id(cli.alg)
        .ok_or_else(|| format!("invalid algorithm {}: expected 1..=4", cli.alg))?;
    let problem = problem_config(cli.prob)?;

    println!(
        "[*] Problem {} ({}, {} cities), algorithm {} ({})",
        problem.id,
        problem.kind.unit(),
        problem.city_ids.len(),
        algorithm.id(),
        algorithm.name()
    );

    let instance = load_instance(&cli.data_dir, &problem)?;
    let city_names = load_names(&cli.data_dir);

    let config = ExperimentConfig {
        runs: cli.runs,
        base_seed: cli.seed,
        ga: GaConfig {
            seed: cli.seed,
            ..Default::default()
        },
        parallel: !cli.sequential,
        progress: true,
    };

    let runner = ExperimentRunner::with_config(&instance, problem.id, config);
    let outcome = runner.run(algorithm);

    print_summary(&problem, &outcome, &city_names);
    append_report(&cli.output, &problem, &outcome)?;
    println!("[*] Result appended to {:?}", cli.output);

    Ok(())
}

fn load_instance(
    data_dir: &Path,
    problem: &ProblemConfig,
) -> Result<TspInstance, Box<dyn std::error::Error>> {
    let file = match problem.kind {
        MatrixKind::Km => KM_MATRIX_FILE,
        MatrixKind::Min => MIN_MATRIX_FILE,
    };
    let path = data_dir.join(file);

    log::info!("loading matrix from {:?}", path);
    let full = TspInstance::from_csv_file(&path, problem.kind.unit())?;
    let instance = full.submatrix(&format!("problem-{}", problem.id), &problem.city_ids)?;
    Ok(instance)
}

fn load_names(data_dir: &Path) -> HashMap<usize, String> {
    let path = data_dir.join(CITY_NAMES_FILE);
    match load_city_names(&path) {
        Ok(names) => names,
        Err(e) => {
            log::warn!("city names unavailable ({}); reporting ids only", e);
            HashMap::new()
        }
    }
}

fn print_summary(
    problem: &ProblemConfig,
    outcome: &ExperimentOutcome,
    city_names: &HashMap<usize, String>,
) {
    let result = &outcome.result;

    println!("{}", "-".repeat(50));
    println!("FINAL RESULT (Problem {})", problem.id);
    println!("Best solution:    {:.2} {}", result.best_cost, problem.kind.unit());
    println!("Average solution: {:.2} {}", result.average_cost, problem.kind.unit());
    println!("Average time:     {:.4}s over {} run(s)", result.average_time_seconds, result.runs);

    // Translate local indices back to real city ids and names.
    let real_ids: Vec<usize> = outcome
        .best_tour
        .cities()
        .iter()
        .map(|&local| problem.city_ids[local])
        .collect();

    let id_route: Vec<String> = real_ids.iter().map(|id| id.to_string()).collect();
    println!("Route (ids):   {}", id_route.join(" -> "));

    if !city_names.is_empty() {
        let name_route: Vec<String> = real_ids
            .iter()
            .map(|id| {
                city_names
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| format!("ID{}", id))
            })
            .collect();
        println!("Route (names): {}", name_route.join(" -> "));
    }
    println!("{}", "-".repeat(50));
}

/// Append one row to the accumulative markdown results table, writing the
/// header when the file is new.
fn append_report(
    path: &Path,
    problem: &ProblemConfig,
    outcome: &ExperimentOutcome,
) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;

    if is_new {
        writeln!(
            file,
            "<!-- generated {} -->",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(file, "| Problem | Algorithm | Best | Average | Avg Time (s) |")?;
        writeln!(file, "| :--- | :--- | :--- | :--- | :--- |")?;
    }

    let result = &outcome.result;
    writeln!(
        file,
        "| {} ({}) | {} | {:.2} | {:.2} | {:.4} |",
        problem.id,
        problem.kind.unit(),
        result.algorithm,
        result.best_cost,
        result.average_cost,
        result.average_time_seconds
    )?;

    Ok(())
}
