//! Heuristic and metaheuristic algorithms for the symmetric TSP.
//!
//! - `construction`: deterministic tour builders (Nearest Neighbor,
//!   Cheapest Insertion)
//! - `local_search`: improvement operators (2-opt, Swap, Or-opt)
//! - `genetic`: evolutionary engines (genetic and memetic)

pub mod construction;
pub mod genetic;
pub mod local_search;
