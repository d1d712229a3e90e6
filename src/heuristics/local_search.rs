//! Local search improvement operators.
//!
//! Every operator repeats full best-improvement scans of its neighborhood
//! and stops at a local optimum: when no strictly improving move remains,
//! the tour is returned unchanged. Neighborhoods are scanned in ascending
//! position order and a move replaces the incumbent only on strict
//! improvement, so equal-delta ties always resolve to the lowest positions.
//! Costs therefore never increase, and a second application to the same
//! tour is a no-op.

use crate::instance::TspInstance;
use crate::tour::{Tour, IMPROVE_EPS};

/// Trait for local search improvement operators.
///
/// `improve` refines the tour in place and reports whether any improving
/// move was applied.
pub trait LocalSearch {
    fn improve(&self, instance: &TspInstance, tour: &mut Tour) -> bool;
    fn name(&self) -> &str;
}

/// The three neighborhood operators available to the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    TwoOpt,
    Swap,
    OrOpt,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 3] = [OperatorKind::TwoOpt, OperatorKind::Swap, OperatorKind::OrOpt];

    pub fn build(self) -> Box<dyn LocalSearch + Send + Sync> {
        match self {
            OperatorKind::TwoOpt => Box::new(TwoOptSearch::new()),
            OperatorKind::Swap => Box::new(SwapSearch::new()),
            OperatorKind::OrOpt => Box::new(OrOptSearch::new()),
        }
    }
}

/// 2-opt: reverse the segment between two non-adjacent edges.
pub struct TwoOptSearch;

impl TwoOptSearch {
    pub fn new() -> Self {
        TwoOptSearch
    }
}

impl Default for TwoOptSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSearch for TwoOptSearch {
    fn improve(&self, instance: &TspInstance, tour: &mut Tour) -> bool {
        let n = tour.len();
        if n < 4 {
            return false;
        }

        let mut total_improved = false;

        loop {
            let mut best_delta = 0.0;
            let mut best_move = None;

            for i in 0..n - 1 {
                for j in i + 2..n {
                    if i == 0 && j == n - 1 {
                        continue; // would reverse the whole cycle
                    }
                    let delta = tour.two_opt_delta(instance, i, j);
                    if delta < -IMPROVE_EPS && delta < best_delta {
                        best_delta = delta;
                        best_move = Some((i, j));
                    }
                }
            }

            match best_move {
                Some((i, j)) => {
                    tour.apply_two_opt(instance, i, j);
                    total_improved = true;
                }
                None => break,
            }
        }

        total_improved
    }

    fn name(&self) -> &str {
        "2-Opt"
    }
}

/// Swap: exchange the cities at two positions.
pub struct SwapSearch;

impl SwapSearch {
    pub fn new() -> Self {
        SwapSearch
    }
}

impl Default for SwapSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSearch for SwapSearch {
    fn improve(&self, instance: &TspInstance, tour: &mut Tour) -> bool {
        let n = tour.len();
        if n < 3 {
            return false;
        }

        let mut total_improved = false;

        loop {
            let mut best_delta = 0.0;
            let mut best_move = None;

            for i in 0..n - 1 {
                for j in i + 1..n {
                    let delta = tour.swap_delta(instance, i, j);
                    if delta < -IMPROVE_EPS && delta < best_delta {
                        best_delta = delta;
                        best_move = Some((i, j));
                    }
                }
            }

            match best_move {
                Some((i, j)) => {
                    tour.apply_swap(instance, i, j);
                    total_improved = true;
                }
                None => break,
            }
        }

        total_improved
    }

    fn name(&self) -> &str {
        "Swap"
    }
}

/// Or-opt: relocate a segment of 1 to 3 consecutive cities to another
/// position in the tour.
pub struct OrOptSearch {
    /// Longest segment considered for relocation.
    pub max_segment_length: usize,
}

impl OrOptSearch {
    pub fn new() -> Self {
        OrOptSearch {
            max_segment_length: 3,
        }
    }
}

impl Default for OrOptSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSearch for OrOptSearch {
    fn improve(&self, instance: &TspInstance, tour: &mut Tour) -> bool {
        let n = tour.len();
        if n < 4 {
            return false;
        }

        let mut total_improved = false;

        loop {
            let mut best_delta = 0.0;
            let mut best_move = None;

            for len in 1..=self.max_segment_length.min(n - 2) {
                for start in 0..=n - len {
                    for insert_pos in 0..n {
                        if insert_pos >= start && insert_pos <= start + len {
                            continue; // no-op or inside the segment
                        }
                        if insert_pos == 0 && start + len == n {
                            continue; // cyclically identical tour
                        }
                        let delta = tour.relocate_delta(instance, start, len, insert_pos);
                        if delta < -IMPROVE_EPS && delta < best_delta {
                            best_delta = delta;
                            best_move = Some((start, len, insert_pos));
                        }
                    }
                }
            }

            match best_move {
                Some((start, len, insert_pos)) => {
                    tour.apply_relocate(instance, start, len, insert_pos);
                    total_improved = true;
                }
                None => break,
            }
        }

        total_improved
    }

    fn name(&self) -> &str {
        "Or-Opt"
    }
}
