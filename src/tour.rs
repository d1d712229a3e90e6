//! Tour representation and neighborhood moves.
//!
//! A [`Tour`] is a permutation of the city indices `[0, n)` together with a
//! cached cycle cost. Every mutating move updates the cost by its exact
//! delta, so the cached value always matches the permutation; `validate`
//! recomputes it from scratch for checks.
//!
//! All deltas are O(1): with a symmetric cost matrix the change of a move
//! only involves the edges it breaks and creates.

use crate::instance::TspInstance;
use rand::prelude::*;

/// Strictly-improving threshold shared by all neighborhood scans.
pub const IMPROVE_EPS: f64 = 1e-9;

/// A Hamiltonian cycle over all cities of an instance.
///
/// Tours are value-like: operators clone and return new tours instead of
/// aliasing a shared sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Tour {
    cities: Vec<usize>,
    cost: f64,
}

impl Tour {
    /// Build a tour from an explicit visiting order, computing its cost.
    pub fn new(instance: &TspInstance, cities: Vec<usize>) -> Self {
        let cost = instance.tour_length(&cities);
        let tour = Tour { cities, cost };
        debug_assert!(tour.is_permutation(instance.dimension()));
        tour
    }

    /// Build a uniformly random tour.
    pub fn random<R: Rng>(instance: &TspInstance, rng: &mut R) -> Self {
        let mut cities: Vec<usize> = (0..instance.dimension()).collect();
        cities.shuffle(rng);
        Self::new(instance, cities)
    }

    /// The visiting order.
    #[inline]
    pub fn cities(&self) -> &[usize] {
        &self.cities
    }

    /// Consume the tour, returning the visiting order.
    pub fn into_cities(self) -> Vec<usize> {
        self.cities
    }

    /// Number of cities in the tour.
    #[inline]
    pub fn len(&self) -> usize {
        self.cities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// Cached cycle cost.
    #[inline]
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Check that the tour visits every city in `[0, n)` exactly once.
    pub fn is_permutation(&self, n: usize) -> bool {
        if self.cities.len() != n {
            return false;
        }
        let mut seen = vec![false; n];
        for &city in &self.cities {
            if city >= n || seen[city] {
                return false;
            }
            seen[city] = true;
        }
        true
    }

    /// Recompute the cached cost from the permutation.
    pub fn validate(&mut self, instance: &TspInstance) {
        self.cost = instance.tour_length(&self.cities);
    }

    /// Cost change of reversing the segment between positions `i + 1` and
    /// `j` (a 2-opt move removing edges `(i, i+1)` and `(j, j+1)`).
    ///
    /// Requires `i < j < len`. Degenerate pairs (adjacent edges, or the
    /// wrap-around pair that reverses the whole cycle) evaluate to 0.
    pub fn two_opt_delta(&self, instance: &TspInstance, i: usize, j: usize) -> f64 {
        let n = self.cities.len();
        debug_assert!(i < j && j < n);
        if i == 0 && j == n - 1 {
            return 0.0;
        }

        let a = self.cities[i];
        let b = self.cities[i + 1];
        let c = self.cities[j];
        let d = self.cities[(j + 1) % n];

        instance.distance(a, c) + instance.distance(b, d)
            - instance.distance(a, b)
            - instance.distance(c, d)
    }

    /// Apply a 2-opt move, keeping the cached cost in sync.
    pub fn apply_two_opt(&mut self, instance: &TspInstance, i: usize, j: usize) {
        self.cost += self.two_opt_delta(instance, i, j);
        self.cities[i + 1..=j].reverse();
    }

    /// Cost change of exchanging the cities at positions `i` and `j`.
    ///
    /// Requires `i < j < len`. Tours shorter than 3 cities have no
    /// cost-changing swaps.
    pub fn swap_delta(&self, instance: &TspInstance, i: usize, j: usize) -> f64 {
        let n = self.cities.len();
        debug_assert!(i < j && j < n);
        if n < 3 {
            return 0.0;
        }

        let b = self.cities[i];
        let y = self.cities[j];

        if j == i + 1 {
            // a-b-y-z becomes a-y-b-z
            let a = self.cities[(i + n - 1) % n];
            let z = self.cities[(j + 1) % n];
            instance.distance(a, y) + instance.distance(b, z)
                - instance.distance(a, b)
                - instance.distance(y, z)
        } else if i == 0 && j == n - 1 {
            // y precedes b on the cycle: x-y-b-c becomes x-b-y-c
            let x = self.cities[j - 1];
            let c = self.cities[i + 1];
            instance.distance(x, b) + instance.distance(y, c)
                - instance.distance(x, y)
                - instance.distance(b, c)
        } else {
            let a = self.cities[(i + n - 1) % n];
            let c = self.cities[i + 1];
            let x = self.cities[j - 1];
            let z = self.cities[(j + 1) % n];
            instance.distance(a, y) + instance.distance(y, c)
                + instance.distance(x, b)
                + instance.distance(b, z)
                - instance.distance(a, b)
                - instance.distance(b, c)
                - instance.distance(x, y)
                - instance.distance(y, z)
        }
    }

    /// Apply a swap move, keeping the cached cost in sync.
    pub fn apply_swap(&mut self, instance: &TspInstance, i: usize, j: usize) {
        self.cost += self.swap_delta(instance, i, j);
        self.cities.swap(i, j);
    }

    /// Cost change of relocating the segment `[start, start + len)` so that
    /// it precedes the city currently at `insert_pos`.
    ///
    /// Requires a non-wrapping segment (`start + len <= tour len`) and an
    /// insertion point strictly outside it (`insert_pos < start` or
    /// `insert_pos > start + len`). The cyclically redundant case
    /// `insert_pos == 0` with a segment ending at the last position must be
    /// skipped by the caller.
    pub fn relocate_delta(
        &self,
        instance: &TspInstance,
        start: usize,
        len: usize,
        insert_pos: usize,
    ) -> f64 {
        let n = self.cities.len();
        debug_assert!(len >= 1 && start + len <= n);
        debug_assert!(insert_pos < start || insert_pos > start + len);
        debug_assert!(insert_pos < n);
        debug_assert!(!(insert_pos == 0 && start + len == n));

        let prev = self.cities[(start + n - 1) % n];
        let first = self.cities[start];
        let last = self.cities[start + len - 1];
        let next = self.cities[(start + len) % n];
        let u = self.cities[(insert_pos + n - 1) % n];
        let v = self.cities[insert_pos];

        instance.distance(prev, next) - instance.distance(prev, first)
            - instance.distance(last, next)
            + instance.distance(u, first)
            + instance.distance(last, v)
            - instance.distance(u, v)
    }

    /// Apply a segment relocation, keeping the cached cost in sync.
    pub fn apply_relocate(
        &mut self,
        instance: &TspInstance,
        start: usize,
        len: usize,
        insert_pos: usize,
    ) {
        self.cost += self.relocate_delta(instance, start, len, insert_pos);

        let segment: Vec<usize> = self.cities.drain(start..start + len).collect();
        let adjusted = if insert_pos > start {
            insert_pos - len
        } else {
            insert_pos
        };
        for (offset, city) in segment.into_iter().enumerate() {
            self.cities.insert(adjusted + offset, city);
        }

        debug_assert!(self.is_permutation(instance.dimension()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;

    fn five_city_instance() -> TspInstance {
        // Pairwise-distinct symmetric costs so every move has a unique delta.
        let matrix = vec![
            vec![0.0, 2.0, 9.0, 10.0, 7.0],
            vec![2.0, 0.0, 6.0, 4.0, 3.0],
            vec![9.0, 6.0, 0.0, 8.0, 5.0],
            vec![10.0, 4.0, 8.0, 0.0, 1.0],
            vec![7.0, 3.0, 5.0, 1.0, 0.0],
        ];
        TspInstance::from_matrix("five", matrix).unwrap()
    }

    #[test]
    fn test_cost_matches_tour_length() {
        let instance = five_city_instance();
        let tour = Tour::new(&instance, vec![0, 1, 2, 3, 4]);
        assert!((tour.cost() - instance.tour_length(tour.cities())).abs() < 1e-12);
    }

    #[test]
    fn test_random_tour_is_permutation() {
        let instance = five_city_instance();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..10 {
            let tour = Tour::random(&instance, &mut rng);
            assert!(tour.is_permutation(5));
        }
    }

    #[test]
    fn test_two_opt_delta_matches_recompute() {
        let instance = five_city_instance();
        let tour = Tour::new(&instance, vec![0, 2, 4, 1, 3]);

        for i in 0..4 {
            for j in i + 1..5 {
                let delta = tour.two_opt_delta(&instance, i, j);
                let mut moved = tour.clone();
                moved.apply_two_opt(&instance, i, j);
                let recomputed = instance.tour_length(moved.cities());
                assert!(
                    (tour.cost() + delta - recomputed).abs() < 1e-9,
                    "2-opt delta mismatch at ({}, {})",
                    i,
                    j
                );
                assert!((moved.cost() - recomputed).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_swap_delta_matches_recompute() {
        let instance = five_city_instance();
        let tour = Tour::new(&instance, vec![3, 0, 4, 2, 1]);

        for i in 0..4 {
            for j in i + 1..5 {
                let delta = tour.swap_delta(&instance, i, j);
                let mut moved = tour.clone();
                moved.apply_swap(&instance, i, j);
                let recomputed = instance.tour_length(moved.cities());
                assert!(
                    (tour.cost() + delta - recomputed).abs() < 1e-9,
                    "swap delta mismatch at ({}, {})",
                    i,
                    j
                );
            }
        }
    }

    #[test]
    fn test_relocate_delta_matches_recompute() {
        let instance = five_city_instance();
        let tour = Tour::new(&instance, vec![1, 4, 0, 3, 2]);

        for len in 1..=3usize {
            for start in 0..=5 - len {
                for insert_pos in 0..5 {
                    if insert_pos >= start && insert_pos <= start + len {
                        continue;
                    }
                    if insert_pos == 0 && start + len == 5 {
                        continue;
                    }
                    let delta = tour.relocate_delta(&instance, start, len, insert_pos);
                    let mut moved = tour.clone();
                    moved.apply_relocate(&instance, start, len, insert_pos);
                    let recomputed = instance.tour_length(moved.cities());
                    assert!(
                        (tour.cost() + delta - recomputed).abs() < 1e-9,
                        "relocate delta mismatch at start={} len={} pos={}",
                        start,
                        len,
                        insert_pos
                    );
                    assert!(moved.is_permutation(5));
                }
            }
        }
    }

    #[test]
    fn test_validate_restores_cost() {
        let instance = five_city_instance();
        let mut tour = Tour::new(&instance, vec![0, 1, 2, 3, 4]);
        let expected = tour.cost();
        tour.validate(&instance);
        assert!((tour.cost() - expected).abs() < 1e-12);
    }
}
