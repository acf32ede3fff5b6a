//! PELT (Pruned Exact Linear Time) multiple changepoint search.
//!
//! `best_cost[e]` is the minimal penalised cost of covering `[0, e)` and
//! `best_prev[e]` its optimal last changepoint. After each endpoint, a start
//! `s` stays admissible only while `best_cost[s] + cost(s, e) + β` is within
//! `β` of `best_cost[e]`, which keeps the candidate set small on signals with
//! real changes.

use std::iter;
use tracing::debug;

use super::cost::{CostFunction, FittedCost};
use super::scratch::ScratchPool;
use crate::config::defaults::SCRATCH_POOL_CAPACITY;

/// PELT detector generic over its segment cost.
#[derive(Debug)]
pub struct Pelt<C: CostFunction> {
    cost: C,
    scratch: ScratchPool,
}

impl<C: CostFunction> Pelt<C> {
    pub fn new(cost: C) -> Self {
        Self {
            cost,
            scratch: ScratchPool::new(SCRATCH_POOL_CAPACITY),
        }
    }

    pub fn cost(&self) -> &C {
        &self.cost
    }

    /// Detect changepoints in `signal`.
    ///
    /// Returns ascending breakpoints whose last element is always
    /// `signal.len()`; an empty signal returns `[0]`.
    pub fn detect_change_points(
        &self,
        signal: &[f64],
        min_segment_length: usize,
        jump: usize,
        penalty: f64,
    ) -> Vec<usize> {
        let n = signal.len();
        if n == 0 {
            return vec![0];
        }

        let min_len = min_segment_length.max(self.cost.minimum_size()).max(1);
        let jump = jump.max(1);
        // NaN and negative penalties degrade to 0
        let penalty = penalty.max(0.0);

        let fitted = self.cost.fit(signal);
        let endpoints: Vec<usize> = (1..)
            .map(|k| k * jump)
            .take_while(|&e| e < n)
            .filter(|&e| e >= min_len)
            .chain(iter::once(n))
            .collect();

        let mut best_cost = vec![f64::INFINITY; n + 1];
        let mut best_prev = vec![usize::MAX; n + 1];
        best_cost[0] = 0.0;

        let mut admissible: Vec<usize> = vec![0];
        let mut evaluated = 0usize;
        let mut pruned = 0usize;

        for &end in &endpoints {
            let mut totals = self.scratch.acquire(admissible.len());
            let mut best = f64::INFINITY;
            let mut best_start = usize::MAX;

            for &start in &admissible {
                if end < start + min_len || !best_cost[start].is_finite() {
                    totals.push(f64::NAN);
                    continue;
                }
                let total = best_cost[start] + fitted.compute_error(start, end) + penalty;
                evaluated += 1;
                totals.push(total);
                if total < best {
                    best = total;
                    best_start = start;
                }
            }

            if best_start != usize::MAX {
                best_cost[end] = best;
                best_prev[end] = best_start;
            }

            let before = admissible.len();
            let limit = best + penalty;
            let mut slot = 0;
            admissible.retain(|_| {
                let total = totals[slot];
                slot += 1;
                total.is_nan() || total <= limit
            });
            pruned += before - admissible.len();

            if end < n && best_cost[end].is_finite() {
                admissible.push(end);
            }
        }

        debug!(
            n,
            min_len,
            jump,
            penalty,
            evaluated,
            pruned,
            "PELT search complete"
        );

        backtrack(&best_cost, &best_prev, &endpoints, n)
    }
}

/// Follow `best_prev` from the terminal index back to 0. When `n` itself is
/// unreachable the last reachable endpoint is used and `n` appended.
fn backtrack(best_cost: &[f64], best_prev: &[usize], endpoints: &[usize], n: usize) -> Vec<usize> {
    let terminal = endpoints
        .iter()
        .rev()
        .copied()
        .find(|&e| best_cost[e].is_finite());

    let Some(terminal) = terminal else {
        return vec![n];
    };

    let mut breakpoints = Vec::new();
    let mut current = terminal;
    while current > 0 {
        breakpoints.push(current);
        let prev = best_prev[current];
        if prev >= current {
            break;
        }
        current = prev;
    }
    breakpoints.reverse();

    if breakpoints.last() != Some(&n) {
        breakpoints.push(n);
    }
    breakpoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changepoint::{L2Cost, RbfKernelCost};

    fn step_signal() -> Vec<f64> {
        let mut s = vec![0.0; 50];
        s.extend(vec![10.0; 50]);
        s
    }

    #[test]
    fn step_signal_single_breakpoint() {
        let bps = Pelt::new(L2Cost).detect_change_points(&step_signal(), 2, 1, 10.0);
        assert_eq!(bps.len(), 2, "{bps:?}");
        assert!(bps[0].abs_diff(50) <= 1);
        assert_eq!(bps[1], 100);
    }

    #[test]
    fn step_signal_with_stride() {
        let bps = Pelt::new(L2Cost).detect_change_points(&step_signal(), 5, 5, 10.0);
        assert_eq!(bps, vec![50, 100]);
    }

    #[test]
    fn rbf_finds_step() {
        let bps = Pelt::new(RbfKernelCost).detect_change_points(&step_signal(), 5, 1, 3.0);
        assert!(bps.iter().any(|b| b.abs_diff(50) <= 1), "{bps:?}");
        assert_eq!(bps.last(), Some(&100));
    }

    #[test]
    fn deterministic() {
        let signal: Vec<f64> = (0..300)
            .map(|i| (f64::from(i) * 0.07).sin() + if i > 150 { 2.0 } else { 0.0 })
            .collect();
        let pelt = Pelt::new(L2Cost);
        let a = pelt.detect_change_points(&signal, 5, 2, 4.0);
        let b = pelt.detect_change_points(&signal, 5, 2, 4.0);
        assert_eq!(a, b);
    }

    #[test]
    fn breakpoints_ascending_and_respect_min_length() {
        let mut signal = vec![0.0; 30];
        signal.extend(vec![4.0; 7]);
        signal.extend(vec![-3.0; 40]);
        let bps = Pelt::new(L2Cost).detect_change_points(&signal, 10, 1, 1.0);
        assert!(bps.windows(2).all(|w| w[1] > w[0]));
        let mut prev = 0;
        for &b in &bps {
            assert!(b - prev >= 10, "{bps:?}");
            prev = b;
        }
        assert_eq!(bps.last(), Some(&signal.len()));
    }

    #[test]
    fn constant_signal_has_no_changes() {
        let bps = Pelt::new(L2Cost).detect_change_points(&[1.0; 80], 2, 1, 5.0);
        assert_eq!(bps, vec![80]);
    }

    #[test]
    fn degenerate_inputs() {
        let pelt = Pelt::new(L2Cost);
        assert_eq!(pelt.detect_change_points(&[], 2, 1, 1.0), vec![0]);
        // Shorter than the minimum segment: unreachable, falls back to [n]
        assert_eq!(pelt.detect_change_points(&[1.0, 2.0, 3.0], 10, 1, 1.0), vec![3]);
        // Zero jump and zero min length are floored
        assert_eq!(pelt.detect_change_points(&[1.0; 5], 0, 0, 1.0), vec![5]);
    }

    #[test]
    fn scratch_buffers_are_recycled() {
        let pelt = Pelt::new(L2Cost);
        pelt.detect_change_points(&step_signal(), 2, 1, 10.0);
        assert_eq!(pelt.scratch.available(), 1);
    }
}
