//! Changepoint detection
//!
//! - `cost`: `CostFunction` strategy trait with L2 and RBF-kernel costs
//! - `pelt`: optimal penalised search with admissible-set pruning
//! - `scratch`: pooled scratch buffers for the PELT inner loop

mod cost;
mod pelt;
mod scratch;

pub use cost::{CostFunction, FittedCost, FittedL2, FittedRbf, L2Cost, RbfKernelCost};
pub use pelt::Pelt;
pub use scratch::{ScratchBuffer, ScratchPool};

use crate::config::{CostKind, TuningProfile};

/// Run PELT with the configured cost kind.
pub fn detect_change_points(
    kind: CostKind,
    signal: &[f64],
    min_segment_length: usize,
    jump: usize,
    penalty: f64,
) -> Vec<usize> {
    match kind {
        CostKind::L2 => {
            Pelt::new(L2Cost).detect_change_points(signal, min_segment_length, jump, penalty)
        }
        CostKind::Rbf => Pelt::new(RbfKernelCost).detect_change_points(
            signal,
            min_segment_length,
            jump,
            penalty,
        ),
    }
}

/// Run PELT with the segmentation parameters of a tuning profile.
pub fn detect_with_profile(kind: CostKind, signal: &[f64], profile: &TuningProfile) -> Vec<usize> {
    detect_change_points(
        kind,
        signal,
        profile.min_segment_length,
        profile.jump,
        profile.penalty,
    )
}

/// Minimum segment size of the configured cost kind.
pub fn minimum_size(kind: CostKind) -> usize {
    match kind {
        CostKind::L2 => L2Cost.minimum_size(),
        CostKind::Rbf => RbfKernelCost.minimum_size(),
    }
}
