//! Pairwise causality results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which causality test produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CausalityMethod {
    /// Nothing could be computed (empty input)
    None,
    Granger,
    Ccm,
}

impl fmt::Display for CausalityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Granger => write!(f, "Granger"),
            Self::Ccm => write!(f, "CCM"),
        }
    }
}

/// One direction of a Granger test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalScore {
    /// `(MSE_restricted - MSE_unrestricted) / MSE_restricted`
    pub improvement_ratio: f64,
    pub f_statistic: f64,
    pub p_value: f64,
}

impl DirectionalScore {
    pub const ZERO: Self = Self {
        improvement_ratio: 0.0,
        f_statistic: 0.0,
        p_value: 1.0,
    };
}

impl Default for DirectionalScore {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Both directions of a Granger test between X and Y.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GrangerResult {
    pub x_to_y: DirectionalScore,
    pub y_to_x: DirectionalScore,
}

/// Directional scores for an ordered pair of channels.
///
/// For Granger these are improvement ratios; for CCM the best cross-map
/// correlation over the library sizes tried.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CausalityResult {
    pub method: CausalityMethod,
    pub x_to_y: f64,
    pub y_to_x: f64,
}

impl CausalityResult {
    pub const NONE: Self = Self {
        method: CausalityMethod::None,
        x_to_y: 0.0,
        y_to_x: 0.0,
    };
}

/// Output of automatic method selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CausalitySelection {
    pub method: CausalityMethod,
    /// Pearson correlation of the raw series
    pub pearson: f64,
    /// Pearson correlation of the first differences
    pub diff_pearson: f64,
    pub result: CausalityResult,
}

/// Direction label for a pair of fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relationship {
    TwoWay,
    XCausesY,
    YCausesX,
    None,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TwoWay => write!(f, "two-way"),
            Self::XCausesY => write!(f, "X→Y"),
            Self::YCausesX => write!(f, "Y→X"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Labelled Granger relationship between two named fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRelationship {
    pub x_field: String,
    pub y_field: String,
    pub scores: GrangerResult,
    pub relationship: Relationship,
}
