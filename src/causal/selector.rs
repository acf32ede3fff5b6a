//! Automatic choice between Granger and CCM.
//!
//! Strongly linearly correlated channels are scored with Granger; everything
//! else is treated as a possibly nonlinear coupling and scored with CCM.

use tracing::debug;

use super::ccm::CcmAnalyzer;
use super::granger::GrangerAnalyzer;
use crate::config::CausalityConfig;
use crate::processing::stats::{diff, pearson};
use crate::types::{CausalityMethod, CausalityResult, CausalitySelection};

#[derive(Debug, Clone, Copy)]
pub struct AutoCausalitySelector {
    granger: GrangerAnalyzer,
    ccm: CcmAnalyzer,
    /// |Pearson| at or above which Granger is used
    threshold: f64,
}

impl AutoCausalitySelector {
    pub fn new(granger: GrangerAnalyzer, ccm: CcmAnalyzer, threshold: f64) -> Self {
        Self {
            granger,
            ccm,
            threshold,
        }
    }

    pub fn from_config(config: &CausalityConfig) -> Self {
        Self::new(
            GrangerAnalyzer::from_config(config),
            CcmAnalyzer::from_config(config),
            config.auto_select_threshold,
        )
    }

    pub fn select(&self, x: &[f64], y: &[f64]) -> CausalitySelection {
        if x.is_empty() || y.is_empty() {
            return CausalitySelection {
                method: CausalityMethod::None,
                pearson: 0.0,
                diff_pearson: 0.0,
                result: CausalityResult::NONE,
            };
        }

        let r = pearson(x, y);
        let diff_r = pearson(&diff(x), &diff(y));

        let result = if r.abs() >= self.threshold {
            let scores = self.granger.analyze(x, y);
            CausalityResult {
                method: CausalityMethod::Granger,
                x_to_y: scores.x_to_y.improvement_ratio,
                y_to_x: scores.y_to_x.improvement_ratio,
            }
        } else {
            CausalityResult {
                method: CausalityMethod::Ccm,
                x_to_y: self.ccm.cross_map(x, y),
                y_to_x: self.ccm.cross_map(y, x),
            }
        };

        debug!(
            method = %result.method,
            pearson = r,
            diff_pearson = diff_r,
            x_to_y = result.x_to_y,
            y_to_x = result.y_to_x,
            "Causality method selected"
        );

        CausalitySelection {
            method: result.method,
            pearson: r,
            diff_pearson: diff_r,
            result,
        }
    }
}

impl Default for AutoCausalitySelector {
    fn default() -> Self {
        Self::from_config(&CausalityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_selects_none() {
        let sel = AutoCausalitySelector::default().select(&[], &[]);
        assert_eq!(sel.method, CausalityMethod::None);
        assert_eq!(sel.pearson, 0.0);
        assert_eq!(sel.diff_pearson, 0.0);
        assert_eq!(sel.result, CausalityResult::NONE);
    }

    #[test]
    fn linear_pair_uses_granger() {
        let x: Vec<f64> = (0..200).map(|i| (f64::from(i) * 0.05).sin()).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        let sel = AutoCausalitySelector::default().select(&x, &y);
        assert_eq!(sel.method, CausalityMethod::Granger);
        assert_eq!(sel.result.method, CausalityMethod::Granger);
        assert!((sel.pearson - 1.0).abs() < 1e-9);
    }

    #[test]
    fn weakly_correlated_pair_uses_ccm() {
        let x: Vec<f64> = (0..200).map(|i| (f64::from(i) * 0.3).sin()).collect();
        let y: Vec<f64> = (0..200).map(|i| (f64::from(i) * 0.3).cos()).collect();
        let sel = AutoCausalitySelector::default().select(&x, &y);
        assert!(sel.pearson.abs() < 0.65);
        assert_eq!(sel.method, CausalityMethod::Ccm);
        assert!(sel.result.x_to_y >= 0.0 && sel.result.y_to_x >= 0.0);
    }
}
