//! Granger relationships between the channels of one flight.

use rayon::prelude::*;
use tracing::info;

use super::granger::GrangerAnalyzer;
use crate::config::CausalityConfig;
use crate::types::{FieldRelationship, GrangerResult, Relationship};

#[derive(Debug, Clone, Copy)]
pub struct FlightCausality {
    granger: GrangerAnalyzer,
    /// Improvement ratio at or above which a direction counts
    significance_threshold: f64,
}

impl FlightCausality {
    pub fn new(granger: GrangerAnalyzer, significance_threshold: f64) -> Self {
        Self {
            granger,
            significance_threshold,
        }
    }

    pub fn from_config(config: &CausalityConfig) -> Self {
        Self::new(
            GrangerAnalyzer::from_config(config),
            config.significance_threshold,
        )
    }

    pub fn label(&self, scores: &GrangerResult) -> Relationship {
        let forward = scores.x_to_y.improvement_ratio >= self.significance_threshold;
        let backward = scores.y_to_x.improvement_ratio >= self.significance_threshold;
        match (forward, backward) {
            (true, true) => Relationship::TwoWay,
            (true, false) => Relationship::XCausesY,
            (false, true) => Relationship::YCausesX,
            (false, false) => Relationship::None,
        }
    }

    /// Bidirectional Granger scores and label for one field pair.
    pub fn analyze_pair(
        &self,
        x_field: &str,
        x: &[f64],
        y_field: &str,
        y: &[f64],
    ) -> FieldRelationship {
        let scores = self.granger.analyze(x, y);
        FieldRelationship {
            x_field: x_field.to_string(),
            y_field: y_field.to_string(),
            relationship: self.label(&scores),
            scores,
        }
    }

    /// Every unordered pair of `fields`, in input order (`(0,1), (0,2), …`).
    ///
    /// Pairs are independent and scored in parallel.
    pub fn analyze_fields(&self, fields: &[(String, Vec<f64>)]) -> Vec<FieldRelationship> {
        let pairs: Vec<(usize, usize)> = (0..fields.len())
            .flat_map(|i| (i + 1..fields.len()).map(move |j| (i, j)))
            .collect();

        let relationships: Vec<FieldRelationship> = pairs
            .par_iter()
            .map(|&(i, j)| {
                let (x_name, x) = &fields[i];
                let (y_name, y) = &fields[j];
                self.analyze_pair(x_name, x, y_name, y)
            })
            .collect();

        let linked = relationships
            .iter()
            .filter(|r| r.relationship != Relationship::None)
            .count();
        info!(
            fields = fields.len(),
            pairs = relationships.len(),
            linked,
            "Field causality matrix computed"
        );
        relationships
    }
}
